//! Build-time rewriting of worker references.
//!
//! Each worker call site is pointed at its own compiled unit: the script
//! argument becomes `new URL(<placeholder>, import.meta.url)` and the host is
//! asked to emit the referenced module as a separate unit.

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::edit::{EditBuffer, PositionMap};
use crate::error::RewriteError;
use crate::pipeline::{ModuleId, Pipeline, PlaceholderToken};
use crate::scanner::{OptionsArgument, PendingReference, Scanner, SourceForm, WorkerOptions};
use crate::session::BuildSession;
use futures::future::try_join_all;
use std::sync::Arc;

#[derive(Debug)]
pub struct Rewritten {
    pub code: String,
    pub map: PositionMap,
    /// Units referenced from this module, in source order.
    pub units: Vec<ModuleId>,
}

pub struct Rewriter {
    scanner: Scanner,
    session: Arc<BuildSession>,
    keep_module_options: bool,
    url_prefix: String,
}

impl Rewriter {
    pub fn new(config: &Config, session: Arc<BuildSession>) -> Self {
        Self {
            scanner: Scanner::for_constructors(config.worker_constructors.iter().cloned()),
            session,
            keep_module_options: config.format.is_module_native(),
            url_prefix: config.url_loader_prefix(),
        }
    }

    pub fn session(&self) -> &Arc<BuildSession> {
        &self.session
    }

    /// Rewrite every worker reference in `source`. `Ok(None)` when nothing
    /// was rewritten.
    pub async fn transform<P>(
        &self,
        source: &str,
        id: &ModuleId,
        pipeline: &P,
    ) -> Result<Option<Rewritten>, RewriteError>
    where
        P: Pipeline + ?Sized,
    {
        let references = self.scanner.scan(source);
        if references.is_empty() {
            return Ok(None);
        }

        let accepted: Vec<PendingReference> = references
            .into_iter()
            .filter(|reference| self.accept(reference, source, id, pipeline))
            .collect();
        if accepted.is_empty() {
            return Ok(None);
        }

        // Spans were captured above; resolution order does not matter.
        let resolved = try_join_all(
            accepted
                .iter()
                .map(|reference| self.resolve_reference(reference, id, pipeline)),
        )
        .await?;

        let mut edits = EditBuffer::new(source);
        let mut units = Vec::with_capacity(accepted.len());
        for (reference, (unit, token)) in accepted.iter().zip(resolved) {
            if self.session.mark_worker_unit(&unit) {
                tracing::debug!("{} is a worker unit", unit);
            }
            edits.overwrite(reference.argument_range.clone(), worker_url(&self.session.placeholder(token)))?;
            if let Some(options) = &reference.options {
                if let Some(rendered) = self.render_options(options, source, id, pipeline) {
                    edits.overwrite(options.range.clone(), rendered)?;
                }
            }
            units.push(unit);
        }

        let (code, map) = edits.finish();
        tracing::debug!("rewrote {} worker reference(s) in {}", units.len(), id);
        Ok(Some(Rewritten { code, map, units }))
    }

    /// Maps `"<scheme>:<path>"` to a virtual id carrying the resolved module.
    /// `Ok(None)` for specifiers without the scheme.
    pub async fn resolve_url_import<P>(
        &self,
        specifier: &str,
        importer: &ModuleId,
        pipeline: &P,
    ) -> Result<Option<ModuleId>, RewriteError>
    where
        P: Pipeline + ?Sized,
    {
        let Some(path) = specifier.strip_prefix(&self.url_prefix) else {
            return Ok(None);
        };
        let resolved = pipeline
            .resolve(path, importer)
            .await
            .ok_or_else(|| RewriteError::Unresolved {
                specifier: path.to_string(),
                importer: importer.clone(),
            })?;
        Ok(Some(ModuleId::new(format!("{}{}", self.url_prefix, resolved))))
    }

    /// Source of a virtual id produced by [`Rewriter::resolve_url_import`]:
    /// a module whose default export is the unit's address.
    pub fn load_url_module<P>(&self, id: &ModuleId, pipeline: &P) -> Option<String>
    where
        P: Pipeline + ?Sized,
    {
        let real = id.as_str().strip_prefix(&self.url_prefix)?;
        let token = pipeline.request_compiled_unit(&ModuleId::from(real));
        Some(format!("export default {};", self.session.placeholder(token)))
    }

    fn accept<P>(&self, reference: &PendingReference, source: &str, id: &ModuleId, pipeline: &P) -> bool
    where
        P: Pipeline + ?Sized,
    {
        if reference.form == SourceForm::SelfUrl {
            return true;
        }
        let start = reference.call_range.start;
        if !is_relative(&reference.raw_path) {
            let diagnostic = Diagnostic::warning(format!(
                "Paths passed to the {} constructor must be relative to the current file, \
                 i.e. start with ./ or ../ (just like dynamic import!). Ignoring \"{}\".",
                reference.constructor, reference.raw_path
            ))
            .at(id, source, start);
            emit(pipeline, diagnostic);
            return false;
        }
        if reference.form == SourceForm::LiteralPath {
            let options = if reference.options.is_some() { ", …" } else { "" };
            let written = format!("new {}({}{})", reference.constructor, reference.raw_path_text, options);
            let canonical = format!(
                "new {}(new URL({}, import.meta.url){})",
                reference.constructor, reference.raw_path_text, options
            );
            let message = self.session.legacy_form_message(&written, &canonical);
            emit(pipeline, Diagnostic::warning(message).at(id, source, start));
        }
        true
    }

    async fn resolve_reference<P>(
        &self,
        reference: &PendingReference,
        id: &ModuleId,
        pipeline: &P,
    ) -> Result<(ModuleId, PlaceholderToken), RewriteError>
    where
        P: Pipeline + ?Sized,
    {
        let unit = match reference.form {
            SourceForm::SelfUrl => id.clone(),
            SourceForm::LiteralPath | SourceForm::UrlWrappedLiteral => pipeline
                .resolve(&reference.raw_path, id)
                .await
                .ok_or_else(|| RewriteError::Unresolved {
                    specifier: reference.raw_path.clone(),
                    importer: id.clone(),
                })?,
        };
        let token = pipeline.request_compiled_unit(&unit);
        Ok((unit, token))
    }

    /// Replacement text for the options argument, `None` to keep it as written.
    fn render_options<P>(&self, options: &OptionsArgument, source: &str, id: &ModuleId, pipeline: &P) -> Option<String>
    where
        P: Pipeline + ?Sized,
    {
        let mut parsed = match WorkerOptions::parse(&options.text) {
            Ok(parsed) => parsed,
            Err(err) => {
                let diagnostic = Diagnostic::warning(format!(
                    "{err}; leaving `{}` untouched",
                    options.text
                ))
                .at(id, source, options.range.start);
                emit(pipeline, diagnostic);
                return None;
            }
        };
        for problem in parsed.problems() {
            emit(pipeline, Diagnostic::warning(problem).at(id, source, options.range.start));
        }
        if self.keep_module_options || !parsed.strip_module_only() {
            return None;
        }
        Some(parsed.to_js())
    }
}

fn emit<P>(pipeline: &P, diagnostic: Diagnostic)
where
    P: Pipeline + ?Sized,
{
    tracing::warn!("{}", diagnostic);
    pipeline.emit_diagnostic(diagnostic);
}

fn is_relative(path: &str) -> bool {
    path.starts_with("./") || path.starts_with("../")
}

fn worker_url(placeholder: &str) -> String {
    format!("new URL({placeholder}, import.meta.url)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths() {
        assert!(is_relative("./a.js"));
        assert!(is_relative("../a.js"));
        assert!(!is_relative("a.js"));
        assert!(!is_relative("/a.js"));
        assert!(!is_relative("https://x/a.js"));
        assert!(!is_relative(".a.js"));
    }

    #[test]
    fn test_worker_url_shape() {
        let session = BuildSession::with_nonce(0xab);
        assert_eq!(
            worker_url(&session.placeholder(PlaceholderToken(1))),
            "new URL(__OFFMAIN_00000000000000ab_1__, import.meta.url)"
        );
    }
}
