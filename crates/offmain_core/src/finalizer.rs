//! Turns host-produced unit bodies into emitted declaration-based units.

use crate::config::{Config, OutputFormat};
use crate::diagnostics::Diagnostic;
use crate::edit::{EditBuffer, PositionMap};
use crate::error::FinalizeError;
use crate::pipeline::{CompiledUnit, Pipeline, PlaceholderToken};
use crate::runtime::render_loader;
use crate::session::BuildSession;
use std::sync::Arc;

/// The declaration call every host-produced body starts with.
const DECLARATION_OPEN: &str = "define(";

/// Decides whether a unit gets the loader bootstrap prepended.
pub type PrependPolicy = Arc<dyn Fn(&CompiledUnit, &BuildSession) -> bool + Send + Sync>;

/// Entry points and worker units carry the loader, nothing else does.
pub fn entry_or_worker(unit: &CompiledUnit, session: &BuildSession) -> bool {
    unit.is_entry || session.is_worker_unit(&unit.id)
}

#[derive(Debug)]
pub struct FinalizedUnit {
    pub code: String,
    /// `None` when the body was shipped unchanged.
    pub map: Option<PositionMap>,
    pub loader_prepended: bool,
}

pub struct Finalizer {
    format: OutputFormat,
    banner: Option<String>,
    function_name: String,
    loader: String,
    silence_esm_warning: bool,
    session: Arc<BuildSession>,
    policy: PrependPolicy,
}

impl Finalizer {
    pub fn new(config: &Config, session: Arc<BuildSession>) -> Self {
        Self {
            format: config.format.clone(),
            banner: config.banner.clone(),
            function_name: config.amd_function_name.clone(),
            loader: render_loader(config),
            silence_esm_warning: config.silence_esm_worker_warning,
            session,
            policy: Arc::new(entry_or_worker),
        }
    }

    pub fn with_prepend_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&CompiledUnit, &BuildSession) -> bool + Send + Sync + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    pub fn should_prepend_loader(&self, unit: &CompiledUnit) -> bool {
        (self.policy)(unit, &self.session)
    }

    /// Validate the output settings. Returns `false` when units are shipped
    /// as produced (native modules).
    pub fn check_output<P>(&self, pipeline: &P) -> Result<bool, FinalizeError>
    where
        P: Pipeline + ?Sized,
    {
        match &self.format {
            OutputFormat::Amd => {}
            OutputFormat::Es => {
                if !self.silence_esm_warning && self.session.take_esm_warning() {
                    let diagnostic = Diagnostic::warning(
                        "Very few browsers support ES modules in Workers. If you want your code to run \
                         in all browsers, set `format = \"amd\"`.",
                    );
                    tracing::warn!("{}", diagnostic);
                    pipeline.emit_diagnostic(diagnostic);
                }
                return Ok(false);
            }
            OutputFormat::Other(format) => return Err(FinalizeError::UnsupportedFormat(format.clone())),
        }
        if self.banner.as_deref().is_some_and(|banner| !banner.is_empty()) {
            return Err(FinalizeError::BannerUnsupported);
        }
        Ok(true)
    }

    pub fn finalize<P>(&self, unit: &CompiledUnit, pipeline: &P) -> Result<FinalizedUnit, FinalizeError>
    where
        P: Pipeline + ?Sized,
    {
        if !self.check_output(pipeline)? {
            return Ok(FinalizedUnit {
                code: unit.body.clone(),
                map: None,
                loader_prepended: false,
            });
        }

        let address = unit
            .final_address
            .clone()
            .or_else(|| pipeline.final_address_of(&unit.id))
            .ok_or_else(|| FinalizeError::MissingAddress { unit: unit.id.clone() })?;

        let body = unit.body.as_str();
        let Some(rest) = body.strip_prefix(DECLARATION_OPEN) else {
            return Err(FinalizeError::MalformedDeclaration { unit: unit.id.clone() });
        };

        let mut edits = EditBuffer::new(body);
        let dependency_array = if rest.trim_start().starts_with('[') { "" } else { "[], " };
        edits.overwrite(
            0..DECLARATION_OPEN.len(),
            format!("{}({}, {}", self.function_name, js_string(&address), dependency_array),
        )?;

        self.replace_placeholders(&mut edits, unit, pipeline)?;

        let loader_prepended = self.should_prepend_loader(unit);
        if loader_prepended {
            edits.prepend(&self.loader);
        }

        let (code, map) = edits.finish();
        tracing::debug!(unit = %unit.id, address = %address, loader = loader_prepended, "finalized");
        Ok(FinalizedUnit {
            code,
            map: Some(map),
            loader_prepended,
        })
    }
}

impl Finalizer {
    /// Substitute every placeholder of this session in a unit body with the
    /// quoted address of the unit it names. Native-module output needs this
    /// without the declaration.
    pub fn resolve_placeholders<P>(&self, unit: &CompiledUnit, pipeline: &P) -> Result<String, FinalizeError>
    where
        P: Pipeline + ?Sized,
    {
        let mut edits = EditBuffer::new(&unit.body);
        self.replace_placeholders(&mut edits, unit, pipeline)?;
        Ok(edits.finish().0)
    }

    fn replace_placeholders<P>(
        &self,
        edits: &mut EditBuffer<'_>,
        unit: &CompiledUnit,
        pipeline: &P,
    ) -> Result<(), FinalizeError>
    where
        P: Pipeline + ?Sized,
    {
        // Text that merely looks like a token carries another nonce and stays.
        for (range, token) in PlaceholderToken::find_all(&unit.body, self.session.nonce()) {
            let target = pipeline
                .unit_for_token(token)
                .and_then(|id| pipeline.final_address_of(&id))
                .ok_or_else(|| FinalizeError::UnresolvedPlaceholder {
                    token,
                    unit: unit.id.clone(),
                })?;
            edits.overwrite(range, js_string(&target))?;
        }
        Ok(())
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
