use crate::pipeline::FsPipeline;
use anyhow::{Context, Result};
use offmain_core::edit::EditBuffer;
use offmain_core::scanner::lexer::is_word_byte;
use offmain_core::scanner::{JsLexer, RegionClassifier, RegionKind};
use offmain_core::{BuildSession, Config, Diagnostic, Finalizer, ModuleId, Rewriter};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const META_URL: &str = "import.meta.url";

#[derive(Debug)]
pub struct EmittedUnit {
    pub id: ModuleId,
    /// Runtime address, e.g. `./work-1a2b3c4d.js`
    pub address: String,
    pub path: PathBuf,
    pub is_entry: bool,
    pub loader_prepended: bool,
}

#[derive(Debug)]
pub struct BuildReport {
    pub units: Vec<EmittedUnit>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    pub fn unit(&self, file_stem: &str) -> Option<&EmittedUnit> {
        let prefix = format!("./{file_stem}-");
        self.units.iter().find(|unit| unit.address.starts_with(&prefix))
    }
}

/// Build every entry under `root` into `root/dist`, one file per unit.
pub async fn build(root: &Path, entries: &[&str], config: &Config) -> Result<BuildReport> {
    tracing::info!("Starting build in {}", root.display());
    let dist = root.join("dist");

    let session = Arc::new(BuildSession::new());
    let pipeline = FsPipeline::new();
    let rewriter = Rewriter::new(config, session.clone());
    let finalizer = Finalizer::new(config, session.clone());

    // Fails before anything is written.
    let declaration_based = finalizer.check_output(&pipeline)?;

    let mut queue = VecDeque::new();
    for entry in entries {
        let id = pipeline.resolve_entry(root, entry)?;
        tracing::info!("Entry point: {}", id);
        pipeline.mark_entry(&id);
        queue.push_back(id);
    }

    let mut visited = HashSet::new();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let source = tokio::fs::read_to_string(id.as_str())
            .await
            .with_context(|| format!("failed to read {}", id))?;

        let code = match rewriter.transform(&source, &id, &pipeline).await? {
            Some(rewritten) => {
                queue.extend(rewritten.units.into_iter().filter(|unit| !visited.contains(unit)));
                rewritten.code
            }
            None => source,
        };
        let body = if declaration_based { wrap_declaration(&code) } else { code };
        pipeline.set_body(&id, body)?;
    }

    pipeline.assign_addresses();
    let emitted = emit(&dist, &pipeline, &finalizer, declaration_based).await?;

    tracing::info!("Build complete! {} unit(s) in {}", emitted.len(), dist.display());
    Ok(BuildReport {
        units: emitted,
        diagnostics: pipeline.take_diagnostics(),
    })
}

/// Finalize every unit of `pipeline` in memory, then replace `dist` with the
/// results. Any failure leaves `dist` as it was.
pub async fn emit(
    dist: &Path,
    pipeline: &FsPipeline,
    finalizer: &Finalizer,
    declaration_based: bool,
) -> Result<Vec<EmittedUnit>> {
    let mut outputs = Vec::new();
    for mut unit in pipeline.units() {
        let address = unit
            .final_address
            .clone()
            .with_context(|| format!("unit {} has no address", unit.id))?;

        let (code, loader_prepended) = if declaration_based {
            unit.body = classic_meta_url(&unit.body, &address)?;
            let finalized = finalizer
                .finalize(&unit, pipeline)
                .with_context(|| format!("failed to finalize {}", unit.id))?;
            (finalized.code, finalized.loader_prepended)
        } else {
            (finalizer.resolve_placeholders(&unit, pipeline)?, false)
        };

        let path = dist.join(address.trim_start_matches("./"));
        outputs.push((
            EmittedUnit {
                id: unit.id,
                address,
                path,
                is_entry: unit.is_entry,
                loader_prepended,
            },
            code,
        ));
    }

    if dist.exists() {
        tokio::fs::remove_dir_all(dist).await?;
    }
    tokio::fs::create_dir_all(dist).await?;

    let mut emitted = Vec::with_capacity(outputs.len());
    for (unit, code) in outputs {
        tokio::fs::write(&unit.path, code)
            .await
            .with_context(|| format!("failed to write {}", unit.path.display()))?;
        tracing::debug!("wrote {}", unit.path.display());
        emitted.push(unit);
    }
    Ok(emitted)
}

/// Host-side compilation of one unit: a declaration with no dependency array.
fn wrap_declaration(code: &str) -> String {
    format!("define(function () {{\n{}\n}});\n", code)
}

/// Classic scripts have no `import.meta`. Each `import.meta.url` in code
/// becomes the unit's own URL, resolved the way the loader resolves it:
/// against the document base, or against the worker's location.
///
/// Static `import`/`export` statements are not converted; sources built into
/// declarations must be scripts.
fn classic_meta_url(body: &str, address: &str) -> Result<String> {
    let own_url = format!(
        "new URL({}, typeof document === \"undefined\" ? self.location.href : document.baseURI).href",
        serde_json::Value::from(address)
    );
    let bytes = body.as_bytes();
    let mut edits = EditBuffer::new(body);
    for region in JsLexer.classify(body) {
        if region.kind != RegionKind::Code {
            continue;
        }
        let code = &body[region.range.clone()];
        for (offset, _) in code.match_indices(META_URL) {
            let start = region.range.start + offset;
            let end = start + META_URL.len();
            let before = start.checked_sub(1).map(|at| bytes[at]);
            let after = bytes.get(end).copied();
            if before.is_some_and(|b| is_word_byte(b) || b == b'.') || after.is_some_and(is_word_byte) {
                continue;
            }
            edits.overwrite(start..end, own_url.clone())?;
        }
    }
    Ok(edits.finish().0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_url_in_code_only() {
        let body = "a(import.meta.url); b('import.meta.url'); // import.meta.url\nc(x.import.meta.url, import.meta.urls);";
        let out = classic_meta_url(body, "./m-1.js").unwrap();
        assert_eq!(
            out,
            "a(new URL(\"./m-1.js\", typeof document === \"undefined\" ? self.location.href : document.baseURI).href); \
             b('import.meta.url'); // import.meta.url\nc(x.import.meta.url, import.meta.urls);"
        );
    }

    #[test]
    fn test_body_without_meta_url_is_unchanged() {
        let body = "define(function () {\nconsole.log(1);\n});\n";
        assert_eq!(classic_meta_url(body, "./m-1.js").unwrap(), body);
    }
}
