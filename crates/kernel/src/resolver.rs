//! Module resolution using oxc_resolver

use anyhow::{Context, Result};
use oxc_resolver::{ResolveOptions, Resolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct UnitResolver {
    resolver: Arc<Resolver>,
}

impl UnitResolver {
    pub fn new() -> Self {
        let options = ResolveOptions {
            extensions: vec![
                ".js".into(),
                ".mjs".into(),
                ".ts".into(),
                ".tsx".into(),
                ".jsx".into(),
                ".json".into(),
            ],
            main_fields: vec!["browser".into(), "module".into(), "main".into()],
            condition_names: vec!["browser".into(), "import".into(), "default".into()],
            ..ResolveOptions::default()
        };
        Self {
            resolver: Arc::new(Resolver::new(options)),
        }
    }

    /// Resolve `specifier` as written in `importer`, which may be a file or
    /// the directory to resolve from.
    pub fn resolve(&self, importer: &Path, specifier: &str) -> Result<PathBuf> {
        let dir = if importer.is_dir() {
            importer
        } else {
            importer.parent().unwrap_or(Path::new("/"))
        };
        let resolution = self
            .resolver
            .resolve(dir, specifier)
            .with_context(|| format!("cannot resolve `{}` from {}", specifier, dir.display()))?;
        Ok(resolution.into_path_buf())
    }
}

impl Default for UnitResolver {
    fn default() -> Self {
        Self::new()
    }
}
