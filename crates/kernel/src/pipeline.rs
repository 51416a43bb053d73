//! Filesystem-backed host pipeline

use crate::resolver::UnitResolver;
use chunker::{GraphError, UnitGraph};
use futures::future::{BoxFuture, FutureExt};
use offmain_core::{CompiledUnit, Diagnostic, ModuleId, Pipeline, PlaceholderToken};
use std::path::Path;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Module ids are absolute file paths.
pub struct FsPipeline {
    resolver: UnitResolver,
    graph: RwLock<UnitGraph>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl FsPipeline {
    pub fn new() -> Self {
        Self {
            resolver: UnitResolver::new(),
            graph: RwLock::new(UnitGraph::new()),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn resolve_entry(&self, root: &Path, entry: &str) -> anyhow::Result<ModuleId> {
        let path = self.resolver.resolve(root, entry)?;
        Ok(ModuleId::new(path.to_string_lossy()))
    }

    pub fn mark_entry(&self, id: &ModuleId) {
        self.graph_mut().mark_entry(id);
    }

    pub fn set_body(&self, id: &ModuleId, body: String) -> Result<(), GraphError> {
        self.graph_mut().set_body(id, body)
    }

    pub fn assign_addresses(&self) {
        self.graph_mut().assign_addresses();
    }

    /// Snapshot of every unit in request order.
    pub fn units(&self) -> Vec<CompiledUnit> {
        self.graph().units().to_vec()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn graph(&self) -> RwLockReadGuard<'_, UnitGraph> {
        self.graph.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn graph_mut(&self) -> RwLockWriteGuard<'_, UnitGraph> {
        self.graph.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline for FsPipeline {
    fn resolve<'a>(&'a self, specifier: &'a str, importer: &'a ModuleId) -> BoxFuture<'a, Option<ModuleId>> {
        async move {
            match self.resolver.resolve(Path::new(importer.as_str()), specifier) {
                Ok(path) => Some(ModuleId::new(path.to_string_lossy())),
                Err(err) => {
                    tracing::debug!("{:#}", err);
                    None
                }
            }
        }
        .boxed()
    }

    fn request_compiled_unit(&self, id: &ModuleId) -> PlaceholderToken {
        self.graph_mut().request(id).0
    }

    fn unit_for_token(&self, token: PlaceholderToken) -> Option<ModuleId> {
        self.graph().unit_for_token(token).cloned()
    }

    fn final_address_of(&self, id: &ModuleId) -> Option<String> {
        self.graph().final_address_of(id)
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }
}
