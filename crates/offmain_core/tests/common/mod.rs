#![allow(dead_code)]

use futures::future::{self, BoxFuture, FutureExt};
use offmain_core::{Diagnostic, ModuleId, Pipeline, PlaceholderToken};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory host: resolves against a fixed set of file ids and hands out
/// one token per requested unit.
#[derive(Default)]
pub struct MockPipeline {
    files: HashSet<String>,
    units: Mutex<Vec<ModuleId>>,
    addresses: Mutex<HashMap<ModuleId, String>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    /// specifier -> how long its resolution takes
    delays: HashMap<String, Duration>,
}

impl MockPipeline {
    pub fn with_files(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|file| file.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, specifier: &str, millis: u64) -> Self {
        self.delays.insert(specifier.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn set_address(&self, id: &str, address: &str) {
        self.addresses
            .lock()
            .unwrap()
            .insert(ModuleId::from(id), address.to_string());
    }

    pub fn requested(&self) -> Vec<ModuleId> {
        self.units.lock().unwrap().clone()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics().into_iter().map(|d| d.message).collect()
    }
}

/// `/src/main.js` + `../lib/a.js` = `/lib/a.js`
fn join(importer: &str, specifier: &str) -> String {
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();
    for segment in specifier.split('/') {
        match segment {
            "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

impl Pipeline for MockPipeline {
    fn resolve<'a>(&'a self, specifier: &'a str, importer: &'a ModuleId) -> BoxFuture<'a, Option<ModuleId>> {
        let joined = join(importer.as_str(), specifier);
        let found = self.files.contains(&joined).then(|| ModuleId::new(joined));
        match self.delays.get(specifier).copied() {
            Some(delay) => async move {
                tokio::time::sleep(delay).await;
                found
            }
            .boxed(),
            None => future::ready(found).boxed(),
        }
    }

    fn request_compiled_unit(&self, id: &ModuleId) -> PlaceholderToken {
        let mut units = self.units.lock().unwrap();
        let slot = match units.iter().position(|unit| unit == id) {
            Some(slot) => slot,
            None => {
                units.push(id.clone());
                units.len() - 1
            }
        };
        PlaceholderToken(slot as u32)
    }

    fn unit_for_token(&self, token: PlaceholderToken) -> Option<ModuleId> {
        self.units.lock().unwrap().get(token.0 as usize).cloned()
    }

    fn final_address_of(&self, id: &ModuleId) -> Option<String> {
        self.addresses.lock().unwrap().get(id).cloned()
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }
}
