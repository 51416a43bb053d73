//! Contract between the core and the host build pipeline.
//!
//! The host owns module resolution, the compiled-unit registry and address
//! assignment. The core only asks for what it needs through [`Pipeline`].

use crate::diagnostics::Diagnostic;
use futures::future::BoxFuture;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

/// Canonical identity of a source module, assigned by the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Build-unique stand-in for a compiled unit's final address.
///
/// Rendered into rewritten source as a bare identifier-like marker carrying
/// the build session's nonce, so it survives any host transform that keeps
/// identifiers intact and cannot be confused with text the user wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderToken(pub u32);

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__OFFMAIN_([0-9a-f]{16})_([0-9a-f]+)__").expect("valid token pattern"));

impl PlaceholderToken {
    /// Source text of this token under `nonce`.
    pub fn render(self, nonce: u64) -> String {
        format!("__OFFMAIN_{:016x}_{:x}__", nonce, self.0)
    }

    /// Every token rendered under `nonce` in `text`, with its byte range.
    /// Lookalikes carrying another nonce are skipped.
    pub fn find_all(text: &str, nonce: u64) -> Vec<(Range<usize>, PlaceholderToken)> {
        TOKEN_PATTERN
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let found = u64::from_str_radix(caps.get(1)?.as_str(), 16).ok()?;
                if found != nonce {
                    return None;
                }
                let number = u32::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
                Some((whole.range(), PlaceholderToken(number)))
            })
            .collect()
    }
}

impl fmt::Display for PlaceholderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One independently loadable output file.
#[derive(Clone, Debug)]
pub struct CompiledUnit {
    pub id: ModuleId,
    pub is_entry: bool,
    /// First-seen order, duplicates collapsed.
    pub dependency_ids: Vec<ModuleId>,
    pub body: String,
    /// Known only after the host has laid out the whole unit graph.
    pub final_address: Option<String>,
}

impl CompiledUnit {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            is_entry: false,
            dependency_ids: Vec::new(),
            body: String::new(),
            final_address: None,
        }
    }

    pub fn add_dependency(&mut self, dep: ModuleId) {
        if !self.dependency_ids.contains(&dep) {
            self.dependency_ids.push(dep);
        }
    }
}

/// Capabilities the core consumes from the host build pipeline.
pub trait Pipeline: Send + Sync {
    /// Resolve `specifier` as imported from `importer`. `None` means not found.
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        importer: &'a ModuleId,
    ) -> BoxFuture<'a, Option<ModuleId>>;

    /// Make `id` the root of its own compiled unit. Idempotent per id: the
    /// same token comes back for repeated requests.
    fn request_compiled_unit(&self, id: &ModuleId) -> PlaceholderToken;

    /// The unit a token was issued for.
    fn unit_for_token(&self, token: PlaceholderToken) -> Option<ModuleId>;

    /// Valid once the unit graph is final.
    fn final_address_of(&self, id: &ModuleId) -> Option<String>;

    fn emit_diagnostic(&self, diagnostic: Diagnostic);
}
