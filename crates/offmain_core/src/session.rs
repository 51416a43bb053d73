//! State that lives for exactly one build run.

use crate::pipeline::{ModuleId, PlaceholderToken};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Shared by every rewriter and finalizer of one build. Append-only.
#[derive(Debug)]
pub struct BuildSession {
    /// Stamped into every placeholder of this build.
    nonce: u64,
    worker_units: RwLock<BTreeSet<ModuleId>>,
    long_warning_shown: AtomicBool,
    esm_warning_shown: AtomicBool,
}

impl BuildSession {
    pub fn new() -> Self {
        // Low half of a v4 uuid.
        Self::with_nonce(uuid::Uuid::new_v4().as_u128() as u64)
    }

    /// Session with a fixed placeholder nonce, for reproducible output.
    pub fn with_nonce(nonce: u64) -> Self {
        Self {
            nonce,
            worker_units: RwLock::new(BTreeSet::new()),
            long_warning_shown: AtomicBool::new(false),
            esm_warning_shown: AtomicBool::new(false),
        }
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Source text standing in for `token`'s address in this session.
    pub fn placeholder(&self, token: PlaceholderToken) -> String {
        token.render(self.nonce)
    }

    /// Record `id` as the target of a worker reference. Returns `true` the
    /// first time.
    pub fn mark_worker_unit(&self, id: &ModuleId) -> bool {
        let mut units = self
            .worker_units
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        units.insert(id.clone())
    }

    pub fn is_worker_unit(&self, id: &ModuleId) -> bool {
        self.worker_units
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(id)
    }

    pub fn worker_units(&self) -> Vec<ModuleId> {
        self.worker_units
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Warning text for a worker created from a bare literal path. The first
    /// call of a session explains the problem, later calls stay short.
    pub fn legacy_form_message(&self, written: &str, canonical: &str) -> String {
        if !self.long_warning_shown.swap(true, Ordering::SeqCst) {
            format!(
                "`{written}` suggests that the Worker should be relative to the document, not the script. \
                 In the bundler, we don't know what the final document's URL will be, and instead assume \
                 it's a URL relative to the current module. This might lead to incorrect behaviour during \
                 runtime. If you did mean to use a URL relative to the current module, use `{canonical}` instead."
            )
        } else {
            format!("Treating `{written}` as `{canonical}`")
        }
    }

    /// `true` only for the first caller of the session.
    pub(crate) fn take_esm_warning(&self) -> bool {
        !self.esm_warning_shown.swap(true, Ordering::SeqCst)
    }
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}
