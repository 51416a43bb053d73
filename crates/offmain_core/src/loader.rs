//! Runtime module loading inside one execution context.
//!
//! A [`Loader`] is the Rust model of the bootstrap in [`crate::runtime`]: it
//! owns the registry of one main thread or worker, fetches each unit at most
//! once, and runs every factory after all of its dependencies are ready.
//! How a unit is actually fetched and executed is up to the [`Host`].

use cache::{OnceMap, Pending};
use futures::future::{self, try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Module {address} didn't register its module")]
    NotRegistered { address: String },
    #[error("failed to fetch {address}: {reason}")]
    Fetch { address: String, reason: String },
}

type LoadResult = Result<Arc<Exports>, LoadError>;

/// What a unit exposes to its dependants.
#[derive(Debug, Default)]
pub struct Exports {
    default: OnceLock<Value>,
    named: Mutex<BTreeMap<String, Value>>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    /// The factory's return value, once it has run.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.get()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.named
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.named
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }
}

/// A resolved dependency as handed to a factory.
#[derive(Clone)]
pub enum Dependency {
    Module(Arc<Exports>),
    /// The `require` dependency: the loader itself, for on-demand loading.
    Require(Loader),
}

impl Dependency {
    pub fn exports(&self) -> Option<&Arc<Exports>> {
        match self {
            Dependency::Module(exports) => Some(exports),
            Dependency::Require(_) => None,
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Module(exports) => f.debug_tuple("Module").field(exports).finish(),
            Dependency::Require(_) => f.write_str("Require"),
        }
    }
}

pub type Factory = Box<dyn FnOnce(Vec<Dependency>) -> Value + Send>;

/// Result of [`Loader::require`]: one name gives the bare exports, several
/// give them in request order.
#[derive(Debug, Clone)]
pub enum Required {
    One(Arc<Exports>),
    Many(Vec<Arc<Exports>>),
}

impl Required {
    pub fn into_vec(self) -> Vec<Arc<Exports>> {
        match self {
            Required::One(exports) => vec![exports],
            Required::Many(all) => all,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    /// Main thread: units arrive through injected script elements.
    Document,
    /// Worker: units arrive through a synchronous script import.
    Worker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    Unrequested,
    Loading,
    DeclaredPendingDeps,
    Ready,
    Failed,
}

/// The execution environment a loader runs in. Fetch methods run the
/// unit's code, which is expected to call [`Loader::define`].
pub trait Host: Send + Sync + 'static {
    /// Append a script element and complete on its load signal.
    fn inject_script(&self, loader: &Loader, address: &str) -> BoxFuture<'static, Result<(), String>>;

    /// Synchronous in-context import.
    fn import_scripts(&self, loader: &Loader, address: &str) -> Result<(), String>;

    fn fetch_text(&self, address: &str) -> BoxFuture<'static, Result<String, String>> {
        let reason = format!("text fetch is not available for {address}");
        future::ready(Err(reason)).boxed()
    }

    fn evaluate(&self, loader: &Loader, address: &str, code: &str) -> Result<(), String> {
        let _ = (loader, code);
        Err(format!("evaluation is not available for {address}"))
    }
}

struct LoaderInner {
    kind: ContextKind,
    use_eval: bool,
    host: Arc<dyn Host>,
    /// address -> outcome of the first request
    registry: OnceMap<String, LoadResult>,
    /// unit name -> outcome of its declaration
    declared: OnceMap<String, LoadResult>,
}

/// Registry of one execution context. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("kind", &self.inner.kind)
            .field("use_eval", &self.inner.use_eval)
            .field("requested", &self.inner.registry.len())
            .field("declared", &self.inner.declared.len())
            .finish()
    }
}

impl Loader {
    pub fn new(kind: ContextKind, host: Arc<dyn Host>) -> Self {
        Self::with_eval(kind, host, false)
    }

    pub fn with_eval(kind: ContextKind, host: Arc<dyn Host>, use_eval: bool) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                kind,
                use_eval,
                host,
                registry: OnceMap::new(),
                declared: OnceMap::new(),
            }),
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    /// Register a unit. A name that was already declared is ignored and
    /// `false` is returned.
    pub fn define<S: AsRef<str>>(&self, name: &str, deps: &[S], factory: Factory) -> bool {
        let deps: Vec<String> = deps.iter().map(|dep| dep.as_ref().to_string()).collect();
        let loader = self.clone();
        let definition = async move {
            let exports = Arc::new(Exports::new());
            let resolved = try_join_all(deps.iter().map(|dep| loader.dependency(dep, &exports))).await?;
            let value = factory(resolved);
            // The factory runs once per declaration, so this is the only write.
            let _ = exports.default.set(value);
            Ok(exports)
        };

        match self.inner.declared.insert_if_absent(name.to_string(), definition) {
            Some(pending) => {
                tracing::debug!(unit = name, "declared");
                drive(&pending);
                true
            }
            None => {
                tracing::debug!(unit = name, "already declared, ignoring");
                false
            }
        }
    }

    /// Load one unit. Every request for the same address shares one fetch.
    pub fn require_one(&self, address: &str) -> Pending<LoadResult> {
        let loader = self.clone();
        let target = address.to_string();
        let (pending, started) = self
            .inner
            .registry
            .get_or_insert_with(address.to_string(), move || async move { loader.load(&target).await });
        if started {
            tracing::debug!(address, "requested");
            drive(&pending);
        }
        pending
    }

    pub async fn require<S: AsRef<str>>(&self, names: &[S]) -> Result<Required, LoadError> {
        let mut modules = try_join_all(names.iter().map(|name| self.require_one(name.as_ref()))).await?;
        if modules.len() == 1 {
            Ok(Required::One(modules.remove(0)))
        } else {
            Ok(Required::Many(modules))
        }
    }

    pub fn state(&self, address: &str) -> UnitState {
        let inner = &self.inner;
        match inner.declared.peek(address) {
            Some(Ok(_)) => return UnitState::Ready,
            Some(Err(_)) => return UnitState::Failed,
            None if inner.declared.contains_key(address) => return UnitState::DeclaredPendingDeps,
            None => {}
        }
        match inner.registry.peek(address) {
            Some(Err(_)) => UnitState::Failed,
            Some(Ok(_)) => UnitState::Ready,
            None if inner.registry.contains_key(address) => UnitState::Loading,
            None => UnitState::Unrequested,
        }
    }

    fn dependency(&self, name: &str, exports: &Arc<Exports>) -> BoxFuture<'static, Result<Dependency, LoadError>> {
        match name {
            "exports" => future::ready(Ok(Dependency::Module(exports.clone()))).boxed(),
            "require" => future::ready(Ok(Dependency::Require(self.clone()))).boxed(),
            address => self
                .require_one(address)
                .map(|result| result.map(Dependency::Module))
                .boxed(),
        }
    }

    async fn load(&self, address: &str) -> LoadResult {
        if !self.inner.declared.contains_key(address) {
            self.fetch(address).await.map_err(|reason| LoadError::Fetch {
                address: address.to_string(),
                reason,
            })?;
        }
        let Some(definition) = self.inner.declared.get(address) else {
            tracing::warn!(address, "fetched unit did not register itself");
            return Err(LoadError::NotRegistered {
                address: address.to_string(),
            });
        };
        definition.await
    }

    async fn fetch(&self, address: &str) -> Result<(), String> {
        let host = &self.inner.host;
        if self.inner.use_eval {
            let code = host.fetch_text(address).await?;
            return host.evaluate(self, address, &code);
        }
        match self.inner.kind {
            ContextKind::Document => host.inject_script(self, address).await,
            ContextKind::Worker => host.import_scripts(self, address),
        }
    }
}

/// Start `pending` eagerly when a runtime is available, so declarations and
/// fetches make progress even before anyone awaits them.
fn drive(pending: &Pending<LoadResult>) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(pending.clone().map(|_| ()));
    }
}
