//! Keyed de-duplication of asynchronous computations
//!
//! Every key maps to exactly one computation. The first caller installs it,
//! every later caller (concurrent or not) receives a handle to the same
//! in-flight or completed result. Entries are never evicted.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

/// Handle to a computation stored in a [`OnceMap`]. Cloning is cheap and all
/// clones observe the same output.
pub type Pending<V> = Shared<BoxFuture<'static, V>>;

pub struct OnceMap<K, V>
where
    V: Clone,
{
    entries: Mutex<HashMap<K, Pending<V>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the computation registered under `key`, installing the one
    /// produced by `init` when the key is absent.
    ///
    /// The boolean is `true` when this call installed the entry. `init` runs
    /// under the map lock and must not touch the map itself; it should only
    /// build the (lazy) future.
    pub fn get_or_insert_with<F, Fut>(&self, key: K, init: F) -> (Pending<V>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&key) {
            return (existing.clone(), false);
        }
        let pending = init().boxed().shared();
        entries.insert(key, pending.clone());
        (pending, true)
    }

    /// Install `fut` under `key` unless an entry exists. Returns the new
    /// handle, or `None` when the key was already taken.
    pub fn insert_if_absent<Fut>(&self, key: K, fut: Fut) -> Option<Pending<V>>
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let (pending, inserted) = self.get_or_insert_with(key, move || fut);
        inserted.then_some(pending)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Pending<V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().contains_key(key)
    }

    /// Output of a finished computation, `None` while still pending or absent.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().get(key).and_then(|pending| pending.peek().cloned())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Pending<V>>> {
        // A panic while holding the lock cannot leave the map half-written:
        // every mutation is a single insert.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
