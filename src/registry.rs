//! Live strategy registry and atomic reload publication.
//!
//! # Responsibilities
//! - Hold the name → strategy table built by one successful load
//! - Serve lock-free lookups from request-path threads
//! - Swap in a freshly built table without disturbing in-flight readers
//!
//! # Design Decisions
//! - A registry is immutable once built; reload builds a new one
//! - `SharedRegistry::current()` hands out an `Arc` snapshot, so a reader
//!   keeps a consistent view even if a publish lands mid-request; the old
//!   table is freed when its last reader drops
//! - A failed reload never reaches `publish`, leaving the live table intact
//! - Lookups record the strategy's registration-order index on the handle
//!   for diagnostics

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::strategy::Strategy;

/// Insertion-ordered table of strategies from one load.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<Strategy>>,
    by_name: HashMap<String, usize>,
    loaded: bool,
}

impl StrategyRegistry {
    /// An empty registry in the "not loaded" state: the document was
    /// absent or unusable. Lookups log and return None. This is a
    /// legitimate runtime state, the proxy may run with zero strategies.
    pub fn not_loaded() -> Self {
        Self::default()
    }

    /// An empty registry from a successful load of an empty document.
    pub fn empty() -> Self {
        Self {
            loaded: true,
            ..Self::default()
        }
    }

    /// Whether a document was successfully loaded into this registry.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Whether a strategy with this name is already registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Register a strategy. Returns false (and registers nothing) if the
    /// name is already taken.
    pub(crate) fn insert(&mut self, strategy: Strategy) -> bool {
        if self.contains(strategy.name()) {
            return false;
        }
        let idx = self.strategies.len();
        self.by_name.insert(strategy.name().to_string(), idx);
        self.strategies.push(Arc::new(strategy));
        true
    }

    /// Find a strategy by name. The handle carries the registration-order
    /// index of the match.
    pub fn lookup(&self, name: &str) -> Option<StrategyHandle> {
        if !self.loaded {
            tracing::error!(
                strategy = name,
                "no strategy configurations were loaded, lookup cannot succeed"
            );
            return None;
        }
        let idx = *self.by_name.get(name)?;
        Some(StrategyHandle {
            strategy: self.strategies[idx].clone(),
            index: idx,
        })
    }

    /// Registered strategies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Strategy>> {
        self.strategies.iter()
    }

    /// Strategy names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|s| s.name())
    }
}

/// A shared reference to one registered strategy, valid for as long as
/// the caller holds it, reloads included.
#[derive(Debug, Clone)]
pub struct StrategyHandle {
    strategy: Arc<Strategy>,
    index: usize,
}

impl StrategyHandle {
    /// Position of this strategy in registration order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for StrategyHandle {
    type Target = Strategy;

    fn deref(&self) -> &Self::Target {
        &self.strategy
    }
}

/// The single live registry, swappable without locking readers.
#[derive(Debug)]
pub struct SharedRegistry {
    inner: ArcSwap<StrategyRegistry>,
}

impl SharedRegistry {
    pub fn new(initial: StrategyRegistry) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// Snapshot of whatever registry is live right now. Safe to keep for
    /// the duration of a request; a concurrent publish cannot invalidate
    /// the snapshot.
    pub fn current(&self) -> Arc<StrategyRegistry> {
        self.inner.load_full()
    }

    /// Atomically replace the live registry. The previous one is dropped
    /// once its last reader releases it.
    pub fn publish(&self, registry: StrategyRegistry) {
        let count = registry.len();
        self.inner.store(Arc::new(registry));
        tracing::info!(strategies = count, "published new strategy registry");
    }

    /// Convenience lookup against the current snapshot.
    pub fn lookup(&self, name: &str) -> Option<StrategyHandle> {
        self.current().lookup(name)
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(StrategyRegistry::not_loaded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::{Host, HostGroup};
    use crate::strategy::round_robin::FirstLive;
    use crate::strategy::{PolicyKind, RequestContext};

    fn strategy(name: &str) -> Strategy {
        let group = HostGroup::new(vec![Arc::new(Host::new("origin", 8080))]);
        Strategy::new(name, PolicyKind::FirstLive, vec![(group, Box::new(FirstLive))])
    }

    fn loaded_registry(names: &[&str]) -> StrategyRegistry {
        let mut reg = StrategyRegistry::empty();
        for name in names {
            assert!(reg.insert(strategy(name)));
        }
        reg
    }

    #[test]
    fn test_lookup_records_registration_index() {
        let reg = loaded_registry(&["alpha", "beta", "gamma"]);
        assert_eq!(reg.lookup("alpha").unwrap().index(), 0);
        assert_eq!(reg.lookup("gamma").unwrap().index(), 2);
        assert!(reg.lookup("delta").is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected_first_wins() {
        let mut reg = StrategyRegistry::empty();
        assert!(reg.insert(strategy("primary")));
        assert!(!reg.insert(strategy("primary")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_not_loaded_lookup_is_none() {
        let reg = StrategyRegistry::not_loaded();
        assert!(!reg.is_loaded());
        assert!(reg.lookup("anything").is_none());
    }

    #[test]
    fn test_publish_swaps_without_invalidating_readers() {
        let shared = SharedRegistry::new(loaded_registry(&["old"]));

        // an in-flight reader holds a snapshot across the publish
        let snapshot = shared.current();
        let handle = snapshot.lookup("old").unwrap();

        shared.publish(loaded_registry(&["new"]));

        // new lookups see the new table
        assert!(shared.lookup("old").is_none());
        assert!(shared.lookup("new").is_some());

        // the old handle still selects
        let picked = handle.select(&RequestContext::default()).unwrap();
        assert_eq!(picked.name, "origin");
    }

    #[test]
    fn test_default_shared_registry_is_not_loaded() {
        let shared = SharedRegistry::default();
        assert!(!shared.current().is_loaded());
    }
}
