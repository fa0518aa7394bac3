// src/checker/cache.rs
// =============================================================================
// The probe cache: remembers, per source URL, the first probe that started
// checking it.
//
// Every later probe for the same source looks the first one up and reuses
// its outcome instead of fetching again. Entries are never evicted; the
// process-wide instance grows with the number of distinct sources seen.
//
// The cache is an explicit value (cheap to clone, clones share the map).
// `ProbeCache::global()` hands out the process-wide instance, `new()` a fresh
// one, e.g. for every test case.
// =============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::trace;

use super::probe::ResourceProbe;

/// Source URL -> first probe of that source
#[derive(Clone, Default)]
pub struct ProbeCache {
    entries: Arc<Mutex<HashMap<String, ResourceProbe>>>,
}

impl ProbeCache {
    /// An empty cache, independent from every other one
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by the whole process
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ProbeCache> = OnceLock::new();
        GLOBAL.get_or_init(ProbeCache::new).clone()
    }

    /// Looks up the probe's source and registers the probe if nobody probed
    /// that source before.
    ///
    /// Returns the earlier probe to follow, or `None` when `probe` is (now)
    /// the one doing the work. Lookup and insertion happen under the same
    /// lock, so two probes can never both become the first.
    pub(crate) fn claim(&self, probe: &ResourceProbe) -> Option<ResourceProbe> {
        let mut entries = self.lock();

        match entries.get(probe.source()) {
            Some(first) if !first.same_probe(probe) => Some(first.clone()),
            Some(_) => None,
            None => {
                trace!(source = %probe.source(), "registering probe in cache");
                entries.insert(probe.source().to_string(), probe.clone());
                None
            }
        }
    }

    /// The first probe registered for `source`, if any
    pub fn get(&self, source: &str) -> Option<ResourceProbe> {
        self.lock().get(source).cloned()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.lock().contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every operation is a single insert or read), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ResourceProbe>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProbeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::probe::Resource;

    #[test]
    fn test_first_probe_registers_itself() {
        let cache = ProbeCache::new();
        let probe = ResourceProbe::new(Resource::new("a.png"));

        assert!(cache.claim(&probe).is_none());
        assert!(cache.contains("a.png"));
        assert!(cache.get("a.png").unwrap().same_probe(&probe));
    }

    #[test]
    fn test_later_probe_gets_the_first_one() {
        let cache = ProbeCache::new();
        let first = ResourceProbe::new(Resource::new("a.png"));
        let second = ResourceProbe::new(Resource::new("a.png"));

        cache.claim(&first);
        let found = cache.claim(&second).expect("first probe should be returned");

        assert!(found.same_probe(&first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_probe_does_not_follow_itself() {
        let cache = ProbeCache::new();
        let probe = ResourceProbe::new(Resource::new("a.png"));

        cache.claim(&probe);
        assert!(cache.claim(&probe).is_none());
    }

    #[test]
    fn test_fresh_caches_are_independent() {
        let one = ProbeCache::new();
        let two = ProbeCache::new();
        one.claim(&ResourceProbe::new(Resource::new("a.png")));

        assert!(two.is_empty());
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_global_is_shared() {
        let source = "https://global.test/only-in-this-test.png";
        ProbeCache::global().claim(&ResourceProbe::new(Resource::new(source)));

        assert!(ProbeCache::global().contains(source));
    }
}
