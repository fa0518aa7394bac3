// src/checker/loader.rs
// =============================================================================
// The seam between the checker core and whatever actually fetches images.
//
// - ResourceLoader: "given a source, tell me eventually whether it loaded"
// - LoadContext: the loader, the shared cache, and the runtime that all
//   background load work is spawned on
//
// The real loader is HttpLoader (see http.rs). Tests plug in a spy loader
// that counts fetches and scripts outcomes.
// =============================================================================

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::cache::ProbeCache;
use crate::error::{CheckError, Result};

/// Fetches a resource and reports whether it loaded.
///
/// The returned future must eventually resolve: `true` for a successful
/// load, `false` for anything else (error status, transport failure, bad
/// URL). There is no separate error channel.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, source: &str) -> BoxFuture<'static, bool>;
}

/// Everything a probe needs to run: where to look up earlier probes, how
/// to fetch, and where to spawn.
#[derive(Clone)]
pub struct LoadContext {
    cache: ProbeCache,
    loader: Arc<dyn ResourceLoader>,
    runtime: Handle,
}

impl LoadContext {
    /// Uses the process-wide cache and the current tokio runtime.
    ///
    /// Panics when called outside a runtime; see `try_new` and
    /// `with_runtime` for the alternatives.
    pub fn new(loader: impl ResourceLoader + 'static) -> Self {
        Self::with_runtime(loader, Handle::current())
    }

    /// Like `new`, but reports a missing runtime as an error
    pub fn try_new(loader: impl ResourceLoader + 'static) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CheckError::NoRuntime)?;
        Ok(Self::with_runtime(loader, runtime))
    }

    /// Spawns load work on the given runtime; usable from outside it
    pub fn with_runtime(loader: impl ResourceLoader + 'static, runtime: Handle) -> Self {
        Self {
            cache: ProbeCache::global(),
            loader: Arc::new(loader),
            runtime,
        }
    }

    /// Replaces the cache, e.g. with `ProbeCache::new()` for isolation
    pub fn with_cache(mut self, cache: ProbeCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    pub fn loader(&self) -> &dyn ResourceLoader {
        self.loader.as_ref()
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Nobody joins these tasks; results travel through the watch channels
        drop(self.runtime.spawn(task));
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
