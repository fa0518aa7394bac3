// src/checker/probe.rs
// =============================================================================
// This module settles the load outcome of a single image source.
//
// A ResourceProbe wraps one Resource (an image element snapshot, or a
// synthetic one made for a bare URL or a background image) and determines,
// exactly once, whether it loaded. It tries the cheapest signal first:
// 1. Another probe for the same source already exists -> reuse its outcome
// 2. The resource is already complete and knows its natural size -> decide now
// 3. Otherwise -> fetch the source through the ResourceLoader
//
// The outcome is published on a tokio `watch` channel. A watch channel always
// holds the latest value, so listeners that subscribe AFTER the probe was
// confirmed still see the outcome immediately.
//
// Rust concepts:
// - Arc: Probes are cheap handles; clones share the same state
// - Atomics: Hand out unique resource ids and guard against double checks
// - Spawned tasks: Run the fetch in the background without blocking check()
// - Drop guards: A fetch task that is dropped unfinished still confirms
// =============================================================================

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::loader::LoadContext;

// Source of unique resource ids for the whole process
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a resource handle.
///
/// Clones of a `Resource` share the id, so adding the same handle to a
/// checker twice can be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A visual resource to probe: the `src`, and what the runtime already
/// knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    id: ResourceId,
    src: String,
    complete: bool,
    natural_width: Option<u32>,
}

impl Resource {
    /// A resource nothing is known about yet (what a bare URL becomes)
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            id: ResourceId::next(),
            src: src.into(),
            complete: false,
            natural_width: None,
        }
    }

    /// Marks the resource as already fetched, with a known natural width.
    ///
    /// A width of 0 means the fetch finished but produced no image.
    pub fn with_natural_width(mut self, width: u32) -> Self {
        self.complete = true;
        self.natural_width = Some(width);
        self
    }

    /// Marks the resource as already fetched without a natural-size signal.
    /// Such a resource still needs a real load to be confirmed.
    pub fn marked_complete(mut self) -> Self {
        self.complete = true;
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn natural_width(&self) -> Option<u32> {
        self.natural_width
    }
}

/// Where a probe is in its life. Only ever moves Pending -> Confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeState {
    Pending,
    Confirmed { loaded: bool },
}

impl ProbeState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ProbeState::Confirmed { .. })
    }

    /// The outcome, once there is one
    pub fn loaded(&self) -> Option<bool> {
        match self {
            ProbeState::Pending => None,
            ProbeState::Confirmed { loaded } => Some(*loaded),
        }
    }
}

/// Determines whether one resource loaded. Cloning gives another handle to
/// the same probe.
#[derive(Clone)]
pub struct ResourceProbe {
    inner: Arc<ProbeInner>,
}

struct ProbeInner {
    source: String,
    reference: Resource,
    started: AtomicBool,
    state: watch::Sender<ProbeState>,
}

impl ResourceProbe {
    pub fn new(reference: Resource) -> Self {
        let (state, _) = watch::channel(ProbeState::Pending);
        Self {
            inner: Arc::new(ProbeInner {
                source: reference.src().to_string(),
                reference,
                started: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// The deduplication key: the resolved source URL
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn reference(&self) -> &Resource {
        &self.inner.reference
    }

    pub fn state(&self) -> ProbeState {
        *self.inner.state.borrow()
    }

    pub fn is_confirmed(&self) -> bool {
        self.state().is_confirmed()
    }

    /// `Some(true)` loaded, `Some(false)` broken, `None` still pending
    pub fn loaded(&self) -> Option<bool> {
        self.state().loaded()
    }

    /// True when both handles point at the same probe
    pub fn same_probe(&self, other: &ResourceProbe) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Starts determining the outcome. Never blocks: anything that needs I/O
    /// runs on a task spawned on the context's runtime.
    ///
    /// Calling it again on the same probe does nothing.
    pub fn check(&self, ctx: &LoadContext) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            trace!(source = %self.source(), "probe already started");
            return;
        }

        // 1. + 2. Reuse an earlier probe of this source, or register ourselves
        if let Some(first) = ctx.cache().claim(self) {
            debug!(source = %self.source(), "source already probed, following first probe");
            self.follow(first, ctx);
            return;
        }

        // 3. The runtime already fetched it and knows the natural size
        let reference = self.reference();
        if reference.is_complete() {
            if let Some(width) = reference.natural_width() {
                debug!(source = %self.source(), width, "resource already complete");
                self.confirm(width != 0);
                return;
            }
        }

        // 4. Load it for real. The loader's future is dropped as soon as it
        //    reports, nothing else keeps hold of it.
        let load = ctx.loader().load(self.source());
        let guard = ConfirmOnDrop(self.clone());
        ctx.spawn(async move {
            let loaded = load.await;
            guard.0.confirm(loaded);
        });
    }

    /// Waits for the outcome. Returns right away if the probe is already
    /// confirmed, however late the caller subscribes.
    pub async fn confirmed(&self) -> bool {
        let mut state = self.inner.state.subscribe();
        // The sender lives in `self.inner`, so the channel cannot close here
        let loaded = state
            .wait_for(ProbeState::is_confirmed)
            .await
            .map(|state| state.loaded().unwrap_or(false));
        loaded.unwrap_or(false)
    }

    // Relays the outcome of the first probe of this source
    fn follow(&self, first: ResourceProbe, ctx: &LoadContext) {
        if let Some(loaded) = first.loaded() {
            self.confirm(loaded);
            return;
        }

        let guard = ConfirmOnDrop(self.clone());
        ctx.spawn(async move {
            let loaded = first.confirmed().await;
            guard.0.confirm(loaded);
        });
    }

    // Records the outcome, once. Listeners are woken after the state is
    // written, so they never read a stale value.
    fn confirm(&self, loaded: bool) {
        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_confirmed() {
                return false;
            }
            *state = ProbeState::Confirmed { loaded };
            true
        });

        if changed {
            debug!(source = %self.source(), loaded, "probe confirmed");
        }
    }
}

// Confirms as broken when the task holding it goes away unconfirmed
// (runtime shutdown, panicking loader). Entries in a shared cache must
// always settle, or every later check of the same source waits forever.
// After a normal confirm this does nothing.
struct ConfirmOnDrop(ResourceProbe);

impl Drop for ConfirmOnDrop {
    fn drop(&mut self) {
        if !self.0.is_confirmed() {
            debug!(source = %self.0.source(), "fetch abandoned, confirming as broken");
            self.0.confirm(false);
        }
    }
}

impl fmt::Debug for ResourceProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceProbe")
            .field("source", &self.source())
            .field("resource", &self.reference().id())
            .field("state", &self.state())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a watch channel and not a oneshot?
//    - A oneshot has exactly one receiver and is consumed on use
//    - Many listeners want the same outcome: the checker, and every other
//      probe of the same source
//    - watch keeps the latest value, so late subscribers are covered too
//
// 2. What does send_if_modified do?
//    - It runs our closure on the current value
//    - Receivers are only woken when the closure returns true
//    - We return false once confirmed, which makes confirmation one-shot
//
// 3. Why swap(true) on an AtomicBool?
//    - swap returns the OLD value
//    - The first caller sees false and does the work, everyone after sees true
//
// 4. Why is the guard created BEFORE spawning?
//    - A spawned task that is never polled still drops what it captured
//    - Moving the guard into the task covers that case too
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::cache::ProbeCache;
    use crate::checker::testing::SpyLoader;

    fn current_thread_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn context(spy: &SpyLoader) -> LoadContext {
        LoadContext::new(spy.clone()).with_cache(ProbeCache::new())
    }

    #[tokio::test]
    async fn test_fallback_fetches_and_confirms_loaded() {
        let spy = SpyLoader::new();
        spy.succeed("https://example.com/a.png");
        let ctx = context(&spy);

        let probe = ResourceProbe::new(Resource::new("https://example.com/a.png"));
        probe.check(&ctx);

        assert!(probe.confirmed().await);
        assert_eq!(probe.state(), ProbeState::Confirmed { loaded: true });
        assert_eq!(spy.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_confirms_broken() {
        let spy = SpyLoader::new();
        spy.fail("https://example.com/missing.png");
        let ctx = context(&spy);

        let probe = ResourceProbe::new(Resource::new("https://example.com/missing.png"));
        probe.check(&ctx);

        assert!(!probe.confirmed().await);
        assert_eq!(probe.loaded(), Some(false));
    }

    #[tokio::test]
    async fn test_complete_with_natural_size_skips_fetch() {
        let spy = SpyLoader::new();
        let ctx = context(&spy);

        let probe = ResourceProbe::new(Resource::new("cached.png").with_natural_width(640));
        probe.check(&ctx);

        // Settled synchronously by check()
        assert_eq!(probe.loaded(), Some(true));
        assert_eq!(spy.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_with_zero_size_is_broken_without_fetch() {
        let spy = SpyLoader::new();
        let ctx = context(&spy);

        let probe = ResourceProbe::new(Resource::new("empty.png").with_natural_width(0));
        probe.check(&ctx);

        assert_eq!(probe.loaded(), Some(false));
        assert_eq!(spy.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_without_size_signal_still_fetches() {
        let spy = SpyLoader::new();
        spy.succeed("plain.png");
        let ctx = context(&spy);

        let probe = ResourceProbe::new(Resource::new("plain.png").marked_complete());
        probe.check(&ctx);

        assert!(probe.confirmed().await);
        assert_eq!(spy.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_same_source_is_fetched_once() {
        let spy = SpyLoader::new();
        spy.fail("shared.png");
        let gate = spy.gate("shared.png");
        let ctx = context(&spy);

        let first = ResourceProbe::new(Resource::new("shared.png"));
        let second = ResourceProbe::new(Resource::new("shared.png"));
        first.check(&ctx);
        second.check(&ctx);

        // The second probe follows the first while the fetch is in flight
        assert!(!second.is_confirmed());
        gate.notify_one();

        assert!(!first.confirmed().await);
        assert!(!second.confirmed().await);
        assert_eq!(spy.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_follower_of_confirmed_probe_settles_immediately() {
        let spy = SpyLoader::new();
        let ctx = context(&spy);

        let first = ResourceProbe::new(Resource::new("seen.png").with_natural_width(10));
        first.check(&ctx);

        let later = ResourceProbe::new(Resource::new("seen.png"));
        later.check(&ctx);

        assert_eq!(later.loaded(), Some(true));
        assert_eq!(spy.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_second_check_is_a_no_op() {
        let spy = SpyLoader::new();
        spy.succeed("twice.png");
        let ctx = context(&spy);

        let probe = ResourceProbe::new(Resource::new("twice.png"));
        probe.check(&ctx);
        probe.check(&ctx);

        assert!(probe.confirmed().await);
        assert_eq!(spy.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_outcome_is_never_overwritten() {
        let probe = ResourceProbe::new(Resource::new("once.png"));
        probe.confirm(true);
        probe.confirm(false);

        assert_eq!(probe.loaded(), Some(true));
    }

    #[test]
    fn test_fetch_dropped_with_its_runtime_does_not_stall_later_checks() {
        let spy = SpyLoader::new();
        spy.succeed("s.png");
        let _gate = spy.gate("s.png");
        let cache = ProbeCache::new();

        // The fetch is still waiting on its gate when the runtime goes away
        let first_runtime = current_thread_runtime();
        let ctx = LoadContext::with_runtime(spy.clone(), first_runtime.handle().clone())
            .with_cache(cache.clone());
        let first = ResourceProbe::new(Resource::new("s.png"));
        first.check(&ctx);
        drop(first_runtime);

        assert_eq!(first.loaded(), Some(false));

        let second_runtime = current_thread_runtime();
        let ctx = LoadContext::with_runtime(spy.clone(), second_runtime.handle().clone())
            .with_cache(cache);
        let mut checker = crate::checker::ResourceSetChecker::new(ctx);
        checker.add_url("s.png");
        let run = checker.run();

        let done = second_runtime
            .block_on(async {
                tokio::time::timeout(std::time::Duration::from_secs(2), run.wait()).await
            })
            .expect("second run should not hang")
            .unwrap();

        assert_eq!(done.checked_count, 1);
        assert!(done.has_any_broken);
        assert_eq!(spy.fetch_count(), 1);
    }

    #[test]
    fn test_clones_share_resource_identity() {
        let resource = Resource::new("a.png");
        let copy = resource.clone();
        let other = Resource::new("a.png");

        assert_eq!(resource.id(), copy.id());
        assert_ne!(resource.id(), other.id());
    }
}
