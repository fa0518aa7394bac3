// src/checker/set.rs
// =============================================================================
// This module checks a whole SET of resources and reports on it as a unit.
//
// How a run works:
// 1. The caller adds resources (handles, bare URLs, or a scanned HTML subtree)
// 2. run() captures the current items, subscribes to every probe's outcome,
//    then starts every probe back-to-back
// 3. One control task collects outcomes in the order they arrive and sends a
//    Progress event for each
// 4. After the last Progress event it sends exactly one Complete event:
//    Success if everything loaded, Failure if anything is broken
//
// Progress and Complete travel over the same ordered channel and are sent by
// the same task, so every progress event is seen before the completion.
//
// Rust concepts:
// - mpsc channels: Deliver events from the control task to the caller
// - FuturesUnordered: Await many futures, yielding each as it finishes
// =============================================================================

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::html;
use super::loader::LoadContext;
use super::probe::{Resource, ResourceId, ResourceProbe};
use crate::error::{CheckError, Result};

/// Aggregate result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every resource loaded
    Success,
    /// At least one resource is broken
    Failure,
}

/// Sent once per confirmed probe
#[derive(Debug, Clone)]
pub struct Progress {
    /// The probe that just confirmed
    pub probe: ResourceProbe,
    /// Probes confirmed so far in this run, this one included
    pub checked_count: usize,
    /// Number of probes in this run
    pub total: usize,
    /// Whether any probe confirmed so far is broken
    pub has_any_broken: bool,
}

/// The terminal result of a run
#[derive(Debug, Clone)]
pub struct Completion {
    pub outcome: Outcome,
    pub checked_count: usize,
    pub has_any_broken: bool,
    /// Every probe of the run, in the order they were added
    pub probes: Vec<ResourceProbe>,
}

impl Completion {
    fn new(probes: Vec<ResourceProbe>, checked_count: usize, has_any_broken: bool) -> Self {
        let outcome = if has_any_broken {
            Outcome::Failure
        } else {
            Outcome::Success
        };
        Self {
            outcome,
            checked_count,
            has_any_broken,
            probes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Probes that confirmed as broken
    pub fn broken(&self) -> impl Iterator<Item = &ResourceProbe> {
        self.probes.iter().filter(|probe| probe.loaded() == Some(false))
    }

    /// `Ok` on success, `Err` on failure; both carry the completion
    pub fn into_result(self) -> std::result::Result<Completion, Completion> {
        match self.outcome {
            Outcome::Success => Ok(self),
            Outcome::Failure => Err(self),
        }
    }
}

/// What a run reports, in order
#[derive(Debug, Clone)]
pub enum CheckEvent {
    Progress(Progress),
    Complete(Completion),
}

/// Handle to a started run
#[derive(Debug)]
pub struct CheckRun {
    events: mpsc::UnboundedReceiver<CheckEvent>,
    total: usize,
    finished: bool,
}

impl CheckRun {
    /// Number of resources this run checks
    pub fn total(&self) -> usize {
        self.total
    }

    /// The next event, or `None` once the completion has been returned
    pub async fn next_event(&mut self) -> Option<CheckEvent> {
        if self.finished {
            return None;
        }

        let event = self.events.recv().await;
        if matches!(event, Some(CheckEvent::Complete(_)) | None) {
            self.finished = true;
        }
        event
    }

    /// Calls `on_progress` for every progress event, then returns the
    /// completion.
    pub async fn for_each_progress<F>(mut self, mut on_progress: F) -> Result<Completion>
    where
        F: FnMut(&Progress),
    {
        while let Some(event) = self.next_event().await {
            match event {
                CheckEvent::Progress(progress) => on_progress(&progress),
                CheckEvent::Complete(completion) => return Ok(completion),
            }
        }
        Err(CheckError::RunInterrupted)
    }

    /// Waits for the completion, ignoring progress
    pub async fn wait(self) -> Result<Completion> {
        self.for_each_progress(|_| {}).await
    }
}

/// A set of resources checked together
#[derive(Debug)]
pub struct ResourceSetChecker {
    ctx: LoadContext,
    items: Vec<ResourceProbe>,
    seen: HashSet<ResourceId>,
}

impl ResourceSetChecker {
    pub fn new(ctx: LoadContext) -> Self {
        Self {
            ctx,
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Adds a resource handle. A handle that is already in the set (same
    /// identity, not just same source) is ignored and `false` is returned.
    pub fn add(&mut self, resource: Resource) -> bool {
        if !self.seen.insert(resource.id()) {
            debug!(source = %resource.src(), "resource already in set, skipping");
            return false;
        }
        self.items.push(ResourceProbe::new(resource));
        true
    }

    /// Adds a bare URL. Every call creates a new resource, so the same URL
    /// added twice is counted twice (and still fetched once).
    pub fn add_url(&mut self, url: impl Into<String>) {
        self.add(Resource::new(url));
    }

    /// Adds the images below the roots of an HTML document, and the
    /// background images of the roots and everything below them.
    ///
    /// Roots are the elements matching `root_selector`, or the whole
    /// document. Sources are resolved against `base_url` when given.
    /// Returns how many resources were added.
    pub fn add_from_subtree(
        &mut self,
        html: &str,
        root_selector: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<usize> {
        let resources = html::discover_in_subtree(html, root_selector, base_url)?;
        Ok(self.add_all(resources))
    }

    /// Adds one element (given as an HTML fragment): the element itself if
    /// it is an image, plus its own background image.
    pub fn add_element(&mut self, element_html: &str, base_url: Option<&str>) -> Result<usize> {
        let resources = html::discover_in_element(element_html, base_url)?;
        Ok(self.add_all(resources))
    }

    fn add_all(&mut self, resources: Vec<Resource>) -> usize {
        let mut added = 0;
        for resource in resources {
            if self.add(resource) {
                added += 1;
            }
        }
        added
    }

    pub fn items(&self) -> &[ResourceProbe] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Starts checking every resource added so far and returns immediately.
    ///
    /// Resources added afterwards are not part of this run. The work runs on
    /// the runtime of the checker's `LoadContext`.
    pub fn run(&self) -> CheckRun {
        let (events, receiver) = mpsc::unbounded_channel();
        let items = self.items.clone();
        let total = items.len();

        let run = CheckRun {
            events: receiver,
            total,
            finished: false,
        };

        if items.is_empty() {
            debug!("nothing to check, completing with success");
            // Delivered through the channel, never inline
            let _ = events.send(CheckEvent::Complete(Completion::new(items, 0, false)));
            return run;
        }

        info!(total, "checking resources");

        // Subscribe first, then start every probe without yielding in between
        let mut confirmations: FuturesUnordered<_> = items
            .iter()
            .cloned()
            .map(|probe| async move {
                let loaded = probe.confirmed().await;
                (probe, loaded)
            })
            .collect();

        for probe in &items {
            probe.check(&self.ctx);
        }

        self.ctx.spawn(async move {
            let mut checked_count = 0;
            let mut has_any_broken = false;

            while let Some((probe, loaded)) = confirmations.next().await {
                checked_count += 1;
                has_any_broken |= !loaded;

                // A dropped CheckRun just means nobody is listening anymore
                let _ = events.send(CheckEvent::Progress(Progress {
                    probe,
                    checked_count,
                    total,
                    has_any_broken,
                }));
            }

            let completion = Completion::new(items, checked_count, has_any_broken);
            info!(
                checked = completion.checked_count,
                outcome = ?completion.outcome,
                "check finished"
            );
            let _ = events.send(CheckEvent::Complete(completion));
        });

        run
    }
}

/// Preloads a list of image URLs: a checker over fresh resources for them.
#[derive(Debug)]
pub struct Preloader {
    ctx: LoadContext,
    urls: Vec<String>,
}

impl Preloader {
    pub fn new(ctx: LoadContext) -> Self {
        Self {
            ctx,
            urls: Vec::new(),
        }
    }

    pub fn add_url(&mut self, url: impl Into<String>) {
        self.urls.push(url.into());
    }

    pub fn run(&self) -> CheckRun {
        let mut checker = ResourceSetChecker::new(self.ctx.clone());
        for url in &self.urls {
            checker.add_url(url.clone());
        }
        checker.run()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is run() not async?
//    - The caller gets the CheckRun handle back immediately
//    - The work happens on a task spawned on the context's runtime; events
//      arrive on the channel
//    - This mirrors "return a promise now, resolve it later"
//
// 2. Why FuturesUnordered?
//    - It polls all the confirmation futures together
//    - .next() yields whichever finished first, so progress follows the
//      real arrival order, not the order resources were added
//
// 3. Why `let _ = events.send(...)`?
//    - send() fails only when the receiver was dropped
//    - That is not an error for us: the caller just stopped listening
// -----------------------------------------------------------------------------
