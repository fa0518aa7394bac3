// src/lib.rs
// =============================================================================
// things-loaded: find out whether a set of images has finished loading and
// whether any of them is broken.
//
// The pieces, leaves first:
// - checker::ResourceProbe: settles the outcome of ONE image source, once
// - checker::ProbeCache: shares that outcome between probes of the same source
// - checker::ResourceSetChecker: drives many probes and reports progress and
//   a single completion
//
// Around the core sit the discovery helpers (HTML subtrees, markdown), the
// HTTP loader that does the real fetching, and a small site crawler.
// =============================================================================

pub mod checker;
pub mod crawl;
pub mod error;
pub mod report;

pub use checker::{
    CheckEvent, CheckRun, Completion, HttpLoader, LoadContext, LoaderConfig, Outcome, Preloader,
    ProbeCache, ProbeState, Progress, Resource, ResourceId, ResourceLoader, ResourceProbe,
    ResourceSetChecker,
};
pub use error::{CheckError, Result};
pub use report::{ResourceReport, RunReport};
