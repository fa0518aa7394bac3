// src/checker/mod.rs
// =============================================================================
// This module contains the image load checking logic.
//
// Submodules:
// - probe: settles whether ONE resource loaded (ResourceProbe)
// - cache: shares outcomes between probes of the same source (ProbeCache)
// - loader: the ResourceLoader seam and the LoadContext handed to probes
// - set: checks a set of resources, reports progress and completion
// - http: the reqwest-backed loader
// - html: finds images and background images in HTML subtrees
// - markdown: finds images in Markdown documents
// =============================================================================

mod cache;
mod html;
mod http;
mod loader;
mod markdown;
mod probe;
mod set;

#[cfg(test)]
mod testing;

pub use cache::ProbeCache;
pub use html::{background_image_url, discover_in_element, discover_in_subtree};
pub use http::{HttpLoader, LoaderConfig};
pub use loader::{LoadContext, ResourceLoader};
pub use markdown::extract_markdown_images;
pub use probe::{ProbeState, Resource, ResourceId, ResourceProbe};
pub use set::{CheckEvent, CheckRun, Completion, Outcome, Preloader, Progress, ResourceSetChecker};
