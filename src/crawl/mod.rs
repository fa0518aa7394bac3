// src/crawl/mod.rs
// =============================================================================
// This module fetches the pages whose images get checked.
//
// - fetch_page: one page, for `things-loaded page`
// - crawl_site: breadth-first, same-host crawl, for `things-loaded site`
// =============================================================================

mod queue;

pub use queue::{crawl_site, fetch_page, Page};
