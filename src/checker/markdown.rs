// src/checker/markdown.rs
// =============================================================================
// This module extracts image URLs from Markdown text.
//
// We use the `pulldown-cmark` crate which:
// - Parses Markdown into events (heading, paragraph, link, image, etc.)
// - Follows the CommonMark specification
// - Handles reference-style images ([alt][ref]) for us
//
// Only images (![alt](url)) are collected; plain links are not resources.
// =============================================================================

use pulldown_cmark::{Event, Parser, Tag};
use url::Url;

use super::html::resolve_source;
use crate::error::{CheckError, Result};

// Extracts all image destinations from Markdown text
//
// Relative destinations are resolved against `base_url` when one is given,
// and kept as written otherwise.
//
// Example:
//   "![logo](img/logo.png)" with base "https://example.com/docs/"
//   -> ["https://example.com/docs/img/logo.png"]
pub fn extract_markdown_images(markdown: &str, base_url: Option<&str>) -> Result<Vec<String>> {
    let base = base_url
        .map(|url| {
            Url::parse(url).map_err(|source| CheckError::InvalidUrl {
                url: url.to_string(),
                source,
            })
        })
        .transpose()?;

    let images = Parser::new(markdown)
        .filter_map(|event| match event {
            // In pulldown-cmark 0.9, Image is Tag::Image(link_type, dest_url, title)
            Event::Start(Tag::Image(_link_type, dest_url, _title)) => {
                resolve_source(base.as_ref(), &dest_url)
            }
            _ => None,
        })
        .collect();

    Ok(images)
}
