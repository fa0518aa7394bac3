// src/checker/html.rs
// =============================================================================
// This module finds the images inside an HTML document.
//
// Two kinds of images are collected:
// - <img> elements below the chosen root elements
// - CSS background images set inline (style="background-image: url(...)")
//   on the roots themselves or on anything below them
//
// We use the `scraper` crate to parse HTML and match the root selector, the
// `regex` crate to pull the URL out of a `url(...)` value, and the `url`
// crate to resolve relative sources against the page URL.
//
// Only inline styles are read: there is no stylesheet cascade here.
// =============================================================================

use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use super::probe::Resource;
use crate::error::{CheckError, Result};

// Matches the first url(...) at the start of a background-image value.
// Quoted URLs may contain ')' so they get their own alternatives.
fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^url\(\s*(?:"([^"]*)"|'([^']*)'|([^)]*?))\s*\)"#)
            .expect("background url pattern is valid")
    })
}

/// Finds the images of the subtrees rooted at the elements matching
/// `root_selector` (or at the document root when there is none).
///
/// Returns `<img>` resources first, then background images, each in
/// document order. An element is only visited once per call even when
/// roots are nested.
pub fn discover_in_subtree(
    html: &str,
    root_selector: Option<&str>,
    base_url: Option<&str>,
) -> Result<Vec<Resource>> {
    let base = parse_base(base_url)?;
    let document = Html::parse_document(html);

    let roots: Vec<ElementRef> = match root_selector {
        Some(selector) => {
            let selector = Selector::parse(selector).map_err(|err| CheckError::InvalidSelector {
                selector: selector.to_string(),
                reason: format!("{:?}", err),
            })?;
            document.select(&selector).collect()
        }
        None => vec![document.root_element()],
    };

    let mut resources = Vec::new();

    // <img> elements strictly below each root
    let mut seen_images = HashSet::new();
    for root in &roots {
        for element in root.descendants().skip(1).filter_map(ElementRef::wrap) {
            if seen_images.insert(element.id()) {
                if let Some(resource) = image_resource(element.value(), base.as_ref()) {
                    resources.push(resource);
                }
            }
        }
    }

    // Background images on each root and everything below it
    let mut seen_backgrounds = HashSet::new();
    for root in &roots {
        for element in root.descendants().filter_map(ElementRef::wrap) {
            if seen_backgrounds.insert(element.id()) {
                if let Some(resource) = background_resource(element.value(), base.as_ref()) {
                    resources.push(resource);
                }
            }
        }
    }

    Ok(resources)
}

/// Finds the images of a single element given as an HTML fragment: the
/// element itself when it is an `<img>`, plus its own background image.
/// Children are not looked at.
pub fn discover_in_element(element_html: &str, base_url: Option<&str>) -> Result<Vec<Resource>> {
    let base = parse_base(base_url)?;
    let fragment = Html::parse_fragment(element_html);

    let element = match fragment
        .root_element()
        .children()
        .find_map(ElementRef::wrap)
    {
        Some(element) => element,
        None => return Ok(Vec::new()),
    };

    let resources = image_resource(element.value(), base.as_ref())
        .into_iter()
        .chain(background_resource(element.value(), base.as_ref()))
        .collect();

    Ok(resources)
}

/// Extracts the URL from a `background-image` value.
///
/// Only values starting with `url(` count; `none`, gradients and the like
/// give `None`. With several comma separated images, the first one wins.
///
/// Example: `url("hero.jpg"), url(fallback.jpg)` -> `hero.jpg`
pub fn background_image_url(value: &str) -> Option<String> {
    let captures = url_pattern().captures(value.trim())?;
    let url = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?
        .as_str()
        .trim();

    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

// An <img> with a non-empty src becomes a resource
fn image_resource(element: &Element, base: Option<&Url>) -> Option<Resource> {
    if element.name() != "img" {
        return None;
    }
    let src = element.attr("src")?;
    resolve_source(base, src).map(Resource::new)
}

fn background_resource(element: &Element, base: Option<&Url>) -> Option<Resource> {
    let value = inline_background_image(element)?;
    let url = background_image_url(value)?;
    resolve_source(base, &url).map(Resource::new)
}

// The style reader: the last background-image declaration of the inline
// style attribute
fn inline_background_image(element: &Element) -> Option<&str> {
    let style = element.attr("style")?;

    split_declarations(style)
        .into_iter()
        .filter_map(|declaration| declaration.split_once(':'))
        .filter(|(property, _)| property.trim().eq_ignore_ascii_case("background-image"))
        .map(|(_, value)| value.trim())
        .last()
}

// Splits a style attribute on ';', except inside quotes or parentheses
// (data: URLs contain semicolons)
fn split_declarations(style: &str) -> Vec<&str> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                declarations.push(&style[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    declarations.push(&style[start..]);

    declarations
}

fn parse_base(base_url: Option<&str>) -> Result<Option<Url>> {
    base_url
        .map(|url| {
            Url::parse(url).map_err(|source| CheckError::InvalidUrl {
                url: url.to_string(),
                source,
            })
        })
        .transpose()
}

// Resolves a possibly-relative source against the base URL.
//
// Without a base the source is kept as written. Empty sources are dropped.
//
// Examples (base = "https://example.com/gallery/"):
//   "x.png"                  -> "https://example.com/gallery/x.png"
//   "/img/y.png"             -> "https://example.com/img/y.png"
//   "https://cdn.test/z.png" -> "https://cdn.test/z.png"
pub(crate) fn resolve_source(base: Option<&Url>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let base = match base {
        Some(base) => base,
        None => return Some(raw.to_string()),
    };

    match Url::parse(raw) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.join(raw).ok().map(|url| url.to_string()),
    }
}
