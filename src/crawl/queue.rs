// src/crawl/queue.rs
// =============================================================================
// Breadth-first crawl of a website, collecting the pages whose images we
// want to check.
//
// How it works:
// 1. Start with the initial URL in a queue at depth 1
// 2. Fetch the page HTML and keep it
// 3. Below the depth limit, queue every same-host link of the page
// 4. Repeat until the queue is empty
//
// Politeness:
// - A short pause between page fetches
// - Only the starting host is crawled
// =============================================================================

use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::error::{CheckError, Result};

// Pause between two page fetches
const CRAWL_DELAY: Duration = Duration::from_millis(100);

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub html: String,
}

// A page waiting in the crawl queue
#[derive(Debug)]
struct QueuedPage {
    url: Url,
    depth: usize,
}

/// Fetches one page and returns its HTML
pub async fn fetch_page(client: &Client, url: &str) -> Result<String> {
    let fetch_error = |source| CheckError::Fetch {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(fetch_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(CheckError::PageStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(fetch_error)
}

/// Crawls pages on the host of `start_url`, up to `max_depth` levels
/// (1 = only the starting page).
///
/// Pages that fail to load are logged and skipped; only an unusable
/// starting URL is an error.
pub async fn crawl_site(client: &Client, start_url: &str, max_depth: usize) -> Result<Vec<Page>> {
    let start = parse_page_url(start_url)?;
    let host = match start.host_str() {
        Some(host) => host.to_string(),
        None => {
            return Err(CheckError::InvalidUrl {
                url: start_url.to_string(),
                source: url::ParseError::EmptyHost,
            })
        }
    };

    let mut queue = VecDeque::from([QueuedPage {
        url: start,
        depth: 1,
    }]);
    let mut visited = HashSet::new();
    let mut pages = Vec::new();

    while let Some(item) = queue.pop_front() {
        if !visited.insert(item.url.clone()) {
            continue;
        }

        info!(depth = item.depth, url = %item.url, "crawling page");

        let html = match fetch_page(client, item.url.as_str()).await {
            Ok(html) => html,
            Err(error) => {
                warn!(url = %item.url, %error, "skipping page");
                continue;
            }
        };

        if item.depth < max_depth {
            for link in same_host_links(&html, &item.url, &host) {
                if !visited.contains(&link) {
                    queue.push_back(QueuedPage {
                        url: link,
                        depth: item.depth + 1,
                    });
                }
            }
        }

        pages.push(Page {
            url: item.url.to_string(),
            html,
        });

        tokio::time::sleep(CRAWL_DELAY).await;
    }

    Ok(pages)
}

fn parse_page_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| CheckError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

// Links of the page that stay on `host`, resolved and without fragments
fn same_host_links(html: &str, page_url: &Url, host: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    let anchors = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve_link(page_url, href))
        .filter(|link| matches!(link.scheme(), "http" | "https") && link.host_str() == Some(host))
        .collect()
}

// Resolves an href against the page, skipping in-page anchors and
// non-navigational schemes
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url)
}
