// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every subcommand gathers a set of images from somewhere (a page, a list
// of URLs, a Markdown file, a crawled site) and checks whether they load.
// The options shared by all subcommands live in GlobalOpts and are
// accepted before or after the subcommand name.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use things_loaded::LoaderConfig;

#[derive(Parser, Debug)]
#[command(
    name = "things-loaded",
    version,
    about = "Checks whether the images of a page, document or URL list load",
    long_about = "things-loaded finds images (<img> elements, inline CSS background images, \
                  Markdown images) and reports which of them load and which are broken. \
                  It exits with 1 when anything is broken, which makes it handy in CI."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output results in JSON format instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    /// Log what every probe does (same as RUST_LOG=things_loaded=debug)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Seconds before a single image fetch counts as broken
    #[arg(long, global = true, default_value_t = 10)]
    pub timeout: u64,

    /// Redirects followed per image before giving up
    #[arg(long, global = true, default_value_t = 5)]
    pub max_redirects: usize,

    /// User-Agent header sent with every request
    #[arg(long, global = true)]
    pub user_agent: Option<String>,
}

impl GlobalOpts {
    /// Builds the loader settings, keeping defaults for anything not given
    pub fn loader_config(&self) -> LoaderConfig {
        let defaults = LoaderConfig::default();
        LoaderConfig {
            timeout: Duration::from_secs(self.timeout),
            max_redirects: self.max_redirects,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the images of a web page
    ///
    /// Example: things-loaded page https://example.com --selector "#gallery"
    Page {
        /// URL of the page to scan
        page_url: String,

        /// Only look inside the elements matching this CSS selector
        #[arg(long)]
        selector: Option<String>,
    },

    /// Check a list of image URLs
    ///
    /// Example: things-loaded urls https://example.com/a.png https://example.com/b.png
    Urls {
        /// Image URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Check the images referenced by a Markdown file
    ///
    /// Example: things-loaded doc README.md --base https://github.com/user/repo/raw/main/
    Doc {
        /// Path of the Markdown file
        path: PathBuf,

        /// Base URL for relative image paths
        #[arg(long)]
        base: Option<String>,
    },

    /// Crawl a website and check the images of every page
    ///
    /// Example: things-loaded site https://example.com --max-depth 2
    Site {
        /// Website URL to start from
        website_url: String,

        /// Maximum crawl depth (1 = just the starting page)
        #[arg(long, default_value_t = 1)]
        max_depth: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_with_selector() {
        let cli = Cli::parse_from([
            "things-loaded",
            "page",
            "https://example.com",
            "--selector",
            "#gallery",
            "--json",
        ]);
        assert!(cli.global.json);
        match cli.command {
            Commands::Page { page_url, selector } => {
                assert_eq!(page_url, "https://example.com");
                assert_eq!(selector.as_deref(), Some("#gallery"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_urls_requires_at_least_one() {
        assert!(Cli::try_parse_from(["things-loaded", "urls"]).is_err());
    }

    #[test]
    fn test_loader_config_from_flags() {
        let cli = Cli::parse_from([
            "things-loaded",
            "--timeout",
            "3",
            "--user-agent",
            "bot/1.0",
            "urls",
            "https://example.com/a.png",
        ]);
        let config = cli.global.loader_config();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.user_agent, "bot/1.0");
    }
}
