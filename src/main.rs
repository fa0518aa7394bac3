// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing) on stderr
// 3. Gather images for the chosen subcommand and run a checker over them
// 4. Print progress as images settle, then a table or JSON report
// 5. Exit with proper code (0 = all loaded, 1 = broken images, 2 = error)
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, GlobalOpts};
use things_loaded::checker::extract_markdown_images;
use things_loaded::crawl;
use things_loaded::{
    CheckEvent, CheckRun, HttpLoader, LoadContext, Preloader, ResourceSetChecker, RunReport,
};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let loader = HttpLoader::new(&cli.global.loader_config())?;

    let reports = match &cli.command {
        Commands::Page { page_url, selector } => {
            vec![handle_page(&loader, page_url, selector.as_deref(), &cli.global).await?]
        }
        Commands::Urls { urls } => vec![handle_urls(&loader, urls, &cli.global).await?],
        Commands::Doc { path, base } => {
            vec![handle_doc(&loader, path, base.as_deref(), &cli.global).await?]
        }
        Commands::Site { website_url, max_depth } => {
            handle_site(&loader, website_url, *max_depth, &cli.global).await?
        }
    };

    print_reports(&reports, cli.global.json)?;

    if reports.iter().any(|report| report.has_any_broken) {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Logs go to stderr so --json output on stdout stays parseable.
// RUST_LOG wins over --verbose when both are set.
fn init_logging(verbose: bool) {
    let default_directive = if verbose { "things_loaded=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// Handles the 'page' subcommand: fetch one page, check its images
async fn handle_page(
    loader: &HttpLoader,
    page_url: &str,
    selector: Option<&str>,
    opts: &GlobalOpts,
) -> Result<RunReport> {
    announce(opts, &format!("🔍 Scanning page: {}", page_url));

    let html = crawl::fetch_page(loader.client(), page_url).await?;

    let mut checker = ResourceSetChecker::new(LoadContext::new(loader.clone()));
    checker
        .add_from_subtree(&html, selector, Some(page_url))
        .with_context(|| format!("Could not scan {}", page_url))?;

    drive(checker.run(), Some(page_url.to_string()), opts).await
}

// Handles the 'urls' subcommand: check a plain list of image URLs
async fn handle_urls(loader: &HttpLoader, urls: &[String], opts: &GlobalOpts) -> Result<RunReport> {
    let mut preloader = Preloader::new(LoadContext::new(loader.clone()));
    for url in urls {
        preloader.add_url(url.clone());
    }

    drive(preloader.run(), None, opts).await
}

// Handles the 'doc' subcommand: check the images of a Markdown file
async fn handle_doc(
    loader: &HttpLoader,
    path: &std::path::Path,
    base: Option<&str>,
    opts: &GlobalOpts,
) -> Result<RunReport> {
    announce(opts, &format!("📄 Scanning document: {}", path.display()));

    let markdown = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    let images = extract_markdown_images(&markdown, base)?;

    let mut checker = ResourceSetChecker::new(LoadContext::new(loader.clone()));
    for image in images {
        checker.add_url(image);
    }

    drive(checker.run(), Some(path.display().to_string()), opts).await
}

// Handles the 'site' subcommand: crawl, then one checker per page.
// All checkers share one context, so an image used on many pages is only
// fetched once.
async fn handle_site(
    loader: &HttpLoader,
    website_url: &str,
    max_depth: usize,
    opts: &GlobalOpts,
) -> Result<Vec<RunReport>> {
    announce(opts, &format!("🔍 Scanning website: {} (max depth {})", website_url, max_depth));

    let pages = crawl::crawl_site(loader.client(), website_url, max_depth).await?;
    announce(opts, &format!("📄 Crawled {} page(s)", pages.len()));

    let ctx = LoadContext::new(loader.clone());
    let mut reports = Vec::new();
    for page in &pages {
        let mut checker = ResourceSetChecker::new(ctx.clone());
        checker
            .add_from_subtree(&page.html, None, Some(&page.url))
            .with_context(|| format!("Could not scan {}", page.url))?;

        announce(opts, &format!("\n🌐 {}", page.url));
        reports.push(drive(checker.run(), Some(page.url.clone()), opts).await?);
    }

    Ok(reports)
}

// Consumes a run, printing a line per settled image unless output is JSON
async fn drive(mut run: CheckRun, origin: Option<String>, opts: &GlobalOpts) -> Result<RunReport> {
    announce(opts, &format!("🖼️  Checking {} image(s)...\n", run.total()));

    while let Some(event) = run.next_event().await {
        match event {
            CheckEvent::Progress(progress) => {
                if !opts.json {
                    let mark = match progress.probe.loaded() {
                        Some(true) => "✅",
                        _ => "❌",
                    };
                    println!(
                        "   [{}/{}] {} {}",
                        progress.checked_count,
                        progress.total,
                        mark,
                        progress.probe.source()
                    );
                }
            }
            CheckEvent::Complete(completion) => {
                return Ok(RunReport::new(origin, &completion));
            }
        }
    }

    Err(things_loaded::CheckError::RunInterrupted.into())
}

fn announce(opts: &GlobalOpts, message: &str) {
    if !opts.json {
        println!("{}", message);
    }
}

fn print_reports(reports: &[RunReport], json: bool) -> Result<()> {
    if json {
        // A single run prints an object, a site scan an array of them
        let json_output = match reports {
            [report] => serde_json::to_string_pretty(report)?,
            _ => serde_json::to_string_pretty(reports)?,
        };
        println!("{}", json_output);
    } else {
        println!();
        for report in reports {
            print_table(report);
        }
    }
    Ok(())
}

fn print_table(report: &RunReport) {
    if let Some(origin) = &report.origin {
        println!("📍 {}", origin);
    }
    println!("{:<80} {:<12}", "IMAGE", "STATUS");
    println!("{}", "=".repeat(92));

    for resource in &report.resources {
        let status = match resource.loaded {
            Some(true) => "✅ LOADED",
            Some(false) => "❌ BROKEN",
            None => "⏳ PENDING",
        };

        // Truncate long sources (data: URLs especially) on a char boundary
        let source = if resource.source.chars().count() > 77 {
            let short: String = resource.source.chars().take(77).collect();
            format!("{}...", short)
        } else {
            resource.source.clone()
        };

        println!("{:<80} {:<12}", source, status);
    }

    println!();
    println!("📊 Summary:");
    println!("   ✅ Loaded: {}", report.loaded_count());
    println!("   ❌ Broken: {}", report.broken_count());
    println!("   📋 Total: {}", report.resources.len());
    println!();
}
