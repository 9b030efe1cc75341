// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and set up logging
// 2. Load the credentials and log in through CAS
// 3. Either print the course list (--list) or mirror the requested terms
// 4. Exit with proper code (0 = success, 1 = some items failed, 2 = error)
//
// Logs go to stderr; stdout only carries the report, so `--json` output can
// be piped straight into another tool.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;           // src/cli.rs - command-line parsing
mod config;        // src/config.rs - credentials and portal settings
mod crawl;         // src/crawl/ - walks the tree and builds the report
mod download;      // src/download/ - streams files to disk
mod error;         // src/error.rs - the error taxonomy
mod mirror;        // src/mirror.rs - the on-disk layout
mod portal;        // src/portal/ - markup extractors and content records
mod session;       // src/session/ - HTTP transport and CAS login

#[cfg(test)]
mod testutil;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;
use config::AppConfig;
use crawl::{CrawlReport, Crawler};
use mirror::Mirror;
use portal::{list_courses, VaultIndex};
use session::{AuthSession, TransportClient};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            error!(error = %format!("{:#}", e), "fatal");
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins; otherwise -v picks our own level and dependencies stay at warn
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,bb_vault={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

// Returns:
//   Ok(0) = everything mirrored
//   Ok(1) = finished, but some courses/pages/files were skipped
//   Err   = fatal (bad config, login failed, course list unreadable)
async fn run(cli: Cli) -> Result<i32> {
    let config = AppConfig::load(&cli.config)?;
    let portal = config
        .portal
        .with_timeout(Duration::from_secs(cli.timeout.max(1)));

    let client = TransportClient::new(portal).context("Failed to build HTTP client")?;
    let session = AuthSession::new(client)
        .login(&config.credential)
        .await
        .context("Login failed")?;

    if cli.list {
        let vault = list_courses(&session)
            .await
            .context("Could not read the course list")?;
        print_vault(&vault, cli.json)?;
        return Ok(0);
    }

    let crawler = Crawler::new(&session, Mirror::new(&cli.output)).with_jobs(cli.jobs);
    let report = crawler
        .run(&cli.terms)
        .await
        .context("Crawl aborted")?;

    print_report(&report, cli.json)?;

    if report.has_failures() {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn print_vault(vault: &VaultIndex, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(vault)?);
        return Ok(());
    }

    for (term, courses) in vault.iter() {
        println!("📅 {}", term);
        for course in courses {
            println!("   📘 {}", course.name);
            if let Some(announcement) = &course.announcement {
                println!("      📢 {} ({})", announcement.text, announcement.url);
            }
        }
    }
    Ok(())
}

// Prints the report either as a table or JSON
fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &CrawlReport) {
    if report.has_failures() {
        println!("{:<14} {:<60} MESSAGE", "KIND", "TARGET");
        println!("{}", "=".repeat(105));

        for failure in &report.failures {
            println!(
                "{:<14} {:<60} {}",
                failure.kind.label(),
                truncate(&failure.target, 57),
                failure.message
            );
        }
        println!();
    }

    for term in &report.skipped_terms {
        println!("⚠️  Term {} is not in your course list", term);
    }

    println!("📊 Summary:");
    println!("   📅 Terms: {}", report.terms);
    println!("   📘 Courses: {}", report.courses);
    println!("   📄 Pages: {}", report.pages);
    println!("   📝 Entries: {} ({} with text)", report.entries, report.text_files);
    println!("   📦 Files: {} ({} bytes)", report.files, report.bytes);
    println!("   ❌ Failed: {}", report.failures.len());
}

// Shortens long URLs for display. Counts chars, not bytes, so a Chinese
// title never gets cut in the middle of a character.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
