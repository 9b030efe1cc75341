// src/crawl/mod.rs
// =============================================================================
// This module drives the whole mirror run.
//
// Features:
// - Depth-first walk: term -> course -> category -> page -> entry -> file
// - Only the requested terms are visited
// - A failing course, page or file is skipped; its siblings still run
// - Optional bounded concurrency at the course level (`--jobs N`)
//
// Rust concepts:
// - Async streams: `buffered(n)` runs up to n futures at a time
// - Borrowing: the crawler holds `&Session`, so it can't outlive the login
// =============================================================================

mod orchestrator;
mod report;

pub use orchestrator::Crawler;
pub use report::CrawlReport;
