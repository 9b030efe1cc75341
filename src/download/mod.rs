// src/download/mod.rs
// =============================================================================
// File downloads.
//
// Currently implements:
// - Streaming a file from the portal to disk through the shared session
// - A single retry without certificate verification after a TLS failure
//
// Anything that goes wrong is returned as a CrawlError; the crawl decides
// what to do with it (log it, count it, carry on).
// =============================================================================

mod fetch;

pub use fetch::fetch;
