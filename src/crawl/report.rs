// src/crawl/report.rs
// =============================================================================
// What a crawl did, for the summary at the end.
//
// Each course is crawled into its own CrawlReport and the reports are merged
// afterwards, so concurrent courses never write to shared state.
// =============================================================================

use serde::Serialize;
use tracing::warn;

use crate::error::{CrawlError, FailureKind};

/// One branch of the tree that was skipped
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub terms: usize,
    pub courses: usize,
    pub pages: usize,
    pub entries: usize,
    pub text_files: usize,
    pub files: usize,
    pub bytes: u64,
    pub skipped_terms: Vec<String>,
    pub failures: Vec<Failure>,
}

impl CrawlReport {
    // Logs the failure where it happened and keeps it for the summary
    pub fn record(&mut self, target: &str, error: CrawlError) {
        let kind = error.kind();
        warn!(?kind, item = target, error = %error, "skipping");
        self.failures.push(Failure {
            kind,
            target: target.to_string(),
            message: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: CrawlReport) {
        self.terms += other.terms;
        self.courses += other.courses;
        self.pages += other.pages;
        self.entries += other.entries;
        self.text_files += other.text_files;
        self.files += other.files;
        self.bytes += other.bytes;
        self.skipped_terms.extend(other.skipped_terms);
        self.failures.extend(other.failures);
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
