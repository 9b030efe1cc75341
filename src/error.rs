// src/error.rs
// =============================================================================
// Every way a crawl can go wrong, in one enum.
//
// Two of these stop the whole run (we can't log in, or we can't read the
// course list). Everything else only kills one branch of the tree: one
// course, one page, one file, one write. The orchestrator asks `is_fatal()`
// to decide which is which.
// =============================================================================

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("course listing could not be parsed: {0}")]
    ListingParse(String),

    #[error("session expired while loading {0}")]
    SessionExpired(String),

    #[error("could not navigate {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("could not extract entries from {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("TLS failure for {url}: {message}")]
    Tls { url: String, message: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

// Coarse category of a failure, used in the crawl report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    ListingParse,
    Navigation,
    Extraction,
    Transport,
    Storage,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Authentication => "authentication",
            FailureKind::ListingParse => "listing_parse",
            FailureKind::Navigation => "navigation",
            FailureKind::Extraction => "extraction",
            FailureKind::Transport => "transport",
            FailureKind::Storage => "storage",
        }
    }
}

impl CrawlError {
    /// Wraps an I/O error with the path it happened on
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CrawlError::Authentication(_) => FailureKind::Authentication,
            CrawlError::ListingParse(_) => FailureKind::ListingParse,
            CrawlError::SessionExpired(_) | CrawlError::Navigation { .. } => {
                FailureKind::Navigation
            }
            CrawlError::Extraction { .. } => FailureKind::Extraction,
            CrawlError::Tls { .. }
            | CrawlError::Timeout(_)
            | CrawlError::Status { .. }
            | CrawlError::Network(_)
            | CrawlError::InvalidUrl(_) => FailureKind::Transport,
            CrawlError::Storage { .. } => FailureKind::Storage,
        }
    }

    /// Fatal errors abort the whole run; everything else skips one branch
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Authentication | FailureKind::ListingParse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_auth_and_listing_are_fatal() {
        assert!(CrawlError::Authentication("no token".into()).is_fatal());
        assert!(CrawlError::ListingParse("bad xml".into()).is_fatal());
        assert!(!CrawlError::SessionExpired("https://x".into()).is_fatal());
        assert!(!CrawlError::Status {
            url: "https://x".into(),
            status: 404
        }
        .is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!CrawlError::storage("/tmp/x", io).is_fatal());
    }

    #[test]
    fn test_label_matches_serialized_kind() {
        let json = serde_json::to_value(FailureKind::ListingParse).unwrap();
        assert_eq!(json, FailureKind::ListingParse.label());
    }

    #[test]
    fn test_expired_session_counts_as_navigation() {
        let err = CrawlError::SessionExpired("https://x".into());
        assert_eq!(err.kind(), FailureKind::Navigation);
    }
}
