// src/download/fetch.rs
// =============================================================================
// Downloads one file to disk.
//
// Strategy:
// - Clean up the file name first (spaces -> underscores)
// - GET with certificate verification on
// - If that fails *because of TLS* (some course files sit on hosts with
//   expired or self-signed certificates), try exactly once more with
//   verification off. Any other failure is final.
// - Stream the body to disk through a fixed-size buffer, reporting progress
//   against Content-Length when the server sends one
//
// A failed download never takes the crawl down with it: the caller records
// the error and moves on to the next file.
// =============================================================================

use futures::StreamExt;
use reqwest::Response;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace, warn};

use crate::error::CrawlError;
use crate::mirror::sanitize_name;
use crate::session::{classify_error, Session, TlsMode, TransportClient};

// Write buffer size; the body is flushed to disk in blocks of this size
const CHUNK_SIZE: usize = 8192;

/// A file that made it to disk
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u64,
    pub tls: TlsMode,
}

// Fetches `url` into `dest` (whose file name is sanitized first).
// Always re-downloads and always overwrites.
pub async fn fetch(session: &Session, url: &str, dest: &Path) -> Result<Download, CrawlError> {
    let dest = sanitize_destination(dest);
    let client = session.client();

    let (response, tls) = with_tls_fallback(url, |mode| open(client, url, mode)).await?;
    let bytes = write_body(response, &dest, url, client.portal().timeout).await?;

    debug!(url, path = %dest.display(), bytes, "download complete");
    Ok(Download {
        path: dest,
        bytes,
        tls,
    })
}

// Runs `attempt` with verification on; on a TLS failure runs it once more
// with verification off. Returns the value and the mode that produced it.
pub async fn with_tls_fallback<T, F, Fut>(url: &str, mut attempt: F) -> Result<(T, TlsMode), CrawlError>
where
    F: FnMut(TlsMode) -> Fut,
    Fut: Future<Output = Result<T, CrawlError>>,
{
    match attempt(TlsMode::Verify).await {
        Ok(value) => Ok((value, TlsMode::Verify)),
        Err(CrawlError::Tls { message, .. }) => {
            warn!(url, error = %message, "TLS verification failed, retrying without it");
            let value = attempt(TlsMode::Insecure).await?;
            Ok((value, TlsMode::Insecure))
        }
        Err(e) => Err(e),
    }
}

// Sends the GET and checks the status. The timeout covers getting the
// response headers; the body has its own per-chunk timeout.
async fn open(client: &TransportClient, url: &str, mode: TlsMode) -> Result<Response, CrawlError> {
    let timeout = client.portal().timeout;
    let response = tokio::time::timeout(timeout, client.http(mode).get(url).send())
        .await
        .map_err(|_| CrawlError::Timeout(url.to_string()))?
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CrawlError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

async fn write_body(
    response: Response,
    dest: &Path,
    url: &str,
    idle_timeout: Duration,
) -> Result<u64, CrawlError> {
    let total = response.content_length();
    let file = File::create(dest)
        .await
        .map_err(|e| CrawlError::storage(dest, e))?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    // A stalled connection counts as a failure, not a hang
    while let Some(chunk) = tokio::time::timeout(idle_timeout, stream.next())
        .await
        .map_err(|_| CrawlError::Timeout(url.to_string()))?
    {
        let chunk = chunk.map_err(|e| classify_error(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| CrawlError::storage(dest, e))?;
        written += chunk.len() as u64;
        trace!(url, bytes = written, total = ?total, "download progress");
    }

    writer
        .flush()
        .await
        .map_err(|e| CrawlError::storage(dest, e))?;

    // Content-Length is only a progress hint; a short body is not an error
    if let Some(total) = total {
        if total != written {
            debug!(url, expected = total, got = written, "body length differs from Content-Length");
        }
    }

    Ok(written)
}

// Same directory, sanitized file name
fn sanitize_destination(dest: &Path) -> PathBuf {
    match dest.file_name() {
        Some(name) => dest.with_file_name(sanitize_name(&name.to_string_lossy())),
        None => dest.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use std::cell::RefCell;

    const BODY: &[u8] = b"%PDF-1.4 fake slides \x00\x01\x02 with some binary bytes";

    fn tls_error(url: &str) -> CrawlError {
        CrawlError::Tls {
            url: url.to_string(),
            message: "invalid peer certificate: Expired".to_string(),
        }
    }

    fn file_server() -> Router {
        Router::new()
            .route(
                "/files/slides.pdf",
                get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], BODY.to_vec()) }),
            )
            .route("/files/missing.pdf", get(|| async { StatusCode::NOT_FOUND }))
    }

    #[tokio::test]
    async fn test_tls_failure_retries_without_verification() {
        let calls = RefCell::new(Vec::new());
        let result = with_tls_fallback("https://legacy.example.edu/a.pdf", |mode| {
            calls.borrow_mut().push(mode);
            async move {
                match mode {
                    TlsMode::Verify => Err(tls_error("https://legacy.example.edu/a.pdf")),
                    TlsMode::Insecure => Ok(BODY.to_vec()),
                }
            }
        })
        .await;

        let (bytes, mode) = result.unwrap();
        assert_eq!(bytes, BODY);
        assert_eq!(mode, TlsMode::Insecure);
        assert_eq!(*calls.borrow(), vec![TlsMode::Verify, TlsMode::Insecure]);
    }

    #[tokio::test]
    async fn test_tls_failure_twice_gives_up() {
        let calls = RefCell::new(0);
        let result: Result<(Vec<u8>, TlsMode), _> = with_tls_fallback("https://x/a.pdf", |_| {
            *calls.borrow_mut() += 1;
            async { Err(tls_error("https://x/a.pdf")) }
        })
        .await;

        assert!(matches!(result, Err(CrawlError::Tls { .. })));
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let calls = RefCell::new(0);
        let result: Result<(Vec<u8>, TlsMode), _> = with_tls_fallback("https://x/a.pdf", |_| {
            *calls.borrow_mut() += 1;
            async {
                Err(CrawlError::Status {
                    url: "https://x/a.pdf".to_string(),
                    status: 500,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_fetch_writes_exact_bytes_to_sanitized_name() {
        let base = testutil::serve(file_server()).await;
        let session = testutil::session_for(&base);
        let tmp = tempfile::tempdir().unwrap();

        let url = base.join("/files/slides.pdf").unwrap();
        let download = fetch(&session, url.as_str(), &tmp.path().join("Lecture 1.pdf"))
            .await
            .unwrap();

        assert_eq!(download.path, tmp.path().join("Lecture_1.pdf"));
        assert_eq!(download.bytes, BODY.len() as u64);
        assert_eq!(download.tls, TlsMode::Verify);
        assert_eq!(std::fs::read(&download.path).unwrap(), BODY);
    }

    #[tokio::test]
    async fn test_fetch_overwrites_existing_file() {
        let base = testutil::serve(file_server()).await;
        let session = testutil::session_for(&base);
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("slides.pdf");
        std::fs::write(&dest, b"stale content that is longer than the real body, much longer").unwrap();

        let url = base.join("/files/slides.pdf").unwrap();
        fetch(&session, url.as_str(), &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), BODY);
    }

    #[tokio::test]
    async fn test_fetch_http_error_writes_nothing() {
        let base = testutil::serve(file_server()).await;
        let session = testutil::session_for(&base);
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("missing.pdf");

        let url = base.join("/files/missing.pdf").unwrap();
        let err = fetch(&session, url.as_str(), &dest).await.unwrap_err();
        assert!(matches!(err, CrawlError::Status { status: 404, .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_fails_when_both_attempts_fail() {
        // Speaking TLS to a plain HTTP server fails the handshake in both modes
        let base = testutil::serve(file_server()).await;
        let session = testutil::session_for(&base);
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("slides.pdf");

        let url = format!("https://127.0.0.1:{}/files/slides.pdf", base.port().unwrap());
        let result = fetch(&session, &url, &dest).await;

        assert!(result.is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_sanitize_destination_only_touches_file_name() {
        let dest = Path::new("vault/Week 1/my notes.pdf");
        assert_eq!(
            sanitize_destination(dest),
            PathBuf::from("vault/Week 1/my_notes.pdf")
        );
    }
}
