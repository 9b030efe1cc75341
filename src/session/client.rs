// src/session/client.rs
// =============================================================================
// The one HTTP client the whole crawl goes through.
//
// Key functionality:
// - A single cookie jar shared by two reqwest clients: one that verifies TLS
//   certificates and one that doesn't (only used for the download fallback)
// - Every request carries the browser User-Agent and a timeout
// - Errors are classified so callers can tell a TLS failure from the rest
//
// reqwest::Client is an Arc inside, so cloning TransportClient is cheap and
// every clone sees the same cookies.
// =============================================================================

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::PortalConfig;
use crate::error::CrawlError;

// Substrings that show up in rustls / hyper errors when the handshake or
// certificate check fails
const TLS_MARKERS: &[&str] = &[
    "certificate",
    "tls",
    "ssl",
    "handshake",
    "corrupt message",
];

// CAS bounces through a handful of redirects on login
const MAX_REDIRECTS: usize = 10;

/// Whether certificates are checked for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Verify,
    Insecure,
}

/// A fetched HTML document together with the URL it finally landed on
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

#[derive(Clone)]
pub struct TransportClient {
    strict: Client,
    lenient: Client,
    portal: PortalConfig,
}

impl TransportClient {
    pub fn new(portal: PortalConfig) -> Result<Self, CrawlError> {
        let jar = Arc::new(Jar::default());

        Ok(Self {
            strict: build_client(&portal, jar.clone(), TlsMode::Verify)?,
            lenient: build_client(&portal, jar, TlsMode::Insecure)?,
            portal,
        })
    }

    pub fn portal(&self) -> &PortalConfig {
        &self.portal
    }

    /// The raw reqwest client for the given TLS mode
    pub fn http(&self, mode: TlsMode) -> &Client {
        match mode {
            TlsMode::Verify => &self.strict,
            TlsMode::Insecure => &self.lenient,
        }
    }

    // GET a page, following redirects. Non-2xx is an error.
    pub async fn get_page(&self, url: &str) -> Result<Page, CrawlError> {
        let request = self.strict.get(url);
        self.send_for_page(url, request).await
    }

    // POST a url-encoded form, following redirects. Non-2xx is an error.
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Page, CrawlError> {
        let request = self.strict.post(url).form(form);
        self.send_for_page(url, request).await
    }

    async fn send_for_page(&self, url: &str, request: RequestBuilder) -> Result<Page, CrawlError> {
        let response = request
            .timeout(self.portal.timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();
        if final_url.as_str() != url {
            debug!(from = url, to = %final_url, "followed redirect");
        }

        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify_error(url, e))?;
        Ok(Page {
            url: final_url,
            body,
        })
    }

    /// True when `url` points at the CAS login endpoint
    pub fn is_cas_login(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.portal.cas_url.as_str())
    }

    /// Resolves a (possibly relative) portal link to an absolute URL
    pub fn absolute_url(&self, path: &str) -> Result<Url, CrawlError> {
        self.portal
            .base_url
            .join(path)
            .map_err(|_| CrawlError::InvalidUrl(path.to_string()))
    }
}

fn build_client(portal: &PortalConfig, jar: Arc<Jar>, mode: TlsMode) -> Result<Client, CrawlError> {
    let client = Client::builder()
        .cookie_provider(jar)
        .user_agent(portal.user_agent.as_str())
        .connect_timeout(portal.timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(mode == TlsMode::Insecure)
        .build()?;
    Ok(client)
}

// Turns a reqwest error into our taxonomy: timeouts and TLS failures get
// their own variants, everything else stays a plain network error
pub fn classify_error(url: &str, error: reqwest::Error) -> CrawlError {
    if error.is_timeout() {
        CrawlError::Timeout(url.to_string())
    } else if mentions_tls(error.source()) {
        CrawlError::Tls {
            url: url.to_string(),
            message: error_chain(&error),
        }
    } else {
        CrawlError::Network(error)
    }
}

// The top-level reqwest error includes the request URL in its message, so
// only the sources are inspected
fn mentions_tls(mut current: Option<&(dyn StdError + 'static)>) -> bool {
    while let Some(error) = current {
        let text = error.to_string().to_lowercase();
        if TLS_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        current = error.source();
    }
    false
}

fn error_chain(error: &dyn StdError) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_detects_certificate_error_in_chain() {
        let err = Wrapper(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid peer certificate: UnknownIssuer",
        ));
        assert!(mentions_tls(Some(&err)));
    }

    #[test]
    fn test_ignores_plain_connection_errors() {
        let err = Wrapper(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        assert!(!mentions_tls(Some(&err)));
        assert!(!mentions_tls(None));
    }

    #[test]
    fn test_error_chain_joins_sources() {
        let err = Wrapper(io::Error::new(io::ErrorKind::Other, "inner"));
        assert_eq!(error_chain(&err), "client error (Connect): inner");
    }

    #[test]
    fn test_is_cas_login_matches_prefix() {
        let portal =
            PortalConfig::new("https://bb.example.edu", "https://cas.example.edu/cas/login")
                .unwrap();
        let client = TransportClient::new(portal).unwrap();

        let cas = Url::parse("https://cas.example.edu/cas/login?service=x").unwrap();
        let portal_page = Url::parse("https://bb.example.edu/webapps/login/").unwrap();
        assert!(client.is_cas_login(&cas));
        assert!(!client.is_cas_login(&portal_page));
    }
}
