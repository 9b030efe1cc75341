// src/session/mod.rs
// =============================================================================
// HTTP transport and authentication.
//
// Submodules:
// - client: the cookie-persisting reqwest wrapper every request goes through
// - auth: the CAS login handshake
//
// A `Session` can only be created by a successful `AuthSession::login`.
// Every component that talks to the portal takes `&Session`, so "you must be
// logged in first" is checked by the compiler instead of by convention.
// =============================================================================

mod auth;
mod client;

pub use auth::AuthSession;
pub use client::{classify_error, Page, TlsMode, TransportClient};

use crate::config::PortalConfig;
use crate::error::CrawlError;

/// An authenticated handle on the portal
#[derive(Clone)]
pub struct Session {
    client: TransportClient,
}

impl Session {
    fn new(client: TransportClient) -> Self {
        Self { client }
    }

    // Skips the handshake for tests that only exercise one component
    #[cfg(test)]
    pub(crate) fn assume_authenticated(client: TransportClient) -> Self {
        Self::new(client)
    }

    pub fn client(&self) -> &TransportClient {
        &self.client
    }

    pub fn portal(&self) -> &PortalConfig {
        self.client.portal()
    }

    /// GET a portal page. Landing on the CAS login form means the portal
    /// dropped our session, which is reported as `SessionExpired`.
    pub async fn fetch_page(&self, url: &str) -> Result<Page, CrawlError> {
        let page = self.client.get_page(url).await?;
        if self.client.is_cas_login(&page.url) {
            return Err(CrawlError::SessionExpired(url.to_string()));
        }
        Ok(page)
    }
}
