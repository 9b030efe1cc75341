// src/testutil.rs
// =============================================================================
// Shared helpers for tests: spins up an in-process axum server that plays
// the part of the portal and its CAS gateway.
// =============================================================================

use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use crate::config::PortalConfig;
use crate::session::{Session, TransportClient};

// Binds to a random local port and serves `router` in the background.
// Returns the server's base URL (with a trailing slash).
pub async fn serve(router: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

pub fn portal_for(base: &Url) -> PortalConfig {
    let cas = base.join("/cas/login").unwrap();
    PortalConfig::new(base.as_str(), cas.as_str()).unwrap()
}

// A session against `base` that skips the CAS handshake
pub fn session_for(base: &Url) -> Session {
    let client = TransportClient::new(portal_for(base)).unwrap();
    Session::assume_authenticated(client)
}
