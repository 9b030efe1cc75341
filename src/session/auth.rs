// src/session/auth.rs
// =============================================================================
// Logs into the portal through the CAS single-sign-on gateway.
//
// The handshake is a small state machine:
//
//   Unauthenticated -> RequestLoginPage -> ResolveCasUrl -> FetchCasForm
//     -> ExtractExecutionToken -> SubmitCredentials -> Authenticated | Failed
//
// 1. GET the portal login page. The portal usually redirects to CAS; if it
//    does we reuse that URL, otherwise we build `cas?service=<login page>`.
// 2. GET the CAS form and pull out the hidden `execution` token.
// 3. POST username/password/execution back. The cookies set along the way
//    end up in the shared jar, which is what makes every later request
//    authenticated.
// 4. CAS gives us no clean success signal, so we look for a "logout" link
//    in the page we land on.
// =============================================================================

use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;

use super::client::TransportClient;
use super::Session;
use crate::config::Credential;
use crate::error::CrawlError;
use crate::portal::html::selector;

const LOGIN_PATH: &str = "/webapps/login/";

// "登出" is the Chinese-locale logout label
const LOGOUT_MARKERS: &[&str] = &["登出", "logout"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    RequestLoginPage,
    ResolveCasUrl,
    FetchCasForm,
    ExtractExecutionToken,
    SubmitCredentials,
    Authenticated,
    Failed,
}

pub struct AuthSession {
    client: TransportClient,
    state: LoginState,
}

impl AuthSession {
    pub fn new(client: TransportClient) -> Self {
        Self {
            client,
            state: LoginState::Unauthenticated,
        }
    }

    /// Runs the CAS handshake. The returned `Session` is the only way to
    /// reach the rest of the crawler, so nothing can run before this succeeds.
    pub async fn login(&mut self, credential: &Credential) -> Result<Session, CrawlError> {
        info!(username = %credential.username, "logging in through CAS");

        match self.handshake(credential).await {
            Ok(()) => {
                self.advance(LoginState::Authenticated);
                info!("CAS authentication succeeded");
                Ok(Session::new(self.client.clone()))
            }
            Err(e) => {
                self.advance(LoginState::Failed);
                warn!(error = %e, "CAS authentication failed");
                Err(match e {
                    CrawlError::Authentication(_) => e,
                    other => CrawlError::Authentication(other.to_string()),
                })
            }
        }
    }

    async fn handshake(&mut self, credential: &Credential) -> Result<(), CrawlError> {
        self.advance(LoginState::RequestLoginPage);
        let login_url = self.client.absolute_url(LOGIN_PATH)?;
        let landing = self.client.get_page(login_url.as_str()).await?;

        self.advance(LoginState::ResolveCasUrl);
        let cas_url = if self.client.is_cas_login(&landing.url) {
            landing.url.clone()
        } else {
            cas_url_for(&self.client.portal().cas_url, &login_url)
        };
        debug!(cas_url = %cas_url, "resolved CAS entry point");

        self.advance(LoginState::FetchCasForm);
        let form = self.client.get_page(cas_url.as_str()).await?;

        self.advance(LoginState::ExtractExecutionToken);
        let execution = extract_execution_token(&form.body).ok_or_else(|| {
            CrawlError::Authentication("CAS form has no execution token".to_string())
        })?;

        self.advance(LoginState::SubmitCredentials);
        let reply = self
            .client
            .post_form(
                cas_url.as_str(),
                &[
                    ("username", credential.username.as_str()),
                    ("password", credential.password.as_str()),
                    ("execution", execution.as_str()),
                    ("_eventId", "submit"),
                ],
            )
            .await?;

        if !looks_logged_in(&reply.body) {
            return Err(CrawlError::Authentication(
                "no logout marker after submitting credentials (wrong username or password?)"
                    .to_string(),
            ));
        }

        Ok(())
    }

    fn advance(&mut self, next: LoginState) {
        debug!(from = ?self.state, to = ?next, "login state");
        self.state = next;
    }
}

// Builds `cas_url?service=<login_url>` when the portal didn't redirect us
fn cas_url_for(cas_url: &Url, login_url: &Url) -> Url {
    let mut url = cas_url.clone();
    url.query_pairs_mut()
        .append_pair("service", login_url.as_str());
    url
}

// Value of the hidden `<input name="execution">`, if the form has one
fn extract_execution_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let input = document.select(&selector(r#"input[name="execution"]"#)).next()?;
    Some(input.value().attr("value").unwrap_or_default().to_string())
}

fn looks_logged_in(body: &str) -> bool {
    let lower = body.to_lowercase();
    LOGOUT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use axum::http::Uri;
    use axum::response::Redirect;
    use axum::routing::get;
    use axum::{response::Html as HtmlResponse, Form, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const CAS_FORM: &str = r#"
        <form id="fm1" method="post">
          <input type="text" name="username"/>
          <input type="password" name="password"/>
          <input type="hidden" name="execution" value="e1s1-token"/>
          <input type="hidden" name="_eventId" value="submit"/>
        </form>"#;

    fn credential(password: &str) -> Credential {
        Credential {
            username: "alice".to_string(),
            password: password.to_string(),
        }
    }

    async fn check_credentials(Form(form): Form<HashMap<String, String>>) -> HtmlResponse<&'static str> {
        let ok = form.get("password").map(String::as_str) == Some("pw")
            && form.get("execution").map(String::as_str) == Some("e1s1-token")
            && form.get("_eventId").map(String::as_str) == Some("submit");
        if ok {
            HtmlResponse(r#"<a href="/webapps/login/?action=logout">Logout</a>"#)
        } else {
            HtmlResponse("<p>Invalid credentials.</p>")
        }
    }

    fn fake_cas(form: &'static str) -> Router {
        Router::new()
            .route("/webapps/login/", get(|| async { HtmlResponse("<p>portal login</p>") }))
            .route(
                "/cas/login",
                get(move || async move { HtmlResponse(form) }).post(check_credentials),
            )
    }

    #[test]
    fn test_extract_execution_token() {
        assert_eq!(
            extract_execution_token(CAS_FORM),
            Some("e1s1-token".to_string())
        );
        assert_eq!(extract_execution_token("<form></form>"), None);
    }

    #[test]
    fn test_logout_marker_is_case_insensitive() {
        assert!(looks_logged_in("<a>LogOut</a>"));
        assert!(looks_logged_in("<a>登出</a>"));
        assert!(!looks_logged_in("<p>Welcome</p>"));
    }

    #[test]
    fn test_cas_url_for_encodes_service() {
        let cas = Url::parse("https://cas.example.edu/cas/login").unwrap();
        let login = Url::parse("https://bb.example.edu/webapps/login/").unwrap();
        let url = cas_url_for(&cas, &login);
        assert_eq!(
            url.as_str(),
            "https://cas.example.edu/cas/login?service=https%3A%2F%2Fbb.example.edu%2Fwebapps%2Flogin%2F"
        );
    }

    #[tokio::test]
    async fn test_login_succeeds() {
        let base = testutil::serve(fake_cas(CAS_FORM)).await;
        let client = TransportClient::new(testutil::portal_for(&base)).unwrap();
        let mut auth = AuthSession::new(client);

        let session = auth.login(&credential("pw")).await;
        assert!(session.is_ok());
        assert_eq!(auth.state, LoginState::Authenticated);
    }

    #[tokio::test]
    async fn test_login_reuses_portal_redirect_to_cas() {
        let posted_to = Arc::new(Mutex::new(Vec::new()));
        let seen = posted_to.clone();
        let router = Router::new()
            .route(
                "/webapps/login/",
                get(|| async { Redirect::to("/cas/login?service=from-portal") }),
            )
            .route(
                "/cas/login",
                get(|| async { HtmlResponse(CAS_FORM) }).post(
                    move |uri: Uri, form: Form<HashMap<String, String>>| {
                        seen.lock().unwrap().push(uri.to_string());
                        check_credentials(form)
                    },
                ),
            );
        let base = testutil::serve(router).await;
        let client = TransportClient::new(testutil::portal_for(&base)).unwrap();
        let mut auth = AuthSession::new(client);

        assert!(auth.login(&credential("pw")).await.is_ok());
        assert_eq!(auth.state, LoginState::Authenticated);
        assert_eq!(
            *posted_to.lock().unwrap(),
            vec!["/cas/login?service=from-portal".to_string()]
        );
    }

    #[tokio::test]
    async fn test_wrong_password_fails() {
        let base = testutil::serve(fake_cas(CAS_FORM)).await;
        let client = TransportClient::new(testutil::portal_for(&base)).unwrap();
        let mut auth = AuthSession::new(client);

        let err = auth.login(&credential("nope")).await.err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(auth.state, LoginState::Failed);
    }

    #[tokio::test]
    async fn test_missing_execution_token_fails() {
        let base = testutil::serve(fake_cas("<form><input name=\"username\"/></form>")).await;
        let client = TransportClient::new(testutil::portal_for(&base)).unwrap();
        let mut auth = AuthSession::new(client);

        let result = auth.login(&credential("pw")).await;
        assert!(matches!(result, Err(CrawlError::Authentication(_))));
        assert_eq!(auth.state, LoginState::Failed);
    }
}
