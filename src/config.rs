// src/config.rs
// =============================================================================
// Loads the login file and the portal endpoints.
//
// The file is TOML and looks like this:
//
//   username = "12345678"
//   password = "hunter2"
//
//   [portal]                      # optional, defaults shown
//   base_url = "https://bb.sustech.edu.cn"
//   cas_url  = "https://cas.sustech.edu.cn/cas/login"
//
// BB_USERNAME / BB_PASSWORD in the environment override the file, so the
// password never has to live on disk in CI.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://bb.sustech.edu.cn";
pub const DEFAULT_CAS_URL: &str = "https://cas.sustech.edu.cn/cas/login";

// Some portals serve a stripped-down page to unknown clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const USERNAME_ENV: &str = "BB_USERNAME";
const PASSWORD_ENV: &str = "BB_PASSWORD";

/// Username and password for the CAS form
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

// Hand-written so the password never ends up in a log line
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where the portal and its CAS gateway live, and how we talk to them
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: Url,
    pub cas_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
}

impl PortalConfig {
    pub fn new(base_url: &str, cas_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)
                .with_context(|| format!("Invalid portal URL '{}'", base_url))?,
            cas_url: Url::parse(cas_url)
                .with_context(|| format!("Invalid CAS URL '{}'", cas_url))?,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// On-disk shape of the config file. Everything is optional so that a file
// holding only [portal] still works when credentials come from the env.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    username: Option<String>,
    password: Option<String>,
    #[serde(default)]
    portal: RawPortal,
}

#[derive(Debug, Default, Deserialize)]
struct RawPortal {
    base_url: Option<String>,
    cas_url: Option<String>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credential: Credential,
    pub portal: PortalConfig,
}

impl AppConfig {
    // Reads the config file (a missing file is fine if the env has the
    // credentials) and applies environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            parse_raw(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            RawConfig::default()
        };

        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self::from_raw(raw, env(USERNAME_ENV), env(PASSWORD_ENV))
    }

    fn from_raw(
        raw: RawConfig,
        env_username: Option<String>,
        env_password: Option<String>,
    ) -> Result<Self> {
        let username = env_username
            .or(raw.username)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("No username configured (set `username` or {})", USERNAME_ENV))?;
        let password = env_password
            .or(raw.password)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("No password configured (set `password` or {})", PASSWORD_ENV))?;

        let mut portal = PortalConfig::new(
            raw.portal.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            raw.portal.cas_url.as_deref().unwrap_or(DEFAULT_CAS_URL),
        )?;
        if let Some(agent) = raw.portal.user_agent {
            portal.user_agent = agent;
        }

        Ok(Self {
            credential: Credential { username, password },
            portal,
        })
    }
}

fn parse_raw(text: &str) -> Result<RawConfig> {
    Ok(toml::from_str(text)?)
}
