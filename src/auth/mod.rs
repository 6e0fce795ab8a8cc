//! Credential management for the routing API and the analytics host.
//!
//! The routing API authenticates through an OIDC client-credentials token
//! installed as a cookie on a shared cookie jar; a background task renews
//! it every four minutes. The analytics host uses a plain form login whose
//! session also lives in a jar.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::cookie::Jar;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Name of the cookie carrying the bearer token.
const TOKEN_COOKIE: &str = "magoidc-token";

/// How often the bearer token is renewed.
const REFRESH_PERIOD: Duration = Duration::from_secs(4 * 60);

/// Request timeout shared by all clients built here.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// OIDC client-credentials settings for the routing API.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed (network error, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token endpoint rejected the request
    #[error("token endpoint error {status}: {message}")]
    Token { status: u16, message: String },

    /// Form login rejected the credentials
    #[error("login failed {status}: {message}")]
    Login { status: u16, message: String },

    /// Token URL could not be parsed for the cookie origin
    #[error("invalid token URL: {message}")]
    BadUrl { message: String },
}

/// Cloneable handle to the current bearer token.
///
/// The websocket handshake cannot read the reqwest cookie jar, so the
/// refresher also publishes the raw token here.
#[derive(Debug, Clone, Default)]
pub struct TokenHandle {
    current: Arc<RwLock<Option<String>>>,
}

impl TokenHandle {
    pub fn get(&self) -> Option<String> {
        self.current.read().unwrap().clone()
    }

    fn set(&self, token: String) {
        *self.current.write().unwrap() = Some(token);
    }
}

/// Builds and owns the authenticated HTTP client for the routing API.
#[derive(Clone)]
pub struct ApiAuthenticator {
    http: reqwest::Client,
    jar: Arc<Jar>,
    cookie_origin: reqwest::Url,
    config: AuthConfig,
    token: TokenHandle,
}

impl ApiAuthenticator {
    /// Build the shared client and obtain the first token.
    ///
    /// A failure here is a startup failure; the agent must not come up
    /// without a valid credential.
    pub async fn connect(config: AuthConfig) -> Result<Self, AuthError> {
        let jar = Arc::new(Jar::default());

        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()?;

        let cookie_origin = cookie_origin(&config.token_url)?;

        let auth = Self {
            http,
            jar,
            cookie_origin,
            config,
            token: TokenHandle::default(),
        };

        auth.refresh().await?;

        Ok(auth)
    }

    /// The shared HTTP client (cookie jar included). Cheap to clone.
    pub fn client(&self) -> reqwest::Client {
        self.http.clone()
    }

    /// Handle to the current raw token.
    pub fn token(&self) -> TokenHandle {
        self.token.clone()
    }

    /// Fetch a fresh token and install it on the jar and the handle.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let token = fetch_token(&self.http, &self.config).await?;

        self.jar.add_cookie_str(
            &format!("{TOKEN_COOKIE}={token}"),
            &self.cookie_origin,
        );
        self.token.set(token);

        Ok(())
    }

    /// Spawn the background refresher.
    ///
    /// Renews the token every four minutes until the shutdown channel
    /// flips; failures are logged and retried at the next tick.
    pub fn spawn_refresher(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let auth = self.clone();

        tokio::spawn(async move {
            // The startup token is already installed; first renewal lands
            // one period in.
            let mut ticker = interval_at(Instant::now() + REFRESH_PERIOD, REFRESH_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("token refresher stopping");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = auth.refresh().await {
                            warn!("token refresh failed, retrying next tick: {err}");
                        }
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

async fn fetch_token(http: &reqwest::Client, config: &AuthConfig) -> Result<String, AuthError> {
    let response = http
        .post(&config.token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AuthError::Token {
            status: status.as_u16(),
            message,
        });
    }

    let token: TokenResponse = response.json().await?;

    Ok(token.access_token)
}

/// scheme://host[:port] of the token URL; the cookie is scoped there.
fn cookie_origin(token_url: &str) -> Result<reqwest::Url, AuthError> {
    let url = reqwest::Url::parse(token_url).map_err(|e| AuthError::BadUrl {
        message: e.to_string(),
    })?;

    let host = url.host_str().ok_or_else(|| AuthError::BadUrl {
        message: format!("token URL {token_url} has no host"),
    })?;

    let origin = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };

    reqwest::Url::parse(&origin).map_err(|e| AuthError::BadUrl {
        message: e.to_string(),
    })
}

/// Build a cookie-session client and log in to the analytics host.
///
/// The session cookie from `Set-Cookie` stays on the returned client's jar.
pub async fn form_login(
    host: &str,
    username: &str,
    password: &str,
) -> Result<reqwest::Client, AuthError> {
    let http = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .danger_accept_invalid_certs(true)
        .build()?;

    let response = http
        .post(format!("https://{host}:443/api/v1/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;

    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AuthError::Login {
            status: status.as_u16(),
            message,
        });
    }

    Ok(http)
}
