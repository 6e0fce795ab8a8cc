//! Notification delivery.
//!
//! Targets are fixed at startup: either declared in configuration or
//! discovered through the analytics locator service. Every target receives
//! every notification; one slow or dead notifier never blocks the others.

use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use tracing::info;

use crate::auth::{form_login, AuthError};

use super::models::Notification;

/// Path every notifier serves.
const NOTIFY_PATH: &str = "api/-/notify";

/// Request timeout for notifier and locator calls.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// A statically declared notifier endpoint.
#[derive(Debug, Clone)]
pub struct ManualTarget {
    pub node: String,
    pub port: u16,
}

/// Settings for locator-based target discovery.
#[derive(Debug, Clone)]
pub struct AutoDiscoveryConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub types: Vec<String>,
}

/// Notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP client construction or request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Analytics login for auto-discovery failed
    #[error("discovery login failed: {0}")]
    Auth(#[from] AuthError),

    /// Locator lookup failed for a notifier type
    #[error("locator lookup failed for {lookup}: {message}")]
    Locator { lookup: String, message: String },

    /// Aggregate of per-target delivery failures
    #[error("notification delivery failed:\n - {}", failures.join("\n - "))]
    Delivery { failures: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct LocatorPayload {
    ip: String,
    port: u16,
}

/// Posts notifications to every configured notifier in parallel.
#[derive(Debug, Clone)]
pub struct Notifier {
    urls: Vec<String>,
    http: reqwest::Client,
}

impl Notifier {
    /// Build from a static target list.
    pub fn manual(targets: &[ManualTarget]) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()?;

        let urls = targets
            .iter()
            .map(|t| format!("https://{}:{}/{}", t.node, t.port, NOTIFY_PATH))
            .collect();

        Ok(Self { urls, http })
    }

    /// Build by asking the analytics locator where each notifier type
    /// lives. Requires a logged-in session on the analytics host.
    pub async fn discover(config: &AutoDiscoveryConfig) -> Result<Self, NotifyError> {
        let http = form_login(&config.host, &config.username, &config.password).await?;

        let mut urls = Vec::with_capacity(config.types.len());

        for lookup in &config.types {
            let located = locate(&http, &config.host, lookup).await?;
            urls.push(format!(
                "https://{}:{}/{}",
                located.ip, located.port, NOTIFY_PATH
            ));
        }

        info!(targets = urls.len(), "notifier targets discovered");

        Ok(Self { urls, http })
    }

    /// The resolved target URLs.
    pub fn targets(&self) -> &[String] {
        &self.urls
    }

    /// Deliver notifications to every target in parallel.
    ///
    /// Per-target failures are collected into one aggregate error; the
    /// caller proceeds regardless.
    pub async fn send(&self, notifications: &[Notification]) -> Result<(), NotifyError> {
        let mut failures = Vec::new();

        for notification in notifications {
            let posts = self.urls.iter().map(|url| self.post(url, notification));

            for result in join_all(posts).await {
                if let Err(failure) = result {
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery { failures })
        }
    }

    async fn post(&self, url: &str, notification: &Notification) -> Result<(), String> {
        let response = self
            .http
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| format!("{url}: {e}"))?;

        let status = response.status();

        if !status.is_success() {
            return Err(format!("{url}: non-2xx response {status}"));
        }

        Ok(())
    }
}

async fn locate(
    http: &reqwest::Client,
    host: &str,
    lookup: &str,
) -> Result<LocatorPayload, NotifyError> {
    let response = http
        .get(format!(
            "https://{host}/api/-/model/nature/locator/by-type"
        ))
        .query(&[("type", lookup)])
        .send()
        .await
        .map_err(|e| NotifyError::Locator {
            lookup: lookup.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();

    if !status.is_success() {
        return Err(NotifyError::Locator {
            lookup: lookup.to_string(),
            message: format!("non-2xx response {status}"),
        });
    }

    response.json().await.map_err(|e| NotifyError::Locator {
        lookup: lookup.to_string(),
        message: format!("bad payload: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_targets_build_notify_urls() {
        let notifier = Notifier::manual(&[
            ManualTarget {
                node: "10.0.0.5".into(),
                port: 20060,
            },
            ManualTarget {
                node: "10.0.0.6".into(),
                port: 20061,
            },
        ])
        .unwrap();

        assert_eq!(
            notifier.targets(),
            &[
                "https://10.0.0.5:20060/api/-/notify",
                "https://10.0.0.6:20061/api/-/notify",
            ]
        );
    }

    #[test]
    fn delivery_error_lists_each_target() {
        let err = NotifyError::Delivery {
            failures: vec![
                "https://a/api/-/notify: timeout".to_string(),
                "https://b/api/-/notify: non-2xx response 503".to_string(),
            ],
        };

        let text = err.to_string();
        assert!(text.contains("https://a"));
        assert!(text.contains("https://b"));
    }

    #[tokio::test]
    async fn send_with_no_targets_is_ok() {
        let notifier = Notifier::manual(&[]).unwrap();
        assert!(notifier.send(&[]).await.is_ok());
    }
}
