//! Polling client for the routing GraphQL API.

use serde_json::json;

use super::error::RouterError;
use super::types::{GraphQlResponse, Terminals, TerminalsData, TERMINALS_QUERY};

/// Default edge fan-out per query.
const DEFAULT_LIMIT: u32 = 2000;

/// Configuration for the routing API client.
#[derive(Debug, Clone)]
pub struct RouterClientConfig {
    /// GraphQL endpoint URL, e.g. `https://router.example/graphql/v1.1`
    pub url: String,
    /// Maximum edges returned per query
    pub limit: u32,
}

impl RouterClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Set the edge fan-out limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// GraphQL query client.
///
/// Shares the authenticated HTTP client (and its cookie jar) with the rest
/// of the agent; the token refresher keeps the bearer cookie current.
#[derive(Debug, Clone)]
pub struct RouterClient {
    http: reqwest::Client,
    url: String,
    limit: u32,
}

impl RouterClient {
    pub fn new(http: reqwest::Client, config: RouterClientConfig) -> Self {
        Self {
            http,
            url: config.url,
            limit: config.limit,
        }
    }

    /// Fetch the routed destination terminals for one tag.
    pub async fn fetch_terminals(&self, tag: &str) -> Result<Terminals, RouterError> {
        let request = json!({
            "query": TERMINALS_QUERY,
            "variables": { "tag": tag, "limit": self.limit },
        });

        let response = self.http.post(&self.url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RouterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;

        let parsed: GraphQlResponse<TerminalsData> =
            serde_json::from_str(&body).map_err(|e| RouterError::Json {
                message: e.to_string(),
            })?;

        if !parsed.errors.is_empty() {
            let message = parsed
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RouterError::GraphQl { message });
        }

        match parsed.data {
            Some(data) => Ok(data.terminals),
            None => Err(RouterError::Json {
                message: "response carries neither data nor errors".to_string(),
            }),
        }
    }
}
