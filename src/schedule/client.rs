//! Scheduler analytics search client.
//!
//! Fetches the current schedule map from the search backend. The request
//! body never changes (relative date math lives in the query), so it is
//! built once at construction.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::ScheduleEntry;

use super::error::ScheduleError;
use super::query::{buckets_into_schedule_map, search_body, SearchResponse};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the schedule search client.
#[derive(Debug, Clone)]
pub struct ScheduleClientConfig {
    /// Base address of the search backend, e.g. `https://search:9200`
    pub address: String,
    /// Index (or index pattern) holding scheduler events
    pub index: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ScheduleClientConfig {
    pub fn new(address: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            index: index.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set a custom request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Client for the scheduler analytics index.
#[derive(Debug, Clone)]
pub struct ScheduleClient {
    http: reqwest::Client,
    search_url: String,
    body: Value,
}

impl ScheduleClient {
    pub fn new(config: ScheduleClientConfig) -> Result<Self, ScheduleError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            http,
            search_url: format!(
                "{}/{}/_search",
                config.address.trim_end_matches('/'),
                config.index
            ),
            body: search_body(),
        })
    }

    /// Fetch the current `buscode → ScheduleEntry` map.
    ///
    /// Distinguishes transport failures (retry next tick) from semantic
    /// empties and shape mismatches (no update this cycle); see
    /// [`ScheduleError`].
    pub async fn fetch_schedule_map(
        &self,
    ) -> Result<HashMap<String, ScheduleEntry>, ScheduleError> {
        let response = self
            .http
            .post(&self.search_url)
            .json(&self.body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScheduleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ScheduleError::Malformed {
                message: e.to_string(),
            })?;

        if parsed.hits.total.value == 0 {
            return Err(ScheduleError::NoHits);
        }

        let aggregations = parsed.aggregations.ok_or(ScheduleError::Malformed {
            message: "response has hits but no aggregations section".to_string(),
        })?;

        if aggregations.bus_name.buckets.is_empty() {
            return Err(ScheduleError::ZeroBuckets);
        }

        Ok(buckets_into_schedule_map(aggregations.bus_name.buckets))
    }
}
