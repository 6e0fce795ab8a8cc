//! Schedule source error types.

/// Errors from the scheduler analytics search backend.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// HTTP request failed (network error, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Search backend returned an error status
    #[error("search API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("malformed search response: {message}")]
    Malformed { message: String },

    /// Query matched no documents at all
    #[error("search returned zero hits")]
    NoHits,

    /// Query matched documents but produced no buscode groups
    #[error("terms aggregation returned zero buckets")]
    ZeroBuckets,
}

impl ScheduleError {
    /// Transport errors are retried on the next tick; everything else is a
    /// no-update-this-cycle condition.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScheduleError::Http(_))
    }
}
