//! Routing API error types.

/// Errors from the GraphQL routing API (poll and subscription paths).
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// HTTP request failed (network error, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// GraphQL-level errors in an otherwise valid response
    #[error("GraphQL error: {message}")]
    GraphQl { message: String },

    /// Response payload did not deserialize
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Websocket transport failed
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Subscription handshake did not complete
    #[error("subscription handshake failed: {message}")]
    Handshake { message: String },

    /// The endpoint URL could not be rewritten for the websocket scheme
    #[error("invalid endpoint URL: {message}")]
    BadUrl { message: String },
}
