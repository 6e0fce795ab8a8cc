//! Store error types.

/// Errors from bus-state snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Snapshot file I/O failed
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),
}
