//! Store error type.

use thiserror::Error;
use uuid::Uuid;

/// Errors from the JSON record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem read/write failure.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("store serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// No record with the requested id.
    #[error("record {id} not found")]
    NotFound {
        /// The id that was looked up.
        id: Uuid,
    },
}
