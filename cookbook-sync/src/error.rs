//! Error types for cookbook-sync

use cookbook_common::api::QueryError;
use thiserror::Error;

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Synchronization error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level failure talking to the gateway or object store
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Gateway answered with query-layer error objects
    #[error("Query failed: {}", join_errors(.0))]
    Query(Vec<QueryError>),

    /// Gateway answered without data or errors
    #[error("Gateway returned no data for {0}")]
    EmptyResponse(&'static str),

    /// Gateway answered with a non-success HTTP status
    #[error("Gateway returned HTTP {status}")]
    GatewayStatus { status: u16 },

    /// Object storage refused the write
    #[error("Storage rejected upload with HTTP {status}")]
    StorageRejected { status: u16 },

    /// No write credential was issued for the asset
    #[error("No upload credential issued for {0}")]
    CredentialUnavailable(String),

    /// Operation is disabled while a record is being edited
    #[error("A recipe is being edited")]
    EditInProgress,

    /// Record not present in the store
    #[error("Recipe not found: {0}")]
    NotFound(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// cookbook-common error
    #[error("Common error: {0}")]
    Common(#[from] cookbook_common::Error),
}

impl SyncError {
    /// Whether repeating the same request may succeed
    ///
    /// Transport failures and server-side (5xx) statuses are transient.
    /// Query errors, client-side statuses and local errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(e) => !e.is_builder() && !e.is_decode(),
            SyncError::GatewayStatus { status } | SyncError::StorageRejected { status } => {
                *status >= 500
            }
            _ => false,
        }
    }
}

fn join_errors(errors: &[QueryError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
