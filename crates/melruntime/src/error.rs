use thiserror::Error;

/// Failures of the ephemeral data store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Key expired: {0}")]
    Expired(String),
}

/// Failures of the platform runtime services.
///
/// These are returned directly to the calling node, never recorded on an
/// envelope by the platform itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Workflow call {call_id} timed out after {seconds}s")]
    Timeout { call_id: String, seconds: u64 },

    #[error("Workflow call {call_id} was cancelled")]
    Cancelled { call_id: String },

    #[error("Workflow call {call_id} expired before its result arrived")]
    CallExpired { call_id: String },

    #[error("Failed to deliver result for workflow call {call_id}: {reason}")]
    DeliveryFailed { call_id: String, reason: String },

    #[error("Failed to trigger workflow {target}: {reason}")]
    TriggerFailed { target: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PlatformError {
    /// Whether the operation can safely be repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::Timeout { .. } | PlatformError::TriggerFailed { .. } | PlatformError::Http(_)
        )
    }
}
