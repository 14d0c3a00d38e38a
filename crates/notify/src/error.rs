//! Delivery error types.

use relay_core::SyncError;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord API error: {status} — {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl From<NotifyError> for SyncError {
    fn from(e: NotifyError) -> Self {
        SyncError::Notify(e.to_string())
    }
}
