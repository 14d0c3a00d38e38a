use relay_core::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Jira API error: {status} — {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse search response: {0}")]
    Parse(String),
    #[error("search did not finish within {0} pages")]
    PageLimit(usize),
    #[error("tracker not configured: {0}")]
    NotConfigured(String),
}

impl From<TrackerError> for SyncError {
    fn from(e: TrackerError) -> Self {
        SyncError::Tracker(e.to_string())
    }
}
