use thiserror::Error;

/// Error surfaced by any collaborator the reconciliation engine talks to.
///
/// Adapter crates keep their own richer error enums and convert into this
/// one at the trait boundary.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("tracker error: {0}")]
    Tracker(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("no notification route configured for assignee '{0}'")]
    NoRoute(String),

    #[error("configuration error: {0}")]
    Config(String),
}
