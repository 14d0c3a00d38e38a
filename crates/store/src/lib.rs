//! Persistence adapters.
//!
//! - [`PgStore`]: notification and evaluation records in PostgreSQL
//! - [`FileSnapshotWriter`]: first-seen incident snapshots as JSON files

pub mod error;
pub mod pg;
pub mod snapshot;

pub use error::{SnapshotError, StoreError};
pub use pg::PgStore;
pub use snapshot::FileSnapshotWriter;
