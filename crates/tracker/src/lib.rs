//! Jira Cloud adapter: fetches the tracked incident set over REST v3.

pub mod adf;
pub mod client;
pub mod conclusion;
pub mod error;
pub mod jql;
pub mod wire;

pub use client::JiraClient;
pub use conclusion::{ConclusionChain, ConclusionRule};
pub use error::TrackerError;
pub use jql::build_jql;
