//! Discord delivery of incident notifications.
//!
//! This crate provides:
//! - [`ChannelRouter`] mapping assignees to Discord channel ids
//! - Embed rendering for plain and evaluated incidents
//! - [`DiscordSink`], a REST v10 client implementing the engine's sink and
//!   retraction traits

pub mod discord;
pub mod embed;
pub mod error;
pub mod router;

pub use discord::DiscordSink;
pub use embed::{build_embed, Embed, EmbedField};
pub use error::NotifyError;
pub use router::ChannelRouter;
