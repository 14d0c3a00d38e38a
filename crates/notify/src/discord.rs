//! Discord REST v10 client.
//!
//! Sends one embed per notification through the bot API and deletes
//! superseded messages. Uses plain REST calls, no gateway connection.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::config::DiscordConfig;
use relay_core::traits::{MessageRetractor, NotificationPayload, NotificationSink};
use relay_core::SyncError;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::embed::build_embed;
use crate::error::NotifyError;
use crate::router::ChannelRouter;

const API_BASE: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Seconds to wait before retrying a rate-limited request.
///
/// Prefers the JSON `retry_after` (fractional seconds), then the
/// `Retry-After` header, rounding up.
pub fn retry_after_secs(body: &str, header: Option<&str>) -> u64 {
    serde_json::from_str::<RateLimitBody>(body)
        .ok()
        .map(|b| b.retry_after)
        .or_else(|| header.and_then(|h| h.trim().parse::<f64>().ok()))
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Bot-token Discord client routing notifications by assignee.
#[derive(Debug)]
pub struct DiscordSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    router: ChannelRouter,
    browse_base: Option<String>,
}

impl DiscordSink {
    /// `browse_base` is the tracker URL used to link incidents from embeds.
    pub fn from_config(config: &DiscordConfig, browse_base: Option<String>) -> Result<Self, NotifyError> {
        let bot_token = config
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| NotifyError::Config("Discord bot token must not be empty".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            bot_token,
            router: ChannelRouter::new(config.channels.clone()),
            browse_base,
        })
    }

    /// Point the client at a different API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel_id)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn error_from(response: reqwest::Response) -> NotifyError {
        let status = response.status();
        let header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return NotifyError::RateLimited {
                retry_after_secs: retry_after_secs(&body, header.as_deref()),
            };
        }
        NotifyError::Api {
            status: status.as_u16(),
            body,
        }
    }

    /// Post an embed and return the created message id.
    pub async fn post(&self, channel_id: &str, payload: &NotificationPayload) -> Result<String, NotifyError> {
        let embed = build_embed(
            &payload.incident,
            payload.evaluation.as_ref(),
            self.browse_base.as_deref(),
            Utc::now(),
        );
        let body = serde_json::json!({ "embeds": [embed] });

        debug!(channel_id, incident = %payload.incident.key, "posting Discord message");
        let response = self
            .client
            .post(self.messages_url(channel_id))
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| NotifyError::Parse(format!("message id missing from response: {e}")))?;
        info!(channel_id, message_id = %created.id, "Discord message sent");
        Ok(created.id)
    }

    /// Delete a message. A message that no longer exists counts as deleted.
    pub async fn remove(&self, channel_id: &str, message_id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/{}", self.messages_url(channel_id), message_id);
        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(channel_id, message_id, "message already gone");
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }
        debug!(channel_id, message_id, "Discord message deleted");
        Ok(())
    }
}

#[async_trait]
impl MessageRetractor for DiscordSink {
    async fn delete(&self, route: &str, message_id: &str) -> Result<(), SyncError> {
        Ok(self.remove(route, message_id).await?)
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn route_for(&self, assignee: &str) -> Option<String> {
        self.router.route(assignee).map(str::to_string)
    }

    async fn send(&self, route: &str, payload: &NotificationPayload) -> Result<String, SyncError> {
        Ok(self.post(route, payload).await?)
    }
}
