use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `assignee:channel,assignee:channel` into a routing table.
///
/// Only the first `:` splits a pair, so assignee names cannot contain one.
/// Malformed or empty pairs are skipped.
pub fn parse_channel_map(raw: &str) -> BTreeMap<String, String> {
    let mut channels = BTreeMap::new();
    for pair in raw.split(',') {
        let Some((assignee, channel)) = pair.trim().split_once(':') else {
            continue;
        };
        let (assignee, channel) = (assignee.trim(), channel.trim());
        if !assignee.is_empty() && !channel.is_empty() {
            channels.insert(assignee.to_string(), channel.to_string());
        }
    }
    channels
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub tracker: TrackerConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub discord: DiscordConfig,
    pub postgres: PostgresConfig,
    pub eval: EvalConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RELAY_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RELAY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            tracker: TrackerConfig::from_env_profiled(p),
            sync: SyncConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            discord: DiscordConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            eval: EvalConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check that every value required to start is present.
    ///
    /// Reports all missing keys at once rather than the first one.
    pub fn validate(&self) -> Result<(), SyncError> {
        let mut missing = Vec::new();
        if self.tracker.url.is_empty() {
            missing.push("JIRA_URL");
        }
        if self.tracker.username.is_empty() {
            missing.push("JIRA_USERNAME");
        }
        if self.tracker.api_token.is_none() {
            missing.push("JIRA_API_TOKEN");
        }
        if self.tracker.project.is_empty() {
            missing.push("JIRA_PROJECT");
        }
        if self.discord.bot_token.is_none() {
            missing.push("DISCORD_BOT_TOKEN");
        }
        if !self.postgres.is_configured() {
            missing.push("PG_USERNAME");
        }
        if self.eval.enabled && self.eval.api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        if self.sync.workers == 0 {
            return Err(SyncError::Config("SYNC_WORKERS must be at least 1".into()));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  tracker:   url={}, project={}", self.tracker.url, self.tracker.project);
        tracing::info!(
            "  sync:      every {}m, {} workers",
            self.sync.interval_minutes,
            self.sync.workers
        );
        tracing::info!("  storage:   base_path={}", self.storage.base_path.display());
        tracing::info!(
            "  discord:   {} routed assignees, renotify={}m",
            self.discord.channels.len(),
            self.discord.renotify_interval_minutes
        );
        tracing::info!("  postgres:  host={}, db={}", self.postgres.host, self.postgres.database);
        if self.eval.enabled {
            tracing::info!("  eval:      model={}", self.eval.model);
        } else {
            tracing::info!("  eval:      disabled");
        }
    }
}

// ── Tracker (Jira) ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub url: String,
    pub username: String,
    pub api_token: Option<String>,
    pub project: String,
    /// Optional status filter.
    pub status: Option<String>,
    /// Optional assignee filter; several names are OR-ed together.
    pub assignees: Vec<String>,
    /// Restrict to issues in open sprints.
    pub current_sprint: bool,
    /// Custom field ids scanned in order for conclusion text.
    pub conclusion_fields: Vec<String>,
}

impl TrackerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "JIRA_URL", "").trim_end_matches('/').to_string(),
            username: profiled_env_or(p, "JIRA_USERNAME", ""),
            api_token: profiled_env_opt(p, "JIRA_API_TOKEN"),
            project: profiled_env_or(p, "JIRA_PROJECT", ""),
            status: profiled_env_opt(p, "JIRA_STATUS"),
            assignees: parse_list(&profiled_env_or(p, "JIRA_ASSIGNEE", "")),
            current_sprint: profiled_env_bool(p, "JIRA_CURRENT_SPRINT", false),
            conclusion_fields: parse_list(&profiled_env_or(p, "JIRA_CONCLUSION_FIELDS", "")),
        }
    }
}

// ── Sync loop ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub interval_minutes: u32,
    /// Worker pool size; kept small to respect chat and LLM rate limits.
    pub workers: usize,
}

impl SyncConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            interval_minutes: profiled_env_u32(p, "SYNC_INTERVAL_MINUTES", 5),
            workers: profiled_env_u32(p, "SYNC_WORKERS", 3) as usize,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes.max(1)) * 60)
    }
}

// ── Local snapshots ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_path: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_path: PathBuf::from(profiled_env_or(p, "STORAGE_BASE_PATH", "data/incidents")),
        }
    }
}

// ── Discord ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: Option<String>,
    pub guild_id: Option<String>,
    /// Assignee display name → channel id.
    pub channels: BTreeMap<String, String>,
    pub renotify_interval_minutes: u32,
}

impl DiscordConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            bot_token: profiled_env_opt(p, "DISCORD_BOT_TOKEN"),
            guild_id: profiled_env_opt(p, "DISCORD_GUILD_ID"),
            channels: parse_channel_map(&profiled_env_or(p, "DISCORD_CHANNELS", "")),
            renotify_interval_minutes: profiled_env_u32(p, "DISCORD_RENOTIFY_INTERVAL_MINUTES", 60),
        }
    }

    pub fn renotify_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.renotify_interval_minutes) * 60)
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "incident_relay"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── AI evaluation ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub prompt_phase1: PathBuf,
    pub prompt_phase2: PathBuf,
}

impl EvalConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "EVAL_ENABLED", true),
            api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            model: profiled_env_or(p, "EVAL_MODEL", "gemini-2.0-flash"),
            prompt_phase1: PathBuf::from(profiled_env_or(p, "EVAL_PROMPT_PHASE1", "prompts/phase1.md")),
            prompt_phase2: PathBuf::from(profiled_env_or(p, "EVAL_PROMPT_PHASE2", "prompts/phase2.md")),
        }
    }
}
