//! incident-relay: mirrors tracked Jira incidents into per-assignee Discord
//! channels, optionally graded by an LLM.
//!
//! Runs a reconciliation cycle at startup and then on a fixed interval until
//! Ctrl-C. `--once` runs a single cycle and exits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use relay_core::config::{load_dotenv, Config};
use relay_engine::{run_scheduler, Assessment, CycleStatus, Reconciler};
use relay_llm::{GeminiProvider, PromptSet, TwoPhaseEvaluator};
use relay_notify::DiscordSink;
use relay_store::{FileSnapshotWriter, PgStore};
use relay_tracker::JiraClient;

// ── CLI ─────────────────────────────────────────────────────────────

/// Incident reconciliation daemon.
#[derive(Parser, Debug)]
#[command(name = "incident-relay", version, about)]
struct Cli {
    /// Run a single cycle and exit.
    #[arg(long, env = "RELAY_ONCE")]
    once: bool,

    /// Override the sync interval in minutes.
    #[arg(long, env = "RELAY_INTERVAL_MINUTES")]
    interval_minutes: Option<u32>,

    /// Override the worker pool size.
    #[arg(long, env = "RELAY_WORKERS")]
    workers: Option<usize>,

    /// Config profile; `PROD` makes `PROD_JIRA_URL` win over `JIRA_URL`.
    #[arg(long, env = "RELAY_PROFILE")]
    profile: Option<String>,
}

// ── Wiring ──────────────────────────────────────────────────────────

async fn build_reconciler(config: &Config) -> anyhow::Result<Reconciler> {
    let store = Arc::new(
        PgStore::connect(&config.postgres)
            .await
            .context("failed to initialise PostgreSQL")?,
    );

    let source = Arc::new(JiraClient::new(&config.tracker).context("invalid Jira settings")?);
    info!(jql = %source.jql(), "tracker query");

    let sink = Arc::new(
        DiscordSink::from_config(&config.discord, Some(config.tracker.url.clone()))
            .context("invalid Discord settings")?,
    );
    if sink.router().is_empty() {
        warn!("DISCORD_CHANNELS is empty, every incident will fail routing");
    }

    let snapshots = Arc::new(FileSnapshotWriter::new(config.storage.base_path.clone()));

    let assessment = if config.eval.enabled {
        let prompts = PromptSet::load(&config.eval.prompt_phase1, &config.eval.prompt_phase2)
            .context("failed to load evaluation prompts")?;
        let provider = Arc::new(GeminiProvider::from_config(&config.eval)?);
        let evaluator = TwoPhaseEvaluator::new(provider, prompts)?;
        Assessment::Enabled {
            evaluator: Arc::new(evaluator),
            store: store.clone(),
        }
    } else {
        Assessment::Disabled {
            renotify_interval: config.discord.renotify_interval(),
        }
    };
    info!(assessment = ?assessment, "decision policy selected");

    Ok(Reconciler::new(
        source,
        sink,
        store,
        snapshots,
        assessment,
        config.sync.workers,
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(minutes) = cli.interval_minutes {
        config.sync.interval_minutes = minutes;
    }
    if let Some(workers) = cli.workers {
        config.sync.workers = workers;
    }
    config.validate()?;
    config.log_summary();

    let reconciler = Arc::new(build_reconciler(&config).await?);

    if cli.once {
        info!("running a single sync cycle");
        return match reconciler.run_and_log().await {
            Some(report) if report.status() == CycleStatus::Ok => Ok(()),
            Some(report) => {
                warn!(errored = report.errored, "single cycle finished degraded");
                Ok(())
            }
            None => anyhow::bail!("sync cycle aborted: incidents could not be fetched"),
        };
    }

    let interval: Duration = config.sync.interval();
    run_scheduler(reconciler, interval, shutdown_signal()).await;
    info!("incident-relay exited cleanly");
    Ok(())
}
