//! Timer loop driving [`Reconciler`] cycles.
//!
//! The first cycle starts immediately. Later ticks that fire while a cycle
//! is still running are skipped with a warning instead of queueing up.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::cycle::Reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
}

/// Non-blocking in-progress flag.
#[derive(Debug, Default)]
pub struct CycleGuard {
    running: AtomicBool,
}

/// Held for the duration of a cycle; releases the guard on drop.
#[derive(Debug)]
pub struct CyclePermit {
    guard: Arc<CycleGuard>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

impl CycleGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `Idle → Running`. Returns `None` if a cycle is already running.
    pub fn try_begin(self: &Arc<Self>) -> Option<CyclePermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit {
                guard: Arc::clone(self),
            })
    }

    pub fn state(&self) -> CycleState {
        if self.running.load(Ordering::Acquire) {
            CycleState::Running
        } else {
            CycleState::Idle
        }
    }
}

/// Run cycles every `interval` until `shutdown` resolves.
///
/// On shutdown the loop stops ticking and waits for an in-flight cycle to
/// finish before returning.
pub async fn run_scheduler<F>(reconciler: Arc<Reconciler>, interval: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let guard = CycleGuard::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    info!(
        interval_secs = interval.as_secs(),
        workers = reconciler.workers(),
        "sync scheduler started"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                let Some(permit) = guard.try_begin() else {
                    warn!("previous sync cycle still running, skipping tick");
                    continue;
                };
                let reconciler = Arc::clone(&reconciler);
                in_flight.spawn(async move {
                    let _permit = permit;
                    reconciler.run_and_log().await;
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "sync cycle task aborted");
                }
            }
        }
    }

    if guard.state() == CycleState::Running {
        info!("waiting for in-flight sync cycle to finish");
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "sync cycle task aborted");
        }
    }
    info!("sync scheduler stopped");
}
