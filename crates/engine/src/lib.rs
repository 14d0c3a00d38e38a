//! Reconciliation engine.
//!
//! One cycle fetches the tracker snapshot, batch-loads persisted state,
//! decides an [`Action`] per incident, applies the actions on a bounded
//! worker pool, then retires notifications for incidents that vanished
//! upstream or moved to another assignee:
//!
//! - [`cache`]: per-cycle immutable lookup tables (two batched queries)
//! - [`decision`]: pure per-incident decision function
//! - [`dispatcher`]: bounded worker pool applying actions
//! - [`cleanup`]: convergence pass
//! - [`cycle`]: the [`Reconciler`] tying a cycle together
//! - [`scheduler`]: timer loop with a non-overlapping cycle guard

pub mod cache;
pub mod cleanup;
pub mod cycle;
pub mod decision;
pub mod dispatcher;
pub mod scheduler;

pub use cache::StateCache;
pub use cleanup::{retire_missing, CleanupError, CleanupReport, Retraction};
pub use cycle::{Assessment, CycleError, CycleReport, CycleStatus, Reconciler};
pub use decision::{decide, Action, DecisionContext, DecisionPolicy};
pub use dispatcher::{dispatch, DispatchSummary, IncidentOutcome, Outcome, WorkerContext};
pub use scheduler::{run_scheduler, CycleGuard, CyclePermit, CycleState};
