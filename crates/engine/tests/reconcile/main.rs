//! End-to-end reconciliation cycles against in-memory collaborators.

mod cycles;
mod failures;
mod mocks;
