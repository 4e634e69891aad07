//! Relay job orchestration.
//!
//! - `Job` and its state machine
//! - `RelayJobStore`: owns every job, dispatches it to the wallet or the
//!   relayer, follows it to a terminal state and publishes the live list

pub mod config;
pub mod job;
pub mod store;

pub use config::JobStoreConfig;
pub use job::{FailureKind, Job, JobFailure, JobId, JobState, Transition};
pub use store::RelayJobStore;
