//! Job model and state machine.
//!
//! ```text
//! Pending --accepted--> Submitted --broadcast--> Confirming --final--> Confirmed
//!    |                     |                        |
//!    +-------- failed -----+--------- failed -------+--> Failed
//!    +-------- abandon ----+--------- abandon ------+--> Abandoned
//! ```
//!
//! Only the edges above exist: a job is never confirmed without having been
//! broadcast, so a confirmed job always carries its transaction hash.
//! Confirmed, Failed and Abandoned are final.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use privi_relayer::StatusEvent;
use privi_types::{now_ms, ChainError, RelayError, TimeoutError, TransactionIntent, TxHash};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    Confirming,
    Confirmed,
    Failed,
    Abandoned,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Confirmed | JobState::Failed | JobState::Abandoned)
    }

    /// State after `transition`, or `None` if it must be discarded.
    pub fn next(self, transition: &Transition) -> Option<JobState> {
        if self.is_terminal() {
            return None;
        }
        match (self, transition) {
            (_, Transition::Failed(_)) => Some(JobState::Failed),
            (_, Transition::Abandon) => Some(JobState::Abandoned),
            (JobState::Pending, Transition::Accepted) => Some(JobState::Submitted),
            (JobState::Submitted, Transition::Broadcast(_)) => Some(JobState::Confirming),
            (JobState::Confirming, Transition::Confirmed) => Some(JobState::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Submitted => "submitted",
            JobState::Confirming => "confirming",
            JobState::Confirmed => "confirmed",
            JobState::Failed => "failed",
            JobState::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkError,
    RelayerRejected,
    ChainReverted,
    Timeout,
    Unknown,
}

/// Why a job failed: a classification plus the collaborator's own words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

impl From<&RelayError> for JobFailure {
    fn from(e: &RelayError) -> Self {
        match e {
            RelayError::Network(m) => Self::new(FailureKind::NetworkError, m.clone()),
            RelayError::Rejected { message, .. } => {
                Self::new(FailureKind::RelayerRejected, message.clone())
            }
            RelayError::InvalidResponse(m) => Self::new(FailureKind::Unknown, m.clone()),
        }
    }
}

impl From<&ChainError> for JobFailure {
    fn from(e: &ChainError) -> Self {
        match e {
            ChainError::Reverted(m) => Self::new(FailureKind::ChainReverted, m.clone()),
            ChainError::Rpc(m) => Self::new(FailureKind::NetworkError, m.clone()),
            ChainError::SignatureRejected(m) => Self::new(FailureKind::Unknown, m.clone()),
        }
    }
}

impl From<&TimeoutError> for JobFailure {
    fn from(e: &TimeoutError) -> Self {
        Self::new(FailureKind::Timeout, e.to_string())
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Relayer accepted the request, or the wallet signed it.
    Accepted,
    Broadcast(TxHash),
    /// Relayer progress note. Never moves a job on its own: only a
    /// broadcast with a hash does.
    Confirming,
    Confirmed,
    Failed(JobFailure),
    Abandon,
}

impl Transition {
    /// Translate a relayer event for a job currently in `state`.
    ///
    /// A relayer-reported failure before broadcast is a rejection; after
    /// broadcast it is the chain reverting.
    pub fn from_status(event: StatusEvent, state: JobState) -> Self {
        match event {
            StatusEvent::Submitted(tx_hash) => Transition::Broadcast(tx_hash),
            StatusEvent::Confirming => Transition::Confirming,
            StatusEvent::Confirmed => Transition::Confirmed,
            StatusEvent::Failed(reason) => {
                let kind = if state == JobState::Confirming {
                    FailureKind::ChainReverted
                } else {
                    FailureKind::RelayerRejected
                };
                Transition::Failed(JobFailure::new(kind, reason))
            }
        }
    }
}

/// One submitted intent and its progress.
///
/// Only the job store creates or changes jobs; everyone else sees clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub intent: TransactionIntent,
    pub state: JobState,
    pub tx_hash: Option<TxHash>,
    /// Set only in `Failed`.
    pub error: Option<JobFailure>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Job {
    pub(crate) fn new(intent: TransactionIntent) -> Self {
        let now = now_ms();
        Self {
            id: JobId::next(),
            intent,
            state: JobState::Pending,
            tx_hash: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply `transition`. Returns false when it was discarded.
    pub(crate) fn apply(&mut self, transition: Transition) -> bool {
        let Some(next) = self.state.next(&transition) else {
            return false;
        };

        match transition {
            Transition::Broadcast(tx_hash) => self.tx_hash = Some(tx_hash),
            Transition::Failed(failure) => self.error = Some(failure),
            _ => {}
        }
        self.state = next;
        self.updated_at = now_ms().max(self.updated_at);
        true
    }
}
