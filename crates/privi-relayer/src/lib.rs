//! Relayer contract and HTTP client.
//!
//! - `RelayClient`: submit an intent, then watch the relayer's job
//! - `StatusEvent`: what a watch yields
//! - `HttpRelayClient`: the REST implementation

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use privi_types::{Address, Amount, OperationKind, RelayError, TransactionIntent, TxHash};

pub mod relayer_client;

pub use relayer_client::HttpRelayClient;

/// The relayer's own reference for an accepted request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRef(String);

impl JobRef {
    pub fn new(r: impl Into<String>) -> Self {
        Self(r.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress of a relayed job, as reported by the relayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Broadcast with this transaction hash.
    Submitted(TxHash),
    /// Included, waiting for finality.
    Confirming,
    Confirmed,
    /// Relayer-supplied reason, verbatim.
    Failed(String),
}

impl StatusEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusEvent::Confirmed | StatusEvent::Failed(_))
    }
}

/// A relayer service.
///
/// `watch` is lazy and cancellable: nothing is polled until the stream is
/// driven, and dropping it stops all work. It ends after a terminal event.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn submit(&self, intent: &TransactionIntent) -> Result<JobRef, RelayError>;

    fn watch(&self, job_ref: &JobRef) -> BoxStream<'static, StatusEvent>;
}

/// Relayer connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub poll_ms: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout_ms: 30_000,
            poll_ms: 3_000,
        }
    }
}

/// Body posted to the relayer for a deposit or withdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerRequest {
    pub action: OperationKind,
    pub amount: Amount,
    pub recipient: Address,
}

impl RelayerRequest {
    pub fn from_intent(intent: &TransactionIntent) -> Self {
        Self {
            action: intent.kind(),
            amount: intent.amount().clone(),
            recipient: *intent.recipient(),
        }
    }
}
