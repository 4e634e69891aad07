use thiserror::Error;

use crate::intent::{OperationKind, TxMethod};

/// Rejected while building a [`TransactionIntent`](crate::TransactionIntent).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Shielded session log-in failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,

    #[error("keystore unavailable: {0}")]
    KeystoreUnavailable(String),
}

/// Preconditions checked before an intent reaches the job store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("shielded session required")]
    SessionRequired,

    #[error("{kind} cannot be sent via {method}")]
    UnsupportedMethod { kind: OperationKind, method: TxMethod },
}

/// Relayer submission and transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relayer request failed: {0}")]
    Network(String),

    #[error("relayer rejected request{}: {message}", status_suffix(.status))]
    Rejected { status: Option<u16>, message: String },

    #[error("failed to parse relayer response: {0}")]
    InvalidResponse(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {}", s)).unwrap_or_default()
}

/// Failures reported by the wallet or the chain around a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("signature rejected: {0}")]
    SignatureRejected(String),
}

/// No result within a bounded window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timed out after {after_ms} ms waiting for {stage}")]
pub struct TimeoutError {
    pub stage: &'static str,
    pub after_ms: u64,
}

/// Privi core error types.
#[derive(Debug, Error)]
pub enum PriviError {
    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PriviError>;
