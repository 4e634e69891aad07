//! Shared value types for the Privi wallet core.
//!
//! - Addresses and exact on-chain amounts
//! - Transaction intents (what the user asked for)
//! - The error taxonomy shared by every crate
//! - A small listener registry for change notifications

pub mod address;
pub mod amount;
pub mod error;
pub mod intent;
pub mod observe;

pub use address::Address;
pub use amount::Amount;
pub use error::{
    AuthError, ChainError, GateError, IntentError, PriviError, RelayError, Result, TimeoutError,
};
pub use intent::{OperationKind, TransactionIntent, TxMethod};
pub use observe::{Listeners, Subscription};

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// Broadcast reference returned by a wallet or relayer once a transaction is sent.
pub type TxHash = Hex;

/// Current unix time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
