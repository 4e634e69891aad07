//! Shielded session lifecycle and submission gating.
//!
//! - `ShieldedSession`: log-in state of the shielded identity, independent
//!   of the public wallet
//! - `Keystore` / `WalletConnector`: collaborator contracts
//! - `SessionGate`: decides whether an intent may be submitted

pub mod gate;
pub mod keystore;
pub mod memory;
pub mod session;
pub mod wallet;

pub use gate::SessionGate;
pub use keystore::{Credential, IdentityRef, Keystore};
pub use memory::MemoryKeystore;
pub use session::{SessionState, ShieldedSession};
pub use wallet::WalletConnector;
