//! Wallet-facing entry point.
//!
//! Wires the shielded session, the submission gate and the relay job store
//! behind one `PoolClient`, and loads their configuration.

pub mod client;
pub mod config;

pub use client::PoolClient;
pub use config::PriviConfig;
