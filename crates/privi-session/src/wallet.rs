use async_trait::async_trait;

use privi_types::{Address, ChainError, TransactionIntent, TxHash};

/// The connected public wallet.
///
/// Connection negotiation happens elsewhere; this is only what the core
/// needs from a wallet once one is (or is not) connected.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Address of the connected account, if any.
    fn connected_address(&self) -> Option<Address>;

    /// Sign the pool call for `intent` and broadcast it.
    async fn sign_and_send(&self, intent: &TransactionIntent) -> Result<TxHash, ChainError>;

    /// Resolve once `tx_hash` is final on chain, or fail if it reverted.
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<(), ChainError>;
}
