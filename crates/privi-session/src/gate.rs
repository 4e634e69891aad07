use std::sync::Arc;

use privi_types::{GateError, OperationKind, TransactionIntent, TxMethod};

use crate::session::ShieldedSession;
use crate::wallet::WalletConnector;

/// Decides whether an intent may be handed to the job store.
///
/// Pure decision: reads wallet and session state, mutates nothing.
pub struct SessionGate {
    wallet: Arc<dyn WalletConnector>,
    session: Arc<ShieldedSession>,
}

impl SessionGate {
    pub fn new(wallet: Arc<dyn WalletConnector>, session: Arc<ShieldedSession>) -> Self {
        Self { wallet, session }
    }

    /// Methods that may carry an operation of `kind`.
    ///
    /// Deposits move funds out of the public wallet, so only the wallet can
    /// sign them.
    pub fn eligible_methods(kind: OperationKind) -> &'static [TxMethod] {
        match kind {
            OperationKind::Deposit => &[TxMethod::Wallet],
            OperationKind::Withdraw => &[TxMethod::Wallet, TxMethod::Relayer],
        }
    }

    pub fn can_submit(&self, intent: &TransactionIntent) -> Result<(), GateError> {
        if self.wallet.connected_address().is_none() {
            return Err(GateError::WalletNotConnected);
        }

        if intent.kind() == OperationKind::Withdraw && !self.session.current().is_logged_in {
            return Err(GateError::SessionRequired);
        }

        if !Self::eligible_methods(intent.kind()).contains(&intent.method()) {
            return Err(GateError::UnsupportedMethod {
                kind: intent.kind(),
                method: intent.method(),
            });
        }

        Ok(())
    }
}
