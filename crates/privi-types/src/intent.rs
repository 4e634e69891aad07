use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::error::IntentError;

/// Pool operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdraw,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who signs and broadcasts the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxMethod {
    /// The connected public wallet signs and sends.
    Wallet,
    /// A relayer service sends on the user's behalf.
    Relayer,
}

impl TxMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxMethod::Wallet => "wallet",
            TxMethod::Relayer => "relayer",
        }
    }
}

impl fmt::Display for TxMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested pool operation. Immutable once built.
///
/// The amount is always non-zero and the recipient is always a well-formed
/// address; [`TransactionIntent::new`] is the only way in, and
/// deserialization goes through it too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIntent")]
pub struct TransactionIntent {
    kind: OperationKind,
    amount: Amount,
    recipient: Address,
    method: TxMethod,
}

#[derive(Deserialize)]
struct RawIntent {
    kind: OperationKind,
    amount: Amount,
    recipient: Address,
    method: TxMethod,
}

impl TryFrom<RawIntent> for TransactionIntent {
    type Error = IntentError;

    fn try_from(raw: RawIntent) -> Result<Self, Self::Error> {
        Self::new(raw.kind, raw.amount, raw.recipient, raw.method)
    }
}

impl TransactionIntent {
    pub fn new(
        kind: OperationKind,
        amount: Amount,
        recipient: Address,
        method: TxMethod,
    ) -> Result<Self, IntentError> {
        if amount.is_zero() {
            return Err(IntentError::ZeroAmount);
        }
        Ok(Self { kind, amount, recipient, method })
    }

    /// Build from form input: a display amount and an unparsed recipient.
    pub fn from_input(
        kind: OperationKind,
        amount: &str,
        decimals: u32,
        recipient: &str,
        method: TxMethod,
    ) -> Result<Self, IntentError> {
        let amount = Amount::parse_units(amount, decimals)?;
        let recipient = Address::parse(recipient)?;
        Self::new(kind, amount, recipient, method)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn method(&self) -> TxMethod {
        self.method
    }
}
