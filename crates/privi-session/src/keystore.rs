use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use privi_types::AuthError;

/// Secret material typed by the user to unlock the shielded identity.
///
/// Never printed: `Debug` is redacted.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Opaque handle to an unlocked shielded identity.
///
/// The keystore keeps the key material; this only names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityRef(String);

impl IdentityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of shielded key material.
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Check `credential` and return a reference to the identity it unlocks.
    async fn unlock(&self, credential: &Credential) -> Result<IdentityRef, AuthError>;
}
