//! In-memory keystore (for testing and ephemeral use).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use privi_types::AuthError;

use crate::keystore::{Credential, IdentityRef, Keystore};

/// Keystore backed by a credential → identity map.
pub struct MemoryKeystore {
    identities: Mutex<HashMap<String, IdentityRef>>,
    available: Mutex<bool>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self {
            identities: Mutex::new(HashMap::new()),
            available: Mutex::new(true),
        }
    }

    pub fn with_identity(self, credential: &str, identity: IdentityRef) -> Self {
        self.insert(credential, identity);
        self
    }

    pub fn insert(&self, credential: &str, identity: IdentityRef) {
        self.identities.lock().insert(credential.to_string(), identity);
    }

    /// Simulate the backing keystore going away (or coming back).
    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Keystore for MemoryKeystore {
    async fn unlock(&self, credential: &Credential) -> Result<IdentityRef, AuthError> {
        if !*self.available.lock() {
            return Err(AuthError::KeystoreUnavailable("memory keystore offline".into()));
        }
        self.identities
            .lock()
            .get(credential.expose())
            .cloned()
            .ok_or(AuthError::InvalidCredential)
    }
}
