//! Shielded identity session.
//!
//! Log-in state lives apart from the public wallet connection: a user can be
//! logged in with no wallet connected and the other way round.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use privi_types::{AuthError, Listeners, Subscription};

use crate::keystore::{Credential, IdentityRef, Keystore};

/// Read-only view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_logged_in: bool,
    pub identity_ref: Option<IdentityRef>,
}

impl SessionState {
    fn from_identity(identity: &Option<IdentityRef>) -> Self {
        Self {
            is_logged_in: identity.is_some(),
            identity_ref: identity.clone(),
        }
    }
}

/// The user's shielded session. One per application instance; share it
/// with `Arc`.
pub struct ShieldedSession {
    keystore: Arc<dyn Keystore>,
    identity: Mutex<Option<IdentityRef>>,
    listeners: Listeners<SessionState>,
}

impl ShieldedSession {
    pub fn new(keystore: Arc<dyn Keystore>) -> Self {
        Self {
            keystore,
            identity: Mutex::new(None),
            listeners: Listeners::new(),
        }
    }

    /// Unlock the shielded identity for `credential`.
    ///
    /// On failure the session is left exactly as it was.
    pub async fn log_in(&self, credential: &Credential) -> Result<IdentityRef, AuthError> {
        let identity = match self.keystore.unlock(credential).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "shielded log-in failed");
                return Err(e);
            }
        };

        let mut current = self.identity.lock();
        if current.as_ref() == Some(&identity) {
            tracing::debug!(identity = %identity, "already logged in");
            return Ok(identity);
        }

        *current = Some(identity.clone());
        let state = SessionState::from_identity(&current);
        tracing::info!(identity = %identity, "shielded session logged in");
        self.listeners.publish(current, state);

        Ok(identity)
    }

    /// Drop the identity. Safe to call when already logged out.
    pub fn log_out(&self) {
        let mut current = self.identity.lock();
        if current.take().is_none() {
            return;
        }

        let state = SessionState::from_identity(&current);
        tracing::info!("shielded session logged out");
        self.listeners.publish(current, state);
    }

    pub fn current(&self) -> SessionState {
        SessionState::from_identity(&self.identity.lock())
    }

    pub fn is_logged_in(&self) -> bool {
        self.identity.lock().is_some()
    }

    /// Called with the new state after every actual change. Listeners may
    /// read the session.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}
