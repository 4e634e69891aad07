use std::sync::Arc;

use tokio::runtime::Handle;

use privi_jobs::{Job, JobId, RelayJobStore};
use privi_relayer::{HttpRelayClient, RelayClient};
use privi_session::{Credential, Keystore, SessionGate, SessionState, ShieldedSession, WalletConnector};
use privi_types::{
    AuthError, GateError, OperationKind, Result, Subscription, TransactionIntent, TxMethod,
};

use crate::config::PriviConfig;

/// Everything a wallet UI needs: session, submission gate and job list.
///
/// `submit` only hands an intent to the job store once the gate allows it.
/// Job work runs on the runtime passed in at construction.
pub struct PoolClient {
    session: Arc<ShieldedSession>,
    gate: SessionGate,
    jobs: RelayJobStore,
}

impl PoolClient {
    pub fn new(
        config: &PriviConfig,
        wallet: Arc<dyn WalletConnector>,
        relay: Arc<dyn RelayClient>,
        keystore: Arc<dyn Keystore>,
        runtime: Handle,
    ) -> Self {
        let session = Arc::new(ShieldedSession::new(keystore));
        let gate = SessionGate::new(wallet.clone(), session.clone());
        let jobs = RelayJobStore::new(config.jobs.clone(), wallet, relay, runtime);
        Self { session, gate, jobs }
    }

    /// Same as `new`, talking to the relayer over HTTP.
    pub fn from_config(
        config: &PriviConfig,
        wallet: Arc<dyn WalletConnector>,
        keystore: Arc<dyn Keystore>,
        runtime: Handle,
    ) -> Self {
        let relay = Arc::new(HttpRelayClient::from_config(&config.relayer));
        Self::new(config, wallet, relay, keystore, runtime)
    }

    // ---- jobs ----

    /// Check the intent against the gate, then record and dispatch it.
    ///
    /// A gate refusal creates no job.
    pub fn submit(&self, intent: TransactionIntent) -> Result<JobId> {
        if let Err(e) = self.gate.can_submit(&intent) {
            tracing::info!(kind = %intent.kind(), method = %intent.method(), reason = %e, "submission refused");
            return Err(e.into());
        }
        Ok(self.jobs.submit(intent))
    }

    pub fn list(&self) -> Vec<Job> {
        self.jobs.list()
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.get(id)
    }

    pub fn remove(&self, id: JobId) -> bool {
        self.jobs.remove(id)
    }

    pub fn subscribe_jobs<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Job]) + Send + Sync + 'static,
    {
        self.jobs.subscribe(listener)
    }

    // ---- session ----

    pub async fn log_in(&self, credential: &Credential) -> Result<SessionState> {
        self.session.log_in(credential).await?;
        Ok(self.session.current())
    }

    pub fn log_out(&self) {
        self.session.log_out();
    }

    /// Log out if logged in, otherwise log in with `credential`.
    ///
    /// Logging in without a credential fails with `InvalidCredential` and
    /// leaves the session logged out.
    pub async fn toggle_session(&self, credential: Option<&Credential>) -> Result<SessionState> {
        if self.session.is_logged_in() {
            self.session.log_out();
            return Ok(self.session.current());
        }
        match credential {
            Some(credential) => self.log_in(credential).await,
            None => Err(AuthError::InvalidCredential.into()),
        }
    }

    pub fn session(&self) -> SessionState {
        self.session.current()
    }

    pub fn subscribe_session<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.session.subscribe(listener)
    }

    // ---- gate ----

    pub fn can_submit(&self, intent: &TransactionIntent) -> std::result::Result<(), GateError> {
        self.gate.can_submit(intent)
    }

    pub fn eligible_methods(kind: OperationKind) -> &'static [TxMethod] {
        SessionGate::eligible_methods(kind)
    }

    /// Stop every background job task. Jobs keep their last state.
    pub fn shutdown(&self) {
        self.jobs.shutdown();
    }
}
