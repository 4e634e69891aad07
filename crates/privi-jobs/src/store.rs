//! The relay job store.
//!
//! Every submitted intent becomes a `Job` here. The store spawns one task per
//! job that dispatches it (wallet signature or relayer submission) and then
//! follows it to a terminal state. All transitions go through one lock, so a
//! job's history is applied in order and a removed job can never come back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use privi_relayer::{RelayClient, StatusEvent};
use privi_session::WalletConnector;
use privi_types::{Listeners, Subscription, TimeoutError, TransactionIntent, TxMethod};

use crate::config::JobStoreConfig;
use crate::job::{FailureKind, Job, JobFailure, JobId, JobState, Transition};

/// Owns all jobs and publishes the live list, newest first.
pub struct RelayJobStore {
    shared: Arc<Shared>,
}

struct Shared {
    config: JobStoreConfig,
    runtime: Handle,
    wallet: Arc<dyn WalletConnector>,
    relay: Arc<dyn RelayClient>,
    state: Mutex<StoreState>,
    listeners: Listeners<Vec<Job>>,
}

#[derive(Default)]
struct StoreState {
    /// Newest first.
    jobs: VecDeque<Job>,
    tasks: HashMap<JobId, JoinHandle<()>>,
    closed: bool,
}

impl StoreState {
    fn snapshot(&self) -> Vec<Job> {
        self.jobs.iter().cloned().collect()
    }

    fn position(&self, id: JobId) -> Option<usize> {
        self.jobs.iter().position(|j| j.id == id)
    }

    /// Drop the oldest terminal jobs until the list fits `limit`.
    fn evict(&mut self, limit: Option<usize>) {
        let Some(limit) = limit else { return };
        while self.jobs.len() > limit {
            let Some(pos) = self.jobs.iter().rposition(|j| j.state.is_terminal()) else {
                break;
            };
            if let Some(job) = self.jobs.remove(pos) {
                tracing::debug!(job_id = %job.id, state = %job.state, "job evicted");
            }
        }
    }
}

fn is_live(state: Option<JobState>) -> bool {
    matches!(state, Some(s) if !s.is_terminal())
}

impl RelayJobStore {
    /// Job tasks are spawned on `runtime`, so the store itself can be used
    /// from any thread.
    pub fn new(
        config: JobStoreConfig,
        wallet: Arc<dyn WalletConnector>,
        relay: Arc<dyn RelayClient>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                runtime,
                wallet,
                relay,
                state: Mutex::new(StoreState::default()),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Record `intent` as a new Pending job and start dispatching it.
    ///
    /// Returns at once; progress arrives through `subscribe`/`list`.
    /// Identical intents are not merged.
    pub fn submit(&self, intent: TransactionIntent) -> JobId {
        let job = Job::new(intent.clone());
        let id = job.id;

        let mut state = self.shared.state.lock();
        state.jobs.push_front(job);
        tracing::info!(
            job_id = %id,
            kind = %intent.kind(),
            method = %intent.method(),
            amount = %intent.amount(),
            "job submitted"
        );

        if state.closed {
            if let Some(pos) = state.position(id) {
                state.jobs[pos].apply(Transition::Failed(JobFailure::new(
                    FailureKind::Unknown,
                    "job store is shut down",
                )));
            }
            tracing::warn!(job_id = %id, "job submitted after shutdown");
        } else {
            let task = self.shared.runtime.spawn(self.shared.clone().dispatch(id, intent));
            state.tasks.insert(id, task);
        }

        state.evict(self.shared.config.retention_limit);
        let snapshot = state.snapshot();
        self.shared.listeners.publish(state, snapshot);
        id
    }

    /// Snapshot of all jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        self.shared.state.lock().snapshot()
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        let state = self.shared.state.lock();
        state.position(id).map(|pos| state.jobs[pos].clone())
    }

    /// Stop following `id` and delete it.
    ///
    /// A live job is first moved to Abandoned, and subscribers see that
    /// before they see it disappear. Both happen under one lock, so nothing
    /// else can touch the job in between. Returns false if there was no such
    /// job.
    pub fn remove(&self, id: JobId) -> bool {
        let mut state = self.shared.state.lock();
        let Some(pos) = state.position(id) else {
            return false;
        };

        if let Some(task) = state.tasks.remove(&id) {
            task.abort();
        }

        let mut snapshots = Vec::with_capacity(2);
        if state.jobs[pos].apply(Transition::Abandon) {
            tracing::info!(job_id = %id, "job abandoned");
            snapshots.push(state.snapshot());
        }

        state.jobs.remove(pos);
        tracing::info!(job_id = %id, "job removed");

        snapshots.push(state.snapshot());
        self.shared.listeners.publish_all(state, snapshots);
        true
    }

    /// Called with the full list after every change, in mutation order.
    ///
    /// Listeners may call back into the store, including `list`, `submit`
    /// and `remove`; changes they make are delivered after the current
    /// notification.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Job]) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(move |jobs: &Vec<Job>| listener(jobs.as_slice()))
    }

    /// Cancel every outstanding dispatch and watch. Jobs keep their last state.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let cancelled = state.tasks.len();
        for (_, task) in state.tasks.drain() {
            task.abort();
        }
        tracing::info!(cancelled, "job store shut down");
    }
}

impl Drop for RelayJobStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    async fn dispatch(self: Arc<Self>, id: JobId, intent: TransactionIntent) {
        match intent.method() {
            TxMethod::Relayer => self.run_relayed(id, &intent).await,
            TxMethod::Wallet => self.run_wallet(id, &intent).await,
        }
        self.state.lock().tasks.remove(&id);
    }

    fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.config.submit_timeout_ms)
    }

    fn watch_timeout(&self) -> Duration {
        Duration::from_millis(self.config.watch_timeout_ms)
    }

    fn timed_out(&self, id: JobId, stage: &'static str, after: Duration) {
        let e = TimeoutError { stage, after_ms: after.as_millis() as u64 };
        self.apply(id, Transition::Failed(JobFailure::from(&e)));
    }

    async fn run_relayed(&self, id: JobId, intent: &TransactionIntent) {
        let limit = self.submit_timeout();
        let job_ref = match tokio::time::timeout(limit, self.relay.submit(intent)).await {
            Ok(Ok(job_ref)) => job_ref,
            Ok(Err(e)) => {
                self.apply(id, Transition::Failed(JobFailure::from(&e)));
                return;
            }
            Err(_) => {
                self.timed_out(id, "relayer acceptance", limit);
                return;
            }
        };

        tracing::debug!(job_id = %id, job_ref = %job_ref, "watching relayer job");
        if !is_live(self.apply(id, Transition::Accepted)) {
            return;
        }

        let limit = self.watch_timeout();
        let events = self.relay.watch(&job_ref);
        if tokio::time::timeout(limit, self.follow(id, events)).await.is_err() {
            self.timed_out(id, "relayer confirmation", limit);
        }
    }

    /// Feed relayer events into the job until it is terminal or gone.
    async fn follow(&self, id: JobId, mut events: BoxStream<'static, StatusEvent>) {
        while let Some(event) = events.next().await {
            let confirmed = event == StatusEvent::Confirmed;
            let after = self.update(id, |job| Transition::from_status(event, job.state));
            if !is_live(after) {
                return;
            }
            if confirmed {
                // only a job that was broadcast can be confirmed
                self.apply(
                    id,
                    Transition::Failed(JobFailure::new(
                        FailureKind::Unknown,
                        "relayer reported confirmation without a transaction hash",
                    )),
                );
                return;
            }
        }
        self.apply(
            id,
            Transition::Failed(JobFailure::new(
                FailureKind::NetworkError,
                "relayer status stream ended before a terminal event",
            )),
        );
    }

    async fn run_wallet(&self, id: JobId, intent: &TransactionIntent) {
        let limit = self.submit_timeout();
        let tx_hash = match tokio::time::timeout(limit, self.wallet.sign_and_send(intent)).await {
            Ok(Ok(tx_hash)) => tx_hash,
            Ok(Err(e)) => {
                self.apply(id, Transition::Failed(JobFailure::from(&e)));
                return;
            }
            Err(_) => {
                self.timed_out(id, "wallet signature", limit);
                return;
            }
        };

        if !is_live(self.apply(id, Transition::Accepted)) {
            return;
        }
        if !is_live(self.apply(id, Transition::Broadcast(tx_hash.clone()))) {
            return;
        }

        let limit = self.watch_timeout();
        match tokio::time::timeout(limit, self.wallet.wait_for_receipt(&tx_hash)).await {
            Ok(Ok(())) => {
                self.apply(id, Transition::Confirmed);
            }
            Ok(Err(e)) => {
                self.apply(id, Transition::Failed(JobFailure::from(&e)));
            }
            Err(_) => self.timed_out(id, "transaction receipt", limit),
        }
    }

    fn apply(&self, id: JobId, transition: Transition) -> Option<JobState> {
        self.update(id, move |_| transition)
    }

    /// Apply the transition built by `make` to job `id`.
    ///
    /// Returns the job's state afterwards, or `None` once the job is gone.
    fn update<F>(&self, id: JobId, make: F) -> Option<JobState>
    where
        F: FnOnce(&Job) -> Transition,
    {
        let mut state = self.state.lock();
        let Some(pos) = state.position(id) else {
            tracing::debug!(job_id = %id, "event for removed job ignored");
            return None;
        };

        let job = &mut state.jobs[pos];
        let before = job.state;
        let transition = make(job);
        if !job.apply(transition) {
            tracing::debug!(job_id = %id, state = %before, "stale event ignored");
            return Some(before);
        }

        let after = job.state;
        match (&job.error, after) {
            (Some(failure), JobState::Failed) => tracing::warn!(
                job_id = %id,
                kind = ?failure.kind,
                reason = %failure.reason,
                "job failed"
            ),
            (_, JobState::Confirmed) => {
                tracing::info!(job_id = %id, tx_hash = ?job.tx_hash, "job confirmed")
            }
            _ => tracing::debug!(job_id = %id, from = %before, to = %after, "job transition"),
        }

        if after.is_terminal() {
            state.evict(self.config.retention_limit);
        }
        let snapshot = state.snapshot();
        self.listeners.publish(state, snapshot);
        Some(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use privi_relayer::JobRef;
    use privi_types::{Address, Amount, ChainError, OperationKind, RelayError, TxHash};

    #[derive(Default)]
    struct ScriptedRelay {
        accepted: AtomicUsize,
        watchers: Mutex<HashMap<JobRef, mpsc::UnboundedSender<StatusEvent>>>,
        reject: Mutex<Option<RelayError>>,
        hang: AtomicBool,
    }

    impl ScriptedRelay {
        fn is_watching(&self, job_ref: &str) -> bool {
            self.watchers.lock().contains_key(&JobRef::new(job_ref))
        }

        fn send(&self, job_ref: &str, event: StatusEvent) -> bool {
            match self.watchers.lock().get(&JobRef::new(job_ref)) {
                Some(tx) => tx.unbounded_send(event).is_ok(),
                None => false,
            }
        }

        fn close(&self, job_ref: &str) {
            self.watchers.lock().remove(&JobRef::new(job_ref));
        }
    }

    #[async_trait]
    impl RelayClient for ScriptedRelay {
        async fn submit(&self, _intent: &TransactionIntent) -> Result<JobRef, RelayError> {
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let reject = self.reject.lock().clone();
            if let Some(e) = reject {
                return Err(e);
            }
            let n = self.accepted.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(JobRef::new(format!("relay-{}", n)))
        }

        fn watch(&self, job_ref: &JobRef) -> BoxStream<'static, StatusEvent> {
            let (tx, rx) = mpsc::unbounded();
            self.watchers.lock().insert(job_ref.clone(), tx);
            rx.boxed()
        }
    }

    struct ScriptedWallet {
        signed: AtomicUsize,
        receipt: Mutex<Result<(), ChainError>>,
    }

    impl Default for ScriptedWallet {
        fn default() -> Self {
            Self { signed: AtomicUsize::new(0), receipt: Mutex::new(Ok(())) }
        }
    }

    #[async_trait]
    impl WalletConnector for ScriptedWallet {
        fn connected_address(&self) -> Option<Address> {
            Address::parse("0x1111111111111111111111111111111111111111").ok()
        }

        async fn sign_and_send(&self, _intent: &TransactionIntent) -> Result<TxHash, ChainError> {
            let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("0xw{}", n))
        }

        async fn wait_for_receipt(&self, _tx_hash: &TxHash) -> Result<(), ChainError> {
            let receipt = self.receipt.lock().clone();
            receipt
        }
    }

    fn intent(kind: OperationKind, method: TxMethod) -> TransactionIntent {
        TransactionIntent::new(
            kind,
            Amount::from(100u64),
            Address::parse("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap(),
            method,
        )
        .unwrap()
    }

    fn relayed() -> TransactionIntent {
        intent(OperationKind::Withdraw, TxMethod::Relayer)
    }

    fn setup(config: JobStoreConfig) -> (Arc<ScriptedWallet>, Arc<ScriptedRelay>, RelayJobStore) {
        let wallet = Arc::new(ScriptedWallet::default());
        let relay = Arc::new(ScriptedRelay::default());
        let store = RelayJobStore::new(config, wallet.clone(), relay.clone(), Handle::current());
        (wallet, relay, store)
    }

    /// Broadcast then confirm a relayer job.
    fn confirm(relay: &ScriptedRelay, job_ref: &str, tx_hash: &str) {
        relay.send(job_ref, StatusEvent::Submitted(tx_hash.into()));
        relay.send(job_ref, StatusEvent::Confirmed);
    }

    /// Every (id, state) pair published, in delivery order, plus list lengths.
    fn record(store: &RelayJobStore) -> Arc<Mutex<Vec<Vec<(JobId, JobState)>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        store.subscribe(move |jobs| {
            s.lock().push(jobs.iter().map(|j| (j.id, j.state)).collect());
        });
        seen
    }

    fn states_of(seen: &[Vec<(JobId, JobState)>], id: JobId) -> Vec<JobState> {
        let mut states: Vec<JobState> = Vec::new();
        for snapshot in seen {
            if let Some((_, s)) = snapshot.iter().find(|(jid, _)| *jid == id) {
                if states.last() != Some(s) {
                    states.push(*s);
                }
            }
        }
        states
    }

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..1_000 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("store did not settle");
    }

    fn state(store: &RelayJobStore, id: JobId) -> Option<JobState> {
        store.get(id).map(|j| j.state)
    }

    #[tokio::test]
    async fn test_relayed_job_confirmed() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let id = store.submit(relayed());
        assert_eq!(state(&store, id), Some(JobState::Pending));

        settle(|| relay.is_watching("relay-1")).await;
        assert_eq!(state(&store, id), Some(JobState::Submitted));

        assert!(relay.send("relay-1", StatusEvent::Submitted("0x123".into())));
        assert!(relay.send("relay-1", StatusEvent::Confirmed));
        settle(|| state(&store, id) == Some(JobState::Confirmed)).await;

        let jobs = store.list();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].state, JobState::Confirmed);
        assert_eq!(jobs[0].tx_hash.as_deref(), Some("0x123"));
        assert!(jobs[0].error.is_none());
    }

    #[tokio::test]
    async fn test_remove_abandons_and_ignores_late_events() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let seen = record(&store);

        let id = store.submit(relayed());
        settle(|| relay.is_watching("relay-1")).await;
        relay.send("relay-1", StatusEvent::Submitted("0xabc".into()));
        settle(|| state(&store, id) == Some(JobState::Confirming)).await;

        assert!(store.remove(id));
        assert!(store.list().is_empty());

        // late answer from the relayer
        let _ = relay.send("relay-1", StatusEvent::Confirmed);
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.shared.apply(id, Transition::Confirmed), None);

        assert!(store.list().is_empty());
        let states = states_of(&seen.lock(), id);
        assert_eq!(
            states,
            vec![JobState::Pending, JobState::Submitted, JobState::Confirming, JobState::Abandoned]
        );
        assert!(seen.lock().last().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_and_terminal() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let seen = record(&store);

        let id = store.submit(relayed());
        settle(|| relay.is_watching("relay-1")).await;
        confirm(&relay, "relay-1", "0x10");
        settle(|| state(&store, id) == Some(JobState::Confirmed)).await;

        let before = seen.lock().len();
        assert!(store.remove(id));
        // one deletion snapshot, no Abandoned transition
        assert_eq!(seen.lock().len(), before + 1);
        assert!(!states_of(&seen.lock(), id).contains(&JobState::Abandoned));

        assert!(!store.remove(id));
        assert_eq!(seen.lock().len(), before + 1);
    }

    #[tokio::test]
    async fn test_identical_intents_are_distinct_jobs() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let a = store.submit(relayed());
        let b = store.submit(relayed());
        assert_ne!(a, b);

        let mut snapshot = store.list();
        assert_eq!(snapshot.iter().map(|j| j.id).collect::<Vec<_>>(), vec![b, a]);
        snapshot.clear();
        assert_eq!(store.list().len(), 2);

        settle(|| relay.is_watching("relay-1") && relay.is_watching("relay-2")).await;
        let ref_of = |id: JobId| if id == a { "relay-1" } else { "relay-2" };
        // dispatch order follows spawn order
        relay.send(ref_of(a), StatusEvent::Failed("fee too low".into()));
        confirm(&relay, ref_of(b), "0x20");

        settle(|| state(&store, a) == Some(JobState::Failed)).await;
        settle(|| state(&store, b) == Some(JobState::Confirmed)).await;
    }

    #[tokio::test]
    async fn test_rejected_submission_fails_job() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        *relay.reject.lock() = Some(RelayError::Rejected {
            status: Some(400),
            message: "nullifier already spent".into(),
        });

        let id = store.submit(relayed());
        settle(|| state(&store, id) == Some(JobState::Failed)).await;

        let job = store.get(id).unwrap();
        let error = job.error.unwrap();
        assert_eq!(error.kind, FailureKind::RelayerRejected);
        assert_eq!(error.reason, "nullifier already spent");
        assert!(!relay.is_watching("relay-1"));
    }

    #[tokio::test]
    async fn test_relayer_failure_classified_by_stage() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let early = store.submit(relayed());
        let late = store.submit(relayed());
        settle(|| relay.is_watching("relay-1") && relay.is_watching("relay-2")).await;

        relay.send("relay-1", StatusEvent::Failed("bad proof".into()));
        relay.send("relay-2", StatusEvent::Submitted("0x55".into()));
        relay.send("relay-2", StatusEvent::Failed("execution reverted".into()));

        settle(|| {
            state(&store, early) == Some(JobState::Failed)
                && state(&store, late) == Some(JobState::Failed)
        })
        .await;

        assert_eq!(store.get(early).unwrap().error.unwrap().kind, FailureKind::RelayerRejected);
        let late = store.get(late).unwrap();
        assert_eq!(late.tx_hash.as_deref(), Some("0x55"));
        assert_eq!(
            late.error.unwrap(),
            JobFailure::new(FailureKind::ChainReverted, "execution reverted")
        );
    }

    #[tokio::test]
    async fn test_stream_end_without_terminal_event() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let id = store.submit(relayed());
        settle(|| relay.is_watching("relay-1")).await;

        relay.send("relay-1", StatusEvent::Confirming);
        relay.close("relay-1");
        settle(|| state(&store, id) == Some(JobState::Failed)).await;

        assert_eq!(store.get(id).unwrap().error.unwrap().kind, FailureKind::NetworkError);
    }

    #[tokio::test]
    async fn test_wallet_job_walks_every_state() {
        let (wallet, _, store) = setup(JobStoreConfig::default());
        let seen = record(&store);

        let id = store.submit(intent(OperationKind::Deposit, TxMethod::Wallet));
        settle(|| state(&store, id) == Some(JobState::Confirmed)).await;

        assert_eq!(wallet.signed.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(id).unwrap().tx_hash.as_deref(), Some("0xw1"));
        assert_eq!(
            states_of(&seen.lock(), id),
            vec![
                JobState::Pending,
                JobState::Submitted,
                JobState::Confirming,
                JobState::Confirmed,
            ]
        );
    }

    #[tokio::test]
    async fn test_wallet_job_reverted() {
        let (wallet, _, store) = setup(JobStoreConfig::default());
        *wallet.receipt.lock() = Err(ChainError::Reverted("out of gas".into()));

        let id = store.submit(intent(OperationKind::Withdraw, TxMethod::Wallet));
        settle(|| state(&store, id) == Some(JobState::Failed)).await;

        let job = store.get(id).unwrap();
        assert_eq!(job.tx_hash.as_deref(), Some("0xw1"));
        assert_eq!(job.error.unwrap(), JobFailure::new(FailureKind::ChainReverted, "out of gas"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_timeout() {
        let (_, relay, store) = setup(JobStoreConfig {
            submit_timeout_ms: 1_000,
            ..JobStoreConfig::default()
        });
        relay.hang.store(true, Ordering::SeqCst);

        let id = store.submit(relayed());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        settle(|| state(&store, id) == Some(JobState::Failed)).await;

        let error = store.get(id).unwrap().error.unwrap();
        assert_eq!(error.kind, FailureKind::Timeout);
        assert!(error.reason.contains("relayer acceptance"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_timeout() {
        let (_, relay, store) = setup(JobStoreConfig {
            watch_timeout_ms: 5_000,
            ..JobStoreConfig::default()
        });

        let id = store.submit(relayed());
        settle(|| relay.is_watching("relay-1")).await;
        relay.send("relay-1", StatusEvent::Submitted("0x77".into()));

        tokio::time::sleep(Duration::from_millis(6_000)).await;
        settle(|| state(&store, id) == Some(JobState::Failed)).await;

        let job = store.get(id).unwrap();
        assert_eq!(job.tx_hash.as_deref(), Some("0x77"));
        assert_eq!(job.error.unwrap().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_retention_evicts_oldest_terminal_only() {
        let (_, relay, store) = setup(JobStoreConfig {
            retention_limit: Some(2),
            ..JobStoreConfig::default()
        });

        let a = store.submit(relayed());
        let b = store.submit(relayed());
        let c = store.submit(relayed());
        // nothing terminal yet, so nothing to evict
        assert_eq!(store.list().len(), 3);

        settle(|| (1..=3).all(|n| relay.is_watching(&format!("relay-{}", n)))).await;
        let ids = [a, b, c];
        let ref_of = |id: JobId| format!("relay-{}", ids.iter().position(|x| *x == id).unwrap() + 1);

        confirm(&relay, &ref_of(a), "0xa");
        settle(|| store.list().len() == 2).await;
        assert_eq!(store.list().iter().map(|j| j.id).collect::<Vec<_>>(), vec![c, b]);

        confirm(&relay, &ref_of(c), "0xc");
        settle(|| state(&store, c) == Some(JobState::Confirmed)).await;
        assert_eq!(store.list().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_is_atomic_under_retention() {
        let (_, relay, store) = setup(JobStoreConfig {
            retention_limit: Some(1),
            ..JobStoreConfig::default()
        });
        let seen = record(&store);

        let keep = store.submit(relayed());
        let gone = store.submit(relayed());
        settle(|| relay.is_watching("relay-2")).await;

        assert!(store.remove(gone));

        // the Abandoned snapshot is immediately followed by the deletion
        let seen = seen.lock();
        let n = seen.len();
        assert!(seen[n - 2].contains(&(gone, JobState::Abandoned)));
        assert_eq!(seen[n - 1], vec![(keep, JobState::Submitted)]);
    }

    #[tokio::test]
    async fn test_confirmation_without_hash_fails_job() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let id = store.submit(relayed());
        settle(|| relay.is_watching("relay-1")).await;

        relay.send("relay-1", StatusEvent::Confirmed);
        settle(|| state(&store, id) == Some(JobState::Failed)).await;

        let job = store.get(id).unwrap();
        assert_eq!(job.tx_hash, None);
        assert_eq!(job.error.unwrap().kind, FailureKind::Unknown);
    }

    /// Two plain threads submit while a listener re-reads the store from
    /// every notification.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_listener_reads_store_during_concurrent_submits() {
        const PER_THREAD: usize = 200;

        let (_, _, store) = setup(JobStoreConfig::default());
        let store = Arc::new(store);
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let histories: Arc<Mutex<HashMap<JobId, Vec<JobState>>>> = Arc::default();

        let weak = Arc::downgrade(&store);
        let (l, h) = (lengths.clone(), histories.clone());
        store.subscribe(move |jobs| {
            let Some(store) = weak.upgrade() else { return };
            assert!(store.list().len() >= jobs.len());
            l.lock().push(jobs.len());

            let mut h = h.lock();
            for job in jobs {
                let states = h.entry(job.id).or_default();
                if states.last() != Some(&job.state) {
                    states.push(job.state);
                }
            }
        });

        let submitters: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        store.submit(relayed());
                    }
                })
            })
            .collect();
        let joined = tokio::task::spawn_blocking(move || {
            submitters.into_iter().all(|t| t.join().is_ok())
        });
        let joined = tokio::time::timeout(Duration::from_secs(10), joined).await;
        assert!(matches!(joined, Ok(Ok(true))), "submitters did not finish");

        let total = 2 * PER_THREAD;
        for _ in 0..1_000 {
            let done = store.list().iter().all(|j| j.state == JobState::Submitted);
            if done && lengths.lock().last() == Some(&total) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let lengths = lengths.lock();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]), "snapshots out of order");
        assert_eq!(lengths.last(), Some(&total));

        let histories = histories.lock();
        assert_eq!(histories.len(), total);
        for states in histories.values() {
            assert_eq!(states, &vec![JobState::Pending, JobState::Submitted]);
        }
    }

    #[tokio::test]
    async fn test_shutdown_cancels_watches() {
        let (_, relay, store) = setup(JobStoreConfig::default());
        let id = store.submit(relayed());
        settle(|| relay.is_watching("relay-1")).await;

        store.shutdown();
        let _ = relay.send("relay-1", StatusEvent::Confirmed);
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(state(&store, id), Some(JobState::Submitted));

        let late = store.submit(relayed());
        let job = store.get(late).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.unwrap().kind, FailureKind::Unknown);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Submit,
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Submit), (0usize..16).prop_map(Op::Remove)]
    }

    proptest! {
        #[test]
        fn list_tracks_submits_minus_removals(ops in prop::collection::vec(op(), 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let _guard = rt.enter();

            let (_, _, store) = setup(JobStoreConfig::default());
            let mut issued: Vec<JobId> = Vec::new();
            let mut live: Vec<JobId> = Vec::new();

            for op in ops {
                match op {
                    Op::Submit => {
                        let id = store.submit(relayed());
                        prop_assert!(!issued.contains(&id));
                        issued.push(id);
                        live.insert(0, id);
                    }
                    Op::Remove(i) if !issued.is_empty() => {
                        let id = issued[i % issued.len()];
                        let expected = live.contains(&id);
                        prop_assert_eq!(store.remove(id), expected);
                        live.retain(|x| *x != id);
                    }
                    Op::Remove(_) => {}
                }
                let listed: Vec<JobId> = store.list().iter().map(|j| j.id).collect();
                prop_assert_eq!(&listed, &live);
            }
        }
    }
}
