//! HTTP client for the Privi relayer service.
//!
//! Endpoints:
//! - POST /api/v1/deposit
//! - POST /api/v1/withdraw
//! - GET /api/v1/job/<job_ref>

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use privi_types::{Hex, OperationKind, RelayError, TransactionIntent, TxHash};

use crate::{JobRef, RelayClient, RelayerConfig, RelayerRequest, StatusEvent};

/// Relayer API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerResponse<T> {
    pub code: Option<i32>,
    pub message: Option<String>,
    pub user_message: Option<String>,
    pub data: T,
}

/// Job state as the relayer names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayerJobState {
    Waiting,
    Sent,
    Confirming,
    Completed,
    Reverted,
    Failed,
}

/// GET /api/v1/job/<job_ref> payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerJobStatus {
    pub state: RelayerJobState,
    pub tx_hash: Option<Hex>,
    pub failed_reason: Option<String>,
}

/// Relayer client for submitting and watching jobs.
#[derive(Clone)]
pub struct HttpRelayClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    poll_interval: Duration,
}

impl HttpRelayClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        Self::from_config(&RelayerConfig {
            base_url: base_url.to_string(),
            request_timeout_ms: timeout_ms.unwrap_or(RelayerConfig::default().request_timeout_ms),
            ..RelayerConfig::default()
        })
    }

    pub fn from_config(config: &RelayerConfig) -> Self {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            timeout,
            poll_interval: Duration::from_millis(config.poll_ms),
        }
    }

    fn endpoint(kind: OperationKind) -> &'static str {
        match kind {
            OperationKind::Deposit => "/api/v1/deposit",
            OperationKind::Withdraw => "/api/v1/withdraw",
        }
    }

    /// Fetch the relayer's current view of a job.
    ///
    /// GET /api/v1/job/<job_ref>
    pub async fn job_status(&self, job_ref: &JobRef) -> Result<RelayerJobStatus, RelayError> {
        let url = format!("{}/api/v1/job/{}", self.base_url, job_ref);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        read_response(resp).await
    }
}

/// Unwrap a relayer response, treating HTTP errors and non-zero codes as rejections.
async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RelayError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RelayError::Rejected {
            status: Some(status.as_u16()),
            message: body,
        });
    }

    let body: RelayerResponse<T> = resp
        .json()
        .await
        .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;

    match body.code {
        Some(code) if code != 0 => Err(RelayError::Rejected {
            status: None,
            message: body
                .user_message
                .or(body.message)
                .unwrap_or_else(|| format!("relayer error code {}", code)),
        }),
        _ => Ok(body.data),
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    /// POST /api/v1/deposit or /api/v1/withdraw
    async fn submit(&self, intent: &TransactionIntent) -> Result<JobRef, RelayError> {
        let url = format!("{}{}", self.base_url, Self::endpoint(intent.kind()));
        let request = RelayerRequest::from_intent(intent);

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        let job_ref: String = read_response(resp).await?;
        tracing::debug!(job_ref = %job_ref, kind = %intent.kind(), "relayer accepted request");
        Ok(JobRef::new(job_ref))
    }

    fn watch(&self, job_ref: &JobRef) -> BoxStream<'static, StatusEvent> {
        let state = WatchState {
            client: self.clone(),
            job_ref: job_ref.clone(),
            progress: Progress::default(),
            first_poll: true,
        };

        stream::unfold(state, |mut st| async move {
            if st.progress.finished {
                return None;
            }
            loop {
                if !std::mem::take(&mut st.first_poll) {
                    tokio::time::sleep(st.client.poll_interval).await;
                }
                match st.client.job_status(&st.job_ref).await {
                    Ok(status) => {
                        let events = st.progress.advance(&status);
                        if !events.is_empty() {
                            return Some((events, st));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(job_ref = %st.job_ref, error = %e, "relayer status poll failed");
                    }
                }
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

struct WatchState {
    client: HttpRelayClient,
    job_ref: JobRef,
    progress: Progress,
    first_poll: bool,
}

/// What a watcher has already reported, so each poll yields only changes.
#[derive(Debug, Default)]
struct Progress {
    tx_hash: Option<TxHash>,
    confirming: bool,
    finished: bool,
}

impl Progress {
    fn advance(&mut self, status: &RelayerJobStatus) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if self.tx_hash.is_none() {
            if let Some(hash) = &status.tx_hash {
                self.tx_hash = Some(hash.clone());
                events.push(StatusEvent::Submitted(hash.clone()));
            }
        }

        match status.state {
            RelayerJobState::Waiting | RelayerJobState::Sent => {}
            RelayerJobState::Confirming => {
                if !self.confirming {
                    self.confirming = true;
                    events.push(StatusEvent::Confirming);
                }
            }
            RelayerJobState::Completed => {
                self.finished = true;
                events.push(StatusEvent::Confirmed);
            }
            RelayerJobState::Reverted | RelayerJobState::Failed => {
                self.finished = true;
                let reason = status
                    .failed_reason
                    .clone()
                    .unwrap_or_else(|| format!("relayer reported {:?}", status.state).to_lowercase());
                events.push(StatusEvent::Failed(reason));
            }
        }

        events
    }
}
