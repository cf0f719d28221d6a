//! ---
//! ncm_section: "02-grid-and-control"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Worker backend seam: cancellation, completion, and the scripted test backend."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ncm_common::{NcmError, NcmResult, StatusCode};
use ncm_model::JobKind;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Terminal status a backend reports for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// Terminal status code.
    pub code: StatusCode,
    /// Backend-supplied detail, preserved verbatim on failures.
    pub message: String,
}

impl JobStatus {
    /// Successful completion.
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            message: String::new(),
        }
    }

    /// Cooperative cancellation was observed.
    pub fn stopped() -> Self {
        Self {
            code: StatusCode::Stop,
            message: String::new(),
        }
    }

    /// Failure with a backend code and message.
    pub fn failed(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Create a linked cancellation pair for one run.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

/// Engine-side cancellation handle, re-armed fresh at every `Start`. Firing
/// it twice, or after the run already ended, is a no-op.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cooperative cancellation.
    pub fn fire(&self) {
        let _ = self.tx.send(true);
    }
}

/// Backend-side view of the cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until cancellation is requested.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

/// Create a linked completion pair for one poll-shape run.
pub fn completion_pair() -> (CompletionHandle, CompletionWatch) {
    let (tx, rx) = watch::channel(None);
    (CompletionHandle { tx: Arc::new(tx) }, CompletionWatch { rx })
}

/// Backend-side completion reporter. A run reports at most once.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    tx: Arc<watch::Sender<Option<JobStatus>>>,
}

impl CompletionHandle {
    /// Deliver the terminal status and wake the waiting run loop.
    pub fn complete(&self, status: JobStatus) {
        let _ = self.tx.send(Some(status));
    }
}

/// Engine-side completion channel.
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    rx: watch::Receiver<Option<JobStatus>>,
}

impl CompletionWatch {
    /// Non-blocking read of the terminal status, if delivered.
    pub fn try_status(&self) -> Option<JobStatus> {
        self.rx.borrow().clone()
    }

    /// Suspend until the terminal status is delivered. A backend that drops
    /// its handle without reporting yields an internal failure.
    pub async fn wait(&mut self) -> JobStatus {
        match self.rx.wait_for(|status| status.is_some()).await {
            Ok(status) => status.clone().unwrap_or_else(|| {
                JobStatus::failed(StatusCode::InternalError, "empty completion status")
            }),
            Err(_) => JobStatus::failed(
                StatusCode::InternalError,
                "backend dropped the completion handle",
            ),
        }
    }
}

/// One backend invocation.
#[derive(Debug, Clone)]
pub struct OpRequest {
    /// Which job to run.
    pub kind: JobKind,
    /// Target project.
    pub project_id: i64,
    /// Optional target devices; empty means all applicable devices.
    pub device_ids: Vec<i64>,
    /// Kind-specific parameters.
    pub params: serde_json::Value,
}

/// The device-facing worker. `start_op` returns an immediate accept/reject;
/// poll-shape progress arrives through `done`, event-shape progress through
/// the external event stream.
#[async_trait]
pub trait WorkerBackend: Send + Sync {
    /// Begin one run.
    async fn start_op(
        &self,
        request: OpRequest,
        cancel: CancelToken,
        done: CompletionHandle,
    ) -> NcmResult<()>;
}

/// Backend used while no device-facing worker agent is connected; every
/// start is rejected synchronously.
#[derive(Debug, Default)]
pub struct DisconnectedBackend;

#[async_trait]
impl WorkerBackend for DisconnectedBackend {
    async fn start_op(
        &self,
        request: OpRequest,
        _cancel: CancelToken,
        _done: CompletionHandle,
    ) -> NcmResult<()> {
        Err(NcmError::Internal(format!(
            "no worker agent connected for {}",
            request.kind
        )))
    }
}

/// Behaviour the scripted backend plays for one kind.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Reject the start synchronously.
    Reject(NcmError),
    /// Accept, then report the given terminal status.
    Complete(JobStatus),
    /// Accept, wait for cancellation, then report `Stop`.
    CompleteAfterCancel,
    /// Accept and never report; event-shape runs are driven from the bus.
    Silent,
}

/// Test backend scripted per job kind. Unscripted kinds complete
/// successfully.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    outcomes: Mutex<HashMap<JobKind, ScriptedOutcome>>,
    requests: Mutex<Vec<OpRequest>>,
}

impl ScriptedBackend {
    /// Fresh backend where every kind succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome played for `kind`.
    pub fn script(&self, kind: JobKind, outcome: ScriptedOutcome) {
        self.outcomes.lock().insert(kind, outcome);
    }

    /// Drain and return the received requests.
    pub fn take_requests(&self) -> Vec<OpRequest> {
        std::mem::take(&mut self.requests.lock())
    }
}

#[async_trait]
impl WorkerBackend for ScriptedBackend {
    async fn start_op(
        &self,
        request: OpRequest,
        mut cancel: CancelToken,
        done: CompletionHandle,
    ) -> NcmResult<()> {
        let outcome = self
            .outcomes
            .lock()
            .get(&request.kind)
            .cloned()
            .unwrap_or(ScriptedOutcome::Complete(JobStatus::success()));
        self.requests.lock().push(request);
        match outcome {
            ScriptedOutcome::Reject(err) => Err(err),
            ScriptedOutcome::Complete(status) => {
                tokio::spawn(async move {
                    done.complete(status);
                });
                Ok(())
            }
            ScriptedOutcome::CompleteAfterCancel => {
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    done.complete(JobStatus::stopped());
                });
                Ok(())
            }
            ScriptedOutcome::Silent => Ok(()),
        }
    }
}
