//! ---
//! ncm_section: "02-grid-and-control"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "The job orchestration engine: state gate, run loops, stop semantics."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ncm_common::{NcmError, NcmResult, StatusCode};
use ncm_model::{DiscoveryPhase, JobKind, JobShape, JobState, ProjectStatus};
use ncm_store::Store;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::{
    cancel_pair, completion_pair, CancelHandle, CancelToken, CompletionWatch, JobStatus, OpRequest,
    WorkerBackend,
};
use crate::discovery::DiscoveryTracker;
use crate::events::{CommandSink, EventBus};

/// Typed node key: one node of orchestration state per (project, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Target project.
    pub project_id: i64,
    /// Job kind.
    pub kind: JobKind,
}

impl JobKey {
    /// Key for `kind` against `project_id`.
    pub fn new(project_id: i64, kind: JobKind) -> Self {
        Self { project_id, kind }
    }
}

/// Caller-visible copy of one node's state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobSnapshot {
    /// Current state.
    pub state: JobState,
    /// Numeric code of the last failure; zero when clear.
    pub error_code: i64,
    /// Message of the last failure; empty when clear.
    pub error_message: String,
}

#[derive(Debug, Default)]
struct NodeState {
    run: u64,
    state: JobState,
    error_code: i64,
    error_message: String,
    cancel: Option<CancelHandle>,
}

type SharedNode = Arc<Mutex<NodeState>>;

/// The job orchestration engine. One node per (project, kind), each behind
/// the uniform `Ready/Running/Completed/Failed` gate; poll-shape runs await
/// a completion channel, event-shape runs follow the external event stream.
///
/// `start` spawns the run loop onto the ambient tokio runtime; backend work
/// runs outside the Domain Store lock.
pub struct JobEngine {
    store: Arc<Store>,
    backend: Arc<dyn WorkerBackend>,
    commands: Arc<dyn CommandSink>,
    events: Arc<EventBus>,
    discovery: Arc<DiscoveryTracker>,
    nodes: Mutex<HashMap<JobKey, SharedNode>>,
    poll_fallback: Duration,
    shutdown: broadcast::Sender<()>,
}

impl JobEngine {
    /// Wire an engine over `store` and its collaborators. `poll_fallback`
    /// bounds the worst-case completion latency of poll-shape runs.
    pub fn new(
        store: Arc<Store>,
        backend: Arc<dyn WorkerBackend>,
        commands: Arc<dyn CommandSink>,
        events: Arc<EventBus>,
        poll_fallback: Duration,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(4);
        Self {
            store,
            backend,
            commands,
            events,
            discovery: Arc::new(DiscoveryTracker::new()),
            nodes: Mutex::new(HashMap::new()),
            poll_fallback,
            shutdown,
        }
    }

    fn node(&self, key: JobKey) -> SharedNode {
        Arc::clone(self.nodes.lock().entry(key).or_default())
    }

    /// Accept or reject a start request. Accepted from `Ready`, `Completed`,
    /// and `Failed`; rejected with `NotExecutable` from `Running`. On
    /// acceptance the prior error is cleared, the node goes `Running`, a
    /// fresh cancellation pair is armed, and the run loop is spawned.
    pub fn start(
        &self,
        key: JobKey,
        device_ids: Vec<i64>,
        params: serde_json::Value,
    ) -> NcmResult<()> {
        self.store.project(key.project_id)?;
        let node = self.node(key);
        let (run, token) = {
            let mut guard = node.lock();
            if !guard.state.can_start() {
                return Err(NcmError::NotExecutable(guard.state.to_string()));
            }
            guard.run += 1;
            guard.state = JobState::Running;
            guard.error_code = 0;
            guard.error_message.clear();
            let (handle, token) = cancel_pair();
            guard.cancel = Some(handle);
            (guard.run, token)
        };

        let request = OpRequest {
            kind: key.kind,
            project_id: key.project_id,
            device_ids,
            params,
        };
        info!(project_id = key.project_id, kind = %key.kind, "job started");
        match key.kind.shape() {
            JobShape::Poll => self.spawn_poll_run(key, node, run, request, token),
            JobShape::Event => self.spawn_event_run(key, node, run, request, token),
        }
        Ok(())
    }

    /// Begin one broadcast-discovery phase: the phase machine gates the
    /// transition, then the run starts like any event-shape job.
    pub fn start_discovery(
        &self,
        project_id: i64,
        phase: DiscoveryPhase,
        device_ids: Vec<i64>,
        params: serde_json::Value,
    ) -> NcmResult<()> {
        self.discovery.begin(project_id, phase)?;
        let key = JobKey::new(project_id, JobKind::BroadcastSearchAndIpSetting);
        let result = self.start(key, device_ids, params);
        if result.is_err() {
            self.discovery.revert(project_id);
        }
        result
    }

    /// Current broadcast-discovery phase of `project_id`.
    pub fn discovery_phase(&self, project_id: i64) -> DiscoveryPhase {
        self.discovery.phase(project_id)
    }

    /// Stop a run. Poll shape: fire the cancellation handle and let the run
    /// loop observe the cooperative stop; repeated stops and stops after the
    /// run ended are no-ops. Event shape: send the out-of-band stop command,
    /// reset the node to `Ready`, and flip the project back to `Idle`,
    /// independent of any event still in flight.
    pub fn stop(&self, key: JobKey) -> NcmResult<()> {
        match key.kind.shape() {
            JobShape::Poll => {
                let node = self.node(key);
                let guard = node.lock();
                if let Some(handle) = &guard.cancel {
                    handle.fire();
                    debug!(project_id = key.project_id, kind = %key.kind, "cancellation fired");
                }
                Ok(())
            }
            JobShape::Event => {
                self.commands.send_stop(key.kind, key.project_id)?;
                let node = self.node(key);
                {
                    let mut guard = node.lock();
                    guard.run += 1;
                    guard.state = JobState::Ready;
                    guard.error_code = 0;
                    guard.error_message.clear();
                    guard.cancel = None;
                }
                set_project_status(&self.store, key.project_id, ProjectStatus::Idle);
                if key.kind == JobKind::BroadcastSearchAndIpSetting {
                    self.discovery.revert(key.project_id);
                }
                info!(project_id = key.project_id, kind = %key.kind, "job stopped");
                Ok(())
            }
        }
    }

    /// Current state of one node. Nodes never started report `Ready`.
    pub fn snapshot(&self, key: JobKey) -> JobSnapshot {
        let node = self.node(key);
        let guard = node.lock();
        JobSnapshot {
            state: guard.state,
            error_code: guard.error_code,
            error_message: guard.error_message.clone(),
        }
    }

    /// Ask every run loop to exit. In-flight backend work is abandoned, not
    /// cancelled.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    fn spawn_poll_run(
        &self,
        key: JobKey,
        node: SharedNode,
        run: u64,
        request: OpRequest,
        token: CancelToken,
    ) {
        let backend = Arc::clone(&self.backend);
        let fallback = self.poll_fallback;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let (done, mut completion) = completion_pair();
            if let Err(err) = backend.start_op(request, token, done).await {
                record_rejected_start(&node, run, key, &err);
                return;
            }
            let status = tokio::select! {
                status = wait_with_fallback(&mut completion, fallback) => status,
                _ = shutdown.recv() => return,
            };
            apply_terminal_status(&node, run, key, &status);
        });
    }

    fn spawn_event_run(
        &self,
        key: JobKey,
        node: SharedNode,
        run: u64,
        request: OpRequest,
        token: CancelToken,
    ) {
        let backend = Arc::clone(&self.backend);
        let store = Arc::clone(&self.store);
        let discovery = Arc::clone(&self.discovery);
        // Subscribe before the backend starts so no event is missed.
        let mut events = self.events.subscribe();
        let mut shutdown = self.shutdown.subscribe();
        set_project_status(&self.store, key.project_id, ProjectStatus::Running);
        tokio::spawn(async move {
            // Event-shape progress arrives on the stream; the completion
            // handle only covers a backend that dies before connecting.
            let (done, _completion) = completion_pair();
            if let Err(err) = backend.start_op(request, token, done).await {
                record_rejected_start(&node, run, key, &err);
                set_project_status(&store, key.project_id, ProjectStatus::Idle);
                return;
            }
            loop {
                let event = tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(project_id = key.project_id, kind = %key.kind, missed, "event stream lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                    _ = shutdown.recv() => return,
                };
                if event.op_code != key.kind.op_code() || event.project_id != key.project_id {
                    continue;
                }
                // An out-of-band stop may have retired this run already.
                if node.lock().run != run {
                    return;
                }
                let code = StatusCode::from_code(event.status_code);
                if key.kind == JobKind::BroadcastSearchAndIpSetting {
                    discovery.observe(key.project_id, code);
                }
                match code {
                    Some(StatusCode::Running) => continue,
                    Some(code) if code.is_success() => {
                        apply_terminal_status(&node, run, key, &JobStatus::success());
                        break;
                    }
                    Some(StatusCode::Stop) => {
                        apply_terminal_status(&node, run, key, &JobStatus::stopped());
                        break;
                    }
                    Some(code) => {
                        apply_terminal_status(
                            &node,
                            run,
                            key,
                            &JobStatus::failed(code, event.error_message.clone()),
                        );
                        break;
                    }
                    None => {
                        fail_with_raw_code(
                            &node,
                            run,
                            key,
                            event.status_code,
                            format!("malformed event status code {}", event.status_code),
                        );
                        break;
                    }
                }
            }
            // Loop exit tears the subscription down; the project goes back
            // to Idle on every terminal outcome.
            set_project_status(&store, key.project_id, ProjectStatus::Idle);
        });
    }
}

async fn wait_with_fallback(completion: &mut CompletionWatch, fallback: Duration) -> JobStatus {
    let mut tick = tokio::time::interval(fallback);
    loop {
        if let Some(status) = completion.try_status() {
            return status;
        }
        tokio::select! {
            status = completion.wait() => return status,
            _ = tick.tick() => {}
        }
    }
}

/// Map a backend terminal status onto the node: `Success`/`Finished` →
/// `Completed`; `Stop` → `Ready`; anything else → `Failed` with the
/// backend's code and message preserved verbatim.
fn apply_terminal_status(node: &SharedNode, run: u64, key: JobKey, status: &JobStatus) {
    let mut guard = node.lock();
    if guard.run != run {
        return;
    }
    guard.cancel = None;
    match status.code {
        StatusCode::Success | StatusCode::Finished => {
            guard.state = JobState::Completed;
            info!(project_id = key.project_id, kind = %key.kind, "job completed");
        }
        StatusCode::Stop => {
            guard.state = JobState::Ready;
            info!(project_id = key.project_id, kind = %key.kind, "job cancelled");
        }
        code => {
            guard.state = JobState::Failed;
            guard.error_code = code.code();
            guard.error_message = status.message.clone();
            warn!(
                project_id = key.project_id,
                kind = %key.kind,
                code = guard.error_code,
                message = %guard.error_message,
                "job failed"
            );
        }
    }
}

fn record_rejected_start(node: &SharedNode, run: u64, key: JobKey, err: &NcmError) {
    let mut guard = node.lock();
    if guard.run != run {
        return;
    }
    guard.cancel = None;
    guard.state = JobState::Failed;
    guard.error_code = err.status_code().code();
    guard.error_message = err.to_string();
    warn!(project_id = key.project_id, kind = %key.kind, %err, "backend rejected the start");
}

fn fail_with_raw_code(node: &SharedNode, run: u64, key: JobKey, raw_code: i64, message: String) {
    let mut guard = node.lock();
    if guard.run != run {
        return;
    }
    guard.cancel = None;
    guard.state = JobState::Failed;
    guard.error_code = raw_code;
    guard.error_message = message;
    warn!(project_id = key.project_id, kind = %key.kind, code = raw_code, "job failed");
}

fn set_project_status(store: &Store, project_id: i64, status: ProjectStatus) {
    let mut state = store.lock();
    if let Ok(mut project) = state.project(project_id) {
        project.status = status;
        state.put_project(project);
    }
}
