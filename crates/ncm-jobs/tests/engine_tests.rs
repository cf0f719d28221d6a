//! ---
//! ncm_section: "05-testing-qa"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "test"
//! ncm_description: "Engine state-machine flows over the scripted backend and event bus."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use ncm_common::{NcmError, StatusCode};
use ncm_jobs::{
    CommandSink, EventBus, JobEngine, JobEvent, JobKey, JobSnapshot, JobStatus,
    RecordingCommandSink, ScriptedBackend, ScriptedOutcome, WorkerBackend,
};
use ncm_model::{DiscoveryPhase, JobKind, JobState, Project, ProjectStatus};
use ncm_store::Store;

struct Harness {
    engine: JobEngine,
    store: Arc<Store>,
    backend: Arc<ScriptedBackend>,
    bus: Arc<EventBus>,
    commands: Arc<RecordingCommandSink>,
}

fn harness() -> Harness {
    let store = Arc::new(Store::new());
    store.put_project(Project::new(42, "plant-a"));
    let backend = Arc::new(ScriptedBackend::new());
    let bus = Arc::new(EventBus::default());
    let commands = Arc::new(RecordingCommandSink::new());
    let engine = JobEngine::new(
        Arc::clone(&store),
        Arc::clone(&backend) as Arc<dyn WorkerBackend>,
        Arc::clone(&commands) as Arc<dyn CommandSink>,
        Arc::clone(&bus),
        Duration::from_secs(1),
    );
    Harness {
        engine,
        store,
        backend,
        bus,
        commands,
    }
}

async fn wait_for_state(engine: &JobEngine, key: JobKey, want: JobState) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = engine.snapshot(key);
        if snapshot.state == want {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "node never reached {want}, currently {}",
        engine.snapshot(key).state
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_is_rejected_while_running() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::Compute);
    hx.backend.script(JobKind::Compute, ScriptedOutcome::Silent);

    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();
    assert_eq!(hx.engine.snapshot(key).state, JobState::Running);

    let err = hx
        .engine
        .start(key, vec![], serde_json::Value::Null)
        .expect_err("already running");
    assert_eq!(err, NcmError::NotExecutable("Running".to_owned()));
    assert_eq!(hx.engine.snapshot(key).state, JobState::Running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_requires_an_existing_project() {
    let hx = harness();
    let key = JobKey::new(999, JobKind::Compute);
    let err = hx
        .engine
        .start(key, vec![], serde_json::Value::Null)
        .expect_err("unknown project");
    assert!(matches!(err, NcmError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successful_run_completes_and_is_rearmable() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::FirmwareUpgrade);
    hx.engine.start(key, vec![3, 4], serde_json::Value::Null).unwrap();
    wait_for_state(&hx.engine, key, JobState::Completed).await;

    let requests = hx.backend.take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].device_ids, vec![3, 4]);

    // Completed is re-armable.
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();
    wait_for_state(&hx.engine, key, JobState::Completed).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn backend_failure_preserves_code_and_message() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::SyncDeviceConfig);
    hx.backend.script(
        JobKind::SyncDeviceConfig,
        ScriptedOutcome::Complete(JobStatus::failed(StatusCode::Conflict, "device busy")),
    );

    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();
    let snapshot = wait_for_state(&hx.engine, key, JobState::Failed).await;
    assert_eq!(snapshot.error_code, 409);
    assert_eq!(snapshot.error_message, "device busy");

    // Failed is re-armable, and the error is cleared on acceptance.
    hx.backend.script(
        JobKind::SyncDeviceConfig,
        ScriptedOutcome::Complete(JobStatus::success()),
    );
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();
    let snapshot = wait_for_state(&hx.engine, key, JobState::Completed).await;
    assert_eq!(snapshot.error_code, 0);
    assert!(snapshot.error_message.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_start_fails_without_a_run_loop() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::Reboot);
    hx.backend.script(
        JobKind::Reboot,
        ScriptedOutcome::Reject(NcmError::NotFound("device id 9".to_owned())),
    );

    hx.engine.start(key, vec![9], serde_json::Value::Null).unwrap();
    let snapshot = wait_for_state(&hx.engine, key, JobState::Failed).await;
    assert_eq!(snapshot.error_code, 404);
    assert_eq!(snapshot.error_message, "not found: device id 9");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cooperative_stop_returns_the_node_to_ready() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::FactoryDefault);
    hx.backend
        .script(JobKind::FactoryDefault, ScriptedOutcome::CompleteAfterCancel);

    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();
    assert_eq!(hx.engine.snapshot(key).state, JobState::Running);

    hx.engine.stop(key).unwrap();
    wait_for_state(&hx.engine, key, JobState::Ready).await;

    // Stopping again, with no run in flight, is a no-op.
    hx.engine.stop(key).unwrap();
    assert_eq!(hx.engine.snapshot(key).state, JobState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn event_run_follows_the_stream_to_completion() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::Deploy);
    hx.backend.script(JobKind::Deploy, ScriptedOutcome::Silent);

    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();
    assert_eq!(hx.store.project(42).unwrap().status, ProjectStatus::Running);

    hx.bus.publish(JobEvent::new(JobKind::Deploy, 42, StatusCode::Running));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(hx.engine.snapshot(key).state, JobState::Running);

    hx.bus.publish(JobEvent::new(JobKind::Deploy, 42, StatusCode::Finished));
    wait_for_state(&hx.engine, key, JobState::Completed).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(hx.store.project(42).unwrap().status, ProjectStatus::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn event_run_ignores_foreign_events() {
    let hx = harness();
    hx.store.put_project(Project::new(43, "plant-b"));
    let key = JobKey::new(42, JobKind::Deploy);
    hx.backend.script(JobKind::Deploy, ScriptedOutcome::Silent);
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();

    // Wrong project, wrong kind: both ignored.
    hx.bus.publish(JobEvent::new(JobKind::Deploy, 43, StatusCode::Finished));
    hx.bus.publish(JobEvent::new(JobKind::ScanTopology, 42, StatusCode::Finished));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(hx.engine.snapshot(key).state, JobState::Running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn event_failure_carries_the_code_and_message_verbatim() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::ScanTopology);
    hx.backend.script(JobKind::ScanTopology, ScriptedOutcome::Silent);
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();

    hx.bus.publish(
        JobEvent::new(JobKind::ScanTopology, 42, StatusCode::InternalError)
            .with_message("scan agent crashed"),
    );
    let snapshot = wait_for_state(&hx.engine, key, JobState::Failed).await;
    assert_eq!(snapshot.error_code, 500);
    assert_eq!(snapshot.error_message, "scan agent crashed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_event_status_fails_the_run() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::Deploy);
    hx.backend.script(JobKind::Deploy, ScriptedOutcome::Silent);
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();

    let mut event = JobEvent::new(JobKind::Deploy, 42, StatusCode::Running);
    event.status_code = 77777;
    hx.bus.publish(event);
    let snapshot = wait_for_state(&hx.engine, key, JobState::Failed).await;
    assert_eq!(snapshot.error_code, 77777);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn event_stop_resets_the_node_and_project_immediately() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::Deploy);
    hx.backend.script(JobKind::Deploy, ScriptedOutcome::Silent);
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();

    hx.engine.stop(key).unwrap();
    assert_eq!(hx.engine.snapshot(key).state, JobState::Ready);
    assert_eq!(hx.store.project(42).unwrap().status, ProjectStatus::Idle);
    let commands = hx.commands.take_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].op_code, "Deploy");

    // A straggler event from the stopped run must not resurrect the node.
    hx.bus.publish(JobEvent::new(JobKind::Deploy, 42, StatusCode::Finished));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(hx.engine.snapshot(key).state, JobState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_event_from_the_stream_also_returns_to_ready() {
    let hx = harness();
    let key = JobKey::new(42, JobKind::ScanTopology);
    hx.backend.script(JobKind::ScanTopology, ScriptedOutcome::Silent);
    hx.engine.start(key, vec![], serde_json::Value::Null).unwrap();

    hx.bus.publish(JobEvent::new(JobKind::ScanTopology, 42, StatusCode::Stop));
    wait_for_state(&hx.engine, key, JobState::Ready).await;
    assert_eq!(hx.store.project(42).unwrap().status, ProjectStatus::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn discovery_walks_phases_across_runs() {
    let hx = harness();
    let kind = JobKind::BroadcastSearchAndIpSetting;
    let key = JobKey::new(42, kind);
    hx.backend.script(kind, ScriptedOutcome::Silent);

    // Skipping ahead is rejected before any run starts.
    let err = hx
        .engine
        .start_discovery(42, DiscoveryPhase::IpConfiguring, vec![], serde_json::Value::Null)
        .expect_err("no link sequence yet");
    assert!(matches!(err, NcmError::NotExecutable(_)));

    hx.engine
        .start_discovery(42, DiscoveryPhase::DeviceDiscovering, vec![], serde_json::Value::Null)
        .unwrap();
    hx.bus.publish(JobEvent::new(kind, 42, StatusCode::Success));
    wait_for_state(&hx.engine, key, JobState::Completed).await;
    assert_eq!(hx.engine.discovery_phase(42), DiscoveryPhase::DeviceDiscovered);

    hx.engine
        .start_discovery(42, DiscoveryPhase::LinkSequenceDetecting, vec![], serde_json::Value::Null)
        .unwrap();
    hx.bus.publish(
        JobEvent::new(kind, 42, StatusCode::Failed).with_message("lldp timeout"),
    );
    let snapshot = wait_for_state(&hx.engine, key, JobState::Failed).await;
    assert_eq!(snapshot.error_message, "lldp timeout");
    assert_eq!(
        hx.engine.discovery_phase(42),
        DiscoveryPhase::LinkSequenceDetectingFailed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn discovery_stop_reverts_the_phase() {
    let hx = harness();
    let kind = JobKind::BroadcastSearchAndIpSetting;
    let key = JobKey::new(42, kind);
    hx.backend.script(kind, ScriptedOutcome::Silent);

    hx.engine
        .start_discovery(42, DiscoveryPhase::DeviceDiscovering, vec![], serde_json::Value::Null)
        .unwrap();
    hx.engine.stop(key).unwrap();
    assert_eq!(hx.engine.snapshot(key).state, JobState::Ready);
    assert_eq!(hx.engine.discovery_phase(42), DiscoveryPhase::Init);
}
