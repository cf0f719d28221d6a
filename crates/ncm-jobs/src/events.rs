//! ---
//! ncm_section: "02-grid-and-control"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "External event stream bridge and outbound command seam."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use ncm_common::{NcmError, NcmResult, StatusCode};
use ncm_model::JobKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// One inbound message from the external event stream. Field names follow
/// the wire encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Job kind the event belongs to.
    pub op_code: String,
    /// Target project.
    pub project_id: i64,
    /// Raw numeric status code; unknown codes map to `Failed`.
    pub status_code: i64,
    /// Backend-supplied detail for failures.
    #[serde(default)]
    pub error_message: String,
    /// Kind-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl JobEvent {
    /// Event for `kind`/`project_id` carrying `code`.
    pub fn new(kind: JobKind, project_id: i64, code: StatusCode) -> Self {
        Self {
            op_code: kind.op_code().to_owned(),
            project_id,
            status_code: code.code(),
            error_message: String::new(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach a failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }
}

/// In-process fan-out of the external event stream. Wire adapters decode
/// inbound JSON and publish here; event-shape run loops subscribe.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Bus buffering up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish one event. Events without subscribers are dropped.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    /// Decode and publish one raw wire message.
    pub fn publish_json(&self, raw: serde_json::Value) -> NcmResult<()> {
        let event: JobEvent = serde_json::from_value(raw)
            .map_err(|err| NcmError::BadRequest(format!("malformed event payload: {err}")))?;
        self.publish(event);
        Ok(())
    }

    /// Subscribe to the stream.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Outbound stop command sent to the backend of an event-shape run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StopCommand {
    /// Job kind to stop.
    pub op_code: String,
    /// Target project.
    pub project_id: i64,
}

/// Outbound command seam for event-shape runs.
pub trait CommandSink: Send + Sync {
    /// Send an out-of-band stop command.
    fn send_stop(&self, kind: JobKind, project_id: i64) -> NcmResult<()>;
}

/// Sink for wirings without an outbound channel; stops are logged and
/// swallowed.
#[derive(Debug, Default)]
pub struct NullCommandSink;

impl CommandSink for NullCommandSink {
    fn send_stop(&self, kind: JobKind, project_id: i64) -> NcmResult<()> {
        warn!(%kind, project_id, "no outbound command channel; stop command dropped");
        Ok(())
    }
}

/// Test double recording every stop command.
#[derive(Debug, Default)]
pub struct RecordingCommandSink {
    commands: Mutex<Vec<StopCommand>>,
    fail_next: Mutex<Option<NcmError>>,
}

impl RecordingCommandSink {
    /// Fresh double that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the double: the next command fails with `err`.
    pub fn fail_next(&self, err: NcmError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Drain and return the recorded commands.
    pub fn take_commands(&self) -> Vec<StopCommand> {
        std::mem::take(&mut self.commands.lock())
    }
}

impl CommandSink for RecordingCommandSink {
    fn send_stop(&self, kind: JobKind, project_id: i64) -> NcmResult<()> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        self.commands.lock().push(StopCommand {
            op_code: kind.op_code().to_owned(),
            project_id,
        });
        Ok(())
    }
}
