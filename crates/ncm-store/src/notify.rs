//! ---
//! ncm_section: "03-persistence-logging"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Fire-and-forget change notifications for baseline mutations."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use ncm_model::BaselineTrack;
use parking_lot::Mutex;

/// Which record family changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A design-track baseline changed.
    DesignBaseline,
    /// An operation-track baseline changed.
    OperationBaseline,
}

impl From<BaselineTrack> for ChangeKind {
    fn from(track: BaselineTrack) -> Self {
        match track {
            BaselineTrack::Design => ChangeKind::DesignBaseline,
            BaselineTrack::Operation => ChangeKind::OperationBaseline,
        }
    }
}

/// What happened to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// The record was created.
    Create,
    /// The record was updated in place.
    Update,
    /// The record was deleted.
    Delete,
}

/// One outbound change notification. `payload` carries the affected record
/// (or patch); `is_patch` marks partial payloads such as activation-flag
/// flips.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Record family.
    pub kind: ChangeKind,
    /// What happened.
    pub action: ChangeAction,
    /// Owning project.
    pub project_id: i64,
    /// Affected record or patch body.
    pub payload: serde_json::Value,
    /// `true` when `payload` is a partial patch rather than a full record.
    pub is_patch: bool,
}

/// Outbound notification sink. Fire-and-forget: baseline mutations have
/// already been committed when these run, so implementations log failures
/// instead of returning them.
pub trait ChangeNotifier: Send + Sync {
    /// Publish one change event.
    fn notify(&self, event: ChangeEvent);
}

/// No-op sink for wiring paths that do not care about notifications.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn notify(&self, _event: ChangeEvent) {}
}

/// Test double that buffers every event in order.
#[derive(Debug, Default)]
pub struct BufferingNotifier {
    events: Mutex<Vec<ChangeEvent>>,
}

impl BufferingNotifier {
    /// Fresh, empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return the buffered events.
    pub fn take_events(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events.lock())
    }
}

impl ChangeNotifier for BufferingNotifier {
    fn notify(&self, event: ChangeEvent) {
        self.events.lock().push(event);
    }
}
