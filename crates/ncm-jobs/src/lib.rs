//! ---
//! ncm_section: "02-grid-and-control"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Job orchestration engine for cancellable device/network operations."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! The Job Orchestration Engine. Runs long-lived, cancellable device and
//! network operations behind a uniform `Ready/Running/Completed/Failed`
//! state machine, one node per (project, job kind). Poll-shape kinds await a
//! completion channel written by the worker backend; event-shape kinds
//! (Deploy, ScanTopology, BroadcastSearchAndIpSetting) follow the external
//! event stream and are stopped with an out-of-band command.

pub mod backend;
pub mod discovery;
pub mod engine;
pub mod events;

pub use backend::{
    cancel_pair, completion_pair, CancelHandle, CancelToken, CompletionHandle, CompletionWatch,
    DisconnectedBackend, JobStatus, OpRequest, ScriptedBackend, ScriptedOutcome, WorkerBackend,
};
pub use discovery::DiscoveryTracker;
pub use engine::{JobEngine, JobKey, JobSnapshot};
pub use events::{
    CommandSink, EventBus, JobEvent, NullCommandSink, RecordingCommandSink, StopCommand,
};
