//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Domain data model for projects and network baselines."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Serde-serialisable domain types shared by the store, the baseline
//! lifecycle manager, and the job orchestration engine. Collections use
//! ordered maps/sets so that serialised forms are canonical; the baseline
//! section diff depends on that.

pub mod baseline;
pub mod device;
pub mod diff;
pub mod job;
pub mod project;
pub mod user;

pub use baseline::{
    BaselineDevice, BaselineInfo, BaselineTrack, NetworkBaseline, SimpleBaseline,
    BASELINE_DATA_VERSION, BASELINE_NAME_LENGTH_MAX, BASELINE_NAME_LENGTH_MIN, BASELINE_SET_CAP,
    CURRENT_BASELINE_ID, CURRENT_BASELINE_NAME,
};
pub use device::{Device, Link};
pub use diff::{BaselineProjectDiffReport, DiffDetail, ProjectSection};
pub use job::{DiscoveryPhase, JobKind, JobShape, JobState};
pub use project::{Project, ProjectMode, ProjectSetting, ProjectStatus, ScanIpRange, TrafficDesign};
pub use user::User;
