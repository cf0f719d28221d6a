//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Domain data model for projects and network baselines."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::project::{Project, ProjectMode};

/// Minimum baseline name length.
pub const BASELINE_NAME_LENGTH_MIN: usize = 1;
/// Maximum baseline name length.
pub const BASELINE_NAME_LENGTH_MAX: usize = 64;
/// Maximum number of baselines per track.
pub const BASELINE_SET_CAP: usize = 1000;
/// Reserved id of the synthetic `CURRENT` pseudo-baseline.
pub const CURRENT_BASELINE_ID: i64 = -1;
/// Display name of the synthetic `CURRENT` pseudo-baseline.
pub const CURRENT_BASELINE_NAME: &str = "CURRENT";
/// Data version stamped onto every written baseline.
pub const BASELINE_DATA_VERSION: &str = "2";

/// The two parallel baseline tracks kept per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaselineTrack {
    /// Work-in-progress snapshots.
    Design,
    /// Snapshots deployed (now or previously) to real devices.
    Operation,
}

impl BaselineTrack {
    /// Directory / artifact-path component for the track.
    pub fn as_str(self) -> &'static str {
        match self {
            BaselineTrack::Design => "design",
            BaselineTrack::Operation => "operation",
        }
    }
}

impl std::fmt::Display for BaselineTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device record attached to a baseline. `configuration` stays empty for
/// devices that cannot be deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BaselineDevice {
    /// Device id within the snapshot project.
    pub device_id: i64,
    /// Management IP at snapshot time.
    pub ip_address: String,
    /// Model name at snapshot time.
    pub model_name: String,
    /// Firmware version at snapshot time.
    pub firmware_version: String,
    /// Rendered textual configuration; empty when not deployable.
    pub configuration: String,
}

impl BaselineDevice {
    /// Record for a device that cannot receive configuration.
    pub fn without_configuration(
        device_id: i64,
        ip_address: impl Into<String>,
        model_name: impl Into<String>,
        firmware_version: impl Into<String>,
    ) -> Self {
        Self {
            device_id,
            ip_address: ip_address.into(),
            model_name: model_name.into(),
            firmware_version: firmware_version.into(),
            configuration: String::new(),
        }
    }
}

/// Caller-supplied fields when creating or renaming a baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BaselineInfo {
    /// Requested name; blank means "assign a system name".
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// A named, dated snapshot of a project's full configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkBaseline {
    /// Unique id per track; `-1` is reserved for the synthetic `CURRENT`.
    pub id: i64,
    /// Name, 1–64 chars, unique within project and track.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Snapshot date, epoch seconds.
    pub date: u64,
    /// User who created the snapshot.
    pub created_user: String,
    /// Owning project.
    pub project_id: i64,
    /// Track the baseline belongs to.
    pub track: BaselineTrack,
    /// At most one baseline per project per track carries `true`.
    pub activate: bool,
    /// User who activated the baseline; empty until activated.
    pub activated_user: String,
    /// Activation date, epoch seconds; zero until activated.
    pub activated_date: u64,
    /// Serialisation format version stamp.
    pub data_version: String,
    /// Full embedded copy of the project as it existed at snapshot time.
    pub project: Project,
    /// Per-device records keyed by device id.
    pub devices: BTreeMap<i64, BaselineDevice>,
}

impl NetworkBaseline {
    /// Synthetic `CURRENT` entry representing the live, unsnapshotted state
    /// of the Operation track. Never persisted.
    pub fn current(project: &Project) -> Self {
        Self {
            id: CURRENT_BASELINE_ID,
            name: CURRENT_BASELINE_NAME.to_owned(),
            description: String::new(),
            date: 0,
            created_user: String::new(),
            project_id: project.id,
            track: BaselineTrack::Operation,
            activate: false,
            activated_user: String::new(),
            activated_date: 0,
            data_version: BASELINE_DATA_VERSION.to_owned(),
            project: project.clone(),
            devices: BTreeMap::new(),
        }
    }

    /// Deep copy into the Operation track under the same id, embedding a
    /// fresh snapshot of `live_project` switched to Operation mode.
    pub fn copy_to_operation(&self, live_project: &Project) -> Self {
        let mut snapshot = live_project.snapshot_for_baseline();
        snapshot.mode = ProjectMode::Operation;
        let mut copy = self.clone();
        copy.track = BaselineTrack::Operation;
        copy.project = snapshot;
        copy.devices.clear();
        copy
    }
}

/// Listing/lookup projection without the embedded project payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleBaseline {
    /// Baseline id.
    pub id: i64,
    /// Baseline name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Snapshot date, epoch seconds.
    pub date: u64,
    /// Creating user.
    pub created_user: String,
    /// Owning project.
    pub project_id: i64,
    /// Activation flag.
    pub activate: bool,
    /// Activating user.
    pub activated_user: String,
    /// Activation date.
    pub activated_date: u64,
}

impl From<&NetworkBaseline> for SimpleBaseline {
    fn from(baseline: &NetworkBaseline) -> Self {
        Self {
            id: baseline.id,
            name: baseline.name.clone(),
            description: baseline.description.clone(),
            date: baseline.date,
            created_user: baseline.created_user.clone(),
            project_id: baseline.project_id,
            activate: baseline.activate,
            activated_user: baseline.activated_user.clone(),
            activated_date: baseline.activated_date,
        }
    }
}

impl SimpleBaseline {
    /// The synthetic `CURRENT` row prefixed onto every Operation listing.
    pub fn current(project_id: i64) -> Self {
        Self {
            id: CURRENT_BASELINE_ID,
            name: CURRENT_BASELINE_NAME.to_owned(),
            description: String::new(),
            date: 0,
            created_user: String::new(),
            project_id,
            activate: false,
            activated_user: String::new(),
            activated_date: 0,
        }
    }
}
