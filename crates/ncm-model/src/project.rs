//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Domain data model for projects and network baselines."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::device::{Device, Link};

/// Whether a project is being designed or is live against real devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectMode {
    /// Work-in-progress design.
    #[default]
    Design,
    /// Deployed / operating against real devices.
    Operation,
}

/// Coarse project activity indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectStatus {
    /// No job is running against the project.
    #[default]
    Idle,
    /// A job currently holds the project.
    Running,
}

/// One inclusive IPv4 range handed to the topology scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScanIpRange {
    /// First address of the range.
    pub first_ip: String,
    /// Last address of the range.
    pub last_ip: String,
}

/// Project-wide settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProjectSetting {
    /// Ranges scanned by the topology-scan job.
    pub scan_ip_ranges: Vec<ScanIpRange>,
    /// Management VLAN applied during IP assignment.
    pub management_vlan: u16,
}

/// Traffic/QoS design: stream name to reserved bandwidth (kbit/s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrafficDesign {
    /// Reserved streams keyed by name; ordered for canonical serialisation.
    pub streams: BTreeMap<String, u64>,
}

/// The authoritative description of a managed network: topology, per-device
/// configuration, traffic design, and the baseline bookkeeping that the
/// lifecycle manager maintains.
///
/// Owned by the Domain Store and mutated only while the store lock is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Project {
    /// Unique project id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Design or Operation.
    pub mode: ProjectMode,
    /// Idle or Running.
    pub status: ProjectStatus,
    /// Devices keyed by id.
    pub devices: BTreeMap<i64, Device>,
    /// Links keyed by id.
    pub links: BTreeMap<i64, Link>,
    /// Per-device configuration tables: device id to key/value settings.
    pub device_configs: BTreeMap<i64, BTreeMap<String, String>>,
    /// Traffic/QoS design.
    pub traffic_design: TrafficDesign,
    /// Project-wide settings.
    pub setting: ProjectSetting,
    /// Bill-of-materials: SKU to quantity.
    pub sku_quantities: BTreeMap<String, u32>,
    /// Ids of this project's design-track baselines.
    pub design_baseline_ids: BTreeSet<i64>,
    /// Ids of this project's operation-track baselines.
    pub operation_baseline_ids: BTreeSet<i64>,
    /// Id of the currently active baseline; `-1` when none was activated yet.
    pub activate_baseline_id: i64,
    /// Project id on the external service platform; `-1` before registration.
    pub platform_project_id: i64,
}

impl Project {
    /// Construct an empty design project.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            activate_baseline_id: -1,
            platform_project_id: -1,
            ..Default::default()
        }
    }

    /// Snapshot copy embedded into a baseline: the baseline-id sets are
    /// cleared so baselines never reference other baselines.
    pub fn snapshot_for_baseline(&self) -> Self {
        let mut copy = self.clone();
        copy.design_baseline_ids.clear();
        copy.operation_baseline_ids.clear();
        copy
    }
}
