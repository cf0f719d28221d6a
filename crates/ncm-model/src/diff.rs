//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Domain data model for projects and network baselines."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::project::Project;

/// The five project sections compared by the baseline diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSection {
    /// SKU quantities (bill of materials).
    Bom,
    /// Per-device configuration tables.
    DeviceConfig,
    /// Project-wide settings.
    ProjectSetting,
    /// Device topology.
    TopologyDevice,
    /// Link topology.
    TopologyLink,
}

impl ProjectSection {
    /// Canonical string serialisation of one section. Model collections are
    /// ordered maps, so equal content always yields equal strings.
    pub fn canonical_string(self, project: &Project) -> String {
        let serialised = match self {
            ProjectSection::Bom => serde_json::to_string(&project.sku_quantities),
            ProjectSection::DeviceConfig => serde_json::to_string(&project.device_configs),
            ProjectSection::ProjectSetting => serde_json::to_string(&project.setting),
            ProjectSection::TopologyDevice => serde_json::to_string(&project.devices),
            ProjectSection::TopologyLink => serde_json::to_string(&project.links),
        };
        // Serialising in-memory model types cannot fail.
        serialised.unwrap_or_default()
    }
}

/// Per-section diff flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiffDetail {
    /// SKU quantities differ.
    pub bom: bool,
    /// Device configuration differs.
    pub device_config: bool,
    /// Project settings differ.
    pub project_setting: bool,
    /// Device topology differs.
    pub topology_device: bool,
    /// Link topology differs.
    pub topology_link: bool,
}

/// Result of comparing a live project against a baseline snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineProjectDiffReport {
    /// Compared baseline id.
    pub id: i64,
    /// Owning project id.
    pub project_id: i64,
    /// True when any section differs.
    pub has_diff: bool,
    /// Per-section flags.
    pub detail: DiffDetail,
}

impl BaselineProjectDiffReport {
    /// Compare the five sections of `live` against `snapshot`.
    pub fn compare(baseline_id: i64, live: &Project, snapshot: &Project) -> Self {
        let mut detail = DiffDetail::default();
        let mut has_diff = false;
        let mut check = |section: ProjectSection, flag: &mut bool| {
            *flag = section.canonical_string(live) != section.canonical_string(snapshot);
            has_diff |= *flag;
        };
        check(ProjectSection::Bom, &mut detail.bom);
        check(ProjectSection::DeviceConfig, &mut detail.device_config);
        check(ProjectSection::ProjectSetting, &mut detail.project_setting);
        check(ProjectSection::TopologyDevice, &mut detail.topology_device);
        check(ProjectSection::TopologyLink, &mut detail.topology_link);
        Self {
            id: baseline_id,
            project_id: live.id,
            has_diff,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;

    #[test]
    fn identical_projects_report_no_diff() {
        let project = Project::new(1, "line-1");
        let report = BaselineProjectDiffReport::compare(5, &project, &project.clone());
        assert!(!report.has_diff);
        assert_eq!(report.detail, DiffDetail::default());
    }

    #[test]
    fn device_edit_flags_only_topology_device() {
        let mut live = Project::new(1, "line-1");
        let snapshot = live.clone();
        live.devices.insert(
            10,
            Device {
                id: 10,
                name: "sw-10".to_owned(),
                ip_address: "10.0.0.10".to_owned(),
                managed: true,
                ..Default::default()
            },
        );
        let report = BaselineProjectDiffReport::compare(5, &live, &snapshot);
        assert!(report.has_diff);
        assert!(report.detail.topology_device);
        assert!(!report.detail.topology_link);
        assert!(!report.detail.bom);
    }

    #[test]
    fn baseline_id_bookkeeping_never_counts_as_diff() {
        let mut live = Project::new(1, "line-1");
        let snapshot = live.snapshot_for_baseline();
        live.design_baseline_ids.insert(42);
        live.activate_baseline_id = 42;
        let report = BaselineProjectDiffReport::compare(42, &live, &snapshot);
        assert!(!report.has_diff);
    }
}
