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

/// A managed switch or end-station within a project topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Device {
    /// Unique device id within the project.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Management IPv4 address.
    pub ip_address: String,
    /// MAC address of the management interface.
    pub mac_address: String,
    /// Vendor model name.
    pub model_name: String,
    /// Running firmware version.
    pub firmware_version: String,
    /// Whether NCM can push configuration to this device. End-stations and
    /// unmanaged third-party switches are visible in the topology but never
    /// receive rendered configuration.
    pub managed: bool,
}

impl Device {
    /// Devices capable of deployment receive rendered offline configuration
    /// in baseline device records; the rest get an empty-configuration entry.
    pub fn can_deploy(&self) -> bool {
        self.managed
    }
}

/// A physical link between two device ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Link {
    /// Unique link id within the project.
    pub id: i64,
    /// Device id on the A side.
    pub from_device: i64,
    /// Port number on the A side.
    pub from_port: u16,
    /// Device id on the B side.
    pub to_device: i64,
    /// Port number on the B side.
    pub to_port: u16,
}
