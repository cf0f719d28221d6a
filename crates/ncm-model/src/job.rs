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

/// Control-flow shape a job kind follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobShape {
    /// The engine awaits a completion channel written by the backend.
    Poll,
    /// The engine subscribes to the external event stream.
    Event,
}

/// The asynchronous device/network operations the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Compute a traffic schedule for the project.
    Compute,
    /// Deploy configuration to devices.
    Deploy,
    /// Scan the configured IP ranges and build a topology.
    ScanTopology,
    /// Reset devices to factory defaults.
    FactoryDefault,
    /// Upgrade device firmware.
    FirmwareUpgrade,
    /// Pull running device configuration back into the project.
    SyncDeviceConfig,
    /// Reboot devices.
    Reboot,
    /// Export device configuration archives.
    ExportDeviceConfig,
    /// Import device configuration archives.
    ImportDeviceConfig,
    /// Export the device event log.
    ExportEventLog,
    /// Broadcast-discover devices and assign management IPs.
    BroadcastSearchAndIpSetting,
}

impl JobKind {
    /// Which control-flow shape the kind follows.
    pub fn shape(self) -> JobShape {
        match self {
            JobKind::Deploy | JobKind::ScanTopology | JobKind::BroadcastSearchAndIpSetting => {
                JobShape::Event
            }
            _ => JobShape::Poll,
        }
    }

    /// Wire op-code used on the event stream and in outbound commands.
    pub fn op_code(self) -> &'static str {
        match self {
            JobKind::Compute => "Compute",
            JobKind::Deploy => "Deploy",
            JobKind::ScanTopology => "ScanTopology",
            JobKind::FactoryDefault => "FactoryDefault",
            JobKind::FirmwareUpgrade => "FirmwareUpgrade",
            JobKind::SyncDeviceConfig => "SyncDeviceConfig",
            JobKind::Reboot => "Reboot",
            JobKind::ExportDeviceConfig => "ExportDeviceConfig",
            JobKind::ImportDeviceConfig => "ImportDeviceConfig",
            JobKind::ExportEventLog => "ExportEventLog",
            JobKind::BroadcastSearchAndIpSetting => "BroadcastSearchAndIpSetting",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.op_code())
    }
}

/// Uniform job state machine. `Completed` and `Failed` are re-armable via a
/// new `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JobState {
    /// Idle; a `Start` is accepted.
    #[default]
    Ready,
    /// A run is in flight; `Start` is rejected.
    Running,
    /// The last run finished successfully.
    Completed,
    /// The last run failed; error code/message are recorded on the node.
    Failed,
}

impl JobState {
    /// States from which a `Start` is accepted.
    pub fn can_start(self) -> bool {
        matches!(self, JobState::Ready | JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Ready => "Ready",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Sub-phases of the broadcast-discovery job. Each `…ing` phase is one
/// event-driven run and fails into its phase-specific failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiscoveryPhase {
    /// Nothing started yet.
    #[default]
    Init,
    /// Broadcasting for devices.
    DeviceDiscovering,
    /// Broadcast discovery failed.
    DeviceDiscoveringFailed,
    /// Devices found.
    DeviceDiscovered,
    /// Re-trying connections to discovered devices.
    RetryConnection,
    /// Detecting the physical link sequence.
    LinkSequenceDetecting,
    /// Link sequence detection failed.
    LinkSequenceDetectingFailed,
    /// Link sequence known.
    LinkSequenceDetected,
    /// Assigning management IPs.
    IpConfiguring,
    /// IP assignment failed.
    IpConfiguringFailed,
    /// IPs assigned; discovery finished.
    IpConfigured,
}

impl DiscoveryPhase {
    /// The in-flight phases.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            DiscoveryPhase::DeviceDiscovering
                | DiscoveryPhase::RetryConnection
                | DiscoveryPhase::LinkSequenceDetecting
                | DiscoveryPhase::IpConfiguring
        )
    }

    /// Phase entered when the in-flight phase fails.
    pub fn failed_phase(self) -> DiscoveryPhase {
        match self {
            DiscoveryPhase::DeviceDiscovering => DiscoveryPhase::DeviceDiscoveringFailed,
            // A failed retry still leaves the devices discovered.
            DiscoveryPhase::RetryConnection => DiscoveryPhase::DeviceDiscovered,
            DiscoveryPhase::LinkSequenceDetecting => DiscoveryPhase::LinkSequenceDetectingFailed,
            DiscoveryPhase::IpConfiguring => DiscoveryPhase::IpConfiguringFailed,
            other => other,
        }
    }

    /// Phase entered when the in-flight phase completes.
    pub fn completed_phase(self) -> DiscoveryPhase {
        match self {
            DiscoveryPhase::DeviceDiscovering | DiscoveryPhase::RetryConnection => {
                DiscoveryPhase::DeviceDiscovered
            }
            DiscoveryPhase::LinkSequenceDetecting => DiscoveryPhase::LinkSequenceDetected,
            DiscoveryPhase::IpConfiguring => DiscoveryPhase::IpConfigured,
            other => other,
        }
    }
}
