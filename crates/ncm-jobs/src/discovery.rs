//! ---
//! ncm_section: "02-grid-and-control"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Broadcast-discovery phase machine."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::HashMap;

use ncm_common::{NcmError, NcmResult, StatusCode};
use ncm_model::DiscoveryPhase;
use parking_lot::Mutex;
use tracing::debug;

/// Per-project phase bookkeeping for the broadcast-discovery job:
/// `Init → DeviceDiscovering → DeviceDiscovered → (RetryConnection) →
/// LinkSequenceDetecting → LinkSequenceDetected → IpConfiguring →
/// IpConfigured`, each in-flight phase failing into its phase-specific
/// failed state.
#[derive(Debug, Default)]
pub struct DiscoveryTracker {
    phases: Mutex<HashMap<i64, DiscoveryPhase>>,
}

impl DiscoveryTracker {
    /// Fresh tracker; unknown projects report `Init`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase of `project_id`.
    pub fn phase(&self, project_id: i64) -> DiscoveryPhase {
        self.phases
            .lock()
            .get(&project_id)
            .copied()
            .unwrap_or_default()
    }

    /// Enter an in-flight phase. Rejected while another phase is in flight
    /// or when the current phase is not a legal predecessor.
    pub fn begin(&self, project_id: i64, phase: DiscoveryPhase) -> NcmResult<()> {
        if !phase.is_active() {
            return Err(NcmError::BadRequest(format!(
                "{phase:?} is not a startable discovery phase"
            )));
        }
        let mut phases = self.phases.lock();
        let current = phases.get(&project_id).copied().unwrap_or_default();
        if current.is_active() {
            return Err(NcmError::NotExecutable(format!("{current:?}")));
        }
        if !legal_entry(current, phase) {
            return Err(NcmError::NotExecutable(format!("{current:?}")));
        }
        phases.insert(project_id, phase);
        debug!(project_id, ?phase, "discovery phase entered");
        Ok(())
    }

    /// Apply one backend status to the in-flight phase. `Running` keeps the
    /// phase; success advances it; `Stop` reverts to the last stable phase;
    /// anything else enters the phase-specific failed state.
    pub fn observe(&self, project_id: i64, code: Option<StatusCode>) -> DiscoveryPhase {
        let mut phases = self.phases.lock();
        let current = phases.get(&project_id).copied().unwrap_or_default();
        if !current.is_active() {
            return current;
        }
        let next = match code {
            Some(StatusCode::Running) => current,
            Some(code) if code.is_success() => current.completed_phase(),
            Some(StatusCode::Stop) => stable_predecessor(current),
            _ => current.failed_phase(),
        };
        phases.insert(project_id, next);
        if next != current {
            debug!(project_id, from = ?current, to = ?next, "discovery phase changed");
        }
        next
    }

    /// Revert an in-flight phase to its stable predecessor. Used by the
    /// out-of-band stop path; a settled phase is left alone.
    pub fn revert(&self, project_id: i64) -> DiscoveryPhase {
        let mut phases = self.phases.lock();
        let current = phases.get(&project_id).copied().unwrap_or_default();
        if !current.is_active() {
            return current;
        }
        let previous = stable_predecessor(current);
        phases.insert(project_id, previous);
        previous
    }

    /// Forget the project's discovery state entirely.
    pub fn reset(&self, project_id: i64) {
        self.phases.lock().remove(&project_id);
    }
}

fn legal_entry(from: DiscoveryPhase, to: DiscoveryPhase) -> bool {
    matches!(
        (from, to),
        (
            DiscoveryPhase::Init | DiscoveryPhase::DeviceDiscoveringFailed,
            DiscoveryPhase::DeviceDiscovering,
        ) | (
            DiscoveryPhase::DeviceDiscovered,
            DiscoveryPhase::RetryConnection | DiscoveryPhase::LinkSequenceDetecting,
        ) | (
            DiscoveryPhase::LinkSequenceDetectingFailed,
            DiscoveryPhase::LinkSequenceDetecting,
        ) | (
            DiscoveryPhase::LinkSequenceDetected | DiscoveryPhase::IpConfiguringFailed,
            DiscoveryPhase::IpConfiguring,
        )
    )
}

fn stable_predecessor(phase: DiscoveryPhase) -> DiscoveryPhase {
    match phase {
        DiscoveryPhase::DeviceDiscovering => DiscoveryPhase::Init,
        DiscoveryPhase::RetryConnection | DiscoveryPhase::LinkSequenceDetecting => {
            DiscoveryPhase::DeviceDiscovered
        }
        DiscoveryPhase::IpConfiguring => DiscoveryPhase::LinkSequenceDetected,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_walk_reaches_ip_configured() {
        let tracker = DiscoveryTracker::new();
        tracker.begin(1, DiscoveryPhase::DeviceDiscovering).unwrap();
        tracker.observe(1, Some(StatusCode::Success));
        assert_eq!(tracker.phase(1), DiscoveryPhase::DeviceDiscovered);
        tracker.begin(1, DiscoveryPhase::LinkSequenceDetecting).unwrap();
        tracker.observe(1, Some(StatusCode::Finished));
        assert_eq!(tracker.phase(1), DiscoveryPhase::LinkSequenceDetected);
        tracker.begin(1, DiscoveryPhase::IpConfiguring).unwrap();
        tracker.observe(1, Some(StatusCode::Success));
        assert_eq!(tracker.phase(1), DiscoveryPhase::IpConfigured);
    }

    #[test]
    fn failed_retry_falls_back_to_discovered() {
        let tracker = DiscoveryTracker::new();
        tracker.begin(1, DiscoveryPhase::DeviceDiscovering).unwrap();
        tracker.observe(1, Some(StatusCode::Success));
        tracker.begin(1, DiscoveryPhase::RetryConnection).unwrap();
        tracker.observe(1, Some(StatusCode::Failed));
        assert_eq!(tracker.phase(1), DiscoveryPhase::DeviceDiscovered);
    }

    #[test]
    fn in_flight_phase_blocks_a_second_begin() {
        let tracker = DiscoveryTracker::new();
        tracker.begin(1, DiscoveryPhase::DeviceDiscovering).unwrap();
        let err = tracker
            .begin(1, DiscoveryPhase::DeviceDiscovering)
            .expect_err("in flight");
        assert!(matches!(err, NcmError::NotExecutable(_)));
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let tracker = DiscoveryTracker::new();
        let err = tracker
            .begin(1, DiscoveryPhase::IpConfiguring)
            .expect_err("no link sequence yet");
        assert!(matches!(err, NcmError::NotExecutable(_)));
    }

    #[test]
    fn stop_reverts_to_the_stable_predecessor() {
        let tracker = DiscoveryTracker::new();
        tracker.begin(1, DiscoveryPhase::DeviceDiscovering).unwrap();
        tracker.observe(1, Some(StatusCode::Stop));
        assert_eq!(tracker.phase(1), DiscoveryPhase::Init);
    }

    #[test]
    fn malformed_status_fails_the_phase() {
        let tracker = DiscoveryTracker::new();
        tracker.begin(1, DiscoveryPhase::DeviceDiscovering).unwrap();
        tracker.observe(1, None);
        assert_eq!(tracker.phase(1), DiscoveryPhase::DeviceDiscoveringFailed);
    }

    #[test]
    fn reset_forgets_the_project() {
        let tracker = DiscoveryTracker::new();
        tracker.begin(1, DiscoveryPhase::DeviceDiscovering).unwrap();
        tracker.observe(1, Some(StatusCode::Success));
        tracker.reset(1);
        assert_eq!(tracker.phase(1), DiscoveryPhase::Init);
    }
}
