//! ---
//! ncm_section: "03-persistence-logging"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Authoritative in-memory domain state and its collaborators."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! The Domain Store: the single authoritative copy of every Project and both
//! NetworkBaseline tracks, guarded by one coarse process-wide lock. Every
//! read-modify-write sequence (load, validate, mutate a copy, persist, swap
//! back in) holds the lock for its full duration, which serialises all
//! project and baseline mutations process-wide. Backend job execution runs
//! outside the lock.

pub mod notify;
pub mod persist;

use std::collections::BTreeMap;

use ncm_common::{NcmError, NcmResult};
use ncm_model::{BaselineTrack, NetworkBaseline, Project, User};
use parking_lot::{Mutex, MutexGuard};

pub use notify::{
    BufferingNotifier, ChangeAction, ChangeEvent, ChangeKind, ChangeNotifier, NullNotifier,
};
pub use persist::{BaselinePersistence, FileBaselineStore, MemoryBaselineStore, PersistOp};

/// Everything behind the store lock.
#[derive(Debug, Default)]
pub struct CoreState {
    projects: BTreeMap<i64, Project>,
    users: BTreeMap<i64, User>,
    design_baselines: BTreeMap<i64, NetworkBaseline>,
    operation_baselines: BTreeMap<i64, NetworkBaseline>,
    last_assigned_design_baseline_id: i64,
}

impl CoreState {
    /// Load a copy of a project.
    pub fn project(&self, project_id: i64) -> NcmResult<Project> {
        self.projects
            .get(&project_id)
            .cloned()
            .ok_or_else(|| NcmError::NotFound(format!("project id {project_id}")))
    }

    /// Swap a mutated project copy back in.
    pub fn put_project(&mut self, project: Project) {
        self.projects.insert(project.id, project);
    }

    /// Remove a project record. Baselines are cleaned up separately.
    pub fn remove_project(&mut self, project_id: i64) -> Option<Project> {
        self.projects.remove(&project_id)
    }

    /// Load a copy of a user account.
    pub fn user(&self, user_id: i64) -> NcmResult<User> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| NcmError::NotFound(format!("user id {user_id}")))
    }

    /// Insert or replace a user account.
    pub fn put_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// The baseline set of one track.
    pub fn baselines(&self, track: BaselineTrack) -> &BTreeMap<i64, NetworkBaseline> {
        match track {
            BaselineTrack::Design => &self.design_baselines,
            BaselineTrack::Operation => &self.operation_baselines,
        }
    }

    /// Mutable baseline set of one track.
    pub fn baselines_mut(&mut self, track: BaselineTrack) -> &mut BTreeMap<i64, NetworkBaseline> {
        match track {
            BaselineTrack::Design => &mut self.design_baselines,
            BaselineTrack::Operation => &mut self.operation_baselines,
        }
    }

    /// Load a copy of one baseline.
    pub fn baseline(&self, track: BaselineTrack, baseline_id: i64) -> NcmResult<NetworkBaseline> {
        self.baselines(track)
            .get(&baseline_id)
            .cloned()
            .ok_or_else(|| NcmError::NotFound(format!("{track} baseline id {baseline_id}")))
    }

    /// Re-insert a recovered baseline at start-up. Advances the id counter
    /// past recovered design ids so fresh allocations never collide.
    pub fn restore_baseline(&mut self, track: BaselineTrack, baseline: NetworkBaseline) {
        if track == BaselineTrack::Design {
            self.last_assigned_design_baseline_id =
                self.last_assigned_design_baseline_id.max(baseline.id);
        }
        self.baselines_mut(track).insert(baseline.id, baseline);
    }

    /// Allocate a new unique design-baseline id: the last-assigned counter
    /// advances monotonically and probes past ids still present in the live
    /// set. The set holds at most [`ncm_model::BASELINE_SET_CAP`] entries, so
    /// probing one candidate more than the cap always terminates.
    pub fn allocate_design_baseline_id(&mut self) -> NcmResult<i64> {
        let mut candidate = self.last_assigned_design_baseline_id;
        for _ in 0..=ncm_model::BASELINE_SET_CAP {
            candidate = candidate.wrapping_add(1).max(1);
            if !self.design_baselines.contains_key(&candidate) {
                self.last_assigned_design_baseline_id = candidate;
                return Ok(candidate);
            }
        }
        Err(NcmError::Internal(
            "cannot allocate an available unique baseline id".to_owned(),
        ))
    }
}

/// Process-wide domain store. Constructed once at start-up and shared by
/// reference between the baseline manager and the job engine.
#[derive(Debug, Default)]
pub struct Store {
    state: Mutex<CoreState>,
}

impl Store {
    /// Fresh, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the coarse store lock.
    pub fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock()
    }

    /// Convenience read of a project copy.
    pub fn project(&self, project_id: i64) -> NcmResult<Project> {
        self.lock().project(project_id)
    }

    /// Convenience insert/replace of a project.
    pub fn put_project(&self, project: Project) {
        self.lock().put_project(project);
    }

    /// Convenience insert/replace of a user account.
    pub fn put_user(&self, user: User) {
        self.lock().put_user(user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_lookup_reports_not_found() {
        let store = Store::new();
        let err = store.project(9).expect_err("missing project");
        assert_eq!(err, NcmError::NotFound("project id 9".to_owned()));
    }

    #[test]
    fn id_allocation_probes_past_live_ids() {
        let store = Store::new();
        let mut state = store.lock();
        let first = state.allocate_design_baseline_id().expect("id");
        assert_eq!(first, 1);

        // Simulate an id surviving in the live set while the counter laps it.
        let mut baseline = NetworkBaseline::current(&Project::new(1, "p"));
        baseline.id = 2;
        baseline.track = BaselineTrack::Design;
        state.baselines_mut(BaselineTrack::Design).insert(2, baseline);

        let second = state.allocate_design_baseline_id().expect("id");
        assert_eq!(second, 3, "id 2 is occupied and must be probed past");
    }

    #[test]
    fn restore_advances_the_id_counter() {
        let store = Store::new();
        let mut state = store.lock();
        let mut recovered = NetworkBaseline::current(&Project::new(1, "p"));
        recovered.id = 17;
        recovered.track = BaselineTrack::Design;
        state.restore_baseline(BaselineTrack::Design, recovered);

        let next = state.allocate_design_baseline_id().expect("id");
        assert_eq!(next, 18);
    }

    #[test]
    fn removed_projects_stop_resolving() {
        let store = Store::new();
        store.put_project(Project::new(5, "plant-e"));
        let mut state = store.lock();
        assert!(state.remove_project(5).is_some());
        assert!(state.remove_project(5).is_none());
        assert!(state.project(5).is_err());
    }

    #[test]
    fn baseline_lookup_is_track_scoped() {
        let store = Store::new();
        let mut state = store.lock();
        let mut baseline = NetworkBaseline::current(&Project::new(1, "p"));
        baseline.id = 7;
        baseline.track = BaselineTrack::Design;
        state.baselines_mut(BaselineTrack::Design).insert(7, baseline);

        assert!(state.baseline(BaselineTrack::Design, 7).is_ok());
        let err = state
            .baseline(BaselineTrack::Operation, 7)
            .expect_err("wrong track");
        assert!(matches!(err, NcmError::NotFound(_)));
    }
}
