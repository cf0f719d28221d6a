//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Baseline lifecycle operations over the Domain Store."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::Arc;

use ncm_common::time::{epoch_seconds, system_assigned_baseline_name};
use ncm_common::{NcmError, NcmResult};
use ncm_model::{
    BaselineDevice, BaselineInfo, BaselineProjectDiffReport, BaselineTrack, NetworkBaseline,
    Project, SimpleBaseline, BASELINE_DATA_VERSION, BASELINE_NAME_LENGTH_MAX,
    BASELINE_NAME_LENGTH_MIN, BASELINE_SET_CAP, CURRENT_BASELINE_ID,
};
use ncm_store::{
    BaselinePersistence, ChangeAction, ChangeEvent, ChangeNotifier, CoreState, Store,
};
use tracing::{info, warn};

use crate::registrar::{BaselineRegistration, PlatformRegistrar};
use crate::render::{strip_to_configure_terminal, ConfigRenderer};

/// Baseline lifecycle manager. One instance per process, wired with the
/// Domain Store and its persistence, notification, rendering, and platform
/// collaborators.
pub struct BaselineManager {
    store: Arc<Store>,
    persistence: Arc<dyn BaselinePersistence>,
    notifier: Arc<dyn ChangeNotifier>,
    renderer: Arc<dyn ConfigRenderer>,
    registrar: Arc<dyn PlatformRegistrar>,
}

impl BaselineManager {
    /// Wire a manager over `store` and its collaborators.
    pub fn new(
        store: Arc<Store>,
        persistence: Arc<dyn BaselinePersistence>,
        notifier: Arc<dyn ChangeNotifier>,
        renderer: Arc<dyn ConfigRenderer>,
        registrar: Arc<dyn PlatformRegistrar>,
    ) -> Self {
        Self {
            store,
            persistence,
            notifier,
            renderer,
            registrar,
        }
    }

    /// Snapshot `project_id` into a new Design-track baseline. A blank
    /// `info.name` gets a system-assigned timestamp name.
    pub fn create_design_baseline(
        &self,
        project_id: i64,
        info: BaselineInfo,
        user_id: i64,
    ) -> NcmResult<NetworkBaseline> {
        let track = BaselineTrack::Design;
        let mut state = self.store.lock();
        let mut project = state.project(project_id)?;
        let user = state.user(user_id)?;

        let name = if info.name.is_empty() {
            system_assigned_baseline_name()
        } else {
            info.name
        };
        check_name_length(&name)?;
        check_track_capacity(&state, track)?;
        check_name_unique(&state, track, project_id, &name, None)?;

        let id = state.allocate_design_baseline_id()?;
        let baseline = NetworkBaseline {
            id,
            name,
            description: info.description,
            date: epoch_seconds(),
            created_user: user.username,
            project_id,
            track,
            activate: false,
            activated_user: String::new(),
            activated_date: 0,
            data_version: BASELINE_DATA_VERSION.to_owned(),
            project: project.snapshot_for_baseline(),
            devices: BTreeMap::new(),
        };
        self.persistence.write_baseline(track, &baseline)?;
        state.baselines_mut(track).insert(id, baseline.clone());

        project.design_baseline_ids.insert(id);
        // In-memory state is authoritative; a failed project write diverges
        // the artifact until the next successful write.
        if let Err(err) = self.persistence.write_project(&project) {
            warn!(project_id, %err, "project write failed after baseline create");
        }
        state.put_project(project);

        self.notify_record(track, ChangeAction::Create, &baseline);
        info!(project_id, baseline_id = id, name = %baseline.name, "design baseline created");
        Ok(baseline)
    }

    /// Create a Design baseline and immediately activate it. When activation
    /// fails the freshly created baseline is removed again from both tracks
    /// before the error is returned.
    pub fn create_design_baseline_and_activate(
        &self,
        project_id: i64,
        info: BaselineInfo,
        user_id: i64,
    ) -> NcmResult<NetworkBaseline> {
        let created = self.create_design_baseline(project_id, info, user_id)?;
        if let Err(err) = self.activate_design_baseline(project_id, created.id, user_id) {
            warn!(
                project_id,
                baseline_id = created.id,
                %err,
                "activation failed; removing the baseline created for it"
            );
            if let Err(cleanup_err) =
                self.delete_design_and_operation_baseline(project_id, created.id)
            {
                warn!(project_id, baseline_id = created.id, %cleanup_err, "cleanup delete failed");
            }
            return Err(err);
        }
        self.design_baseline(project_id, created.id)
    }

    /// Rename and/or re-describe a Design-track baseline.
    pub fn update_design_baseline(
        &self,
        project_id: i64,
        baseline_id: i64,
        info: BaselineInfo,
    ) -> NcmResult<NetworkBaseline> {
        self.update_baseline(BaselineTrack::Design, project_id, baseline_id, info)
    }

    /// Rename and/or re-describe an Operation-track baseline.
    pub fn update_operation_baseline(
        &self,
        project_id: i64,
        baseline_id: i64,
        info: BaselineInfo,
    ) -> NcmResult<NetworkBaseline> {
        self.update_baseline(BaselineTrack::Operation, project_id, baseline_id, info)
    }

    fn update_baseline(
        &self,
        track: BaselineTrack,
        project_id: i64,
        baseline_id: i64,
        info: BaselineInfo,
    ) -> NcmResult<NetworkBaseline> {
        if baseline_id == CURRENT_BASELINE_ID {
            return Err(NcmError::BadRequest(
                "the CURRENT baseline cannot be updated".to_owned(),
            ));
        }
        let mut state = self.store.lock();
        let mut baseline = load_project_baseline(&state, track, project_id, baseline_id)?;

        let name = if info.name.is_empty() {
            baseline.name.clone()
        } else {
            info.name
        };
        check_name_length(&name)?;
        check_name_unique(&state, track, project_id, &name, Some(baseline_id))?;

        if name != baseline.name {
            self.persistence
                .rename_baseline_file(track, baseline_id, &baseline.name, &name)?;
            baseline.name = name;
        }
        baseline.description = info.description;
        baseline.data_version = BASELINE_DATA_VERSION.to_owned();
        self.persistence.write_baseline(track, &baseline)?;
        state.baselines_mut(track).insert(baseline_id, baseline.clone());

        self.notify_record(track, ChangeAction::Update, &baseline);
        Ok(baseline)
    }

    /// Promote a Design baseline into the Operation track and mark it as the
    /// project's live configuration.
    ///
    /// Three phases, deliberately not transactional: (1) flip the activation
    /// flag within the Design set, (2) copy the baseline into the Operation
    /// track under the same id, (3) flip the flag within the Operation set.
    /// A phase-2 or phase-3 failure leaves phase 1 in place.
    pub fn activate_design_baseline(
        &self,
        project_id: i64,
        baseline_id: i64,
        user_id: i64,
    ) -> NcmResult<()> {
        let mut state = self.store.lock();
        let mut project = state.project(project_id)?;
        let user = state.user(user_id)?;
        load_project_baseline(&state, BaselineTrack::Design, project_id, baseline_id)?;

        self.flip_activation(
            &mut state,
            BaselineTrack::Design,
            project_id,
            baseline_id,
            &user.username,
        )?;
        self.copy_design_to_operation(&mut state, &mut project, baseline_id)?;
        self.flip_activation(
            &mut state,
            BaselineTrack::Operation,
            project_id,
            baseline_id,
            &user.username,
        )?;

        project.activate_baseline_id = baseline_id;
        if let Err(err) = self.persistence.write_project(&project) {
            warn!(project_id, %err, "project write failed after activation");
        }
        state.put_project(project);
        info!(project_id, baseline_id, user = %user.username, "design baseline activated");
        Ok(())
    }

    /// Unactivate the previously active baseline of `track` (if any) and
    /// activate `target_id`, stamping user and date. Each touched record is
    /// persisted and announced individually.
    fn flip_activation(
        &self,
        state: &mut CoreState,
        track: BaselineTrack,
        project_id: i64,
        target_id: i64,
        username: &str,
    ) -> NcmResult<()> {
        let previous = state
            .baselines(track)
            .values()
            .find(|b| b.project_id == project_id && b.activate && b.id != target_id)
            .map(|b| b.id);
        if let Some(prev_id) = previous {
            let mut prev = state.baseline(track, prev_id)?;
            prev.activate = false;
            self.persistence.write_baseline(track, &prev)?;
            self.notify_patch(
                track,
                project_id,
                serde_json::json!({ "id": prev_id, "activate": false }),
            );
            state.baselines_mut(track).insert(prev_id, prev);
        }

        let mut target = state.baseline(track, target_id)?;
        target.activate = true;
        target.activated_user = username.to_owned();
        target.activated_date = epoch_seconds();
        self.persistence.write_baseline(track, &target)?;
        self.notify_patch(
            track,
            project_id,
            serde_json::json!({
                "id": target_id,
                "activate": true,
                "activated_user": target.activated_user,
                "activated_date": target.activated_date,
            }),
        );
        state.baselines_mut(track).insert(target_id, target);
        Ok(())
    }

    /// Deep-copy a Design baseline into the Operation track under the same
    /// id, embedding a fresh snapshot of the live project in Operation mode.
    /// A stale Operation baseline with that id is deleted first.
    fn copy_design_to_operation(
        &self,
        state: &mut CoreState,
        project: &mut Project,
        baseline_id: i64,
    ) -> NcmResult<()> {
        let track = BaselineTrack::Operation;
        if let Some(stale) = state.baselines_mut(track).remove(&baseline_id) {
            self.persistence
                .delete_baseline_file(track, baseline_id, &stale.name)?;
            project.operation_baseline_ids.remove(&baseline_id);
            self.notify_patch(
                track,
                project.id,
                serde_json::json!({ "id": baseline_id, "deleted": true }),
            );
        }

        let design = state.baseline(BaselineTrack::Design, baseline_id)?;
        let copy = design.copy_to_operation(project);
        self.persistence.write_baseline(track, &copy)?;
        project.operation_baseline_ids.insert(baseline_id);
        self.notify_record(track, ChangeAction::Create, &copy);
        state.baselines_mut(track).insert(baseline_id, copy);
        Ok(())
    }

    /// Restore the live project from a Design baseline's embedded snapshot.
    ///
    /// Only the design-baseline-id set is carried over from the live project;
    /// every other field, the operation-baseline-id set included, comes from
    /// the snapshot.
    pub fn rollback_design_baseline(&self, project_id: i64, baseline_id: i64) -> NcmResult<()> {
        let mut state = self.store.lock();
        let live = state.project(project_id)?;
        let baseline = load_project_baseline(&state, BaselineTrack::Design, project_id, baseline_id)?;

        let mut restored = baseline.project.clone();
        restored.design_baseline_ids = live.design_baseline_ids.clone();
        if let Err(err) = self.persistence.write_project(&restored) {
            warn!(project_id, %err, "project write failed after rollback");
        }
        state.put_project(restored);
        info!(project_id, baseline_id, "project rolled back to design baseline");
        Ok(())
    }

    /// Delete a Design-track baseline by id and persist the owning project.
    pub fn delete_design_baseline(&self, project_id: i64, baseline_id: i64) -> NcmResult<()> {
        self.delete_baseline(BaselineTrack::Design, project_id, baseline_id)
    }

    /// Delete an Operation-track baseline by id and persist the owning
    /// project. Deleting the active Operation baseline is permitted.
    pub fn delete_operation_baseline(&self, project_id: i64, baseline_id: i64) -> NcmResult<()> {
        self.delete_baseline(BaselineTrack::Operation, project_id, baseline_id)
    }

    fn delete_baseline(
        &self,
        track: BaselineTrack,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<()> {
        let mut state = self.store.lock();
        let mut project = state.project(project_id)?;
        self.delete_baseline_in_project(&mut state, track, &mut project, baseline_id)?;
        if let Err(err) = self.persistence.write_project(&project) {
            warn!(project_id, %err, "project write failed after baseline delete");
        }
        state.put_project(project);
        Ok(())
    }

    /// Delete overload against an already-loaded project copy. Mutates the
    /// project's id set but does not persist or swap the project back in;
    /// the caller owns that.
    pub fn delete_baseline_in_project(
        &self,
        state: &mut CoreState,
        track: BaselineTrack,
        project: &mut Project,
        baseline_id: i64,
    ) -> NcmResult<()> {
        if baseline_id == CURRENT_BASELINE_ID {
            return Err(NcmError::BadRequest(
                "the CURRENT baseline cannot be deleted".to_owned(),
            ));
        }
        let baseline = load_project_baseline(state, track, project.id, baseline_id)?;
        state.baselines_mut(track).remove(&baseline_id);
        self.persistence
            .delete_baseline_file(track, baseline_id, &baseline.name)?;
        match track {
            BaselineTrack::Design => project.design_baseline_ids.remove(&baseline_id),
            BaselineTrack::Operation => project.operation_baseline_ids.remove(&baseline_id),
        };
        self.notify_patch(
            track,
            project.id,
            serde_json::json!({ "id": baseline_id, "deleted": true }),
        );
        Ok(())
    }

    /// Delete `baseline_id` from whichever tracks hold it, then persist the
    /// project once. Fails with `NotFound` only when neither track holds it.
    pub fn delete_design_and_operation_baseline(
        &self,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<()> {
        let mut state = self.store.lock();
        let mut project = state.project(project_id)?;
        let mut deleted = false;
        for track in [BaselineTrack::Design, BaselineTrack::Operation] {
            match self.delete_baseline_in_project(&mut state, track, &mut project, baseline_id) {
                Ok(()) => deleted = true,
                Err(NcmError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if !deleted {
            return Err(NcmError::NotFound(format!(
                "baseline id {baseline_id} in project {project_id}"
            )));
        }
        if let Err(err) = self.persistence.write_project(&project) {
            warn!(project_id, %err, "project write failed after baseline delete");
        }
        state.put_project(project);
        Ok(())
    }

    /// Remove every baseline of `project_id` from both tracks. Used when a
    /// project is destroyed; the project record itself is left untouched.
    pub fn delete_project_all_baselines(&self, project_id: i64) -> NcmResult<()> {
        let mut state = self.store.lock();
        for track in [BaselineTrack::Design, BaselineTrack::Operation] {
            let ids: Vec<i64> = state
                .baselines(track)
                .values()
                .filter(|b| b.project_id == project_id)
                .map(|b| b.id)
                .collect();
            for id in ids {
                if let Some(baseline) = state.baselines_mut(track).remove(&id) {
                    if let Err(err) = self.persistence.delete_baseline_file(track, id, &baseline.name)
                    {
                        warn!(project_id, baseline_id = id, %err, "baseline artifact delete failed");
                    }
                    self.notify_patch(
                        track,
                        project_id,
                        serde_json::json!({ "id": id, "deleted": true }),
                    );
                }
            }
        }
        Ok(())
    }

    /// Project-filtered Design listing, ascending by snapshot date.
    pub fn design_baseline_list(&self, project_id: i64) -> NcmResult<Vec<SimpleBaseline>> {
        let state = self.store.lock();
        state.project(project_id)?;
        Ok(sorted_track_list(&state, BaselineTrack::Design, project_id))
    }

    /// Project-filtered Operation listing, ascending by snapshot date and
    /// always prefixed with the synthetic `CURRENT` entry.
    pub fn operation_baseline_list(&self, project_id: i64) -> NcmResult<Vec<SimpleBaseline>> {
        let state = self.store.lock();
        state.project(project_id)?;
        let mut list = vec![SimpleBaseline::current(project_id)];
        list.extend(sorted_track_list(&state, BaselineTrack::Operation, project_id));
        Ok(list)
    }

    /// Single Design-track lookup.
    pub fn design_baseline(&self, project_id: i64, baseline_id: i64) -> NcmResult<NetworkBaseline> {
        let state = self.store.lock();
        load_project_baseline(&state, BaselineTrack::Design, project_id, baseline_id)
    }

    /// Single Operation-track lookup. Id `-1` synthesises the `CURRENT`
    /// pseudo-baseline from the live project.
    pub fn operation_baseline(
        &self,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<NetworkBaseline> {
        let state = self.store.lock();
        if baseline_id == CURRENT_BASELINE_ID {
            let project = state.project(project_id)?;
            return Ok(NetworkBaseline::current(&project));
        }
        load_project_baseline(&state, BaselineTrack::Operation, project_id, baseline_id)
    }

    /// Design lookup with rendered per-device configuration attached.
    pub fn design_baseline_with_devices(
        &self,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<NetworkBaseline> {
        let mut baseline = self.design_baseline(project_id, baseline_id)?;
        self.attach_rendered_devices(&mut baseline)?;
        Ok(baseline)
    }

    /// Operation lookup with rendered per-device configuration attached.
    pub fn operation_baseline_with_devices(
        &self,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<NetworkBaseline> {
        let mut baseline = self.operation_baseline(project_id, baseline_id)?;
        self.attach_rendered_devices(&mut baseline)?;
        Ok(baseline)
    }

    /// Render and attach device records. Runs on an owned baseline copy with
    /// the store lock already released; rendering is I/O-heavy.
    fn attach_rendered_devices(&self, baseline: &mut NetworkBaseline) -> NcmResult<()> {
        let mut devices = BTreeMap::new();
        for device in baseline.project.devices.values() {
            let mut record = BaselineDevice::without_configuration(
                device.id,
                &device.ip_address,
                &device.model_name,
                &device.firmware_version,
            );
            if device.can_deploy() {
                let rendered = self.renderer.render_device_config(&baseline.project, device)?;
                record.configuration = strip_to_configure_terminal(&rendered).to_owned();
            }
            devices.insert(device.id, record);
        }
        baseline.devices = devices;
        Ok(())
    }

    /// The project's active Operation baseline as a listing record.
    pub fn active_operation_baseline(&self, project_id: i64) -> NcmResult<SimpleBaseline> {
        let state = self.store.lock();
        state.project(project_id)?;
        state
            .baselines(BaselineTrack::Operation)
            .values()
            .find(|b| b.project_id == project_id && b.activate)
            .map(SimpleBaseline::from)
            .ok_or_else(|| {
                NcmError::NotFound(format!("active operation baseline for project {project_id}"))
            })
    }

    /// The embedded project snapshot of the active Operation baseline.
    pub fn active_operation_baseline_project(&self, project_id: i64) -> NcmResult<Project> {
        let state = self.store.lock();
        state.project(project_id)?;
        state
            .baselines(BaselineTrack::Operation)
            .values()
            .find(|b| b.project_id == project_id && b.activate)
            .map(|b| b.project.clone())
            .ok_or_else(|| {
                NcmError::NotFound(format!("active operation baseline for project {project_id}"))
            })
    }

    /// Five-section structural diff of the live project against a Design
    /// baseline's snapshot.
    pub fn check_design_baseline_project_diff(
        &self,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<BaselineProjectDiffReport> {
        let state = self.store.lock();
        let live = state.project(project_id)?;
        let baseline = load_project_baseline(&state, BaselineTrack::Design, project_id, baseline_id)?;
        Ok(BaselineProjectDiffReport::compare(
            baseline_id,
            &live,
            &baseline.project,
        ))
    }

    /// Push a Design baseline's bill-of-materials to the licensing platform.
    /// The store lock is released before the outbound call.
    pub async fn register_design_baseline(
        &self,
        project_id: i64,
        baseline_id: i64,
    ) -> NcmResult<()> {
        let registration = {
            let state = self.store.lock();
            let project = state.project(project_id)?;
            let baseline =
                load_project_baseline(&state, BaselineTrack::Design, project_id, baseline_id)?;
            BaselineRegistration {
                platform_project_id: project.platform_project_id,
                baseline_name: baseline.name.clone(),
                sku_quantities: baseline.project.sku_quantities.clone(),
            }
        };
        self.registrar.register_baseline(&registration).await?;
        info!(project_id, baseline_id, "design baseline registered with the platform");
        Ok(())
    }

    fn notify_record(&self, track: BaselineTrack, action: ChangeAction, baseline: &NetworkBaseline) {
        let payload = serde_json::to_value(SimpleBaseline::from(baseline))
            .unwrap_or(serde_json::Value::Null);
        self.notifier.notify(ChangeEvent {
            kind: track.into(),
            action,
            project_id: baseline.project_id,
            payload,
            is_patch: false,
        });
    }

    fn notify_patch(&self, track: BaselineTrack, project_id: i64, payload: serde_json::Value) {
        self.notifier.notify(ChangeEvent {
            kind: track.into(),
            action: ChangeAction::Update,
            project_id,
            payload,
            is_patch: true,
        });
    }
}

fn load_project_baseline(
    state: &CoreState,
    track: BaselineTrack,
    project_id: i64,
    baseline_id: i64,
) -> NcmResult<NetworkBaseline> {
    let baseline = state.baseline(track, baseline_id)?;
    if baseline.project_id != project_id {
        return Err(NcmError::NotFound(format!(
            "{track} baseline id {baseline_id} in project {project_id}"
        )));
    }
    Ok(baseline)
}

fn sorted_track_list(
    state: &CoreState,
    track: BaselineTrack,
    project_id: i64,
) -> Vec<SimpleBaseline> {
    let mut list: Vec<SimpleBaseline> = state
        .baselines(track)
        .values()
        .filter(|b| b.project_id == project_id)
        .map(SimpleBaseline::from)
        .collect();
    list.sort_by_key(|b| (b.date, b.id));
    list
}

fn check_name_length(name: &str) -> NcmResult<()> {
    let length = name.chars().count();
    if !(BASELINE_NAME_LENGTH_MIN..=BASELINE_NAME_LENGTH_MAX).contains(&length) {
        return Err(NcmError::BadRequest(format!(
            "the name length ({length}) must be between {BASELINE_NAME_LENGTH_MIN} and {BASELINE_NAME_LENGTH_MAX}"
        )));
    }
    Ok(())
}

// The cap bounds the whole track set, not one project's share of it.
fn check_track_capacity(state: &CoreState, track: BaselineTrack) -> NcmResult<()> {
    let count = state.baselines(track).len();
    if count >= BASELINE_SET_CAP {
        return Err(NcmError::LicenseSizeExceeded {
            scope: format!("{track} baseline set"),
            limit: BASELINE_SET_CAP,
        });
    }
    Ok(())
}

fn check_name_unique(
    state: &CoreState,
    track: BaselineTrack,
    project_id: i64,
    name: &str,
    exclude_id: Option<i64>,
) -> NcmResult<()> {
    let duplicated = state
        .baselines(track)
        .values()
        .any(|b| b.project_id == project_id && b.name == name && Some(b.id) != exclude_id);
    if duplicated {
        return Err(NcmError::Duplicated(name.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::RecordingRegistrar;
    use crate::render::TableRenderer;
    use ncm_model::User;
    use ncm_store::{BufferingNotifier, MemoryBaselineStore, PersistOp};

    struct Fixture {
        manager: BaselineManager,
        store: Arc<Store>,
        persistence: Arc<MemoryBaselineStore>,
        notifier: Arc<BufferingNotifier>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::new());
        store.put_project(Project::new(42, "plant-a"));
        store.put_user(User::new(7, "alice"));
        let persistence = Arc::new(MemoryBaselineStore::new());
        let notifier = Arc::new(BufferingNotifier::new());
        let manager = BaselineManager::new(
            Arc::clone(&store),
            Arc::clone(&persistence) as Arc<dyn BaselinePersistence>,
            Arc::clone(&notifier) as Arc<dyn ChangeNotifier>,
            Arc::new(TableRenderer),
            Arc::new(RecordingRegistrar::new()),
        );
        Fixture {
            manager,
            store,
            persistence,
            notifier,
        }
    }

    fn info(name: &str) -> BaselineInfo {
        BaselineInfo {
            name: name.to_owned(),
            description: String::new(),
        }
    }

    #[test]
    fn create_assigns_system_name_when_blank() {
        let fx = fixture();
        let baseline = fx.manager.create_design_baseline(42, info(""), 7).unwrap();
        assert!(baseline.name.starts_with("Baseline_"));
        assert_eq!(baseline.created_user, "alice");
        assert_eq!(baseline.data_version, "2");
        assert!(baseline.project.design_baseline_ids.is_empty());
        assert_eq!(fx.store.project(42).unwrap().design_baseline_ids.len(), 1);
    }

    #[test]
    fn project_write_failure_does_not_roll_back_the_create() {
        let fx = fixture();
        fx.persistence.fail_next_project_write();

        let baseline = fx.manager.create_design_baseline(42, info("kept"), 7).unwrap();

        // The baseline is committed and the in-memory project references it;
        // only the project artifact lagged behind.
        assert_eq!(fx.manager.design_baseline(42, baseline.id).unwrap().name, "kept");
        assert!(fx.store.project(42).unwrap().design_baseline_ids.contains(&baseline.id));
        let ops = fx.persistence.take_ops();
        assert!(ops.iter().any(|op| matches!(op, PersistOp::WriteBaseline { .. })));
        assert!(!ops.iter().any(|op| matches!(op, PersistOp::WriteProject { .. })));
    }

    #[test]
    fn duplicate_name_fails_and_leaves_the_first_untouched() {
        let fx = fixture();
        let first = fx.manager.create_design_baseline(42, info("B1"), 7).unwrap();
        let err = fx
            .manager
            .create_design_baseline(42, info("B1"), 7)
            .expect_err("duplicate");
        assert_eq!(err, NcmError::Duplicated("B1".to_owned()));
        assert_eq!(fx.manager.design_baseline(42, first.id).unwrap().name, "B1");
        assert_eq!(fx.manager.design_baseline_list(42).unwrap().len(), 1);
    }

    #[test]
    fn name_length_is_checked_before_uniqueness() {
        let fx = fixture();
        let too_long = "x".repeat(BASELINE_NAME_LENGTH_MAX + 1);
        let err = fx
            .manager
            .create_design_baseline(42, info(&too_long), 7)
            .expect_err("too long");
        assert!(matches!(err, NcmError::BadRequest(_)));
        assert!(fx.manager.design_baseline_list(42).unwrap().is_empty());
    }

    #[test]
    fn track_capacity_is_capped() {
        let fx = fixture();
        {
            let mut state = fx.store.lock();
            for n in 0..BASELINE_SET_CAP {
                let id = state.allocate_design_baseline_id().unwrap();
                let mut baseline = NetworkBaseline::current(&Project::new(42, "plant-a"));
                baseline.id = id;
                baseline.name = format!("b-{n}");
                baseline.track = BaselineTrack::Design;
                baseline.project_id = 42;
                state.baselines_mut(BaselineTrack::Design).insert(id, baseline);
            }
        }
        let err = fx
            .manager
            .create_design_baseline(42, info("one-more"), 7)
            .expect_err("cap");
        assert_eq!(
            err,
            NcmError::LicenseSizeExceeded {
                scope: "design baseline set".to_owned(),
                limit: BASELINE_SET_CAP,
            }
        );

        // The cap is track-wide: another project cannot claim a slot either.
        fx.store.put_project(Project::new(43, "plant-b"));
        let err = fx
            .manager
            .create_design_baseline(43, info("elsewhere"), 7)
            .expect_err("track full");
        assert!(matches!(err, NcmError::LicenseSizeExceeded { .. }));
    }

    #[test]
    fn update_renames_the_persisted_artifact() {
        let fx = fixture();
        let baseline = fx.manager.create_design_baseline(42, info("before"), 7).unwrap();
        fx.persistence.take_ops();

        let updated = fx
            .manager
            .update_design_baseline(42, baseline.id, info("after"))
            .unwrap();
        assert_eq!(updated.name, "after");

        let ops = fx.persistence.take_ops();
        assert_eq!(
            ops[0],
            PersistOp::RenameBaseline {
                track: BaselineTrack::Design,
                baseline_id: baseline.id,
                new_name: "after".to_owned(),
            }
        );
        assert!(matches!(ops[1], PersistOp::WriteBaseline { .. }));
    }

    #[test]
    fn update_without_rename_skips_the_artifact_rename() {
        let fx = fixture();
        let baseline = fx.manager.create_design_baseline(42, info("keep"), 7).unwrap();
        fx.persistence.take_ops();

        let mut update = info("keep");
        update.description = "now described".to_owned();
        fx.manager
            .update_design_baseline(42, baseline.id, update)
            .unwrap();
        let ops = fx.persistence.take_ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], PersistOp::WriteBaseline { .. }));
    }

    #[test]
    fn current_pseudo_baseline_is_never_deletable() {
        let fx = fixture();
        for result in [
            fx.manager.delete_design_baseline(42, CURRENT_BASELINE_ID),
            fx.manager.delete_operation_baseline(42, CURRENT_BASELINE_ID),
        ] {
            assert!(matches!(result, Err(NcmError::BadRequest(_))));
        }
    }

    #[test]
    fn current_pseudo_baseline_is_never_updatable() {
        let fx = fixture();
        let err = fx
            .manager
            .update_operation_baseline(42, CURRENT_BASELINE_ID, info("renamed"))
            .expect_err("reserved id");
        assert!(matches!(err, NcmError::BadRequest(_)));
    }

    #[test]
    fn delete_rejects_a_foreign_project_baseline() {
        let fx = fixture();
        fx.store.put_project(Project::new(43, "plant-b"));
        let baseline = fx.manager.create_design_baseline(42, info("owned"), 7).unwrap();
        let err = fx
            .manager
            .delete_design_baseline(43, baseline.id)
            .expect_err("foreign project");
        assert!(matches!(err, NcmError::NotFound(_)));
        assert!(fx.manager.design_baseline(42, baseline.id).is_ok());
    }

    #[test]
    fn delete_removes_record_artifact_and_project_reference() {
        let fx = fixture();
        let baseline = fx.manager.create_design_baseline(42, info("gone"), 7).unwrap();
        fx.persistence.take_ops();
        fx.notifier.take_events();

        fx.manager.delete_design_baseline(42, baseline.id).unwrap();
        assert!(fx.manager.design_baseline(42, baseline.id).is_err());
        assert!(fx.store.project(42).unwrap().design_baseline_ids.is_empty());

        let ops = fx.persistence.take_ops();
        assert!(ops.contains(&PersistOp::DeleteBaseline {
            track: BaselineTrack::Design,
            baseline_id: baseline.id,
        }));
        let events = fx.notifier.take_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_patch);
    }

    #[test]
    fn delete_project_all_baselines_clears_both_tracks() {
        let fx = fixture();
        let baseline = fx.manager.create_design_baseline(42, info("b"), 7).unwrap();
        fx.manager.activate_design_baseline(42, baseline.id, 7).unwrap();
        fx.store.put_project(Project::new(43, "plant-b"));
        let other = fx.manager.create_design_baseline(43, info("other"), 7).unwrap();

        fx.manager.delete_project_all_baselines(42).unwrap();
        assert!(fx.manager.design_baseline(42, baseline.id).is_err());
        assert!(fx.manager.operation_baseline(42, baseline.id).is_err());
        // Other projects keep their baselines.
        assert!(fx.manager.design_baseline(43, other.id).is_ok());
    }

    #[test]
    fn operation_list_is_prefixed_with_current_and_date_sorted() {
        let fx = fixture();
        let baseline = fx.manager.create_design_baseline(42, info("b"), 7).unwrap();
        fx.manager.activate_design_baseline(42, baseline.id, 7).unwrap();

        let list = fx.manager.operation_baseline_list(42).unwrap();
        assert_eq!(list[0].id, CURRENT_BASELINE_ID);
        assert_eq!(list[0].name, "CURRENT");
        assert_eq!(list.len(), 2);
        assert!(list[1].date >= list[0].date);
    }

    #[test]
    fn operation_lookup_synthesises_current_from_the_live_project() {
        let fx = fixture();
        let current = fx.manager.operation_baseline(42, CURRENT_BASELINE_ID).unwrap();
        assert_eq!(current.name, "CURRENT");
        assert_eq!(current.project.id, 42);
        assert_eq!(current.date, 0);
    }

    #[test]
    fn notifications_carry_full_records_for_creates() {
        let fx = fixture();
        fx.manager.create_design_baseline(42, info("b"), 7).unwrap();
        let events = fx.notifier.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ChangeAction::Create);
        assert!(!events[0].is_patch);
        assert_eq!(events[0].payload["name"], "b");
    }
}
