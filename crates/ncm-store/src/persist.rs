//! ---
//! ncm_section: "03-persistence-logging"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Baseline and project persistence bindings."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ncm_common::{NcmError, NcmResult};
use ncm_model::{BaselineTrack, NetworkBaseline, Project};
use parking_lot::Mutex;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Durable side-channel the baseline manager writes through. Callers hold the
/// store lock across these calls, so implementations must not re-enter the
/// store.
pub trait BaselinePersistence: Send + Sync {
    /// Write (create or overwrite) the artifact for one baseline.
    fn write_baseline(&self, track: BaselineTrack, baseline: &NetworkBaseline) -> NcmResult<()>;

    /// Remove the artifact of a deleted baseline.
    fn delete_baseline_file(&self, track: BaselineTrack, baseline_id: i64, name: &str)
        -> NcmResult<()>;

    /// Rename the artifact when a baseline is renamed. The id is stable, so
    /// only the name component of the artifact path changes.
    fn rename_baseline_file(
        &self,
        track: BaselineTrack,
        baseline_id: i64,
        old_name: &str,
        new_name: &str,
    ) -> NcmResult<()>;

    /// Write (create or overwrite) the artifact for one project.
    fn write_project(&self, project: &Project) -> NcmResult<()>;
}

/// Filesystem binding: one pretty-printed JSON file per baseline under
/// `<root>/<track>/`, one per project under `<root>/projects/`.
#[derive(Debug)]
pub struct FileBaselineStore {
    root: PathBuf,
}

impl FileBaselineStore {
    /// Binding rooted at `root`. Directories are created lazily on first
    /// write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn baseline_path(&self, track: BaselineTrack, baseline_id: i64, name: &str) -> PathBuf {
        self.root
            .join(track.as_str())
            .join(format!("{baseline_id}_{name}.json"))
    }

    fn project_path(&self, project_id: i64) -> PathBuf {
        self.root.join("projects").join(format!("{project_id}.json"))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> NcmResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| NcmError::Internal(format!("create {}: {err}", parent.display())))?;
        }
        let file = File::create(path)
            .map_err(|err| NcmError::Internal(format!("create {}: {err}", path.display())))?;
        let mut writer = BufWriter::new(file);
        let json = serde_json::to_vec_pretty(value)
            .map_err(|err| NcmError::Internal(format!("serialise {}: {err}", path.display())))?;
        writer
            .write_all(&json)
            .and_then(|()| writer.flush())
            .map_err(|err| NcmError::Internal(format!("write {}: {err}", path.display())))?;
        Ok(())
    }

    /// Scan one track directory and deserialise every baseline artifact.
    /// Unreadable files are logged and skipped so a single corrupt artifact
    /// cannot block start-up.
    pub fn load_baselines(&self, track: BaselineTrack) -> NcmResult<Vec<NetworkBaseline>> {
        let dir = self.root.join(track.as_str());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut loaded = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry
                .map_err(|err| NcmError::Internal(format!("scan {}: {err}", dir.display())))?;
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(entry.path()).map_err(|err| {
                NcmError::Internal(format!("read {}: {err}", entry.path().display()))
            })?;
            match serde_json::from_slice::<NetworkBaseline>(&bytes) {
                Ok(baseline) => loaded.push(baseline),
                Err(err) => {
                    warn!(path = %entry.path().display(), %err, "skipping unreadable baseline artifact");
                }
            }
        }
        Ok(loaded)
    }
}

impl BaselinePersistence for FileBaselineStore {
    fn write_baseline(&self, track: BaselineTrack, baseline: &NetworkBaseline) -> NcmResult<()> {
        let path = self.baseline_path(track, baseline.id, &baseline.name);
        self.write_json(&path, baseline)?;
        debug!(%track, baseline_id = baseline.id, path = %path.display(), "baseline written");
        Ok(())
    }

    fn delete_baseline_file(
        &self,
        track: BaselineTrack,
        baseline_id: i64,
        name: &str,
    ) -> NcmResult<()> {
        let path = self.baseline_path(track, baseline_id, name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            // A missing artifact is not an error during delete.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "baseline artifact already absent");
                Ok(())
            }
            Err(err) => Err(NcmError::Internal(format!(
                "remove {}: {err}",
                path.display()
            ))),
        }
    }

    fn rename_baseline_file(
        &self,
        track: BaselineTrack,
        baseline_id: i64,
        old_name: &str,
        new_name: &str,
    ) -> NcmResult<()> {
        let from = self.baseline_path(track, baseline_id, old_name);
        let to = self.baseline_path(track, baseline_id, new_name);
        fs::rename(&from, &to).map_err(|err| {
            NcmError::Internal(format!(
                "rename {} -> {}: {err}",
                from.display(),
                to.display()
            ))
        })
    }

    fn write_project(&self, project: &Project) -> NcmResult<()> {
        self.write_json(&self.project_path(project.id), project)
    }
}

/// One recorded persistence call, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOp {
    /// `write_baseline` was called.
    WriteBaseline {
        /// Track written to.
        track: BaselineTrack,
        /// Id of the written baseline.
        baseline_id: i64,
        /// Name of the written baseline.
        name: String,
    },
    /// `delete_baseline_file` was called.
    DeleteBaseline {
        /// Track deleted from.
        track: BaselineTrack,
        /// Id of the deleted baseline.
        baseline_id: i64,
    },
    /// `rename_baseline_file` was called.
    RenameBaseline {
        /// Track renamed within.
        track: BaselineTrack,
        /// Id of the renamed baseline.
        baseline_id: i64,
        /// New artifact name.
        new_name: String,
    },
    /// `write_project` was called.
    WriteProject {
        /// Id of the written project.
        project_id: i64,
    },
}

/// In-memory recording double. Records every call in order and can be armed
/// to fail the next write, which lets tests drive the non-transactional
/// activation and rollback paths.
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    ops: Mutex<Vec<PersistOp>>,
    fail_next_write: Mutex<bool>,
    fail_next_track_write: Mutex<Option<BaselineTrack>>,
    fail_next_project_write: Mutex<bool>,
}

impl MemoryBaselineStore {
    /// Fresh, empty double.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the double: the next `write_baseline` or `write_project` fails.
    pub fn fail_next_write(&self) {
        *self.fail_next_write.lock() = true;
    }

    /// Arm the double: the next `write_baseline` against `track` fails.
    /// Writes to the other track pass through untouched.
    pub fn fail_next_write_for(&self, track: BaselineTrack) {
        *self.fail_next_track_write.lock() = Some(track);
    }

    /// Arm the double: the next `write_project` fails. Baseline writes pass
    /// through, which exposes the project write that follows a committed
    /// baseline mutation.
    pub fn fail_next_project_write(&self) {
        *self.fail_next_project_write.lock() = true;
    }

    /// Drain and return the recorded calls.
    pub fn take_ops(&self) -> Vec<PersistOp> {
        std::mem::take(&mut self.ops.lock())
    }

    fn check_armed_failure(&self) -> NcmResult<()> {
        let mut armed = self.fail_next_write.lock();
        if *armed {
            *armed = false;
            return Err(NcmError::Internal("injected write failure".to_owned()));
        }
        Ok(())
    }

    fn check_armed_track_failure(&self, track: BaselineTrack) -> NcmResult<()> {
        let mut armed = self.fail_next_track_write.lock();
        if *armed == Some(track) {
            *armed = None;
            return Err(NcmError::Internal(format!(
                "injected {track} write failure"
            )));
        }
        Ok(())
    }
}

impl BaselinePersistence for MemoryBaselineStore {
    fn write_baseline(&self, track: BaselineTrack, baseline: &NetworkBaseline) -> NcmResult<()> {
        self.check_armed_failure()?;
        self.check_armed_track_failure(track)?;
        self.ops.lock().push(PersistOp::WriteBaseline {
            track,
            baseline_id: baseline.id,
            name: baseline.name.clone(),
        });
        Ok(())
    }

    fn delete_baseline_file(
        &self,
        track: BaselineTrack,
        baseline_id: i64,
        _name: &str,
    ) -> NcmResult<()> {
        self.ops
            .lock()
            .push(PersistOp::DeleteBaseline { track, baseline_id });
        Ok(())
    }

    fn rename_baseline_file(
        &self,
        track: BaselineTrack,
        baseline_id: i64,
        _old_name: &str,
        new_name: &str,
    ) -> NcmResult<()> {
        self.ops.lock().push(PersistOp::RenameBaseline {
            track,
            baseline_id,
            new_name: new_name.to_owned(),
        });
        Ok(())
    }

    fn write_project(&self, project: &Project) -> NcmResult<()> {
        self.check_armed_failure()?;
        {
            let mut armed = self.fail_next_project_write.lock();
            if *armed {
                *armed = false;
                return Err(NcmError::Internal("injected project write failure".to_owned()));
            }
        }
        self.ops.lock().push(PersistOp::WriteProject {
            project_id: project.id,
        });
        Ok(())
    }
}
