//! Persistence collaborator. The controller offers a snapshot at every
//! transition and only commits the transition when the save succeeds.
//! Errors, including access denial, are always surfaced to the caller.

use crate::determinism::run_id::is_run_id;
use crate::error::{CoreError, CoreResult};
use crate::workflow::run::RunSnapshot;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait RunStore {
    fn save(&self, snapshot: &RunSnapshot) -> CoreResult<()>;
    /// `Ok(None)` when no run with that id exists.
    fn load(&self, run_id: &str) -> CoreResult<Option<RunSnapshot>>;
}

impl<T: RunStore + ?Sized> RunStore for &T {
    fn save(&self, snapshot: &RunSnapshot) -> CoreResult<()> {
        (**self).save(snapshot)
    }

    fn load(&self, run_id: &str) -> CoreResult<Option<RunSnapshot>> {
        (**self).load(run_id)
    }
}

impl<T: RunStore + ?Sized> RunStore for Arc<T> {
    fn save(&self, snapshot: &RunSnapshot) -> CoreResult<()> {
        (**self).save(snapshot)
    }

    fn load(&self, run_id: &str) -> CoreResult<Option<RunSnapshot>> {
        (**self).load(run_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<BTreeMap<String, RunSnapshot>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RunStore for MemoryRunStore {
    fn save(&self, snapshot: &RunSnapshot) -> CoreResult<()> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| CoreError::Persistence("run store lock poisoned".to_string()))?;
        runs.insert(snapshot.run_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load(&self, run_id: &str) -> CoreResult<Option<RunSnapshot>> {
        let runs = self
            .runs
            .lock()
            .map_err(|_| CoreError::Persistence("run store lock poisoned".to_string()))?;
        Ok(runs.get(run_id).cloned())
    }
}

/// One pretty-printed JSON file per run under `root/runs/`.
#[derive(Debug, Clone)]
pub struct FileRunStore {
    root: PathBuf,
}

impl FileRunStore {
    pub fn open(root: impl AsRef<Path>) -> CoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("runs")).map_err(map_io)?;
        Ok(Self { root })
    }

    fn path_for(&self, run_id: &str) -> CoreResult<PathBuf> {
        if !is_run_id(run_id) {
            return Err(CoreError::InvalidInput(format!("invalid run id '{}'", run_id)));
        }
        Ok(self.root.join("runs").join(format!("{}.json", run_id)))
    }
}

impl RunStore for FileRunStore {
    fn save(&self, snapshot: &RunSnapshot) -> CoreResult<()> {
        let path = self.path_for(&snapshot.run_id)?;
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        // Write-then-rename so a crash never leaves a half-written run.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(map_io)?;
        fs::rename(&tmp, &path).map_err(map_io)?;
        Ok(())
    }

    fn load(&self, run_id: &str) -> CoreResult<Option<RunSnapshot>> {
        let path = self.path_for(run_id)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io(e)),
        };
        let snapshot: RunSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::InvalidInput(format!("stored run {} is unreadable: {}", run_id, e))
        })?;
        Ok(Some(snapshot))
    }
}

fn map_io(e: io::Error) -> CoreError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => CoreError::AccessDenied(e.to_string()),
        _ => CoreError::Persistence(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::run::WorkflowRun;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryRunStore::new();
        let snap = WorkflowRun::new().snapshot();
        store.save(&snap).unwrap();
        assert_eq!(store.load(&snap.run_id).unwrap(), Some(snap));
        assert_eq!(store.load("wr_01ARZ3NDEKTSV4RRFFQ69G5FAV").unwrap(), None);
    }

    #[test]
    fn file_store_saves_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRunStore::open(dir.path()).unwrap();
        let mut snap = WorkflowRun::new().snapshot();
        store.save(&snap).unwrap();
        snap.updated_at = "2026-10-18T10:00:00Z".to_string();
        store.save(&snap).unwrap();
        assert_eq!(store.load(&snap.run_id).unwrap(), Some(snap.clone()));
        assert!(!dir
            .path()
            .join("runs")
            .join(format!("{}.json.tmp", snap.run_id))
            .exists());
    }

    #[test]
    fn file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRunStore::open(dir.path()).unwrap();
        assert!(store.load("../../etc/passwd").is_err());
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRunStore::open(dir.path()).unwrap();
        let id = "wr_01ARZ3NDEKTSV4RRFFQ69G5FAV";
        fs::write(dir.path().join("runs").join(format!("{}.json", id)), b"{ nope").unwrap();
        assert!(matches!(store.load(id), Err(CoreError::InvalidInput(_))));
    }
}
