//! Filesystem implementation of `TrialStore`.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   .staging/<name>/       trial being assembled, not yet indexed
//!   <name>/
//!     trials.json          TrialIndex
//!     <name>-1/
//!       all_states.npy     N×6
//!       all_actions.npy    N×4
//!       ...                per-agent arrays, raw logs
//!     <name>-2/
//! ```

use crate::{npy, EnvError, TrialArrays, TrialId, TrialIndex, TrialStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Combined state array of a trial.
pub const STATES_FILE: &str = "all_states.npy";

/// Combined action array of a trial.
pub const ACTIONS_FILE: &str = "all_actions.npy";

/// Per-participant trial counter.
pub const INDEX_FILE: &str = "trials.json";

/// Hidden directory under the root where trials are assembled before commit.
pub const STAGING_DIR: &str = ".staging";

/// Trial store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsTrialStore {
    root: PathBuf,
}

impl FsTrialStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk until the
    /// first operation.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all trials of `participant`.
    pub fn participant_dir(&self, participant: &str) -> PathBuf {
        self.root.join(participant)
    }

    /// Directory of one trial.
    pub fn trial_dir(&self, id: &TrialId) -> PathBuf {
        self.participant_dir(&id.participant).join(id.dir_name())
    }

    /// Scratch directory where the next trial of `participant` is assembled
    /// before `commit_trial` moves it into place.
    pub fn staging_dir(&self, participant: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(participant)
    }

    fn index_path(&self, participant: &str) -> PathBuf {
        self.participant_dir(participant).join(INDEX_FILE)
    }

    fn read_index(&self, participant: &str) -> Result<Option<TrialIndex>, EnvError> {
        let path = self.index_path(participant);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EnvError::io(&path, e)),
        };

        let index: TrialIndex =
            serde_json::from_str(&text).map_err(|e| EnvError::json(&path, e))?;
        if index.participant != participant {
            return Err(EnvError::InvalidLayout {
                participant: participant.to_string(),
                reason: format!("{} belongs to '{}'", path.display(), index.participant),
            });
        }

        Ok(Some(index))
    }

    /// Writes the index through a temporary file so a crash never leaves a
    /// half-written counter behind.
    fn write_index(&self, index: &TrialIndex) -> Result<(), EnvError> {
        let path = self.index_path(&index.participant);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(index).map_err(|e| EnvError::json(&path, e))?;

        fs::write(&tmp, json).map_err(|e| EnvError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| EnvError::io(&path, e))?;
        Ok(())
    }

    /// Numbers of the `<name>-<k>` directories currently on disk, sorted.
    fn scan_trial_dirs(&self, participant: &str) -> Result<Vec<u32>, EnvError> {
        let dir = self.participant_dir(participant);
        let prefix = format!("{}-", participant);
        let mut numbers = Vec::new();

        for entry in fs::read_dir(&dir).map_err(|e| EnvError::io(&dir, e))? {
            let entry = entry.map_err(|e| EnvError::io(&dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match name.strip_prefix(&prefix).map(str::parse::<u32>) {
                Some(Ok(k)) => numbers.push(k),
                _ => debug!("Skipping {} in {}", name, dir.display()),
            }
        }

        numbers.sort_unstable();
        Ok(numbers)
    }

    /// True if trial directories exist that no index accounts for.
    fn has_unindexed_trials(&self, participant: &str) -> Result<bool, EnvError> {
        if !self.participant_dir(participant).is_dir() {
            return Ok(false);
        }
        Ok(!self.scan_trial_dirs(participant)?.is_empty())
    }

    /// Current index of `participant`, or a fresh one if nothing is stored.
    fn next_index(&self, participant: &str) -> Result<TrialIndex, EnvError> {
        match self.read_index(participant)? {
            Some(index) => Ok(index),
            None if self.has_unindexed_trials(participant)? => Err(EnvError::MissingIndex {
                participant: participant.to_string(),
            }),
            None => Ok(TrialIndex::new(participant)),
        }
    }

    /// Moves a fully written `staged` directory into the next trial slot of
    /// `participant`, then records the slot in the index.
    ///
    /// A failed commit consumes no trial number: if the index cannot be
    /// written, the directory is moved back to `staged`.
    pub fn commit_trial(&mut self, participant: &str, staged: &Path) -> Result<TrialId, EnvError> {
        let participant_dir = self.participant_dir(participant);
        fs::create_dir_all(&participant_dir).map_err(|e| EnvError::io(&participant_dir, e))?;

        let mut index = self.next_index(participant)?;
        let id = TrialId::new(participant, index.trials + 1);
        let dir = self.trial_dir(&id);
        if dir.exists() {
            return Err(EnvError::InvalidLayout {
                participant: participant.to_string(),
                reason: format!("{} already exists but is not indexed", dir.display()),
            });
        }
        fs::rename(staged, &dir).map_err(|e| EnvError::io(&dir, e))?;

        index.trials = id.trial;
        if let Err(e) = self.write_index(&index) {
            if let Err(undo) = fs::rename(&dir, staged) {
                warn!(
                    "Could not move {} back to {}: {}",
                    dir.display(),
                    staged.display(),
                    undo
                );
            }
            return Err(e);
        }
        info!("Committed {} at {}", id, dir.display());

        Ok(id)
    }

    /// Rebuilds `trials.json` for `participant` from the trial directories on
    /// disk. The directories must be numbered contiguously from 1.
    pub fn reindex(&mut self, participant: &str) -> Result<u32, EnvError> {
        let numbers = self.scan_trial_dirs(participant)?;

        for (expected, found) in (1u32..).zip(&numbers) {
            if expected != *found {
                return Err(EnvError::InvalidLayout {
                    participant: participant.to_string(),
                    reason: format!("trial {} is missing (found {})", expected, found),
                });
            }
        }

        let index = TrialIndex {
            participant: participant.to_string(),
            trials: numbers.len() as u32,
        };
        self.write_index(&index)?;
        info!("Reindexed {}: {} trials", participant, index.trials);

        Ok(index.trials)
    }
}

impl TrialStore for FsTrialStore {
    fn participants(&self) -> Result<Vec<String>, EnvError> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.root).map_err(|e| EnvError::io(&self.root, e))? {
            let entry = entry.map_err(|e| EnvError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if name.starts_with('.') => debug!("Skipping hidden directory {}", name),
                Ok(name) => names.push(name),
                Err(raw) => warn!("Skipping non UTF-8 participant directory {:?}", raw),
            }
        }

        names.sort();
        Ok(names)
    }

    fn trial_count(&self, participant: &str) -> Result<u32, EnvError> {
        Ok(self.next_index(participant)?.trials)
    }

    fn load_trial(&self, id: &TrialId) -> Result<TrialArrays, EnvError> {
        let count = self.trial_count(&id.participant)?;
        if id.trial == 0 || id.trial > count {
            return Err(EnvError::TrialNotFound {
                participant: id.participant.clone(),
                trial: id.trial,
            });
        }

        let dir = self.trial_dir(id);
        let states = npy::read(&dir.join(STATES_FILE))?;
        let actions = npy::read(&dir.join(ACTIONS_FILE))?;

        Ok(TrialArrays::new(states, actions))
    }

    fn allocate_trial(&mut self, participant: &str) -> Result<TrialId, EnvError> {
        let participant_dir = self.participant_dir(participant);
        fs::create_dir_all(&participant_dir).map_err(|e| EnvError::io(&participant_dir, e))?;

        let mut index = self.next_index(participant)?;

        let id = TrialId::new(participant, index.trials + 1);
        let dir = self.trial_dir(&id);
        fs::create_dir(&dir).map_err(|e| EnvError::io(&dir, e))?;

        index.trials = id.trial;
        self.write_index(&index)?;
        info!("Allocated {} at {}", id, dir.display());

        Ok(id)
    }

    fn write_trial(&mut self, id: &TrialId, arrays: &TrialArrays) -> Result<(), EnvError> {
        let dir = self.trial_dir(id);
        npy::write(&dir.join(STATES_FILE), &arrays.states)?;
        npy::write(&dir.join(ACTIONS_FILE), &arrays.actions)?;
        debug!("Wrote {} steps for {}", arrays.steps(), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn arrays(steps: usize) -> TrialArrays {
        TrialArrays::new(
            DMatrix::from_fn(steps, 6, |r, c| (r * 10 + c) as f64),
            DMatrix::from_fn(steps, 4, |r, c| (r + c) as f64 * 0.1),
        )
    }

    #[test]
    fn test_allocate_creates_contiguous_trials() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());

        let first = store.allocate_trial("alice").unwrap();
        let second = store.allocate_trial("alice").unwrap();

        assert_eq!(first, TrialId::new("alice", 1));
        assert_eq!(second, TrialId::new("alice", 2));
        assert!(dir.path().join("alice/alice-1").is_dir());
        assert!(dir.path().join("alice/alice-2").is_dir());
        assert_eq!(store.trial_count("alice").unwrap(), 2);
    }

    #[test]
    fn test_write_then_load_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());

        let id = store.allocate_trial("bob").unwrap();
        store.write_trial(&id, &arrays(5)).unwrap();

        let loaded = store.load_trial(&id).unwrap();
        assert_eq!(loaded, arrays(5));
    }

    #[test]
    fn test_participants_are_sorted_and_skip_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        store.allocate_trial("zoe").unwrap();
        store.allocate_trial("adam").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(store.participants().unwrap(), vec!["adam", "zoe"]);
    }

    #[test]
    fn test_missing_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("carol/carol-1")).unwrap();
        let store = FsTrialStore::new(dir.path());

        let err = store.trial_count("carol").unwrap_err();
        assert!(matches!(err, EnvError::MissingIndex { .. }));
    }

    #[test]
    fn test_unknown_participant_has_no_trials() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("hank")).unwrap();
        let store = FsTrialStore::new(dir.path());

        assert_eq!(store.trial_count("hank").unwrap(), 0);
        assert_eq!(store.trial_count("nobody").unwrap(), 0);
    }

    #[test]
    fn test_commit_moves_staged_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        let staged = store.staging_dir("ivy");
        fs::create_dir_all(&staged).unwrap();
        npy::write(&staged.join(STATES_FILE), &arrays(2).states).unwrap();
        npy::write(&staged.join(ACTIONS_FILE), &arrays(2).actions).unwrap();

        let id = store.commit_trial("ivy", &staged).unwrap();

        assert_eq!(id, TrialId::new("ivy", 1));
        assert!(!staged.exists());
        assert_eq!(store.load_trial(&id).unwrap(), arrays(2));
        assert_eq!(store.participants().unwrap(), vec!["ivy"]);
    }

    #[test]
    fn test_commit_onto_occupied_slot_consumes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        fs::create_dir_all(dir.path().join("jack")).unwrap();
        fs::write(dir.path().join("jack/jack-1"), "not a trial").unwrap();
        let staged = store.staging_dir("jack");
        fs::create_dir_all(&staged).unwrap();

        let err = store.commit_trial("jack", &staged).unwrap_err();

        assert!(matches!(err, EnvError::InvalidLayout { .. }));
        assert!(staged.is_dir());
        assert_eq!(store.trial_count("jack").unwrap(), 0);
    }

    #[test]
    fn test_allocate_refuses_unindexed_trials() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("carol/carol-1")).unwrap();
        let mut store = FsTrialStore::new(dir.path());

        assert!(store.allocate_trial("carol").is_err());
        assert!(!dir.path().join("carol/carol-2").exists());
    }

    #[test]
    fn test_reindex_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        for k in 1..=3 {
            fs::create_dir_all(dir.path().join(format!("dave/dave-{}", k))).unwrap();
        }
        fs::create_dir_all(dir.path().join("dave/scratch")).unwrap();
        let mut store = FsTrialStore::new(dir.path());

        assert_eq!(store.reindex("dave").unwrap(), 3);
        assert_eq!(store.trial_count("dave").unwrap(), 3);
        assert_eq!(store.allocate_trial("dave").unwrap().trial, 4);
    }

    #[test]
    fn test_reindex_rejects_gaps() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("erin/erin-1")).unwrap();
        fs::create_dir_all(dir.path().join("erin/erin-3")).unwrap();
        let mut store = FsTrialStore::new(dir.path());

        let err = store.reindex("erin").unwrap_err();
        assert!(err.to_string().contains("trial 2 is missing"));
    }

    #[test]
    fn test_load_unknown_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        store.allocate_trial("frank").unwrap();

        let err = store.load_trial(&TrialId::new("frank", 2)).unwrap_err();
        assert!(matches!(err, EnvError::TrialNotFound { trial: 2, .. }));
    }

    #[test]
    fn test_load_missing_array_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        let id = store.allocate_trial("gina").unwrap();

        let err = store.load_trial(&id).unwrap_err();
        assert!(err.to_string().contains(STATES_FILE));
    }
}
