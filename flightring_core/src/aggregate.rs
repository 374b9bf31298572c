//! Builds the unified dataset from every stored trial.

use crate::dataset::{Dataset, Derived, TrialRecord, ACTION_COLUMNS, STATE_COLUMNS};
use crate::error::{FlightError, Result};
use crate::trajectory::{Action, State};
use flightring_env::{FsTrialStore, TrialArrays, TrialId, TrialStore};
use std::path::Path;
use tracing::{debug, info};

/// Loads all trials of all participants from a `TrialStore`.
///
/// Participants are visited in sorted order and trials in `1..=K` order, with
/// `K` taken from the store's index rather than a directory listing. Callers
/// should still sort by `(Name, Trial, Trial_index)` before comparing rows.
pub struct TrialAggregator<'a, S: TrialStore> {
    store: &'a S,
}

impl<'a, S: TrialStore> TrialAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Loads every trial into one dataset.
    ///
    /// The first missing or malformed trial aborts the load; no partial
    /// dataset is returned.
    pub fn load_all(&self) -> Result<Dataset> {
        let mut dataset = Dataset::new();

        for name in self.store.participants()? {
            let count = self.store.trial_count(&name)?;

            for trial in 1..=count {
                let id = TrialId::new(name.as_str(), trial);
                let rows = self
                    .store
                    .load_trial(&id)
                    .map_err(FlightError::from)
                    .and_then(|arrays| records_from_trial(&id, &arrays))
                    .map_err(|e| e.in_trial(&name, trial))?;

                debug!("{}: {} steps", id, rows.len());
                dataset.extend(rows);
            }

            info!("Loading data from {} -> found {} trajectories.", name, count);
        }

        info!("Aggregated {} rows", dataset.len());
        Ok(dataset)
    }
}

/// Loads every trial under a trial root directory.
pub fn load_all(root: &Path) -> Result<Dataset> {
    let store = FsTrialStore::new(root);
    TrialAggregator::new(&store).load_all()
}

/// Turns one trial's combined arrays into rows, one per time step.
pub fn records_from_trial(id: &TrialId, arrays: &TrialArrays) -> Result<Vec<TrialRecord>> {
    let states = &arrays.states;
    let actions = &arrays.actions;

    // An empty trial may have been saved without a second dimension
    if states.nrows() == 0 && actions.nrows() == 0 {
        return Ok(Vec::new());
    }
    if states.ncols() != STATE_COLUMNS.len() {
        return Err(FlightError::input(format!(
            "state array has {} columns, expected {}",
            states.ncols(),
            STATE_COLUMNS.len()
        )));
    }
    if actions.ncols() != ACTION_COLUMNS.len() {
        return Err(FlightError::input(format!(
            "action array has {} columns, expected {}",
            actions.ncols(),
            ACTION_COLUMNS.len()
        )));
    }
    if states.nrows() != actions.nrows() {
        return Err(FlightError::input(format!(
            "{} state rows but {} action rows",
            states.nrows(),
            actions.nrows()
        )));
    }

    let rows = (0..states.nrows())
        .map(|step| {
            let s = states.row(step);
            let a = actions.row(step);
            TrialRecord {
                name: id.participant.clone(),
                trial: id.trial,
                trial_index: step,
                states: [State::new(s[0], s[1], s[2]), State::new(s[3], s[4], s[5])],
                actions: [Action::new(a[0], a[1]), Action::new(a[2], a[3])],
                derived: Derived::default(),
            }
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightring_env::MemoryTrialStore;
    use nalgebra::DMatrix;

    fn arrays(steps: usize, offset: f64) -> TrialArrays {
        TrialArrays::new(
            DMatrix::from_fn(steps, 6, |r, c| offset + (r * 6 + c) as f64),
            DMatrix::from_fn(steps, 4, |r, c| offset + (r * 4 + c) as f64 / 100.0),
        )
    }

    #[test]
    fn test_rows_are_tagged_and_contiguous() {
        let mut store = MemoryTrialStore::new();
        store.insert("alice", arrays(3, 0.0));
        store.insert("alice", arrays(2, 100.0));
        store.insert("bob", arrays(1, 500.0));

        let mut ds = TrialAggregator::new(&store).load_all().unwrap();
        ds.sort_canonical();

        assert_eq!(ds.len(), 6);
        let keys: Vec<_> = ds.iter().map(|r| (r.name.as_str(), r.trial, r.trial_index)).collect();
        assert_eq!(
            keys,
            vec![
                ("alice", 1, 0),
                ("alice", 1, 1),
                ("alice", 1, 2),
                ("alice", 2, 0),
                ("alice", 2, 1),
                ("bob", 1, 0),
            ]
        );
    }

    #[test]
    fn test_columns_follow_array_layout() {
        let mut store = MemoryTrialStore::new();
        store.insert("alice", arrays(2, 0.0));

        let ds = TrialAggregator::new(&store).load_all().unwrap();
        let row = &ds.rows()[1];

        assert_eq!(row.states[0], State::new(6.0, 7.0, 8.0));
        assert_eq!(row.states[1], State::new(9.0, 10.0, 11.0));
        assert_eq!(row.actions[1], Action::new(0.06, 0.07));
    }

    #[test]
    fn test_malformed_trial_aborts_load() {
        let mut store = MemoryTrialStore::new();
        store.insert("alice", arrays(2, 0.0));
        store.insert(
            "bob",
            TrialArrays::new(DMatrix::zeros(2, 5), DMatrix::zeros(2, 4)),
        );

        let err = TrialAggregator::new(&store).load_all().unwrap_err();
        match err {
            FlightError::Trial {
                participant, trial, ..
            } => {
                assert_eq!(participant, "bob");
                assert_eq!(trial, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_row_count_mismatch() {
        let id = TrialId::new("alice", 1);
        let bad = TrialArrays::new(DMatrix::zeros(3, 6), DMatrix::zeros(2, 4));
        assert!(records_from_trial(&id, &bad).is_err());
    }

    #[test]
    fn test_empty_trial_contributes_no_rows() {
        let id = TrialId::new("alice", 1);
        let empty = TrialArrays::new(DMatrix::zeros(0, 0), DMatrix::zeros(0, 0));
        assert!(records_from_trial(&id, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        for steps in [4, 2] {
            let id = store.allocate_trial("carol").unwrap();
            store.write_trial(&id, &arrays(steps, 0.0)).unwrap();
        }

        let ds = load_all(dir.path()).unwrap();
        assert_eq!(ds.len(), 6);
        assert_eq!(ds.trials_per_participant()["carol"], 2);
    }

    #[test]
    fn test_missing_array_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsTrialStore::new(dir.path());
        let first = store.allocate_trial("dana").unwrap();
        store.write_trial(&first, &arrays(1, 0.0)).unwrap();
        store.allocate_trial("dana").unwrap();

        let err = load_all(dir.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("dana trial 2"), "{msg}");
    }
}
