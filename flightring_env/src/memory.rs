//! In-memory implementation of `TrialStore`.

use crate::{EnvError, TrialArrays, TrialId, TrialStore};
use nalgebra::DMatrix;
use std::collections::BTreeMap;

/// Trial store kept entirely in memory.
///
/// Used by tests and by callers that build trials programmatically.
/// Freshly allocated trials hold empty `0×6` / `0×4` arrays until written.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrialStore {
    trials: BTreeMap<String, Vec<TrialArrays>>,
}

impl MemoryTrialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a trial for `participant` and returns its id.
    pub fn insert(&mut self, participant: &str, arrays: TrialArrays) -> TrialId {
        let trials = self.trials.entry(participant.to_string()).or_default();
        trials.push(arrays);
        TrialId::new(participant, trials.len() as u32)
    }

    fn slot(&self, id: &TrialId) -> Option<&TrialArrays> {
        let index = (id.trial as usize).checked_sub(1)?;
        self.trials.get(&id.participant)?.get(index)
    }

    fn not_found(id: &TrialId) -> EnvError {
        EnvError::TrialNotFound {
            participant: id.participant.clone(),
            trial: id.trial,
        }
    }
}

impl TrialStore for MemoryTrialStore {
    fn participants(&self) -> Result<Vec<String>, EnvError> {
        Ok(self.trials.keys().cloned().collect())
    }

    fn trial_count(&self, participant: &str) -> Result<u32, EnvError> {
        Ok(self
            .trials
            .get(participant)
            .map_or(0, |trials| trials.len() as u32))
    }

    fn load_trial(&self, id: &TrialId) -> Result<TrialArrays, EnvError> {
        self.slot(id).cloned().ok_or_else(|| Self::not_found(id))
    }

    fn allocate_trial(&mut self, participant: &str) -> Result<TrialId, EnvError> {
        Ok(self.insert(
            participant,
            TrialArrays::new(DMatrix::zeros(0, 6), DMatrix::zeros(0, 4)),
        ))
    }

    fn write_trial(&mut self, id: &TrialId, arrays: &TrialArrays) -> Result<(), EnvError> {
        let index = (id.trial as usize)
            .checked_sub(1)
            .ok_or_else(|| Self::not_found(id))?;
        let slot = self
            .trials
            .get_mut(&id.participant)
            .and_then(|trials| trials.get_mut(index))
            .ok_or_else(|| Self::not_found(id))?;
        *slot = arrays.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_write() {
        let mut store = MemoryTrialStore::new();
        let id = store.allocate_trial("alice").unwrap();
        assert_eq!(id, TrialId::new("alice", 1));
        assert_eq!(store.load_trial(&id).unwrap().steps(), 0);

        let arrays = TrialArrays::new(DMatrix::zeros(3, 6), DMatrix::zeros(3, 4));
        store.write_trial(&id, &arrays).unwrap();
        assert_eq!(store.load_trial(&id).unwrap().steps(), 3);
    }

    #[test]
    fn test_unknown_trial() {
        let store = MemoryTrialStore::new();
        assert!(store.load_trial(&TrialId::new("nobody", 1)).is_err());
        assert!(store.load_trial(&TrialId::new("nobody", 0)).is_err());
        assert_eq!(store.trial_count("nobody").unwrap(), 0);
    }
}
