//! Common types for the FlightRing storage layer.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Identifies one stored trial: participant name plus 1-based trial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialId {
    pub participant: String,
    pub trial: u32,
}

impl TrialId {
    pub fn new(participant: impl Into<String>, trial: u32) -> Self {
        Self {
            participant: participant.into(),
            trial,
        }
    }

    /// Directory name of this trial, `<name>-<k>`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.participant, self.trial)
    }
}

impl std::fmt::Display for TrialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} trial {}", self.participant, self.trial)
    }
}

/// Combined two-agent arrays of one trial.
///
/// `states` is `N×6` (`x, y, theta` per agent) and `actions` is `N×4`
/// (`v, w` per agent).
#[derive(Debug, Clone, PartialEq)]
pub struct TrialArrays {
    pub states: DMatrix<f64>,
    pub actions: DMatrix<f64>,
}

impl TrialArrays {
    pub fn new(states: DMatrix<f64>, actions: DMatrix<f64>) -> Self {
        Self { states, actions }
    }

    /// Number of time steps (state rows).
    pub fn steps(&self) -> usize {
        self.states.nrows()
    }
}

/// Persisted per-participant trial counter (`<root>/<name>/trials.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialIndex {
    pub participant: String,

    /// Number of trials allocated so far; trials are numbered `1..=trials`
    pub trials: u32,
}

impl TrialIndex {
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            trials: 0,
        }
    }
}
