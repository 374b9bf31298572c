//! Simulator log files.
//!
//! The simulator writes one JSON array per agent:
//!
//! ```json
//! [{"time": 0, "data": {"state": [x, y, theta], "action": [v, w]}}, ...]
//! ```

use crate::EnvError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One recorded simulation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Frame counter written by the simulator
    #[serde(default)]
    pub time: Option<u64>,

    pub data: StepData,
}

/// Payload of a step record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    /// `[x, y, theta]` in simulator units
    pub state: Vec<f64>,

    /// `[v, w]` in simulator units
    pub action: Vec<f64>,
}

/// States and actions of one agent, in step order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentLog {
    pub states: Vec<[f64; 3]>,
    pub actions: Vec<[f64; 2]>,
}

impl AgentLog {
    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Builds a log from parsed records, checking every state has three
    /// components and every action two.
    pub fn from_records(records: &[StepRecord], path: &Path) -> Result<Self, EnvError> {
        let mut log = AgentLog {
            states: Vec::with_capacity(records.len()),
            actions: Vec::with_capacity(records.len()),
        };

        for (step, record) in records.iter().enumerate() {
            let state: [f64; 3] = record.data.state.as_slice().try_into().map_err(|_| {
                EnvError::malformed_log(
                    path,
                    format!(
                        "step {}: state has {} components, expected 3",
                        step,
                        record.data.state.len()
                    ),
                )
            })?;
            let action: [f64; 2] = record.data.action.as_slice().try_into().map_err(|_| {
                EnvError::malformed_log(
                    path,
                    format!(
                        "step {}: action has {} components, expected 2",
                        step,
                        record.data.action.len()
                    ),
                )
            })?;
            log.states.push(state);
            log.actions.push(action);
        }

        Ok(log)
    }
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, EnvError> {
    let text = fs::read_to_string(path).map_err(|e| EnvError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| EnvError::json(path, e))
}

/// Loads one agent's log file.
pub fn load_agent_log(path: &Path) -> Result<AgentLog, EnvError> {
    let records: Vec<StepRecord> = read_json(path)?;
    AgentLog::from_records(&records, path)
}
