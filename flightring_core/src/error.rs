//! Error types for remapping, aggregation and ring extraction.

use flightring_env::EnvError;
use thiserror::Error;

/// Errors raised by the FlightRing pipeline.
///
/// Every variant is fatal to the batch operation that produced it.
#[derive(Debug, Error)]
pub enum FlightError {
    /// Degenerate interval, bad radii, missing or invalid config field
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Length mismatch, malformed record, missing column
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage failure while loading one trial
    #[error("Failed to load {participant} trial {trial}: {source}")]
    Trial {
        participant: String,
        trial: u32,
        #[source]
        source: Box<FlightError>,
    },

    /// Storage failure
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl FlightError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Tags an error with the trial it happened in.
    pub fn in_trial(self, participant: &str, trial: u32) -> Self {
        Self::Trial {
            participant: participant.to_string(),
            trial,
            source: Box::new(self),
        }
    }
}

pub type Result<T, E = FlightError> = std::result::Result<T, E>;
