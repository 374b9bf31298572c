//! FlightRing command runner
//!
//! Wires `PipelineConfig` into the three batch commands exposed by the
//! `flightring` binary:
//! - **ingest**: store the simulator's current session as a new trial
//! - **extract**: aggregate every trial, run the ring passes, export
//! - **reindex**: rebuild a participant's trial index from disk
//!
//! # Usage
//!
//! ```ignore
//! use flightring_cli::PipelineRunner;
//! use flightring_core::PipelineConfig;
//!
//! let runner = PipelineRunner::new(PipelineConfig::default())?;
//! runner.ingest("alice")?;
//! let summary = runner.extract(false)?;
//! ```

mod runner;

pub use runner::{ExtractSummary, PassSummary, PipelineRunner};
