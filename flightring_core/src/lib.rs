//! FlightRing Core - remapping and ring extraction for two-agent flight logs
//!
//! This library covers the two halves of the data pipeline:
//! 1. **Remapping**: simulator units (pixels, y-down, raw speeds) are mapped
//!    into learner units (centered world, y-up, normalized actions) with
//!    `RangeMapper`-backed transforms on a typestate `Trajectory`.
//! 2. **Ring extraction**: every stored trial is aggregated into one
//!    `Dataset`, derived radii are added, and rows inside an annulus are kept.
//!
//! # Pipeline
//!
//! ```text
//! session logs ──ingest──► trials/<name>/<name>-<k>/all_*.npy
//!                                   │
//!                          TrialAggregator::load_all
//!                                   ▼
//!                               Dataset ──RingExtractor──► ring Dataset
//!                                   │                          │
//!                                   └──────► export ◄──────────┘
//!                              (collated .npy + plot JSON)
//! ```

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod ingest;
pub mod range_map;
pub mod ring;
pub mod trajectory;

// Re-export key types for convenience
pub use aggregate::{load_all, TrialAggregator};
pub use config::{
    DestinationDomain, DestinationWorld, DomainConfig, Interval, PipelineConfig, RingRadii,
    SourceDomain, SourceWorld,
};
pub use dataset::{Column, Dataset, Derived, TrialRecord};
pub use error::{FlightError, Result};
pub use export::{save_collated, to_arrays, RingPlot};
pub use ingest::{ingest_session, IngestReport};
pub use range_map::RangeMapper;
pub use ring::{add_relative_distances, extract_ring, RingExtractor, RingMode};
pub use trajectory::{combine_agents, wrap_angle, Action, Mapped, Raw, State, Trajectory, TrajectoryArrays};
