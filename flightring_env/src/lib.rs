//! FlightRing Storage Layer
//!
//! Everything that touches disk lives here, so the remapping and ring
//! extraction engines in `flightring_core` stay pure:
//! - Simulator logs (`airplane1.json`, `config.json`, ...)
//! - NumPy `.npy` arrays
//! - Trial directories with a persisted per-participant counter
//!
//! # Example
//!
//! ```ignore
//! use flightring_env::{FsTrialStore, TrialStore};
//!
//! let mut store = FsTrialStore::new("final_results/trials");
//! let id = store.allocate_trial("alice")?;
//! store.write_trial(&id, &arrays)?;
//! ```

mod error;
mod fs_impl;
mod memory;
mod store;
mod types;
pub mod log;
pub mod npy;

pub use error::EnvError;
pub use fs_impl::{FsTrialStore, ACTIONS_FILE, INDEX_FILE, STAGING_DIR, STATES_FILE};
pub use log::{AgentLog, StepRecord};
pub use memory::MemoryTrialStore;
pub use store::TrialStore;
pub use types::{TrialArrays, TrialId, TrialIndex};
