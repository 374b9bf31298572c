//! Trial storage trait.

use crate::{EnvError, TrialArrays, TrialId};

/// The interface between the pipeline and wherever trials live.
///
/// # Implementations
///
/// - **Filesystem**: `FsTrialStore` - `<root>/<name>/<name>-<k>/` directories
/// - **Memory**: `MemoryTrialStore` - maps kept in process, for tests
///
/// # Ordering
///
/// `participants()` returns names in ascending order and trials are numbered
/// `1..=trial_count(name)`, so iteration order never depends on how the
/// backing store happens to list its entries.
pub trait TrialStore {
    /// Returns every participant name, sorted.
    fn participants(&self) -> Result<Vec<String>, EnvError>;

    /// Returns how many trials `participant` has stored; `0` for a
    /// participant with nothing stored yet.
    fn trial_count(&self, participant: &str) -> Result<u32, EnvError>;

    /// Loads the combined arrays of one trial.
    fn load_trial(&self, id: &TrialId) -> Result<TrialArrays, EnvError>;

    /// Reserves the next trial slot for `participant`.
    ///
    /// Not idempotent: every call creates a new slot.
    fn allocate_trial(&mut self, participant: &str) -> Result<TrialId, EnvError>;

    /// Stores the combined arrays of an allocated trial.
    fn write_trial(&mut self, id: &TrialId, arrays: &TrialArrays) -> Result<(), EnvError>;
}
