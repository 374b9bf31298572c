//! Pipeline runner - executes the ingest, extract and reindex commands.

use flightring_core::export::save_collated;
use flightring_core::ring::{add_relative_distances, extract_ring, RingMode};
use flightring_core::{ingest_session, load_all, Dataset, IngestReport, PipelineConfig, Result, RingPlot};
use flightring_env::FsTrialStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Results of one ring pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassSummary {
    pub mode: RingMode,

    /// Rows in the ring
    pub ring_rows: usize,

    /// Plot export written for this pass
    pub plot: PathBuf,
}

/// Results from running `extract`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractSummary {
    /// Trials found per participant
    pub participants: BTreeMap<String, usize>,

    /// Rows in the full dataset
    pub total_rows: usize,

    pub inner: f64,
    pub outer: f64,

    /// Absolute pass first, then relative unless skipped
    pub passes: Vec<PassSummary>,

    /// Collated `.npy` files written
    pub arrays: Vec<PathBuf>,
}

impl ExtractSummary {
    /// Rows kept by the given pass, if it ran.
    pub fn ring_rows(&self, mode: RingMode) -> Option<usize> {
        self.passes
            .iter()
            .find(|p| p.mode == mode)
            .map(|p| p.ring_rows)
    }
}

/// Runs pipeline commands against one configuration.
pub struct PipelineRunner {
    config: PipelineConfig,
}

impl PipelineRunner {
    /// Validates `config` and wraps it.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stores the current session as the participant's next trial.
    pub fn ingest(&self, participant: &str) -> Result<IngestReport> {
        ingest_session(&self.config, participant)
    }

    /// Rebuilds a participant's trial index from the directories on disk.
    pub fn reindex(&self, participant: &str) -> Result<u32> {
        let mut store = FsTrialStore::new(&self.config.trials_root);
        Ok(store.reindex(participant)?)
    }

    /// Aggregates every trial and runs the absolute ring pass, then the
    /// relative pass unless `absolute_only` is set.
    pub fn extract(&self, absolute_only: bool) -> Result<ExtractSummary> {
        let radii = self.config.radii;
        let out = self.config.collated_root.as_path();

        let all = load_all(&self.config.trials_root)?;
        if all.is_empty() {
            warn!(
                "No rows found under {}; writing empty outputs",
                self.config.trials_root.display()
            );
        }

        let ring = extract_ring(&all, radii, RingMode::Absolute)?;
        let mut passes = vec![self.write_plot(&all, &ring, RingMode::Absolute)?];

        let mut arrays = Vec::with_capacity(4);
        for (dataset, prefix) in [(&all, "all"), (&ring, "ring")] {
            let (states, actions) = save_collated(dataset, out, prefix)?;
            arrays.push(states);
            arrays.push(actions);
        }

        if !absolute_only {
            let relative = add_relative_distances(&all);
            let relative_ring = extract_ring(&relative, radii, RingMode::Relative)?;
            passes.push(self.write_plot(&relative, &relative_ring, RingMode::Relative)?);
        }

        let summary = ExtractSummary {
            participants: all.trials_per_participant(),
            total_rows: all.len(),
            inner: radii.inner,
            outer: radii.outer,
            passes,
            arrays,
        };

        info!(
            "Extracted {} of {} rows into {}",
            ring.len(),
            summary.total_rows,
            out.display()
        );

        Ok(summary)
    }

    fn write_plot(&self, all: &Dataset, ring: &Dataset, mode: RingMode) -> Result<PassSummary> {
        let plot = RingPlot::build(all, ring, self.config.radii, mode)?
            .write_to_dir(&self.config.collated_root)?;
        Ok(PassSummary {
            mode,
            ring_rows: ring.len(),
            plot,
        })
    }
}
