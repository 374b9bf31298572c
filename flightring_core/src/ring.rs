//! Annulus ("ring") filtering of the unified dataset.

use crate::config::RingRadii;
use crate::dataset::{Column, Dataset, Derived};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which radius a row is filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingMode {
    /// Each agent's distance from the origin; both must be in the ring
    Absolute,

    /// Distance between the two agents
    Relative,
}

impl RingMode {
    pub fn name(&self) -> &'static str {
        match self {
            RingMode::Absolute => "absolute",
            RingMode::Relative => "relative",
        }
    }
}

impl std::fmt::Display for RingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Returns a copy of `dataset` with `rel_X = X_1 - X_2` and
/// `rel_Y = Y_1 - Y_2` added.
pub fn add_relative_distances(dataset: &Dataset) -> Dataset {
    dataset.with_derived(&[Column::RelX, Column::RelY], |row| {
        let [a, b] = &row.states;
        Derived {
            rel_x: Some(a.x - b.x),
            rel_y: Some(a.y - b.y),
            ..row.derived
        }
    })
}

/// Keeps the rows whose radius lies in `[inner, outer]`.
#[derive(Debug, Clone, Copy)]
pub struct RingExtractor {
    radii: RingRadii,
    mode: RingMode,
}

impl RingExtractor {
    /// Fails with `InvalidConfig` unless `0 <= inner <= outer`.
    pub fn new(radii: RingRadii, mode: RingMode) -> Result<Self> {
        radii.validate()?;
        Ok(Self { radii, mode })
    }

    pub fn radii(&self) -> RingRadii {
        self.radii
    }

    pub fn mode(&self) -> RingMode {
        self.mode
    }

    /// Adds the radius columns for this mode and filters.
    ///
    /// The input is not modified. In relative mode the dataset must already
    /// carry `rel_X`/`rel_Y` (see `add_relative_distances`). An empty result
    /// is not an error.
    pub fn extract(&self, dataset: &Dataset) -> Result<Dataset> {
        let radii = self.radii;

        let ring = match self.mode {
            RingMode::Absolute => dataset
                .with_derived(&[Column::R1, Column::R2], |row| {
                    let [a, b] = &row.states;
                    Derived {
                        r_1: Some(a.radius()),
                        r_2: Some(b.radius()),
                        ..row.derived
                    }
                })
                .filter(|row| {
                    matches!(
                        (row.derived.r_1, row.derived.r_2),
                        (Some(r1), Some(r2)) if radii.contains(r1) && radii.contains(r2)
                    )
                }),
            RingMode::Relative => {
                dataset.require_column(Column::RelX)?;
                dataset.require_column(Column::RelY)?;
                dataset
                    .with_derived(&[Column::R], |row| Derived {
                        r: row.derived.rel_x.zip(row.derived.rel_y).map(|(x, y)| x.hypot(y)),
                        ..row.derived
                    })
                    .filter(|row| row.derived.r.is_some_and(|r| radii.contains(r)))
            }
        };

        info!(
            "{} ring [{}, {}]: kept {} of {} rows",
            self.mode,
            radii.inner,
            radii.outer,
            ring.len(),
            dataset.len()
        );

        Ok(ring)
    }
}

/// Validates `radii` and extracts in one call.
pub fn extract_ring(dataset: &Dataset, radii: RingRadii, mode: RingMode) -> Result<Dataset> {
    RingExtractor::new(radii, mode)?.extract(dataset)
}

impl From<bool> for RingMode {
    fn from(relative: bool) -> Self {
        if relative {
            RingMode::Relative
        } else {
            RingMode::Absolute
        }
    }
}
