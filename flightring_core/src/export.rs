//! Exporters: raw arrays for learning, JSON for the external plotter.

use crate::config::RingRadii;
use crate::dataset::{Column, Dataset, ACTION_COLUMNS, STATE_COLUMNS};
use crate::error::{FlightError, Result};
use crate::ring::RingMode;
use flightring_env::{npy, EnvError};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Projects `columns` of every row into an `N×columns.len()` matrix.
pub fn project(dataset: &Dataset, columns: &[Column]) -> Result<DMatrix<f64>> {
    for col in columns {
        dataset.require_column(*col)?;
        if *col == Column::Name {
            return Err(FlightError::input("column 'Name' is not numeric"));
        }
    }

    let rows = dataset.rows();
    let mut out = DMatrix::zeros(rows.len(), columns.len());
    for (r, row) in rows.iter().enumerate() {
        for (c, col) in columns.iter().enumerate() {
            out[(r, c)] = col.numeric(row).ok_or_else(|| {
                FlightError::input(format!(
                    "{} trial {} step {} has no value for '{}'",
                    row.name, row.trial, row.trial_index, col
                ))
            })?;
        }
    }

    Ok(out)
}

/// Projects the given state and action columns, in order.
pub fn to_arrays(
    dataset: &Dataset,
    state_columns: &[Column],
    action_columns: &[Column],
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    Ok((project(dataset, state_columns)?, project(dataset, action_columns)?))
}

/// Writes `<dir>/<prefix>-states.npy` (`X_1..Theta_2`) and
/// `<dir>/<prefix>-actions.npy` (`V_1..W_2`), creating `dir` if needed.
pub fn save_collated(dataset: &Dataset, dir: &Path, prefix: &str) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).map_err(|e| EnvError::io(dir, e))?;

    let (states, actions) = to_arrays(dataset, &STATE_COLUMNS, &ACTION_COLUMNS)?;
    let states_path = dir.join(format!("{}-states.npy", prefix));
    let actions_path = dir.join(format!("{}-actions.npy", prefix));

    npy::write(&states_path, &states)?;
    npy::write(&actions_path, &actions)?;
    info!("Saved {} collated rows to {}", dataset.len(), dir.display());

    Ok((states_path, actions_path))
}

const ABSOLUTE_PAIRS: &[(Column, Column)] = &[(Column::X1, Column::Y1), (Column::X2, Column::Y2)];
const RELATIVE_PAIRS: &[(Column, Column)] = &[(Column::RelX, Column::RelY)];

/// One scatter point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,

    /// Trial number, used as the hue
    pub trial: u32,
}

/// Points drawn from one pair of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub x_column: String,
    pub y_column: String,
    pub points: Vec<PlotPoint>,
}

/// One subplot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPanel {
    pub title: String,
    pub series: Vec<PlotSeries>,

    /// Draw the inner/outer circles on this panel
    pub show_rings: bool,
}

/// Side-by-side "all" and "ring" scatter plots for an external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingPlot {
    pub title: String,
    pub mode: RingMode,
    pub radii: RingRadii,
    pub x_label: String,
    pub y_label: String,
    pub panels: Vec<PlotPanel>,
}

impl RingPlot {
    /// Builds the plot for the full dataset and its ring.
    ///
    /// Absolute mode plots both agents' positions; relative mode plots
    /// `(rel_X, rel_Y)`, which must be present on both datasets.
    pub fn build(all: &Dataset, ring: &Dataset, radii: RingRadii, mode: RingMode) -> Result<Self> {
        let (pairs, x_label, y_label) = match mode {
            RingMode::Absolute => (ABSOLUTE_PAIRS, "x position", "y position"),
            RingMode::Relative => (RELATIVE_PAIRS, "relative x position", "relative y position"),
        };

        let panel = |dataset: &Dataset, title: &str, show_rings: bool| -> Result<PlotPanel> {
            let series = pairs
                .iter()
                .map(|&(xc, yc)| plot_series(dataset, xc, yc))
                .collect::<Result<Vec<_>>>()?;
            Ok(PlotPanel {
                title: title.to_string(),
                series,
                show_rings,
            })
        };

        Ok(Self {
            title: "Expert trajectories".to_string(),
            mode,
            radii,
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            panels: vec![
                panel(all, "All trajectories", false)?,
                panel(ring, "Ring trajectories", true)?,
            ],
        })
    }

    /// `expert-traj.json` or `rel-expert-traj.json`.
    pub fn file_name(&self) -> &'static str {
        match self.mode {
            RingMode::Absolute => "expert-traj.json",
            RingMode::Relative => "rel-expert-traj.json",
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| EnvError::json(path, e))?;
        fs::write(path, json).map_err(|e| EnvError::io(path, e))?;
        Ok(())
    }

    /// Writes into `dir` under `file_name()` and returns the path.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| EnvError::io(dir, e))?;
        let path = dir.join(self.file_name());
        self.write_to_file(&path)?;
        Ok(path)
    }
}

fn plot_series(dataset: &Dataset, x_column: Column, y_column: Column) -> Result<PlotSeries> {
    let xy = project(dataset, &[x_column, y_column])?;
    let points = dataset
        .iter()
        .zip(xy.row_iter())
        .map(|(row, xy)| PlotPoint {
            x: xy[0],
            y: xy[1],
            trial: row.trial,
        })
        .collect();

    Ok(PlotSeries {
        x_column: x_column.name().to_string(),
        y_column: y_column.name().to_string(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Derived, TrialRecord};
    use crate::ring::{add_relative_distances, extract_ring};
    use crate::trajectory::{Action, State};

    fn dataset() -> Dataset {
        let rows = (0..3)
            .map(|i| {
                let f = i as f64;
                TrialRecord {
                    name: "alice".to_string(),
                    trial: 1 + i as u32 / 2,
                    trial_index: i % 2,
                    states: [State::new(f, 10.0 + f, 0.1), State::new(-f, 20.0, 0.2)],
                    actions: [Action::new(0.5, f), Action::new(0.6, -f)],
                    derived: Derived::default(),
                }
            })
            .collect();
        Dataset::from_rows(rows)
    }

    #[test]
    fn test_projection_order() {
        let ds = dataset();
        let (states, actions) = to_arrays(&ds, &[Column::Y1, Column::X1], &[Column::W2]).unwrap();

        assert_eq!(states.shape(), (3, 2));
        assert_eq!(states[(2, 0)], 12.0);
        assert_eq!(states[(2, 1)], 2.0);
        assert_eq!(actions.shape(), (3, 1));
        assert_eq!(actions[(1, 0)], -1.0);
    }

    #[test]
    fn test_projection_of_missing_column() {
        let err = project(&dataset(), &[Column::R1]).unwrap_err();
        assert!(matches!(err, FlightError::InvalidInput(_)));
    }

    #[test]
    fn test_name_is_not_numeric() {
        assert!(project(&dataset(), &[Column::Name]).is_err());
    }

    #[test]
    fn test_projection_of_empty_dataset() {
        let (states, actions) =
            to_arrays(&Dataset::new(), &STATE_COLUMNS, &ACTION_COLUMNS).unwrap();
        assert_eq!(states.shape(), (0, 6));
        assert_eq!(actions.shape(), (0, 4));
    }

    #[test]
    fn test_save_collated() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("collated");

        let (states_path, actions_path) = save_collated(&dataset(), &out, "all").unwrap();

        assert_eq!(states_path, out.join("all-states.npy"));
        let states = npy::read(&states_path).unwrap();
        let actions = npy::read(&actions_path).unwrap();
        assert_eq!(states.shape(), (3, 6));
        assert_eq!(actions.shape(), (3, 4));
        assert_eq!(states[(1, 3)], -1.0);
    }

    #[test]
    fn test_absolute_plot_has_two_series() {
        let ds = dataset();
        let radii = RingRadii::new(0.0, 15.0);
        let ring = extract_ring(&ds, radii, RingMode::Absolute).unwrap();

        let plot = RingPlot::build(&ds, &ring, radii, RingMode::Absolute).unwrap();

        assert_eq!(plot.file_name(), "expert-traj.json");
        assert_eq!(plot.panels.len(), 2);
        assert_eq!(plot.panels[0].series.len(), 2);
        assert_eq!(plot.panels[0].series[0].points.len(), 3);
        assert!(!plot.panels[0].show_rings);
        assert!(plot.panels[1].show_rings);
    }

    #[test]
    fn test_relative_plot_requires_offsets() {
        let ds = dataset();
        let radii = RingRadii::new(0.0, 100.0);
        assert!(RingPlot::build(&ds, &ds, radii, RingMode::Relative).is_err());

        let rel = add_relative_distances(&ds);
        let ring = extract_ring(&rel, radii, RingMode::Relative).unwrap();
        let plot = RingPlot::build(&rel, &ring, radii, RingMode::Relative).unwrap();

        assert_eq!(plot.file_name(), "rel-expert-traj.json");
        assert_eq!(plot.panels[1].series[0].x_column, "rel_X");
        assert_eq!(plot.y_label, "relative y position");
    }

    #[test]
    fn test_plot_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset();
        let radii = RingRadii::new(0.0, 100.0);
        let plot = RingPlot::build(&ds, &ds, radii, RingMode::Absolute).unwrap();

        let path = plot.write_to_dir(dir.path()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let parsed: RingPlot = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, plot);
    }
}
