//! The unified multi-trial table.

use crate::error::{FlightError, Result};
use crate::trajectory::{Action, State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named columns of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Name,
    Trial,
    TrialIndex,
    X1,
    Y1,
    Theta1,
    X2,
    Y2,
    Theta2,
    V1,
    W1,
    V2,
    W2,
    /// Radius of agent 1 (absolute mode)
    R1,
    /// Radius of agent 2 (absolute mode)
    R2,
    /// `X_1 - X_2`
    RelX,
    /// `Y_1 - Y_2`
    RelY,
    /// Norm of `(rel_X, rel_Y)`
    R,
}

/// State columns of the combined arrays, in on-disk order.
pub const STATE_COLUMNS: [Column; 6] = [
    Column::X1,
    Column::Y1,
    Column::Theta1,
    Column::X2,
    Column::Y2,
    Column::Theta2,
];

/// Action columns of the combined arrays, in on-disk order.
pub const ACTION_COLUMNS: [Column; 4] = [Column::V1, Column::W1, Column::V2, Column::W2];

impl Column {
    /// Columns present on every record.
    pub fn base() -> Vec<Column> {
        let mut cols = vec![Column::Name, Column::Trial, Column::TrialIndex];
        cols.extend(STATE_COLUMNS);
        cols.extend(ACTION_COLUMNS);
        cols
    }

    /// Returns the column header.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::Trial => "Trial",
            Column::TrialIndex => "Trial_index",
            Column::X1 => "X_1",
            Column::Y1 => "Y_1",
            Column::Theta1 => "Theta_1",
            Column::X2 => "X_2",
            Column::Y2 => "Y_2",
            Column::Theta2 => "Theta_2",
            Column::V1 => "V_1",
            Column::W1 => "W_1",
            Column::V2 => "V_2",
            Column::W2 => "W_2",
            Column::R1 => "R_1",
            Column::R2 => "R_2",
            Column::RelX => "rel_X",
            Column::RelY => "rel_Y",
            Column::R => "R",
        }
    }

    /// True for columns added by ring extraction.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            Column::R1 | Column::R2 | Column::RelX | Column::RelY | Column::R
        )
    }

    /// Numeric value of this column in `record`, if it has one.
    pub fn numeric(&self, record: &TrialRecord) -> Option<f64> {
        let [s1, s2] = &record.states;
        let [a1, a2] = &record.actions;
        let d = &record.derived;
        match self {
            Column::Name => None,
            Column::Trial => Some(record.trial as f64),
            Column::TrialIndex => Some(record.trial_index as f64),
            Column::X1 => Some(s1.x),
            Column::Y1 => Some(s1.y),
            Column::Theta1 => Some(s1.theta),
            Column::X2 => Some(s2.x),
            Column::Y2 => Some(s2.y),
            Column::Theta2 => Some(s2.theta),
            Column::V1 => Some(a1.v),
            Column::W1 => Some(a1.w),
            Column::V2 => Some(a2.v),
            Column::W2 => Some(a2.w),
            Column::R1 => d.r_1,
            Column::R2 => d.r_2,
            Column::RelX => d.rel_x,
            Column::RelY => d.rel_y,
            Column::R => d.r,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Name" => Ok(Column::Name),
            "Trial" => Ok(Column::Trial),
            "Trial_index" => Ok(Column::TrialIndex),
            "X_1" => Ok(Column::X1),
            "Y_1" => Ok(Column::Y1),
            "Theta_1" => Ok(Column::Theta1),
            "X_2" => Ok(Column::X2),
            "Y_2" => Ok(Column::Y2),
            "Theta_2" => Ok(Column::Theta2),
            "V_1" => Ok(Column::V1),
            "W_1" => Ok(Column::W1),
            "V_2" => Ok(Column::V2),
            "W_2" => Ok(Column::W2),
            "R_1" => Ok(Column::R1),
            "R_2" => Ok(Column::R2),
            "rel_X" => Ok(Column::RelX),
            "rel_Y" => Ok(Column::RelY),
            "R" => Ok(Column::R),
            _ => Err(format!("Unknown column: {}", s)),
        }
    }
}

/// Columns computed after aggregation. `None` until the corresponding pass
/// has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub r_1: Option<f64>,
    pub r_2: Option<f64>,
    pub rel_x: Option<f64>,
    pub rel_y: Option<f64>,
    pub r: Option<f64>,
}

/// One time step of one trial, both agents side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Participant name
    pub name: String,

    /// 1-based trial number
    pub trial: u32,

    /// 0-based step within the trial
    pub trial_index: usize,

    /// Agent 1 and agent 2 poses
    pub states: [State; 2],

    /// Agent 1 and agent 2 commands
    pub actions: [Action; 2],

    #[serde(default)]
    pub derived: Derived,
}

impl TrialRecord {
    /// Sort key `(Name, Trial, Trial_index)`.
    pub fn key(&self) -> (&str, u32, usize) {
        (&self.name, self.trial, self.trial_index)
    }
}

/// Row-ordered table of trial records.
///
/// Built fresh by `TrialAggregator`; ring extraction returns new datasets
/// rather than mutating one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<TrialRecord>,
    derived: Vec<Column>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<TrialRecord>) -> Self {
        Self {
            rows,
            derived: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[TrialRecord] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrialRecord> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = TrialRecord>) {
        self.rows.extend(rows);
    }

    /// All columns currently present, base columns first.
    pub fn columns(&self) -> Vec<Column> {
        let mut cols = Column::base();
        cols.extend(self.derived.iter().copied());
        cols
    }

    pub fn has_column(&self, column: Column) -> bool {
        !column.is_derived() || self.derived.contains(&column)
    }

    /// Fails with `InvalidInput` unless `column` is present.
    pub fn require_column(&self, column: Column) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(FlightError::input(format!("dataset has no column '{}'", column)))
        }
    }

    /// Returns a copy with `f` applied to every row's derived values and
    /// `added` recorded as present.
    pub fn with_derived(&self, added: &[Column], f: impl Fn(&TrialRecord) -> Derived) -> Dataset {
        let rows = self
            .rows
            .iter()
            .map(|row| TrialRecord {
                derived: f(row),
                ..row.clone()
            })
            .collect();

        let mut derived = self.derived.clone();
        for col in added {
            if !derived.contains(col) {
                derived.push(*col);
            }
        }

        Dataset { rows, derived }
    }

    /// Returns a copy holding only the rows matching `keep`.
    pub fn filter(&self, keep: impl Fn(&TrialRecord) -> bool) -> Dataset {
        Dataset {
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
            derived: self.derived.clone(),
        }
    }

    /// Sorts rows by `(Name, Trial, Trial_index)`.
    pub fn sort_canonical(&mut self) {
        self.rows.sort_by(|a, b| a.key().cmp(&b.key()));
    }

    /// Number of distinct trials per participant.
    pub fn trials_per_participant(&self) -> BTreeMap<String, usize> {
        let mut trials: BTreeMap<&str, std::collections::BTreeSet<u32>> = BTreeMap::new();
        for row in &self.rows {
            trials.entry(&row.name).or_default().insert(row.trial);
        }
        trials
            .into_iter()
            .map(|(name, set)| (name.to_string(), set.len()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a TrialRecord;
    type IntoIter = std::slice::Iter<'a, TrialRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
