//! Domain and pipeline configuration.
//!
//! The source (simulator) and destination (learner) sides are different
//! types: the simulator reports its world as a corner-anchored
//! `x`/`y` span, the learner wants explicit low/high bounds per axis.

use crate::error::{FlightError, Result};
use flightring_env::log::read_json;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A closed numeric range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Checks both endpoints are finite and `min <= max`.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(FlightError::config(format!(
                "{}: endpoints must be finite, got [{}, {}]",
                name, self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(FlightError::config(format!(
                "{}: min {} exceeds max {}",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Like `validate`, but also rejects `min == max`. Required for any
    /// interval used as the source side of a mapping.
    pub fn validate_non_degenerate(&self, name: &str) -> Result<()> {
        self.validate(name)?;
        if self.min == self.max {
            return Err(FlightError::config(format!(
                "{}: interval [{}, {}] is degenerate",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Clamps `value` into the interval.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn endpoints(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

/// Simulator world extent: the frame spans `[0, x] × [0, y]` with `y`
/// growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWorld {
    pub x: f64,
    pub y: f64,
}

/// Learner world bounds per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DestinationWorld {
    pub x_low: f64,
    pub x_high: f64,
    pub y_low: f64,
    pub y_high: f64,
}

impl DestinationWorld {
    pub fn x_range(&self) -> Interval {
        Interval::new(self.x_low, self.x_high)
    }

    pub fn y_range(&self) -> Interval {
        Interval::new(self.y_low, self.y_high)
    }
}

/// Parameters reported by the simulator (its `config.json`).
///
/// The simulator also writes `step`/`init` for the speed ranges; those are
/// ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDomain {
    pub speed: Interval,
    pub ang_speed: Interval,
    pub world_size: SourceWorld,

    /// Radius of the target circle drawn at the world center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_radius: Option<f64>,

    /// Half-width of the launch squares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_radius: Option<f64>,

    /// Frame rate in Hz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<f64>,
}

impl SourceDomain {
    /// Reads the simulator's `config.json`.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(read_json(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.speed.validate_non_degenerate("source.speed")?;
        self.ang_speed.validate_non_degenerate("source.ang_speed")?;

        let world = self.world_size;
        if !(world.x.is_finite() && world.x > 0.0) || !(world.y.is_finite() && world.y > 0.0) {
            return Err(FlightError::config(format!(
                "source.world_size: extents must be positive, got x={} y={}",
                world.x, world.y
            )));
        }
        Ok(())
    }
}

/// Parameters expected by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationDomain {
    pub speed: Interval,
    pub ang_speed: Interval,
    pub world_size: DestinationWorld,
}

impl Default for DestinationDomain {
    fn default() -> Self {
        Self {
            speed: Interval::new(0.1, 1.0),
            ang_speed: Interval::new(-1.0, 1.0),
            world_size: DestinationWorld {
                x_low: -2.0,
                x_high: 2.0,
                y_low: -1.0,
                y_high: 1.0,
            },
        }
    }
}

impl DestinationDomain {
    pub fn validate(&self) -> Result<()> {
        self.speed.validate("destination.speed")?;
        self.ang_speed.validate("destination.ang_speed")?;
        self.world_size.x_range().validate("destination.world_size.x")?;
        self.world_size.y_range().validate("destination.world_size.y")?;
        Ok(())
    }
}

/// Source and destination parameters for one remapping pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub source: SourceDomain,
    pub destination: DestinationDomain,
}

impl DomainConfig {
    /// Builds and validates a domain config.
    pub fn new(source: SourceDomain, destination: DestinationDomain) -> Result<Self> {
        let config = Self {
            source,
            destination,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.destination.validate()
    }
}

/// Inner and outer radius of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingRadii {
    pub inner: f64,
    pub outer: f64,
}

impl Default for RingRadii {
    fn default() -> Self {
        Self {
            inner: 120.0,
            outer: 200.0,
        }
    }
}

impl RingRadii {
    pub const fn new(inner: f64, outer: f64) -> Self {
        Self { inner, outer }
    }

    /// `outer` may be infinite; `inner` may not.
    pub fn validate(&self) -> Result<()> {
        if !self.inner.is_finite() || self.inner < 0.0 {
            return Err(FlightError::config(format!(
                "ring inner radius must be finite and >= 0, got {}",
                self.inner
            )));
        }
        if self.outer.is_nan() || self.inner > self.outer {
            return Err(FlightError::config(format!(
                "ring radii must satisfy inner <= outer, got inner={} outer={}",
                self.inner, self.outer
            )));
        }
        Ok(())
    }

    pub fn contains(&self, radius: f64) -> bool {
        radius >= self.inner && radius <= self.outer
    }
}

/// Everything a pipeline run needs, passed explicitly to each entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where the simulator drops its logs
    pub session_root: PathBuf,

    /// Root of `<name>/<name>-<k>/` trial directories
    pub trials_root: PathBuf,

    /// Where collated arrays and plot exports go
    pub collated_root: PathBuf,

    pub radii: RingRadii,

    pub destination: DestinationDomain,

    /// Agent log names, in column order of the combined arrays
    pub agents: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session_root: PathBuf::from("./simulator/data"),
            trials_root: PathBuf::from("./final_results/trials"),
            collated_root: PathBuf::from("./final_results/collated"),
            radii: RingRadii::default(),
            destination: DestinationDomain::default(),
            agents: vec!["airplane1".to_string(), "airplane2".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file; fields it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.radii.validate()?;
        self.destination.validate()?;
        if self.agents.len() != 2 {
            return Err(FlightError::config(format!(
                "exactly two agents are required, got {}",
                self.agents.len()
            )));
        }
        for agent in &self.agents {
            if !is_plain_name(agent) {
                return Err(FlightError::config(format!(
                    "agent name '{}' cannot be used as a file name",
                    agent
                )));
            }
        }
        if self.agents[0] == self.agents[1] {
            return Err(FlightError::config(format!(
                "agent names must differ, got '{}' twice",
                self.agents[0]
            )));
        }
        Ok(())
    }
}

/// True if `name` can be used as a single file or directory name.
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}
