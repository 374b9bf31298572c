//! Per-agent trajectories and their remapping into learner units.
//!
//! A `Trajectory` carries its remapping progress in its type:
//!
//! ```text
//! Trajectory<Raw, Raw> --remap_actions--> Trajectory<Mapped, Raw>
//!          |                                       |
//!     remap_states                            remap_states
//!          v                                       v
//! Trajectory<Raw, Mapped> --remap_actions--> Trajectory<Mapped, Mapped>
//! ```
//!
//! Each remap consumes the trajectory and is only defined on the `Raw` side,
//! so mapping the same data twice does not compile.

use crate::config::DomainConfig;
use crate::error::{FlightError, Result};
use crate::range_map::RangeMapper;
use flightring_env::{npy, AgentLog, TrialArrays};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Agent pose `(x, y, theta)`, theta in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl State {
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn radius(&self) -> f64 {
        self.x.hypot(self.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

/// Velocity command `(v, w)`: linear and angular speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub v: f64,
    pub w: f64,
}

impl Action {
    pub const fn new(v: f64, w: f64) -> Self {
        Self { v, w }
    }

    fn is_finite(&self) -> bool {
        self.v.is_finite() && self.w.is_finite()
    }
}

/// Marker: values are still in simulator units.
#[derive(Debug, Clone, Copy)]
pub struct Raw;

/// Marker: values have been mapped into learner units.
#[derive(Debug, Clone, Copy)]
pub struct Mapped;

/// Reduces an angle to `[0, 2π)`.
pub fn wrap_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly TAU
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// One agent's states and actions for one trial.
///
/// `A` tracks the actions and `S` the states; each is `Raw` or `Mapped`.
#[derive(Debug, Clone)]
pub struct Trajectory<A = Raw, S = Raw> {
    name: String,
    states: Vec<State>,
    actions: Vec<Action>,
    _stage: PhantomData<(A, S)>,
}

impl Trajectory<Raw, Raw> {
    /// Creates a trajectory from raw simulator values.
    ///
    /// Fails with `InvalidInput` if the sequences differ in length.
    pub fn new(name: impl Into<String>, states: Vec<State>, actions: Vec<Action>) -> Result<Self> {
        let name = name.into();
        if states.len() != actions.len() {
            return Err(FlightError::input(format!(
                "{}: {} states but {} actions",
                name,
                states.len(),
                actions.len()
            )));
        }

        Ok(Self {
            name,
            states,
            actions,
            _stage: PhantomData,
        })
    }

    /// Creates a trajectory from a loaded simulator log.
    pub fn from_log(name: impl Into<String>, log: &AgentLog) -> Result<Self> {
        let states = log
            .states
            .iter()
            .map(|&[x, y, theta]| State::new(x, y, theta))
            .collect();
        let actions = log.actions.iter().map(|&[v, w]| Action::new(v, w)).collect();
        Self::new(name, states, actions)
    }

    /// Remaps both actions and states.
    pub fn remap(self, config: &DomainConfig) -> Result<Trajectory<Mapped, Mapped>> {
        self.remap_actions(config)?.remap_states(config)
    }
}

impl<S> Trajectory<Raw, S> {
    /// Clamps every action to the source speed ranges, then maps it onto the
    /// destination ranges.
    pub fn remap_actions(self, config: &DomainConfig) -> Result<Trajectory<Mapped, S>> {
        let source = &config.source;
        let dest = &config.destination;
        let speed_map = RangeMapper::from_intervals(&source.speed, &dest.speed, false)?;
        let ang_speed_map = RangeMapper::from_intervals(&source.ang_speed, &dest.ang_speed, false)?;

        let mut actions = self.actions;
        for (step, action) in actions.iter_mut().enumerate() {
            if !action.is_finite() {
                return Err(FlightError::input(format!(
                    "{}: non-finite action at step {}",
                    self.name, step
                )));
            }
            let v = speed_map.map(source.speed.clamp(action.v));
            let w = ang_speed_map.map(source.ang_speed.clamp(action.w));
            *action = Action::new(dest.speed.clamp(v), dest.ang_speed.clamp(w));
        }

        Ok(Trajectory {
            name: self.name,
            states: self.states,
            actions,
            _stage: PhantomData,
        })
    }
}

impl<A> Trajectory<A, Raw> {
    /// Recenters positions on the origin and wraps headings into `[0, 2π)`.
    ///
    /// The simulator's frame spans `[0, W] × [0, H]` with `y` growing
    /// downwards. `x` maps `[0, W] -> [-W/2, W/2]`; `y` maps `[H, 0] ->
    /// [-H/2, H/2]`, flipping it to grow upwards.
    pub fn remap_states(self, config: &DomainConfig) -> Result<Trajectory<A, Mapped>> {
        let world = config.source.world_size;
        let x_map = RangeMapper::new((0.0, world.x), (-world.x / 2.0, world.x / 2.0), false)?;
        let y_map = RangeMapper::new((world.y, 0.0), (-world.y / 2.0, world.y / 2.0), false)?;

        let mut states = self.states;
        for (step, state) in states.iter_mut().enumerate() {
            if !state.is_finite() {
                return Err(FlightError::input(format!(
                    "{}: non-finite state at step {}",
                    self.name, step
                )));
            }
            *state = State::new(x_map.map(state.x), y_map.map(state.y), wrap_angle(state.theta));
        }

        Ok(Trajectory {
            name: self.name,
            states,
            actions: self.actions,
            _stage: PhantomData,
        })
    }
}

impl<A, S> Trajectory<A, S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Converts to fixed-shape arrays (`N×3` states, `N×2` actions).
    pub fn into_arrays(self) -> TrajectoryArrays {
        let states = DMatrix::from_fn(self.states.len(), 3, |r, c| {
            let s = &self.states[r];
            [s.x, s.y, s.theta][c]
        });
        let actions = DMatrix::from_fn(self.actions.len(), 2, |r, c| {
            let a = &self.actions[r];
            [a.v, a.w][c]
        });

        TrajectoryArrays {
            name: self.name,
            states,
            actions,
        }
    }
}

/// Read-only array form of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryArrays {
    name: String,
    states: DMatrix<f64>,
    actions: DMatrix<f64>,
}

impl TrajectoryArrays {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `N×3`: `x, y, theta`
    pub fn states(&self) -> &DMatrix<f64> {
        &self.states
    }

    /// `N×2`: `v, w`
    pub fn actions(&self) -> &DMatrix<f64> {
        &self.actions
    }

    pub fn steps(&self) -> usize {
        self.states.nrows()
    }

    pub fn states_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-states.npy", self.name))
    }

    pub fn actions_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-actions.npy", self.name))
    }

    /// Writes `<dir>/<name>-states.npy` and `<dir>/<name>-actions.npy`.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        npy::write(&self.states_path(dir), &self.states)?;
        npy::write(&self.actions_path(dir), &self.actions)?;
        Ok(())
    }
}

/// Concatenates agents column-wise into one trial record: agent `i` owns
/// state columns `3i..3i+3` and action columns `2i..2i+2`.
pub fn combine_agents(agents: &[TrajectoryArrays]) -> Result<TrialArrays> {
    let first = agents
        .first()
        .ok_or_else(|| FlightError::input("cannot combine zero trajectories"))?;
    let steps = first.steps();

    if let Some(other) = agents.iter().find(|a| a.steps() != steps) {
        return Err(FlightError::input(format!(
            "{} has {} steps but {} has {}",
            first.name,
            steps,
            other.name,
            other.steps()
        )));
    }

    let states = DMatrix::from_fn(steps, 3 * agents.len(), |r, c| agents[c / 3].states[(r, c % 3)]);
    let actions =
        DMatrix::from_fn(steps, 2 * agents.len(), |r, c| agents[c / 2].actions[(r, c % 2)]);

    Ok(TrialArrays::new(states, actions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DestinationDomain, Interval, SourceDomain, SourceWorld};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn config() -> DomainConfig {
        DomainConfig::new(
            SourceDomain {
                speed: Interval::new(0.1, 1.0),
                ang_speed: Interval::new(-0.1, 0.1),
                world_size: SourceWorld { x: 4.0, y: 2.0 },
                center_radius: None,
                launch_radius: None,
                freq: None,
            },
            DestinationDomain {
                speed: Interval::new(-1.0, 1.0),
                ..DestinationDomain::default()
            },
        )
        .unwrap()
    }

    fn single(state: State, action: Action) -> Trajectory {
        Trajectory::new("airplane1", vec![state], vec![action]).unwrap()
    }

    #[test]
    fn test_length_mismatch_is_invalid_input() {
        let err = Trajectory::new("airplane1", vec![State::new(0.0, 0.0, 0.0)], vec![])
            .unwrap_err();
        assert!(matches!(err, FlightError::InvalidInput(_)));
    }

    #[test]
    fn test_speed_clip_then_map() {
        let cfg = config();
        let t = Trajectory::new(
            "airplane1",
            vec![State::new(0.0, 0.0, 0.0); 3],
            vec![Action::new(0.1, 0.0), Action::new(1.0, 0.0), Action::new(1.5, 0.0)],
        )
        .unwrap()
        .remap_actions(&cfg)
        .unwrap();

        let v: Vec<f64> = t.actions().iter().map(|a| a.v).collect();
        assert_relative_eq!(v[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_angular_speed_maps_to_destination() {
        let t = single(State::new(0.0, 0.0, 0.0), Action::new(0.5, -0.05))
            .remap_actions(&config())
            .unwrap();
        assert_relative_eq!(t.actions()[0].w, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_x_recentring() {
        let cfg = config();
        let xs: Vec<f64> = [0.0, 4.0, 2.0]
            .iter()
            .map(|&x| {
                single(State::new(x, 1.0, 0.0), Action::new(0.5, 0.0))
                    .remap_states(&cfg)
                    .unwrap()
                    .states()[0]
                    .x
            })
            .collect();

        assert_relative_eq!(xs[0], -2.0, epsilon = 1e-12);
        assert_relative_eq!(xs[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(xs[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_y_axis_is_flipped() {
        let cfg = config();
        let top = single(State::new(2.0, 0.0, 0.0), Action::new(0.5, 0.0))
            .remap_states(&cfg)
            .unwrap();
        let bottom = single(State::new(2.0, 2.0, 0.0), Action::new(0.5, 0.0))
            .remap_states(&cfg)
            .unwrap();

        // simulator top row is the learner's upper bound
        assert_relative_eq!(top.states()[0].y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(bottom.states()[0].y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_theta_wraparound() {
        assert_relative_eq!(wrap_angle(-0.5), TAU - 0.5, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(7.0), 7.0 - TAU, epsilon = 1e-12);
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(TAU), 0.0);
        assert_eq!(wrap_angle(-1e-20), 0.0);
    }

    #[test]
    fn test_remap_states_leaves_actions() {
        let t = single(State::new(1.0, 1.0, 1.0), Action::new(3.0, 0.7))
            .remap_states(&config())
            .unwrap();
        assert_eq!(t.actions()[0], Action::new(3.0, 0.7));
    }

    #[test]
    fn test_non_finite_state_is_rejected() {
        let err = single(State::new(f64::NAN, 0.0, 0.0), Action::new(0.5, 0.0))
            .remap_states(&config())
            .unwrap_err();
        assert!(err.to_string().contains("step 0"));
    }

    #[test]
    fn test_into_arrays_shapes() {
        let t = Trajectory::new(
            "airplane2",
            vec![State::new(1.0, 2.0, 3.0), State::new(4.0, 5.0, 6.0)],
            vec![Action::new(0.5, 0.0), Action::new(0.6, 0.1)],
        )
        .unwrap();

        let arrays = t.into_arrays();
        assert_eq!(arrays.states().shape(), (2, 3));
        assert_eq!(arrays.actions().shape(), (2, 2));
        assert_eq!(arrays.states()[(1, 2)], 6.0);
        assert_eq!(arrays.actions()[(1, 1)], 0.1);
    }

    #[test]
    fn test_persist_writes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let arrays = single(State::new(1.0, 2.0, 0.5), Action::new(0.5, 0.0)).into_arrays();

        arrays.persist(dir.path()).unwrap();

        let states = npy::read(&dir.path().join("airplane1-states.npy")).unwrap();
        let actions = npy::read(&dir.path().join("airplane1-actions.npy")).unwrap();
        assert_eq!(&states, arrays.states());
        assert_eq!(&actions, arrays.actions());
    }

    #[test]
    fn test_persist_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let arrays = single(State::new(1.0, 2.0, 0.5), Action::new(0.5, 0.0)).into_arrays();

        let err = arrays.persist(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, FlightError::Env(_)));
    }

    #[test]
    fn test_combine_agents_layout() {
        let a = Trajectory::new(
            "airplane1",
            vec![State::new(1.0, 2.0, 3.0)],
            vec![Action::new(0.1, 0.2)],
        )
        .unwrap()
        .into_arrays();
        let b = Trajectory::new(
            "airplane2",
            vec![State::new(4.0, 5.0, 6.0)],
            vec![Action::new(0.3, 0.4)],
        )
        .unwrap()
        .into_arrays();

        let trial = combine_agents(&[a, b]).unwrap();
        assert_eq!(trial.states, DMatrix::from_row_slice(1, 6, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(trial.actions, DMatrix::from_row_slice(1, 4, &[0.1, 0.2, 0.3, 0.4]));
    }

    #[test]
    fn test_combine_agents_length_mismatch() {
        let a = single(State::new(0.0, 0.0, 0.0), Action::new(0.5, 0.0)).into_arrays();
        let b = Trajectory::new("airplane2", vec![], vec![]).unwrap().into_arrays();

        assert!(combine_agents(&[a, b]).is_err());
    }

    proptest! {
        #[test]
        fn prop_theta_in_range(theta in -1e6f64..1e6) {
            let t = single(State::new(1.0, 1.0, theta), Action::new(0.5, 0.0))
                .remap_states(&config())
                .unwrap();
            let wrapped = t.states()[0].theta;
            prop_assert!((0.0..TAU).contains(&wrapped));
        }

        #[test]
        fn prop_actions_saturate_in_destination(v in -100.0f64..100.0, w in -100.0f64..100.0) {
            let cfg = config();
            let t = single(State::new(0.0, 0.0, 0.0), Action::new(v, w))
                .remap_actions(&cfg)
                .unwrap();
            let a = t.actions()[0];
            prop_assert!(cfg.destination.speed.contains(a.v));
            prop_assert!(cfg.destination.ang_speed.contains(a.w));
        }
    }
}
