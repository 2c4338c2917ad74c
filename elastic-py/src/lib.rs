//! Python bindings for the elastic-core hard-sphere engine.
//!
//! Provides a simple Python API:
//!
//! ```python
//! from elastic_physics import Simulation
//!
//! sim = Simulation()                      # cube [-5, 5]^3
//! sim.add_ball(-3.0, 0.0, 0.0, 1.0, 0.0, 0.0, radius=1.0)
//! sim.add_ball(3.0, 0.0, 0.0, -1.0, 0.0, 0.0, radius=1.0)
//! sim.populate(20, radius=0.3, speed=0.5, seed=1234)
//!
//! report = sim.run(100.0)
//! print(report["events"], "events, stopped by", report["stop"])
//!
//! for t, balls in sim.frames(0.0, 100.0, 0.5):
//!     print(t, balls[0]["x"])
//! ```

use std::sync::Arc;

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use elastic_core::generation::{fill_container, ColorSpec, GeneratorParams};
use elastic_core::persistence::{load_run, save_run};
use elastic_core::trajectory::Frame;
use elastic_core::{
    Ball, BallCollection, BallId, Container, Cuboid, Event, SimError, Simulation as Engine,
    SimulationConfig, Snapshot, StopReason, Trajectory, Vec3 as CoreVec3, VerticalCylinder,
};

/// 3D vector for positions, velocities and colors.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec3 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
    #[pyo3(get, set)]
    pub z: f64,
}

#[pymethods]
impl Vec3 {
    #[new]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn __repr__(&self) -> String {
        format!("Vec3({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }

    fn magnitude(&self) -> f64 {
        CoreVec3::from(*self).magnitude()
    }

    fn to_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

impl From<CoreVec3> for Vec3 {
    fn from(v: CoreVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for CoreVec3 {
    fn from(v: Vec3) -> Self {
        CoreVec3::new(v.x, v.y, v.z)
    }
}

fn to_py_err(err: SimError) -> PyErr {
    match err {
        SimError::IoError(e) => PyIOError::new_err(e.to_string()),
        SimError::UnsupportedGeometry(_) => PyRuntimeError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn stop_name(stop: StopReason) -> &'static str {
    match stop {
        StopReason::Horizon => "horizon",
        StopReason::Quiescent => "quiescent",
        StopReason::EventLimit => "event_limit",
    }
}

fn frame_dict<'py>(py: Python<'py>, frame: &Frame) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("id", frame.id.0)?;
    dict.set_item("x", frame.position.x)?;
    dict.set_item("y", frame.position.y)?;
    dict.set_item("z", frame.position.z)?;
    dict.set_item("vx", frame.velocity.x)?;
    dict.set_item("vy", frame.velocity.y)?;
    dict.set_item("vz", frame.velocity.z)?;
    dict.set_item("radius", frame.radius)?;
    dict.set_item("color", (frame.color.x, frame.color.y, frame.color.z))?;
    Ok(dict)
}

/// Main simulation class.
///
/// Owns a cuboid container, the current balls, and every snapshot recorded
/// so far.
#[pyclass]
pub struct Simulation {
    container: Arc<Container>,
    balls: BallCollection,
    trajectory: Trajectory,
    config: SimulationConfig,
    time: f64,
}

impl Simulation {
    fn engine(&self, config: SimulationConfig) -> Engine<'static> {
        if self.trajectory.is_empty() {
            Engine::new(self.balls.clone(), config)
        } else {
            let snapshot = Snapshot::new(self.time, self.balls.clone());
            Engine::resume(&snapshot, config)
        }
    }

    fn ensure_not_started(&self) -> PyResult<()> {
        if self.trajectory.is_empty() {
            Ok(())
        } else {
            Err(PyRuntimeError::new_err(
                "balls cannot be added once the simulation has run",
            ))
        }
    }
}

#[pymethods]
impl Simulation {
    /// Create a simulation in an axis-aligned box (default [-5, 5]^3).
    #[new]
    #[pyo3(signature = (xmin=-5.0, xmax=5.0, ymin=-5.0, ymax=5.0, zmin=-5.0, zmax=5.0, parallel=false))]
    fn new(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
        parallel: bool,
    ) -> PyResult<Self> {
        let cuboid = Cuboid::new(xmin, xmax, ymin, ymax, zmin, zmax).map_err(to_py_err)?;
        Ok(Self {
            container: Arc::new(cuboid.into()),
            balls: BallCollection::new(),
            trajectory: Trajectory::new(),
            config: SimulationConfig {
                parallel,
                ..Default::default()
            },
            time: 0.0,
        })
    }

    /// Create a simulation in a vertical cylinder.
    ///
    /// Balls can be placed and populated, but running raises RuntimeError:
    /// wall collisions are only defined for boxes.
    #[staticmethod]
    #[pyo3(signature = (radius=5.0, height=10.0))]
    fn cylinder(radius: f64, height: f64) -> PyResult<Self> {
        let cylinder = VerticalCylinder::new(radius, height, CoreVec3::ZERO).map_err(to_py_err)?;
        Ok(Self {
            container: Arc::new(cylinder.into()),
            balls: BallCollection::new(),
            trajectory: Trajectory::new(),
            config: SimulationConfig::default(),
            time: 0.0,
        })
    }

    /// Current simulation time.
    #[getter]
    fn time(&self) -> f64 {
        self.time
    }

    /// Number of balls.
    #[getter]
    fn ball_count(&self) -> usize {
        self.balls.len()
    }

    /// Add one ball; returns its id.
    ///
    /// Raises ValueError if it does not fit or overlaps another ball.
    #[pyo3(signature = (x, y, z, vx, vy, vz, radius=0.5, mass=1.0, color=(1.0, 0.0, 0.0)))]
    fn add_ball(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        vx: f64,
        vy: f64,
        vz: f64,
        radius: f64,
        mass: f64,
        color: (f64, f64, f64),
    ) -> PyResult<usize> {
        self.ensure_not_started()?;
        let ball = Ball::new(
            CoreVec3::new(x, y, z),
            CoreVec3::new(vx, vy, vz),
            radius,
            mass,
            CoreVec3::new(color.0, color.1, color.2),
            self.container.clone(),
        )
        .map_err(to_py_err)?;
        let id = self.balls.try_insert(&ball).map_err(to_py_err)?;
        Ok(id.0)
    }

    /// Add `count` random non-overlapping balls moving at `speed`.
    ///
    /// Returns the number of balls added.
    #[pyo3(signature = (count, radius=0.5, mass=1.0, speed=0.0, seed=1234, random_color=false))]
    fn populate(
        &mut self,
        count: usize,
        radius: f64,
        mass: f64,
        speed: f64,
        seed: u64,
        random_color: bool,
    ) -> PyResult<usize> {
        self.ensure_not_started()?;
        let params = GeneratorParams {
            count,
            radius,
            mass,
            speed,
            seed,
            color: if random_color {
                ColorSpec::Random
            } else {
                ColorSpec::default()
            },
            ..Default::default()
        };
        let mut rng = ChaChaRng::seed_from_u64(seed);
        fill_container(&mut self.balls, &self.container, &params, &mut rng).map_err(to_py_err)
    }

    /// Get ball position as Vec3.
    fn ball_position(&self, id: usize) -> Option<Vec3> {
        self.balls.as_slice().get(id).map(|b| b.position.into())
    }

    /// Get ball velocity as Vec3.
    fn ball_velocity(&self, id: usize) -> Option<Vec3> {
        self.balls.as_slice().get(id).map(|b| b.velocity.into())
    }

    /// Total kinetic energy of all balls.
    fn kinetic_energy(&self) -> f64 {
        self.balls.total_kinetic_energy()
    }

    /// Describe the next event without advancing: ("wall", t, [ids]),
    /// ("pair", t, [i, j]), or None when nothing will ever happen.
    fn next_event(&self) -> PyResult<Option<(String, f64, Vec<usize>)>> {
        let event = self.engine(self.config.clone()).next_event().map_err(to_py_err)?;
        Ok(event.map(|e| match e {
            Event::Wall { time, balls } => {
                ("wall".to_string(), time, balls.iter().map(|b| b.0).collect())
            }
            Event::Pair {
                time,
                first,
                second,
            } => ("pair".to_string(), time, vec![first.0, second.0]),
        }))
    }

    /// Advance by `duration`, recording a snapshot after every event.
    ///
    /// Returns a dict with the event counts, final time, and stop reason.
    #[pyo3(signature = (duration, max_events=None))]
    fn run(&mut self, duration: f64, max_events: Option<u64>) -> PyResult<PyObject> {
        let mut engine = self.engine(SimulationConfig {
            max_events: max_events.or(self.config.max_events),
            ..self.config.clone()
        });
        let report = engine.run(duration, &mut self.trajectory).map_err(to_py_err)?;
        self.time = engine.time();
        self.balls = engine.into_balls();

        Python::with_gil(|py| {
            let dict = PyDict::new(py);
            dict.set_item("events", report.events)?;
            dict.set_item("wall_events", report.wall_events)?;
            dict.set_item("pair_events", report.pair_events)?;
            dict.set_item("final_time", report.final_time)?;
            dict.set_item("stop", stop_name(report.stop))?;
            Ok(dict.into())
        })
    }

    /// Every recorded snapshot as {"time": t, "balls": [ball dicts]}.
    fn snapshots(&self) -> PyResult<PyObject> {
        Python::with_gil(|py| {
            let out = PyList::empty(py);
            for snapshot in &self.trajectory {
                let balls = PyList::empty(py);
                for (i, ball) in snapshot.balls.iter().enumerate() {
                    let frame = Frame {
                        id: BallId(i),
                        position: ball.position,
                        velocity: ball.velocity,
                        color: ball.color,
                        radius: ball.radius,
                    };
                    balls.append(frame_dict(py, &frame)?)?;
                }
                let dict = PyDict::new(py);
                dict.set_item("time", snapshot.time)?;
                dict.set_item("balls", balls)?;
                out.append(dict)?;
            }
            Ok(out.into())
        })
    }

    /// Recorded snapshot times.
    fn snapshot_times(&self) -> Vec<f64> {
        self.trajectory.times().collect()
    }

    /// Interpolated state of every ball at time `t`, or None outside the
    /// recorded range.
    fn frame_at(&self, t: f64) -> PyResult<Option<PyObject>> {
        let Some(frames) = self.trajectory.frame_at(t) else {
            return Ok(None);
        };
        Python::with_gil(|py| {
            let list = PyList::empty(py);
            for frame in &frames {
                list.append(frame_dict(py, frame)?)?;
            }
            Ok(Some(list.into()))
        })
    }

    /// Frames on a regular time grid as a list of (t, [ball dicts]).
    fn frames(&self, tmin: f64, tmax: f64, tstep: f64) -> PyResult<PyObject> {
        Python::with_gil(|py| {
            let out = PyList::empty(py);
            for (t, frames) in self.trajectory.frames(tmin, tmax, tstep) {
                let balls = PyList::empty(py);
                for frame in &frames {
                    balls.append(frame_dict(py, frame)?)?;
                }
                out.append((t, balls))?;
            }
            Ok(out.into())
        })
    }

    /// Save the recorded run as YAML.
    fn save(&self, path: &str) -> PyResult<()> {
        save_run(path, &self.container, &self.trajectory).map_err(to_py_err)
    }

    /// Load a run saved with `save`, positioned at its last snapshot.
    #[staticmethod]
    fn load(path: &str) -> PyResult<Self> {
        let (container, trajectory) = load_run(path).map_err(to_py_err)?;
        let (time, balls) = match trajectory.last() {
            Some(last) => (last.time, last.balls.clone()),
            None => (0.0, BallCollection::new()),
        };
        Ok(Self {
            container,
            balls,
            trajectory,
            config: SimulationConfig::default(),
            time,
        })
    }

    /// Get current state as dict for easy inspection.
    fn state_dict(&self) -> PyResult<PyObject> {
        Python::with_gil(|py| {
            let dict = PyDict::new(py);
            dict.set_item("time", self.time)?;
            dict.set_item("container", self.container.to_string())?;
            dict.set_item("ball_count", self.balls.len())?;
            dict.set_item("snapshots", self.trajectory.len())?;
            dict.set_item("kinetic_energy", self.balls.total_kinetic_energy())?;
            let p = self.balls.total_momentum();
            dict.set_item("momentum", (p.x, p.y, p.z))?;
            Ok(dict.into())
        })
    }
}

/// Python module definition.
#[pymodule]
fn elastic_physics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec3>()?;
    m.add_class::<Simulation>()?;
    Ok(())
}
