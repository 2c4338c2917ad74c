//! # Elastic Core
//!
//! An event-driven simulator of perfectly elastic hard spheres inside a rigid
//! container.
//!
//! ## Architecture
//!
//! - `types`: Core data structures (Vec3, decimal snapping, defaults)
//! - `container`: Container shapes, wall collision times, position sampling
//! - `ball`: Rigid spheres, pair collision times, elastic response
//! - `collection`: Non-overlapping sets of balls
//! - `engine`: Discrete-event scheduler
//! - `trajectory`: Recorded snapshots and interpolated frames
//! - `generation`: Random non-overlapping initial layouts
//! - `config`: YAML scenario loader
//! - `persistence`: Saving and reloading recorded runs
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use elastic_core::{Ball, BallCollection, Container, Cuboid, Simulation, SimulationConfig, Trajectory, Vec3};
//!
//! let container: Arc<Container> = Arc::new(Cuboid::centered_cube(10.0).unwrap().into());
//! let mut balls = BallCollection::new();
//! for (x, vx) in [(-3.0, 1.0), (3.0, -1.0)] {
//!     let ball = Ball::with_defaults(Vec3::new(x, 0.0, 0.0), Vec3::new(vx, 0.0, 0.0), container.clone()).unwrap();
//!     balls.try_insert(&ball).unwrap();
//! }
//!
//! let mut sim = Simulation::new(balls, SimulationConfig::default());
//! let mut trajectory = Trajectory::new();
//! sim.run(5.0, &mut trajectory).unwrap();
//!
//! assert_eq!(trajectory.first().unwrap().time, 0.0);
//! ```

pub mod ball;
pub mod collection;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod generation;
pub mod persistence;
pub mod trajectory;
pub mod types;

pub use ball::Ball;
pub use collection::{BallCollection, BallId};
pub use config::{ScenarioConfig, ScenarioLoader, SimulationConfig};
pub use container::{Boundary, Container, Cuboid, VerticalCylinder};
pub use engine::{Event, RunReport, Simulation, StopReason};
pub use error::{SimError, SimResult};
pub use trajectory::{Frame, Snapshot, SnapshotSink, Trajectory};
pub use types::{Precision, Vec3};
