//! Scenario configuration loaded from YAML.
//!
//! A scenario bundles everything needed to start a run without recompiling:
//!
//! - [`SimulationConfig`] – engine options (snapping precision, parallel scans, safety cap)
//! - [`GeneratorParams`]  – optional random population
//! - [`BallConfig`]       – optional explicitly placed balls
//! - [`ScenarioConfig`]   – the container, the population, and the time horizon
//!
//! ## Directory Structure
//!
//! ```text
//! scenarios/
//! ├── head_on.yaml
//! ├── gas_box.yaml
//! └── ...
//! ```
//!
//! ## YAML format
//!
//! ```yaml
//! container:
//!   shape: cuboid
//!   xmin: -8.0
//!   xmax: 8.0
//!   ymin: -5.0
//!   ymax: 5.0
//!   zmin: -5.0
//!   zmax: 5.0
//!
//! horizon: 1000.0
//!
//! simulation:
//!   precision: 12         # fractional digits kept after every step
//!   parallel: false       # scan candidate events with rayon
//!   max_events: 100000    # optional safety cap
//!
//! population:             # optional random layout
//!   count: 50
//!   radius: 0.5
//!   speed: 0.05
//!   seed: 1234
//!
//! balls:                  # optional explicit layout, placed first
//!   - position: [-3.0, 0.0, 0.0]
//!     velocity: [1.0, 0.0, 0.0]
//!     radius: 1.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use crate::ball::Ball;
use crate::collection::BallCollection;
use crate::container::Container;
use crate::error::{SimError, SimResult};
use crate::generation::{fill_container, GeneratorParams};
use crate::types::{constants, Precision, Vec3};

/// Engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fractional digits kept after every position, velocity and time update
    pub precision: Precision,
    /// Scan wall and pair candidates on the rayon pool
    pub parallel: bool,
    /// Stop a run after this many events, if set
    pub max_events: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            precision: Precision::DEFAULT,
            parallel: false,
            max_events: None,
        }
    }
}

/// Initial state of one explicitly placed ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallConfig {
    pub position: [f64; 3],
    #[serde(default)]
    pub velocity: [f64; 3],
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_mass")]
    pub mass: f64,
    #[serde(default = "default_color")]
    pub color: [f64; 3],
}

fn default_radius() -> f64 {
    constants::DEFAULT_BALL_RADIUS
}

fn default_mass() -> f64 {
    constants::DEFAULT_BALL_MASS
}

fn default_color() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

impl BallConfig {
    pub fn to_ball(&self, container: Arc<Container>) -> SimResult<Ball> {
        let [px, py, pz] = self.position;
        let [vx, vy, vz] = self.velocity;
        let [r, g, b] = self.color;
        Ball::new(
            Vec3::new(px, py, pz),
            Vec3::new(vx, vy, vz),
            self.radius,
            self.mass,
            Vec3::new(r, g, b),
            container,
        )
    }
}

/// Top-level scenario loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub container: Container,
    /// Simulated time to advance by
    pub horizon: f64,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub population: Option<GeneratorParams>,
    #[serde(default)]
    pub balls: Vec<BallConfig>,
}

impl ScenarioConfig {
    pub fn validate(&self) -> SimResult<()> {
        self.container.validate()?;
        if !(self.horizon >= 0.0) {
            return Err(SimError::InvalidGeometry(format!(
                "horizon must be non-negative, got {}",
                self.horizon
            )));
        }
        Ok(())
    }

    /// Builds the initial collection: explicit balls first (strict), then the
    /// random population around them.
    pub fn build(&self) -> SimResult<(Arc<Container>, BallCollection)> {
        self.validate()?;
        let container = Arc::new(self.container.clone());

        let mut balls = BallCollection::new();
        for config in &self.balls {
            balls.try_insert(&config.to_ball(container.clone())?)?;
        }

        if let Some(params) = &self.population {
            let mut rng = ChaChaRng::seed_from_u64(params.seed);
            fill_container(&mut balls, &container, params, &mut rng)?;
        }

        info!(
            "Scenario built: {} balls in {}",
            balls.len(),
            self.container
        );
        Ok((container, balls))
    }
}

/// Scenario loader with configurable base directory.
pub struct ScenarioLoader {
    base_path: PathBuf,
}

impl ScenarioLoader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Load and validate a scenario by name (without .yaml extension).
    pub fn load(&self, name: &str) -> SimResult<ScenarioConfig> {
        let path = self.base_path.join(format!("{}.yaml", name));
        if !path.exists() {
            return Err(SimError::NotFound(name.to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        let scenario: ScenarioConfig = serde_yaml::from_str(&contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// All available scenario names, sorted.
    pub fn list(&self) -> SimResult<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".yaml") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// Tests
// =============================================================================
