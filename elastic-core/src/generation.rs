//! Random non-overlapping initial layouts.
//!
//! Balls are placed by rejection sampling: draw a center uniformly inside the
//! container, keep it if it overlaps nobody. The number of consecutive failed
//! draws is capped, so an over-packed request fails instead of spinning.

use std::f64::consts::PI;
use std::sync::Arc;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use crate::ball::Ball;
use crate::collection::BallCollection;
use crate::container::{Boundary, Container};
use crate::error::{SimError, SimResult};
use crate::types::{constants, Vec3};

/// How generated balls are colored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorSpec {
    Fixed(Vec3),
    /// Independent uniform RGB per ball
    Random,
}

impl Default for ColorSpec {
    fn default() -> Self {
        ColorSpec::Fixed(Vec3::new(0.8, 0.8, 0.8))
    }
}

/// Parameters of a random population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    pub count: usize,
    pub radius: f64,
    pub mass: f64,
    /// Speed of every ball; directions are isotropic. Zero leaves balls at rest.
    pub speed: f64,
    pub color: ColorSpec,
    pub seed: u64,
    /// Consecutive rejected draws allowed, per requested ball
    pub attempts_per_ball: usize,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            count: 1,
            radius: constants::DEFAULT_BALL_RADIUS,
            mass: constants::DEFAULT_BALL_MASS,
            speed: 0.0,
            color: ColorSpec::default(),
            seed: 1234,
            attempts_per_ball: 100,
        }
    }
}

/// Uniformly distributed unit vector.
///
/// `sin(theta)` is uniform in [-1, 1], which makes the direction uniform on
/// the sphere rather than bunched at the poles.
pub fn random_direction(rng: &mut ChaChaRng) -> Vec3 {
    let phi = rng.random_range(0.0..2.0 * PI);
    let theta = rng.random_range(-1.0f64..1.0).asin();
    Vec3::new(
        theta.cos() * phi.cos(),
        theta.cos() * phi.sin(),
        theta.sin(),
    )
}

/// Populate an empty `container` with `params.count` balls, seeded from `params.seed`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use elastic_core::container::{Container, Cuboid};
/// use elastic_core::generation::{random_balls_in_container, GeneratorParams};
///
/// let container: Arc<Container> = Arc::new(Cuboid::default().into());
/// let params = GeneratorParams { count: 10, speed: 0.05, ..Default::default() };
///
/// let balls = random_balls_in_container(&container, &params).unwrap();
/// assert_eq!(balls.len(), 10);
/// ```
pub fn random_balls_in_container(
    container: &Arc<Container>,
    params: &GeneratorParams,
) -> SimResult<BallCollection> {
    let mut rng = ChaChaRng::seed_from_u64(params.seed);
    let mut balls = BallCollection::new();
    fill_container(&mut balls, container, params, &mut rng)?;
    Ok(balls)
}

/// Add `params.count` random balls to `balls`, avoiding the ones already there.
///
/// Returns the number of balls added. Fails with
/// [`SimError::SamplingExhausted`] once `attempts_per_ball * count`
/// consecutive draws have been rejected.
pub fn fill_container(
    balls: &mut BallCollection,
    container: &Arc<Container>,
    params: &GeneratorParams,
    rng: &mut ChaChaRng,
) -> SimResult<usize> {
    let max_attempts = params.attempts_per_ball.saturating_mul(params.count.max(1));
    let mut placed = 0;
    let mut attempts = 0;
    let mut velocity = Vec3::ZERO;

    while placed < params.count {
        // A fresh direction per ball, not per draw
        if attempts == 0 && params.speed > 0.0 {
            velocity = random_direction(rng) * params.speed;
        }

        let position = container.sample_position(rng, params.radius)?;
        let color = match &params.color {
            ColorSpec::Fixed(c) => *c,
            ColorSpec::Random => Vec3::new(rng.random(), rng.random(), rng.random()),
        };
        attempts += 1;

        let accepted = match Ball::new(
            position,
            velocity,
            params.radius,
            params.mass,
            color,
            container.clone(),
        ) {
            Ok(ball) => balls.insert(&ball, false),
            // Sampled right on the boundary and lost to rounding
            Err(SimError::OutsideContainer { .. }) => false,
            Err(e) => return Err(e),
        };

        if accepted {
            debug!("Inserted ball #{} after {} draws", balls.len() - 1, attempts);
            placed += 1;
            attempts = 0;
        } else if attempts > max_attempts {
            return Err(SimError::SamplingExhausted {
                attempts,
                placed,
                requested: params.count,
            });
        }
    }

    info!(
        "{} balls randomly inserted in {} container",
        placed,
        container.kind()
    );
    Ok(placed)
}
