//! A rigid sphere and its two-body collision math.
//!
//! ## Time to contact
//!
//! With relative position `dp` and relative velocity `dv` (self minus other),
//! the squared center distance at time `t` is `|dp + dv t|^2`. Contact happens
//! when it equals `(r1 + r2)^2`, which gives the quadratic
//!
//! ```text
//! a t^2 + b t + c = 0
//! a = |dv|^2,  b = 2 dp.dv,  c = |dp|^2 - (r1 + r2)^2
//! ```
//!
//! Roots in the past are discarded, and the earliest surviving root only
//! counts if the squared distance is still shrinking there
//! (`2 a t + b < 0`). That rejects grazing contacts and pairs that are
//! already separating after a previous bounce.
//!
//! ## Elastic response
//!
//! The impulse acts along the line of centers only, so tangential velocity
//! components are untouched and both momentum and kinetic energy are
//! conserved:
//!
//! ```text
//! f  = (dp.dv) / |dp|^2
//! v1 -= 2 m2 / (m1 + m2) * f * dp
//! v2 += 2 m1 / (m1 + m2) * f * dp
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::container::{Boundary, Container, WallCollision};
use crate::error::{SimError, SimResult};
use crate::types::{constants, Precision, Vec3};

/// A rigid sphere moving freely inside a container.
///
/// The container is shared, not owned: many balls point at the same
/// [`Container`], and a ball can be moved to another container between
/// simulation phases with [`Ball::relocate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
    pub mass: f64,
    /// RGB in [0, 1]; cosmetic only
    pub color: Vec3,
    /// Re-attached by the loader after deserialization
    #[serde(skip)]
    container: Arc<Container>,
}

impl Ball {
    /// Creates a ball, checking that it is physical and fits in `container`.
    pub fn new(
        position: Vec3,
        velocity: Vec3,
        radius: f64,
        mass: f64,
        color: Vec3,
        container: Arc<Container>,
    ) -> SimResult<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(SimError::InvalidGeometry(format!(
                "ball radius must be positive, got {}",
                radius
            )));
        }
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(SimError::InvalidGeometry(format!(
                "ball mass must be positive, got {}",
                mass
            )));
        }
        if !position.is_finite() || !velocity.is_finite() {
            return Err(SimError::InvalidGeometry(format!(
                "ball state must be finite, got position {} velocity {}",
                position, velocity
            )));
        }
        if !container.fits(&position, radius) {
            return Err(SimError::OutsideContainer { position, radius });
        }
        Ok(Self::new_unchecked(
            position, velocity, radius, mass, color, container,
        ))
    }

    /// Creates a ball without any validation.
    ///
    /// Used when balls are moved between containers after a previous phase,
    /// where the fit check against the new container is not meaningful.
    pub fn new_unchecked(
        position: Vec3,
        velocity: Vec3,
        radius: f64,
        mass: f64,
        color: Vec3,
        container: Arc<Container>,
    ) -> Self {
        Self {
            position,
            velocity,
            radius,
            mass,
            color,
            container,
        }
    }

    /// Ball with the default radius, unit mass and red color.
    pub fn with_defaults(
        position: Vec3,
        velocity: Vec3,
        container: Arc<Container>,
    ) -> SimResult<Self> {
        Self::new(
            position,
            velocity,
            constants::DEFAULT_BALL_RADIUS,
            constants::DEFAULT_BALL_MASS,
            Vec3::new(1.0, 0.0, 0.0),
            container,
        )
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Associates the ball with another container, skipping the fit check.
    pub fn relocate(&mut self, container: Arc<Container>) {
        self.container = container;
    }

    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }

    pub fn momentum(&self) -> Vec3 {
        self.velocity * self.mass
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.magnitude_squared()
    }

    /// Euclidean distance between centers.
    pub fn distance_to(&self, other: &Ball) -> f64 {
        (self.position - other.position).magnitude()
    }

    /// True when the two spheres interpenetrate (touching is allowed).
    pub fn overlaps(&self, other: &Ball) -> bool {
        self.distance_to(other) < self.radius + other.radius
    }

    /// Advance the position by `dt` at constant velocity.
    pub fn integrate(&mut self, dt: f64) {
        self.integrate_snapped(dt, Precision::DEFAULT);
    }

    pub fn integrate_snapped(&mut self, dt: f64, precision: Precision) {
        self.position = (self.position + self.velocity * dt).snapped(precision);
    }

    /// Time until this ball's surface touches `other`'s, or `f64::INFINITY`.
    pub fn time_to_collision(&self, other: &Ball) -> f64 {
        self.time_to_collision_snapped(other, Precision::DEFAULT)
    }

    pub fn time_to_collision_snapped(&self, other: &Ball, precision: Precision) -> f64 {
        let dv = self.velocity - other.velocity;
        let a = dv.magnitude_squared();
        if a == 0.0 {
            return f64::INFINITY;
        }

        let dp = self.position - other.position;
        let b = 2.0 * dp.dot(&dv);
        let contact = self.radius + other.radius;
        let c = dp.magnitude_squared() - contact * contact;

        let discriminant = b * b - 4.0 * a * c;
        if discriminant <= 0.0 {
            return f64::INFINITY;
        }

        let sqrt_disc = discriminant.sqrt();
        let future = |t: f64| if t < 0.0 { f64::INFINITY } else { t };
        let t = future((-b + sqrt_disc) / (2.0 * a)).min(future((-b - sqrt_disc) / (2.0 * a)));

        // Must still be approaching at the contact instant
        if !t.is_finite() || 2.0 * a * t + b >= 0.0 {
            return f64::INFINITY;
        }
        precision.snap(t)
    }

    /// Apply an elastic collision with `other`, updating both velocities.
    ///
    /// Coincident centers have no line of centers; the call is then a no-op.
    pub fn resolve_collision(&mut self, other: &mut Ball) {
        self.resolve_collision_snapped(other, Precision::DEFAULT);
    }

    pub fn resolve_collision_snapped(&mut self, other: &mut Ball, precision: Precision) {
        let dp = self.position - other.position;
        let dist_sq = dp.magnitude_squared();
        if dist_sq == 0.0 {
            return;
        }

        let dv = self.velocity - other.velocity;
        let factor = dp.dot(&dv) / dist_sq;
        let total_mass = self.mass + other.mass;
        let corr_self = 2.0 * other.mass / total_mass * factor;
        let corr_other = -2.0 * self.mass / total_mass * factor;

        self.velocity = (self.velocity - dp * corr_self).snapped(precision);
        other.velocity = (other.velocity - dp * corr_other).snapped(precision);
    }

    /// Next wall event for this ball against its own container.
    pub fn wall_collision(&self, precision: Precision) -> SimResult<WallCollision> {
        self.container.wall_collision(self, precision)
    }
}

impl std::fmt::Display for Ball {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ball(position={}, velocity={}, radius={}, mass={})",
            self.position, self.velocity, self.radius, self.mass
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
