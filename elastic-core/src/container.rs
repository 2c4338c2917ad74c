//! Container shapes bounding the simulated balls.
//!
//! Every shape implements [`Boundary`]: a fit predicate, the time until a ball
//! next touches a wall (with its post-reflection state), and uniform sampling
//! of admissible ball centers. [`Container`] is the closed set of shapes the
//! engine and the configuration layer know about.
//!
//! ## Wall time
//!
//! For a wall at coordinate `w` along an axis, a ball of radius `r` whose
//! center sits at `p` and moves with `v != 0` along that axis touches the wall
//! when its center reaches `w - r` (upper wall) or `w + r` (lower wall):
//!
//! ```text
//!   t = (w - r - p) / v     if v > 0
//!   t = (w + r - p) / v     if v < 0
//! ```
//!
//! The event time is the minimum over the three axes. Every axis attaining the
//! minimum is reflected, so corner and edge hits flip two or three components
//! at once.

use rand::Rng;
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use crate::ball::Ball;
use crate::error::{SimError, SimResult};
use crate::types::{constants, Precision, Vec3};

/// Capability set shared by every container shape.
pub trait Boundary {
    /// True iff a sphere of `radius` centered at `position` lies entirely inside.
    fn fits(&self, position: &Vec3, radius: f64) -> bool;

    /// Time until `ball` next touches a wall, and the ball just after the bounce.
    ///
    /// An infinite time means the ball never reaches a wall and the returned
    /// ball is the unmodified input.
    fn wall_collision(&self, ball: &Ball, precision: Precision) -> SimResult<WallCollision>;

    /// Uniformly sample a center at which a ball of `radius` fits.
    fn sample_position(&self, rng: &mut ChaChaRng, radius: f64) -> SimResult<Vec3>;
}

/// Result of a wall collision query.
#[derive(Debug, Clone)]
pub struct WallCollision {
    /// Time until contact, or `f64::INFINITY`
    pub time: f64,
    /// Ball advanced by `time` with the hit components reflected
    pub ball: Ball,
}

impl WallCollision {
    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
    }
}

// =============================================================================
// Cuboid
// =============================================================================

/// Axis-aligned box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
}

impl Cuboid {
    /// Creates a box, rejecting inverted or empty extents.
    pub fn new(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
    ) -> SimResult<Self> {
        let cuboid = Self {
            xmin,
            xmax,
            ymin,
            ymax,
            zmin,
            zmax,
        };
        cuboid.validate()?;
        Ok(cuboid)
    }

    /// Cube of side `2 * half_size` centered at the origin.
    pub fn centered_cube(half_size: f64) -> SimResult<Self> {
        Self::new(
            -half_size, half_size, -half_size, half_size, -half_size, half_size,
        )
    }

    pub fn validate(&self) -> SimResult<()> {
        for (axis, lo, hi) in self.axes() {
            if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
                return Err(SimError::InvalidGeometry(format!(
                    "cuboid {}min={} must be below {}max={}",
                    axis, lo, axis, hi
                )));
            }
        }
        Ok(())
    }

    fn axes(&self) -> [(char, f64, f64); 3] {
        [
            ('x', self.xmin, self.xmax),
            ('y', self.ymin, self.ymax),
            ('z', self.zmin, self.zmax),
        ]
    }

    /// Time for a center at `p` moving at `v` to reach the wall it heads for.
    fn axis_time(p: f64, v: f64, lo: f64, hi: f64, radius: f64, precision: Precision) -> f64 {
        if v == 0.0 {
            return f64::INFINITY;
        }
        let t = if v > 0.0 {
            (hi - radius - p) / v
        } else {
            (lo + radius - p) / v
        };
        // Residual error can leave a touching ball marginally past its wall.
        precision.snap(t).max(0.0)
    }
}

impl Default for Cuboid {
    fn default() -> Self {
        let h = constants::DEFAULT_CUBOID_HALF_SIZE;
        Self {
            xmin: -h,
            xmax: h,
            ymin: -h,
            ymax: h,
            zmin: -h,
            zmax: h,
        }
    }
}

impl Boundary for Cuboid {
    fn fits(&self, position: &Vec3, radius: f64) -> bool {
        position.x - radius >= self.xmin
            && position.x + radius <= self.xmax
            && position.y - radius >= self.ymin
            && position.y + radius <= self.ymax
            && position.z - radius >= self.zmin
            && position.z + radius <= self.zmax
    }

    fn wall_collision(&self, ball: &Ball, precision: Precision) -> SimResult<WallCollision> {
        let r = ball.radius;
        let p = ball.position;
        let v = ball.velocity;

        let tx = Self::axis_time(p.x, v.x, self.xmin, self.xmax, r, precision);
        let ty = Self::axis_time(p.y, v.y, self.ymin, self.ymax, r, precision);
        let tz = Self::axis_time(p.z, v.z, self.zmin, self.zmax, r, precision);
        let time = tx.min(ty).min(tz);

        let mut after = ball.clone();
        if time.is_finite() {
            after.integrate_snapped(time, precision);
            if tx == time {
                after.velocity.x = -after.velocity.x;
            }
            if ty == time {
                after.velocity.y = -after.velocity.y;
            }
            if tz == time {
                after.velocity.z = -after.velocity.z;
            }
        }

        Ok(WallCollision { time, ball: after })
    }

    fn sample_position(&self, rng: &mut ChaChaRng, radius: f64) -> SimResult<Vec3> {
        let mut coords = [0.0; 3];
        for (slot, (axis, lo, hi)) in coords.iter_mut().zip(self.axes()) {
            let lo = lo + radius;
            let hi = hi - radius;
            if lo > hi {
                return Err(SimError::InvalidGeometry(format!(
                    "radius {} does not fit along {} in {}",
                    radius, axis, self
                )));
            }
            let u: f64 = rng.random();
            *slot = lo + (hi - lo) * u;
        }
        Ok(Vec3::new(coords[0], coords[1], coords[2]))
    }
}

impl std::fmt::Display for Cuboid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cuboid(x=[{}, {}], y=[{}, {}], z=[{}, {}])",
            self.xmin, self.xmax, self.ymin, self.ymax, self.zmin, self.zmax
        )
    }
}

// =============================================================================
// Vertical Cylinder
// =============================================================================

/// Cylinder with its axis along z, standing on `base`.
///
/// Only the fit predicate and sampling are defined; wall collisions against
/// the curved side are not implemented and always fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalCylinder {
    pub radius: f64,
    pub height: f64,
    /// Center of the bottom face
    #[serde(default)]
    pub base: Vec3,
}

impl VerticalCylinder {
    pub fn new(radius: f64, height: f64, base: Vec3) -> SimResult<Self> {
        let cylinder = Self {
            radius,
            height,
            base,
        };
        cylinder.validate()?;
        Ok(cylinder)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(SimError::InvalidGeometry(format!(
                "cylinder radius must be positive, got {}",
                self.radius
            )));
        }
        if !(self.height > 0.0 && self.height.is_finite()) {
            return Err(SimError::InvalidGeometry(format!(
                "cylinder height must be positive, got {}",
                self.height
            )));
        }
        if !self.base.is_finite() {
            return Err(SimError::InvalidGeometry(format!(
                "cylinder base must be finite, got {}",
                self.base
            )));
        }
        Ok(())
    }

    fn axial_distance(&self, position: &Vec3) -> f64 {
        let dx = position.x - self.base.x;
        let dy = position.y - self.base.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for VerticalCylinder {
    fn default() -> Self {
        Self {
            radius: constants::DEFAULT_CYLINDER_RADIUS,
            height: constants::DEFAULT_CYLINDER_HEIGHT,
            base: Vec3::ZERO,
        }
    }
}

impl Boundary for VerticalCylinder {
    fn fits(&self, position: &Vec3, radius: f64) -> bool {
        if position.z + radius > self.base.z + self.height {
            return false;
        }
        if position.z - radius < self.base.z {
            return false;
        }
        self.axial_distance(position) + radius <= self.radius
    }

    fn wall_collision(&self, _ball: &Ball, _precision: Precision) -> SimResult<WallCollision> {
        Err(SimError::UnsupportedGeometry(
            "wall collision time is not defined for a vertical cylinder",
        ))
    }

    fn sample_position(&self, rng: &mut ChaChaRng, radius: f64) -> SimResult<Vec3> {
        let disk = self.radius - radius;
        let z_lo = self.base.z + radius;
        let z_hi = self.base.z + self.height - radius;
        if disk < 0.0 || z_lo > z_hi {
            return Err(SimError::InvalidGeometry(format!(
                "radius {} does not fit in {}",
                radius, self
            )));
        }

        // sqrt keeps the density uniform over the disk area
        let rho = disk * rng.random::<f64>().sqrt();
        let phi = 2.0 * std::f64::consts::PI * rng.random::<f64>();
        let z = z_lo + (z_hi - z_lo) * rng.random::<f64>();
        Ok(Vec3::new(
            self.base.x + rho * phi.cos(),
            self.base.y + rho * phi.sin(),
            z,
        ))
    }
}

impl std::fmt::Display for VerticalCylinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VerticalCylinder(radius={}, height={}, base={})",
            self.radius, self.height, self.base
        )
    }
}

// =============================================================================
// Container
// =============================================================================

/// Every supported container shape.
///
/// In YAML the shape is selected by a `shape` tag:
///
/// ```yaml
/// shape: cuboid
/// xmin: -8.0
/// xmax: 8.0
/// ymin: -5.0
/// ymax: 5.0
/// zmin: -5.0
/// zmax: 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Container {
    Cuboid(Cuboid),
    VerticalCylinder(VerticalCylinder),
}

impl Container {
    pub fn kind(&self) -> &'static str {
        match self {
            Container::Cuboid(_) => "cuboid",
            Container::VerticalCylinder(_) => "vertical_cylinder",
        }
    }

    /// Re-checks bounds, e.g. after deserialization.
    pub fn validate(&self) -> SimResult<()> {
        match self {
            Container::Cuboid(c) => c.validate(),
            Container::VerticalCylinder(c) => c.validate(),
        }
    }

    fn shape(&self) -> &dyn Boundary {
        match self {
            Container::Cuboid(c) => c,
            Container::VerticalCylinder(c) => c,
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::Cuboid(Cuboid::default())
    }
}

impl From<Cuboid> for Container {
    fn from(c: Cuboid) -> Self {
        Container::Cuboid(c)
    }
}

impl From<VerticalCylinder> for Container {
    fn from(c: VerticalCylinder) -> Self {
        Container::VerticalCylinder(c)
    }
}

impl Boundary for Container {
    fn fits(&self, position: &Vec3, radius: f64) -> bool {
        self.shape().fits(position, radius)
    }

    fn wall_collision(&self, ball: &Ball, precision: Precision) -> SimResult<WallCollision> {
        self.shape().wall_collision(ball, precision)
    }

    fn sample_position(&self, rng: &mut ChaChaRng, radius: f64) -> SimResult<Vec3> {
        self.shape().sample_position(rng, radius)
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::Cuboid(c) => c.fmt(f),
            Container::VerticalCylinder(c) => c.fmt(f),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn wide_box_with_xmax(xmax: f64) -> Arc<Container> {
        Arc::new(Cuboid::new(-100.0, xmax, -100.0, 100.0, -100.0, 100.0).unwrap().into())
    }

    fn ball_in(container: &Arc<Container>, pos: Vec3, vel: Vec3, radius: f64) -> Ball {
        Ball::new(pos, vel, radius, 1.0, Vec3::new(1.0, 0.0, 0.0), container.clone()).unwrap()
    }

    #[test]
    fn test_cuboid_rejects_inverted_bounds() {
        let result = Cuboid::new(1.0, -1.0, -1.0, 1.0, -1.0, 1.0);
        assert!(matches!(result, Err(SimError::InvalidGeometry(_))));
    }

    #[test]
    fn test_cuboid_fits() {
        let cuboid = Cuboid::default();
        assert!(cuboid.fits(&Vec3::ZERO, 0.5));
        assert!(cuboid.fits(&Vec3::new(4.5, 0.0, 0.0), 0.5)); // touching
        assert!(!cuboid.fits(&Vec3::new(4.6, 0.0, 0.0), 0.5));
        assert!(!cuboid.fits(&Vec3::new(0.0, 0.0, -4.9), 0.5));
    }

    #[test]
    fn test_wall_reflection() {
        let container = wide_box_with_xmax(5.0);
        let ball = ball_in(&container, Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.2, 0.0, 0.0), 0.5);

        let hit = container.wall_collision(&ball, Precision::DEFAULT).unwrap();

        assert_relative_eq!(hit.time, 2.5);
        assert_relative_eq!(hit.ball.position.x, 4.5);
        assert_relative_eq!(hit.ball.velocity.x, -0.2);
        assert_eq!(hit.ball.position.y, 0.0);
        assert_eq!(hit.ball.position.z, 0.0);
        assert_eq!(hit.ball.velocity.y, 0.0);
        assert_eq!(hit.ball.velocity.z, 0.0);
    }

    #[test]
    fn test_wall_collision_lower_wall() {
        let container: Arc<Container> = Arc::new(Cuboid::default().into());
        let ball = ball_in(&container, Vec3::new(0.0, -3.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 0.5);

        let hit = container.wall_collision(&ball, Precision::DEFAULT).unwrap();

        // Center travels from -3 to -4.5
        assert_relative_eq!(hit.time, 1.5);
        assert_relative_eq!(hit.ball.position.y, -4.5);
        assert_relative_eq!(hit.ball.velocity.y, 1.0);
    }

    #[test]
    fn test_corner_hit_flips_both_axes() {
        let container: Arc<Container> = Arc::new(Cuboid::default().into());
        let ball = ball_in(&container, Vec3::new(3.5, 3.5, 0.0), Vec3::new(1.0, 1.0, 0.3), 0.5);

        let hit = container.wall_collision(&ball, Precision::DEFAULT).unwrap();

        assert_relative_eq!(hit.time, 1.0);
        assert_relative_eq!(hit.ball.velocity.x, -1.0);
        assert_relative_eq!(hit.ball.velocity.y, -1.0);
        assert_relative_eq!(hit.ball.velocity.z, 0.3); // slower axis untouched
    }

    #[test]
    fn test_resting_ball_never_hits_wall() {
        let container: Arc<Container> = Arc::new(Cuboid::default().into());
        let ball = ball_in(&container, Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, 0.5);

        let hit = container.wall_collision(&ball, Precision::DEFAULT).unwrap();

        assert!(hit.time.is_infinite());
        assert!(!hit.is_finite());
        assert_eq!(hit.ball.position, ball.position);
        assert_eq!(hit.ball.velocity, ball.velocity);
    }

    #[test]
    fn test_touching_ball_moving_out_gets_zero_time() {
        let container: Arc<Container> = Arc::new(Cuboid::default().into());
        let ball = Ball::new_unchecked(
            Vec3::new(4.5000000000001, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            0.5,
            1.0,
            Vec3::ZERO,
            container.clone(),
        );

        let hit = container.wall_collision(&ball, Precision::DEFAULT).unwrap();

        assert_eq!(hit.time, 0.0);
        assert_relative_eq!(hit.ball.velocity.x, -1.0);
    }

    #[test]
    fn test_cylinder_fits() {
        let cylinder = VerticalCylinder::default();
        assert!(cylinder.fits(&Vec3::new(0.0, 0.0, 5.0), 0.5));
        assert!(cylinder.fits(&Vec3::new(3.0, 4.0, 5.0), 0.0)); // on the side wall
        assert!(!cylinder.fits(&Vec3::new(3.0, 4.0, 5.0), 0.1));
        assert!(!cylinder.fits(&Vec3::new(0.0, 0.0, 0.2), 0.5)); // through the floor
        assert!(!cylinder.fits(&Vec3::new(0.0, 0.0, 9.8), 0.5)); // through the lid
    }

    #[test]
    fn test_cylinder_validation() {
        assert!(VerticalCylinder::new(0.0, 1.0, Vec3::ZERO).is_err());
        assert!(VerticalCylinder::new(1.0, -1.0, Vec3::ZERO).is_err());
        assert!(VerticalCylinder::new(1.0, 1.0, Vec3::ZERO).is_ok());
    }

    #[test]
    fn test_cylinder_wall_collision_unsupported() {
        let container: Arc<Container> = Arc::new(VerticalCylinder::default().into());
        let ball = ball_in(&container, Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 0.0, 0.0), 0.5);

        let result = container.wall_collision(&ball, Precision::DEFAULT);
        assert!(matches!(result, Err(SimError::UnsupportedGeometry(_))));
    }

    #[test]
    fn test_sampled_positions_fit() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let shapes: [Container; 2] = [
            Cuboid::new(-8.0, 8.0, -1.0, 1.0, 0.0, 3.0).unwrap().into(),
            VerticalCylinder::new(2.0, 4.0, Vec3::new(1.0, 1.0, -2.0)).unwrap().into(),
        ];
        for shape in &shapes {
            for _ in 0..200 {
                let p = shape.sample_position(&mut rng, 0.5).unwrap();
                assert!(shape.fits(&p, 0.5), "{} does not host {}", shape, p);
            }
        }
    }

    #[test]
    fn test_sampling_oversized_ball_fails() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let cuboid = Cuboid::new(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0).unwrap();
        assert!(cuboid.sample_position(&mut rng, 1.5).is_err());
    }

    #[test]
    fn test_container_yaml_tag() {
        let yaml = "shape: vertical_cylinder\nradius: 3.0\nheight: 6.0\n";
        let container: Container = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(container.kind(), "vertical_cylinder");
        assert!(container.validate().is_ok());
    }
}
