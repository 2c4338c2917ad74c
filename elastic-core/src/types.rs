//! Core value types shared by every layer of the engine.
//!
//! Units are whatever the caller chooses, as long as they are consistent:
//! positions in length units, velocities in length per time unit, and
//! collision times in the same time unit. Nothing in the engine depends on SI.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Vec3 - 3D Vector
// =============================================================================

/// A 3D vector used for positions, velocities, and RGB colors.
///
/// Treated as an immutable value: arithmetic returns new vectors and the
/// engine only ever replaces whole components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared magnitude (avoids sqrt for comparisons)
    pub fn magnitude_squared(&self) -> f64 {
        self.dot(self)
    }

    /// Magnitude (length) of the vector
    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Linear interpolation between two vectors
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        *self + (*other - *self) * t
    }

    /// Every component snapped to `precision` fractional digits.
    pub fn snapped(&self, precision: Precision) -> Self {
        Self {
            x: precision.snap(self.x),
            y: precision.snap(self.y),
            z: precision.snap(self.z),
        }
    }

    /// True when all three components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// =============================================================================
// Fixed decimal snapping
// =============================================================================

/// Number of fractional decimal digits kept after every position, velocity,
/// and collision-time computation.
///
/// Snapping keeps thousands of chained events from drifting apart by a few
/// ulps, which would otherwise make exact-tie comparisons (corner hits,
/// simultaneous wall events) fail and let the event loop stall on residual
/// overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precision(pub u32);

impl Precision {
    pub const DEFAULT: Precision = Precision(constants::DEFAULT_PRECISION);

    /// Round `value` to this many fractional digits.
    ///
    /// Infinities and NaN pass through untouched. Values too large for the
    /// scaled product to be exact are returned as-is.
    pub fn snap(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let scale = 10f64.powi(self.0 as i32);
        let scaled = value * scale;
        if !scaled.is_finite() || scaled.abs() >= constants::EXACT_INTEGER_LIMIT {
            return value;
        }
        scaled.round() / scale
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// Physical Constants
// =============================================================================

pub mod constants {
    /// Fractional digits kept by default when snapping.
    pub const DEFAULT_PRECISION: u32 = 12;

    /// 2^53: beyond this every f64 is already an integer.
    pub const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

    pub const DEFAULT_BALL_RADIUS: f64 = 0.5;
    pub const DEFAULT_BALL_MASS: f64 = 1.0;

    pub const DEFAULT_CUBOID_HALF_SIZE: f64 = 5.0;
    pub const DEFAULT_CYLINDER_RADIUS: f64 = 5.0;
    pub const DEFAULT_CYLINDER_HEIGHT: f64 = 10.0;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a - b, Vec3::new(-3.0, -3.0, -3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(a.dot(&b), 32.0); // 1*4 + 2*5 + 3*6 = 32
    }

    #[test]
    fn test_vec3_default_is_zero() {
        assert_eq!(Vec3::default(), Vec3::ZERO);
    }

    #[test]
    fn test_vec3_magnitude() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        assert_relative_eq!(v.magnitude(), 5.0);
        assert_relative_eq!(v.magnitude_squared(), 25.0);
    }

    #[test]
    fn test_vec3_lerp_midpoint() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(2.0, -4.0, 6.0);
        assert_eq!(a.lerp(&b, 0.5), Vec3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn test_snap_removes_float_noise() {
        let p = Precision::DEFAULT;
        assert_eq!(p.snap(0.1 + 0.2), 0.3);
        assert_eq!(p.snap(-1.0000000000004), -1.0);
    }

    #[test]
    fn test_snap_keeps_infinity() {
        let p = Precision::DEFAULT;
        assert!(p.snap(f64::INFINITY).is_infinite());
        assert!(p.snap(f64::NAN).is_nan());
    }

    #[test]
    fn test_snap_coarse_precision() {
        assert_eq!(Precision(2).snap(1.23456), 1.23);
        assert_eq!(Precision(0).snap(2.6), 3.0);
    }

    #[test]
    fn test_snap_huge_values_untouched() {
        let big = 1.0e300;
        assert_eq!(Precision::DEFAULT.snap(big), big);
    }
}
