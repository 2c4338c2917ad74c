//! Error taxonomy for construction, insertion, sampling, and I/O failures.
//!
//! Degenerate numeric outcomes (parallel motion, grazing contact, roots in the
//! past) are not errors: they come back as `f64::INFINITY` collision times.

use crate::collection::BallId;
use crate::types::Vec3;

/// Error type for every fallible operation in the crate.
#[derive(Debug)]
pub enum SimError {
    /// Container bounds or ball parameters that cannot describe a real body.
    InvalidGeometry(String),
    /// A ball that does not fit inside its container at construction.
    OutsideContainer { position: Vec3, radius: f64 },
    /// A ball that overlaps an existing member of a collection.
    Overlap { existing: BallId },
    /// A container variant asked for a capability it does not implement.
    UnsupportedGeometry(&'static str),
    /// The random population gave up after too many consecutive rejections.
    SamplingExhausted {
        attempts: usize,
        placed: usize,
        requested: usize,
    },
    IoError(std::io::Error),
    ParseError(serde_yaml::Error),
    NotFound(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::InvalidGeometry(msg) => write!(f, "Invalid geometry: {}", msg),
            SimError::OutsideContainer { position, radius } => write!(
                f,
                "Ball at {} with radius {} does not fit in its container",
                position, radius
            ),
            SimError::Overlap { existing } => {
                write!(f, "Ball overlaps existing ball #{}", existing.0)
            }
            SimError::UnsupportedGeometry(what) => write!(f, "Unsupported geometry: {}", what),
            SimError::SamplingExhausted {
                attempts,
                placed,
                requested,
            } => write!(
                f,
                "Too many attempts ({}) to insert ball within container ({} of {} placed)",
                attempts, placed, requested
            ),
            SimError::IoError(e) => write!(f, "IO error: {}", e),
            SimError::ParseError(e) => write!(f, "YAML parse error: {}", e),
            SimError::NotFound(name) => write!(f, "Not found: {}", name),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(e) => Some(e),
            SimError::ParseError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::IoError(err)
    }
}

impl From<serde_yaml::Error> for SimError {
    fn from(err: serde_yaml::Error) -> Self {
        SimError::ParseError(err)
    }
}

pub type SimResult<T> = Result<T, SimError>;
