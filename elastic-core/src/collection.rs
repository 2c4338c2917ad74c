use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::ball::Ball;
use crate::container::Container;
use crate::error::{SimError, SimResult};
use crate::types::Vec3;

/// Dense index of a ball inside a [`BallCollection`] (insertion order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BallId(pub usize);

/// Ordered set of mutually non-overlapping balls.
///
/// The non-overlap invariant is checked on insertion only. Once balls are
/// handed to the engine it is maintained by construction, since every event
/// stops the world at first contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BallCollection {
    balls: Vec<Ball>,
}

impl BallCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// First existing ball that `candidate` would overlap.
    pub fn find_overlap(&self, candidate: &Ball) -> Option<BallId> {
        self.balls
            .iter()
            .position(|b| b.overlaps(candidate))
            .map(BallId)
    }

    /// Adds a copy of `ball` unless it overlaps an existing member.
    ///
    /// Returns false on rejection and, when `warn_on_overlap` is set, logs the
    /// conflicting id.
    pub fn insert(&mut self, ball: &Ball, warn_on_overlap: bool) -> bool {
        match self.try_insert(ball) {
            Ok(_) => true,
            Err(SimError::Overlap { existing }) => {
                if warn_on_overlap {
                    warn!("{} overlaps with previous ball #{}", ball, existing.0);
                }
                false
            }
            Err(_) => false,
        }
    }

    /// Adds a copy of `ball`, or reports the member it overlaps.
    pub fn try_insert(&mut self, ball: &Ball) -> SimResult<BallId> {
        if let Some(existing) = self.find_overlap(ball) {
            return Err(SimError::Overlap { existing });
        }
        self.balls.push(ball.clone());
        Ok(BallId(self.balls.len() - 1))
    }

    /// Lenient bulk insertion: overlapping balls are skipped with a warning.
    ///
    /// Returns the number of balls actually inserted.
    pub fn insert_all<'a, I>(&mut self, balls: I) -> usize
    where
        I: IntoIterator<Item = &'a Ball>,
    {
        balls
            .into_iter()
            .filter(|ball| self.insert(ball, true))
            .count()
    }

    /// Strict bulk insertion: stops at the first overlapping ball.
    ///
    /// Balls before the offending one stay inserted.
    pub fn try_insert_all<'a, I>(&mut self, balls: I) -> SimResult<()>
    where
        I: IntoIterator<Item = &'a Ball>,
    {
        for ball in balls {
            self.try_insert(ball)?;
        }
        Ok(())
    }

    /// Appends every ball of `other`, failing on the first overlap.
    pub fn merge(&mut self, other: &BallCollection) -> SimResult<()> {
        self.try_insert_all(other.iter())
    }

    /// Moves every ball to `container` without re-checking the fit.
    pub fn relocate_all(&mut self, container: &Arc<Container>) {
        for ball in &mut self.balls {
            ball.relocate(container.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    pub fn get(&self, id: BallId) -> Option<&Ball> {
        self.balls.get(id.0)
    }

    pub fn get_mut(&mut self, id: BallId) -> Option<&mut Ball> {
        self.balls.get_mut(id.0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ball> {
        self.balls.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Ball> {
        self.balls.iter_mut()
    }

    pub fn as_slice(&self) -> &[Ball] {
        &self.balls
    }

    /// Two distinct balls borrowed mutably at once.
    ///
    /// # Panics
    ///
    /// Panics if `first == second` or either id is out of range.
    pub fn pair_mut(&mut self, first: BallId, second: BallId) -> (&mut Ball, &mut Ball) {
        assert_ne!(first, second, "a ball cannot collide with itself");
        if first.0 < second.0 {
            let (head, tail) = self.balls.split_at_mut(second.0);
            (&mut head[first.0], &mut tail[0])
        } else {
            let (head, tail) = self.balls.split_at_mut(first.0);
            (&mut tail[0], &mut head[second.0])
        }
    }

    pub fn total_kinetic_energy(&self) -> f64 {
        self.balls.iter().map(Ball::kinetic_energy).sum()
    }

    /// Total linear momentum; changes only on wall bounces.
    pub fn total_momentum(&self) -> Vec3 {
        self.balls
            .iter()
            .map(Ball::momentum)
            .fold(Vec3::ZERO, |acc, p| acc + p)
    }
}

impl<'a> IntoIterator for &'a BallCollection {
    type Item = &'a Ball;
    type IntoIter = std::slice::Iter<'a, Ball>;

    fn into_iter(self) -> Self::IntoIter {
        self.balls.iter()
    }
}
