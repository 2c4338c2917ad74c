//! Time-ordered snapshots produced by the engine.
//!
//! Snapshots are kept as a list sorted by time rather than a map keyed by a
//! float, so two events at the same instant (a corner hit followed by a pair
//! contact with `dt = 0`, say) both survive, in event order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collection::{BallCollection, BallId};
use crate::container::Container;
use crate::types::Vec3;

/// Deep copy of every ball at one simulation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub balls: BallCollection,
}

impl Snapshot {
    pub fn new(time: f64, balls: BallCollection) -> Self {
        Self { time, balls }
    }
}

/// Consumer of the snapshots emitted by a run.
///
/// Implement this to stream snapshots elsewhere instead of keeping the whole
/// trajectory in memory.
pub trait SnapshotSink {
    fn record(&mut self, snapshot: Snapshot);
}

impl SnapshotSink for Vec<Snapshot> {
    fn record(&mut self, snapshot: Snapshot) {
        self.push(snapshot);
    }
}

/// Interpolated state of one ball, as consumed by a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub id: BallId,
    pub position: Vec3,
    /// Velocity of the nearest preceding snapshot; never interpolated
    pub velocity: Vec3,
    pub color: Vec3,
    pub radius: f64,
}

/// Snapshots sorted by non-decreasing time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    snapshots: Vec<Snapshot>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `snapshot` after every snapshot at the same or earlier time.
    pub fn push(&mut self, snapshot: Snapshot) {
        let at = self
            .snapshots
            .partition_point(|s| s.time <= snapshot.time);
        self.snapshots.insert(at, snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn first(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.snapshots.iter().map(|s| s.time)
    }

    /// Drops every snapshot after `time`.
    pub fn truncate_after(&mut self, time: f64) {
        let keep = self.snapshots.partition_point(|s| s.time <= time);
        self.snapshots.truncate(keep);
    }

    /// Points every stored ball at `container`.
    pub fn relocate_all(&mut self, container: &Arc<Container>) {
        for snapshot in &mut self.snapshots {
            snapshot.balls.relocate_all(container);
        }
    }

    /// State of every ball at time `t`.
    ///
    /// Position and color are interpolated linearly between the bracketing
    /// snapshots. Velocity jumps at every event, so it is taken from the last
    /// snapshot at or before `t`. Returns `None` outside the recorded range.
    pub fn frame_at(&self, t: f64) -> Option<Vec<Frame>> {
        let first = self.snapshots.first()?;
        let last = self.snapshots.last()?;
        if !(t >= first.time && t <= last.time) {
            return None;
        }

        // Last snapshot with time <= t; ties resolve to the post-event state
        let prev_idx = self.snapshots.partition_point(|s| s.time <= t) - 1;
        let prev = &self.snapshots[prev_idx];
        let next = match self.snapshots.get(prev_idx + 1) {
            Some(next) if prev.time < t => next,
            _ => return Some(Self::exact_frames(prev)),
        };

        let w = (t - prev.time) / (next.time - prev.time);
        let frames = prev
            .balls
            .iter()
            .zip(next.balls.iter())
            .enumerate()
            .map(|(i, (a, b))| Frame {
                id: BallId(i),
                position: a.position.lerp(&b.position, w),
                velocity: a.velocity,
                color: a.color.lerp(&b.color, w),
                radius: a.radius,
            })
            .collect();
        Some(frames)
    }

    /// Frames on the regular grid `tmin, tmin + tstep, ...` strictly below `tmax`.
    pub fn frames(&self, tmin: f64, tmax: f64, tstep: f64) -> Vec<(f64, Vec<Frame>)> {
        if !(tstep > 0.0) {
            return Vec::new();
        }
        (0u64..)
            .map(|k| tmin + k as f64 * tstep)
            .take_while(|t| *t < tmax)
            .filter_map(|t| self.frame_at(t).map(|frame| (t, frame)))
            .collect()
    }

    fn exact_frames(snapshot: &Snapshot) -> Vec<Frame> {
        snapshot
            .balls
            .iter()
            .enumerate()
            .map(|(i, b)| Frame {
                id: BallId(i),
                position: b.position,
                velocity: b.velocity,
                color: b.color,
                radius: b.radius,
            })
            .collect()
    }
}

impl SnapshotSink for Trajectory {
    fn record(&mut self, snapshot: Snapshot) {
        self.push(snapshot);
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}
