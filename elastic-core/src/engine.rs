//! Discrete-event scheduler.
//!
//! Instead of stepping time by a fixed `dt`, the engine jumps straight to the
//! next collision. Every iteration is one atomic transaction:
//!
//! 1. **Detect**: wall time for every ball, contact time for every pair.
//! 2. **Select**: earliest wall time vs earliest pair time; walls win ties.
//! 3. **Advance**: every ball moves to the event instant.
//! 4. **Resolve**: reflect the wall-hitting balls, or bounce the pair.
//! 5. **Record**: a deep copy of all balls is handed to the snapshot sink.
//!
//! ```text
//!   t = 0         t1 (wall)        t2 (pair)       t3 (wall, corner)
//!   ●──────────────|────────────────|────────────────|──────▶
//!   snapshot    snapshot         snapshot         snapshot
//! ```
//!
//! When neither a wall nor a pair can ever be reached again the run stops
//! early: the system is quiescent.

use log::{debug, info};
use rayon::prelude::*;

use crate::ball::Ball;
use crate::collection::{BallCollection, BallId};
use crate::config::SimulationConfig;
use crate::container::WallCollision;
use crate::error::SimResult;
use crate::trajectory::{Snapshot, SnapshotSink};
use crate::types::Precision;

/// The collision that fires next.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One or more balls reach a wall at the same instant.
    Wall { time: f64, balls: Vec<BallId> },
    /// Two balls touch.
    Pair {
        time: f64,
        first: BallId,
        second: BallId,
    },
}

impl Event {
    /// Time from the current state until the event.
    pub fn time(&self) -> f64 {
        match self {
            Event::Wall { time, .. } | Event::Pair { time, .. } => *time,
        }
    }
}

/// Why a run returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Simulated time reached the requested horizon.
    Horizon,
    /// No wall or pair collision can ever happen again.
    Quiescent,
    /// `SimulationConfig::max_events` was hit.
    EventLimit,
}

/// Summary of one call to [`Simulation::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub events: u64,
    pub wall_events: u64,
    pub pair_events: u64,
    pub final_time: f64,
    pub stop: StopReason,
}

/// Progress passed to the reporting callback after every event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub time: f64,
    pub target: f64,
    pub events: u64,
}

/// Everything detection learns in one pass.
struct Scan {
    walls: Vec<WallCollision>,
    wall_time: f64,
    pair: Option<(f64, usize, usize)>,
}

impl Scan {
    fn pair_time(&self) -> f64 {
        self.pair.map_or(f64::INFINITY, |(t, _, _)| t)
    }

    fn event(&self) -> Option<Event> {
        let pair_time = self.pair_time();
        if self.wall_time.is_infinite() && pair_time.is_infinite() {
            return None;
        }
        if self.wall_time <= pair_time {
            let balls = self
                .walls
                .iter()
                .enumerate()
                .filter(|(_, w)| w.time == self.wall_time)
                .map(|(i, _)| BallId(i))
                .collect();
            return Some(Event::Wall {
                time: self.wall_time,
                balls,
            });
        }
        self.pair.map(|(time, i, j)| Event::Pair {
            time,
            first: BallId(i),
            second: BallId(j),
        })
    }
}

/// Event-driven simulation of the balls in one collection.
pub struct Simulation<'a> {
    balls: BallCollection,
    time: f64,
    config: SimulationConfig,
    started: bool,
    progress: Option<Box<dyn FnMut(&Progress) + 'a>>,
}

impl<'a> Simulation<'a> {
    /// A fresh simulation at `t = 0`.
    pub fn new(balls: BallCollection, config: SimulationConfig) -> Self {
        Self {
            balls,
            time: 0.0,
            config,
            started: false,
            progress: None,
        }
    }

    /// Continue from a previously recorded snapshot.
    ///
    /// The snapshot itself is not recorded again.
    pub fn resume(snapshot: &Snapshot, config: SimulationConfig) -> Self {
        Self {
            balls: snapshot.balls.clone(),
            time: snapshot.time,
            config,
            started: true,
            progress: None,
        }
    }

    /// Install a callback invoked after every event.
    pub fn with_progress(mut self, callback: impl FnMut(&Progress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn balls(&self) -> &BallCollection {
        &self.balls
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn into_balls(self) -> BallCollection {
        self.balls
    }

    /// The event that would fire next, without changing any state.
    ///
    /// `Ok(None)` means no collision can ever happen again.
    pub fn next_event(&self) -> SimResult<Option<Event>> {
        Ok(self.scan()?.event())
    }

    /// Detect, advance, and resolve exactly one event.
    ///
    /// Returns `Ok(None)` without touching the state when the system is
    /// quiescent. Nothing is recorded; see [`Simulation::run`].
    pub fn step(&mut self) -> SimResult<Option<Event>> {
        let scan = self.scan()?;
        let Some(event) = scan.event() else {
            return Ok(None);
        };
        let precision = self.config.precision;

        match &event {
            Event::Wall { time, .. } => {
                for (ball, hit) in self.balls.iter_mut().zip(scan.walls) {
                    if hit.time == *time {
                        *ball = hit.ball;
                    } else {
                        ball.integrate_snapped(*time, precision);
                    }
                }
            }
            Event::Pair {
                time,
                first,
                second,
            } => {
                for ball in self.balls.iter_mut() {
                    ball.integrate_snapped(*time, precision);
                }
                let (a, b) = self.balls.pair_mut(*first, *second);
                a.resolve_collision_snapped(b, precision);
            }
        }

        self.time = precision.snap(self.time + event.time());
        debug!("t={} {:?}", self.time, event);
        Ok(Some(event))
    }

    /// Advance by `duration` of simulated time, recording a snapshot after
    /// every event.
    ///
    /// The first run of a fresh simulation also records the initial state.
    /// The last event may carry the time past the horizon; the run stops as
    /// soon as time is no longer below it. Any error from a container (an
    /// unsupported shape, typically) aborts the run and is returned as-is.
    pub fn run(&mut self, duration: f64, sink: &mut dyn SnapshotSink) -> SimResult<RunReport> {
        if !self.started {
            sink.record(Snapshot::new(self.time, self.balls.clone()));
            self.started = true;
        }

        let target = self.time + duration;
        info!(
            "Running {} balls from t={} to t={}",
            self.balls.len(),
            self.time,
            target
        );

        let mut events = 0;
        let mut wall_events = 0;
        let mut pair_events = 0;

        let stop = loop {
            if self.time >= target {
                break StopReason::Horizon;
            }
            if self.config.max_events.is_some_and(|limit| events >= limit) {
                break StopReason::EventLimit;
            }

            match self.step()? {
                None => break StopReason::Quiescent,
                Some(event) => {
                    events += 1;
                    match event {
                        Event::Wall { .. } => wall_events += 1,
                        Event::Pair { .. } => pair_events += 1,
                    }
                    sink.record(Snapshot::new(self.time, self.balls.clone()));
                    if let Some(callback) = self.progress.as_mut() {
                        callback(&Progress {
                            time: self.time,
                            target,
                            events,
                        });
                    }
                }
            }
        };

        info!(
            "Stopped at t={} after {} events ({} wall, {} pair): {:?}",
            self.time, events, wall_events, pair_events, stop
        );
        Ok(RunReport {
            events,
            wall_events,
            pair_events,
            final_time: self.time,
            stop,
        })
    }

    fn scan(&self) -> SimResult<Scan> {
        let walls = self.scan_walls()?;
        let wall_time = walls
            .iter()
            .map(|w| w.time)
            .fold(f64::INFINITY, f64::min);
        Ok(Scan {
            walls,
            wall_time,
            pair: self.scan_pairs(),
        })
    }

    fn scan_walls(&self) -> SimResult<Vec<WallCollision>> {
        let precision = self.config.precision;
        let balls = self.balls.as_slice();
        if self.config.parallel {
            balls
                .par_iter()
                .map(|b| b.wall_collision(precision))
                .collect()
        } else {
            balls.iter().map(|b| b.wall_collision(precision)).collect()
        }
    }

    /// Earliest finite pair time as `(t, i, j)` with `i < j`.
    ///
    /// Ties go to the smallest `(i, j)` in row-major order, whichever way the
    /// rows were computed.
    fn scan_pairs(&self) -> Option<(f64, usize, usize)> {
        let balls = self.balls.as_slice();
        let n = balls.len();
        if n < 2 {
            return None;
        }

        let precision = self.config.precision;
        let row = |i: usize| earliest_in_row(balls, i, precision);

        let rows: Vec<Option<(f64, usize, usize)>> = if self.config.parallel {
            (0..n - 1).into_par_iter().map(row).collect()
        } else {
            (0..n - 1).map(row).collect()
        };

        rows.into_iter().flatten().fold(None, |best, candidate| match best {
            Some((t, _, _)) if t <= candidate.0 => best,
            _ => Some(candidate),
        })
    }
}

fn earliest_in_row(balls: &[Ball], i: usize, precision: Precision) -> Option<(f64, usize, usize)> {
    let mut best: Option<(f64, usize, usize)> = None;
    for j in (i + 1)..balls.len() {
        let t = balls[i].time_to_collision_snapped(&balls[j], precision);
        if !t.is_finite() {
            continue;
        }
        match best {
            Some((bt, _, _)) if bt <= t => {}
            _ => best = Some((t, i, j)),
        }
    }
    best
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Boundary, Container, Cuboid, VerticalCylinder};
    use crate::error::SimError;
    use crate::generation::{random_balls_in_container, GeneratorParams};
    use crate::trajectory::Trajectory;
    use crate::types::Vec3;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn container(half: f64) -> Arc<Container> {
        Arc::new(Cuboid::centered_cube(half).unwrap().into())
    }

    fn collection(
        container: &Arc<Container>,
        specs: &[([f64; 3], [f64; 3], f64)],
    ) -> BallCollection {
        let mut balls = BallCollection::new();
        for (p, v, r) in specs {
            let ball = Ball::new(
                Vec3::new(p[0], p[1], p[2]),
                Vec3::new(v[0], v[1], v[2]),
                *r,
                1.0,
                Vec3::new(1.0, 0.0, 0.0),
                container.clone(),
            )
            .unwrap();
            balls.try_insert(&ball).unwrap();
        }
        balls
    }

    fn head_on() -> BallCollection {
        collection(
            &container(1000.0),
            &[
                ([-3.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0),
                ([3.0, 0.0, 0.0], [-1.0, 0.0, 0.0], 1.0),
            ],
        )
    }

    #[test]
    fn test_head_on_first_event_is_pair() {
        let sim = Simulation::new(head_on(), SimulationConfig::default());
        let event = sim.next_event().unwrap().unwrap();
        assert_eq!(
            event,
            Event::Pair {
                time: 2.0,
                first: BallId(0),
                second: BallId(1),
            }
        );
    }

    #[test]
    fn test_head_on_exchange() {
        let mut sim = Simulation::new(head_on(), SimulationConfig::default());
        sim.step().unwrap();

        assert_eq!(sim.time(), 2.0);
        let balls = sim.balls().as_slice();
        assert_eq!(balls[0].position, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(balls[1].position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(balls[0].velocity, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(balls[1].velocity, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_wall_event_moves_everyone() {
        let walls = Arc::new(Container::from(
            Cuboid::new(-100.0, 5.0, -100.0, 100.0, -100.0, 100.0).unwrap(),
        ));
        let balls = collection(
            &walls,
            &[
                ([4.0, 0.0, 0.0], [0.2, 0.0, 0.0], 0.5),
                ([0.0, 10.0, 0.0], [0.0, 1.0, 0.0], 0.5),
            ],
        );
        let mut sim = Simulation::new(balls, SimulationConfig::default());

        let event = sim.step().unwrap().unwrap();

        assert_eq!(
            event,
            Event::Wall {
                time: 2.5,
                balls: vec![BallId(0)]
            }
        );
        let balls = sim.balls().as_slice();
        assert_relative_eq!(balls[0].position.x, 4.5);
        assert_relative_eq!(balls[0].velocity.x, -0.2);
        assert_relative_eq!(balls[1].position.y, 12.5);
        assert_relative_eq!(balls[1].velocity.y, 1.0);
    }

    #[test]
    fn test_simultaneous_wall_hits_reflect_all() {
        let c = container(5.0);
        let balls = collection(
            &c,
            &[
                ([3.5, 0.0, 0.0], [1.0, 0.0, 0.0], 0.5),
                ([0.0, -3.5, 0.0], [0.0, -1.0, 0.0], 0.5),
            ],
        );
        let mut sim = Simulation::new(balls, SimulationConfig::default());

        let event = sim.step().unwrap().unwrap();

        assert_eq!(
            event,
            Event::Wall {
                time: 1.0,
                balls: vec![BallId(0), BallId(1)]
            }
        );
        let balls = sim.balls().as_slice();
        assert_eq!(balls[0].velocity.x, -1.0);
        assert_eq!(balls[1].velocity.y, 1.0);
    }

    #[test]
    fn test_tie_prefers_wall() {
        // Pair contact and wall contact both at t = 1
        let c = container(5.0);
        let balls = collection(
            &c,
            &[
                ([-2.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.5),
                ([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 0.5),
                ([0.0, 3.5, 0.0], [0.0, 1.0, 0.0], 0.5),
            ],
        );
        let sim = Simulation::new(balls, SimulationConfig::default());

        match sim.next_event().unwrap().unwrap() {
            Event::Wall { time, balls } => {
                assert_eq!(time, 1.0);
                assert_eq!(balls, vec![BallId(2)]);
            }
            other => panic!("Expected wall event, got {:?}", other),
        }
    }

    #[test]
    fn test_pair_tie_goes_to_lowest_ids() {
        // Two independent head-on pairs colliding at the same instant
        let c = container(100.0);
        let balls = collection(
            &c,
            &[
                ([-3.0, 10.0, 0.0], [1.0, 0.0, 0.0], 1.0),
                ([-3.0, -10.0, 0.0], [1.0, 0.0, 0.0], 1.0),
                ([3.0, 10.0, 0.0], [-1.0, 0.0, 0.0], 1.0),
                ([3.0, -10.0, 0.0], [-1.0, 0.0, 0.0], 1.0),
            ],
        );
        let sim = Simulation::new(balls, SimulationConfig::default());

        assert_eq!(
            sim.next_event().unwrap().unwrap(),
            Event::Pair {
                time: 2.0,
                first: BallId(0),
                second: BallId(2),
            }
        );
    }

    #[test]
    fn test_quiescent_system_stops() {
        // At rest: nothing will ever happen
        let c = container(5.0);
        let balls = collection(
            &c,
            &[
                ([-2.0, 0.0, 0.0], [0.0; 3], 0.5),
                ([2.0, 0.0, 0.0], [0.0; 3], 0.5),
            ],
        );
        let mut sim = Simulation::new(balls, SimulationConfig::default());
        let mut trajectory = Trajectory::new();

        let report = sim.run(100.0, &mut trajectory).unwrap();

        assert_eq!(report.stop, StopReason::Quiescent);
        assert_eq!(report.events, 0);
        assert_eq!(trajectory.len(), 1); // the initial state only
    }

    #[test]
    fn test_run_records_initial_and_event_snapshots() {
        let mut sim = Simulation::new(head_on(), SimulationConfig::default());
        let mut trajectory = Trajectory::new();

        let report = sim.run(10.0, &mut trajectory).unwrap();

        // The bounce at t=2, then both balls reach opposite walls together,
        // which carries the run well past its horizon
        assert_eq!(report.pair_events, 1);
        assert_eq!(report.wall_events, 1);
        assert_eq!(report.stop, StopReason::Horizon);
        let times: Vec<f64> = trajectory.times().collect();
        assert_eq!(times, vec![0.0, 2.0, 1000.0]);
    }

    #[test]
    fn test_run_stops_at_horizon() {
        let c = container(5.0);
        let balls = collection(&c, &[([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.5)]);
        let mut sim = Simulation::new(balls, SimulationConfig::default());
        let mut snapshots: Vec<Snapshot> = Vec::new();

        let report = sim.run(20.0, &mut snapshots).unwrap();

        // Bounces at 4.5, 13.5, 22.5: the third crosses the horizon
        assert_eq!(report.stop, StopReason::Horizon);
        assert_eq!(report.wall_events, 3);
        assert_eq!(report.final_time, 22.5);
        assert!(snapshots.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_run_resumes_from_current_time() {
        let c = container(5.0);
        let balls = collection(&c, &[([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.5)]);
        let mut sim = Simulation::new(balls, SimulationConfig::default());
        let mut trajectory = Trajectory::new();

        sim.run(5.0, &mut trajectory).unwrap();
        let first_len = trajectory.len();
        sim.run(10.0, &mut trajectory).unwrap();

        // 0, 4.5, 13.5; then 22.5, 31.5 with no second initial snapshot
        assert_eq!(first_len, 3);
        assert_eq!(trajectory.len(), 5);
        assert_eq!(trajectory.last().unwrap().time, 31.5);
    }

    #[test]
    fn test_resume_from_snapshot() {
        let mut sim = Simulation::new(head_on(), SimulationConfig::default());
        let mut trajectory = Trajectory::new();
        sim.step().unwrap();
        trajectory.push(Snapshot::new(sim.time(), sim.balls().clone()));

        let resumed = Simulation::resume(trajectory.last().unwrap(), SimulationConfig::default());
        assert_eq!(resumed.time(), 2.0);
        assert_eq!(
            resumed.next_event().unwrap(),
            Some(Event::Wall {
                time: 998.0,
                balls: vec![BallId(0), BallId(1)]
            })
        );
    }

    #[test]
    fn test_event_limit() {
        let c = container(5.0);
        let balls = collection(&c, &[([0.0, 0.0, 0.0], [1.0, 0.3, 0.0], 0.5)]);
        let config = SimulationConfig {
            max_events: Some(5),
            ..Default::default()
        };
        let mut sim = Simulation::new(balls, config);
        let mut trajectory = Trajectory::new();

        let report = sim.run(1.0e6, &mut trajectory).unwrap();

        assert_eq!(report.stop, StopReason::EventLimit);
        assert_eq!(report.events, 5);
        assert_eq!(trajectory.len(), 6);
    }

    #[test]
    fn test_cylinder_aborts_run() {
        let cylinder: Arc<Container> = Arc::new(VerticalCylinder::default().into());
        let balls = collection(&cylinder, &[([0.0, 0.0, 5.0], [1.0, 0.0, 0.0], 0.5)]);
        let mut sim = Simulation::new(balls, SimulationConfig::default());
        let mut trajectory = Trajectory::new();

        let result = sim.run(10.0, &mut trajectory);

        assert!(matches!(result, Err(SimError::UnsupportedGeometry(_))));
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_progress_callback_sees_every_event() {
        let c = container(5.0);
        let balls = collection(&c, &[([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.5)]);
        let mut seen = Vec::new();
        {
            let mut sim = Simulation::new(balls, SimulationConfig::default())
                .with_progress(|p: &Progress| seen.push(p.events));
            let mut trajectory = Trajectory::new();
            sim.run(20.0, &mut trajectory).unwrap();
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_gas_conserves_energy_and_stays_inside() {
        let c = container(5.0);
        let params = GeneratorParams {
            count: 30,
            speed: 1.0,
            seed: 11,
            ..Default::default()
        };
        let balls = random_balls_in_container(&c, &params).unwrap();
        let e0 = balls.total_kinetic_energy();

        let mut sim = Simulation::new(balls, SimulationConfig::default());
        let mut trajectory = Trajectory::new();
        let report = sim.run(20.0, &mut trajectory).unwrap();

        assert!(report.pair_events > 0);
        assert_relative_eq!(sim.balls().total_kinetic_energy(), e0, max_relative = 1e-8);
        for snapshot in &trajectory {
            let all = snapshot.balls.as_slice();
            for (i, a) in all.iter().enumerate() {
                assert!(
                    c.fits(&a.position, a.radius - 1e-9),
                    "ball {} escaped at t={}",
                    i,
                    snapshot.time
                );
                for b in &all[i + 1..] {
                    assert!(a.distance_to(b) >= a.radius + b.radius - 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let c = container(5.0);
        let params = GeneratorParams {
            count: 25,
            speed: 0.7,
            seed: 21,
            ..Default::default()
        };
        let balls = random_balls_in_container(&c, &params).unwrap();

        let mut sequential = Simulation::new(balls.clone(), SimulationConfig::default());
        let mut parallel = Simulation::new(
            balls,
            SimulationConfig {
                parallel: true,
                ..Default::default()
            },
        );
        let mut a = Trajectory::new();
        let mut b = Trajectory::new();
        sequential.run(15.0, &mut a).unwrap();
        parallel.run(15.0, &mut b).unwrap();

        assert_eq!(a, b);
    }
}
