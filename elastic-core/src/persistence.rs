//! Saving and reloading recorded runs.
//!
//! A run is stored as one YAML document holding the container and every
//! snapshot. Balls do not serialize their container, so loading re-attaches
//! all of them to a single shared instance.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::error::SimResult;
use crate::trajectory::Trajectory;

/// On-disk form of a recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRun {
    pub container: Container,
    pub trajectory: Trajectory,
}

impl SavedRun {
    /// Validates the container and re-attaches every ball to it.
    pub fn into_parts(self) -> SimResult<(Arc<Container>, Trajectory)> {
        self.container.validate()?;
        let container = Arc::new(self.container);
        let mut trajectory = self.trajectory;
        trajectory.relocate_all(&container);
        Ok((container, trajectory))
    }
}

pub fn to_yaml_string(container: &Container, trajectory: &Trajectory) -> SimResult<String> {
    let run = SavedRun {
        container: container.clone(),
        trajectory: trajectory.clone(),
    };
    Ok(serde_yaml::to_string(&run)?)
}

pub fn from_yaml_str(yaml: &str) -> SimResult<(Arc<Container>, Trajectory)> {
    let run: SavedRun = serde_yaml::from_str(yaml)?;
    run.into_parts()
}

/// Write `trajectory` and its container to `path`, replacing any existing file.
pub fn save_run<P: AsRef<Path>>(
    path: P,
    container: &Container,
    trajectory: &Trajectory,
) -> SimResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    let run = SavedRun {
        container: container.clone(),
        trajectory: trajectory.clone(),
    };
    serde_yaml::to_writer(&mut writer, &run)?;
    writer.flush()?;
    info!(
        "Saved {} snapshots to {}",
        trajectory.len(),
        path.display()
    );
    Ok(())
}

/// Read a run written by [`save_run`].
pub fn load_run<P: AsRef<Path>>(path: P) -> SimResult<(Arc<Container>, Trajectory)> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let run: SavedRun = serde_yaml::from_reader(reader)?;
    let (container, trajectory) = run.into_parts()?;
    info!(
        "Loaded {} snapshots from {}",
        trajectory.len(),
        path.display()
    );
    Ok((container, trajectory))
}
