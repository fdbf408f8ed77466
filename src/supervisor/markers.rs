// src/supervisor/markers.rs

//! Marker files recording a simulation's lifecycle inside its run directory.
//!
//! `running` exists while a supervisor owns the process, `completed` after a
//! clean exit, `error` (holding a description) after any failure. `error`
//! wins over the other two.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tracing::{debug, warn};

use crate::fs::FileSystem;

pub const RUNNING_MARKER: &str = "running";
pub const COMPLETED_MARKER: &str = "completed";
pub const ERROR_MARKER: &str = "error";

const ABANDONED: &str = "supervisor stopped before the simulation finished";

/// Lifecycle state derived from the markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Absent,
    Running,
    Completed,
    Errored(String),
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

#[derive(Debug, Clone)]
pub struct MarkerStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl MarkerStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self { fs, dir: dir.into() }
    }

    fn marker(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fs.exists(&self.marker(name))
    }

    pub fn state(&self) -> Result<ProcessState> {
        if let Some(detail) = self.error_detail()? {
            return Ok(ProcessState::Errored(detail));
        }
        if self.has(RUNNING_MARKER) {
            Ok(ProcessState::Running)
        } else if self.has(COMPLETED_MARKER) {
            Ok(ProcessState::Completed)
        } else {
            Ok(ProcessState::Absent)
        }
    }

    pub fn error_detail(&self) -> Result<Option<String>> {
        let path = self.marker(ERROR_MARKER);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        Ok(Some(self.fs.read_to_string(&path)?.trim().to_string()))
    }

    /// Take ownership of the run directory: drop stale terminal markers and
    /// write `running`.
    pub fn begin(&self) -> Result<RunningGuard> {
        self.fs.create_dir_all(&self.dir)?;
        for stale in [ERROR_MARKER, COMPLETED_MARKER] {
            let path = self.marker(stale);
            if self.fs.exists(&path) {
                debug!(path = ?path, "removing stale marker");
                self.fs.remove_file(&path)?;
            }
        }
        let stamp = Local::now().to_rfc3339();
        self.fs.write(&self.marker(RUNNING_MARKER), stamp.as_bytes())?;
        Ok(RunningGuard {
            store: self.clone(),
            armed: true,
        })
    }

    fn finish_completed(&self) -> Result<()> {
        self.fs
            .rename(&self.marker(RUNNING_MARKER), &self.marker(COMPLETED_MARKER))
    }

    fn finish_errored(&self, detail: &str) -> Result<()> {
        // `error` must be visible before `running` disappears.
        self.fs.write(&self.marker(ERROR_MARKER), detail.as_bytes())?;
        let running = self.marker(RUNNING_MARKER);
        if self.fs.exists(&running) {
            self.fs.remove_file(&running)?;
        }
        Ok(())
    }
}

/// Holds the `running` marker. Dropping an armed guard records an error and
/// releases the marker, so watchers never wait on a dead supervisor.
#[derive(Debug)]
pub struct RunningGuard {
    store: MarkerStore,
    armed: bool,
}

impl RunningGuard {
    pub fn complete(mut self) -> Result<()> {
        self.armed = false;
        self.store.finish_completed()
    }

    pub fn fail(mut self, detail: &str) -> Result<()> {
        self.armed = false;
        self.store.finish_errored(detail)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(dir = ?self.store.dir, "releasing running marker of an abandoned simulation");
        if let Err(err) = self.store.finish_errored(ABANDONED) {
            warn!(dir = ?self.store.dir, error = %err, "failed to release running marker");
        }
    }
}
