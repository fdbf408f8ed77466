// src/supervisor/mod.rs

//! Simulator process supervision.
//!
//! [`Supervisor::start`] either launches the simulator (writing and
//! releasing the lifecycle markers) or, when another supervisor already owns
//! the run directory, waits for that run's markers to settle. Both paths
//! end in exactly one [`ProcessOutcome`].

pub mod exit_code;
pub mod markers;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{PropagatorError, Result};
use crate::fs::FileSystem;

pub use exit_code::{describe_exit, SimulatorExit};
pub use markers::{MarkerStore, ProcessState, RunningGuard, COMPLETED_MARKER, ERROR_MARKER, RUNNING_MARKER};

/// What to run and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory of the child process.
    pub cwd: PathBuf,
    /// Directory holding the lifecycle markers.
    pub run_dir: PathBuf,
}

/// Terminal result of one simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorMode {
    /// Spawn the simulator and own the markers.
    Launch,
    /// Another supervisor owns the run; only observe the markers.
    WatchOnly,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    fs: Arc<dyn FileSystem>,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(fs: Arc<dyn FileSystem>, poll_interval: Duration) -> Self {
        Self { fs, poll_interval }
    }

    pub fn markers(&self, spec: &ProcessSpec) -> MarkerStore {
        MarkerStore::new(self.fs.clone(), spec.run_dir.clone())
    }

    pub fn mode(&self, spec: &ProcessSpec) -> SupervisorMode {
        let markers = self.markers(spec);
        if markers.has(RUNNING_MARKER) || markers.has(COMPLETED_MARKER) {
            SupervisorMode::WatchOnly
        } else {
            SupervisorMode::Launch
        }
    }

    /// Run (or observe) the simulation to its end.
    ///
    /// Every stdout line is forwarded to `progress` when given. `Err` is
    /// returned only when the process could not be started or its output
    /// stream broke; the `error` marker is written in that case too.
    pub async fn start(
        &self,
        spec: &ProcessSpec,
        progress: Option<mpsc::Sender<String>>,
    ) -> Result<ProcessOutcome> {
        match self.mode(spec) {
            SupervisorMode::WatchOnly => {
                info!(run_dir = ?spec.run_dir, "simulation already in progress, watching markers");
                self.watch(spec).await
            }
            SupervisorMode::Launch => self.launch(spec, progress).await,
        }
    }

    async fn watch(&self, spec: &ProcessSpec) -> Result<ProcessOutcome> {
        let markers = self.markers(spec);
        while markers.has(RUNNING_MARKER) {
            tokio::time::sleep(self.poll_interval).await;
        }
        match markers.error_detail()? {
            Some(detail) => {
                warn!(run_dir = ?spec.run_dir, detail = %detail, "watched simulation failed");
                Ok(ProcessOutcome::Failed(detail))
            }
            None => {
                info!(run_dir = ?spec.run_dir, "watched simulation completed");
                Ok(ProcessOutcome::Completed)
            }
        }
    }

    async fn launch(
        &self,
        spec: &ProcessSpec,
        progress: Option<mpsc::Sender<String>>,
    ) -> Result<ProcessOutcome> {
        let guard = self.markers(spec).begin()?;

        info!(
            program = %spec.program,
            args = ?spec.args,
            cwd = ?spec.cwd,
            "starting simulator"
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                let detail = format!("failed to start '{}': {err}", spec.program);
                return Err(abort(guard, detail));
            }
        };

        let stderr_task = child.stderr.take().map(collect_stderr);
        let Some(stdout) = child.stdout.take() else {
            return Err(abort(guard, "simulator stdout was not captured".to_string()));
        };

        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    info!(run_dir = ?spec.run_dir, "{line}");
                    if let Some(tx) = &progress {
                        // A dropped receiver only means nobody wants progress.
                        let _ = tx.send(line).await;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = child.start_kill();
                    let detail = format!("reading simulator output failed: {err}");
                    return Err(abort(guard, detail));
                }
            }
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(err) => {
                let detail = format!("waiting for simulator failed: {err}");
                return Err(abort(guard, detail));
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            guard.complete()?;
            info!(run_dir = ?spec.run_dir, "simulation completed");
            return Ok(ProcessOutcome::Completed);
        }

        let description = describe_exit(status.code());
        warn!(
            run_dir = ?spec.run_dir,
            exit_code = ?status.code(),
            stderr = %stderr.trim(),
            "simulation failed"
        );
        guard.fail(&description)?;
        Ok(ProcessOutcome::Failed(description))
    }
}

/// Record a launch failure in the markers and turn it into the caller's
/// error.
fn abort(guard: RunningGuard, detail: String) -> PropagatorError {
    error!(detail = %detail, "simulator launch failed");
    if let Err(err) = guard.fail(&detail) {
        warn!(error = %err, "failed to record launch failure");
    }
    PropagatorError::Launch(detail)
}

fn collect_stderr<R>(stderr: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stderr = %line, "simulator stderr");
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn spec() -> ProcessSpec {
        ProcessSpec {
            program: "unused".into(),
            args: vec![],
            cwd: PathBuf::from("/work"),
            run_dir: PathBuf::from("/work/r1"),
        }
    }

    fn supervisor(fs: &MockFileSystem) -> Supervisor {
        Supervisor::new(Arc::new(fs.clone()), Duration::from_millis(5))
    }

    #[test]
    fn mode_depends_on_markers() {
        let fs = MockFileSystem::new();
        let sup = supervisor(&fs);
        assert_eq!(sup.mode(&spec()), SupervisorMode::Launch);

        fs.add_file("/work/r1/error", "old");
        assert_eq!(sup.mode(&spec()), SupervisorMode::Launch);

        fs.add_file("/work/r1/completed", "");
        assert_eq!(sup.mode(&spec()), SupervisorMode::WatchOnly);
    }

    #[tokio::test]
    async fn watch_only_on_completed_returns_immediately() {
        let fs = MockFileSystem::new();
        fs.add_file("/work/r1/completed", "");
        let outcome = supervisor(&fs).start(&spec(), None).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Completed);
    }

    #[tokio::test]
    async fn watch_only_reports_error_written_by_owner() {
        let fs = MockFileSystem::new();
        fs.add_file("/work/r1/running", "");
        let sup = supervisor(&fs);

        let owner = fs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            owner.add_file("/work/r1/error", "Error running simulation: DOMAIN_ERROR");
            owner.remove_file(std::path::Path::new("/work/r1/running")).unwrap();
        });

        let outcome = sup.start(&spec(), None).await.unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Failed("Error running simulation: DOMAIN_ERROR".to_string())
        );
    }
}
