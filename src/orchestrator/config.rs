// src/orchestrator/config.rs

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::bus::BusSettings;
use crate::config::{default_owner_org, ConfigFile, RepositorySection};
use crate::errors::{PropagatorError, Result};
use crate::types::DatatypeId;

/// How to launch the simulator for a run.
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    pub program: String,
    /// Argument template, see [`crate::config::validate::SIMULATOR_PLACEHOLDERS`].
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub poll_interval: Duration,
    pub progress_pattern: Option<Regex>,
}

/// Immutable settings handed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Absolute parent of the run directories.
    pub work_dir: PathBuf,
    pub simulator: SimulatorSettings,
    pub default_datatype: DatatypeId,
    pub default_run_length: chrono::Duration,
    pub default_cutoff: f64,
    pub cutoff_tolerance: f64,
    pub bus: BusSettings,
    pub owner_org: String,
}

impl OrchestratorConfig {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let work_dir = std::path::absolute(&cfg.paths.work_dir)?;
        let cwd = match &cfg.simulator.cwd {
            Some(dir) => std::path::absolute(dir)?,
            None => std::env::current_dir()?,
        };
        let progress_pattern = cfg
            .simulator
            .progress_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| PropagatorError::ConfigError(format!("[simulator].progress_pattern: {e}")))?;
        let owner_org = match &cfg.repository {
            RepositorySection::Http { owner_org, .. } => owner_org.clone(),
            RepositorySection::Local { .. } => default_owner_org(),
        };

        Ok(Self {
            work_dir,
            simulator: SimulatorSettings {
                program: cfg.simulator.program.clone(),
                args: cfg.simulator.args.clone(),
                cwd,
                poll_interval: Duration::from_millis(cfg.simulator.poll_interval_ms),
                progress_pattern,
            },
            default_datatype: DatatypeId(cfg.run.default_datatype),
            default_run_length: chrono::Duration::hours(i64::from(cfg.run.default_run_length_hours)),
            default_cutoff: cfg.run.default_probability_cutoff,
            cutoff_tolerance: cfg.run.cutoff_tolerance,
            bus: BusSettings {
                exchange: cfg.bus.exchange.clone(),
                app_id: cfg.bus.app_id.clone(),
                user_id: cfg.bus.user_id.clone(),
            },
            owner_org,
        })
    }
}
