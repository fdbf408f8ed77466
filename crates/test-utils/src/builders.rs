#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use propagator_runner::bus::BusSettings;
use propagator_runner::config::{
    BusSection, ConfigFile, InboxSection, PathsSection, PostprocessSection, RawConfigFile,
    RepositorySection, RunSection, SimulatorSection,
};
use propagator_runner::orchestrator::{OrchestratorConfig, SimulatorSettings};
use propagator_runner::types::DatatypeId;
use regex::Regex;

/// Builder for a validated `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            config: RawConfigFile {
                paths: PathsSection::default(),
                simulator: SimulatorSection {
                    program: program.to_string(),
                    args: propagator_runner::config::model::default_simulator_args(),
                    cwd: None,
                    poll_interval_ms: 500,
                    progress_pattern: None,
                },
                run: RunSection::default(),
                bus: BusSection::default(),
                inbox: InboxSection::default(),
                repository: RepositorySection::default(),
                postprocess: PostprocessSection::default(),
            },
        }
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.work_dir = dir.into();
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.config.simulator.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn progress_pattern(mut self, pattern: &str) -> Self {
        self.config.simulator.progress_pattern = Some(pattern.to_string());
        self
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.config.run.default_probability_cutoff = cutoff;
        self
    }

    pub fn repository(mut self, repository: RepositorySection) -> Self {
        self.config.repository = repository;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `OrchestratorConfig` running `sh -c <script>` as the
/// simulator.
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            config: OrchestratorConfig {
                work_dir: work_dir.to_path_buf(),
                simulator: SimulatorSettings {
                    program: "sh".to_string(),
                    args: vec!["-c".to_string(), "exit 0".to_string()],
                    cwd: work_dir.to_path_buf(),
                    poll_interval: Duration::from_millis(20),
                    progress_pattern: None,
                },
                default_datatype: DatatypeId::ALL,
                default_run_length: chrono::Duration::hours(72),
                default_cutoff: 0.75,
                cutoff_tolerance: 0.0,
                bus: BusSettings {
                    exchange: "safers.b2b".to_string(),
                    app_id: "propagator".to_string(),
                    user_id: None,
                },
                owner_org: "safers".to_string(),
            },
        }
    }

    /// Shell script run as the simulator. `$1` is the output directory.
    pub fn script(mut self, script: &str) -> Self {
        self.config.simulator.args = vec![
            "-c".to_string(),
            script.to_string(),
            "simulator".to_string(),
            "{output_dir}".to_string(),
        ];
        self
    }

    pub fn progress_pattern(mut self, pattern: &str) -> Self {
        self.config.simulator.progress_pattern = Some(Regex::new(pattern).expect("invalid progress pattern"));
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.cutoff_tolerance = tolerance;
        self
    }

    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}
