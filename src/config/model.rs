// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [paths]
/// work_dir = "/data/propagator/work"
///
/// [simulator]
/// program = "/usr/bin/python3"
/// cwd = "/opt/propagator"
///
/// [repository]
/// kind = "http"
/// url = "https://datalake.example.org"
/// ```
///
/// Only `[simulator].program` is mandatory; everything else has defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    pub simulator: SimulatorSection,

    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub bus: BusSection,

    #[serde(default)]
    pub inbox: InboxSection,

    #[serde(default)]
    pub repository: RepositorySection,

    #[serde(default)]
    pub postprocess: PostprocessSection,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub simulator: SimulatorSection,
    pub run: RunSection,
    pub bus: BusSection,
    pub inbox: InboxSection,
    pub repository: RepositorySection,
    pub postprocess: PostprocessSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            paths: raw.paths,
            simulator: raw.simulator,
            run: raw.run,
            bus: raw.bus,
            inbox: raw.inbox,
            repository: raw.repository,
            postprocess: raw.postprocess,
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Parent of every run directory (`<work_dir>/<run_id>`).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
        }
    }
}

/// `[simulator]` section: how to launch the external simulation.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSection {
    /// Executable to run (e.g. the Python interpreter).
    pub program: String,

    /// Arguments; `{run_id}`, `{param_file}`, `{output_dir}` and
    /// `{time_limit_hours}` are substituted per run.
    #[serde(default = "default_simulator_args")]
    pub args: Vec<String>,

    /// Working directory of the simulator process. Defaults to the current
    /// directory of the service.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// How often a watch-only supervisor checks the `running` marker.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Stdout lines matching this regex are published as `update`
    /// notifications.
    #[serde(default)]
    pub progress_pattern: Option<String>,
}

pub fn default_simulator_args() -> Vec<String> {
    [
        "-u",
        "main.py",
        "-id",
        "{run_id}",
        "-f",
        "{param_file}",
        "-of",
        "{output_dir}",
        "-tl",
        "{time_limit_hours}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// `[run]` section: defaults applied to every run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Datatype assumed when a request does not name one.
    #[serde(default = "default_datatype")]
    pub default_datatype: u32,

    /// Simulated length when the request has no `end`.
    #[serde(default = "default_run_length_hours")]
    pub default_run_length_hours: u32,

    /// Probability value whose isochrones are kept.
    #[serde(default = "default_probability_cutoff")]
    pub default_probability_cutoff: f64,

    /// Allowed distance between an isochrone `value` and the cutoff.
    /// `0.0` keeps exact-equality filtering.
    #[serde(default)]
    pub cutoff_tolerance: f64,
}

fn default_datatype() -> u32 {
    35006
}

fn default_run_length_hours() -> u32 {
    72
}

fn default_probability_cutoff() -> f64 {
    0.75
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            default_datatype: default_datatype(),
            default_run_length_hours: default_run_length_hours(),
            default_probability_cutoff: default_probability_cutoff(),
            cutoff_tolerance: 0.0,
        }
    }
}

/// `[bus]` section: outbound notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct BusSection {
    #[serde(default = "default_exchange")]
    pub exchange: String,

    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Optional `user_id` message property.
    #[serde(default)]
    pub user_id: Option<String>,

    /// If set, notifications are appended to this file as JSON lines;
    /// otherwise they are only logged.
    #[serde(default)]
    pub outbox: Option<PathBuf>,
}

fn default_exchange() -> String {
    "safers.b2b".to_string()
}

fn default_app_id() -> String {
    "propagator".to_string()
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            app_id: default_app_id(),
            user_id: None,
            outbox: None,
        }
    }
}

/// `[inbox]` section: the spool directory inbound messages are dropped into.
#[derive(Debug, Clone, Deserialize)]
pub struct InboxSection {
    #[serde(default = "default_inbox_dir")]
    pub dir: PathBuf,
}

fn default_inbox_dir() -> PathBuf {
    PathBuf::from("inbox")
}

impl Default for InboxSection {
    fn default() -> Self {
        Self {
            dir: default_inbox_dir(),
        }
    }
}

/// `[repository]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RepositorySection {
    /// Copy artifacts into a local directory tree.
    Local {
        #[serde(default = "default_local_root")]
        root: PathBuf,
    },
    /// CKAN-style HTTP datalake.
    Http {
        url: String,
        /// Environment variable holding the bearer token.
        #[serde(default = "default_token_env")]
        token_env: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_owner_org")]
        owner_org: String,
    },
}

fn default_local_root() -> PathBuf {
    PathBuf::from("repository")
}

fn default_token_env() -> String {
    "DATALAKE_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

pub fn default_owner_org() -> String {
    "safers".to_string()
}

impl Default for RepositorySection {
    fn default() -> Self {
        RepositorySection::Local {
            root: default_local_root(),
        }
    }
}

/// `[postprocess]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PostprocessSection {
    /// Command masking a raster with the cutoff isochrones; `{input}`,
    /// `{output}` and `{cutline}` are substituted.
    #[serde(default = "default_mask_command")]
    pub mask_command: Vec<String>,
}

pub fn default_mask_command() -> Vec<String> {
    [
        "gdalwarp",
        "-overwrite",
        "-q",
        "-cutline",
        "{cutline}",
        "-wo",
        "CUTLINE_ALL_TOUCHED=TRUE",
        "-dstnodata",
        "0",
        "{input}",
        "{output}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PostprocessSection {
    fn default() -> Self {
        Self {
            mask_command: default_mask_command(),
        }
    }
}
