// src/config/validate.rs

use regex::Regex;

use crate::artifacts::table;
use crate::config::model::{ConfigFile, RawConfigFile, RepositorySection};
use crate::errors::{PropagatorError, Result};
use crate::types::DatatypeId;

/// Placeholders understood in `[simulator].args`.
pub const SIMULATOR_PLACEHOLDERS: &[&str] =
    &["run_id", "param_file", "output_dir", "time_limit_hours"];

/// Placeholders understood in `[postprocess].mask_command`.
pub const MASK_PLACEHOLDERS: &[&str] = &["input", "output", "cutline"];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PropagatorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_paths(cfg)?;
    validate_simulator(cfg)?;
    validate_run_defaults(cfg)?;
    validate_repository(cfg)?;
    validate_postprocess(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> PropagatorError {
    PropagatorError::ConfigError(msg.into())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.paths.work_dir.as_os_str().is_empty() {
        return Err(config_error("[paths].work_dir must not be empty"));
    }
    if cfg.inbox.dir.as_os_str().is_empty() {
        return Err(config_error("[inbox].dir must not be empty"));
    }
    Ok(())
}

fn validate_simulator(cfg: &RawConfigFile) -> Result<()> {
    let sim = &cfg.simulator;
    if sim.program.trim().is_empty() {
        return Err(config_error("[simulator].program must not be empty"));
    }
    if sim.poll_interval_ms == 0 {
        return Err(config_error(
            "[simulator].poll_interval_ms must be >= 1 (got 0)",
        ));
    }
    check_placeholders("[simulator].args", &sim.args, SIMULATOR_PLACEHOLDERS)?;

    if let Some(pattern) = &sim.progress_pattern {
        Regex::new(pattern).map_err(|e| {
            config_error(format!(
                "[simulator].progress_pattern is not a valid regex: {e}"
            ))
        })?;
    }
    Ok(())
}

fn validate_run_defaults(cfg: &RawConfigFile) -> Result<()> {
    let run = &cfg.run;
    let datatype = DatatypeId(run.default_datatype);
    if !datatype.is_all() && table::lookup(datatype).is_none() {
        return Err(config_error(format!(
            "[run].default_datatype {datatype} is not a supported datatype"
        )));
    }
    if run.default_run_length_hours == 0 {
        return Err(config_error(
            "[run].default_run_length_hours must be >= 1 (got 0)",
        ));
    }
    let cutoff = run.default_probability_cutoff;
    if !(cutoff > 0.0 && cutoff <= 1.0) {
        return Err(config_error(format!(
            "[run].default_probability_cutoff must be in (0, 1] (got {cutoff})"
        )));
    }
    if !run.cutoff_tolerance.is_finite() || run.cutoff_tolerance < 0.0 {
        return Err(config_error(format!(
            "[run].cutoff_tolerance must be a finite value >= 0 (got {})",
            run.cutoff_tolerance
        )));
    }
    Ok(())
}

fn validate_repository(cfg: &RawConfigFile) -> Result<()> {
    match &cfg.repository {
        RepositorySection::Local { root } => {
            if root.as_os_str().is_empty() {
                return Err(config_error("[repository].root must not be empty"));
            }
        }
        RepositorySection::Http {
            url,
            token_env,
            timeout_secs,
            ..
        } => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(config_error(format!(
                    "[repository].url must be an http(s) URL (got '{url}')"
                )));
            }
            if token_env.trim().is_empty() {
                return Err(config_error("[repository].token_env must not be empty"));
            }
            if *timeout_secs == 0 {
                return Err(config_error(
                    "[repository].timeout_secs must be >= 1 (got 0)",
                ));
            }
        }
    }
    Ok(())
}

fn validate_postprocess(cfg: &RawConfigFile) -> Result<()> {
    let cmd = &cfg.postprocess.mask_command;
    if cmd.is_empty() || cmd[0].trim().is_empty() {
        return Err(config_error("[postprocess].mask_command must not be empty"));
    }
    check_placeholders("[postprocess].mask_command", cmd, MASK_PLACEHOLDERS)?;
    for required in ["{input}", "{output}"] {
        if !cmd.iter().any(|arg| arg.contains(required)) {
            return Err(config_error(format!(
                "[postprocess].mask_command must reference {required}"
            )));
        }
    }
    Ok(())
}

fn check_placeholders(section: &str, args: &[String], known: &[&str]) -> Result<()> {
    let re = Regex::new(r"\{([A-Za-z_]+)\}").map_err(anyhow::Error::from)?;
    for arg in args {
        for cap in re.captures_iter(arg) {
            let name = &cap[1];
            if !known.contains(&name) {
                return Err(config_error(format!(
                    "{section} uses unknown placeholder '{{{name}}}' (known: {})",
                    known.join(", ")
                )));
            }
        }
    }
    Ok(())
}
