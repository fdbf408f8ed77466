// src/logging.rs

//! Log output for the runner.
//!
//! Runs log with `run_id` and `datatype` fields, so one run can be followed
//! through staging, supervision and publication with a plain grep. The
//! filter is `--log-level` when given, else the `PROPAGATOR_LOG` directives
//! (`info,propagator_runner::supervisor=debug`), else `info`.
//!
//! Everything goes to stderr: stdout carries the `--dry-run` report and the
//! URLs printed by `--once`.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "PROPAGATOR_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber. Call once, before the first run starts.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let directives = resolve_directives(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}' in {LOG_ENV}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn resolve_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(level) = cli_level {
        return level_directive(level).to_string();
    }
    match env_value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_DIRECTIVES.to_string(),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_beats_environment() {
        assert_eq!(
            resolve_directives(Some(LogLevel::Debug), Some("error")),
            "debug"
        );
    }

    #[test]
    fn environment_directives_pass_through() {
        assert_eq!(
            resolve_directives(None, Some(" warn,propagator_runner::supervisor=debug ")),
            "warn,propagator_runner::supervisor=debug"
        );
        assert!(EnvFilter::try_new(resolve_directives(None, Some("warn,propagator_runner=trace"))).is_ok());
    }

    #[test]
    fn blank_or_missing_environment_means_info() {
        assert_eq!(resolve_directives(None, None), "info");
        assert_eq!(resolve_directives(None, Some("  ")), "info");
    }
}
