// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `propagator-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "propagator-runner",
    version,
    about = "Run wildfire propagation simulations requested over the message bus.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Propagator.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Propagator.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, the `PROPAGATOR_LOG` filter directives or `info` are used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved settings and artifact table, but
    /// don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Process a single message and wait for its run to finish instead of
    /// watching the inbox.
    #[arg(long, requires_all = ["routing_key", "message"])]
    pub once: bool,

    /// Routing key of the message processed with `--once`.
    #[arg(long, value_name = "KEY", requires = "once")]
    pub routing_key: Option<String>,

    /// File holding the JSON body processed with `--once`.
    #[arg(long, value_name = "FILE", requires = "once")]
    pub message: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
