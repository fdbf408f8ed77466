// tests/config_loading.rs

mod common;
use crate::common::ConfigFileBuilder;

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use propagator_runner::config::{load_and_validate, RepositorySection};
use propagator_runner::errors::PropagatorError;
use propagator_runner::orchestrator::OrchestratorConfig;
use propagator_runner::types::DatatypeId;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_loaded() {
    let file = write_config(
        r#"
[paths]
work_dir = "/data/work"

[simulator]
program = "/usr/bin/python3"
args = ["main.py", "-f", "{param_file}", "-of", "{output_dir}"]
cwd = "/opt/propagator"
poll_interval_ms = 250
progress_pattern = "^PROGRESS"

[run]
default_datatype = 35010
default_run_length_hours = 24
default_probability_cutoff = 0.5
cutoff_tolerance = 0.01

[bus]
exchange = "test.b2b"
user_id = "svc"
outbox = "/data/outbox.jsonl"

[inbox]
dir = "/data/inbox"

[repository]
kind = "http"
url = "https://datalake.test"
owner_org = "fire"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.paths.work_dir, PathBuf::from("/data/work"));
    assert_eq!(cfg.simulator.poll_interval_ms, 250);
    assert_eq!(cfg.bus.app_id, "propagator");
    assert_eq!(cfg.inbox.dir, PathBuf::from("/data/inbox"));
    match &cfg.repository {
        RepositorySection::Http {
            url,
            token_env,
            timeout_secs,
            owner_org,
        } => {
            assert_eq!(url, "https://datalake.test");
            assert_eq!(token_env, "DATALAKE_TOKEN");
            assert_eq!(*timeout_secs, 60);
            assert_eq!(owner_org, "fire");
        }
        other => panic!("expected http repository, got {other:?}"),
    }

    let resolved = OrchestratorConfig::from_config(&cfg).unwrap();
    assert_eq!(resolved.default_datatype, DatatypeId(35010));
    assert_eq!(resolved.default_run_length, chrono::Duration::hours(24));
    assert_eq!(resolved.default_cutoff, 0.5);
    assert_eq!(resolved.owner_org, "fire");
    assert_eq!(resolved.bus.exchange, "test.b2b");
    assert_eq!(resolved.bus.user_id.as_deref(), Some("svc"));
    assert!(resolved.simulator.progress_pattern.is_some());
}

#[test]
fn missing_simulator_section_is_a_toml_error() {
    let file = write_config("[paths]\nwork_dir = \"w\"\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PropagatorError::TomlError(_)), "{err:?}");
}

#[test]
fn unknown_repository_kind_is_a_toml_error() {
    let file = write_config("[simulator]\nprogram = \"sh\"\n[repository]\nkind = \"s3\"\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PropagatorError::TomlError(_)), "{err:?}");
}

#[test]
fn zero_poll_interval_is_rejected() {
    let file = write_config("[simulator]\nprogram = \"sh\"\npoll_interval_ms = 0\n");
    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        PropagatorError::ConfigError(msg) => assert!(msg.contains("poll_interval_ms"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/nonexistent/Propagator.toml").unwrap_err();
    assert!(matches!(err, PropagatorError::IoError(_)), "{err:?}");
}

#[test]
fn relative_work_dir_is_made_absolute() {
    let cfg = ConfigFileBuilder::new("sh").work_dir("runs").build();
    let resolved = OrchestratorConfig::from_config(&cfg).unwrap();
    assert!(resolved.work_dir.is_absolute());
    assert!(resolved.work_dir.ends_with("runs"));
    assert_eq!(resolved.owner_org, "safers");
}
