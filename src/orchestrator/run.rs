// src/orchestrator/run.rs

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::errors::{PropagatorError, Result};
use crate::supervisor::ProcessSpec;
use crate::translate::SimulatorParams;
use crate::types::DatatypeId;

use super::config::{OrchestratorConfig, SimulatorSettings};

pub const MESSAGE_FILE: &str = "message.json";

/// Everything known about one run once its request is translated.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub run_id: String,
    pub user_id: Option<String>,
    pub datatype: DatatypeId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub cutoff: f64,
    pub title: String,
    pub notes: String,
    /// `<work_dir>/<run_id>`
    pub dir: PathBuf,
}

impl Run {
    /// Resolve run defaults. `now` is the start when the request has none.
    ///
    /// A run length that does not fit the calendar is a
    /// [`PropagatorError::Translation`].
    pub fn new(
        run_id: &str,
        user_id: Option<String>,
        datatype: DatatypeId,
        params: &SimulatorParams,
        config: &OrchestratorConfig,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let start = params.start_date().unwrap_or(now);
        let length = match time_limit_minutes(params) {
            Some(minutes) => chrono::Duration::try_minutes(minutes).ok_or_else(|| {
                PropagatorError::Translation(format!("time_limit of {minutes} minutes is out of range"))
            })?,
            None => config.default_run_length,
        };
        let end = start.checked_add_signed(length).ok_or_else(|| {
            PropagatorError::Translation(format!(
                "run of {} minutes starting {start} ends out of range",
                length.num_minutes()
            ))
        })?;
        let default_title = format!("Propagator Run {start}");
        let title = params
            .str_field("title")
            .or_else(|| params.str_field("name"))
            .map(str::to_string)
            .unwrap_or_else(|| default_title.clone());
        let notes = params
            .str_field("description")
            .map(str::to_string)
            .unwrap_or(default_title);

        Ok(Self {
            run_id: run_id.to_string(),
            user_id,
            datatype,
            start,
            end,
            cutoff: params.f64_field("probabilityRange").unwrap_or(config.default_cutoff),
            title,
            notes,
            dir: config.work_dir.join(run_id),
        })
    }

    pub fn message_file(&self) -> PathBuf {
        self.dir.join(MESSAGE_FILE)
    }

    /// Translated parameters, `<run_id>.json`.
    pub fn param_file(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.run_id))
    }

    /// Whole hours between start and end.
    pub fn time_limit_hours(&self) -> i64 {
        (self.end - self.start).num_hours()
    }

    pub fn process_spec(&self, sim: &SimulatorSettings) -> ProcessSpec {
        let param_file = self.param_file().to_string_lossy().into_owned();
        let output_dir = self.dir.to_string_lossy().into_owned();
        let hours = self.time_limit_hours().to_string();
        let args = sim
            .args
            .iter()
            .map(|arg| {
                arg.replace("{run_id}", &self.run_id)
                    .replace("{param_file}", &param_file)
                    .replace("{output_dir}", &output_dir)
                    .replace("{time_limit_hours}", &hours)
            })
            .collect();

        ProcessSpec {
            program: sim.program.clone(),
            args,
            cwd: sim.cwd.clone(),
            run_dir: self.dir.clone(),
        }
    }
}

/// Run length requested in minutes, either derived from `end` or passed
/// through as `time_limit`.
fn time_limit_minutes(params: &SimulatorParams) -> Option<i64> {
    params.time_limit.or_else(|| match params.extra.get("time_limit") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusSettings;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            work_dir: PathBuf::from("/work"),
            simulator: SimulatorSettings {
                program: "python3".into(),
                args: crate::config::model::default_simulator_args(),
                cwd: PathBuf::from("/opt/propagator"),
                poll_interval: Duration::from_millis(500),
                progress_pattern: None,
            },
            default_datatype: DatatypeId::ALL,
            default_run_length: chrono::Duration::hours(72),
            default_cutoff: 0.75,
            cutoff_tolerance: 0.0,
            bus: BusSettings {
                exchange: "safers.b2b".into(),
                app_id: "propagator".into(),
                user_id: None,
            },
            owner_org: "safers".into(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 1).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn defaults_apply_without_dates() {
        let run = Run::new("r1", None, DatatypeId::ALL, &SimulatorParams::default(), &config(), now()).unwrap();
        assert_eq!(run.start, now());
        assert_eq!(run.time_limit_hours(), 72);
        assert_eq!(run.cutoff, 0.75);
        assert_eq!(run.title, "Propagator Run 2023-07-01 10:00:00");
        assert_eq!(run.dir, PathBuf::from("/work/r1"));
    }

    #[test]
    fn request_values_override_defaults() {
        let params = crate::translate::parse_request_body(
            br#"{"start":"2023-08-01T06:00:00.000Z","end":"2023-08-03T12:00:00.000Z",
                 "name":"Fire A","description":"d","probabilityRange":0.5}"#,
        )
        .unwrap();
        let run = Run::new("r1", None, DatatypeId(35007), &params, &config(), now()).unwrap();
        assert_eq!(run.title, "Fire A");
        assert_eq!(run.notes, "d");
        assert_eq!(run.cutoff, 0.5);
        // Full duration, days included.
        assert_eq!(run.time_limit_hours(), 54);
    }

    #[test]
    fn oversized_time_limit_is_a_translation_error() {
        let params = crate::translate::parse_request_body(br#"{"time_limit": 1.0e12}"#).unwrap();
        let err = Run::new("r1", None, DatatypeId::ALL, &params, &config(), now()).unwrap_err();
        assert!(matches!(err, PropagatorError::Translation(_)), "{err:?}");

        let params = crate::translate::parse_request_body(br#"{"time_limit": 9.0e18}"#).unwrap();
        let err = Run::new("r1", None, DatatypeId::ALL, &params, &config(), now()).unwrap_err();
        assert!(matches!(err, PropagatorError::Translation(_)), "{err:?}");
    }

    #[test]
    fn process_spec_fills_placeholders() {
        let run = Run::new("r1", None, DatatypeId::ALL, &SimulatorParams::default(), &config(), now()).unwrap();
        let spec = run.process_spec(&config().simulator);
        assert_eq!(
            spec.args,
            vec!["-u", "main.py", "-id", "r1", "-f", "/work/r1/r1.json", "-of", "/work/r1", "-tl", "72"]
        );
        assert_eq!(spec.cwd, PathBuf::from("/opt/propagator"));
    }
}
