// src/translate/request.rs

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{PropagatorError, Result};

use super::geometry::Geometry;
use super::wkt::parse_wkt;

/// Format of the simulator's `init_date` parameter.
pub const SIMULATOR_DATE_FORMAT: &str = "%Y%m%d%H%M";

/// Parameter set handed to the simulator (written as `<run_id>.json`).
///
/// Only the fields rewritten during translation are typed; everything else in
/// the request passes through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorParams {
    /// Start of the simulation, `YYYYmmddHHMM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_date: Option<String>,

    /// Simulated duration in minutes (only set when the request has `end`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<i64>,

    /// Ignition strings derived from the request geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignitions: Option<Vec<String>>,

    /// Boundary conditions with times in minutes and fire-break actions
    /// expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_conditions: Option<Vec<Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SimulatorParams {
    /// Parsed `init_date`, if present and well formed.
    pub fn start_date(&self) -> Option<NaiveDateTime> {
        self.init_date
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, SIMULATOR_DATE_FORMAT).ok())
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }
}

fn invalid(msg: impl Into<String>) -> PropagatorError {
    PropagatorError::Translation(msg.into())
}

/// Translate a raw request body into simulator parameters.
pub fn parse_request_body(body: &[u8]) -> Result<SimulatorParams> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|e| invalid(format!("request body is not valid JSON: {e}")))?;
    let Value::Object(mut extra) = data else {
        return Err(invalid("request body must be a JSON object"));
    };

    let mut params = SimulatorParams::default();

    if let Some(start) = extra.remove("start") {
        let start = parse_request_date(&start, "start")?;
        params.init_date = Some(start.format(SIMULATOR_DATE_FORMAT).to_string());

        if let Some(end) = extra.remove("end") {
            let end = parse_request_date(&end, "end")?;
            let seconds = (end - start).num_seconds() as f64;
            params.time_limit = Some((seconds / 60.0).round() as i64);
            extra.remove("time_limit");
        }
    }

    if let Some(geometry) = extra.remove("geometry") {
        let geom = Geometry::from_geojson(&geometry)?;
        params.ignitions = Some(geom.to_ignition_strings()?);
    }

    if let Some(bcs) = extra.remove("boundary_conditions") {
        let Value::Array(bcs) = bcs else {
            return Err(invalid("boundary_conditions must be an array"));
        };
        let converted = bcs
            .into_iter()
            .map(convert_boundary_condition)
            .collect::<Result<Vec<_>>>()?;
        params.boundary_conditions = Some(converted);
    }

    params.extra = extra;
    debug!(
        init_date = ?params.init_date,
        time_limit = ?params.time_limit,
        "translated request body"
    );
    Ok(params)
}

/// Parse an ISO-8601 timestamp, dropping everything from the first `.`
/// (fractional seconds and whatever follows them).
fn parse_request_date(value: &Value, field: &str) -> Result<NaiveDateTime> {
    let raw = value
        .as_str()
        .ok_or_else(|| invalid(format!("'{field}' must be a string")))?;
    let trimmed = raw.split('.').next().unwrap_or(raw);

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    Err(invalid(format!("'{field}' is not an ISO-8601 timestamp: {raw}")))
}

fn convert_boundary_condition(bc: Value) -> Result<Value> {
    let Value::Object(mut bc) = bc else {
        return Err(invalid("boundary condition must be an object"));
    };

    // Hours on the wire, minutes for the simulator.
    let time = bc
        .get("time")
        .ok_or_else(|| invalid("boundary condition without 'time'"))?;
    let minutes = match time {
        Value::Number(n) if n.is_i64() => n
            .as_i64()
            .and_then(|h| h.checked_mul(60))
            .map(Value::from)
            .ok_or_else(|| invalid(format!("boundary condition 'time' {n} is out of range")))?,
        Value::Number(n) => n
            .as_f64()
            .map(|h| Value::from(h * 60.0))
            .ok_or_else(|| invalid("boundary condition 'time' must be a number"))?,
        _ => return Err(invalid("boundary condition 'time' must be a number")),
    };
    bc.insert("time".to_string(), minutes);

    if let Some(fire_break) = bc.remove("fireBreak") {
        let Value::Object(actions) = fire_break else {
            return Err(invalid("'fireBreak' must be an object"));
        };
        for (action, wkt) in actions {
            let wkt = wkt
                .as_str()
                .ok_or_else(|| invalid(format!("fireBreak '{action}' must be a WKT string")))?;
            let strings = parse_wkt(wkt)?.to_ignition_strings()?;
            bc.insert(action_key(&action).to_string(), Value::from(strings));
        }
    }

    Ok(Value::Object(bc))
}

fn action_key(action: &str) -> &str {
    match action {
        "vehicle" => "heavy_action",
        "waterLine" => "waterline_action",
        other => other,
    }
}
