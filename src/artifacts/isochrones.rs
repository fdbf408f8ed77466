// src/artifacts/isochrones.rs

//! Isochrone extraction: keep the features at the requested probability,
//! stamp them with wall-clock times and compute their footprint.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono::{Duration, NaiveDateTime};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::errors::{PropagatorError, Result};
use crate::fs::FileSystem;
use crate::translate::geometry::format_float;

const TIME_STRING_FORMAT: &str = "%H:%M";
const ISO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Inputs for one extraction.
#[derive(Debug, Clone)]
pub struct IsochroneRequest {
    /// Raw isochrone layer written by the simulator.
    pub source: PathBuf,
    /// Directory receiving the derived files.
    pub output_dir: PathBuf,
    /// Simulation start; feature `time` values are hours after it.
    pub start: NaiveDateTime,
    pub cutoff: f64,
    pub tolerance: f64,
}

/// Files derived from the filtered isochrones.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedIsochrones {
    /// Filtered features with `timeString`.
    pub path: PathBuf,
    /// Same features with `time` as an ISO timestamp.
    pub isotime_path: PathBuf,
    pub bbox: BoundingBox,
    pub feature_count: usize,
}

/// Axis-aligned bounds in lon/lat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn from_point(x: f64, y: f64) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// GeoJSON polygon of the box, counter-clockwise starting at the
    /// lower-right corner.
    pub fn to_geojson(&self) -> Value {
        let ring = [
            [self.max_x, self.min_y],
            [self.max_x, self.max_y],
            [self.min_x, self.max_y],
            [self.min_x, self.min_y],
            [self.max_x, self.min_y],
        ];
        json!({ "type": "Polygon", "coordinates": [ring] })
    }
}

/// Derived file names, keyed by the cutoff as written in the request.
pub fn extracted_paths(output_dir: &Path, cutoff: f64) -> (PathBuf, PathBuf) {
    let p = format_float(cutoff);
    (
        output_dir.join(format!("extracted_isochrone_prob_{p}.geojson")),
        output_dir.join(format!("extracted_isochrone_prob_{p}_isotime.geojson")),
    )
}

/// Features whose numeric `value` property lies within `tolerance` of
/// `cutoff`. With a zero tolerance this is exact equality.
pub fn filter_by_cutoff(features: &[Value], cutoff: f64, tolerance: f64) -> Vec<Value> {
    features
        .iter()
        .filter(|f| {
            f.get("properties")
                .and_then(|p| p.get("value"))
                .and_then(Value::as_f64)
                .is_some_and(|v| (v - cutoff).abs() <= tolerance)
        })
        .cloned()
        .collect()
}

fn offset(start: NaiveDateTime, hours: f64) -> Result<NaiveDateTime> {
    let millis = hours * 3_600_000.0;
    Duration::try_milliseconds(millis.round() as i64)
        .filter(|_| millis.is_finite())
        .and_then(|d| start.checked_add_signed(d))
        .ok_or_else(|| {
            PropagatorError::Other(anyhow!(
                "isochrone time of {hours} hours after {start} is out of range"
            ))
        })
}

fn feature_hours(feature: &Value) -> Option<f64> {
    feature.get("properties")?.get("time")?.as_f64()
}

/// Add `timeString` (`HH:MM` of `start + time` hours) to every feature that
/// carries a numeric `time`.
pub fn annotate_time_strings(features: &mut [Value], start: NaiveDateTime) -> Result<()> {
    for feature in features.iter_mut() {
        let Some(hours) = feature_hours(feature) else {
            continue;
        };
        let stamp = offset(start, hours)?.format(TIME_STRING_FORMAT).to_string();
        if let Some(props) = feature.get_mut("properties").and_then(Value::as_object_mut) {
            props.insert("timeString".to_string(), Value::String(stamp));
        }
    }
    Ok(())
}

/// Copy of `features` with `time` replaced by the absolute ISO timestamp.
pub fn with_iso_times(features: &[Value], start: NaiveDateTime) -> Result<Vec<Value>> {
    features
        .iter()
        .cloned()
        .map(|mut feature| {
            if let Some(hours) = feature_hours(&feature) {
                let stamp = offset(start, hours)?.format(ISO_TIME_FORMAT).to_string();
                if let Some(props) = feature.get_mut("properties").and_then(Value::as_object_mut) {
                    props.insert("time".to_string(), Value::String(stamp));
                }
            }
            Ok(feature)
        })
        .collect()
}

/// Bounds of every coordinate in the features' geometries.
pub fn bounding_box(features: &[Value]) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for feature in features {
        if let Some(coords) = feature.get("geometry").and_then(|g| g.get("coordinates")) {
            walk_coordinates(coords, &mut bbox);
        }
    }
    bbox
}

fn walk_coordinates(value: &Value, bbox: &mut Option<BoundingBox>) {
    let Value::Array(items) = value else {
        return;
    };
    if let [Value::Number(x), Value::Number(y), ..] = items.as_slice() {
        if let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) {
            match bbox {
                Some(b) => b.extend(x, y),
                None => *bbox = Some(BoundingBox::from_point(x, y)),
            }
        }
        return;
    }
    for item in items {
        walk_coordinates(item, bbox);
    }
}

fn collection_like(template: &Map<String, Value>, features: Vec<Value>) -> Value {
    let mut out = template.clone();
    out.insert("type".to_string(), Value::String("FeatureCollection".to_string()));
    out.insert("features".to_string(), Value::Array(features));
    Value::Object(out)
}

/// Read the raw layer, filter it, and write both derived files.
///
/// An empty result is a [`PropagatorError::LowConfidence`].
pub fn extract(fs: &dyn FileSystem, req: &IsochroneRequest) -> Result<ExtractedIsochrones> {
    let raw = fs.read_to_string(&req.source)?;
    let layer: Value = serde_json::from_str(&raw)?;
    let Value::Object(layer) = layer else {
        return Err(PropagatorError::LowConfidence(format!(
            "{:?} is not a GeoJSON object",
            req.source
        )));
    };
    let features = layer
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut kept = filter_by_cutoff(features, req.cutoff, req.tolerance);
    debug!(
        source = ?req.source,
        total = features.len(),
        kept = kept.len(),
        cutoff = req.cutoff,
        "filtered isochrones"
    );
    if kept.is_empty() {
        return Err(PropagatorError::LowConfidence(format!(
            "no isochrone at probability {}",
            format_float(req.cutoff)
        )));
    }

    let bbox = bounding_box(&kept).ok_or_else(|| {
        PropagatorError::LowConfidence("isochrones at the cutoff carry no coordinates".to_string())
    })?;

    annotate_time_strings(&mut kept, req.start)?;
    let iso = with_iso_times(&kept, req.start)?;
    let feature_count = kept.len();

    let (path, isotime_path) = extracted_paths(&req.output_dir, req.cutoff);
    let body = serde_json::to_vec(&collection_like(&layer, kept))?;
    fs.write(&path, &body)
        .with_context(|| format!("writing extracted isochrones to {path:?}"))?;
    let body = serde_json::to_vec(&collection_like(&layer, iso))?;
    fs.write(&isotime_path, &body)
        .with_context(|| format!("writing isotime isochrones to {isotime_path:?}"))?;

    info!(path = ?path, features = feature_count, "isochrones extracted");
    Ok(ExtractedIsochrones { path, isotime_path, bbox, feature_count })
}
