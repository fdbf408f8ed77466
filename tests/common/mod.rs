// tests/common/mod.rs

#![allow(dead_code)]

pub use propagator_runner_test_utils::builders::{ConfigFileBuilder, OrchestratorConfigBuilder};
pub use propagator_runner_test_utils::fakes::{FakeProcessor, FakeUploader, RecordingPublisher};
pub use propagator_runner_test_utils::{eventually, init_tracing, with_timeout};

use serde_json::{json, Value};

/// Isochrone layer with one square feature per `(value, hours)` pair.
pub fn isochrone_layer(features: &[(f64, f64)]) -> Value {
    let features: Vec<Value> = features
        .iter()
        .enumerate()
        .map(|(i, (value, time))| {
            let d = i as f64 * 0.01;
            json!({
                "type": "Feature",
                "properties": { "value": value, "time": time },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [9.0 - d, 42.0 - d],
                        [9.1 + d, 42.0 - d],
                        [9.1 + d, 42.1 + d],
                        [9.0 - d, 42.1 + d],
                        [9.0 - d, 42.0 - d]
                    ]]
                }
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "crs": { "type": "name" }, "features": features })
}

/// Simulator script writing the isochrone layer and every raster into the
/// output directory (`$1`).
pub fn simulator_writing_outputs(layer: &Value) -> String {
    format!(
        "printf '%s' '{layer}' > \"$1/isochrone_72.geojson\"\n\
         for r in RoS_mean RoS_max fireline_intensity_max fireline_intensity_mean; do\n\
           printf raster > \"$1/${{r}}_72.tiff\"\n\
         done\n"
    )
}

/// Request body for a run starting at a fixed time.
pub fn request_body(extra: Value) -> Vec<u8> {
    let mut body = json!({
        "start": "2023-07-01T10:00:00",
        "end": "2023-07-01T16:00:00",
        "geometry": { "type": "Point", "coordinates": [9.05, 42.05] },
        "title": "Test fire"
    });
    if let (Some(target), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            target.insert(k.clone(), v.clone());
        }
    }
    serde_json::to_vec(&body).unwrap()
}
