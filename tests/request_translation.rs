// tests/request_translation.rs

use serde_json::json;

use propagator_runner::errors::PropagatorError;
use propagator_runner::translate::parse_request_body;

fn translate(body: serde_json::Value) -> serde_json::Value {
    let params = parse_request_body(body.to_string().as_bytes()).unwrap();
    serde_json::to_value(&params).unwrap()
}

#[test]
fn polygon_ignition_lists_lats_then_lons() {
    let out = translate(json!({
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[9.0, 42.0], [9.1, 42.0], [9.1, 42.1], [9.0, 42.0]]]
        }
    }));
    assert_eq!(
        out["ignitions"],
        json!(["POLYGON: [42.0 42.0 42.1 42.0];[9.0 9.1 9.1 9.0]"])
    );
}

#[test]
fn feature_collection_ignites_every_geometry() {
    let out = translate(json!({
        "geometry": {
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [9.0, 42.0] } },
                { "type": "Feature", "properties": {}, "geometry": {
                    "type": "LineString", "coordinates": [[9.0, 42.0], [9.1, 42.1]]
                } }
            ]
        }
    }));
    assert_eq!(
        out["ignitions"],
        json!(["POINT:42.0;9.0", "LINE: [42.0 42.1];[9.0 9.1]"])
    );
}

#[test]
fn start_and_end_become_init_date_and_minutes() {
    let out = translate(json!({
        "start": "2022-03-21T09:30:00.000Z",
        "end": "2022-03-22T09:30:00.000Z",
        "time_limit": 5
    }));
    assert_eq!(out["init_date"], json!("202203210930"));
    assert_eq!(out["time_limit"], json!(1440));
    assert!(out.get("start").is_none());
    assert!(out.get("end").is_none());
}

#[test]
fn without_end_time_limit_passes_through() {
    let out = translate(json!({ "start": "2022-03-21T09:30:00", "time_limit": 90 }));
    assert_eq!(out["init_date"], json!("202203210930"));
    assert_eq!(out["time_limit"], json!(90));
}

#[test]
fn boundary_condition_hours_become_minutes() {
    let out = translate(json!({
        "boundary_conditions": [
            { "time": 0, "w_speed": 10, "w_dir": 90, "moisture": 0 },
            { "time": 3, "w_speed": 20, "w_dir": 180, "moisture": 5 }
        ]
    }));
    assert_eq!(out["boundary_conditions"][0]["time"], json!(0));
    assert_eq!(out["boundary_conditions"][1]["time"], json!(180));
    assert_eq!(out["boundary_conditions"][1]["w_speed"], json!(20));
}

#[test]
fn invalid_bodies_are_translation_errors() {
    for body in [
        "not json".to_string(),
        "[1, 2, 3]".to_string(),
        json!({ "start": "yesterday" }).to_string(),
        json!({ "boundary_conditions": { "time": 1 } }).to_string(),
        json!({ "geometry": { "type": "Point" } }).to_string(),
    ] {
        let err = parse_request_body(body.as_bytes()).unwrap_err();
        assert!(
            matches!(err, PropagatorError::Translation(_)),
            "{body}: {err:?}"
        );
    }
}
