// tests/properties.rs

use proptest::prelude::*;
use serde_json::json;

use propagator_runner::artifacts::isochrones::filter_by_cutoff;
use propagator_runner::artifacts::table::supported_datatypes;
use propagator_runner::dispatch::{parse_routing_key, RouteRejection};
use propagator_runner::translate::geometry::format_float;
use propagator_runner::translate::parse_request_body;
use propagator_runner::types::DatatypeId;

fn run_id_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9-]{1,12}(\\.[a-z0-9-]{1,8}){0,3}"
}

proptest! {
    #[test]
    fn routing_key_keeps_run_id_intact(
        run_id in run_id_strategy(),
        index in 0usize..7,
        prefix in "[a-z]{1,10}",
    ) {
        let supported = supported_datatypes();
        let datatype = supported[index % supported.len()];
        let key = format!("{prefix}.{datatype}.{run_id}");

        let routed = parse_routing_key(&key, &supported, DatatypeId::ALL).unwrap();
        prop_assert_eq!(routed.datatype, datatype);
        prop_assert_eq!(routed.run_id, run_id);
    }

    #[test]
    fn unknown_datatypes_never_route(code in 0u32..100_000, run_id in run_id_strategy()) {
        let supported = supported_datatypes();
        prop_assume!(!supported.contains(&DatatypeId(code)));

        let key = format!("request.{code}.{run_id}");
        prop_assert_eq!(
            parse_routing_key(&key, &supported, DatatypeId::ALL),
            Err(RouteRejection::Unsupported(DatatypeId(code)))
        );
    }

    #[test]
    fn run_ids_with_path_separators_never_route(
        head in "[a-z0-9.]{0,6}",
        sep in prop::sample::select(vec!['/', '\\']),
        tail in "[a-z0-9.]{0,6}",
    ) {
        let run_id = format!("{head}{sep}{tail}");
        let key = format!("request.35007.{run_id}");
        prop_assert_eq!(
            parse_routing_key(&key, &supported_datatypes(), DatatypeId::ALL),
            Err(RouteRejection::InvalidRunId(run_id))
        );
    }

    #[test]
    fn cutoff_filter_keeps_exactly_the_values_within_tolerance(
        values in proptest::collection::vec(0.0f64..1.0, 0..40),
        cutoff in 0.01f64..1.0,
        tolerance in 0.0f64..0.2,
    ) {
        let features: Vec<_> = values
            .iter()
            .map(|v| json!({ "type": "Feature", "properties": { "value": v } }))
            .collect();

        let kept = filter_by_cutoff(&features, cutoff, tolerance);

        for feature in &kept {
            let v = feature["properties"]["value"].as_f64().unwrap();
            prop_assert!((v - cutoff).abs() <= tolerance);
        }
        let expected = values.iter().filter(|v| (*v - cutoff).abs() <= tolerance).count();
        prop_assert_eq!(kept.len(), expected);
    }

    #[test]
    fn polygon_ignition_lists_outer_ring_in_input_order(
        ring in proptest::collection::vec((-180.0f64..180.0, -90.0f64..90.0), 1..8),
    ) {
        let coordinates: Vec<_> = ring.iter().map(|(lon, lat)| json!([lon, lat])).collect();
        let body = json!({ "geometry": { "type": "Polygon", "coordinates": [coordinates] } });

        let params = parse_request_body(body.to_string().as_bytes()).unwrap();

        let lats: Vec<_> = ring.iter().map(|(_, lat)| format_float(*lat)).collect();
        let lons: Vec<_> = ring.iter().map(|(lon, _)| format_float(*lon)).collect();
        let expected = format!("POLYGON: [{}];[{}]", lats.join(" "), lons.join(" "));
        prop_assert_eq!(params.ignitions, Some(vec![expected]));
    }
}
