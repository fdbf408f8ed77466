// src/translate/geometry.rs

use std::fmt;

use serde_json::Value;

use crate::errors::{PropagatorError, Result};

/// A coordinate value, keeping track of whether it was written as an integer
/// so it can be echoed back the way the simulator expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn value(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn from_json(value: &Value) -> Option<Num> {
        let Value::Number(n) = value else {
            return None;
        };
        if let Some(i) = n.as_i64() {
            Some(Num::Int(i))
        } else {
            n.as_f64().map(Num::Float)
        }
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Num::Int(i) => write!(f, "{i}"),
            Num::Float(v) => f.write_str(&format_float(v)),
        }
    }
}

/// Format a float the way the simulator and file names expect it: integral values keep
/// a trailing `.0`, very large or very small magnitudes use a two-digit
/// exponent (`1e-05`).
pub fn format_float(v: f64) -> String {
    if !v.is_finite() {
        return if v.is_nan() {
            "nan".to_string()
        } else if v > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{v:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => formatted,
        };
    }

    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// `(lon, lat)` as found in GeoJSON and WKT.
pub type Position = (Num, Num);

/// The subset of geometry types the simulator can ignite from.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPoint(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
    Collection(Vec<Geometry>),
}

fn invalid(msg: impl Into<String>) -> PropagatorError {
    PropagatorError::Translation(msg.into())
}

impl Geometry {
    /// Read a GeoJSON geometry, `Feature`, `FeatureCollection` or
    /// `GeometryCollection`.
    pub fn from_geojson(value: &Value) -> Result<Geometry> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("geometry is missing a string 'type'"))?;

        match kind {
            "Feature" => {
                let geometry = value
                    .get("geometry")
                    .ok_or_else(|| invalid("Feature without 'geometry'"))?;
                Geometry::from_geojson(geometry)
            }
            "FeatureCollection" | "GeometryCollection" => {
                let members = value
                    .get("features")
                    .or_else(|| value.get("geometries"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| invalid(format!("{kind} without members")))?;
                members
                    .iter()
                    .map(Geometry::from_geojson)
                    .collect::<Result<Vec<_>>>()
                    .map(Geometry::Collection)
            }
            _ => {
                let coords = value
                    .get("coordinates")
                    .ok_or_else(|| invalid(format!("{kind} without 'coordinates'")))?;
                Geometry::from_coordinates(kind, coords)
            }
        }
    }

    fn from_coordinates(kind: &str, coords: &Value) -> Result<Geometry> {
        match kind {
            "Point" => Ok(Geometry::Point(position(coords)?)),
            "LineString" => Ok(Geometry::LineString(positions(coords)?)),
            "Polygon" => Ok(Geometry::Polygon(nested(coords, positions)?)),
            "MultiPoint" => Ok(Geometry::MultiPoint(positions(coords)?)),
            "MultiLineString" => Ok(Geometry::MultiLineString(nested(coords, positions)?)),
            "MultiPolygon" => Ok(Geometry::MultiPolygon(nested(coords, |v| {
                nested(v, positions)
            })?)),
            other => Err(invalid(format!("Unknown geometry type: {other}"))),
        }
    }

    /// Convert into simulator ignition strings, one per primitive.
    pub fn to_ignition_strings(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.push_ignition_strings(&mut out)?;
        Ok(out)
    }

    fn push_ignition_strings(&self, out: &mut Vec<String>) -> Result<()> {
        match self {
            Geometry::Point(p) => out.push(point_string(*p)),
            Geometry::LineString(line) => out.push(path_string("LINE", line)?),
            Geometry::Polygon(rings) => out.push(polygon_string(rings)?),
            Geometry::MultiPoint(points) => {
                out.extend(points.iter().map(|p| point_string(*p)));
            }
            Geometry::MultiLineString(lines) => {
                for line in lines {
                    out.push(path_string("LINE", line)?);
                }
            }
            Geometry::MultiPolygon(polys) => {
                for rings in polys {
                    out.push(polygon_string(rings)?);
                }
            }
            Geometry::Collection(members) => {
                for member in members {
                    member.push_ignition_strings(out)?;
                }
            }
        }
        Ok(())
    }
}

fn position(value: &Value) -> Result<Position> {
    let arr = value
        .as_array()
        .ok_or_else(|| invalid("position must be an array"))?;
    if arr.len() < 2 {
        return Err(invalid("position needs at least two coordinates"));
    }
    let lon = Num::from_json(&arr[0]).ok_or_else(|| invalid("non-numeric longitude"))?;
    let lat = Num::from_json(&arr[1]).ok_or_else(|| invalid("non-numeric latitude"))?;
    Ok((lon, lat))
}

fn positions(value: &Value) -> Result<Vec<Position>> {
    nested(value, position)
}

fn nested<T>(value: &Value, f: impl Fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    value
        .as_array()
        .ok_or_else(|| invalid("coordinates must be nested arrays"))?
        .iter()
        .map(f)
        .collect()
}

fn point_string((lon, lat): Position) -> String {
    format!("POINT:{lat};{lon}")
}

fn path_string(tag: &str, path: &[Position]) -> Result<String> {
    if path.is_empty() {
        return Err(invalid(format!("{tag} without coordinates")));
    }
    let lats: Vec<String> = path.iter().map(|(_, lat)| lat.to_string()).collect();
    let lons: Vec<String> = path.iter().map(|(lon, _)| lon.to_string()).collect();
    Ok(format!("{tag}: [{}];[{}]", lats.join(" "), lons.join(" ")))
}

fn polygon_string(rings: &[Vec<Position>]) -> Result<String> {
    // Holes are dropped, only the outer ring is ignited.
    let outer = rings
        .first()
        .ok_or_else(|| invalid("Polygon without rings"))?;
    path_string("POLYGON", outer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn floats_keep_fractional_part() {
        assert_eq!(format_float(9.0), "9.0");
        assert_eq!(format_float(42.445386), "42.445386");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(1e16), "1e+16");
    }

    #[test]
    fn polygon_keeps_outer_ring_only() {
        let geom = Geometry::from_geojson(&json!({
            "type": "Polygon",
            "coordinates": [
                [[9.0, 42.0], [9.1, 42.0], [9.1, 42.1], [9.0, 42.0]],
                [[9.02, 42.02], [9.03, 42.02], [9.03, 42.03], [9.02, 42.02]]
            ]
        }))
        .unwrap();

        assert_eq!(
            geom.to_ignition_strings().unwrap(),
            vec!["POLYGON: [42.0 42.0 42.1 42.0];[9.0 9.1 9.1 9.0]".to_string()]
        );
    }

    #[test]
    fn integer_coordinates_stay_integers() {
        let geom = Geometry::from_geojson(&json!({"type": "Point", "coordinates": [9, 42]})).unwrap();
        assert_eq!(geom.to_ignition_strings().unwrap(), vec!["POINT:42;9".to_string()]);
    }

    #[test]
    fn multi_geometries_expand() {
        let geom = Geometry::from_geojson(&json!({
            "type": "MultiLineString",
            "coordinates": [
                [[1.5, 41.0], [1.6, 41.1]],
                [[2.5, 40.0], [2.6, 40.1]]
            ]
        }))
        .unwrap();

        assert_eq!(
            geom.to_ignition_strings().unwrap(),
            vec![
                "LINE: [41.0 41.1];[1.5 1.6]".to_string(),
                "LINE: [40.0 40.1];[2.5 2.6]".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_type_is_a_translation_error() {
        let err = Geometry::from_geojson(&json!({"type": "Circle", "coordinates": [1.0, 2.0]}))
            .unwrap_err();
        assert!(matches!(err, PropagatorError::Translation(msg) if msg.contains("Circle")));
    }
}
