// src/translate/wkt.rs

//! Minimal WKT reader for the geometry types used by fire-break actions.
//!
//! Supports `POINT`, `LINESTRING`, `POLYGON`, their `MULTI*` variants and
//! `GEOMETRYCOLLECTION`. Z/M ordinates are accepted and dropped. All
//! coordinates are read as floats.

use crate::errors::{PropagatorError, Result};

use super::geometry::{Geometry, Num, Position};

/// Parse a WKT string into a [`Geometry`].
pub fn parse_wkt(input: &str) -> Result<Geometry> {
    let mut parser = Parser::new(input);
    let geom = parser.geometry()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(geom)
}

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            text,
            pos: 0,
        }
    }

    fn error(&self, what: &str) -> PropagatorError {
        PropagatorError::Translation(format!(
            "invalid WKT '{}': {what} at offset {}",
            self.text, self.pos
        ))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        if self.peek() == Some(ch) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", ch as char)))
        }
    }

    fn word(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }
        self.text[start..self.pos].to_ascii_uppercase()
    }

    fn number(&mut self) -> Result<f64> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len()
            && matches!(self.src[self.pos], b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        {
            self.pos += 1;
        }
        self.text[start..self.pos]
            .parse::<f64>()
            .map_err(|_| self.error("expected a number"))
    }

    fn geometry(&mut self) -> Result<Geometry> {
        let tag = self.word();
        if tag.is_empty() {
            return Err(self.error("expected a geometry type"));
        }
        // Optional dimension marker (Z, M, ZM).
        let save = self.pos;
        let dim = self.word();
        if !matches!(dim.as_str(), "Z" | "M" | "ZM") {
            self.pos = save;
        }
        if self.word_ahead_is("EMPTY") {
            return Err(self.error(&format!("empty {tag} cannot be ignited")));
        }

        match tag.as_str() {
            "POINT" => {
                self.expect(b'(')?;
                let p = self.position()?;
                self.expect(b')')?;
                Ok(Geometry::Point(p))
            }
            "LINESTRING" => Ok(Geometry::LineString(self.position_list()?)),
            "POLYGON" => Ok(Geometry::Polygon(self.list(|p| p.position_list())?)),
            "MULTIPOINT" => Ok(Geometry::MultiPoint(self.list(|p| {
                // Both `MULTIPOINT (1 2, 3 4)` and `MULTIPOINT ((1 2), (3 4))`.
                if p.peek() == Some(b'(') {
                    p.expect(b'(')?;
                    let pos = p.position()?;
                    p.expect(b')')?;
                    Ok(pos)
                } else {
                    p.position()
                }
            })?)),
            "MULTILINESTRING" => Ok(Geometry::MultiLineString(
                self.list(|p| p.position_list())?,
            )),
            "MULTIPOLYGON" => Ok(Geometry::MultiPolygon(
                self.list(|p| p.list(|q| q.position_list()))?,
            )),
            "GEOMETRYCOLLECTION" => Ok(Geometry::Collection(self.list(|p| p.geometry())?)),
            other => Err(PropagatorError::Translation(format!(
                "Unknown geometry type: {other}"
            ))),
        }
    }

    fn word_ahead_is(&mut self, word: &str) -> bool {
        let save = self.pos;
        let found = self.word() == word;
        if !found {
            self.pos = save;
        }
        found
    }

    fn position(&mut self) -> Result<Position> {
        let lon = self.number()?;
        let lat = self.number()?;
        // Drop Z / M ordinates.
        while matches!(self.peek(), Some(b'0'..=b'9' | b'-' | b'+' | b'.')) {
            self.number()?;
        }
        Ok((Num::Float(lon), Num::Float(lat)))
    }

    fn position_list(&mut self) -> Result<Vec<Position>> {
        self.list(|p| p.position())
    }

    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect(b'(')?;
        let mut items = vec![item(self)?];
        while self.peek() == Some(b',') {
            self.pos += 1;
            items.push(item(self)?);
        }
        self.expect(b')')?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linestring_becomes_line_ignition() {
        let geom = parse_wkt("LINESTRING (9.244365 42.445386, 9.266281 42.414662)").unwrap();
        assert_eq!(
            geom.to_ignition_strings().unwrap(),
            vec!["LINE: [42.445386 42.414662];[9.244365 9.266281]".to_string()]
        );
    }

    #[test]
    fn point_coordinates_are_floats() {
        let geom = parse_wkt("POINT (9 42)").unwrap();
        assert_eq!(geom.to_ignition_strings().unwrap(), vec!["POINT:42.0;9.0".to_string()]);
    }

    #[test]
    fn multipoint_accepts_both_spellings() {
        let a = parse_wkt("MULTIPOINT (1 2, 3 4)").unwrap();
        let b = parse_wkt("multipoint ((1 2), (3 4))").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn collection_and_polygon_with_hole() {
        let geom = parse_wkt(
            "GEOMETRYCOLLECTION (POINT (1 2), POLYGON ((0 0, 1 0, 1 1, 0 0), (0.2 0.2, 0.3 0.2, 0.3 0.3, 0.2 0.2)))",
        )
        .unwrap();
        assert_eq!(
            geom.to_ignition_strings().unwrap(),
            vec![
                "POINT:2.0;1.0".to_string(),
                "POLYGON: [0.0 0.0 1.0 0.0];[0.0 1.0 1.0 0.0]".to_string(),
            ]
        );
    }

    #[test]
    fn malformed_wkt_is_rejected() {
        assert!(parse_wkt("LINESTRING (1 2, 3").is_err());
        assert!(parse_wkt("CIRCLE (1 2)").is_err());
        assert!(parse_wkt("POINT EMPTY").is_err());
    }
}
