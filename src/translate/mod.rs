// src/translate/mod.rs

//! Request translation: turns an inbound request body into the parameter set
//! the simulator understands.
//!
//! - [`geometry`] holds the geometry model, GeoJSON reading and the
//!   simulator's ignition string format.
//! - [`wkt`] parses the WKT strings used for fire-break actions.
//! - [`request`] rewrites the whole request body (dates, ignitions,
//!   boundary conditions).

pub mod geometry;
pub mod request;
pub mod wkt;

pub use geometry::{Geometry, Num, Position};
pub use request::{parse_request_body, SimulatorParams};
