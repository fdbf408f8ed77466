// src/artifacts/mod.rs

//! Simulator outputs and their post-processing.
//!
//! - [`table`] is the declarative list of publishable artifacts, keyed by
//!   datatype code.
//! - [`discovery`] picks the most recent output file matching a selector.
//! - [`isochrones`] filters the isochrone layer by probability and derives
//!   the published vector files and the bounding box.
//! - [`mask`] runs the external raster masking command.
//! - [`processor`] ties these together behind the [`ArtifactProcessor`]
//!   trait used by the orchestrator.

pub mod discovery;
pub mod isochrones;
pub mod mask;
pub mod processor;
pub mod table;

pub use discovery::{latest_matching, FileSelector};
pub use isochrones::{BoundingBox, ExtractedIsochrones, IsochroneRequest};
pub use processor::{ArtifactProcessor, GeoProcessor};
pub use table::{ArtifactSource, ArtifactSpec, ARTIFACTS, ISOCHRONE_SELECTOR};
