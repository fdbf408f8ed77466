// src/artifacts/processor.rs

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::BoxFuture;

use super::isochrones::{self, ExtractedIsochrones, IsochroneRequest};
use super::mask::CommandMasker;

/// Post-processing seam used by the orchestrator.
///
/// Production uses [`GeoProcessor`]; tests substitute a fake that writes
/// canned files.
pub trait ArtifactProcessor: Send + Sync + Debug {
    /// Filter the isochrone layer on the cutoff and write the derived files.
    fn extract_isochrones<'a>(
        &'a self,
        req: &'a IsochroneRequest,
    ) -> BoxFuture<'a, Result<ExtractedIsochrones>>;

    /// Mask a raster on the extracted isochrones, returning the masked file.
    fn mask_raster<'a>(
        &'a self,
        input: &'a Path,
        cutline: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

#[derive(Debug, Clone)]
pub struct GeoProcessor {
    fs: Arc<dyn FileSystem>,
    masker: CommandMasker,
}

impl GeoProcessor {
    pub fn new(fs: Arc<dyn FileSystem>, mask_command: Vec<String>) -> Self {
        Self {
            fs,
            masker: CommandMasker::new(mask_command),
        }
    }
}

impl ArtifactProcessor for GeoProcessor {
    fn extract_isochrones<'a>(
        &'a self,
        req: &'a IsochroneRequest,
    ) -> BoxFuture<'a, Result<ExtractedIsochrones>> {
        Box::pin(async move { isochrones::extract(self.fs.as_ref(), req) })
    }

    fn mask_raster<'a>(
        &'a self,
        input: &'a Path,
        cutline: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(self.masker.mask(input, cutline))
    }
}
