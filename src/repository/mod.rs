// src/repository/mod.rs

//! Data repository collaborator: one metadata package per run, one resource
//! per published artifact.
//!
//! - [`HttpRepository`] talks to a CKAN-style datalake.
//! - [`LocalRepository`] mirrors the same records into a directory tree.

pub mod http;
pub mod local;
pub mod metadata;

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RepositorySection;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::BoxFuture;

pub use http::HttpRepository;
pub use local::LocalRepository;
pub use metadata::{DatalakeMetadata, PackageInfo, ResourceMetadata, PACKAGE_DATATYPE_ID};

/// Upload seam used by the orchestrator.
pub trait RepositoryUploader: Send + Sync + Debug {
    /// Create the package; returns its id.
    fn create_metadata<'a>(&'a self, metadata: &'a DatalakeMetadata)
        -> BoxFuture<'a, Result<String>>;

    /// Attach `file` to the package. The repository may not report a URL.
    fn upload_resource<'a>(
        &'a self,
        package_id: &'a str,
        file: &'a Path,
        resource: &'a ResourceMetadata,
    ) -> BoxFuture<'a, Result<Option<String>>>;

    fn delete_metadata<'a>(&'a self, package_id: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Build the repository described by the `[repository]` section.
pub fn from_config(
    section: &RepositorySection,
    fs: Arc<dyn FileSystem>,
) -> Result<Arc<dyn RepositoryUploader>> {
    match section {
        RepositorySection::Local { root } => Ok(Arc::new(LocalRepository::new(fs, root.clone()))),
        RepositorySection::Http {
            url,
            token_env,
            timeout_secs,
            ..
        } => Ok(Arc::new(HttpRepository::from_env(
            url,
            token_env,
            Duration::from_secs(*timeout_secs),
        )?)),
    }
}
