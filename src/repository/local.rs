// src/repository/local.rs

//! Filesystem-backed repository for offline runs.
//!
//! Layout: `<root>/<package>/package.json`, uploaded files next to it, and
//! one `<file>.resource.json` record per upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::errors::{PropagatorError, Result};
use crate::fs::FileSystem;
use crate::types::BoxFuture;

use super::metadata::{DatalakeMetadata, ResourceMetadata};
use super::RepositoryUploader;

const PACKAGE_FILE: &str = "package.json";

#[derive(Debug, Clone)]
pub struct LocalRepository {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self { fs, root: root.into() }
    }

    pub fn package_dir(&self, package_id: &str) -> PathBuf {
        self.root.join(package_id)
    }

    fn create(&self, metadata: &DatalakeMetadata) -> Result<String> {
        let id = metadata.name.clone();
        let body = serde_json::to_vec_pretty(metadata)?;
        self.fs.write(&self.package_dir(&id).join(PACKAGE_FILE), &body)?;
        info!(package_id = %id, request_code = %metadata.request_code(), "metadata created");
        Ok(id)
    }

    fn upload(
        &self,
        package_id: &str,
        file: &Path,
        resource: &ResourceMetadata,
    ) -> Result<Option<String>> {
        let dir = self.package_dir(package_id);
        if !self.fs.exists(&dir.join(PACKAGE_FILE)) {
            return Err(PropagatorError::Upload(format!(
                "unknown package '{package_id}'"
            )));
        }
        let name = file
            .file_name()
            .ok_or_else(|| PropagatorError::Upload(format!("{file:?} has no file name")))?;

        let content = self
            .fs
            .read(file)
            .map_err(|e| PropagatorError::Upload(format!("reading {file:?}: {e}")))?;
        let target = dir.join(name);
        self.fs.write(&target, &content)?;

        let mut record_name = name.to_os_string();
        record_name.push(".resource.json");
        self.fs
            .write(&dir.join(record_name), &serde_json::to_vec_pretty(resource)?)?;

        let absolute = std::path::absolute(&target).unwrap_or(target);
        info!(package_id, path = ?absolute, "resource stored");
        Ok(Some(format!("file://{}", absolute.display())))
    }

    fn delete(&self, package_id: &str) -> Result<()> {
        let dir = self.package_dir(package_id);
        if self.fs.exists(&dir) {
            self.fs.remove_dir_all(&dir)?;
        }
        info!(package_id, "metadata deleted");
        Ok(())
    }
}

impl RepositoryUploader for LocalRepository {
    fn create_metadata<'a>(
        &'a self,
        metadata: &'a DatalakeMetadata,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { self.create(metadata) })
    }

    fn upload_resource<'a>(
        &'a self,
        package_id: &'a str,
        file: &'a Path,
        resource: &'a ResourceMetadata,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { self.upload(package_id, file, resource) })
    }

    fn delete_metadata<'a>(&'a self, package_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.delete(package_id) })
    }
}
