use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use propagator_runner::artifacts::isochrones::{self, ExtractedIsochrones, IsochroneRequest};
use propagator_runner::artifacts::mask::masked_path;
use propagator_runner::artifacts::ArtifactProcessor;
use propagator_runner::bus::{NotificationPublisher, OutboundMessage};
use propagator_runner::errors::{PropagatorError, Result};
use propagator_runner::fs::RealFileSystem;
use propagator_runner::repository::{DatalakeMetadata, RepositoryUploader, ResourceMetadata};
use propagator_runner::types::BoxFuture;

/// Records every published message.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<OutboundMessage> {
        self.messages().into_iter().filter(|m| m.is_error()).collect()
    }

    pub fn successes(&self) -> Vec<OutboundMessage> {
        self.messages()
            .into_iter()
            .filter(|m| !m.is_error() && m.body.message.ends_with("completed"))
            .collect()
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<()>> {
        let messages = Arc::clone(&self.messages);
        let message = message.clone();
        Box::pin(async move {
            messages.lock().unwrap().push(message);
            Ok(())
        })
    }
}

/// What the fake repository saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadLog {
    pub packages: Vec<String>,
    /// (package id, file, datatype)
    pub uploads: Vec<(String, PathBuf, u32)>,
    pub deleted: Vec<String>,
}

/// In-memory repository that hands out predictable URLs.
#[derive(Debug, Clone, Default)]
pub struct FakeUploader {
    log: Arc<Mutex<UploadLog>>,
    /// Fail the upload of this datatype.
    fail_datatype: Option<u32>,
    /// Report uploads without a URL.
    no_urls: bool,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(datatype: u32) -> Self {
        Self {
            fail_datatype: Some(datatype),
            ..Self::default()
        }
    }

    pub fn without_urls() -> Self {
        Self {
            no_urls: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> UploadLog {
        self.log.lock().unwrap().clone()
    }
}

impl RepositoryUploader for FakeUploader {
    fn create_metadata<'a>(
        &'a self,
        metadata: &'a DatalakeMetadata,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let id = format!("pkg-{}", metadata.request_code());
            self.log.lock().unwrap().packages.push(id.clone());
            Ok(id)
        })
    }

    fn upload_resource<'a>(
        &'a self,
        package_id: &'a str,
        file: &'a Path,
        resource: &'a ResourceMetadata,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let datatype = resource.datatype_resource.0;
            if self.fail_datatype == Some(datatype) {
                return Err(PropagatorError::Upload(format!("refused {datatype}")));
            }
            if !file.is_file() {
                return Err(PropagatorError::Upload(format!("missing {file:?}")));
            }
            self.log
                .lock()
                .unwrap()
                .uploads
                .push((package_id.to_string(), file.to_path_buf(), datatype));
            if self.no_urls {
                return Ok(None);
            }
            let name = file.file_name().unwrap().to_string_lossy();
            Ok(Some(format!("https://repo.test/{package_id}/{name}")))
        })
    }

    fn delete_metadata<'a>(&'a self, package_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().deleted.push(package_id.to_string());
            Ok(())
        })
    }
}

/// Real isochrone extraction, with raster masking replaced by a plain copy.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessor {
    masked: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn masked(&self) -> Vec<PathBuf> {
        self.masked.lock().unwrap().clone()
    }
}

impl ArtifactProcessor for FakeProcessor {
    fn extract_isochrones<'a>(
        &'a self,
        req: &'a IsochroneRequest,
    ) -> BoxFuture<'a, Result<ExtractedIsochrones>> {
        Box::pin(async move { isochrones::extract(&RealFileSystem, req) })
    }

    fn mask_raster<'a>(
        &'a self,
        input: &'a Path,
        _cutline: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            let output = masked_path(input)?;
            std::fs::copy(input, &output)?;
            self.masked.lock().unwrap().push(input.to_path_buf());
            Ok(output)
        })
    }
}
