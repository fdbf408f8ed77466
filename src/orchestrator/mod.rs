// src/orchestrator/mod.rs

//! Run orchestration.
//!
//! One [`RunOrchestrator::handle`] call drives a request through
//! translation, staging, supervision, post-processing and publication, and
//! guarantees the requester sees either the success notifications or a
//! single error notification.

pub mod config;
pub mod phase;
pub mod run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Local;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::artifacts::table::{self, ArtifactSource, ArtifactSpec};
use crate::artifacts::{
    latest_matching, ArtifactProcessor, ExtractedIsochrones, IsochroneRequest, ISOCHRONE_SELECTOR,
};
use crate::bus::{NotificationPublisher, RunNotifier};
use crate::dispatch::inbound::is_valid_run_id;
use crate::errors::{PropagatorError, Result};
use crate::fs::FileSystem;
use crate::repository::{DatalakeMetadata, PackageInfo, RepositoryUploader, ResourceMetadata};
use crate::supervisor::{ProcessOutcome, Supervisor};
use crate::translate::{parse_request_body, SimulatorParams};
use crate::types::DatatypeId;

pub use config::{OrchestratorConfig, SimulatorSettings};
pub use phase::{PhaseTracker, RunPhase};
pub use run::Run;

const PROGRESS_BUFFER: usize = 64;

/// An inbound request, already routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: String,
    pub user_id: Option<String>,
    pub datatype: DatatypeId,
    /// Raw JSON body.
    pub body: Vec<u8>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub phase: RunPhase,
    /// URLs announced for the run's artifacts.
    pub urls: Vec<String>,
    /// Text of the error notification, if one was sent.
    pub error: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.phase == RunPhase::Done
    }
}

#[derive(Debug, Clone)]
pub struct RunOrchestrator {
    config: Arc<OrchestratorConfig>,
    fs: Arc<dyn FileSystem>,
    supervisor: Supervisor,
    processor: Arc<dyn ArtifactProcessor>,
    uploader: Arc<dyn RepositoryUploader>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl RunOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        fs: Arc<dyn FileSystem>,
        processor: Arc<dyn ArtifactProcessor>,
        uploader: Arc<dyn RepositoryUploader>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        let supervisor = Supervisor::new(fs.clone(), config.simulator.poll_interval);
        Self {
            config: Arc::new(config),
            fs,
            supervisor,
            processor,
            uploader,
            publisher,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Drive one request to its end. Never fails: every failure is turned
    /// into exactly one error notification and reported back.
    pub async fn handle(&self, req: RunRequest) -> RunReport {
        let notifier = RunNotifier::new(
            self.publisher.clone(),
            self.config.bus.clone(),
            req.run_id.clone(),
            req.datatype,
        );
        let mut phase = PhaseTracker::new(req.run_id.clone());

        match self.drive(&req, &notifier, &mut phase).await {
            Ok(urls) => {
                info!(run_id = %req.run_id, artifacts = urls.len(), "run finished");
                RunReport {
                    run_id: req.run_id,
                    phase: phase.current(),
                    urls,
                    error: None,
                }
            }
            Err(err) => {
                error!(run_id = %req.run_id, phase = %phase.current(), error = %err, "run failed");
                phase.fail();
                let message = format!("{} error: {err}", req.run_id);
                notifier.error(message.clone()).await;
                RunReport {
                    run_id: req.run_id,
                    phase: phase.current(),
                    urls: Vec::new(),
                    error: Some(message),
                }
            }
        }
    }

    async fn drive(
        &self,
        req: &RunRequest,
        notifier: &RunNotifier,
        phase: &mut PhaseTracker,
    ) -> Result<Vec<String>> {
        if !is_valid_run_id(&req.run_id) {
            return Err(PropagatorError::Translation(format!(
                "run id '{}' is not a valid directory name",
                req.run_id
            )));
        }
        if table::select(req.datatype).is_empty() {
            return Err(PropagatorError::Translation(format!(
                "unsupported datatype {}",
                req.datatype
            )));
        }

        let params = parse_request_body(&req.body)?;
        let now = Local::now().naive_local();
        let run = Run::new(
            &req.run_id,
            req.user_id.clone(),
            req.datatype,
            &params,
            &self.config,
            now,
        )?;
        info!(
            run_id = %run.run_id,
            datatype = %run.datatype,
            start = %run.start,
            end = %run.end,
            cutoff = run.cutoff,
            "run accepted"
        );

        let spec = run.process_spec(&self.config.simulator);
        let state = self.supervisor.markers(&spec).state()?;
        if state.is_running() {
            info!(run_id = %run.run_id, dir = ?run.dir, "simulation already running, attaching");
        } else {
            self.stage(&run, &req.body, &params)?;
        }

        phase.advance(RunPhase::Running)?;
        let (progress_tx, forwarder) = self.progress_forwarder(notifier);
        let outcome = self.supervisor.start(&spec, progress_tx).await;
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }
        match outcome? {
            ProcessOutcome::Completed => {}
            ProcessOutcome::Failed(description) => {
                return Err(PropagatorError::Other(anyhow!(description)));
            }
        }

        phase.advance(RunPhase::PostProcessing)?;
        let extracted = self.extract(&run).await?;

        phase.advance(RunPhase::Publishing)?;
        let urls = self.publish(&run, notifier, &extracted).await?;

        phase.advance(RunPhase::Done)?;
        Ok(urls)
    }

    /// Write the raw request and the translated parameters.
    fn stage(&self, run: &Run, body: &[u8], params: &SimulatorParams) -> Result<()> {
        self.fs.create_dir_all(&run.dir)?;
        let raw: serde_json::Value = serde_json::from_slice(body)?;
        self.fs
            .write(&run.message_file(), &serde_json::to_vec(&raw)?)?;
        self.fs
            .write(&run.param_file(), &serde_json::to_vec(params)?)?;
        debug!(run_id = %run.run_id, dir = ?run.dir, "run staged");
        Ok(())
    }

    /// Channel feeding matching stdout lines to `update` notifications, when
    /// a progress pattern is configured.
    fn progress_forwarder(
        &self,
        notifier: &RunNotifier,
    ) -> (Option<mpsc::Sender<String>>, Option<JoinHandle<()>>) {
        let Some(pattern) = self.config.simulator.progress_pattern.clone() else {
            return (None, None);
        };
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let handle = tokio::spawn(forward_progress(rx, pattern, notifier.clone()));
        (Some(tx), Some(handle))
    }

    async fn extract(&self, run: &Run) -> Result<ExtractedIsochrones> {
        let source = latest_matching(self.fs.as_ref(), &run.dir, &ISOCHRONE_SELECTOR)?
            .ok_or_else(|| {
                PropagatorError::LowConfidence(format!(
                    "no {ISOCHRONE_SELECTOR} output in {:?}",
                    run.dir
                ))
            })?;
        let request = IsochroneRequest {
            source,
            output_dir: run.dir.clone(),
            start: run.start,
            cutoff: run.cutoff,
            tolerance: self.config.cutoff_tolerance,
        };
        self.processor.extract_isochrones(&request).await
    }

    async fn publish(
        &self,
        run: &Run,
        notifier: &RunNotifier,
        extracted: &ExtractedIsochrones,
    ) -> Result<Vec<String>> {
        let metadata = DatalakeMetadata::new(
            PackageInfo {
                title: run.title.clone(),
                notes: run.notes.clone(),
                start: run.start,
                end: run.end,
                spatial: extracted.bbox.to_geojson(),
                request_code: run.run_id.clone(),
            },
            self.config.owner_org.clone(),
        );
        let package_id = self.uploader.create_metadata(&metadata).await?;

        let mut urls = Vec::new();
        for artifact in table::select(run.datatype) {
            let file = self.artifact_file(run, artifact, extracted).await?;
            let resource = ResourceMetadata::for_file(
                &file,
                artifact.format,
                run.start,
                run.end,
                &run.run_id,
                artifact.datatype,
            );
            let url = match self
                .uploader
                .upload_resource(&package_id, &file, &resource)
                .await
            {
                Ok(url) => url,
                Err(err) => {
                    warn!(run_id = %run.run_id, package_id = %package_id, "upload failed, removing metadata");
                    if let Err(delete_err) = self.uploader.delete_metadata(&package_id).await {
                        warn!(package_id = %package_id, error = %delete_err, "metadata removal failed");
                    }
                    return Err(err);
                }
            };
            info!(
                run_id = %run.run_id,
                datatype = %artifact.datatype,
                path = ?file,
                url = ?url,
                "artifact uploaded"
            );
            notifier.artifact_published(artifact.datatype, url.clone()).await?;
            urls.extend(url);
        }

        if run.datatype.is_all() {
            notifier.run_completed(urls.clone()).await?;
        }
        Ok(urls)
    }

    async fn artifact_file(
        &self,
        run: &Run,
        artifact: &ArtifactSpec,
        extracted: &ExtractedIsochrones,
    ) -> Result<PathBuf> {
        match artifact.source {
            ArtifactSource::Isochrones => Ok(extracted.path.clone()),
            ArtifactSource::IsochronesIsotime => Ok(extracted.isotime_path.clone()),
            ArtifactSource::Raster(selector) => {
                let raw = latest_matching(self.fs.as_ref(), &run.dir, &selector)?
                    .ok_or_else(|| anyhow!("no {selector} output in {:?}", run.dir))?;
                self.processor.mask_raster(&raw, &extracted.path).await
            }
        }
    }
}

async fn forward_progress(mut rx: mpsc::Receiver<String>, pattern: Regex, notifier: RunNotifier) {
    while let Some(line) = rx.recv().await {
        if !pattern.is_match(&line) {
            continue;
        }
        if let Err(err) = notifier.progress(line.trim()).await {
            warn!(run_id = %notifier.run_id(), error = %err, "failed to publish progress");
        }
    }
}
