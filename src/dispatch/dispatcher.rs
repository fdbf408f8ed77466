// src/dispatch/dispatcher.rs

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::artifacts::table::supported_datatypes;
use crate::orchestrator::{RunOrchestrator, RunReport, RunRequest};
use crate::types::DatatypeId;

use super::inbound::{route_message, InboundMessage};

/// Events driving the dispatch loop.
#[derive(Debug)]
pub enum DispatchEvent {
    Message(InboundMessage),
    ShutdownRequested,
}

/// Consumes inbound messages and runs each accepted request on its own
/// task.
#[derive(Debug)]
pub struct Dispatcher {
    orchestrator: RunOrchestrator,
    supported: Vec<DatatypeId>,
    default_datatype: DatatypeId,
    event_rx: mpsc::Receiver<DispatchEvent>,
    runs: JoinSet<RunReport>,
    finished: Vec<RunReport>,
}

impl Dispatcher {
    pub fn new(orchestrator: RunOrchestrator, event_rx: mpsc::Receiver<DispatchEvent>) -> Self {
        Self {
            default_datatype: orchestrator.config().default_datatype,
            orchestrator,
            supported: supported_datatypes(),
            event_rx,
            runs: JoinSet::new(),
            finished: Vec::new(),
        }
    }

    /// Start a run without waiting for it.
    pub fn submit(&mut self, req: RunRequest) {
        info!(run_id = %req.run_id, datatype = %req.datatype, "starting run");
        let orchestrator = self.orchestrator.clone();
        self.runs.spawn(async move { orchestrator.handle(req).await });
    }

    fn dispatch(&mut self, msg: InboundMessage) {
        if let Some(req) = route_message(msg, &self.supported, self.default_datatype) {
            self.submit(req);
        }
    }

    fn record(&mut self, joined: Result<RunReport, JoinError>) {
        match joined {
            Ok(report) => {
                debug!(run_id = %report.run_id, phase = %report.phase, "run task finished");
                self.finished.push(report);
            }
            Err(err) if err.is_cancelled() => debug!("run task cancelled"),
            Err(err) => error!(error = %err, "run task panicked"),
        }
    }

    /// Main loop. Returns when shutdown is requested or every sender is
    /// gone, with the reports of the runs that finished meanwhile.
    ///
    /// With `wait_for_runs` the loop lets in-flight runs finish before
    /// returning; otherwise they are aborted, and their supervisors release
    /// the run markers as they drop.
    pub async fn run(mut self, wait_for_runs: bool) -> Vec<RunReport> {
        info!("dispatcher started");
        loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(DispatchEvent::Message(msg)) => self.dispatch(msg),
                    Some(DispatchEvent::ShutdownRequested) => {
                        info!("shutdown requested");
                        break;
                    }
                    None => {
                        debug!("dispatch channel closed");
                        break;
                    }
                },
                Some(joined) = self.runs.join_next(), if !self.runs.is_empty() => {
                    self.record(joined);
                }
            }
        }

        if wait_for_runs {
            while let Some(joined) = self.runs.join_next().await {
                self.record(joined);
            }
        } else if !self.runs.is_empty() {
            warn!(in_flight = self.runs.len(), "aborting in-flight runs");
            self.runs.shutdown().await;
        }
        info!(finished = self.finished.len(), "dispatcher stopped");
        self.finished
    }
}
