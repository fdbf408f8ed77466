// src/lib.rs

pub mod artifacts;
pub mod bus;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod orchestrator;
pub mod repository;
pub mod supervisor;
pub mod translate;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::artifacts::table::{supported_datatypes, ArtifactSource, ARTIFACTS};
use crate::artifacts::GeoProcessor;
use crate::bus::{LogPublisher, NotificationPublisher, OutboxPublisher};
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dispatch::{route_message, spawn_spool_watcher, DispatchEvent, Dispatcher, InboundMessage};
use crate::fs::{FileSystem, RealFileSystem};
use crate::orchestrator::{OrchestratorConfig, RunOrchestrator};

const DISPATCH_BUFFER: usize = 64;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - repository, publisher and post-processor
/// - the orchestrator and dispatch loop
/// - the spool inbox watcher (disabled in --once mode)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {config_path:?}"))?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let orchestrator = build_orchestrator(&cfg, fs.clone())?;

    if args.once {
        return run_once(orchestrator, &args).await;
    }

    let (tx, rx) = mpsc::channel::<DispatchEvent>(DISPATCH_BUFFER);

    // The dispatcher must be consuming before the inbox drains its backlog.
    let dispatcher = tokio::spawn(Dispatcher::new(orchestrator, rx).run(false));

    let _inbox = spawn_spool_watcher(&cfg.inbox.dir, fs, tx.clone()).await?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(DispatchEvent::ShutdownRequested).await;
        });
    }
    drop(tx);

    let reports = dispatcher.await.context("dispatcher task failed")?;
    info!(runs = reports.len(), "propagator-runner stopped");
    Ok(())
}

/// Assemble the orchestrator and its collaborators from a validated config.
pub fn build_orchestrator(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<RunOrchestrator> {
    let config = OrchestratorConfig::from_config(cfg)?;
    let processor = Arc::new(GeoProcessor::new(fs.clone(), cfg.postprocess.mask_command.clone()));
    let uploader = repository::from_config(&cfg.repository, fs.clone())?;
    let publisher: Arc<dyn NotificationPublisher> = match &cfg.bus.outbox {
        Some(path) => Arc::new(OutboxPublisher::new(path.clone())),
        None => Arc::new(LogPublisher),
    };
    Ok(RunOrchestrator::new(config, fs, processor, uploader, publisher))
}

async fn run_once(orchestrator: RunOrchestrator, args: &CliArgs) -> Result<()> {
    let (Some(routing_key), Some(message)) = (&args.routing_key, &args.message) else {
        bail!("--once needs --routing-key and --message");
    };
    let body = std::fs::read(message).with_context(|| format!("reading message {message:?}"))?;
    let msg = InboundMessage {
        routing_key: routing_key.clone(),
        user_id: None,
        body,
    };
    let default_datatype = orchestrator.config().default_datatype;
    let Some(req) = route_message(msg, &supported_datatypes(), default_datatype) else {
        bail!("routing key '{routing_key}' does not name a supported request");
    };

    let report = orchestrator.handle(req).await;
    match report.error {
        Some(error) => bail!(error),
        None => {
            for url in &report.urls {
                println!("{url}");
            }
            Ok(())
        }
    }
}

/// Print the resolved settings and the artifact table.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let resolved = OrchestratorConfig::from_config(cfg)?;

    println!("propagator-runner dry-run");
    println!("  work_dir = {:?}", resolved.work_dir);
    println!("  inbox = {:?}", cfg.inbox.dir);
    println!(
        "  simulator = {} {}",
        resolved.simulator.program,
        resolved.simulator.args.join(" ")
    );
    println!("  simulator.cwd = {:?}", resolved.simulator.cwd);
    println!("  poll_interval = {:?}", resolved.simulator.poll_interval);
    if let Some(ref pattern) = resolved.simulator.progress_pattern {
        println!("  progress_pattern = {pattern}");
    }
    println!("  default_datatype = {}", resolved.default_datatype);
    println!(
        "  default_run_length = {}h",
        resolved.default_run_length.num_hours()
    );
    println!("  cutoff = {} (tolerance {})", resolved.default_cutoff, resolved.cutoff_tolerance);
    println!(
        "  bus = exchange {} app_id {} outbox {:?}",
        resolved.bus.exchange, resolved.bus.app_id, cfg.bus.outbox
    );
    println!("  repository = {:?}", cfg.repository);
    println!("  mask_command = {}", cfg.postprocess.mask_command.join(" "));
    println!();

    println!("artifacts ({}):", ARTIFACTS.len());
    for artifact in ARTIFACTS {
        let source = match artifact.source {
            ArtifactSource::Isochrones => "filtered isochrones".to_string(),
            ArtifactSource::IsochronesIsotime => "filtered isochrones, isotime".to_string(),
            ArtifactSource::Raster(selector) => format!("{selector} (masked)"),
        };
        println!(
            "  - {} {}: {} [{}]",
            artifact.datatype, artifact.name, source, artifact.format
        );
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
