// tests/dispatch_inbox.rs

#![cfg(unix)]

mod common;
use crate::common::{
    eventually, init_tracing, isochrone_layer, request_body, simulator_writing_outputs, with_timeout,
    FakeProcessor, FakeUploader, OrchestratorConfigBuilder, RecordingPublisher,
};

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;

use propagator_runner::dispatch::{spawn_spool_watcher, DispatchEvent, Dispatcher, InboundMessage};
use propagator_runner::fs::RealFileSystem;
use propagator_runner::orchestrator::{OrchestratorConfig, RunOrchestrator};
use propagator_runner::supervisor::{ERROR_MARKER, RUNNING_MARKER};

fn orchestrator(config: OrchestratorConfig, publisher: &RecordingPublisher) -> RunOrchestrator {
    RunOrchestrator::new(
        config,
        Arc::new(RealFileSystem),
        Arc::new(FakeProcessor::new()),
        Arc::new(FakeUploader::new()),
        Arc::new(publisher.clone()),
    )
}

/// Write a spool file the way producers should: dot-file, then rename.
fn drop_message(inbox: &Path, routing_key: &str, body: &[u8]) {
    let partial = inbox.join(format!(".{routing_key}.json"));
    std::fs::write(&partial, body).unwrap();
    std::fs::rename(&partial, inbox.join(format!("{routing_key}.json"))).unwrap();
}

#[tokio::test]
async fn inbox_backlog_and_new_files_become_runs() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let inbox = tmp.path().join("inbox");
    std::fs::create_dir_all(&inbox).unwrap();

    let layer = isochrone_layer(&[(0.75, 1.0)]);
    let config = OrchestratorConfigBuilder::new(&tmp.path().join("work"))
        .script(&simulator_writing_outputs(&layer))
        .build();
    let publisher = RecordingPublisher::new();

    drop_message(&inbox, "request.35007.a", &request_body(json!({})));

    let (tx, rx) = mpsc::channel(16);
    let dispatcher = tokio::spawn(Dispatcher::new(orchestrator(config, &publisher), rx).run(true));
    let _handle = spawn_spool_watcher(&inbox, Arc::new(RealFileSystem), tx.clone())
        .await
        .unwrap();

    drop_message(&inbox, "request.35007.b", &request_body(json!({})));
    drop_message(&inbox, "request.35013.c", b"{}");

    let watched = publisher.clone();
    eventually(move || watched.successes().len() == 2).await;
    let unsupported = inbox.join("request.35013.c.json");
    eventually(move || !unsupported.exists()).await;

    tx.send(DispatchEvent::ShutdownRequested).await.unwrap();
    let reports = with_timeout(dispatcher).await.unwrap();

    let mut run_ids: Vec<_> = reports.iter().map(|r| r.run_id.clone()).collect();
    run_ids.sort();
    assert_eq!(run_ids, vec!["a", "b"]);
    assert!(reports.iter().all(|r| r.succeeded()));
    assert!(publisher.errors().is_empty());
    assert!(!inbox.join("request.35007.a.json").exists());
    assert!(!inbox.join("request.35007.b.json").exists());
}

#[tokio::test]
async fn shutdown_aborts_in_flight_runs_and_releases_markers() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let config = OrchestratorConfigBuilder::new(tmp.path())
        .script("sleep 5")
        .build();
    let publisher = RecordingPublisher::new();

    let (tx, rx) = mpsc::channel(16);
    let dispatcher = tokio::spawn(Dispatcher::new(orchestrator(config, &publisher), rx).run(false));

    tx.send(DispatchEvent::Message(InboundMessage {
        routing_key: "request.35006.slow".to_string(),
        user_id: None,
        body: request_body(json!({})),
    }))
    .await
    .unwrap();

    let running = tmp.path().join("slow").join(RUNNING_MARKER);
    let seen = running.clone();
    eventually(move || seen.exists()).await;

    tx.send(DispatchEvent::ShutdownRequested).await.unwrap();
    let reports = with_timeout(dispatcher).await.unwrap();

    assert!(reports.is_empty());
    assert!(!running.exists());
    assert!(tmp.path().join("slow").join(ERROR_MARKER).is_file());
}

#[tokio::test]
async fn closing_the_channel_stops_the_dispatcher() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let config = OrchestratorConfigBuilder::new(tmp.path()).build();
    let publisher = RecordingPublisher::new();

    let (tx, rx) = mpsc::channel(1);
    drop(tx);
    let reports = with_timeout(Dispatcher::new(orchestrator(config, &publisher), rx).run(true)).await;
    assert!(reports.is_empty());
    assert!(publisher.messages().is_empty());
}
