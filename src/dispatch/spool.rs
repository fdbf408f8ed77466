// src/dispatch/spool.rs

//! Spool-directory inbox.
//!
//! Each `<routing_key>.json` file dropped into the directory is one message.
//! Producers should write under a dot-prefixed name and rename, since
//! dot-files are ignored. A file is removed as soon as it has been read, so
//! every message is delivered at most once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use notify::event::{CreateKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;

use super::dispatcher::DispatchEvent;
use super::inbound::InboundMessage;

/// Keeps the watcher alive; dropping it stops the inbox.
pub struct SpoolHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for SpoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolHandle").finish()
    }
}

#[derive(Debug, Clone)]
struct Spool {
    fs: Arc<dyn FileSystem>,
    matcher: GlobMatcher,
}

impl Spool {
    fn new(fs: Arc<dyn FileSystem>) -> Result<Self> {
        let matcher = Glob::new("*.json")
            .context("building spool glob")?
            .compile_matcher();
        Ok(Self { fs, matcher })
    }

    fn routing_key(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') || !self.matcher.is_match(name) {
            return None;
        }
        let key = name.strip_suffix(".json")?;
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Read and remove one spool file.
    fn take(&self, path: &Path) -> Option<InboundMessage> {
        let routing_key = self.routing_key(path)?;
        if !self.fs.is_file(path) {
            return None;
        }
        let body = match self.fs.read(path) {
            Ok(body) => body,
            Err(err) => {
                debug!(path = ?path, error = %err, "spool file vanished before it was read");
                return None;
            }
        };
        if let Err(err) = self.fs.remove_file(path) {
            // Another consumer got there first.
            debug!(path = ?path, error = %err, "spool file already taken");
            return None;
        }
        Some(InboundMessage {
            routing_key,
            user_id: None,
            body,
        })
    }

    /// Messages already waiting, oldest first.
    fn drain(&self, dir: &Path) -> Result<Vec<InboundMessage>> {
        let mut pending: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for path in self.fs.read_dir(dir)? {
            if self.routing_key(&path).is_some() && self.fs.is_file(&path) {
                pending.push((self.fs.modified(&path)?, path));
            }
        }
        pending.sort();
        Ok(pending.into_iter().filter_map(|(_, p)| self.take(&p)).collect())
    }
}

fn announces_file(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Name(_) | ModifyKind::Data(_) | ModifyKind::Any)
    )
}

/// Start watching `dir` and forward each message to `tx`.
///
/// Files present before the call are forwarded first.
pub async fn spawn_spool_watcher(
    dir: impl Into<PathBuf>,
    fs: Arc<dyn FileSystem>,
    tx: mpsc::Sender<DispatchEvent>,
) -> Result<SpoolHandle> {
    let dir = dir.into();
    fs.create_dir_all(&dir)?;
    let spool = Spool::new(fs)?;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("propagator: failed to forward inbox event: {err}");
                }
            }
            Err(err) => eprintln!("propagator: inbox watch error: {err}"),
        },
        Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(dir = ?dir, "inbox watcher started");

    for msg in spool.drain(&dir)? {
        if tx.send(DispatchEvent::Message(msg)).await.is_err() {
            return Ok(SpoolHandle { _inner: watcher });
        }
    }

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !announces_file(&event.kind) {
                continue;
            }
            for path in event.paths {
                let Some(msg) = spool.take(&path) else {
                    continue;
                };
                if tx.send(DispatchEvent::Message(msg)).await.is_err() {
                    warn!("dispatcher gone, stopping inbox");
                    return;
                }
            }
        }
        debug!("inbox event loop finished");
    });

    Ok(SpoolHandle { _inner: watcher })
}
