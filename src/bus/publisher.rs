// src/bus/publisher.rs

use std::fmt::Debug;
use std::path::PathBuf;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::{PropagatorError, Result};
use crate::types::BoxFuture;

use super::message::OutboundMessage;

/// Delivery seam for status notifications.
pub trait NotificationPublisher: Send + Sync + Debug {
    fn publish<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<()>>;
}

/// Only logs what would be sent.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl NotificationPublisher for LogPublisher {
    fn publish<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = serde_json::to_string(&message.body)?;
            info!(
                exchange = %message.exchange,
                routing_key = %message.routing_key,
                status_code = message.body.status_code,
                body = %body,
                "notification"
            );
            Ok(())
        })
    }
}

/// Appends each message as one JSON line to a file that a relay can ship
/// to the broker.
#[derive(Debug)]
pub struct OutboxPublisher {
    path: PathBuf,
    // Serializes appends from concurrent runs.
    lock: Mutex<()>,
}

impl OutboxPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn append(&self, message: &OutboundMessage) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating outbox dir {parent:?}"))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| PropagatorError::Publish(format!("opening {:?}: {e}", self.path)))?;
        file.write_all(&line)
            .await
            .map_err(|e| PropagatorError::Publish(format!("writing {:?}: {e}", self.path)))?;
        file.flush()
            .await
            .map_err(|e| PropagatorError::Publish(format!("flushing {:?}: {e}", self.path)))?;

        info!(routing_key = %message.routing_key, outbox = ?self.path, "notification queued");
        Ok(())
    }
}

impl NotificationPublisher for OutboxPublisher {
    fn publish<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.append(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::message::{MessageProperties, StatusMessage};
    use crate::types::{DatatypeId, UpdateType};

    fn message(code: u16) -> OutboundMessage {
        OutboundMessage {
            exchange: "safers.b2b".into(),
            routing_key: "status.propagator.35006.r1".into(),
            properties: MessageProperties::new("propagator", "r1", None),
            body: StatusMessage {
                datatype_id: DatatypeId::ALL,
                status_code: code,
                update_type: UpdateType::End,
                urls: vec![],
                message: "r1 completed".into(),
            },
        }
    }

    #[tokio::test]
    async fn outbox_appends_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxPublisher::new(dir.path().join("bus/outbox.jsonl"));

        outbox.publish(&message(200)).await.unwrap();
        outbox.publish(&message(500)).await.unwrap();

        let text = std::fs::read_to_string(outbox.path()).unwrap();
        let lines: Vec<OutboundMessage> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].is_error());
        assert!(lines[1].is_error());
    }
}
