// src/bus/notifier.rs

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::Result;
use crate::types::{DatatypeId, UpdateType, STATUS_ERROR, STATUS_OK};

use super::message::{status_routing_key, MessageProperties, OutboundMessage, StatusMessage};
use super::publisher::NotificationPublisher;

/// Bus-wide values shared by every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSettings {
    pub exchange: String,
    pub app_id: String,
    pub user_id: Option<String>,
}

/// Builds and sends the notifications of one run.
#[derive(Debug, Clone)]
pub struct RunNotifier {
    publisher: Arc<dyn NotificationPublisher>,
    settings: BusSettings,
    run_id: String,
    datatype: DatatypeId,
}

impl RunNotifier {
    pub fn new(
        publisher: Arc<dyn NotificationPublisher>,
        settings: BusSettings,
        run_id: impl Into<String>,
        datatype: DatatypeId,
    ) -> Self {
        Self {
            publisher,
            settings,
            run_id: run_id.into(),
            datatype,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Routing key of the run's requested datatype.
    pub fn run_routing_key(&self) -> String {
        status_routing_key(&self.settings.app_id, self.datatype, &self.run_id)
    }

    fn build(
        &self,
        datatype: DatatypeId,
        status_code: u16,
        update_type: UpdateType,
        message: String,
        urls: Vec<String>,
    ) -> OutboundMessage {
        OutboundMessage {
            exchange: self.settings.exchange.clone(),
            routing_key: status_routing_key(&self.settings.app_id, datatype, &self.run_id),
            properties: MessageProperties::new(
                &self.settings.app_id,
                &self.run_id,
                self.settings.user_id.clone(),
            ),
            body: StatusMessage {
                datatype_id: datatype,
                status_code,
                update_type,
                urls,
                message,
            },
        }
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        info!(
            run_id = %self.run_id,
            routing_key = %message.routing_key,
            status_code = message.body.status_code,
            "sending notification"
        );
        self.publisher.publish(&message).await
    }

    /// Simulator progress line.
    pub async fn progress(&self, line: &str) -> Result<()> {
        let msg = self.build(self.datatype, STATUS_OK, UpdateType::Update, line.to_string(), vec![]);
        self.send(msg).await
    }

    /// One artifact is available, announced on its own datatype's key.
    pub async fn artifact_published(&self, datatype: DatatypeId, url: Option<String>) -> Result<()> {
        let msg = self.build(
            datatype,
            STATUS_OK,
            UpdateType::End,
            format!("{} completed", self.run_id),
            url.into_iter().collect(),
        );
        self.send(msg).await
    }

    /// Aggregate completion for an ALL request.
    pub async fn run_completed(&self, urls: Vec<String>) -> Result<()> {
        let msg = self.build(
            self.datatype,
            STATUS_OK,
            UpdateType::End,
            format!("{} completed", self.run_id),
            urls,
        );
        self.send(msg).await
    }

    /// Terminal failure. Delivery problems are logged, since there is no
    /// further channel to report them on.
    pub async fn error(&self, message: impl Into<String>) {
        let msg = self.build(self.datatype, STATUS_ERROR, UpdateType::End, message.into(), vec![]);
        if let Err(err) = self.send(msg).await {
            warn!(run_id = %self.run_id, error = %err, "failed to publish error notification");
        }
    }
}
