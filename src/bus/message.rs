// src/bus/message.rs

use serde::{Deserialize, Serialize};

use crate::types::{DatatypeId, UpdateType};

/// JSON body of a status notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub datatype_id: DatatypeId,
    pub status_code: u16,
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    #[serde(default)]
    pub urls: Vec<String>,
    pub message: String,
}

/// Broker properties attached to every notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    pub content_type: String,
    pub content_encoding: String,
    /// 2 = persistent.
    pub delivery_mode: u8,
    pub app_id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl MessageProperties {
    pub fn new(app_id: &str, run_id: &str, user_id: Option<String>) -> Self {
        Self {
            content_type: "application/json".to_string(),
            content_encoding: "utf-8".to_string(),
            delivery_mode: 2,
            app_id: app_id.to_string(),
            message_id: run_id.to_string(),
            user_id,
        }
    }
}

/// A notification ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub properties: MessageProperties,
    pub body: StatusMessage,
}

impl OutboundMessage {
    pub fn is_error(&self) -> bool {
        self.body.status_code >= 500
    }
}

/// `status.<app>.<code>.<run_id>`
pub fn status_routing_key(app_id: &str, datatype: DatatypeId, run_id: &str) -> String {
    format!("status.{app_id}.{datatype}.{run_id}")
}
