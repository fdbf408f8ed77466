// src/bus/mod.rs

//! Outbound status notifications.
//!
//! [`RunNotifier`] builds the per-run messages; a [`NotificationPublisher`]
//! delivers them ([`LogPublisher`] or [`OutboxPublisher`]).

pub mod message;
pub mod notifier;
pub mod publisher;

pub use message::{status_routing_key, MessageProperties, OutboundMessage, StatusMessage};
pub use notifier::{BusSettings, RunNotifier};
pub use publisher::{LogPublisher, NotificationPublisher, OutboxPublisher};
