// src/dispatch/mod.rs

//! Inbound side: routing keys, the spool inbox and the dispatch loop.

pub mod dispatcher;
pub mod inbound;
pub mod spool;

pub use dispatcher::{DispatchEvent, Dispatcher};
pub use inbound::{is_valid_run_id, parse_routing_key, route_message, InboundMessage, RouteRejection, RoutedKey};
pub use spool::{spawn_spool_watcher, SpoolHandle};
