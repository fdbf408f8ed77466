// src/dispatch/inbound.rs

use std::fmt;

use tracing::{debug, info, warn};

use crate::orchestrator::RunRequest;
use crate::types::DatatypeId;

/// A message as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub routing_key: String,
    pub user_id: Option<String>,
    pub body: Vec<u8>,
}

/// Routing key split into its meaningful parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedKey {
    pub datatype: DatatypeId,
    /// Remaining segments joined with `.`.
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRejection {
    TooFewSegments,
    NonNumericDatatype(String),
    Unsupported(DatatypeId),
    /// The run id cannot name a directory of its own under the work dir.
    InvalidRunId(String),
}

impl fmt::Display for RouteRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteRejection::TooFewSegments => f.write_str("routing key has fewer than three segments"),
            RouteRejection::NonNumericDatatype(s) => write!(f, "datatype '{s}' is not numeric"),
            RouteRejection::Unsupported(d) => write!(f, "datatype {d} is not supported"),
            RouteRejection::InvalidRunId(id) => write!(f, "run id '{id}' is not a valid directory name"),
        }
    }
}

/// A run id becomes `<work_dir>/<run_id>`, so it must be a single plain
/// path component.
pub fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && run_id != "."
        && run_id != ".."
        && !run_id.contains(['/', '\\', '\0'])
}

/// Parse `<prefix>.<datatype>.<run id segments...>`.
///
/// An empty datatype segment (`request..r1`) selects `default_datatype`.
pub fn parse_routing_key(
    key: &str,
    supported: &[DatatypeId],
    default_datatype: DatatypeId,
) -> Result<RoutedKey, RouteRejection> {
    let mut parts = key.splitn(3, '.');
    let (Some(_prefix), Some(datatype), Some(run_id)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(RouteRejection::TooFewSegments);
    };
    let datatype: DatatypeId = if datatype.is_empty() {
        default_datatype
    } else {
        datatype
            .parse()
            .map_err(|_| RouteRejection::NonNumericDatatype(datatype.to_string()))?
    };
    if !supported.contains(&datatype) {
        return Err(RouteRejection::Unsupported(datatype));
    }
    if !is_valid_run_id(run_id) {
        return Err(RouteRejection::InvalidRunId(run_id.to_string()));
    }
    Ok(RoutedKey {
        datatype,
        run_id: run_id.to_string(),
    })
}

/// Turn a message into a run request, or drop it with a log line.
pub fn route_message(
    msg: InboundMessage,
    supported: &[DatatypeId],
    default_datatype: DatatypeId,
) -> Option<RunRequest> {
    info!(routing_key = %msg.routing_key, user_id = ?msg.user_id, "received message");
    match parse_routing_key(&msg.routing_key, supported, default_datatype) {
        Ok(routed) => Some(RunRequest {
            run_id: routed.run_id,
            user_id: msg.user_id,
            datatype: routed.datatype,
            body: msg.body,
        }),
        Err(reason @ RouteRejection::Unsupported(_)) => {
            debug!(routing_key = %msg.routing_key, %reason, "message dropped");
            None
        }
        Err(reason) => {
            warn!(routing_key = %msg.routing_key, %reason, "message dropped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::table::supported_datatypes;

    #[test]
    fn run_id_keeps_remaining_segments() {
        let routed = parse_routing_key("request.35006.abc.def", &supported_datatypes(), DatatypeId::ALL).unwrap();
        assert_eq!(routed.datatype, DatatypeId::ALL);
        assert_eq!(routed.run_id, "abc.def");
    }

    #[test]
    fn short_keys_are_rejected() {
        assert_eq!(
            parse_routing_key("request.35006", &supported_datatypes(), DatatypeId::ALL),
            Err(RouteRejection::TooFewSegments)
        );
    }

    #[test]
    fn bad_datatypes_are_rejected() {
        assert_eq!(
            parse_routing_key("request.fire.r1", &supported_datatypes(), DatatypeId::ALL),
            Err(RouteRejection::NonNumericDatatype("fire".into()))
        );
        assert_eq!(
            parse_routing_key("request.35013.r1", &supported_datatypes(), DatatypeId::ALL),
            Err(RouteRejection::Unsupported(DatatypeId(35013)))
        );
    }

    #[test]
    fn route_message_carries_user_and_body() {
        let req = route_message(
            InboundMessage {
                routing_key: "request.35010.r9".into(),
                user_id: Some("cima".into()),
                body: b"{}".to_vec(),
            },
            &supported_datatypes(),
            DatatypeId::ALL,
        )
        .unwrap();
        assert_eq!(req.run_id, "r9");
        assert_eq!(req.datatype, DatatypeId(35010));
        assert_eq!(req.user_id.as_deref(), Some("cima"));
    }

    #[test]
    fn empty_datatype_uses_default() {
        let routed = parse_routing_key("request..r1", &supported_datatypes(), DatatypeId(35011)).unwrap();
        assert_eq!(routed.datatype, DatatypeId(35011));
        assert_eq!(routed.run_id, "r1");
    }

    #[test]
    fn run_ids_escaping_the_work_dir_are_rejected() {
        for (key, run_id) in [
            ("request.35007.", ""),
            ("request.35007..", "."),
            ("request.35007...", ".."),
            ("request.35007./etc", "/etc"),
            ("request.35007.a/b", "a/b"),
            ("request.35007.a\\b", "a\\b"),
        ] {
            assert_eq!(
                parse_routing_key(key, &supported_datatypes(), DatatypeId::ALL),
                Err(RouteRejection::InvalidRunId(run_id.to_string())),
                "{key}"
            );
        }
    }
}
