//! The protocol-engine boundary.
//!
//! The external DHCP engine delivers structured events as single JSON lines
//! and expects a single-line offer/ack/nak back per discover or request.
//! Payloads are validated once here, on ingress; the manager never inspects
//! raw JSON.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Inbound event from the protocol engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A client is discovering; the engine wants an address to offer.
    #[serde(rename = "discover")]
    #[serde(rename_all = "camelCase")]
    Discover { hardware_address: String },

    /// A client is requesting a binding, optionally for a specific address.
    #[serde(rename = "request")]
    #[serde(rename_all = "camelCase")]
    Request {
        hardware_address: String,
        #[serde(default)]
        requested_address: Option<Ipv4Addr>,
    },

    /// The engine confirms one or more bindings at once.
    #[serde(rename = "bound")]
    #[serde(rename_all = "camelCase")]
    Bound {
        bindings_by_hardware_address: HashMap<String, Binding>,
    },
}

/// One confirmed binding inside a [`Event::Bound`] report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub address: Ipv4Addr,
    /// Engine-reported bind timestamp (ms since epoch); the manager's clock
    /// is used when absent.
    #[serde(default)]
    pub bind_time: Option<i64>,
}

/// Outbound reply to the engine for a discover or request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "offer")]
    Offer { address: Ipv4Addr },
    #[serde(rename = "ack")]
    Ack { address: Ipv4Addr },
    #[serde(rename = "nak")]
    Nak { reason: String },
}

/// One-line stdout notification emitted when the distinguished device
/// obtains a binding. The host process picks this up to start a diagnostic
/// session, so it must be parseable independent of surrounding output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EcuNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub mac: String,
    pub ip: Ipv4Addr,
}

impl EcuNotification {
    pub fn new(mac: String, ip: Ipv4Addr) -> Self {
        Self {
            kind: "ecu-ip-assigned".to_string(),
            mac,
            ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_discover() {
        let event: Event =
            serde_json::from_str(r#"{"type":"discover","hardwareAddress":"AA:BB:CC:DD:30:60"}"#)
                .unwrap();
        assert_eq!(
            event,
            Event::Discover {
                hardware_address: "AA:BB:CC:DD:30:60".to_string()
            }
        );
    }

    #[test]
    fn test_parse_request_with_and_without_address() {
        let event: Event = serde_json::from_str(
            r#"{"type":"request","hardwareAddress":"aa-bb-cc-dd-ee-ff","requestedAddress":"10.0.0.7"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            Event::Request {
                hardware_address: "aa-bb-cc-dd-ee-ff".to_string(),
                requested_address: Some(Ipv4Addr::new(10, 0, 0, 7)),
            }
        );

        let event: Event =
            serde_json::from_str(r#"{"type":"request","hardwareAddress":"aa-bb-cc-dd-ee-ff"}"#)
                .unwrap();
        assert_eq!(
            event,
            Event::Request {
                hardware_address: "aa-bb-cc-dd-ee-ff".to_string(),
                requested_address: None,
            }
        );
    }

    #[test]
    fn test_parse_bound_bulk() {
        let event: Event = serde_json::from_str(
            r#"{
                "type": "bound",
                "bindingsByHardwareAddress": {
                    "aa-bb-cc-dd-ee-01": {"address": "10.0.0.5", "bindTime": 123},
                    "aa-bb-cc-dd-ee-02": {"address": "10.0.0.6"}
                }
            }"#,
        )
        .unwrap();

        let Event::Bound {
            bindings_by_hardware_address: bindings,
        } = event
        else {
            panic!("expected bound event");
        };
        assert_eq!(bindings.len(), 2);
        assert_eq!(
            bindings["aa-bb-cc-dd-ee-01"].bind_time,
            Some(123)
        );
        assert_eq!(bindings["aa-bb-cc-dd-ee-02"].bind_time, None);
    }

    #[test]
    fn test_malformed_event_rejected() {
        assert!(serde_json::from_str::<Event>(r#"{"type":"release"}"#).is_err());
        assert!(serde_json::from_str::<Event>(r#"{"type":"discover"}"#).is_err());
        assert!(serde_json::from_str::<Event>("not json").is_err());
    }

    #[test]
    fn test_response_wire_shape() {
        let offer = Response::Offer {
            address: Ipv4Addr::new(10, 0, 0, 50),
        };
        assert_eq!(
            serde_json::to_string(&offer).unwrap(),
            r#"{"type":"offer","address":"10.0.0.50"}"#
        );

        let nak = Response::Nak {
            reason: "requested IP conflict".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&nak).unwrap(),
            r#"{"type":"nak","reason":"requested IP conflict"}"#
        );
    }

    #[test]
    fn test_notification_wire_shape() {
        let notification = EcuNotification::new(
            "aa-bb-cc-dd-30-60".to_string(),
            Ipv4Addr::new(10, 0, 0, 50),
        );
        assert_eq!(
            serde_json::to_string(&notification).unwrap(),
            r#"{"type":"ecu-ip-assigned","mac":"aa-bb-cc-dd-30-60","ip":"10.0.0.50"}"#
        );
    }
}
