//! Response envelope and wire normalization.
//!
//! Replies arrive as raw bytes in whatever shape the device produced: a
//! JSON object with a `status` field, a JSON value of some other shape, or
//! not JSON at all. `DabResponse::from_wire` is the single point where that
//! variability is collapsed into the canonical `{status, body}` record;
//! downstream code never branches on wire shape again.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status;

/// Canonical form of one DAB reply.
///
/// Exactly one `DabResponse` is produced per request outcome: success,
/// malformed body, or timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DabResponse {
    /// Device-reported status, or one of the local sentinels.
    pub status: i64,

    /// Parsed reply body, when the payload was valid JSON.
    pub body: Option<Value>,
}

impl DabResponse {
    /// Normalize a raw reply payload.
    ///
    /// Any valid JSON is kept as the body; the status is taken from an
    /// integer `status` field when one exists and defaults to the
    /// `UNKNOWN` sentinel otherwise. Non-JSON payloads yield an empty
    /// body with `UNKNOWN` status.
    pub fn from_wire(payload: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(payload) {
            Ok(body) => {
                let status = body
                    .get("status")
                    .and_then(Value::as_i64)
                    .unwrap_or(status::UNKNOWN);
                Self {
                    status,
                    body: Some(body),
                }
            }
            Err(_) => Self {
                status: status::UNKNOWN,
                body: None,
            },
        }
    }

    /// The response produced when a call deadline elapses.
    pub fn timed_out() -> Self {
        Self {
            status: status::TIMEOUT,
            body: None,
        }
    }

    /// True when the device reported success.
    pub fn is_ok(&self) -> bool {
        status::is_ok(self.status)
    }

    /// True when this response is the local timeout sentinel.
    pub fn is_timeout(&self) -> bool {
        status::is_timeout(self.status)
    }

    /// Look up a field of the body object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_wire_extracts_status() {
        let resp = DabResponse::from_wire(br#"{"status": 200, "state": "FOREGROUND"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.field("state"), Some(&json!("FOREGROUND")));
    }

    #[test]
    fn test_from_wire_without_status_field() {
        let resp = DabResponse::from_wire(br#"{"state": "BACKGROUND"}"#);
        assert_eq!(resp.status, status::UNKNOWN);
        assert!(resp.body.is_some());
    }

    #[test]
    fn test_from_wire_non_integer_status_is_unknown() {
        let resp = DabResponse::from_wire(br#"{"status": "ok"}"#);
        assert_eq!(resp.status, status::UNKNOWN);
    }

    #[test]
    fn test_from_wire_non_json_payload() {
        let resp = DabResponse::from_wire(b"not json at all");
        assert_eq!(resp.status, status::UNKNOWN);
        assert!(resp.body.is_none());
    }

    #[test]
    fn test_from_wire_non_object_json_is_kept() {
        let resp = DabResponse::from_wire(b"[1, 2, 3]");
        assert_eq!(resp.status, status::UNKNOWN);
        assert_eq!(resp.body, Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_timed_out_sentinel() {
        let resp = DabResponse::timed_out();
        assert!(resp.is_timeout());
        assert!(resp.body.is_none());
    }
}
