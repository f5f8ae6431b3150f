//! Topic derivation scheme.
//!
//! Correlation in DAB is purely topical: a request published to
//! `dab/<device>/<operation>` is answered on `dab/_response/` + the request
//! topic. No message-embedded request IDs are involved, so matching a reply
//! to its request is plain topic equality.

use uuid::Uuid;

/// Root namespace segment for all DAB topics.
pub const ROOT: &str = "dab";

/// Prefix prepended to a request topic to form its reply topic.
pub const REPLY_PREFIX: &str = "dab/_response/";

/// Shared broadcast topic for device discovery probes.
pub const DISCOVERY_TOPIC: &str = "dab/discovery";

/// Build the request topic for an operation on a device.
pub fn request_topic(device_id: &str, operation: &str) -> String {
    format!("{}/{}/{}", ROOT, device_id, operation)
}

/// Derive the reply topic for a request topic.
pub fn reply_topic(request_topic: &str) -> String {
    format!("{}{}", REPLY_PREFIX, request_topic)
}

/// Generate a single-use reply topic for one discovery run.
///
/// The uuid suffix keeps concurrent discovery runs from seeing each
/// other's replies.
pub fn discovery_reply_topic() -> String {
    format!("{}discovery/{}", REPLY_PREFIX, Uuid::new_v4().simple())
}
