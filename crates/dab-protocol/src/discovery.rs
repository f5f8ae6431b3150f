//! Discovery reply payloads.
//!
//! Devices answer a discovery probe with a small JSON object naming
//! themselves. Two field-name generations are in the wild for both the
//! identifier (`deviceId` / `device_id`) and the address (`ip` /
//! `ipAddress`); both are accepted.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Raw discovery reply as found on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceReply {
    #[serde(rename = "deviceId", alias = "device_id")]
    pub device_id: Option<String>,

    #[serde(rename = "ip", alias = "ipAddress")]
    pub ip: Option<String>,
}

/// One device known to a discovery run, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub device_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl DeviceReply {
    /// Parse a reply payload and require a non-empty device identifier.
    ///
    /// Empty-string addresses are normalized to absent.
    pub fn parse(payload: &[u8]) -> Result<DiscoveredDevice, ProtocolError> {
        let reply: DeviceReply = serde_json::from_slice(payload)?;
        let device_id = reply
            .device_id
            .filter(|id| !id.is_empty())
            .ok_or(ProtocolError::MissingDeviceId)?;
        let ip = reply.ip.filter(|ip| !ip.is_empty());
        Ok(DiscoveredDevice { device_id, ip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_variant() {
        let dev = DeviceReply::parse(br#"{"deviceId": "tv-1", "ip": "10.0.0.9"}"#).unwrap();
        assert_eq!(dev.device_id, "tv-1");
        assert_eq!(dev.ip.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_parse_snake_case_and_ip_address_variant() {
        let dev = DeviceReply::parse(br#"{"device_id": "tv-2", "ipAddress": "10.0.0.7"}"#).unwrap();
        assert_eq!(dev.device_id, "tv-2");
        assert_eq!(dev.ip.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_parse_without_address() {
        let dev = DeviceReply::parse(br#"{"deviceId": "tv-3"}"#).unwrap();
        assert_eq!(dev.ip, None);
    }

    #[test]
    fn test_empty_address_is_absent() {
        let dev = DeviceReply::parse(br#"{"deviceId": "tv-4", "ip": ""}"#).unwrap();
        assert_eq!(dev.ip, None);
    }

    #[test]
    fn test_missing_identifier_is_an_error() {
        assert!(matches!(
            DeviceReply::parse(br#"{"ip": "10.0.0.1"}"#),
            Err(ProtocolError::MissingDeviceId)
        ));
    }
}
