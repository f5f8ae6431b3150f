//! Test doubles for the transport boundary.
//!
//! [`MockBroker`] is an in-process topic bus implementing [`Transport`];
//! [`MockDevice`] is a scriptable DAB responder attached to it. Together
//! they let every integration test and the CLI self-check run a full
//! request/response conversation without a real broker or device.

mod broker;
mod device;

pub use broker::MockBroker;
pub use device::{DiscoveryReplies, MockDevice, MockDeviceConfig};
