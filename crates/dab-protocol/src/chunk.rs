//! Chunked artifact messages.
//!
//! Large logical responses (log bundles and similar artifacts) are split
//! across multiple messages on the same reply topic. Each chunk announces
//! how many chunks remain after it; the terminal chunk carries
//! `remainingChunks: 0`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// One message of a chunked artifact stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMessage {
    /// Number of chunks still to come after this one. Must strictly
    /// decrease across the stream and end at 0.
    pub remaining_chunks: u64,

    /// Base64-encoded chunk payload.
    pub data: String,
}

impl ChunkMessage {
    /// Parse a chunk message from a raw payload.
    pub fn from_wire(payload: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Decode the base64 chunk payload.
    pub fn decode_data(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(BASE64.decode(self.data.as_bytes())?)
    }
}
