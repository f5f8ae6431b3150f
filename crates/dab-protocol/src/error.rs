//! Protocol parse errors.

/// Failure to interpret a wire payload.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Payload was not the expected JSON shape.
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Chunk payload was not valid base64.
    #[error("invalid base64 chunk payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Discovery reply carried no usable device identifier.
    #[error("discovery reply carried no device identifier")]
    MissingDeviceId,
}
