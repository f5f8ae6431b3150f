//! Chunked artifact reassembly.
//!
//! A chunk stream is valid when `remainingChunks` strictly decreases by one
//! from the first observed value down to 0. Anything else means a chunk was
//! lost in transit, and a partially reassembled artifact must never be
//! accepted: the whole retrieval fails hard.

use std::time::Duration;

use sha2::{Digest, Sha256};

use dab_protocol::{ChunkMessage, ProtocolError};

/// Reassembly failure.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// Gap in the chunk sequence. Not locally recoverable: the caller
    /// restarts collection from the source.
    #[error("lost chunk: expected remainingChunks {expected}, observed {actual}")]
    LostChunk { expected: u64, actual: u64 },

    /// A chunk arrived after the terminal chunk.
    #[error("chunk received after the artifact was sealed")]
    AlreadySealed,

    /// The artifact was requested before the terminal chunk.
    #[error("artifact is not sealed yet")]
    NotSealed,

    /// Chunk message could not be decoded.
    #[error("undecodable chunk message: {0}")]
    BadChunk(#[from] ProtocolError),

    /// The next chunk did not arrive in time.
    #[error("timed out after {waited:?} waiting for the next chunk")]
    Timeout { waited: Duration },
}

/// Progress after accepting one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkProgress {
    /// More chunks are expected.
    Open,
    /// The terminal chunk arrived; the artifact is complete.
    Sealed,
}

/// A fully reassembled artifact.
#[derive(Debug, Clone)]
pub struct SealedArtifact {
    /// Concatenated chunk payloads, in arrival order.
    pub bytes: Vec<u8>,

    /// SHA-256 of `bytes`, hex-encoded.
    pub sha256_hex: String,

    /// Number of chunks the artifact was carried in.
    pub chunk_count: u64,
}

/// Accumulates one artifact's chunks.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    /// `remainingChunks` of the last accepted chunk; `None` until the
    /// first chunk is seen.
    previous_remaining: Option<u64>,
    buf: Vec<u8>,
    chunk_count: u64,
    sealed: bool,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next chunk of the stream.
    ///
    /// The gap check runs before the payload is decoded, so a lost chunk
    /// is reported even when the straggler itself is undecodable.
    pub fn receive(&mut self, chunk: &ChunkMessage) -> Result<ChunkProgress, ChunkError> {
        if self.sealed {
            return Err(ChunkError::AlreadySealed);
        }
        if let Some(previous) = self.previous_remaining {
            let expected = previous - 1;
            if chunk.remaining_chunks != expected {
                return Err(ChunkError::LostChunk {
                    expected,
                    actual: chunk.remaining_chunks,
                });
            }
        }

        let data = chunk.decode_data()?;
        self.buf.extend_from_slice(&data);
        self.chunk_count += 1;
        self.previous_remaining = Some(chunk.remaining_chunks);

        if chunk.remaining_chunks == 0 {
            self.sealed = true;
            Ok(ChunkProgress::Sealed)
        } else {
            Ok(ChunkProgress::Open)
        }
    }

    /// True once the terminal chunk has been accepted.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Convert the accumulated buffer into the final artifact.
    pub fn into_artifact(self) -> Result<SealedArtifact, ChunkError> {
        if !self.sealed {
            return Err(ChunkError::NotSealed);
        }
        let sha256_hex = hex::encode(Sha256::digest(&self.buf));
        Ok(SealedArtifact {
            bytes: self.buf,
            sha256_hex,
            chunk_count: self.chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn chunk(remaining: u64, data: &[u8]) -> ChunkMessage {
        ChunkMessage {
            remaining_chunks: remaining,
            data: BASE64.encode(data),
        }
    }

    #[test]
    fn test_in_order_stream_seals() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.receive(&chunk(3, b"aa")).unwrap(), ChunkProgress::Open);
        assert_eq!(assembler.receive(&chunk(2, b"bb")).unwrap(), ChunkProgress::Open);
        assert_eq!(assembler.receive(&chunk(1, b"cc")).unwrap(), ChunkProgress::Open);
        assert_eq!(assembler.receive(&chunk(0, b"dd")).unwrap(), ChunkProgress::Sealed);
        assert!(assembler.is_sealed());

        let artifact = assembler.into_artifact().unwrap();
        assert_eq!(artifact.bytes, b"aabbccdd");
        assert_eq!(artifact.chunk_count, 4);
        assert_eq!(artifact.sha256_hex.len(), 64);
    }

    #[test]
    fn test_single_chunk_artifact() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.receive(&chunk(0, b"only")).unwrap(), ChunkProgress::Sealed);
        assert_eq!(assembler.into_artifact().unwrap().bytes, b"only");
    }

    #[test]
    fn test_gap_is_a_lost_chunk() {
        let mut assembler = ChunkAssembler::new();
        assembler.receive(&chunk(3, b"aa")).unwrap();
        let err = assembler.receive(&chunk(1, b"cc")).unwrap_err();
        assert!(matches!(
            err,
            ChunkError::LostChunk {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_repeated_remaining_is_a_lost_chunk() {
        let mut assembler = ChunkAssembler::new();
        assembler.receive(&chunk(2, b"aa")).unwrap();
        assert!(matches!(
            assembler.receive(&chunk(2, b"aa")),
            Err(ChunkError::LostChunk { .. })
        ));
    }

    #[test]
    fn test_chunk_after_seal_is_rejected() {
        let mut assembler = ChunkAssembler::new();
        assembler.receive(&chunk(0, b"done")).unwrap();
        assert!(matches!(
            assembler.receive(&chunk(0, b"late")),
            Err(ChunkError::AlreadySealed)
        ));
    }

    #[test]
    fn test_unsealed_artifact_is_refused() {
        let mut assembler = ChunkAssembler::new();
        assembler.receive(&chunk(2, b"aa")).unwrap();
        assert!(matches!(
            assembler.into_artifact(),
            Err(ChunkError::NotSealed)
        ));
    }

    #[test]
    fn test_bad_base64_fails_decoding() {
        let mut assembler = ChunkAssembler::new();
        let bad = ChunkMessage {
            remaining_chunks: 0,
            data: "***".to_string(),
        };
        assert!(matches!(
            assembler.receive(&bad),
            Err(ChunkError::BadChunk(_))
        ));
    }
}
