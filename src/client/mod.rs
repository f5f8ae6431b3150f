//! Correlated request/response client.
//!
//! A DAB call is an asynchronous pub/sub exchange presented to the caller
//! as a synchronous, deadline-bounded function: publish the request with a
//! reply topic attached, block until the correlated reply arrives or the
//! deadline elapses. Correlation is deterministic topic derivation (see
//! [`dab_protocol::topics`]), so matching a reply needs no embedded IDs.

mod chunks;
mod discovery;

pub use chunks::{ChunkAssembler, ChunkError, ChunkProgress, SealedArtifact};

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

use dab_protocol::{topics, ChunkMessage, DabResponse, Operation};

use crate::transport::{Message, MessageHandler, Transport, TransportError};

/// Default deadline for one correlated call. Generous, because device
/// round-trips routinely take tens of seconds.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Errors surfaced by the client.
///
/// A timeout is NOT among them: an elapsed deadline resolves to the
/// timeout-sentinel [`DabResponse`], never to `Err`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The capability cache already marks this operation unsupported.
    /// Raised instead of publishing: the caller should have gated first.
    #[error("operation '{operation}' is not supported by the device")]
    UnsupportedOperation { operation: String },

    #[error("artifact retrieval failed: {0}")]
    Chunk(#[from] ChunkError),
}

/// One client instance issues one correlated call at a time.
///
/// A second caller on the same instance queues behind the internal guard;
/// independent instances share nothing and run fully in parallel.
pub struct DabClient {
    transport: Arc<dyn Transport>,
    call_guard: Mutex<()>,
}

impl DabClient {
    /// Create a client over a transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            call_guard: Mutex::new(()),
        }
    }

    /// The transport this client publishes through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// [`Self::call`] with the default deadline.
    pub fn call_default(
        &self,
        device_id: &str,
        operation: &Operation,
        payload: &Value,
    ) -> Result<DabResponse, ClientError> {
        self.call(device_id, operation, payload, DEFAULT_CALL_TIMEOUT)
    }

    /// Issue one correlated request and block until the reply or the
    /// deadline.
    ///
    /// Exactly one [`DabResponse`] is produced per call: the parsed reply,
    /// or the timeout sentinel. A reply arriving after the deadline is
    /// dropped. Each call subscribes to the reply topic afresh and
    /// unsubscribes best-effort afterwards; an unsubscribe failure is
    /// logged, not raised.
    pub fn call(
        &self,
        device_id: &str,
        operation: &Operation,
        payload: &Value,
        timeout: Duration,
    ) -> Result<DabResponse, ClientError> {
        let _serial = self.call_guard.lock().unwrap_or_else(PoisonError::into_inner);

        let request_topic = topics::request_topic(device_id, operation.name());
        let reply = topics::reply_topic(&request_topic);
        let body = serde_json::to_vec(payload).map_err(ClientError::Encode)?;

        // Single-slot pending call: the transport thread is the producer,
        // this thread the consumer. The first reply fills the slot; any
        // later send fails and is discarded.
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(1);
        let handler: MessageHandler = Arc::new(move |msg: &Message| {
            let _ = tx.try_send(msg.payload.clone());
        });

        self.transport.subscribe(&reply, handler)?;
        debug!("subscribed to reply topic {reply}");

        if let Err(err) = self.transport.publish(&request_topic, &body, Some(&reply)) {
            self.unsubscribe_best_effort(&reply);
            return Err(err.into());
        }
        debug!("published request to {request_topic}");

        let response = match rx.recv_timeout(timeout) {
            Ok(raw) => DabResponse::from_wire(&raw),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                warn!("no reply on {reply} within {timeout:?}");
                DabResponse::timed_out()
            }
        };

        self.unsubscribe_best_effort(&reply);
        Ok(response)
    }

    /// Retrieve a chunked artifact: one request, several chunk replies on
    /// the correlated topic, reassembled into a single sealed buffer.
    ///
    /// `chunk_timeout` bounds the wait for each individual chunk. A gap in
    /// the chunk sequence is a hard [`ChunkError::LostChunk`] failure;
    /// the caller must restart collection from the source.
    pub fn call_chunked(
        &self,
        device_id: &str,
        operation: &Operation,
        payload: &Value,
        chunk_timeout: Duration,
    ) -> Result<SealedArtifact, ClientError> {
        let _serial = self.call_guard.lock().unwrap_or_else(PoisonError::into_inner);

        let request_topic = topics::request_topic(device_id, operation.name());
        let reply = topics::reply_topic(&request_topic);
        let body = serde_json::to_vec(payload).map_err(ClientError::Encode)?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let handler: MessageHandler = Arc::new(move |msg: &Message| {
            let _ = tx.send(msg.payload.clone());
        });

        self.transport.subscribe(&reply, handler)?;
        if let Err(err) = self.transport.publish(&request_topic, &body, Some(&reply)) {
            self.unsubscribe_best_effort(&reply);
            return Err(err.into());
        }

        let mut assembler = ChunkAssembler::new();
        let outcome = loop {
            let raw = match rx.recv_timeout(chunk_timeout) {
                Ok(raw) => raw,
                Err(_) => {
                    break Err(ChunkError::Timeout {
                        waited: chunk_timeout,
                    })
                }
            };
            let chunk = match ChunkMessage::from_wire(&raw) {
                Ok(chunk) => chunk,
                Err(err) => break Err(ChunkError::BadChunk(err)),
            };
            match assembler.receive(&chunk) {
                Ok(ChunkProgress::Sealed) => break Ok(()),
                Ok(ChunkProgress::Open) => {}
                Err(err) => break Err(err),
            }
        };

        self.unsubscribe_best_effort(&reply);
        outcome?;
        Ok(assembler.into_artifact()?)
    }

    /// Unsubscribe, logging instead of raising on failure.
    fn unsubscribe_best_effort(&self, topic: &str) {
        if let Err(err) = self.transport.unsubscribe(topic) {
            warn!("failed to unsubscribe from {topic}: {err}");
        }
    }
}
