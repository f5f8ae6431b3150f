//! DAB compliance client.
//!
//! This crate implements the conformance-test client for the Device
//! Automation Bus: a correlated request/response client over a topic-based
//! pub/sub transport, chunked artifact reassembly, device discovery, a
//! run-wide capability cache, and the capability gate evaluated before
//! each behavioral test.

pub mod capability;
pub mod checker;
pub mod client;
pub mod config;
pub mod mock;
pub mod result;
pub mod runner;
pub mod suite;
pub mod transport;

pub use capability::{CapabilityStore, Validation};
pub use checker::{DabChecker, GateOutcome};
pub use client::{
    ChunkAssembler, ChunkError, ChunkProgress, ClientError, DabClient, SealedArtifact,
    DEFAULT_CALL_TIMEOUT,
};
pub use config::RuntimeConfig;
pub use result::{Outcome, SuiteReport, TestResult};
pub use runner::{PreflightConfig, TestCase, TestRunner};
pub use transport::{Message, MessageHandler, Transport, TransportError};
