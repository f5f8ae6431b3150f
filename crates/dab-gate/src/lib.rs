//! Capability requirement-spec language.
//!
//! Test cases declare their device-capability preconditions in a one-line
//! spec such as:
//!
//! ```text
//! ops: applications/launch, applications/get-state | settings: screenSaver | keys: KEY_HOME | voices: GoogleAssistant
//! ```
//!
//! This crate parses that language into a structured [`RequirementSet`];
//! evaluating the requirements against a device is the caller's concern.
//! Parsing never fails: malformed segments degrade to the default `ops`
//! category rather than aborting a test run.

mod parser;
mod requirement;

pub use parser::RequirementSet;
pub use requirement::{Category, Requirement};
