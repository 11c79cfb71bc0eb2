//! MedSearch Chat Library
//!
//! Stateless grounded chat over caller-supplied registry data. The caller
//! sends the records and the conversation history with every request; this
//! crate renders a bounded context, calls the generation backend, and
//! attaches citations that verifiably point at the supplied records.

pub mod context;
pub mod generator;
pub mod grounding;

pub use context::ContextLimits;
pub use generator::{ChatGenerator, GenerationMessage, OpenAiGenerator};
pub use grounding::{ChatAnswer, GroundingEngine};
