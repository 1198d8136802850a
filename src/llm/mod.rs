//! Completion-service boundary
//!
//! The language model is an external collaborator: a text-in/text-out
//! completion function with bounded generation parameters. Backends implement
//! `CompletionClient`; the OpenAI-compatible client fails closed on timeout.

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockCompletion;
pub use openai::OpenAiCompletion;
pub use traits::{CompletionClient, GenerationParams};
