//! Core layer: error taxonomy and the top-level orchestration pipeline

pub mod error;
pub mod orchestrator;

pub use error::OrchestratorError;
pub use orchestrator::{ChatRequest, ChatResponse, Orchestrator};
