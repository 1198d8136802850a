//! Quorra - conversational query-orchestration core
//!
//! Module map:
//! - **config**: orchestrator configuration (TOML + environment overrides)
//! - **core**: error taxonomy and the top-level request/response pipeline
//! - **query**: normalization, intent classification, strategy selection
//! - **llm**: completion-service boundary (OpenAI-compatible / Mock)
//! - **tools**: tool adapters (calculator, web_read) with registry + executor
//! - **web**: multi-engine web research with dedup, quality gating and retry
//! - **memory**: profile facts, episodic summaries, sliding buffer, budgets
//! - **synthesis**: prompt assembly and reply post-processing

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod query;
pub mod synthesis;
pub mod tools;
pub mod web;

pub use crate::core::{ChatRequest, ChatResponse, Orchestrator, OrchestratorError};
pub use crate::query::{Intent, Strategy, StrategyDecision};
