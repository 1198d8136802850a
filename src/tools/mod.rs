//! Tool layer
//!
//! - `registry` — Tool trait and name-keyed registry
//! - `executor` — per-call timeout, audit log, bounded parallel execution
//! - `calculator` — deterministic infix arithmetic evaluator
//! - `web_read` — URL fetch with readable-text extraction

pub mod calculator;
pub mod executor;
pub mod registry;
pub mod web_read;

pub use calculator::CalculatorTool;
pub use executor::{ToolCall, ToolExecutor, ToolResult};
pub use registry::{Tool, ToolRegistry};
pub use web_read::WebReadTool;
