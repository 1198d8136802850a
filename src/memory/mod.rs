//! Conversational memory
//!
//! - `store` — external-collaborator boundary: semantic top-K search + KV
//! - `budget` — token estimation and budget-safe trimming
//! - `profile` — "remember …" parsing, sensitive-data filter, categories
//! - `episodic` — turns, summaries, rule-based summary fallback
//! - `coordinator` — gather_context / record_turn / detect_and_save_fact

pub mod budget;
pub mod coordinator;
pub mod episodic;
pub mod profile;
pub mod store;

pub use budget::{approx_tokens, trim_to_chars, trim_to_tokens};
pub use coordinator::{MemoryContext, MemoryCoordinator};
pub use episodic::{EpisodicSummary, Turn};
pub use profile::{scan_for_fact, FactScan, ProfileFact};
pub use store::{
    InMemoryKvStore, InMemorySemanticStore, KvStore, SemanticMatch, SemanticStore,
};
