//! Web research layer
//!
//! - `engine` — SearchEngine trait + DuckDuckGo html/lite backends
//! - `search` — WebResearchEngine: merge, dedup, quality gate, bounded retry

pub mod engine;
pub mod search;

pub use engine::{DuckDuckGoHtml, DuckDuckGoLite, RawHit, SearchEngine};
pub use search::{relax_query, ResearchOutcome, SearchResult, WebResearchEngine};
