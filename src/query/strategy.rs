//! Strategy selection
//!
//! Total map from a classification to one of four execution strategies. The
//! match is exhaustive over the intent enum, so no input can fall through
//! without a strategy; anything unclear degrades to DirectLlm.

use crate::query::intent::{Classification, ClassifierSource, Intent, LiveDomain};

/// Execution path for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Answer from the model alone: conceptual, smalltalk, creative, code
    DirectLlm,
    /// One deterministic tool, result returned near-verbatim
    ToolAssisted,
    /// Tool output must be synthesized into prose that cites it
    Hybrid,
    /// Answer from stored profile facts and episodic summaries
    MemoryRecall,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectLlm => "direct_llm",
            Strategy::ToolAssisted => "tool_assisted",
            Strategy::Hybrid => "hybrid",
            Strategy::MemoryRecall => "memory_recall",
        }
    }
}

/// Chosen strategy plus the classification that produced it
#[derive(Debug, Clone)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    pub intent: Intent,
    pub domain: Option<LiveDomain>,
    pub confidence: f32,
    pub source: ClassifierSource,
    pub low_confidence: bool,
    pub url: Option<String>,
}

/// Map a classification to its strategy. Every live-data intent goes through
/// Hybrid so the reply cites fetched data instead of echoing raw results.
pub fn select_strategy(classification: &Classification) -> StrategyDecision {
    let strategy = match classification.intent {
        Intent::WebSearch | Intent::WebRead => Strategy::Hybrid,
        Intent::Calculator => Strategy::ToolAssisted,
        Intent::MemoryRecall => Strategy::MemoryRecall,
        Intent::DirectLlm | Intent::CodeGen => Strategy::DirectLlm,
    };
    StrategyDecision {
        strategy,
        intent: classification.intent,
        domain: classification.domain,
        confidence: classification.confidence,
        source: classification.source,
        low_confidence: classification.low_confidence,
        url: classification.url.clone(),
    }
}
