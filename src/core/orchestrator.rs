//! Top-level orchestration pipeline
//!
//! One request/response cycle, in fixed order: normalize → classify → select
//! strategy → execute tools/research → synthesize → record the turn. The
//! reply is never empty: research failures fall back to an honest LLM-only
//! answer, and only a dead completion service produces the generic apology
//! (with `success = false`).

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::core::error::OrchestratorError;
use crate::llm::CompletionClient;
use crate::memory::{KvStore, MemoryCoordinator, SemanticStore};
use crate::observability::query_digest;
use crate::query::{normalize, select_strategy, IntentClassifier, Strategy, StrategyDecision};
use crate::query::Intent;
use crate::synthesis::ResponseSynthesizer;
use crate::tools::{CalculatorTool, ToolExecutor, ToolRegistry, ToolResult, WebReadTool};
use crate::web::{DuckDuckGoHtml, DuckDuckGoLite, SearchEngine, WebResearchEngine};

const APOLOGY_REPLY: &str =
    "Mi dispiace, al momento non riesco a elaborare la richiesta. Riprova tra poco.";

/// Incoming chat turn
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub query: String,
    pub source: String,
    pub source_id: String,
}

/// Outcome of one turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub query_type: String,
    pub strategy: String,
    pub tool_results: Vec<ToolResult>,
    pub duration_ms: u64,
    pub success: bool,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    classifier: IntentClassifier,
    research: WebResearchEngine,
    tools: ToolExecutor,
    memory: MemoryCoordinator,
    synthesizer: ResponseSynthesizer,
}

impl Orchestrator {
    /// Wire the full pipeline with the default DuckDuckGo engines
    pub fn new(
        config: OrchestratorConfig,
        completion: Arc<dyn CompletionClient>,
        semantic: Arc<dyn SemanticStore>,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        let engines: Vec<Arc<dyn SearchEngine>> = vec![
            Arc::new(DuckDuckGoHtml::new(config.research.search_timeout_secs)),
            Arc::new(DuckDuckGoLite::new(config.research.search_timeout_secs)),
        ];
        Self::with_engines(config, completion, semantic, kv, engines)
    }

    /// Same wiring with caller-provided search engines (tests, other SERPs)
    pub fn with_engines(
        config: OrchestratorConfig,
        completion: Arc<dyn CompletionClient>,
        semantic: Arc<dyn SemanticStore>,
        kv: Arc<dyn KvStore>,
        engines: Vec<Arc<dyn SearchEngine>>,
    ) -> Self {
        let classifier = IntentClassifier::new(
            config.classifier.clone(),
            Some(Arc::clone(&completion)),
        );
        let research = WebResearchEngine::new(engines, config.research.clone());

        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        registry.register(WebReadTool::new(
            config.tools.fetch_timeout_secs,
            config.tools.max_result_chars,
        ));
        let tools = ToolExecutor::new(
            registry,
            config.tools.tool_timeout_secs,
            config.research.max_parallel_fetches,
        );

        let memory = MemoryCoordinator::new(
            semantic,
            kv,
            Some(Arc::clone(&completion)),
            config.memory.clone(),
        );
        let synthesizer =
            ResponseSynthesizer::new(Arc::clone(&completion), config.synthesis.clone());

        Self {
            config,
            classifier,
            research,
            tools,
            memory,
            synthesizer,
        }
    }

    pub fn memory(&self) -> &MemoryCoordinator {
        &self.memory
    }

    /// Process one turn end to end. Infallible by contract: every failure
    /// shape maps to some reply text.
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        let start = Instant::now();
        let user_id = format!("{}:{}", request.source, request.source_id);
        let conversation_id = user_id.clone();

        let persona = self
            .memory
            .persona(&request.source, &request.source_id)
            .await
            .unwrap_or_else(|| self.config.llm.default_persona.clone());

        let normalized = normalize(&request.query);

        // Fact capture is silent: sensitive payloads and store failures both
        // leave the reply flow untouched
        if let Err(e) = self
            .memory
            .detect_and_save_fact(&user_id, &normalized.clean_text)
            .await
        {
            warn!(error = %e, "fact save failed");
        }

        let classification = self.classifier.classify(&normalized).await;
        let decision = select_strategy(&classification);
        info!(
            query = %query_digest(&normalized.clean_text),
            intent = decision.intent.as_str(),
            strategy = decision.strategy.as_str(),
            confidence = decision.confidence,
            "turn classified"
        );

        let memory_ctx = self
            .memory
            .gather_context(&user_id, &conversation_id, &normalized.clean_text)
            .await;

        let (tool_results, research_exhausted) =
            self.execute_strategy(&decision, &normalized.clean_text).await;

        let synthesis = if research_exhausted && tool_results.is_empty() {
            self.synthesizer
                .synthesize_without_live_data(&normalized.clean_text, &memory_ctx, &persona)
                .await
        } else {
            self.synthesizer
                .synthesize(
                    &normalized.clean_text,
                    decision.strategy,
                    &tool_results,
                    &memory_ctx,
                    &persona,
                )
                .await
        };

        let (reply, success) = match synthesis {
            Ok(text) if !text.trim().is_empty() => (text, true),
            Ok(_) => (APOLOGY_REPLY.to_string(), false),
            Err(e) => {
                warn!(
                    error = %e,
                    query = %query_digest(&normalized.clean_text),
                    strategy = decision.strategy.as_str(),
                    "synthesis failed"
                );
                (APOLOGY_REPLY.to_string(), false)
            }
        };

        if let Err(e) = self
            .memory
            .record_turn(&conversation_id, &normalized.clean_text, &reply)
            .await
        {
            warn!(error = %e, "turn record failed");
        }

        ChatResponse {
            reply,
            query_type: decision.intent.as_str().to_string(),
            strategy: decision.strategy.as_str().to_string(),
            tool_results,
            duration_ms: start.elapsed().as_millis() as u64,
            success,
        }
    }

    /// Run the tool/research side of a strategy. The bool reports that web
    /// research came up empty, which selects the honest LLM-only fallback.
    async fn execute_strategy(
        &self,
        decision: &StrategyDecision,
        clean_text: &str,
    ) -> (Vec<ToolResult>, bool) {
        match decision.strategy {
            Strategy::Hybrid => match (&decision.intent, &decision.url) {
                (Intent::WebRead, Some(url)) => {
                    match self
                        .tools
                        .execute("web_read", serde_json::json!({ "url": url }))
                        .await
                    {
                        Ok(result) => (
                            vec![ToolResult {
                                tool_name: "web_read".to_string(),
                                result,
                            }],
                            false,
                        ),
                        Err(e) => {
                            warn!(error = %e, "web_read failed");
                            (Vec::new(), true)
                        }
                    }
                }
                _ => match self.research.research(clean_text).await {
                    Ok(outcome) => {
                        info!(
                            results = outcome.results.len(),
                            quality = outcome.quality,
                            retried = outcome.retried,
                            "research completed"
                        );
                        (
                            vec![ToolResult {
                                tool_name: "web_research".to_string(),
                                result: format_research_evidence(&outcome.results),
                            }],
                            false,
                        )
                    }
                    Err(OrchestratorError::WebResearchExhausted) => (Vec::new(), true),
                    Err(e) => {
                        warn!(error = %e, "research failed");
                        (Vec::new(), true)
                    }
                },
            },
            Strategy::ToolAssisted => {
                match self
                    .tools
                    .execute("calculator", serde_json::json!({ "expr": clean_text }))
                    .await
                {
                    Ok(result) => (
                        vec![ToolResult {
                            tool_name: "calculator".to_string(),
                            result,
                        }],
                        false,
                    ),
                    Err(e) => {
                        warn!(error = %e, "calculator failed");
                        (Vec::new(), false)
                    }
                }
            }
            Strategy::DirectLlm | Strategy::MemoryRecall => (Vec::new(), false),
        }
    }
}

/// Compact evidence lines for the hybrid prompt
fn format_research_evidence(results: &[crate::web::SearchResult]) -> String {
    results
        .iter()
        .take(5)
        .map(|r| {
            if r.snippet.is_empty() {
                format!("{} ({})", r.title, r.url)
            } else {
                format!("{} — {} ({})", r.title, r.snippet, r.url)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::SearchResult;

    #[test]
    fn evidence_lines_cap_at_five_results() {
        let results: Vec<SearchResult> = (0..8)
            .map(|i| SearchResult {
                url: format!("https://s{}.com/p", i),
                title: format!("titolo {}", i),
                snippet: String::new(),
                domain: format!("s{}.com", i),
                source_engine: "test",
                relevance_score: 0.5,
            })
            .collect();
        let evidence = format_research_evidence(&results);
        assert_eq!(evidence.lines().count(), 5);
    }
}
