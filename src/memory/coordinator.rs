//! Memory coordinator
//!
//! Owns the per-conversation sliding buffers and mediates every read/write
//! against the external stores. Store failures degrade to empty context or a
//! skipped write; they never fail the turn.
//!
//! Collections: `user_profile` for facts, `conversation_history` for episodic
//! summaries. Personas live on the KV layer under `persona:{source}:{id}`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MemorySection;
use crate::core::error::{OrchestratorError, Result};
use crate::llm::{CompletionClient, GenerationParams};
use crate::memory::budget::trim_to_tokens;
use crate::memory::episodic::{build_transcript, fallback_summary, EpisodicSummary, Turn};
use crate::memory::profile::{
    classify_category, contains_sensitive_data, scan_for_fact, FactScan, ProfileFact,
};
use crate::memory::store::{KvStore, SemanticStore};

pub const COLLECTION_PROFILE: &str = "user_profile";
pub const COLLECTION_EPISODIC: &str = "conversation_history";

/// Memory context gathered for one request
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub profile_context: String,
    pub episodic_context: String,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.profile_context.is_empty() && self.episodic_context.is_empty()
    }
}

pub struct MemoryCoordinator {
    semantic: Arc<dyn SemanticStore>,
    kv: Arc<dyn KvStore>,
    summarizer: Option<Arc<dyn CompletionClient>>,
    config: MemorySection,
    buffers: Mutex<HashMap<String, Vec<Turn>>>,
}

impl MemoryCoordinator {
    pub fn new(
        semantic: Arc<dyn SemanticStore>,
        kv: Arc<dyn KvStore>,
        summarizer: Option<Arc<dyn CompletionClient>>,
        config: MemorySection,
    ) -> Self {
        Self {
            semantic,
            kv,
            summarizer,
            config,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Top-K profile facts and episodic summaries relevant to the query,
    /// each side trimmed to half the combined token budget. Store failures
    /// log and yield empty sections.
    pub async fn gather_context(
        &self,
        user_id: &str,
        conversation_id: &str,
        query: &str,
    ) -> MemoryContext {
        let half_budget = self.config.max_context_tokens / 2;
        let mut context = MemoryContext::default();

        match self
            .semantic
            .query(
                COLLECTION_PROFILE,
                query,
                self.config.profile_top_k,
                Some(("user_id", user_id)),
            )
            .await
        {
            Ok(facts) if !facts.is_empty() => {
                let mut lines = vec!["User Profile / Known Facts:".to_string()];
                for (i, fact) in facts.iter().enumerate() {
                    let category = fact.metadata["category"].as_str().unwrap_or("misc");
                    lines.push(format!("{}. [{}] {}", i + 1, category, fact.text.trim()));
                }
                context.profile_context = trim_to_tokens(&lines.join("\n"), half_budget);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "profile context unavailable"),
        }

        match self
            .semantic
            .query(
                COLLECTION_EPISODIC,
                query,
                self.config.episodic_top_k,
                Some(("conversation_id", conversation_id)),
            )
            .await
        {
            Ok(summaries) if !summaries.is_empty() => {
                let mut lines =
                    vec!["Conversation Context (previous discussion):".to_string()];
                for summary in &summaries {
                    lines.push(format!("• {}", summary.text.trim()));
                }
                context.episodic_context = trim_to_tokens(&lines.join("\n"), half_budget);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "episodic context unavailable"),
        }

        context
    }

    /// Detect a "remember" statement and persist the fact. Sensitive payloads
    /// are dropped silently: Ok(None), no store write, nothing logged beyond
    /// a category-free warning.
    pub async fn detect_and_save_fact(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Option<ProfileFact>> {
        let payload = match scan_for_fact(text) {
            FactScan::Detected { payload } => payload,
            FactScan::NoFact => return Ok(None),
        };

        if contains_sensitive_data(&payload) {
            warn!(user_id, "blocked sensitive fact payload");
            return Ok(None);
        }

        let category = classify_category(&payload);
        let now = Utc::now();
        let fact = ProfileFact {
            user_id: user_id.to_string(),
            category,
            text: payload,
            created_at: now,
            updated_at: now,
        };
        let id = format!("user:{}:{}:{}", user_id, category, Uuid::new_v4());
        self.semantic
            .upsert(
                COLLECTION_PROFILE,
                &id,
                &fact.text,
                serde_json::json!({
                    "user_id": fact.user_id,
                    "category": fact.category,
                    "created_at": fact.created_at.to_rfc3339(),
                }),
            )
            .await
            .map_err(|e| OrchestratorError::MemoryStoreFailure(e.to_string()))?;
        info!(user_id, category, "profile fact saved");
        Ok(Some(fact))
    }

    /// Append a turn; once the buffer exceeds `buffer_size` turns or reaches
    /// `token_limit` estimated tokens, summarize and clear it.
    pub async fn record_turn(
        &self,
        conversation_id: &str,
        user_msg: &str,
        assistant_msg: &str,
    ) -> Result<Option<EpisodicSummary>> {
        let drained = {
            let mut buffers = self.buffers.lock().await;
            let buffer = buffers.entry(conversation_id.to_string()).or_default();
            buffer.push(Turn::new(user_msg, assistant_msg));

            let token_total: usize = buffer.iter().map(|t| t.token_estimate).sum();
            if buffer.len() > self.config.buffer_size
                || token_total >= self.config.token_limit
            {
                std::mem::take(buffer)
            } else {
                return Ok(None);
            }
        };

        let summary_text = self.summarize(&drained).await;
        let summary = EpisodicSummary {
            conversation_id: conversation_id.to_string(),
            text: summary_text,
            turns_count: drained.len(),
            created_at: Utc::now(),
        };
        let id = format!("conv:{}:{}", conversation_id, Uuid::new_v4());
        self.semantic
            .upsert(
                COLLECTION_EPISODIC,
                &id,
                &summary.text,
                serde_json::json!({
                    "conversation_id": summary.conversation_id,
                    "turns_count": summary.turns_count,
                    "created_at": summary.created_at.to_rfc3339(),
                }),
            )
            .await
            .map_err(|e| OrchestratorError::MemoryStoreFailure(e.to_string()))?;
        info!(
            conversation_id,
            turns = summary.turns_count,
            "episodic summary stored"
        );
        Ok(Some(summary))
    }

    /// Completion-backed summary with the deterministic fallback
    async fn summarize(&self, turns: &[Turn]) -> String {
        if let Some(summarizer) = &self.summarizer {
            let prompt = format!(
                "Riassumi questa conversazione in 2-4 frasi chiave, mantenendo i punti \
                 principali discussi e le decisioni prese.\n\n{}",
                build_transcript(turns)
            );
            let persona = "Sei un assistente che crea riassunti concisi e accurati.";
            match summarizer
                .complete(&prompt, persona, &GenerationParams::default_profile())
                .await
            {
                Ok(text) if !text.trim().is_empty() => return text.trim().to_string(),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "summarization failed, using fallback"),
            }
        }
        fallback_summary(turns)
    }

    /// Current buffer depth, mainly for tests and status surfaces
    pub async fn buffer_len(&self, conversation_id: &str) -> usize {
        self.buffers
            .lock()
            .await
            .get(conversation_id)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Persona override for a (source, source_id) pair, if one was stored
    pub async fn persona(&self, source: &str, source_id: &str) -> Option<String> {
        let key = format!("persona:{}:{}", source, source_id);
        match self.kv.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "persona lookup failed");
                None
            }
        }
    }

    pub async fn set_persona(
        &self,
        source: &str,
        source_id: &str,
        persona: &str,
    ) -> Result<()> {
        let key = format!("persona:{}:{}", source, source_id);
        self.kv
            .set(&key, persona, None)
            .await
            .map_err(|e| OrchestratorError::MemoryStoreFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletion;
    use crate::memory::budget::approx_tokens;
    use crate::memory::store::{InMemoryKvStore, InMemorySemanticStore};

    fn coordinator(summarizer: Option<Arc<dyn CompletionClient>>) -> MemoryCoordinator {
        MemoryCoordinator::new(
            Arc::new(InMemorySemanticStore::new()),
            Arc::new(InMemoryKvStore::new()),
            summarizer,
            MemorySection::default(),
        )
    }

    #[tokio::test]
    async fn eleventh_turn_triggers_summary_and_clears_buffer() {
        let mock: Arc<dyn CompletionClient> =
            Arc::new(MockCompletion::with_replies(vec!["Riassunto della chat"]));
        let coord = coordinator(Some(mock));
        for i in 0..10 {
            let out = coord
                .record_turn("conv1", &format!("messaggio {}", i), "ok")
                .await
                .unwrap();
            assert!(out.is_none(), "no summary expected at turn {}", i + 1);
        }
        assert_eq!(coord.buffer_len("conv1").await, 10);
        let summary = coord
            .record_turn("conv1", "undicesimo messaggio", "ok")
            .await
            .unwrap()
            .expect("summary at the eleventh turn");
        assert_eq!(summary.turns_count, 11);
        assert_eq!(summary.text, "Riassunto della chat");
        assert_eq!(coord.buffer_len("conv1").await, 0);
    }

    #[tokio::test]
    async fn token_limit_triggers_early_summary() {
        let coord = coordinator(None);
        let long = "parola ".repeat(600); // ~1050 tokens per side
        let out = coord.record_turn("conv2", &long, &long).await.unwrap();
        assert!(out.is_some());
        assert_eq!(coord.buffer_len("conv2").await, 0);
    }

    #[tokio::test]
    async fn dead_summarizer_falls_back_to_rule_based_text() {
        let mock: Arc<dyn CompletionClient> = Arc::new(MockCompletion::failing());
        let coord = coordinator(Some(mock));
        for i in 0..11 {
            let _ = coord
                .record_turn("conv3", &format!("argomento {}", i), "ok")
                .await
                .unwrap();
        }
        let matches = coord
            .semantic
            .query(COLLECTION_EPISODIC, "argomento", 1, None)
            .await
            .unwrap();
        assert!(matches[0].text.starts_with("Conversazione su: "));
    }

    #[tokio::test]
    async fn sensitive_fact_is_never_persisted() {
        let coord = coordinator(None);
        let out = coord
            .detect_and_save_fact("u1", "Remember that my API key is sk_test_abc123xyz789")
            .await
            .unwrap();
        assert!(out.is_none());
        let matches = coord
            .semantic
            .query(COLLECTION_PROFILE, "key", 5, None)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn saved_fact_comes_back_in_gathered_context() {
        let coord = coordinator(None);
        let fact = coord
            .detect_and_save_fact("u1", "ricorda che preferisco risposte brevi")
            .await
            .unwrap()
            .expect("fact saved");
        assert_eq!(fact.category, "preference");

        let context = coord.gather_context("u1", "conv", "che risposte preferisco?").await;
        assert!(context.profile_context.contains("preferisco risposte brevi"));
        assert!(context.profile_context.contains("[preference]"));
    }

    #[tokio::test]
    async fn gathered_context_respects_token_budget() {
        let coord = coordinator(None);
        for i in 0..5 {
            coord
                .detect_and_save_fact(
                    "u2",
                    &format!("ricorda che {} {}", "dettaglio importante ".repeat(80), i),
                )
                .await
                .unwrap();
        }
        let context = coord.gather_context("u2", "conv", "dettaglio importante").await;
        let total =
            approx_tokens(&context.profile_context) + approx_tokens(&context.episodic_context);
        assert!(total <= MemorySection::default().max_context_tokens);
    }

    #[tokio::test]
    async fn persona_roundtrip_through_kv() {
        let coord = coordinator(None);
        assert!(coord.persona("telegram", "42").await.is_none());
        coord
            .set_persona("telegram", "42", "Parla come un pirata")
            .await
            .unwrap();
        assert_eq!(
            coord.persona("telegram", "42").await.as_deref(),
            Some("Parla come un pirata")
        );
    }
}
