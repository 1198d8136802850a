//! End-to-end pipeline tests: mock completion, stub search engines, in-memory
//! stores. Each test drives `Orchestrator::handle` the way a chat front-end
//! would.

use std::sync::Arc;

use async_trait::async_trait;

use quorra::config::OrchestratorConfig;
use quorra::llm::MockCompletion;
use quorra::memory::{InMemoryKvStore, InMemorySemanticStore, SemanticStore};
use quorra::web::{RawHit, SearchEngine};
use quorra::{ChatRequest, Orchestrator};

struct StubSearch {
    hits: Vec<(String, String, String)>,
}

impl StubSearch {
    fn empty() -> Self {
        Self { hits: Vec::new() }
    }

    fn with_hits(hits: &[(&str, &str, &str)]) -> Self {
        Self {
            hits: hits
                .iter()
                .map(|(u, t, s)| (u.to_string(), t.to_string(), s.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SearchEngine for StubSearch {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<RawHit>, String> {
        Ok(self
            .hits
            .iter()
            .map(|(url, title, snippet)| RawHit {
                url: url.clone(),
                title: title.clone(),
                snippet: snippet.clone(),
            })
            .collect())
    }
}

fn request(query: &str) -> ChatRequest {
    ChatRequest {
        query: query.to_string(),
        source: "telegram".to_string(),
        source_id: "42".to_string(),
    }
}

fn orchestrator(
    completion: Arc<MockCompletion>,
    engine: StubSearch,
) -> (Orchestrator, Arc<InMemorySemanticStore>) {
    let semantic = Arc::new(InMemorySemanticStore::new());
    let orchestrator = Orchestrator::with_engines(
        OrchestratorConfig::default(),
        completion,
        Arc::clone(&semantic) as Arc<dyn SemanticStore>,
        Arc::new(InMemoryKvStore::new()),
        vec![Arc::new(engine)],
    );
    (orchestrator, semantic)
}

#[tokio::test]
async fn weather_query_runs_the_hybrid_path() {
    let completion = Arc::new(MockCompletion::with_replies(vec![
        "A Roma oggi ci sono 18°C con cielo sereno.",
    ]));
    let engine = StubSearch::with_hits(&[
        (
            "https://meteo.example.com/roma",
            "Meteo Roma",
            "18°C sereno",
        ),
        ("https://previsioni.org/roma", "Previsioni Roma", "sereno"),
        ("https://weather.net/rome", "Rome weather", "18C clear"),
    ]);
    let (orchestrator, _) = orchestrator(completion, engine);

    let response = orchestrator.handle(request("Meteo Roma?")).await;

    assert!(response.success);
    assert_eq!(response.strategy, "hybrid");
    assert_eq!(response.query_type, "web_search");
    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(response.tool_results[0].tool_name, "web_research");
    assert!(response.tool_results[0].result.contains("Meteo Roma"));
    assert!(response.reply.contains("18°C"));
}

#[tokio::test]
async fn arithmetic_is_answered_without_the_model() {
    // A failing completion proves the calculator path never touches it for
    // the reply itself (classification is high-confidence, no fallback)
    let completion = Arc::new(MockCompletion::failing());
    let (orchestrator, _) = orchestrator(completion, StubSearch::empty());

    let response = orchestrator.handle(request("(12 + 3) * 4")).await;

    assert!(response.success);
    assert_eq!(response.strategy, "tool_assisted");
    assert_eq!(response.reply, "60");
    assert_eq!(response.tool_results[0].tool_name, "calculator");
}

#[tokio::test]
async fn empty_research_degrades_to_honest_llm_reply() {
    let completion = Arc::new(MockCompletion::with_replies(vec![
        "Non ho trovato informazioni aggiornate; in base a quanto so, non ci sono dettagli pubblici.",
    ]));
    let (orchestrator, _) = orchestrator(completion, StubSearch::empty());

    let response = orchestrator
        .handle(request("ultime notizie prototipo XYZ-2025 oggi"))
        .await;

    assert!(response.success);
    assert_eq!(response.strategy, "hybrid");
    assert!(response.tool_results.is_empty());
    assert!(response.reply.starts_with("Non ho trovato informazioni aggiornate"));
}

#[tokio::test]
async fn sensitive_remember_statement_is_dropped_but_reply_continues() -> anyhow::Result<()> {
    let completion = Arc::new(MockCompletion::with_replies(vec!["Va bene!"]));
    let (orchestrator, semantic) = orchestrator(completion, StubSearch::empty());

    let response = orchestrator
        .handle(request("Remember that my API key is sk_test_abc123xyz789"))
        .await;

    assert!(response.success);
    assert!(!response.reply.is_empty());
    // Nothing persisted and nothing echoed about a save
    let stored = semantic.query("user_profile", "key", 5, None).await?;
    assert!(stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn saved_fact_shapes_the_recall_prompt() {
    let completion = Arc::new(MockCompletion::new());
    let handle = Arc::clone(&completion);
    let (orchestrator, _) = orchestrator(completion, StubSearch::empty());

    orchestrator
        .handle(request("ricorda che preferisco risposte brevi"))
        .await;
    let response = orchestrator.handle(request("cosa sai di me?")).await;

    assert_eq!(response.strategy, "memory_recall");
    let prompts = handle.recorded_prompts();
    let recall_prompt = prompts.last().expect("recall prompt recorded");
    assert!(recall_prompt.contains("preferisco risposte brevi"));
}

#[tokio::test]
async fn eleven_turns_produce_one_episodic_summary() -> anyhow::Result<()> {
    let completion = Arc::new(MockCompletion::new());
    let (orchestrator, semantic) = orchestrator(completion, StubSearch::empty());

    for i in 0..11 {
        let response = orchestrator
            .handle(request(&format!("dimmi qualcosa sul tema numero {}", i)))
            .await;
        assert!(response.success);
    }

    assert_eq!(orchestrator.memory().buffer_len("telegram:42").await, 0);
    let summaries = semantic.query("conversation_history", "tema", 5, None).await?;
    assert_eq!(summaries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn dead_completion_service_yields_the_apology() {
    let completion = Arc::new(MockCompletion::failing());
    let (orchestrator, _) = orchestrator(completion, StubSearch::empty());

    let response = orchestrator.handle(request("raccontami qualcosa")).await;

    assert!(!response.success);
    assert!(!response.reply.is_empty());
    assert_eq!(response.strategy, "direct_llm");
}
