//! Response synthesis
//!
//! Builds the final prompt per strategy and post-processes the completion:
//! preamble stripping and a hard length ceiling cut at a sentence boundary.
//!
//! The hybrid prompt embeds tool output as numbered evidence and explicitly
//! forbids "check a website" deflections: with data in hand the model must
//! cite it. Web-derived answers run on the low-temperature short profile.

use std::sync::Arc;

use crate::config::SynthesisSection;
use crate::core::error::Result;
use crate::llm::{CompletionClient, GenerationParams};
use crate::memory::budget::trim_to_chars;
use crate::memory::MemoryContext;
use crate::query::Strategy;
use crate::tools::ToolResult;

pub struct ResponseSynthesizer {
    completion: Arc<dyn CompletionClient>,
    config: SynthesisSection,
}

impl ResponseSynthesizer {
    pub fn new(completion: Arc<dyn CompletionClient>, config: SynthesisSection) -> Self {
        Self { completion, config }
    }

    /// Produce the reply text for one turn. ToolAssisted results are
    /// deterministic and skip the completion call entirely.
    pub async fn synthesize(
        &self,
        query: &str,
        strategy: Strategy,
        tool_results: &[ToolResult],
        memory: &MemoryContext,
        persona: &str,
    ) -> Result<String> {
        let reply = match strategy {
            Strategy::ToolAssisted => format_tool_reply(tool_results),
            Strategy::Hybrid => {
                let prompt = hybrid_prompt(query, tool_results, memory);
                let params = GenerationParams::web_synthesis(self.config.web_max_tokens);
                self.completion.complete(&prompt, persona, &params).await?
            }
            Strategy::DirectLlm | Strategy::MemoryRecall => {
                let prompt = conversational_prompt(query, strategy, memory);
                self.completion
                    .complete(&prompt, persona, &GenerationParams::default_profile())
                    .await?
            }
        };
        Ok(self.post_process(&reply))
    }

    /// Honest degraded reply when research came back empty: the model answers
    /// from its own knowledge and says so.
    pub async fn synthesize_without_live_data(
        &self,
        query: &str,
        memory: &MemoryContext,
        persona: &str,
    ) -> Result<String> {
        let mut prompt = String::new();
        push_memory(&mut prompt, memory);
        prompt.push_str(
            "Non ho trovato informazioni aggiornate in rete per questa domanda. \
             Rispondi basandoti sulle tue conoscenze generali e APRI la risposta \
             dichiarando che non hai dati live (es. \"Non ho trovato informazioni \
             aggiornate; in base a quanto so...\"). Non inventare dati recenti.\n\n",
        );
        prompt.push_str(&format!("Domanda: {}", query));
        let reply = self
            .completion
            .complete(&prompt, persona, &GenerationParams::default_profile())
            .await?;
        Ok(self.post_process(&reply))
    }

    fn post_process(&self, reply: &str) -> String {
        let stripped = strip_preamble(reply.trim());
        trim_to_chars(stripped, self.config.max_reply_chars)
    }
}

fn push_memory(prompt: &mut String, memory: &MemoryContext) {
    if !memory.profile_context.is_empty() {
        prompt.push_str(&memory.profile_context);
        prompt.push_str("\n\n");
    }
    if !memory.episodic_context.is_empty() {
        prompt.push_str(&memory.episodic_context);
        prompt.push_str("\n\n");
    }
}

fn conversational_prompt(query: &str, strategy: Strategy, memory: &MemoryContext) -> String {
    let mut prompt = String::new();
    push_memory(&mut prompt, memory);
    if strategy == Strategy::MemoryRecall {
        if memory.is_empty() {
            prompt.push_str(
                "L'utente chiede cosa ricordi di lui, ma non c'è nulla in memoria: \
                 dillo onestamente, senza inventare fatti.\n\n",
            );
        } else {
            prompt.push_str(
                "Rispondi usando SOLO i fatti e il contesto sopra; se qualcosa non \
                 è presente, di' che non lo sai.\n\n",
            );
        }
    }
    prompt.push_str(&format!("Domanda: {}", query));
    prompt
}

fn hybrid_prompt(query: &str, tool_results: &[ToolResult], memory: &MemoryContext) -> String {
    let mut prompt = String::new();
    push_memory(&mut prompt, memory);
    prompt.push_str("Dati recuperati ora da fonti esterne:\n");
    for (i, result) in tool_results.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] ({}) {}\n",
            i + 1,
            result.tool_name,
            result.result.trim()
        ));
    }
    prompt.push_str(
        "\nRispondi alla domanda citando i dati sopra, in modo breve e fattuale. \
         NON dire di controllare un sito o un'app: i dati sono già qui. \
         Se i dati non bastano, di' esattamente cosa manca.\n\n",
    );
    prompt.push_str(&format!("Domanda: {}", query));
    prompt
}

/// Deterministic rendering for single-tool strategies
fn format_tool_reply(tool_results: &[ToolResult]) -> String {
    match tool_results {
        [] => "Non sono riuscito a eseguire il calcolo richiesto.".to_string(),
        [only] => only.result.trim().to_string(),
        many => many
            .iter()
            .map(|r| format!("{}: {}", r.tool_name, r.result.trim()))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

const PREAMBLES: &[&str] = &[
    "certo!",
    "certo,",
    "certamente!",
    "ecco la risposta:",
    "ecco:",
    "sure!",
    "sure,",
    "certainly!",
    "of course!",
    "here is the answer:",
    "here's the answer:",
];

/// Drop one leading filler phrase; anything after it is the real reply
fn strip_preamble(reply: &str) -> &str {
    let lower = reply.to_lowercase();
    for preamble in PREAMBLES {
        if lower.starts_with(preamble) {
            let rest = reply[preamble.len()..].trim_start();
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletion;

    fn tool_result(name: &str, result: &str) -> ToolResult {
        ToolResult {
            tool_name: name.to_string(),
            result: result.to_string(),
        }
    }

    fn synthesizer(mock: MockCompletion) -> ResponseSynthesizer {
        ResponseSynthesizer::new(Arc::new(mock), SynthesisSection::default())
    }

    #[tokio::test]
    async fn tool_assisted_skips_the_model() {
        let synth = synthesizer(MockCompletion::failing());
        let reply = synth
            .synthesize(
                "(12+3)*4",
                Strategy::ToolAssisted,
                &[tool_result("calculator", "60")],
                &MemoryContext::default(),
                "",
            )
            .await
            .unwrap();
        assert_eq!(reply, "60");
    }

    #[tokio::test]
    async fn hybrid_prompt_embeds_evidence_and_forbids_deflection() {
        let mock = MockCompletion::with_replies(vec!["A Roma ci sono 18°C"]);
        let synth = synthesizer(mock);
        let memory = MemoryContext::default();
        let reply = synth
            .synthesize(
                "Meteo Roma?",
                Strategy::Hybrid,
                &[tool_result("web_research", "Roma: 18°C, sereno")],
                &memory,
                "persona",
            )
            .await
            .unwrap();
        assert_eq!(reply, "A Roma ci sono 18°C");
    }

    #[test]
    fn hybrid_prompt_contains_tool_data() {
        let prompt = hybrid_prompt(
            "Meteo Roma?",
            &[tool_result("web_research", "Roma: 18°C")],
            &MemoryContext::default(),
        );
        assert!(prompt.contains("Roma: 18°C"));
        assert!(prompt.contains("NON dire di controllare"));
    }

    #[tokio::test]
    async fn preamble_is_stripped_and_length_enforced() {
        let long_reply = format!("Certo! {}", "frase. ".repeat(1000));
        let mock = MockCompletion::with_replies(vec![long_reply.as_str()]);
        let synth = synthesizer(mock);
        let reply = synth
            .synthesize(
                "domanda",
                Strategy::DirectLlm,
                &[],
                &MemoryContext::default(),
                "",
            )
            .await
            .unwrap();
        assert!(!reply.to_lowercase().starts_with("certo"));
        assert!(reply.chars().count() <= SynthesisSection::default().max_reply_chars);
    }

    #[tokio::test]
    async fn memory_recall_with_empty_memory_stays_honest() {
        let mock = MockCompletion::with_replies(vec!["Non ho ancora nulla in memoria su di te."]);
        let prompts_probe = synthesizer(mock);
        let reply = prompts_probe
            .synthesize(
                "cosa sai di me?",
                Strategy::MemoryRecall,
                &[],
                &MemoryContext::default(),
                "",
            )
            .await
            .unwrap();
        assert!(reply.contains("memoria"));
    }

    #[tokio::test]
    async fn degraded_reply_declares_missing_live_data() {
        let mock = MockCompletion::with_replies(vec![
            "Non ho trovato informazioni aggiornate; in base a quanto so, il prototipo non è pubblico.",
        ]);
        let synth = synthesizer(mock);
        let reply = synth
            .synthesize_without_live_data(
                "dettagli prototipo segreto XYZ-2025",
                &MemoryContext::default(),
                "",
            )
            .await
            .unwrap();
        assert!(reply.starts_with("Non ho trovato informazioni aggiornate"));
    }
}
