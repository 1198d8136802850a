//! Orchestrator configuration: loaded from config/default.toml plus env overrides
//!
//! Load order: TOML file first, then environment variables `QUORRA__*`
//! (double underscore marks nesting, e.g. `QUORRA__RESEARCH__MIN_RESULTS=5`).
//! Every knob has a serde default so an empty config is fully usable.

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::error::OrchestratorError;

/// Configuration root (maps to the top level of config/default.toml)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub research: ResearchSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub synthesis: SynthesisSection,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            classifier: ClassifierSection::default(),
            research: ResearchSection::default(),
            memory: MemorySection::default(),
            tools: ToolsSection::default(),
            synthesis: SynthesisSection::default(),
        }
    }
}

/// [llm] section: completion-service endpoint and timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// Completion call timeout (seconds); the call fails closed past this
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_persona")]
    pub default_persona: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_persona() -> String {
    "Sei un assistente utile, conciso e amichevole.".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            request_timeout_secs: default_llm_timeout(),
            default_persona: default_persona(),
        }
    }
}

/// [classifier] section: confidence thresholds for the pattern/model ladder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Below this pattern confidence the model fallback is consulted
    #[serde(default = "default_pattern_threshold")]
    pub pattern_confidence_threshold: f32,
    /// Model answers below this self-reported confidence are discarded
    #[serde(default = "default_model_threshold")]
    pub model_confidence_threshold: f32,
    /// Below this the decision carries a low_confidence flag
    #[serde(default = "default_low_confidence")]
    pub low_confidence_threshold: f32,
    #[serde(default = "default_true")]
    pub model_fallback_enabled: bool,
}

fn default_pattern_threshold() -> f32 {
    0.70
}

fn default_model_threshold() -> f32 {
    0.45
}

fn default_low_confidence() -> f32 {
    0.65
}

fn default_true() -> bool {
    true
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            pattern_confidence_threshold: default_pattern_threshold(),
            model_confidence_threshold: default_model_threshold(),
            low_confidence_threshold: default_low_confidence(),
            model_fallback_enabled: default_true(),
        }
    }
}

/// [research] section: web research retry, dedup and quality knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchSection {
    /// Fewer merged results than this triggers the relaxed-query retry
    #[serde(default = "default_min_results")]
    pub min_results: usize,
    /// Relaxed-query passes allowed beyond the initial one
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Kept results per registrable domain
    #[serde(default = "default_max_per_domain")]
    pub max_per_domain: usize,
    /// Path-segment Jaccard similarity at or above which two same-domain URLs collapse
    #[serde(default = "default_dedup_similarity")]
    pub dedup_similarity: f32,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f32,
    /// In-flight fetches across engines
    #[serde(default = "default_max_parallel")]
    pub max_parallel_fetches: usize,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    /// Hits requested from each engine per pass
    #[serde(default = "default_per_engine")]
    pub results_per_engine: usize,
}

fn default_min_results() -> usize {
    3
}

fn default_max_retries() -> usize {
    1
}

fn default_max_per_domain() -> usize {
    2
}

fn default_dedup_similarity() -> f32 {
    0.85
}

fn default_quality_threshold() -> f32 {
    0.6
}

fn default_max_parallel() -> usize {
    4
}

fn default_search_timeout() -> u64 {
    10
}

fn default_per_engine() -> usize {
    8
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            min_results: default_min_results(),
            max_retries: default_max_retries(),
            max_per_domain: default_max_per_domain(),
            dedup_similarity: default_dedup_similarity(),
            quality_threshold: default_quality_threshold(),
            max_parallel_fetches: default_max_parallel(),
            search_timeout_secs: default_search_timeout(),
            results_per_engine: default_per_engine(),
        }
    }
}

/// [memory] section: buffer and context-budget sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Turns held before summarization triggers
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Estimated-token threshold that also triggers summarization
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,
    #[serde(default = "default_profile_top_k")]
    pub profile_top_k: usize,
    #[serde(default = "default_episodic_top_k")]
    pub episodic_top_k: usize,
    /// Combined budget for profile + episodic context
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

fn default_buffer_size() -> usize {
    10
}

fn default_token_limit() -> usize {
    2000
}

fn default_profile_top_k() -> usize {
    5
}

fn default_episodic_top_k() -> usize {
    3
}

fn default_max_context_tokens() -> usize {
    800
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            token_limit: default_token_limit(),
            profile_top_k: default_profile_top_k(),
            episodic_top_k: default_episodic_top_k(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

/// [tools] section: adapter timeouts and result caps
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// Single tool call timeout (seconds)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

fn default_tool_timeout() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    6
}

fn default_max_result_chars() -> usize {
    8000
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

/// [synthesis] section: reply sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisSection {
    /// Hard ceiling on reply length, enforced at a sentence boundary
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
    /// Output-token cap for the web-synthesis generation profile
    #[serde(default = "default_web_max_tokens")]
    pub web_max_tokens: u16,
}

fn default_max_reply_chars() -> usize {
    2800
}

fn default_web_max_tokens() -> u16 {
    120
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            max_reply_chars: default_max_reply_chars(),
            web_max_tokens: default_web_max_tokens(),
        }
    }
}

/// Load configuration from the config directory; `QUORRA__*` env vars override.
///
/// 1. The first of config/default.toml, ../config/default.toml, default.toml found is the base source
/// 2. An explicit `config_path` (if given and present) is layered on top
/// 3. `QUORRA__*` environment variables override last
pub fn load_config(config_path: Option<PathBuf>) -> crate::core::error::Result<OrchestratorConfig> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("QUORRA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder
        .build()
        .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;
    c.try_deserialize()
        .map_err(|e| OrchestratorError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.research.min_results, 3);
        assert_eq!(cfg.research.max_retries, 1);
        assert_eq!(cfg.research.max_per_domain, 2);
        assert_eq!(cfg.memory.buffer_size, 10);
        assert_eq!(cfg.memory.token_limit, 2000);
        assert_eq!(cfg.memory.profile_top_k, 5);
        assert_eq!(cfg.memory.episodic_top_k, 3);
        assert_eq!(cfg.memory.max_context_tokens, 800);
        assert!((cfg.classifier.pattern_confidence_threshold - 0.70).abs() < f32::EPSILON);
        assert!((cfg.classifier.model_confidence_threshold - 0.45).abs() < f32::EPSILON);
        assert_eq!(cfg.research.max_parallel_fetches, 4);
    }
}
