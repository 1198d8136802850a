//! Completion client abstraction

use async_trait::async_trait;

use crate::core::error::Result;

/// Generation knobs for one completion call
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u16,
    /// Sequences that cut generation short (e.g. trailing source-list boilerplate)
    pub stop: Vec<String>,
}

impl GenerationParams {
    /// Profile for conversational and recall replies
    pub fn default_profile() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            stop: Vec::new(),
        }
    }

    /// Profile for web-evidence synthesis: short, fact-dense, low temperature
    pub fn web_synthesis(max_tokens: u16) -> Self {
        Self {
            temperature: 0.2,
            max_tokens,
            stop: vec!["\nFonti:".to_string(), "\nSources:".to_string()],
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::default_profile()
    }
}

/// Completion client: prompt + persona in, text out. Must fail closed rather
/// than hang past its timeout.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, persona: &str, params: &GenerationParams)
        -> Result<String>;
}
