//! Mock completion client (tests, no API)
//!
//! Replies are either scripted (popped in order) or an echo of the prompt
//! head. Records every prompt for assertions.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::{OrchestratorError, Result};
use crate::llm::{CompletionClient, GenerationParams};

#[derive(Debug, Default)]
pub struct MockCompletion {
    scripted: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that returns the given replies in order, then falls back to echo
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            scripted: Mutex::new(replies.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Mock whose every call fails, for degradation paths
    pub fn failing() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(
        &self,
        prompt: &str,
        _persona: &str,
        _params: &GenerationParams,
    ) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(OrchestratorError::CompletionFailure(
                "mock failure".to_string(),
            ));
        }
        if let Some(reply) = self.scripted.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        let head: String = prompt.chars().take(60).collect();
        Ok(format!("Echo: {}", head))
    }
}
