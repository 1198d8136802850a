//! Tool executor
//!
//! Wraps every registry call in a timeout and emits one structured audit line
//! per call (tool, outcome, duration, args preview — never full args, which
//! may carry user text). Independent calls run concurrently under a
//! semaphore; one failed call never sinks the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::core::error::{OrchestratorError, Result};
use crate::tools::{Tool, ToolRegistry};

/// One requested invocation
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool_name: String,
    pub args: Value,
}

/// One completed invocation, as surfaced in the chat response
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub result: String,
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    parallelism: Arc<Semaphore>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64, max_parallel: usize) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            parallelism: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// Execute one tool. Timeout → ToolTimeout, unknown name → ToolUnavailable,
    /// tool error → ToolExecutionFailed. Every call leaves an audit line.
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<String> {
        if self.registry.get(tool_name).is_none() {
            return Err(OrchestratorError::ToolUnavailable(tool_name.to_string()));
        }

        let start = Instant::now();
        let preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(OrchestratorError::ToolExecutionFailed(e)),
            Err(_) => Err(OrchestratorError::ToolTimeout(tool_name.to_string())),
        }
    }

    /// Execute independent calls concurrently, bounded by the semaphore.
    /// Failed calls are dropped from the output (logged by `execute`); the
    /// reply degrades to whatever subset succeeded.
    pub async fn execute_many(&self, calls: Vec<ToolCall>) -> Vec<ToolResult> {
        let futures = calls.into_iter().map(|call| {
            let permits = Arc::clone(&self.parallelism);
            async move {
                // Semaphore is never closed, acquire cannot fail
                let _permit = permits.acquire().await.ok()?;
                match self.execute(&call.tool_name, call.args).await {
                    Ok(result) => Some(ToolResult {
                        tool_name: call.tool_name,
                        result,
                    }),
                    Err(_) => None,
                }
            }
        });
        join_all(futures).await.into_iter().flatten().collect()
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps past the deadline"
        }
        async fn execute(&self, _args: Value) -> std::result::Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns its input"
        }
        async fn execute(&self, args: Value) -> std::result::Result<String, String> {
            Ok(args["text"].as_str().unwrap_or("").to_string())
        }
    }

    #[tokio::test]
    async fn timeout_maps_to_tool_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let executor = ToolExecutor::new(registry, 1, 4);
        let err = executor
            .execute("slow", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ToolTimeout(_)));
    }

    #[tokio::test]
    async fn unknown_tool_maps_to_unavailable() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 1, 4);
        let err = executor
            .execute("nope", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn batch_keeps_successes_and_drops_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(SlowTool);
        let executor = ToolExecutor::new(registry, 1, 4);
        let results = executor
            .execute_many(vec![
                ToolCall {
                    tool_name: "echo".to_string(),
                    args: serde_json::json!({"text": "a"}),
                },
                ToolCall {
                    tool_name: "slow".to_string(),
                    args: serde_json::json!({}),
                },
                ToolCall {
                    tool_name: "echo".to_string(),
                    args: serde_json::json!({"text": "b"}),
                },
            ])
            .await;
        let mut texts: Vec<String> = results.into_iter().map(|r| r.result).collect();
        texts.sort();
        assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
    }
}
