//! WebRead tool
//!
//! Fetches a URL and extracts readable text with html2text; falls back to a
//! naive tag stripper when conversion produces nothing. Output is capped at
//! `max_result_chars` so one long page cannot blow the prompt budget.

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::Value;

use crate::tools::Tool;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct WebReadTool {
    client: Client,
    max_result_chars: usize,
}

impl WebReadTool {
    pub fn new(timeout_secs: u64, max_result_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_result_chars,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err("Only http(s) URLs are supported".to_string());
        }
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let mut body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;

        if body.starts_with('\u{FEFF}') {
            body = body[3..].to_string();
        }
        let body = if looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        };

        if body.chars().count() > self.max_result_chars {
            let truncated: String = body.chars().take(self.max_result_chars).collect();
            Ok(format!("{}...[truncated]", truncated))
        } else {
            Ok(body)
        }
    }
}

#[async_trait]
impl Tool for WebReadTool {
    fn name(&self) -> &str {
        "web_read"
    }

    fn description(&self) -> &str {
        "Fetches a web page and returns its readable text"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| "Missing 'url' argument".to_string())?;
        self.fetch(url).await
    }
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

/// Fallback tag stripper for markup html2text cannot handle
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
