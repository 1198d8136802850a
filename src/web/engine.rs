//! Search engine backends
//!
//! Both DuckDuckGo no-js endpoints return server-rendered anchors:
//! `result__a` on html.duckduckgo.com, `result-link` on /lite. Outbound links
//! are often wrapped in `/l/?uddg=<encoded>` redirects, which get unwrapped
//! before anything downstream sees them. Engine errors are plain strings;
//! the research layer decides whether they matter.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const DDG_LITE_URL: &str = "https://duckduckgo.com/lite/";

/// One parsed SERP anchor, before scoring
#[derive(Debug, Clone)]
pub struct RawHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, String>;
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// POST form against html.duckduckgo.com (the historic no-js endpoint)
pub struct DuckDuckGoHtml {
    client: Client,
}

impl DuckDuckGoHtml {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
        }
    }
}

#[async_trait]
impl SearchEngine for DuckDuckGoHtml {
    fn name(&self) -> &'static str {
        "ddg_html"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, String> {
        let resp = self
            .client
            .post(DDG_HTML_URL)
            .header("Referer", DDG_HTML_URL)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("ddg html request: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("ddg html HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("ddg html body: {}", e))?;
        Ok(parse_serp(&body, limit))
    }
}

/// GET against duckduckgo.com/lite, a second chance when the html endpoint
/// rate-limits
pub struct DuckDuckGoLite {
    client: Client,
}

impl DuckDuckGoLite {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
        }
    }
}

#[async_trait]
impl SearchEngine for DuckDuckGoLite {
    fn name(&self) -> &'static str {
        "ddg_lite"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, String> {
        let resp = self
            .client
            .get(DDG_LITE_URL)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("ddg lite request: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("ddg lite HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("ddg lite body: {}", e))?;
        Ok(parse_serp(&body, limit))
    }
}

fn anchor_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r#"(?is)<a[^>]+class="result__a"[^>]+href="([^"]+)"[^>]*>(.*?)</a>"#,
            r#"(?is)<a[^>]+class="result-link"[^>]+href="([^"]+)"[^>]*>(.*?)</a>"#,
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn snippet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)class="result__snippet"[^>]*>(.*?)</a>"#).unwrap()
    })
}

/// Extract result anchors from either endpoint's markup. Internal DDG links
/// are skipped unless they carry a uddg redirect. Deduplicates by URL.
pub fn parse_serp(html: &str, limit: usize) -> Vec<RawHit> {
    let snippets: Vec<String> = snippet_regex()
        .captures_iter(html)
        .map(|c| unescape_html(&strip_tags(&c[1])))
        .collect();

    let mut hits = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for re in anchor_regexes() {
        for caps in re.captures_iter(html) {
            let url = clean_duck_url(caps[1].trim());
            if url.is_empty() {
                continue;
            }
            if url.contains("duckduckgo.com") && !url.contains("uddg=") {
                continue;
            }
            if !seen.insert(url.clone()) {
                continue;
            }
            let title = unescape_html(&strip_tags(&caps[2]));
            let snippet = snippets.get(hits.len()).cloned().unwrap_or_default();
            hits.push(RawHit {
                url,
                title,
                snippet,
            });
            if hits.len() >= limit {
                return hits;
            }
        }
    }
    hits
}

/// Unwrap DDG's `/l/?uddg=<encoded-url>` redirect wrapper
pub fn clean_duck_url(url: &str) -> String {
    let is_redirect = url.starts_with("/l/?")
        || url.starts_with("//duckduckgo.com/l/?")
        || url.contains("duckduckgo.com/l/?");
    if !is_redirect {
        return url.to_string();
    }
    let query = match url.split_once('?') {
        Some((_, q)) => q,
        None => return url.to_string(),
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("uddg=") {
            let decoded = percent_decode(value);
            if !decoded.is_empty() {
                return decoded;
            }
        }
    }
    url.to_string()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hi = (bytes[i + 1] as char).to_digit(16);
                let lo = (bytes[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                    continue;
                }
                out.push(b'%');
                i += 1;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unescape_html(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_uddg_redirects() {
        let url = "/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(clean_duck_url(url), "https://example.com/page");
    }

    #[test]
    fn leaves_plain_urls_alone() {
        assert_eq!(
            clean_duck_url("https://example.com/a"),
            "https://example.com/a"
        );
    }

    #[test]
    fn parses_html_endpoint_anchors() {
        let html = r#"
            <a rel="nofollow" class="result__a" href="https://example.com/a">First &amp; best</a>
            <a class="result__snippet" href="https://example.com/a">A snippet here</a>
            <a rel="nofollow" class="result__a" href="/l/?uddg=https%3A%2F%2Fother.org%2Fb">Second</a>
            <a class="result__a" href="https://duckduckgo.com/settings">internal</a>
        "#;
        let hits = parse_serp(html, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://example.com/a");
        assert_eq!(hits[0].title, "First & best");
        assert_eq!(hits[0].snippet, "A snippet here");
        assert_eq!(hits[1].url, "https://other.org/b");
    }

    #[test]
    fn parses_lite_endpoint_anchors_and_caps_at_limit() {
        let html = r#"
            <a class="result-link" href="https://one.com/x">One</a>
            <a class="result-link" href="https://two.com/y">Two</a>
            <a class="result-link" href="https://three.com/z">Three</a>
        "#;
        let hits = parse_serp(html, 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn dedups_repeated_urls() {
        let html = r#"
            <a class="result__a" href="https://same.com/p">A</a>
            <a class="result__a" href="https://same.com/p">B</a>
        "#;
        assert_eq!(parse_serp(html, 10).len(), 1);
    }
}
