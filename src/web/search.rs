//! Web research engine
//!
//! One logical request = initial multi-engine pass, dedup, quality gate, and
//! at most `max_retries` relaxed-query passes. Engine failures shrink the
//! result set instead of failing the request; only zero results after the
//! retry budget surfaces as `WebResearchExhausted`.
//!
//! Quality = 0.4·count + 0.3·domain diversity + 0.3·query-keyword overlap,
//! each component saturating at 1.0.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ResearchSection;
use crate::core::error::{OrchestratorError, Result};
use crate::web::engine::{RawHit, SearchEngine};

/// One scored, deduplicated search hit
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Registrable domain (last two host labels)
    pub domain: String,
    pub source_engine: &'static str,
    pub relevance_score: f32,
}

/// Outcome of one logical research request
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub results: Vec<SearchResult>,
    pub quality: f32,
    pub retried: bool,
}

pub struct WebResearchEngine {
    engines: Vec<Arc<dyn SearchEngine>>,
    config: ResearchSection,
    parallelism: Arc<Semaphore>,
}

impl WebResearchEngine {
    pub fn new(engines: Vec<Arc<dyn SearchEngine>>, config: ResearchSection) -> Self {
        let parallelism = Arc::new(Semaphore::new(config.max_parallel_fetches.max(1)));
        Self {
            engines,
            config,
            parallelism,
        }
    }

    /// Run the full research loop for a query.
    pub async fn research(&self, query: &str) -> Result<ResearchOutcome> {
        let mut merged = self.run_pass(query).await;
        let mut results = self.dedup(merged.clone());
        let mut quality = quality_score(query, &results);
        let mut retried = false;

        let mut retries_left = self.config.max_retries;
        while retries_left > 0
            && (quality < self.config.quality_threshold
                || results.len() < self.config.min_results)
        {
            retries_left -= 1;
            let relaxed = relax_query(query);
            if relaxed == query {
                break;
            }
            debug!(relaxed = %relaxed, "research retry with relaxed query");
            let second = self.run_pass(&relaxed).await;
            merged.extend(second);
            results = self.dedup(merged.clone());
            quality = quality_score(query, &results);
            retried = true;
        }

        if results.is_empty() {
            return Err(OrchestratorError::WebResearchExhausted);
        }

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ResearchOutcome {
            results,
            quality,
            retried,
        })
    }

    /// One pass: every engine concurrently, bounded by the fetch semaphore.
    /// A failed engine logs a warning and contributes nothing.
    async fn run_pass(&self, query: &str) -> Vec<SearchResult> {
        let limit = self.config.results_per_engine;
        let futures = self.engines.iter().map(|engine| {
            let permits = Arc::clone(&self.parallelism);
            let engine = Arc::clone(engine);
            let query = query.to_string();
            async move {
                let _permit = permits.acquire().await.ok()?;
                match engine.search(&query, limit).await {
                    Ok(hits) => Some((engine.name(), hits)),
                    Err(e) => {
                        warn!(engine = engine.name(), error = %e, "search engine failed");
                        None
                    }
                }
            }
        });

        let mut out = Vec::new();
        for (engine_name, hits) in join_all(futures).await.into_iter().flatten() {
            for hit in hits {
                if let Some(result) = score_hit(query, engine_name, hit) {
                    out.push(result);
                }
            }
        }
        out
    }

    /// Same-domain results whose path-segment Jaccard similarity reaches the
    /// threshold collapse into the first seen; each registrable domain keeps
    /// at most `max_per_domain` results.
    fn dedup(&self, hits: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut kept: Vec<SearchResult> = Vec::new();
        let mut per_domain: HashMap<String, usize> = HashMap::new();

        for hit in hits {
            let count = per_domain.get(&hit.domain).copied().unwrap_or(0);
            if count >= self.config.max_per_domain {
                continue;
            }
            let duplicate = kept.iter().any(|k| {
                k.domain == hit.domain
                    && path_jaccard(&k.url, &hit.url) >= self.config.dedup_similarity
            });
            if duplicate {
                continue;
            }
            per_domain.insert(hit.domain.clone(), count + 1);
            kept.push(hit);
        }
        kept
    }
}

fn score_hit(query: &str, engine_name: &'static str, hit: RawHit) -> Option<SearchResult> {
    let domain = registrable_domain(&hit.url)?;
    let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
    let relevance_score = keyword_overlap(query, &text);
    Some(SearchResult {
        url: hit.url,
        title: hit.title,
        snippet: hit.snippet,
        domain,
        source_engine: engine_name,
        relevance_score,
    })
}

/// Last two labels of the host, so www.example.com and blog.example.com
/// count as the same publisher
pub fn registrable_domain(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next()?.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.is_empty() {
        return None;
    }
    let tail = if labels.len() >= 2 {
        &labels[labels.len() - 2..]
    } else {
        &labels[..]
    };
    Some(tail.join(".").to_lowercase())
}

/// Jaccard similarity over path segments; identical paths (including both
/// empty) score 1.0
fn path_jaccard(a: &str, b: &str) -> f32 {
    let seg = |url: &str| -> HashSet<String> {
        url.splitn(2, "://")
            .nth(1)
            .unwrap_or(url)
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .split('/')
            .skip(1)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect()
    };
    let sa = seg(a);
    let sb = seg(b);
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count() as f32;
    let union = sa.union(&sb).count() as f32;
    intersection / union
}

/// Significant query terms: longer than 3 chars, lowercased
fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 3)
        .map(|t| t.to_string())
        .collect()
}

fn keyword_overlap(query: &str, text: &str) -> f32 {
    let terms = query_terms(query);
    if terms.is_empty() {
        return 1.0;
    }
    let hits = terms.iter().filter(|t| text.contains(t.as_str())).count();
    hits as f32 / terms.len() as f32
}

/// Heuristic sufficiency of a result set for the original query
pub fn quality_score(query: &str, results: &[SearchResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let count_component = (results.len() as f32 / 5.0).min(1.0);
    let domains: HashSet<&str> = results.iter().map(|r| r.domain.as_str()).collect();
    let diversity_component = (domains.len() as f32 / 3.0).min(1.0);
    let corpus = results
        .iter()
        .map(|r| format!("{} {}", r.title, r.snippet))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let overlap_component = keyword_overlap(query, &corpus);
    0.4 * count_component + 0.3 * diversity_component + 0.3 * overlap_component
}

fn noise_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "oggi", "adesso", "ora", "subito", "attualmente", "stamattina", "stasera",
            "ultime", "ultimi", "ultima", "ultimo", "recenti", "recente", "veloce",
            "now", "today", "latest", "current", "currently", "recent", "breaking",
            "quick",
        ]
        .into_iter()
        .collect()
    })
}

/// Remove temporal/noise words to broaden a retry. Pure token filter, so
/// applying it twice changes nothing; a query that would become empty is
/// returned unchanged.
pub fn relax_query(query: &str) -> String {
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|token| {
            let bare: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            !noise_words().contains(bare.as_str())
        })
        .collect();
    if kept.is_empty() {
        return query.trim().to_string();
    }
    kept.join(" ")
}
