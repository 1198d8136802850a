//! Memory store boundary
//!
//! The vector index and the KV cache are external collaborators; these traits
//! are their whole contract. The in-memory implementations exist for tests
//! and single-process deployments: semantic search degrades to keyword
//! overlap (distance = 1 − overlap), the KV layer honors TTLs lazily on read.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::error::Result;

/// One semantic match; lower distance is closer
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub distance: f32,
}

/// Semantic upsert/query by (collection, text, metadata)
#[async_trait]
pub trait SemanticStore: Send + Sync {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        text: &str,
        metadata: Value,
    ) -> Result<()>;

    /// Top-K nearest documents; `filter` restricts to documents whose
    /// metadata field equals the given value
    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<SemanticMatch>>;
}

/// Plain key-value layer with TTL
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Doc {
    id: String,
    text: String,
    metadata: Value,
}

/// Keyword-overlap semantic store
#[derive(Default)]
pub struct InMemorySemanticStore {
    collections: RwLock<HashMap<String, Vec<Doc>>>,
}

impl InMemorySemanticStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_string())
        .collect()
}

fn overlap_distance(query: &str, doc: &str) -> f32 {
    let query_terms = terms(query);
    if query_terms.is_empty() {
        return 0.5;
    }
    let doc_lower = doc.to_lowercase();
    let hits = query_terms
        .iter()
        .filter(|t| doc_lower.contains(t.as_str()))
        .count();
    1.0 - hits as f32 / query_terms.len() as f32
}

#[async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        text: &str,
        metadata: Value,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if let Some(existing) = docs.iter_mut().find(|d| d.id == id) {
            existing.text = text.to_string();
            existing.metadata = metadata;
        } else {
            docs.push(Doc {
                id: id.to_string(),
                text: text.to_string(),
                metadata,
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<SemanticMatch>> {
        let collections = self.collections.read().await;
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };
        let mut matches: Vec<SemanticMatch> = docs
            .iter()
            .filter(|doc| match filter {
                Some((field, value)) => doc.metadata[field].as_str() == Some(value),
                None => true,
            })
            .map(|doc| SemanticMatch {
                id: doc.id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                distance: overlap_distance(text, &doc.text),
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// TTL-aware in-memory KV
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((_, Some(deadline))) if Instant::now() > *deadline => Ok(None),
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let deadline = ttl.map(|d| Instant::now() + d);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_ranks_by_keyword_overlap() {
        let store = InMemorySemanticStore::new();
        store
            .upsert("facts", "1", "preferisce risposte brevi", serde_json::json!({}))
            .await
            .unwrap();
        store
            .upsert("facts", "2", "lavora a un progetto drone", serde_json::json!({}))
            .await
            .unwrap();
        let matches = store
            .query("facts", "progetto drone", 2, None)
            .await
            .unwrap();
        assert_eq!(matches[0].id, "2");
        assert!(matches[0].distance < matches[1].distance);
    }

    #[tokio::test]
    async fn metadata_filter_scopes_results() {
        let store = InMemorySemanticStore::new();
        store
            .upsert("facts", "a", "fatto di alice", serde_json::json!({"user_id": "alice"}))
            .await
            .unwrap();
        store
            .upsert("facts", "b", "fatto di bob", serde_json::json!({"user_id": "bob"}))
            .await
            .unwrap();
        let matches = store
            .query("facts", "fatto", 5, Some(("user_id", "alice")))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn upsert_replaces_same_id() {
        let store = InMemorySemanticStore::new();
        store
            .upsert("c", "x", "vecchio", serde_json::json!({}))
            .await
            .unwrap();
        store
            .upsert("c", "x", "nuovo", serde_json::json!({}))
            .await
            .unwrap();
        let matches = store.query("c", "nuovo", 5, None).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "nuovo");
    }

    #[tokio::test]
    async fn kv_ttl_expires_lazily() {
        let kv = InMemoryKvStore::new();
        kv.set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }
}
