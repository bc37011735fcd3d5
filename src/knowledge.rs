//! Knowledge base: keyword-scored search over stored documents.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::AppError;
use crate::learning::blocking;
use crate::store::{KnowledgeDoc, KnowledgePatch, Store};

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredDoc {
    #[serde(flatten)]
    pub doc: KnowledgeDoc,
    pub score: u32,
}

/// Relevance of `doc` to `query`, case-insensitive:
/// +10 when the title contains the whole query, +2 per query word found in
/// the content, +5 per tag that contains the query or is contained in it.
pub fn score(doc: &KnowledgeDoc, query: &str) -> u32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0;
    }
    let mut score = 0;

    if doc.title.to_lowercase().contains(&query) {
        score += 10;
    }

    let content = doc.content.to_lowercase();
    score += 2 * query.split_whitespace().filter(|w| content.contains(w)).count() as u32;

    score += 5 * doc
        .tags
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty() && (t.contains(&query) || query.contains(t.as_str())))
        .count() as u32;

    score
}

/// Rank `docs` against `query`: drop zero scores, highest first (ties keep
/// their original order), at most `limit`.
pub fn rank(docs: Vec<KnowledgeDoc>, query: &str, limit: usize) -> Vec<ScoredDoc> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<ScoredDoc> = docs
        .into_iter()
        .map(|doc| {
            let score = score(&doc, query);
            ScoredDoc { doc, score }
        })
        .filter(|s| s.score > 0)
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}

#[derive(Clone)]
pub struct KnowledgeBase {
    store: Store,
}

impl KnowledgeBase {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDoc>, AppError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.list(None).await?;
        Ok(rank(docs, query, limit))
    }

    pub async fn categories(&self) -> Result<Vec<String>, AppError> {
        let docs = self.list(None).await?;
        let set: BTreeSet<String> = docs.into_iter().map(|d| d.category).collect();
        Ok(set.into_iter().collect())
    }

    pub async fn list(&self, category: Option<&str>) -> Result<Vec<KnowledgeDoc>, AppError> {
        let store = self.store.clone();
        let category = category.map(str::to_string);
        blocking(move || store.list_documents(category.as_deref())).await
    }

    pub async fn get(&self, id: &str) -> Result<KnowledgeDoc, AppError> {
        let store = self.store.clone();
        let id = id.to_string();
        blocking(move || store.get_document(&id))
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))
    }

    pub async fn add(&self, doc: KnowledgeDoc) -> Result<KnowledgeDoc, AppError> {
        let store = self.store.clone();
        blocking(move || store.insert_document(doc)).await
    }

    pub async fn update(&self, id: &str, patch: KnowledgePatch) -> Result<KnowledgeDoc, AppError> {
        let store = self.store.clone();
        let id = id.to_string();
        blocking(move || store.update_document(&id, patch)).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let store = self.store.clone();
        let id = id.to_string();
        blocking(move || store.delete_document(&id)).await
    }
}
