use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{Store, db_err, now_iso8601, unique_err};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Fields to change on an existing document; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
}

const DOC_COLUMNS: &str = "id, title, content, tags, category, created_at, updated_at";

impl KnowledgeDoc {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags_json: String = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            category: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

fn tags_json(tags: &[String]) -> Result<String, AppError> {
    serde_json::to_string(tags).map_err(|e| AppError::Store(format!("store: serialize tags: {e}")))
}

impl Store {
    /// Insert a new document. `id`, `title` and `content` are required and
    /// the id must be unused.
    pub fn insert_document(&self, mut doc: KnowledgeDoc) -> Result<KnowledgeDoc, AppError> {
        doc.id = doc.id.trim().to_string();
        if doc.id.is_empty() || doc.title.trim().is_empty() || doc.content.trim().is_empty() {
            return Err(AppError::Invalid("id, title, and content are required".into()));
        }
        if doc.category.trim().is_empty() {
            doc.category = default_category();
        }

        let conn = self.conn()?;
        let now = now_iso8601();
        doc.created_at = now.clone();
        doc.updated_at = now;
        conn.execute(
            "INSERT INTO knowledge_docs (id, title, content, tags, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                doc.id,
                doc.title,
                doc.content,
                tags_json(&doc.tags)?,
                doc.category,
                doc.created_at,
                doc.updated_at,
            ],
        )
        .map_err(unique_err("insert document", format!("document '{}' already exists", doc.id)))?;
        Ok(doc)
    }

    pub fn update_document(&self, id: &str, patch: KnowledgePatch) -> Result<KnowledgeDoc, AppError> {
        let mut doc = self
            .get_document(id)?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

        if let Some(title) = patch.title {
            doc.title = title;
        }
        if let Some(content) = patch.content {
            doc.content = content;
        }
        if let Some(tags) = patch.tags {
            doc.tags = tags;
        }
        if let Some(category) = patch.category {
            doc.category = category;
        }
        doc.updated_at = now_iso8601();

        let conn = self.conn()?;
        conn.execute(
            "UPDATE knowledge_docs SET title = ?2, content = ?3, tags = ?4, category = ?5, updated_at = ?6
             WHERE id = ?1",
            params![doc.id, doc.title, doc.content, tags_json(&doc.tags)?, doc.category, doc.updated_at],
        )
        .map_err(db_err("update document"))?;
        Ok(doc)
    }

    pub fn delete_document(&self, id: &str) -> Result<(), AppError> {
        let conn = self.conn()?;
        let n = conn
            .execute("DELETE FROM knowledge_docs WHERE id = ?1", params![id])
            .map_err(db_err("delete document"))?;
        if n == 0 {
            return Err(AppError::NotFound("Document not found".into()));
        }
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<KnowledgeDoc>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {DOC_COLUMNS} FROM knowledge_docs WHERE id = ?1"),
            params![id],
            KnowledgeDoc::from_row,
        )
        .optional()
        .map_err(db_err("get document"))
    }

    /// All documents in insertion order, optionally limited to one category.
    pub fn list_documents(&self, category: Option<&str>) -> Result<Vec<KnowledgeDoc>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOC_COLUMNS} FROM knowledge_docs
                 WHERE ?1 IS NULL OR category = ?1
                 ORDER BY rowid"
            ))
            .map_err(db_err("prepare list documents"))?;
        let rows = stmt
            .query_map(params![category], KnowledgeDoc::from_row)
            .map_err(db_err("query list documents"))?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row.map_err(db_err("map document row"))?);
        }
        Ok(docs)
    }
}

/// Documents inserted into an empty knowledge base.
pub(crate) fn default_documents() -> Vec<KnowledgeDoc> {
    let doc = |id: &str, title: &str, content: &str, tags: &[&str], category: &str| KnowledgeDoc {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        category: category.into(),
        created_at: String::new(),
        updated_at: String::new(),
    };
    vec![
        doc(
            "welcome",
            "Welcome to learnbot",
            "This server gives every user a personal AI assistant and a shared chat bot that anyone can teach new responses.",
            &["platform", "introduction", "welcome"],
            "general",
        ),
        doc(
            "features",
            "Platform Features",
            "Key features include: a chat bot that learns trigger and response patterns from everyone, a live learning feed, a personal AI assistant with persistent chat history, and knowledge base search.",
            &["features", "capabilities", "platform"],
            "general",
        ),
        doc(
            "ai-capabilities",
            "AI Assistant Capabilities",
            "Your AI assistant can: answer questions, search the knowledge base, remember conversation context, and fall back to built-in replies when no language model is reachable.",
            &["ai", "assistant", "capabilities"],
            "technical",
        ),
        doc(
            "getting-started",
            "Getting Started Guide",
            "To get started: 1) create a user with POST /api/users, 2) send its id in the x-user-id header, 3) teach the bot with POST /api/teach, 4) chat with your assistant at POST /api/assistant/chat.",
            &["guide", "tutorial", "getting-started"],
            "help",
        ),
        doc(
            "security",
            "Security & Privacy",
            "Each user has isolated chat history and private patterns. Patterns are only shared when taught as public. Users are identified by id; there are no passwords.",
            &["security", "privacy", "users"],
            "technical",
        ),
    ]
}
