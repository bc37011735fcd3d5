//! Learned trigger → response patterns.
//!
//! A pattern with `owner = ''` is shared: every caller sees it and anyone may
//! delete it. Owned patterns are visible to their owner, and to everyone when
//! `is_public` is set.

use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::engine::matcher::normalize;
use crate::error::AppError;

use super::{Store, db_err, now_iso8601};

/// Shared patterns inserted into an empty database.
pub(crate) const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("hello", "Hello! I can learn from everyone who teaches me!"),
    (
        "how do you learn",
        "Anyone can teach me patterns, and I remember them for everyone!",
    ),
    (
        "who taught you",
        "I learn from everyone! Check the learning feed to see who taught me what.",
    ),
];

const PATTERN_COLUMNS: &str =
    "id, owner, trigger, response, taught_by, is_public, taught_at, use_count";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: i64,
    /// Owning user id; empty for shared patterns.
    pub owner: String,
    pub trigger: String,
    pub response: String,
    pub taught_by: String,
    pub is_public: bool,
    pub taught_at: String,
    pub use_count: i64,
}

impl Pattern {
    pub fn is_shared(&self) -> bool {
        self.owner.is_empty()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            trigger: row.get(2)?,
            response: row.get(3)?,
            taught_by: row.get(4)?,
            is_public: row.get::<_, i64>(5)? != 0,
            taught_at: row.get(6)?,
            use_count: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPattern {
    pub owner: String,
    pub trigger: String,
    pub response: String,
    pub taught_by: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The row that was removed.
    Deleted(Pattern),
    NotFound,
    /// The pattern belongs to a different user.
    Forbidden,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternStats {
    pub total_patterns: i64,
    pub total_teachers: i64,
    pub total_uses: i64,
    pub total_chats: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_patterns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_chats: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_patterns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<i64>,
}

impl Store {
    /// Insert a pattern, or replace the response of an existing
    /// `(owner, trigger)` pair. Id and use count survive a replacement.
    pub fn upsert_pattern(&self, new: NewPattern) -> Result<Pattern, AppError> {
        let trigger = normalize(&new.trigger);
        if trigger.is_empty() {
            return Err(AppError::Invalid("Missing trigger or response".into()));
        }
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO patterns (owner, trigger, response, taught_by, is_public, taught_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(owner, trigger) DO UPDATE SET
                 response = excluded.response,
                 taught_by = excluded.taught_by,
                 is_public = excluded.is_public,
                 taught_at = excluded.taught_at
             RETURNING {PATTERN_COLUMNS}"
        );
        conn.query_row(
            &sql,
            params![
                new.owner,
                trigger,
                new.response,
                new.taught_by,
                new.is_public as i64,
                now_iso8601(),
            ],
            Pattern::from_row,
        )
        .map_err(db_err("upsert pattern"))
    }

    /// Patterns `viewer` may match against, in match order: the viewer's own
    /// first, then longer triggers, then more frequently used ones.
    pub fn visible_patterns(&self, viewer: Option<&str>) -> Result<Vec<Pattern>, AppError> {
        self.query_visible(
            viewer,
            "ORDER BY CASE WHEN owner != '' AND owner = ?1 THEN 0 ELSE 1 END,
                      LENGTH(trigger) DESC, use_count DESC, id ASC",
        )
    }

    /// Same visibility as [`Store::visible_patterns`], newest first.
    pub fn list_patterns(&self, viewer: Option<&str>) -> Result<Vec<Pattern>, AppError> {
        self.query_visible(viewer, "ORDER BY taught_at DESC, id DESC")
    }

    fn query_visible(&self, viewer: Option<&str>, order: &str) -> Result<Vec<Pattern>, AppError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {PATTERN_COLUMNS} FROM patterns
             WHERE owner = '' OR is_public = 1 OR owner = ?1
             {order}"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err("prepare visible patterns"))?;
        // An anonymous viewer never equals a real owner id.
        let viewer = viewer.unwrap_or("");
        let rows = stmt
            .query_map(params![viewer], Pattern::from_row)
            .map_err(db_err("query visible patterns"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err("map pattern row"))?);
        }
        Ok(out)
    }

    pub fn get_pattern(&self, id: i64) -> Result<Option<Pattern>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1"),
            params![id],
            Pattern::from_row,
        )
        .optional()
        .map_err(db_err("get pattern"))
    }

    pub fn record_use(&self, id: i64) -> Result<(), AppError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE patterns SET use_count = use_count + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(db_err("record pattern use"))?;
        Ok(())
    }

    pub fn delete_pattern(&self, id: i64, viewer: Option<&str>) -> Result<DeleteOutcome, AppError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err("begin delete tx"))?;

        let existing = tx
            .query_row(
                &format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1"),
                params![id],
                Pattern::from_row,
            )
            .optional()
            .map_err(db_err("look up pattern"))?;

        let outcome = match existing {
            None => DeleteOutcome::NotFound,
            Some(p) if !p.owner.is_empty() && Some(p.owner.as_str()) != viewer => {
                DeleteOutcome::Forbidden
            }
            Some(p) => {
                tx.execute("DELETE FROM patterns WHERE id = ?1", params![id])
                    .map_err(db_err("delete pattern"))?;
                DeleteOutcome::Deleted(p)
            }
        };

        tx.commit().map_err(db_err("commit delete tx"))?;
        Ok(outcome)
    }

    /// Totals over every pattern; per-viewer counts when `viewer` is set.
    pub fn pattern_stats(&self, viewer: Option<&str>) -> Result<PatternStats, AppError> {
        let conn = self.conn()?;
        let (total_patterns, total_teachers, total_uses) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT taught_by), COALESCE(SUM(use_count), 0)
                 FROM patterns",
                [],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
            )
            .map_err(db_err("pattern totals"))?;
        let total_chats: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chat_history WHERE role = 'user'",
                [],
                |r| r.get(0),
            )
            .map_err(db_err("chat totals"))?;

        let mut stats = PatternStats {
            total_patterns,
            total_teachers,
            total_uses,
            total_chats,
            ..PatternStats::default()
        };

        if let Some(viewer) = viewer {
            let count = |sql: &str, p: &[&dyn rusqlite::ToSql]| -> Result<i64, AppError> {
                conn.query_row(sql, p, |r| r.get(0)).map_err(db_err("viewer stats"))
            };
            stats.my_patterns = Some(count("SELECT COUNT(*) FROM patterns WHERE owner = ?1", &[&viewer])?);
            stats.my_chats = Some(count(
                "SELECT COUNT(*) FROM chat_history WHERE user_id = ?1 AND role = 'user'",
                &[&viewer],
            )?);
            stats.public_patterns = Some(count(
                "SELECT COUNT(*) FROM patterns WHERE is_public = 1 OR owner = ''",
                &[],
            )?);
            stats.total_users = Some(count("SELECT COUNT(*) FROM users", &[])?);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::make_store;

    fn teach(store: &Store, owner: &str, trigger: &str, response: &str, public: bool) -> Pattern {
        store
            .upsert_pattern(NewPattern {
                owner: owner.into(),
                trigger: trigger.into(),
                response: response.into(),
                taught_by: if owner.is_empty() { "anonymous".into() } else { owner.into() },
                is_public: public,
            })
            .unwrap()
    }

    #[test]
    fn trigger_is_normalized() {
        let (_t, store) = make_store();
        let p = teach(&store, "", "  Good Morning ", "Morning!", false);
        assert_eq!(p.trigger, "good morning");
        assert_eq!(p.use_count, 0);
        assert!(p.is_shared());
    }

    #[test]
    fn blank_trigger_rejected() {
        let (_t, store) = make_store();
        let err = store
            .upsert_pattern(NewPattern {
                owner: String::new(),
                trigger: "   ".into(),
                response: "x".into(),
                taught_by: "a".into(),
                is_public: false,
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[test]
    fn reteach_replaces_response_and_keeps_id() {
        let (_t, store) = make_store();
        let first = teach(&store, "", "ping", "pong", false);
        store.record_use(first.id).unwrap();
        let second = teach(&store, "", "PING", "pong!", false);
        assert_eq!(first.id, second.id);
        assert_eq!(second.response, "pong!");
        assert_eq!(second.use_count, 1);
        assert_eq!(store.list_patterns(None).unwrap().len(), 1);
    }

    #[test]
    fn same_trigger_different_owners_coexist() {
        let (_t, store) = make_store();
        teach(&store, "alice", "weather", "sunny", false);
        teach(&store, "bob", "weather", "rainy", false);
        assert_eq!(store.visible_patterns(Some("alice")).unwrap().len(), 1);
        assert_eq!(store.visible_patterns(Some("bob")).unwrap()[0].response, "rainy");
    }

    #[test]
    fn visibility_rules() {
        let (_t, store) = make_store();
        teach(&store, "", "shared", "s", false);
        teach(&store, "alice", "private", "p", false);
        teach(&store, "alice", "public", "q", true);

        let anon: Vec<_> = store.visible_patterns(None).unwrap().into_iter().map(|p| p.trigger).collect();
        assert!(anon.contains(&"shared".to_string()));
        assert!(anon.contains(&"public".to_string()));
        assert!(!anon.contains(&"private".to_string()));

        assert_eq!(store.visible_patterns(Some("alice")).unwrap().len(), 3);
        assert_eq!(store.visible_patterns(Some("bob")).unwrap().len(), 2);
    }

    #[test]
    fn match_order_prefers_own_then_longer_then_used() {
        let (_t, store) = make_store();
        let short = teach(&store, "", "hi", "a", false);
        let long = teach(&store, "", "hi there", "b", false);
        let mine = teach(&store, "alice", "yo", "c", false);
        let tie_a = teach(&store, "", "ab", "d", false);
        store.record_use(tie_a.id).unwrap();
        let order: Vec<i64> = store.visible_patterns(Some("alice")).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(order[0], mine.id);
        assert_eq!(order[1], long.id);
        assert_eq!(order[2], tie_a.id);
        assert_eq!(order[3], short.id);
    }

    #[test]
    fn list_is_newest_first() {
        let (_t, store) = make_store();
        let a = teach(&store, "", "one", "1", false);
        let b = teach(&store, "", "two", "2", false);
        let ids: Vec<i64> = store.list_patterns(None).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn delete_outcomes() {
        let (_t, store) = make_store();
        let shared = teach(&store, "", "shared", "s", false);
        let alices = teach(&store, "alice", "mine", "m", true);

        assert_eq!(store.delete_pattern(999, None).unwrap(), DeleteOutcome::NotFound);
        assert_eq!(store.delete_pattern(alices.id, Some("bob")).unwrap(), DeleteOutcome::Forbidden);
        assert_eq!(store.delete_pattern(alices.id, None).unwrap(), DeleteOutcome::Forbidden);
        assert_eq!(store.delete_pattern(alices.id, Some("alice")).unwrap(), DeleteOutcome::Deleted(alices));
        assert!(matches!(
            store.delete_pattern(shared.id, Some("bob")).unwrap(),
            DeleteOutcome::Deleted(p) if p.trigger == "shared"
        ));
        assert!(store.get_pattern(shared.id).unwrap().is_none());
    }

    #[test]
    fn stats_count_teachers_and_uses() {
        let (_t, store) = make_store();
        let p = teach(&store, "", "a", "1", false);
        teach(&store, "alice", "b", "2", false);
        store.record_use(p.id).unwrap();
        store.record_use(p.id).unwrap();

        let stats = store.pattern_stats(None).unwrap();
        assert_eq!(stats.total_patterns, 2);
        assert_eq!(stats.total_teachers, 2);
        assert_eq!(stats.total_uses, 2);
        assert!(stats.my_patterns.is_none());

        let mine = store.pattern_stats(Some("alice")).unwrap();
        assert_eq!(mine.my_patterns, Some(1));
        assert_eq!(mine.public_patterns, Some(1));
        assert_eq!(mine.total_users, Some(0));
    }

    #[test]
    fn empty_stats_are_zero() {
        let (_t, store) = make_store();
        assert_eq!(store.pattern_stats(None).unwrap(), PatternStats::default());
    }
}
