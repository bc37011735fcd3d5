use rusqlite::params;
use serde::Serialize;

use crate::error::AppError;

use super::{Store, db_err, now_iso8601};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRecord {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl Store {
    /// Append one message; `user_id` is empty for anonymous conversations.
    pub fn append_message(&self, user_id: &str, role: &str, content: &str) -> Result<i64, AppError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_history (user_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, role, content, now_iso8601()],
        )
        .map_err(db_err("append message"))?;
        Ok(conn.last_insert_rowid())
    }

    /// The newest `limit` messages for `user_id`, oldest first.
    pub fn recent_history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatRecord>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, role, content, timestamp FROM chat_history
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(db_err("prepare recent history"))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(ChatRecord {
                    id: row.get(0)?,
                    role: row.get(1)?,
                    content: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })
            .map_err(db_err("query recent history"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err("map history row"))?);
        }
        out.reverse();
        Ok(out)
    }

    /// Remove every message for `user_id`, returning how many were deleted.
    pub fn clear_history(&self, user_id: &str) -> Result<usize, AppError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM chat_history WHERE user_id = ?1", params![user_id])
            .map_err(db_err("clear history"))
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::make_store;

    #[test]
    fn recent_history_is_chronological_tail() {
        let (_t, store) = make_store();
        for i in 0..6 {
            store.append_message("u1", "user", &format!("m{i}")).unwrap();
        }
        store.append_message("u2", "user", "other").unwrap();

        let tail = store.recent_history("u1", 3).unwrap();
        let contents: Vec<_> = tail.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);
    }

    #[test]
    fn clear_history_only_touches_one_user() {
        let (_t, store) = make_store();
        store.append_message("u1", "user", "a").unwrap();
        store.append_message("u1", "assistant", "b").unwrap();
        store.append_message("u2", "user", "c").unwrap();

        assert_eq!(store.clear_history("u1").unwrap(), 2);
        assert!(store.recent_history("u1", 10).unwrap().is_empty());
        assert_eq!(store.recent_history("u2", 10).unwrap().len(), 1);
        assert_eq!(store.clear_history("u1").unwrap(), 0);
    }
}
