use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

use crate::error::AppError;

use super::{Store, db_err, now_iso8601, unique_err};

/// A caller identity. There are no credentials; the id is presented in the
/// `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub created_at: String,
}

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl Store {
    pub fn create_user(&self, username: &str, name: Option<&str>) -> Result<User, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Invalid("username is required".into()));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            created_at: now_iso8601(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, username, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.username, user.name, user.created_at],
        )
        .map_err(unique_err("insert user", "username already exists".into()))?;
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, username, name, created_at FROM users WHERE id = ?1",
            params![id],
            User::from_row,
        )
        .optional()
        .map_err(db_err("get user"))
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, username, name, created_at FROM users WHERE username = ?1",
            params![username],
            User::from_row,
        )
        .optional()
        .map_err(db_err("find user"))
    }
}
