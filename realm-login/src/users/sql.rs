//! SQLite user store
//!
//! Backend users live in `backend_users`, frontend members in
//! `frontend_members`. Both tables share one layout; `start` and `stop` are
//! unix timestamps and may be NULL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;

use super::{LocalUser, UserStore, UserStoreError};
use crate::config::is_plain_identifier;
use crate::oauth2::types::Realm;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS backend_users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT,
    disable INTEGER NOT NULL DEFAULT 0,
    login INTEGER NOT NULL DEFAULT 1,
    start INTEGER,
    stop INTEGER
);
CREATE TABLE IF NOT EXISTS frontend_members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT,
    disable INTEGER NOT NULL DEFAULT 0,
    login INTEGER NOT NULL DEFAULT 0,
    start INTEGER,
    stop INTEGER
);
";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: Option<String>,
    disable: bool,
    login: bool,
    start: Option<i64>,
    stop: Option<i64>,
}

impl UserRow {
    fn into_user(self, realm: Realm) -> LocalUser {
        LocalUser {
            id: self.id,
            username: self.username,
            email: self.email,
            realm,
            disabled: self.disable,
            login_allowed: self.login,
            start: self.start.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            stop: self.stop.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            attributes: BTreeMap::new(),
        }
    }
}

const fn table(realm: Realm) -> &'static str {
    match realm {
        Realm::Backend => "backend_users",
        Realm::Frontend => "frontend_members",
    }
}

/// User store backed by SQLite
#[derive(Debug, Clone)]
pub struct SqlUserStore {
    pool: SqlitePool,
}

impl SqlUserStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database
    ///
    /// In-memory databases are limited to a single connection so every query
    /// sees the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established
    pub async fn connect(url: &str) -> Result<Self, UserStoreError> {
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the user tables if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created
    pub async fn migrate(&self) -> Result<(), UserStoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a user into its realm's table and return the new id
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. duplicate username)
    pub async fn insert(&self, user: &LocalUser) -> Result<i64, UserStoreError> {
        let sql = format!(
            "INSERT INTO {} (username, email, disable, login, start, stop) VALUES (?, ?, ?, ?, ?, ?)",
            table(user.realm)
        );

        let result = sqlx::query(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.disabled)
            .bind(user.login_allowed)
            .bind(user.start.map(|t| t.timestamp()))
            .bind(user.stop.map(|t| t.timestamp()))
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find_one_by(
        &self,
        realm: Realm,
        field: &str,
        value: &str,
    ) -> Result<Option<LocalUser>, UserStoreError> {
        // The field becomes a column name; only plain identifiers are allowed.
        if !is_plain_identifier(field) {
            return Err(UserStoreError::InvalidField(field.to_string()));
        }

        let sql = format!(
            "SELECT id, username, email, disable, login, start, stop FROM {} WHERE {field} = ? LIMIT 1",
            table(realm)
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.into_user(realm)))
    }
}
