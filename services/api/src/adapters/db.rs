//! services/api/src/adapters/db.rs
//!
//! The database adapter: the concrete implementation of the `DrawingStore`
//! port from the core crate, backed by SQLite through `sqlx`.
//!
//! Queries use the runtime API rather than the compile-time checked macros so
//! the crate builds without a live database. The guessed-by check-and-set
//! rides on the composite primary key of the `guesses` table; point awards
//! are relative increments so concurrent scoring events commute.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draw_duel_core::domain::{
    Drawing, DrawingSummary, OpenDuel, Timeline, User, UserCredentials,
};
use draw_duel_core::ports::{DrawingStore, StoreError, StoreResult};
use sqlx::error::ErrorKind;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DrawingStore` port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps an sqlx failure onto the port taxonomy. Connection-level failures
/// become `Unavailable` so they are never misreported as missing records.
fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound("no matching row".to_string()),
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => StoreError::Conflict(db.message().to_string()),
            ErrorKind::ForeignKeyViolation => StoreError::NotFound(db.message().to_string()),
            _ => StoreError::Unexpected(db.to_string()),
        },
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable("connection pool timed out".to_string())
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool closed".to_string()),
        sqlx::Error::Io(e) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    nickname: String,
    points: i64,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            nickname: self.nickname,
            points: self.points,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    nickname: String,
    password_hash: String,
}

#[derive(FromRow)]
struct DrawingRecord {
    id: String,
    author_id: i64,
    timeline: String,
    secret_word: String,
    created_at: DateTime<Utc>,
}

impl DrawingRecord {
    fn to_domain(self, guessed_by: HashSet<i64>) -> StoreResult<Drawing> {
        let timeline: Timeline = serde_json::from_str(&self.timeline).map_err(|e| {
            StoreError::Unexpected(format!("corrupt timeline for drawing {}: {e}", self.id))
        })?;
        Ok(Drawing {
            id: self.id,
            author_id: self.author_id,
            timeline,
            secret_word: self.secret_word,
            guessed_by,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: String,
    secret_word: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct DuelRecord {
    id: String,
    nickname: String,
}

//=========================================================================================
// `DrawingStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DrawingStore for SqliteStore {
    async fn create_user(&self, nickname: &str, password_hash: &str) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (nickname, password_hash, points, created_at)
             VALUES (?, ?, 0, ?)
             RETURNING id, nickname, points",
        )
        .bind(nickname)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.to_domain())
    }

    async fn user(&self, user_id: i64) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, nickname, points FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(record.to_domain())
    }

    async fn user_by_nickname(&self, nickname: &str) -> StoreResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, nickname, password_hash FROM users WHERE nickname = ?",
        )
        .bind(nickname)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(UserCredentials {
            id: record.id,
            nickname: record.nickname,
            password_hash: record.password_hash,
        })
    }

    async fn add_points(&self, user_id: i64, delta: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
            .bind(delta)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn leaderboard(&self, limit: u32) -> StoreResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, nickname, points FROM users
             ORDER BY points DESC, nickname ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_drawing(
        &self,
        author_id: i64,
        timeline: &Timeline,
        secret_word: &str,
    ) -> StoreResult<String> {
        // Random v4, never sequential or time-ordered: the id ends up in
        // shareable URLs and must not be enumerable.
        let id = Uuid::new_v4().to_string();
        let timeline_json = serde_json::to_string(timeline)
            .map_err(|e| StoreError::Unexpected(format!("timeline encoding failed: {e}")))?;
        sqlx::query(
            "INSERT INTO drawings (id, author_id, timeline, secret_word, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(author_id)
        .bind(timeline_json)
        .bind(secret_word)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(id)
    }

    async fn drawing(&self, drawing_id: &str) -> StoreResult<Drawing> {
        let record = sqlx::query_as::<_, DrawingRecord>(
            "SELECT id, author_id, timeline, secret_word, created_at
             FROM drawings WHERE id = ?",
        )
        .bind(drawing_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM guesses WHERE drawing_id = ?")
                .bind(drawing_id)
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;
        let guessed_by = rows.into_iter().map(|(user_id,)| user_id).collect();

        record.to_domain(guessed_by)
    }

    async fn mark_guessed(&self, drawing_id: &str, user_id: i64) -> StoreResult<()> {
        // The composite primary key makes this a single atomic
        // check-and-set; a concurrent duplicate inserts zero rows.
        let result = sqlx::query(
            "INSERT INTO guesses (drawing_id, user_id, guessed_at)
             VALUES (?, ?, ?)
             ON CONFLICT (drawing_id, user_id) DO NOTHING",
        )
        .bind(drawing_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyGuessed);
        }
        Ok(())
    }

    async fn record_correct_guess(
        &self,
        drawing_id: &str,
        guesser_id: i64,
        author_id: i64,
    ) -> StoreResult<()> {
        // One transaction: the guessed-by insert and both point awards land
        // together or not at all. Any early return drops the transaction,
        // which rolls it back.
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let inserted = sqlx::query(
            "INSERT INTO guesses (drawing_id, user_id, guessed_at)
             VALUES (?, ?, ?)
             ON CONFLICT (drawing_id, user_id) DO NOTHING",
        )
        .bind(drawing_id)
        .bind(guesser_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyGuessed);
        }
        for user_id in [guesser_id, author_id] {
            let updated = sqlx::query("UPDATE users SET points = points + 1 WHERE id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            if updated.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("user {user_id}")));
            }
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn drawings_by_author(&self, author_id: i64) -> StoreResult<Vec<DrawingSummary>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            "SELECT id, secret_word, created_at FROM drawings
             WHERE author_id = ?
             ORDER BY created_at DESC",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records
            .into_iter()
            .map(|r| DrawingSummary {
                id: r.id,
                word: r.secret_word,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn open_duels_for(&self, user_id: i64) -> StoreResult<Vec<OpenDuel>> {
        let records = sqlx::query_as::<_, DuelRecord>(
            "SELECT d.id, u.nickname FROM drawings d
             JOIN users u ON u.id = d.author_id
             WHERE d.author_id <> ?
               AND NOT EXISTS (
                   SELECT 1 FROM guesses g
                   WHERE g.drawing_id = d.id AND g.user_id = ?
               )
             ORDER BY d.created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records
            .into_iter()
            .map(|r| OpenDuel {
                drawing_id: r.id,
                author_nickname: r.nickname,
            })
            .collect())
    }

    async fn create_session(
        &self,
        session_id: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn session_user(&self, session_id: &str) -> StoreResult<i64> {
        let (user_id,): (i64,) = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = ? AND expires_at > ?",
        )
        .bind(session_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(user_id)
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
