//! Server-side login sessions.

use crate::users::fetch_user;
use crate::{now_ts, ts_to_datetime, DbResult};
use chrono::{DateTime, Duration, Utc};
use ride_core::User;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An issued session token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Repository for session tokens.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a new random token for `user_id`
    pub async fn create(&self, user_id: i64, ttl: Duration) -> DbResult<Session> {
        let token = Uuid::new_v4().simple().to_string();
        let now = now_ts();
        let expires_at = now + ttl.num_seconds();

        sqlx::query("INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(Session {
            token,
            user_id,
            expires_at: ts_to_datetime(expires_at)?,
        })
    }

    /// Resolve a token to its user. Expired sessions are removed on sight.
    pub async fn lookup(&self, token: &str) -> DbResult<Option<User>> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(self.pool)
                .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= now_ts() {
            debug!(user_id, "Session expired");
            self.delete(token).await?;
            return Ok(None);
        }

        fetch_user(self.pool, user_id).await
    }

    pub async fn delete(&self, token: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Drop every expired session; returns how many were removed
    pub async fn purge_expired(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now_ts())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, rider};

    #[tokio::test]
    async fn test_session_roundtrip() {
        let db = memory_db().await;
        let user = rider(&db, "s@example.com").await;

        let session = db.sessions().create(user.id, Duration::hours(1)).await.unwrap();
        assert_eq!(session.token.len(), 32);

        let found = db.sessions().lookup(&session.token).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        db.sessions().delete(&session.token).await.unwrap();
        assert!(db.sessions().lookup(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_purged() {
        let db = memory_db().await;
        let user = rider(&db, "old@example.com").await;

        let stale = db.sessions().create(user.id, Duration::seconds(-5)).await.unwrap();
        db.sessions().create(user.id, Duration::seconds(-5)).await.unwrap();
        db.sessions().create(user.id, Duration::hours(1)).await.unwrap();

        assert!(db.sessions().lookup(&stale.token).await.unwrap().is_none());
        assert_eq!(db.sessions().purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let db = memory_db().await;
        assert!(db.sessions().lookup("nope").await.unwrap().is_none());
    }
}
