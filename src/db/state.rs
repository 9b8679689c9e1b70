//! Runtime state tracking: cached refresh token and resume marker.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::resume::ResumeStore;
use crate::types::RecordingId;
use crate::{Error, Result};

use super::Database;

/// Key under which the long-lived refresh token is cached
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key under which the resume marker is stored
pub const LAST_DOWNLOADED_KEY: &str = "last_downloaded_recording_id";

impl Database {
    /// Read a runtime state value
    pub async fn get_state(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            SELECT value FROM runtime_state WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read runtime state '{}': {}",
                key, e
            )))
        })
    }

    /// Insert or replace a runtime state value
    pub async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write runtime state '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Remove a runtime state value (no-op when absent)
    pub async fn delete_state(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM runtime_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete runtime state '{}': {}",
                    key, e
                )))
            })?;

        Ok(())
    }

    /// Cached refresh token from a previous session, ignoring blank values
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self
            .get_state(REFRESH_TOKEN_KEY)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    /// Cache a refresh token for the next session
    pub async fn set_refresh_token(&self, token: &str) -> Result<()> {
        self.set_state(REFRESH_TOKEN_KEY, token).await
    }

    /// Forget the cached refresh token
    pub async fn clear_refresh_token(&self) -> Result<()> {
        self.delete_state(REFRESH_TOKEN_KEY).await
    }
}

#[async_trait]
impl ResumeStore for Database {
    async fn last_downloaded(&self) -> Result<Option<RecordingId>> {
        let Some(raw) = self.get_state(LAST_DOWNLOADED_KEY).await? else {
            return Ok(None);
        };
        match raw.parse::<RecordingId>() {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                // A corrupt marker behaves like no marker: resume becomes a no-op
                tracing::warn!(value = %raw, error = %e, "Ignoring unparsable resume marker");
                Ok(None)
            }
        }
    }

    async fn set_last_downloaded(&self, id: RecordingId) -> Result<()> {
        self.set_state(LAST_DOWNLOADED_KEY, &id.to_string()).await
    }
}
