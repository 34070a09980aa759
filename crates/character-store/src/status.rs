//! Per-user interaction status.

use crate::error::StoreError;
use crate::store::{now, Store};
use crate::types::InteractionStatus;
use tracing::warn;

impl Store {
    /// Stored status, `None` when absent or unreadable.
    pub async fn command_status(&self, user_id: &str) -> Result<InteractionStatus, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM user_command_status WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;

        let Some((json,)) = row else {
            return Ok(InteractionStatus::None);
        };

        match serde_json::from_str(&json) {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!("Discarding unreadable status of {user_id}: {e}");
                Ok(InteractionStatus::None)
            }
        }
    }

    pub async fn set_command_status(
        &self,
        user_id: &str,
        status: &InteractionStatus,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(status)?;
        sqlx::query(
            "INSERT INTO user_command_status (user_id, status, updated) VALUES (?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET status = excluded.status, updated = excluded.updated",
        )
        .bind(user_id)
        .bind(json)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn clear_command_status(&self, user_id: &str) -> Result<(), StoreError> {
        self.set_command_status(user_id, &InteractionStatus::None)
            .await
    }
}
