//! Bot users: auth grants, admin flag and acting-as linkage.

use crate::error::StoreError;
use crate::store::{now, Store};
use crate::types::UserRecord;
use tracing::{info, instrument};

const USER_COLUMNS: &str =
    "id, user_id, is_admin, authed_since, authed_by, is_user_id, is_char_id, created, updated";

impl Store {
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?)
    }

    /// Fetch a user, creating the record on first contact.
    pub async fn get_or_create_user(&self, user_id: &str) -> Result<UserRecord, StoreError> {
        let ts = now();
        sqlx::query(
            "INSERT INTO users (user_id, created, updated) VALUES (?, ?, ?) \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(ts)
        .bind(ts)
        .execute(self.pool())
        .await?;

        self.get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::Database(sqlx::Error::RowNotFound))
    }

    /// Bump the `updated` timestamp.
    pub async fn touch_user(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET updated = ? WHERE user_id = ?")
            .bind(now())
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Grant auth to `user_id`. Returns `false` when already authed.
    #[instrument(skip(self))]
    pub async fn auth_user(&self, user_id: &str, authed_by: &str) -> Result<bool, StoreError> {
        let user = self.get_or_create_user(user_id).await?;
        let ts = now();
        if user.is_authed(ts) {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET authed_since = ?, authed_by = ?, updated = ? WHERE user_id = ?")
            .bind(ts - 1)
            .bind(authed_by)
            .bind(ts)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        info!("{user_id} authed by {authed_by}");
        Ok(true)
    }

    /// Revoke auth. Returns `false` when the user was not authed.
    #[instrument(skip(self))]
    pub async fn unauth_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET authed_since = NULL, authed_by = NULL, updated = ? \
             WHERE user_id = ? AND authed_since IS NOT NULL",
        )
        .bind(now())
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote or demote a user. Returns `false` when nothing changed.
    #[instrument(skip(self))]
    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<bool, StoreError> {
        self.get_or_create_user(user_id).await?;
        let result = sqlx::query("UPDATE users SET is_admin = ?, updated = ? WHERE user_id = ? AND is_admin <> ?")
            .bind(is_admin)
            .bind(now())
            .bind(user_id)
            .bind(is_admin)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Link (or unlink with `None`) the character a user acts as.
    pub async fn link_character(
        &self,
        user_id: &str,
        linked: Option<(&str, i64)>,
    ) -> Result<(), StoreError> {
        self.get_or_create_user(user_id).await?;
        sqlx::query("UPDATE users SET is_user_id = ?, is_char_id = ?, updated = ? WHERE user_id = ?")
            .bind(linked.map(|(u, _)| u))
            .bind(linked.map(|(_, c)| c))
            .bind(now())
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
