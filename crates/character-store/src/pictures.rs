use crate::error::StoreError;
use crate::store::{now, Store};
use crate::types::Picture;
use tracing::instrument;

impl Store {
    /// Record an uploaded picture. New pictures stay inactive until approved.
    #[instrument(skip(self))]
    pub async fn add_picture(
        &self,
        user_id: &str,
        char_id: i64,
        picture_filename: &str,
        creator_id: &str,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO character_pictures (user_id, char_id, picture_filename, creator_id, created) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(char_id)
        .bind(picture_filename)
        .bind(creator_id)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Newest picture of a character, approved or not.
    pub async fn latest_picture(
        &self,
        user_id: &str,
        char_id: i64,
    ) -> Result<Option<Picture>, StoreError> {
        Ok(sqlx::query_as::<_, Picture>(
            "SELECT id, user_id, char_id, picture_filename, creator_id, created, active \
             FROM character_pictures \
             WHERE user_id = ? AND char_id = ? AND deleted IS NULL \
             ORDER BY created DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(char_id)
        .fetch_optional(self.pool())
        .await?)
    }

    /// Approve the newest picture of a character.
    #[instrument(skip(self))]
    pub async fn approve_picture(&self, user_id: &str, char_id: i64) -> Result<bool, StoreError> {
        let Some(picture) = self.latest_picture(user_id, char_id).await? else {
            return Ok(false);
        };

        sqlx::query("UPDATE character_pictures SET active = 1 WHERE id = ?")
            .bind(picture.id)
            .execute(self.pool())
            .await?;
        Ok(true)
    }
}
