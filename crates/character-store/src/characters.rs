//! Character sheet persistence.

use crate::error::StoreError;
use crate::store::{now, Store};
use crate::types::*;
use regex::RegexBuilder;
use tracing::{debug, instrument};

const CHARACTER_COLUMNS: &str = "id, user_id, char_id, text, creator_id, created, \
     (SELECT MAX(char_id) FROM characters AS c2 \
        WHERE c2.user_id = c.user_id AND c2.deleted IS NULL AND c2.char_id < c.char_id) AS prev_char_id, \
     (SELECT MIN(char_id) FROM characters AS c1 \
        WHERE c1.user_id = c.user_id AND c1.deleted IS NULL AND c1.char_id > c.char_id) AS next_char_id";

impl Store {
    /// Lowest char id never used by `user_id`, deleted characters included.
    pub async fn next_free_char_id(&self, user_id: &str) -> Result<i64, StoreError> {
        let min: Option<(i64,)> = sqlx::query_as(
            "SELECT char_id FROM characters WHERE user_id = ? ORDER BY char_id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        if min.map(|(id,)| id) != Some(MIN_CHAR_ID) {
            return Ok(MIN_CHAR_ID);
        }

        let next: Option<(i64,)> = sqlx::query_as(
            "SELECT ch.char_id + 1 FROM characters ch \
             WHERE ch.user_id = ? AND NOT EXISTS ( \
                SELECT NULL FROM characters mi \
                WHERE mi.char_id = ch.char_id + 1 AND mi.user_id = ch.user_id) \
             ORDER BY ch.char_id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(next.map(|(id,)| id).unwrap_or(MIN_CHAR_ID))
    }

    /// Create a new character and return its char id.
    #[instrument(skip(self, text))]
    pub async fn add_character(
        &self,
        user_id: &str,
        creator_id: &str,
        text: &str,
    ) -> Result<i64, StoreError> {
        let char_id = self.next_free_char_id(user_id).await?;
        self.insert_revision(user_id, char_id, creator_id, text).await?;
        debug!("Added character {char_id} for {user_id}");
        Ok(char_id)
    }

    /// Store a new revision of an existing character.
    ///
    /// Returns `false` when the character does not exist.
    #[instrument(skip(self, text))]
    pub async fn change_character(
        &self,
        user_id: &str,
        char_id: i64,
        creator_id: &str,
        text: &str,
    ) -> Result<bool, StoreError> {
        if self.get_character(user_id, char_id).await?.is_none() {
            return Ok(false);
        }
        self.insert_revision(user_id, char_id, creator_id, text).await?;
        Ok(true)
    }

    async fn insert_revision(
        &self,
        user_id: &str,
        char_id: i64,
        creator_id: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO characters (user_id, char_id, text, creator_id, created) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(char_id)
        .bind(text)
        .bind(creator_id)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Move a character to another user, returning its new char id.
    ///
    /// Pictures, stats and quests follow the character.
    #[instrument(skip(self))]
    pub async fn move_character(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        char_id: i64,
    ) -> Result<i64, StoreError> {
        let to_char_id = self.next_free_char_id(to_user_id).await?;

        for table in [
            "characters",
            "character_pictures",
            "character_stats",
            "character_quests",
        ] {
            sqlx::query(&format!(
                "UPDATE {table} SET user_id = ?, char_id = ? WHERE user_id = ? AND char_id = ?"
            ))
            .bind(to_user_id)
            .bind(to_char_id)
            .bind(from_user_id)
            .bind(char_id)
            .execute(self.pool())
            .await?;
        }

        Ok(to_char_id)
    }

    /// Soft-delete every revision of a character.
    #[instrument(skip(self))]
    pub async fn remove_character(
        &self,
        user_id: &str,
        char_id: i64,
        deletor_id: &str,
    ) -> Result<bool, StoreError> {
        if self.get_character(user_id, char_id).await?.is_none() {
            return Ok(false);
        }

        let ts = now();
        sqlx::query(
            "UPDATE characters SET deletor_id = ?, deleted = ? \
             WHERE user_id = ? AND char_id = ? AND deleted IS NULL",
        )
        .bind(deletor_id)
        .bind(ts)
        .bind(user_id)
        .bind(char_id)
        .execute(self.pool())
        .await?;

        sqlx::query(
            "UPDATE character_stats SET deleted = ? \
             WHERE user_id = ? AND char_id = ? AND deleted IS NULL",
        )
        .bind(ts)
        .bind(user_id)
        .bind(char_id)
        .execute(self.pool())
        .await?;

        sqlx::query("DELETE FROM character_quests WHERE user_id = ? AND char_id = ?")
            .bind(user_id)
            .bind(char_id)
            .execute(self.pool())
            .await?;

        Ok(true)
    }

    /// Soft-delete the newest revision of a character.
    #[instrument(skip(self))]
    pub async fn remove_last_revision(
        &self,
        user_id: &str,
        char_id: i64,
        deletor_id: &str,
    ) -> Result<bool, StoreError> {
        if self.get_character(user_id, char_id).await?.is_none() {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE characters SET deletor_id = ?, deleted = ? \
             WHERE id = ( \
                SELECT id FROM characters \
                WHERE user_id = ? AND char_id = ? AND deleted IS NULL \
                ORDER BY created DESC, id DESC LIMIT 1)",
        )
        .bind(deletor_id)
        .bind(now())
        .bind(user_id)
        .bind(char_id)
        .execute(self.pool())
        .await?;

        Ok(true)
    }

    /// Smallest live char id of a user.
    pub async fn first_char_id(&self, user_id: &str) -> Result<Option<i64>, StoreError> {
        let row: (Option<i64>,) = sqlx::query_as(
            "SELECT MIN(char_id) FROM characters WHERE user_id = ? AND deleted IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row.0)
    }

    /// Current revision of a character.
    pub async fn get_character(
        &self,
        user_id: &str,
        char_id: i64,
    ) -> Result<Option<Character>, StoreError> {
        let sql = format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters AS c \
             WHERE user_id = ? AND char_id = ? AND deleted IS NULL \
             ORDER BY created DESC, id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Character>(&sql)
            .bind(user_id)
            .bind(char_id)
            .fetch_optional(self.pool())
            .await?)
    }

    /// Latest revision of every live character of a user, ordered by char id.
    pub async fn user_characters(
        &self,
        user_id: &str,
    ) -> Result<Vec<CharacterSummary>, StoreError> {
        Ok(sqlx::query_as::<_, CharacterSummary>(
            "SELECT id, user_id, char_id, text, creator_id, created FROM characters AS c \
             WHERE user_id = ? AND deleted IS NULL AND id = ( \
                SELECT id FROM characters AS l \
                WHERE l.user_id = c.user_id AND l.char_id = c.char_id AND l.deleted IS NULL \
                ORDER BY created DESC, id DESC LIMIT 1) \
             ORDER BY char_id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?)
    }

    /// One page of users owning live characters, newest change first.
    ///
    /// Fetches `limit + 1` rows so callers can tell whether a next page exists.
    pub async fn list_users_with_characters(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<Vec<UserCharacterCount>, StoreError> {
        let Some(offset) = (page.max(1) - 1).checked_mul(limit) else {
            return Ok(Vec::new());
        };
        Ok(sqlx::query_as::<_, UserCharacterCount>(
            "SELECT user_id, COUNT(DISTINCT char_id) AS chars_cnt, MAX(created) AS last_change \
             FROM characters WHERE deleted IS NULL \
             GROUP BY user_id \
             ORDER BY last_change DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(limit.saturating_add(1))
        .bind(offset)
        .fetch_all(self.pool())
        .await?)
    }

    /// Characters of `user_id` whose name lines mention `name`.
    pub async fn find_characters(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Vec<CharacterSummary>, StoreError> {
        let chars = self.user_characters(user_id).await?;
        Ok(filter_by_key(chars, "name", name))
    }

    /// Characters of all users with a `key: ...query...` line.
    pub async fn search_characters(
        &self,
        query: &str,
        key: &str,
    ) -> Result<Vec<CharacterSummary>, StoreError> {
        let pattern = format!("%{query}%");
        let chars = sqlx::query_as::<_, CharacterSummary>(
            "SELECT id, user_id, char_id, text, creator_id, created FROM characters AS c \
             WHERE deleted IS NULL AND text LIKE ? AND id = ( \
                SELECT id FROM characters AS l \
                WHERE l.user_id = c.user_id AND l.char_id = c.char_id AND l.deleted IS NULL \
                ORDER BY created DESC, id DESC LIMIT 1) \
             ORDER BY user_id, char_id",
        )
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;

        Ok(filter_by_key(chars, key, query))
    }
}

fn filter_by_key(chars: Vec<CharacterSummary>, key: &str, value: &str) -> Vec<CharacterSummary> {
    let pattern = format!(
        r"{}[^:\n]*:[^a-zäöüß\n]*{}",
        regex::escape(key),
        regex::escape(value)
    );
    let Ok(re) = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    else {
        return Vec::new();
    };

    chars.into_iter().filter(|c| re.is_match(&c.text)).collect()
}
