//! Stats and quests of the role-play module.

use crate::error::StoreError;
use crate::store::{now, Store};
use crate::types::*;
use tracing::{debug, instrument};

const QUEST_COLUMNS: &str = "id, caption, description, enabled, max_active_count, repeat_hours, \
     max_duration, reward_money, reward_exp, min_group_size, min_stats";

const PART_COLUMNS: &str =
    "id, quest_id, part_num, part_name, text, next_step_text, next_part_num, condition";

/// A character quest counts as active until its deadline plus the repeat delay.
const ACTIVE_USERS: &str = "(SELECT GROUP_CONCAT(user_id) FROM character_quests AS cq \
     WHERE cq.quest_id = quests.id AND cq.completed + quests.repeat_hours * 3600 > ?)";

impl Store {
    /// Stats of a character, `None` when never set.
    pub async fn character_stats(
        &self,
        user_id: &str,
        char_id: i64,
    ) -> Result<Option<CharacterStats>, StoreError> {
        let row = sqlx::query_as::<_, CharacterStatsRow>(
            "SELECT user_id, char_id, stat_1, stat_2, stat_3, stat_4, stat_5, stat_6, stat_7, exp \
             FROM character_stats \
             WHERE user_id = ? AND char_id = ? AND deleted IS NULL LIMIT 1",
        )
        .bind(user_id)
        .bind(char_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(CharacterStats::from))
    }

    /// Set one stat and return the updated stats.
    ///
    /// Returns `None` when the character does not exist.
    #[instrument(skip(self))]
    pub async fn set_character_stat(
        &self,
        user_id: &str,
        char_id: i64,
        stat_id: i64,
        points: i64,
    ) -> Result<Option<CharacterStats>, StoreError> {
        if !(1..=STAT_COUNT as i64).contains(&stat_id) {
            return Err(StoreError::InvalidStat(stat_id));
        }
        if self.get_character(user_id, char_id).await?.is_none() {
            return Ok(None);
        }

        if self.character_stats(user_id, char_id).await?.is_none() {
            sqlx::query("INSERT INTO character_stats (user_id, char_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(char_id)
                .execute(self.pool())
                .await?;
        }

        // stat_id is range-checked above.
        sqlx::query(&format!(
            "UPDATE character_stats SET stat_{stat_id} = ? \
             WHERE user_id = ? AND char_id = ? AND deleted IS NULL"
        ))
        .bind(points)
        .bind(user_id)
        .bind(char_id)
        .execute(self.pool())
        .await?;

        self.character_stats(user_id, char_id).await
    }

    /// Enabled quests that still have a free slot.
    pub async fn available_quests(&self) -> Result<Vec<Quest>, StoreError> {
        Ok(sqlx::query_as::<_, Quest>(&format!(
            "SELECT {QUEST_COLUMNS} FROM quests \
             WHERE enabled <> 0 AND ( \
                SELECT COUNT(*) FROM character_quests AS cq \
                WHERE cq.quest_id = quests.id \
                  AND cq.completed + quests.repeat_hours * 3600 > ?) < max_active_count \
             ORDER BY id"
        ))
        .bind(now())
        .fetch_all(self.pool())
        .await?)
    }

    /// Enabled quest by caption, with the users occupying it.
    pub async fn quest_by_caption(
        &self,
        caption: &str,
    ) -> Result<Option<QuestWithActive>, StoreError> {
        let row: Option<QuestRow> = sqlx::query_as(&quest_sql("caption = ? COLLATE NOCASE"))
            .bind(now())
            .bind(caption)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(QuestWithActive::from))
    }

    /// Enabled quest by id, with the users occupying it.
    pub async fn quest(&self, quest_id: i64) -> Result<Option<QuestWithActive>, StoreError> {
        let row: Option<QuestRow> = sqlx::query_as(&quest_sql("id = ?"))
            .bind(now())
            .bind(quest_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(QuestWithActive::from))
    }

    /// Running quests of a character.
    pub async fn character_quests(
        &self,
        user_id: &str,
        char_id: i64,
    ) -> Result<Vec<ActiveQuest>, StoreError> {
        Ok(sqlx::query_as::<_, ActiveQuest>(
            "SELECT cq.quest_id, q.caption, cq.part_id, qp.part_name, qp.next_step_text, \
                    qp.next_part_num, cq.started, cq.completed \
             FROM character_quests AS cq \
             JOIN quests AS q ON q.id = cq.quest_id \
             JOIN quest_parts AS qp ON qp.id = cq.part_id \
             WHERE cq.user_id = ? AND cq.char_id = ? AND cq.completed > ? \
               AND cq.status = 'running' \
             ORDER BY cq.started",
        )
        .bind(user_id)
        .bind(char_id)
        .bind(now())
        .fetch_all(self.pool())
        .await?)
    }

    /// The running instance of one quest for a character.
    pub async fn character_quest(
        &self,
        user_id: &str,
        char_id: i64,
        quest_id: i64,
    ) -> Result<Option<ActiveQuest>, StoreError> {
        Ok(self
            .character_quests(user_id, char_id)
            .await?
            .into_iter()
            .find(|q| q.quest_id == quest_id))
    }

    /// Start `quest` for a character at `part`. The deadline is `max_duration` hours away.
    #[instrument(skip(self, quest, part), fields(quest_id = quest.id))]
    pub async fn accept_quest(
        &self,
        user_id: &str,
        char_id: i64,
        quest: &Quest,
        part: &QuestPart,
    ) -> Result<(), StoreError> {
        let ts = now();
        sqlx::query(
            "INSERT INTO character_quests \
             (user_id, char_id, quest_id, part_id, status, started, changed, completed) \
             VALUES (?, ?, ?, ?, 'running', ?, ?, ?)",
        )
        .bind(user_id)
        .bind(char_id)
        .bind(quest.id)
        .bind(part.id)
        .bind(ts)
        .bind(ts)
        .bind(ts + quest.max_duration * 3600)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Advance a running quest to `part`, completing it when the part is final.
    #[instrument(skip(self, part), fields(part_id = part.id))]
    pub async fn set_character_quest_part(
        &self,
        user_id: &str,
        char_id: i64,
        part: &QuestPart,
    ) -> Result<(), StoreError> {
        let ts = now();
        if part.is_final() {
            sqlx::query(
                "UPDATE character_quests SET part_id = ?, changed = ?, completed = ?, status = 'succeed' \
                 WHERE user_id = ? AND char_id = ? AND quest_id = ? AND status = 'running'",
            )
            .bind(part.id)
            .bind(ts)
            .bind(ts)
            .bind(user_id)
            .bind(char_id)
            .bind(part.quest_id)
            .execute(self.pool())
            .await?;
            debug!("Quest {} completed by {user_id}/{char_id}", part.quest_id);
        } else {
            sqlx::query(
                "UPDATE character_quests SET part_id = ?, changed = ? \
                 WHERE user_id = ? AND char_id = ? AND quest_id = ? AND status = 'running'",
            )
            .bind(part.id)
            .bind(ts)
            .bind(user_id)
            .bind(char_id)
            .bind(part.quest_id)
            .execute(self.pool())
            .await?;
        }
        Ok(())
    }

    /// Alternative parts sharing one part number.
    pub async fn quest_parts(
        &self,
        quest_id: i64,
        part_num: i64,
    ) -> Result<Vec<QuestPart>, StoreError> {
        Ok(sqlx::query_as::<_, QuestPart>(&format!(
            "SELECT {PART_COLUMNS} FROM quest_parts WHERE quest_id = ? AND part_num = ? ORDER BY id"
        ))
        .bind(quest_id)
        .bind(part_num)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn quest_parts_by_name(
        &self,
        quest_id: i64,
        part_name: &str,
    ) -> Result<Vec<QuestPart>, StoreError> {
        Ok(sqlx::query_as::<_, QuestPart>(&format!(
            "SELECT {PART_COLUMNS} FROM quest_parts \
             WHERE quest_id = ? AND part_name = ? COLLATE NOCASE ORDER BY id"
        ))
        .bind(quest_id)
        .bind(part_name)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn add_quest(&self, quest: &NewQuest) -> Result<i64, StoreError> {
        let min_stats = if quest.min_stats.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&quest.min_stats)?)
        };

        let result = sqlx::query(
            "INSERT INTO quests (caption, description, max_active_count, repeat_hours, max_duration, \
                                 reward_money, reward_exp, min_group_size, min_stats) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quest.caption)
        .bind(&quest.description)
        .bind(quest.max_active_count)
        .bind(quest.repeat_hours)
        .bind(quest.max_duration)
        .bind(quest.reward_money)
        .bind(quest.reward_exp)
        .bind(quest.min_group_size)
        .bind(min_stats)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn add_quest_part(
        &self,
        quest_id: i64,
        part: &NewQuestPart,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO quest_parts \
             (quest_id, part_num, part_name, text, next_step_text, next_part_num, condition) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(quest_id)
        .bind(part.part_num)
        .bind(&part.part_name)
        .bind(&part.text)
        .bind(&part.next_step_text)
        .bind(part.next_part_num)
        .bind(&part.condition)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }
}

fn quest_sql(filter: &str) -> String {
    format!(
        "SELECT {QUEST_COLUMNS}, {ACTIVE_USERS} AS active_users \
         FROM quests WHERE enabled <> 0 AND {filter}"
    )
}
