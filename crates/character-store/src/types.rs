//! Record types returned by the store.

use serde::{Deserialize, Serialize};

/// Smallest character id handed out per user.
pub const MIN_CHAR_ID: i64 = 1;

/// Current revision of a character, with neighbour ids for navigation.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Character {
    pub id: i64,
    pub user_id: String,
    pub char_id: i64,
    pub text: String,
    pub creator_id: String,
    pub created: i64,
    pub prev_char_id: Option<i64>,
    pub next_char_id: Option<i64>,
}

/// Latest revision of a character without navigation data.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CharacterSummary {
    pub id: i64,
    pub user_id: String,
    pub char_id: i64,
    pub text: String,
    pub creator_id: String,
    pub created: i64,
}

/// One row of the paginated user listing.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserCharacterCount {
    pub user_id: String,
    pub chars_cnt: i64,
    pub last_change: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Picture {
    pub id: i64,
    pub user_id: String,
    pub char_id: i64,
    pub picture_filename: String,
    pub creator_id: String,
    pub created: i64,
    pub active: bool,
}

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub user_id: String,
    pub is_admin: bool,
    pub authed_since: Option<i64>,
    pub authed_by: Option<String>,
    pub is_user_id: Option<String>,
    pub is_char_id: Option<i64>,
    pub created: i64,
    pub updated: i64,
}

impl UserRecord {
    /// Authed when the grant lies in the past.
    pub fn is_authed(&self, now: i64) -> bool {
        self.authed_since.map(|since| since < now).unwrap_or(false)
    }

    /// The character this user acts as, if linked.
    pub fn linked_character(&self) -> Option<(&str, i64)> {
        match (&self.is_user_id, self.is_char_id) {
            (Some(user_id), Some(char_id)) => Some((user_id.as_str(), char_id)),
            _ => None,
        }
    }
}

/// Follow-up context stored per user between two messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum InteractionStatus {
    #[default]
    None,
    /// The next picture the user sends belongs to this character.
    AwaitingPicture { user_id: String, char_id: i64 },
    /// Canned follow-up commands for navigation glyphs and `@name` replies.
    DynNavigation(Navigation),
}

impl InteractionStatus {
    pub fn navigation(&self) -> Option<&Navigation> {
        match self {
            InteractionStatus::DynNavigation(nav) => Some(nav),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redo: Option<String>,
    /// Template with one `{}` placeholder receiving the bare user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_user_id: Option<String>,
}

impl Navigation {
    pub fn is_empty(&self) -> bool {
        self.left.is_none()
            && self.right.is_none()
            && self.redo.is_none()
            && self.add_user_id.is_none()
    }
}

/// Database-backed command answered from a response template.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCommand {
    pub command: String,
    pub alt_commands: Vec<String>,
    pub response: String,
    /// `None` means the default keyboard.
    pub response_keyboards: Option<Vec<String>>,
}

impl StaticCommand {
    /// Whether `name` is the command or one of its alternatives.
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.command.to_lowercase() == name
            || self.alt_commands.iter().any(|alt| alt.to_lowercase() == name)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct StaticMessageRow {
    pub command: String,
    pub alt_commands: Option<String>,
    pub response: String,
    pub response_keyboards: Option<String>,
}

impl TryFrom<StaticMessageRow> for StaticCommand {
    type Error = serde_json::Error;

    fn try_from(row: StaticMessageRow) -> Result<Self, Self::Error> {
        let alt_commands = match row.alt_commands.as_deref() {
            Some(json) if !json.trim().is_empty() => serde_json::from_str(json)?,
            _ => Vec::new(),
        };
        let response_keyboards = match row.response_keyboards.as_deref() {
            Some(json) if !json.trim().is_empty() => Some(serde_json::from_str(json)?),
            _ => None,
        };

        Ok(Self {
            command: row.command,
            alt_commands,
            response: row.response,
            response_keyboards,
        })
    }
}

/// Number of character stats.
pub const STAT_COUNT: usize = 7;

/// Stat points and experience of one character.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterStats {
    pub user_id: String,
    pub char_id: i64,
    /// Points per stat, index 0 holds stat id 1.
    pub stats: [i64; STAT_COUNT],
    /// Experience in hundredths of a point.
    pub exp: i64,
}

impl CharacterStats {
    pub fn empty(user_id: &str, char_id: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            char_id,
            stats: [0; STAT_COUNT],
            exp: 3000,
        }
    }

    /// Points of the stat with the 1-based `stat_id`.
    pub fn get(&self, stat_id: i64) -> i64 {
        usize::try_from(stat_id - 1)
            .ok()
            .and_then(|idx| self.stats.get(idx).copied())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CharacterStatsRow {
    pub user_id: String,
    pub char_id: i64,
    pub stat_1: i64,
    pub stat_2: i64,
    pub stat_3: i64,
    pub stat_4: i64,
    pub stat_5: i64,
    pub stat_6: i64,
    pub stat_7: i64,
    pub exp: i64,
}

impl From<CharacterStatsRow> for CharacterStats {
    fn from(row: CharacterStatsRow) -> Self {
        Self {
            user_id: row.user_id,
            char_id: row.char_id,
            stats: [
                row.stat_1, row.stat_2, row.stat_3, row.stat_4, row.stat_5, row.stat_6, row.stat_7,
            ],
            exp: row.exp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Quest {
    pub id: i64,
    pub caption: String,
    pub description: String,
    pub enabled: bool,
    pub max_active_count: i64,
    pub repeat_hours: i64,
    pub max_duration: i64,
    pub reward_money: i64,
    pub reward_exp: i64,
    pub min_group_size: i64,
    /// JSON list of `{"id": stat_id, "points": n}`.
    pub min_stats: Option<String>,
}

/// Minimum stat requirement of a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinStat {
    pub id: i64,
    pub points: i64,
}

impl Quest {
    pub fn min_stats(&self) -> Vec<MinStat> {
        self.min_stats
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// A quest together with the users currently blocking a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestWithActive {
    pub quest: Quest,
    pub active_users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct QuestPart {
    pub id: i64,
    pub quest_id: i64,
    pub part_num: i64,
    pub part_name: String,
    pub text: Option<String>,
    pub next_step_text: Option<String>,
    pub next_part_num: i64,
    pub condition: Option<String>,
}

impl QuestPart {
    pub fn is_final(&self) -> bool {
        self.next_part_num == -1
    }
}

/// A running quest of a character joined with its quest and current part.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ActiveQuest {
    pub quest_id: i64,
    pub caption: String,
    pub part_id: i64,
    pub part_name: String,
    pub next_step_text: Option<String>,
    pub next_part_num: i64,
    pub started: i64,
    pub completed: i64,
}

/// Input for creating a quest.
#[derive(Debug, Clone, Default)]
pub struct NewQuest {
    pub caption: String,
    pub description: String,
    pub max_active_count: i64,
    pub repeat_hours: i64,
    pub max_duration: i64,
    pub reward_money: i64,
    pub reward_exp: i64,
    pub min_group_size: i64,
    pub min_stats: Vec<MinStat>,
}

/// Input for creating a quest part.
#[derive(Debug, Clone, Default)]
pub struct NewQuestPart {
    pub part_num: i64,
    pub part_name: String,
    pub text: Option<String>,
    pub next_step_text: Option<String>,
    pub next_part_num: i64,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct QuestRow {
    #[sqlx(flatten)]
    pub quest: Quest,
    pub active_users: Option<String>,
}

impl From<QuestRow> for QuestWithActive {
    fn from(row: QuestRow) -> Self {
        let active_users = row
            .active_users
            .map(|users| users.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            quest: row.quest,
            active_users,
        }
    }
}
