//! User resolution: Kik profiles, admin and auth state, and the helpers
//! commands use to find the user and character they act on.

use crate::engine::ResponseContext;
use crate::error::AppResult;
use async_trait::async_trait;
use kik_client::{Download, KikClient, KikError, OutboundMessage, UserProfile, ALIASED_ID_LEN};
use regex::RegexBuilder;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long a fetched profile is trusted.
pub const PROFILE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// How long a failed lookup suppresses further requests for the same id.
pub const FAILED_LOOKUP_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum number of characters offered when the caller has to pick one.
const MAX_CHARACTER_CHOICES: usize = 12;

/// The parts of the Kik API the bot depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KikApi: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, KikError>;
    async fn download(&self, url: &str) -> Result<Download, KikError>;
    async fn send_messages(&self, messages: &[OutboundMessage]) -> Result<(), KikError>;
}

#[async_trait]
impl KikApi for KikClient {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, KikError> {
        KikClient::get_user(self, user_id).await
    }

    async fn download(&self, url: &str) -> Result<Download, KikError> {
        KikClient::download(self, url).await
    }

    async fn send_messages(&self, messages: &[OutboundMessage]) -> Result<(), KikError> {
        KikClient::send_messages(self, messages).await
    }
}

/// Profile lookups cached per lowercase user id.
///
/// Failed lookups are remembered for a shorter time. Expired entries are
/// dropped whenever a new one is stored.
pub struct ProfileCache {
    ttl: Duration,
    failure_ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Option<UserProfile>)>>,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new(PROFILE_TTL)
    }
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            failure_ttl: ttl.min(FAILED_LOOKUP_TTL),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_failure_ttl(mut self, failure_ttl: Duration) -> Self {
        self.failure_ttl = failure_ttl;
        self
    }

    pub async fn get(&self, kik: &dyn KikApi, user_id: &str) -> Option<UserProfile> {
        let key = user_id.to_lowercase();
        {
            let entries = self.entries.lock().await;
            if let Some((expires, profile)) = entries.get(&key) {
                if Instant::now() < *expires {
                    return profile.clone();
                }
            }
        }

        let profile = match kik.get_user(&key).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Profile lookup for {key} failed: {e}");
                None
            }
        };

        let now = Instant::now();
        let ttl = if profile.is_some() {
            self.ttl
        } else {
            self.failure_ttl
        };
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (expires, _)| *expires > now);
        entries.insert(key, (now + ttl, profile.clone()));
        profile
    }

    /// Number of cached lookups, expired ones included until the next store.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// A user as seen by commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotUser {
    /// Lowercase Kik id without `@`.
    pub id: String,
    pub profile: Option<UserProfile>,
    pub is_admin: bool,
    pub is_authed: bool,
    /// Character this user acts as by default.
    pub linked: Option<(String, i64)>,
}

impl BotUser {
    /// Kik hides some users behind opaque ids that cannot be mentioned.
    pub fn is_aliased(&self) -> bool {
        self.id.len() == ALIASED_ID_LEN
    }

    /// `@id`, or a placeholder for aliased ids.
    pub fn id_repr(&self) -> String {
        if self.is_aliased() {
            "@~anonuser~".to_string()
        } else {
            format!("@{}", self.id)
        }
    }

    pub fn first_name(&self) -> String {
        match &self.profile {
            Some(p) if !p.first_name.is_empty() => p.first_name.clone(),
            _ => self.id_repr(),
        }
    }

    pub fn last_name(&self) -> String {
        self.profile
            .as_ref()
            .map(|p| p.last_name.clone())
            .unwrap_or_default()
    }

    pub fn full_name(&self) -> Option<String> {
        self.profile
            .as_ref()
            .map(UserProfile::full_name)
            .filter(|n| !n.is_empty())
    }

    pub fn name_or_id(&self) -> String {
        self.full_name().unwrap_or_else(|| self.id_repr())
    }

    /// `First Last (@id)` when both are known.
    pub fn name_and_id(&self) -> String {
        match self.full_name() {
            Some(name) if self.is_aliased() => name,
            Some(name) => format!("{name} ({})", self.id_repr()),
            None => self.id_repr(),
        }
    }
}

/// Id of the user a command acts on, or `None` after replying with a hint.
///
/// Falls back to the linked character's owner when `use_linked` is set and
/// to the caller otherwise. Aliased callers are asked for their real id.
pub async fn require_user_id(
    ctx: &mut ResponseContext,
    param: &str,
    use_linked: bool,
) -> AppResult<Option<String>> {
    if let Some(user_id) = ctx.user_param(param) {
        return Ok(Some(user_id));
    }
    if use_linked {
        if let Some((user_id, _)) = &ctx.user.linked {
            return Ok(Some(user_id.clone()));
        }
    }
    if !ctx.user.is_aliased() {
        return Ok(Some(ctx.user.id.clone()));
    }

    debug!("Aliased caller without user id for {}", ctx.invoked);
    let bot = ctx.bot_username().to_string();
    let example = ctx.example_with(&[(param, "@Deine_User_Id".to_string())]);
    ctx.text(
        "Leider konnte ich deinen Nutzer nicht zuordnen. \
         Bitte führe den Befehl erneut mit deiner Nutzer-Id aus:",
    );
    ctx.text(format!("@{bot} {example}"));

    if use_linked {
        let link = ctx.example_for(
            "Ich-Bin",
            &[("user_id", "@Deine_User_Id".to_string()), ("char_id", "1".to_string())],
        );
        ctx.text(
            "Wenn du zukünfig alle Befehle mit deinem Charakter verknüpfen möchtest, \
             kannst du dir deinen Standard-Charakter setzen:",
        );
        ctx.text(format!("@{bot} {link}"));
    }
    Ok(None)
}

/// Char id a command acts on, or `None` after replying with a hint.
///
/// A single character is chosen automatically, as is the linked one. With
/// several characters the caller gets a picker unless `use_first` is set.
pub async fn require_char_id(
    ctx: &mut ResponseContext,
    param: &str,
    user_id: &str,
    use_first: bool,
) -> AppResult<Option<i64>> {
    if let Some(char_id) = ctx.number_param(param) {
        if ctx.store().get_character(user_id, char_id).await?.is_some() {
            return Ok(Some(char_id));
        }
        ctx.text(format!(
            "Der Charakter mit der Id {char_id} konnte nicht gefunden werden."
        ));
        let list = ctx.localized("Liste");
        ctx.suggest([list]);
        return Ok(None);
    }

    if let Some((linked_user, linked_char)) = &ctx.user.linked {
        if linked_user == user_id {
            return Ok(Some(*linked_char));
        }
    }

    let characters = ctx.store().user_characters(user_id).await?;
    match characters.as_slice() {
        [] => {
            ctx.text(format!(
                "Der Nutzer @{user_id} hat derzeit noch keine Charaktere angelegt. \
                 Siehe 'Vorlage' um einen Charakter zu erstellen."
            ));
            let template = ctx.example_for("Vorlage", &[("user_id", format!("@{user_id}"))]);
            ctx.suggest([template]);
            Ok(None)
        }
        [only] => Ok(Some(only.char_id)),
        [first, ..] if use_first => Ok(Some(first.char_id)),
        many => {
            let blocks: Vec<String> = many
                .iter()
                .map(|c| format!("*Charakter {}*\n{}", c.char_id, character_names(&c.text)))
                .collect();
            ctx.text_split(
                format!(
                    "Für den Nutzer sind mehrere Charaktere vorhanden. Bitte wähle einen aus:\n\n{}",
                    blocks.join("\n---\n\n")
                ),
                "---",
            );

            let suggestions: Vec<String> = many
                .iter()
                .take(MAX_CHARACTER_CHOICES)
                .map(|c| {
                    ctx.example_with(&[
                        ("user_id", format!("@{user_id}")),
                        (param, c.char_id.to_string()),
                    ])
                })
                .collect();
            ctx.suggest(suggestions);
            Ok(None)
        }
    }
}

/// Lines of a character sheet that look like name entries.
pub fn character_names(text: &str) -> String {
    let re = RegexBuilder::new(r".*?name.*?:.*?\S+?.*")
        .case_insensitive(true)
        .build();
    let names: Vec<&str> = match &re {
        Ok(re) => re.find_iter(text).map(|m| m.as_str().trim()).collect(),
        Err(_) => Vec::new(),
    };

    if names.is_empty() {
        "Im Steckbrief wurden keine Namen gefunden".to_string()
    } else {
        names.join("\n")
    }
}

/// `Befehl @user id` with the user shown only when it is not the sender
/// (or `force_user`) and the id only for non-first characters.
pub fn user_char_text(
    command: &str,
    user_id: &str,
    char_id: i64,
    sender: &str,
    force_user: bool,
) -> String {
    let mut text = command.to_string();
    if force_user || !user_id.eq_ignore_ascii_case(sender) {
        text.push_str(&format!(" @{user_id}"));
    }
    if char_id > 1 {
        text.push_str(&format!(" {char_id}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: &str, last: &str) -> UserProfile {
        UserProfile {
            first_name: first.into(),
            last_name: last.into(),
            profile_pic_url: None,
            profile_pic_last_modified: None,
            timezone: None,
        }
    }

    #[test]
    fn test_user_display_names() {
        let user = BotUser {
            id: "alice".into(),
            profile: Some(profile("Alice", "Stein")),
            ..Default::default()
        };
        assert_eq!(user.first_name(), "Alice");
        assert_eq!(user.name_and_id(), "Alice Stein (@alice)");

        let bare = BotUser {
            id: "bob".into(),
            ..Default::default()
        };
        assert_eq!(bare.first_name(), "@bob");
        assert_eq!(bare.name_and_id(), "@bob");

        let aliased = BotUser {
            id: "x".repeat(ALIASED_ID_LEN),
            profile: Some(profile("Anon", "")),
            ..Default::default()
        };
        assert!(aliased.is_aliased());
        assert_eq!(aliased.id_repr(), "@~anonuser~");
        assert_eq!(aliased.name_and_id(), "Anon");
    }

    #[test]
    fn test_character_names() {
        let text = "Vorname: Mira\nNachname: Stein\nAlter: 20\nSpitzname:";
        assert_eq!(character_names(text), "Vorname: Mira\nNachname: Stein");
        assert_eq!(
            character_names("Alter: 20"),
            "Im Steckbrief wurden keine Namen gefunden"
        );
    }

    #[test]
    fn test_user_char_text() {
        assert_eq!(user_char_text("Anzeigen", "alice", 1, "alice", false), "Anzeigen");
        assert_eq!(
            user_char_text("Anzeigen", "alice", 2, "bob", false),
            "Anzeigen @alice 2"
        );
        assert_eq!(
            user_char_text("Löschen", "alice", 1, "alice", true),
            "Löschen @alice"
        );
    }

    #[tokio::test]
    async fn test_profile_cache_fetches_once() {
        let mut kik = MockKikApi::new();
        kik.expect_get_user()
            .times(1)
            .returning(|_| Ok(profile("Alice", "Stein")));

        let cache = ProfileCache::default();
        let first = cache.get(&kik, "Alice").await;
        let second = cache.get(&kik, "alice").await;
        assert_eq!(first, second);
        assert_eq!(first.unwrap().first_name, "Alice");
    }

    #[tokio::test]
    async fn test_profile_cache_remembers_failures() {
        let mut kik = MockKikApi::new();
        kik.expect_get_user()
            .times(1)
            .returning(|id| Err(KikError::UserNotFound(id.to_string())));

        let cache = ProfileCache::default();
        assert!(cache.get(&kik, "ghost").await.is_none());
        assert!(cache.get(&kik, "ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_failures_expire_before_profiles() {
        let mut kik = MockKikApi::new();
        kik.expect_get_user()
            .withf(|id| id == "ghost")
            .times(2)
            .returning(|id| Err(KikError::UserNotFound(id.to_string())));
        kik.expect_get_user()
            .withf(|id| id == "alice")
            .times(1)
            .returning(|_| Ok(profile("Alice", "")));

        let cache = ProfileCache::default().with_failure_ttl(Duration::ZERO);
        assert!(cache.get(&kik, "ghost").await.is_none());
        assert!(cache.get(&kik, "ghost").await.is_none());
        assert!(cache.get(&kik, "alice").await.is_some());
        assert!(cache.get(&kik, "alice").await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned() {
        let mut kik = MockKikApi::new();
        kik.expect_get_user().returning(|_| Ok(profile("Alice", "")));

        let cache = ProfileCache::new(Duration::ZERO);
        for id in ["a", "b", "c", "d"] {
            cache.get(&kik, id).await;
        }
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_profiles_are_refetched() {
        let mut kik = MockKikApi::new();
        kik.expect_get_user()
            .times(2)
            .returning(|_| Ok(profile("Alice", "")));

        let cache = ProfileCache::new(Duration::ZERO);
        cache.get(&kik, "alice").await;
        cache.get(&kik, "alice").await;
    }
}
