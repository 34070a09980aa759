//! Shared collaborators handed to every event.

use crate::config::Config;
use crate::error::AppResult;
use crate::users::{BotUser, KikApi, ProfileCache};
use character_store::{Store, UserRecord};
use kik_client::{InboundMessage, UserProfile};
use std::sync::Arc;

pub struct Services {
    pub config: Arc<Config>,
    pub store: Store,
    pub kik: Arc<dyn KikApi>,
    pub profiles: ProfileCache,
}

impl Services {
    pub fn new(config: Arc<Config>, store: Store, kik: Arc<dyn KikApi>) -> Self {
        Self {
            config,
            store,
            kik,
            profiles: ProfileCache::default(),
        }
    }

    pub async fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.get(self.kik.as_ref(), user_id).await
    }

    /// The sender of `message`, created on first contact.
    ///
    /// Admin rights are never granted in public chats.
    pub async fn sender(&self, message: &InboundMessage) -> AppResult<BotUser> {
        let id = normalize_id(&message.from);
        let record = self.store.get_or_create_user(&id).await?;
        let mut user = self.bot_user(&id, Some(record)).await;
        if message.is_public() {
            user.is_admin = false;
        }
        Ok(user)
    }

    /// Any user, without creating a record.
    pub async fn user(&self, user_id: &str) -> AppResult<BotUser> {
        let id = normalize_id(user_id);
        let record = self.store.get_user(&id).await?;
        Ok(self.bot_user(&id, record).await)
    }

    async fn bot_user(&self, user_id: &str, record: Option<UserRecord>) -> BotUser {
        let id = user_id.to_string();
        let profile = self.profile(&id).await;
        let now = chrono::Utc::now().timestamp();

        let (db_admin, is_authed, linked) = match &record {
            Some(r) => (
                r.is_admin,
                r.is_authed(now),
                r.linked_character().map(|(u, c)| (u.to_string(), c)),
            ),
            None => (false, false, None),
        };

        BotUser {
            is_admin: self.config.is_admin_id(&id) || db_admin,
            id,
            profile,
            is_authed,
            linked,
        }
    }
}

/// Kik user ids are case-insensitive and often typed with a leading `@`.
pub fn normalize_id(user_id: &str) -> String {
    user_id.trim().trim_start_matches('@').to_lowercase()
}
