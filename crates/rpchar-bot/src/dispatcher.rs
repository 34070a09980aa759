//! Turns one inbound Kik message into outbound replies.

use crate::engine::{ResponseContext, SharedRegistry};
use crate::error::AppResult;
use crate::handlers;
use crate::services::Services;
use character_store::InteractionStatus;
use kik_client::{InboundMessage, MessageContent, OutboundMessage};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const LEFT_ARROW: &str = "\u{2B05}\u{FE0F}";
pub const RIGHT_ARROW: &str = "\u{27A1}\u{FE0F}";
pub const REDO_ARROW: &str = "\u{1F504}";

/// Per-process command dispatcher.
pub struct Dispatcher {
    services: Arc<Services>,
    registry: SharedRegistry,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> AppResult<Self> {
        let registry = handlers::registry()?;
        Ok(Self {
            services,
            registry: SharedRegistry::new(registry),
        })
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Handle one message; the sender's status is written exactly once.
    #[instrument(skip(self, message), fields(from = %message.from, chat = %message.chat_id))]
    pub async fn process_message(
        &self,
        message: &InboundMessage,
    ) -> AppResult<Vec<OutboundMessage>> {
        if self.services.config.log_requests {
            info!(?message, "Inbound message");
        }

        let store = &self.services.store;
        let user = self.services.sender(message).await?;
        let registry = self.registry.reconcile(&store.static_commands().await?)?;
        let prior_status = store.command_status(&user.id).await?;
        let user_id = user.id.clone();

        let mut ctx = ResponseContext::new(
            Arc::clone(&self.services),
            registry,
            message.clone(),
            user,
            prior_status,
        );

        match &message.content {
            MessageContent::StartChatting => greet(&mut ctx),
            MessageContent::Text { body } => handle_text(&mut ctx, body).await?,
            MessageContent::Picture { pic_url } => handle_picture(&mut ctx, pic_url).await?,
            MessageContent::Unsupported => not_understood(&mut ctx),
        }

        store.set_command_status(&user_id, &ctx.status).await?;
        store.touch_user(&user_id).await?;

        let replies = ctx.into_messages();
        debug!("Replying with {} messages", replies.len());
        Ok(replies)
    }
}

async fn handle_text(ctx: &mut ResponseContext, body: &str) -> AppResult<()> {
    let mut body = strip_mention(body.trim(), ctx.bot_username()).to_string();

    if body.is_empty() {
        welcome(ctx);
        return Ok(());
    }

    if let Some(nav) = ctx.prior_status.navigation() {
        let slot = match body.trim_end_matches('\u{FE0F}') {
            "\u{2B05}" => nav.left.as_ref(),
            "\u{27A1}" => nav.right.as_ref(),
            REDO_ARROW => nav.redo.as_ref(),
            _ => None,
        };

        if let Some(command) = slot {
            debug!("Navigation glyph replaced by {command}");
            body = command.clone();
        } else if let (Some(rest), Some(template)) =
            (body.strip_prefix('@'), nav.add_user_id.as_ref())
        {
            body = template.replace("{}", rest.trim());
        }
    }

    let Some(token) = body.split_whitespace().next().map(str::to_string) else {
        not_understood(ctx);
        return Ok(());
    };

    let command = ctx.registry.resolve(&token);
    ctx.invoked = token;
    ctx.body = body;
    command.run(ctx).await
}

async fn handle_picture(ctx: &mut ResponseContext, pic_url: &str) -> AppResult<()> {
    match ctx.prior_status.clone() {
        InteractionStatus::AwaitingPicture { user_id, char_id } => {
            handlers::characters::receive_picture(ctx, pic_url, &user_id, char_id).await
        }
        _ => {
            let name = ctx.user.first_name();
            let help = ctx.localized("Hilfe");
            ctx.text(format!(
                "Sorry {name}, mit diesem Bild kann ich leider nichts anfangen."
            ));
            ctx.suggest([help]);
            Ok(())
        }
    }
}

/// Drop a leading `@botname` mention.
fn strip_mention<'a>(body: &'a str, bot: &str) -> &'a str {
    let mention = format!("@{bot}");
    match body.get(..mention.len()) {
        Some(head) if head.eq_ignore_ascii_case(&mention) => {
            let rest = &body[mention.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim_start()
            } else {
                body
            }
        }
        _ => body,
    }
}

fn greet(ctx: &mut ResponseContext) {
    let name = ctx.user.first_name();
    let bot = ctx.bot_username().to_string();
    let help = ctx.localized("Hilfe");
    ctx.text(format!(
        "Hi {name}, mit mir kann man auch direkt schreiben. Wenn du möchtest, kannst du hier \
         auch @{bot} vor allen Befehlen weg lassen. Probier es aus: Antworte mir einfach mit \
         '{help}' und du bekommst eine Liste aller Befehle"
    ));
    ctx.suggest([help]);
}

fn welcome(ctx: &mut ResponseContext) {
    let name = ctx.user.first_name();
    let group = ctx.config().kik_group.clone();
    let help = ctx.localized("Hilfe");
    ctx.text(format!(
        "Hi {name}, ich bin der Steckbrief-Bot der Gruppe #{group}\n\
         Für weitere Informationen tippe auf Antwort und dann auf '{help}'."
    ));
    ctx.suggest([help, ctx.localized("Regeln"), ctx.localized("Vorlage")]);
}

fn not_understood(ctx: &mut ResponseContext) {
    let name = ctx.user.first_name();
    let help = ctx.localized("Hilfe");
    ctx.text(format!("Sorry {name}, ich habe dich nicht verstanden."));
    ctx.suggest([help]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::users::MockKikApi;
    use character_store::{Navigation, Store};
    use kik_client::KikError;

    async fn dispatcher(admins: &str) -> Dispatcher {
        let mut kik = MockKikApi::new();
        kik.expect_get_user()
            .returning(|id| Err(KikError::UserNotFound(id.to_string())));

        let config = Config {
            bot_username: "steckbot".into(),
            admins: admins.into(),
            ..Config::default()
        };
        let store = Store::in_memory().await.unwrap();
        let services = Services::new(Arc::new(config), store, Arc::new(kik));
        Dispatcher::new(Arc::new(services)).unwrap()
    }

    fn body(reply: &OutboundMessage) -> &str {
        reply.body().unwrap_or_default()
    }

    #[test]
    fn test_strip_mention() {
        assert_eq!(strip_mention("@SteckBot liste 2", "steckbot"), "liste 2");
        assert_eq!(strip_mention("@steckbot", "steckbot"), "");
        assert_eq!(strip_mention("@steckbotter liste", "steckbot"), "@steckbotter liste");
        assert_eq!(strip_mention("liste", "steckbot"), "liste");
    }

    #[tokio::test]
    async fn test_start_chatting_greets() {
        let dispatcher = dispatcher("admin1").await;
        let mut message = InboundMessage::text("alice", "chat1", "");
        message.content = MessageContent::StartChatting;

        let replies = dispatcher.process_message(&message).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(body(&replies[0]).starts_with("Hi @alice, mit mir kann man auch direkt schreiben."));
        assert_eq!(replies[0].suggested_responses(), vec!["Hilfe"]);
    }

    #[tokio::test]
    async fn test_empty_body_welcomes() {
        let dispatcher = dispatcher("admin1").await;
        let message = InboundMessage::text("alice", "chat1", "@steckbot");

        let replies = dispatcher.process_message(&message).await.unwrap();
        assert!(body(&replies[0]).contains("ich bin der Steckbrief-Bot der Gruppe #somegroup"));
        assert_eq!(
            replies[0].suggested_responses(),
            vec!["Hilfe", "Regeln", "Vorlage"]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_uses_fallback() {
        let dispatcher = dispatcher("admin1").await;
        let message = InboundMessage::text("alice", "chat1", "quatsch mit soße");

        let replies = dispatcher.process_message(&message).await.unwrap();
        assert_eq!(
            body(&replies[0]),
            "Sorry @alice, den Befehl 'quatsch' kenne ich nicht."
        );
    }

    #[tokio::test]
    async fn test_picture_without_request_is_rejected() {
        let dispatcher = dispatcher("admin1").await;
        let message = InboundMessage::picture("alice", "chat1", "https://img.example/1.jpg");

        let replies = dispatcher.process_message(&message).await.unwrap();
        assert!(body(&replies[0]).contains("mit diesem Bild kann ich leider nichts anfangen"));
    }

    #[tokio::test]
    async fn test_status_is_replaced_after_each_event() {
        let dispatcher = dispatcher("admin1").await;
        let store = dispatcher.services().store.clone();
        store
            .set_command_status(
                "alice",
                &InteractionStatus::DynNavigation(Navigation {
                    redo: Some("Münze".into()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let message = InboundMessage::text("alice", "chat1", REDO_ARROW);
        let replies = dispatcher.process_message(&message).await.unwrap();
        assert!(body(&replies[0]).starts_with("Die Münze zeigt: "));
        assert_eq!(replies[0].suggested_responses(), vec![REDO_ARROW, "Hilfe"]);
        assert_eq!(
            store.command_status("alice").await.unwrap(),
            InteractionStatus::DynNavigation(Navigation {
                redo: Some("Münze".into()),
                ..Default::default()
            })
        );

        let message = InboundMessage::text("alice", "chat1", "Wer-bin-ich");
        dispatcher.process_message(&message).await.unwrap();
        assert_eq!(
            store.command_status("alice").await.unwrap(),
            InteractionStatus::None
        );
    }

    #[tokio::test]
    async fn test_add_user_id_template() {
        let dispatcher = dispatcher("admin1").await;
        let store = dispatcher.services().store.clone();
        store.add_character("bob", "bob", "Vorname: Bo").await.unwrap();
        store
            .set_command_status(
                "alice",
                &InteractionStatus::DynNavigation(Navigation {
                    add_user_id: Some("Anzeigen @{}".into()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let message = InboundMessage::text("alice", "chat1", "@Bob");
        let replies = dispatcher.process_message(&message).await.unwrap();
        assert!(body(&replies[0]).starts_with("Vorname: Bo"));
    }

    #[tokio::test]
    async fn test_add_user_id_template_keeps_whole_reply() {
        let dispatcher = dispatcher("admin1").await;
        let store = dispatcher.services().store.clone();
        store.add_character("bob", "bob", "Vorname: Bo").await.unwrap();
        store.add_character("bob", "bob", "Vorname: Ben").await.unwrap();
        store
            .set_command_status(
                "alice",
                &InteractionStatus::DynNavigation(Navigation {
                    add_user_id: Some("Anzeigen @{}".into()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let message = InboundMessage::text("alice", "chat1", "@bob 2 ");
        let replies = dispatcher.process_message(&message).await.unwrap();
        assert!(body(&replies[0]).starts_with("Vorname: Ben"));
    }
}
