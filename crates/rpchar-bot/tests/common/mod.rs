//! Shared setup for integration tests: a bot backed by an in-memory store and
//! a mocked Kik API.

#![allow(dead_code)]

use character_store::Store;
use kik_client::{InboundMessage, KikClient, OutboundMessage};
use rpchar_bot::server::{create_router_with_throttle, AppState, WebhookThrottle};
use rpchar_bot::{Config, Dispatcher, Services};
use secrecy::SecretString;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BOT: &str = "steckbot";
pub const SECRET: &str = "test-secret";
pub const ADMIN: &str = "admin1";

pub struct TestBot {
    pub kik: MockServer,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Store,
    pub pictures: TempDir,
}

impl TestBot {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let kik = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/user/.+$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&kik)
            .await;
        Mock::given(method("GET"))
            .and(path("/pics/portrait"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&kik)
            .await;

        let pictures = TempDir::new().unwrap();
        let mut config = Config {
            bot_username: BOT.into(),
            bot_auth_code: SecretString::new(SECRET.into()),
            admins: ADMIN.into(),
            kik_group: "rpgruppe".into(),
            kik_group_chat_id: "groupchat".into(),
            picture_path: pictures.path().to_string_lossy().into_owned(),
            kik_api_url: kik.uri(),
            ..Config::default()
        };
        adjust(&mut config);

        let client = KikClient::new(kik.uri(), BOT, SECRET).unwrap();
        let store = Store::in_memory().await.unwrap();
        let services = Services::new(Arc::new(config), store.clone(), Arc::new(client));
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(services)).unwrap());

        Self {
            kik,
            dispatcher,
            store,
            pictures,
        }
    }

    /// Text message from `from` in a direct chat.
    pub async fn send(&self, from: &str, body: &str) -> Vec<OutboundMessage> {
        let message = InboundMessage::text(from, &format!("chat-{from}"), body);
        self.dispatcher.process_message(&message).await.unwrap()
    }

    pub async fn send_picture(&self, from: &str) -> Vec<OutboundMessage> {
        let url = format!("{}/pics/portrait", self.kik.uri());
        let message = InboundMessage::picture(from, &format!("chat-{from}"), &url);
        self.dispatcher.process_message(&message).await.unwrap()
    }

    pub fn router(&self) -> axum::Router {
        create_router_with_throttle(
            AppState::new(Arc::clone(&self.dispatcher)),
            WebhookThrottle::permissive(),
        )
    }
}

pub fn bodies(replies: &[OutboundMessage]) -> Vec<&str> {
    replies.iter().filter_map(OutboundMessage::body).collect()
}

/// Only the last text message may carry suggestions.
pub fn assert_keyboard_on_last_text(replies: &[OutboundMessage]) {
    let last_text = replies.iter().rposition(OutboundMessage::is_text);
    for (i, reply) in replies.iter().enumerate() {
        if Some(i) != last_text {
            assert!(
                reply.suggested_responses().is_empty(),
                "message {i} carries a keyboard: {reply:?}"
            );
        }
    }
}
