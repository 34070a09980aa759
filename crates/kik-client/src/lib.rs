//! Kik bot API client.

mod client;
mod error;
mod signature;
mod types;

pub use client::{KikClient, DEFAULT_API_URL};
pub use error::KikError;
pub use signature::{sign, verify_signature, SIGNATURE_HEADER};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_test_client(mock_server: &MockServer) -> KikClient {
        KikClient::new(mock_server.uri(), "rpchar", "secret-key").unwrap()
    }

    #[tokio::test]
    async fn test_get_user() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/user/alice"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "firstName": "Alice",
                "lastName": "Liddell",
                "profilePicUrl": "http://example.com/alice.jpg",
                "profilePicLastModified": 1458657367
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let profile = client.get_user("alice").await.unwrap();

        assert_eq!(profile.first_name, "Alice");
        assert_eq!(profile.full_name(), "Alice Liddell");
        assert!(profile.timezone.is_none());
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/user/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let result = client.get_user("ghost").await;

        assert!(matches!(result, Err(KikError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_send_messages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/message"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let original = InboundMessage::text("alice", "chat-1", "Hilfe");
        let reply = OutboundMessage::text_reply(&original, "Hallo!");

        assert!(client.send_messages(&[reply]).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_messages_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/message"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad keyboard"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let original = InboundMessage::text("alice", "chat-1", "Hilfe");
        let reply = OutboundMessage::text_reply(&original, "Hallo!");

        let result = client.send_messages(&[reply]).await;
        assert!(matches!(result, Err(KikError::SendFailed(msg)) if msg == "bad keyboard"));
    }

    #[tokio::test]
    async fn test_send_empty_batch_skips_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/message"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        assert!(client.send_messages(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_configuration() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        assert!(client
            .set_configuration("https://bot.example.com/incoming")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_download() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pic/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server).await;
        let download = client
            .download(&format!("{}/pic/1", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(download.bytes, vec![1, 2, 3]);
        assert_eq!(download.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_parse_inbound_batch() {
        let json = serde_json::json!({
            "messages": [
                {
                    "type": "text",
                    "from": "alice",
                    "chatId": "chat-1",
                    "body": "Liste 2",
                    "participants": ["alice"],
                    "chatType": "direct",
                    "id": "m1",
                    "timestamp": 1439576628405i64
                },
                {
                    "type": "picture",
                    "from": "bob",
                    "chatId": "chat-2",
                    "picUrl": "http://example.com/p.jpg"
                },
                { "type": "start-chatting", "from": "carol", "chatId": "chat-3" },
                { "type": "is-typing", "from": "carol", "chatId": "chat-3", "isTyping": true }
            ]
        });

        let batch: IncomingBatch = serde_json::from_value(json).unwrap();
        assert_eq!(batch.messages.len(), 4);
        assert_eq!(batch.messages[0].body(), Some("Liste 2"));
        assert_eq!(
            batch.messages[1].content,
            MessageContent::Picture {
                pic_url: "http://example.com/p.jpg".into()
            }
        );
        assert_eq!(batch.messages[2].content, MessageContent::StartChatting);
        assert_eq!(batch.messages[3].content, MessageContent::Unsupported);
    }

    #[test]
    fn test_outbound_serialization() {
        let original = InboundMessage::text("alice", "chat-1", "Liste");
        let mut reply = OutboundMessage::text_reply(&original, "Seite 1");
        reply.set_suggestions(["Liste 2", "Hilfe"]);

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["chatId"], "chat-1");
        assert_eq!(value["keyboards"][0]["type"], "suggested");
        assert_eq!(value["keyboards"][0]["responses"][1]["body"], "Hilfe");
        assert_eq!(reply.suggested_responses(), vec!["Liste 2", "Hilfe"]);

        let picture = OutboundMessage::picture_reply(&original, "http://host/picture/a.jpg");
        let value = serde_json::to_value(&picture).unwrap();
        assert_eq!(value["type"], "picture");
        assert!(value.get("keyboards").is_none());
    }

    #[test]
    fn test_aliased_sender() {
        let aliased = "a".repeat(ALIASED_ID_LEN);
        assert!(InboundMessage::text(&aliased, "c", "x").is_aliased());
        assert!(!InboundMessage::text("alice", "c", "x").is_aliased());
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"messages":[]}"#;
        let signature = sign("secret", body);

        assert!(verify_signature("secret", body, Some(&signature)));
        assert!(verify_signature(
            "secret",
            body,
            Some(&signature.to_lowercase())
        ));
        assert!(!verify_signature("other", body, Some(&signature)));
        assert!(!verify_signature("secret", b"tampered", Some(&signature)));
        assert!(!verify_signature("secret", body, None));
        assert!(!verify_signature("secret", body, Some("not-hex")));
    }
}
