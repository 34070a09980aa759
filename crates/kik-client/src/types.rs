//! Kik bot API types.

use serde::{Deserialize, Serialize};

/// Length of the opaque ids Kik hands out for users who hide their username.
pub const ALIASED_ID_LEN: usize = 52;

/// Webhook payload posted to `/incoming`.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingBatch {
    pub messages: Vec<InboundMessage>,
}

/// A single inbound message.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub from: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(rename = "chatType", default)]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub content: MessageContent,
}

/// Payload of an inbound message, keyed by the `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageContent {
    Text {
        #[serde(default)]
        body: String,
    },
    Picture {
        #[serde(rename = "picUrl")]
        pic_url: String,
    },
    StartChatting,
    #[serde(other)]
    Unsupported,
}

impl InboundMessage {
    /// Text message from `from` in `chat_id`.
    pub fn text(from: &str, chat_id: &str, body: &str) -> Self {
        Self {
            id: None,
            from: from.to_string(),
            chat_id: chat_id.to_string(),
            participants: vec![from.to_string()],
            chat_type: Some("direct".to_string()),
            timestamp: None,
            content: MessageContent::Text {
                body: body.to_string(),
            },
        }
    }

    /// Picture message from `from` in `chat_id`.
    pub fn picture(from: &str, chat_id: &str, pic_url: &str) -> Self {
        Self {
            content: MessageContent::Picture {
                pic_url: pic_url.to_string(),
            },
            ..Self::text(from, chat_id, "")
        }
    }

    /// The body of a text message.
    pub fn body(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { body } => Some(body),
            _ => None,
        }
    }

    /// Whether the sender is hidden behind an aliased id.
    pub fn is_aliased(&self) -> bool {
        self.from.len() == ALIASED_ID_LEN
    }

    /// Whether the message was posted in a public group.
    pub fn is_public(&self) -> bool {
        self.chat_type.as_deref() == Some("public")
    }
}

/// A suggested-response keyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyboard {
    #[serde(rename = "type")]
    pub kind: String,
    pub responses: Vec<TextResponse>,
}

impl Keyboard {
    pub fn suggested<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: "suggested".to_string(),
            responses: bodies.into_iter().map(TextResponse::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub body: String,
}

impl TextResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            body: body.into(),
        }
    }
}

/// Outbound message sent through `/v1/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    Text {
        to: String,
        #[serde(rename = "chatId")]
        chat_id: String,
        body: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        keyboards: Vec<Keyboard>,
    },
    Picture {
        to: String,
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "picUrl")]
        pic_url: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        keyboards: Vec<Keyboard>,
    },
}

impl OutboundMessage {
    /// Text reply to the sender of `original`.
    pub fn text_reply(original: &InboundMessage, body: impl Into<String>) -> Self {
        OutboundMessage::Text {
            to: original.from.clone(),
            chat_id: original.chat_id.clone(),
            body: body.into(),
            keyboards: Vec::new(),
        }
    }

    /// Picture reply to the sender of `original`.
    pub fn picture_reply(original: &InboundMessage, pic_url: impl Into<String>) -> Self {
        OutboundMessage::Picture {
            to: original.from.clone(),
            chat_id: original.chat_id.clone(),
            pic_url: pic_url.into(),
            keyboards: Vec::new(),
        }
    }

    pub fn to(&self) -> &str {
        match self {
            OutboundMessage::Text { to, .. } | OutboundMessage::Picture { to, .. } => to,
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            OutboundMessage::Text { chat_id, .. } | OutboundMessage::Picture { chat_id, .. } => {
                chat_id
            }
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            OutboundMessage::Text { body, .. } => Some(body),
            OutboundMessage::Picture { .. } => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutboundMessage::Text { .. })
    }

    /// Replace the keyboards with a single suggested keyboard.
    pub fn set_suggestions<I, S>(&mut self, bodies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keyboard = Keyboard::suggested(bodies);
        match self {
            OutboundMessage::Text { keyboards, .. } | OutboundMessage::Picture { keyboards, .. } => {
                *keyboards = vec![keyboard];
            }
        }
    }

    /// Bodies of all suggested responses attached to this message.
    pub fn suggested_responses(&self) -> Vec<&str> {
        let keyboards = match self {
            OutboundMessage::Text { keyboards, .. } | OutboundMessage::Picture { keyboards, .. } => {
                keyboards
            }
        };
        keyboards
            .iter()
            .flat_map(|k| k.responses.iter().map(|r| r.body.as_str()))
            .collect()
    }
}

/// Request body for `/v1/message`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessagesRequest<'a> {
    pub messages: &'a [OutboundMessage],
}

/// Public profile returned by `/v1/user/{username}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(rename = "profilePicUrl", default)]
    pub profile_pic_url: Option<String>,
    #[serde(rename = "profilePicLastModified", default)]
    pub profile_pic_last_modified: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Bot configuration posted to `/v1/config`.
#[derive(Debug, Clone, Serialize)]
pub struct BotConfiguration {
    pub webhook: String,
    pub features: BotFeatures,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BotFeatures {
    #[serde(rename = "manuallySendReadReceipts")]
    pub manually_send_read_receipts: bool,
    #[serde(rename = "receiveReadReceipts")]
    pub receive_read_receipts: bool,
    #[serde(rename = "receiveDeliveryReceipts")]
    pub receive_delivery_receipts: bool,
    #[serde(rename = "receiveIsTyping")]
    pub receive_is_typing: bool,
}

/// Downloaded file content.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}
