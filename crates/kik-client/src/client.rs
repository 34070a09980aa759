//! Kik HTTP client.

use crate::error::KikError;
use crate::types::*;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

pub const DEFAULT_API_URL: &str = "https://api.kik.com";

/// Kik bot REST API client.
#[derive(Clone)]
pub struct KikClient {
    client: Client,
    base_url: String,
    username: String,
    api_key: String,
}

impl KikClient {
    /// Create a new Kik client authenticating as `username`.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, KikError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            api_key: api_key.into(),
        })
    }

    /// Bot username used for authentication.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Register the webhook URL with Kik.
    #[instrument(skip(self))]
    pub async fn set_configuration(&self, webhook: &str) -> Result<(), KikError> {
        let request = BotConfiguration {
            webhook: webhook.to_string(),
            features: BotFeatures::default(),
        };

        let response = self
            .client
            .post(format!("{}/v1/config", self.base_url))
            .basic_auth(&self.username, Some(&self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(KikError::Api { status, message });
        }

        debug!("Webhook configured: {}", webhook);
        Ok(())
    }

    /// Fetch the public profile of a user.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<UserProfile, KikError> {
        let response = self
            .client
            .get(format!("{}/v1/user/{}", self.base_url, encode(user_id)))
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(KikError::UserNotFound(user_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(KikError::Api { status, message });
        }

        Ok(response.json().await?)
    }

    /// Send a batch of messages.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub async fn send_messages(&self, messages: &[OutboundMessage]) -> Result<(), KikError> {
        if messages.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{}/v1/message", self.base_url))
            .basic_auth(&self.username, Some(&self.api_key))
            .json(&SendMessagesRequest { messages })
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Send failed: {}", msg);
            return Err(KikError::SendFailed(msg));
        }

        debug!("Sent {} messages", messages.len());
        Ok(())
    }

    /// Download a file, typically a picture an inbound message points at.
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<Download, KikError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(KikError::DownloadFailed(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().await?.to_vec();

        Ok(Download {
            bytes,
            content_type,
        })
    }
}
