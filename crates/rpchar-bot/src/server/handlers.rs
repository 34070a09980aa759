//! HTTP request handlers.

use super::AppState;
use crate::error::{correlation_id, WebhookError};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kik_client::{verify_signature, IncomingBatch, OutboundMessage, SIGNATURE_HEADER};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Recent webhook bodies, only while request logging is on.
pub async fn debug_requests(State(state): State<AppState>) -> Response {
    if !state.config.log_requests {
        return StatusCode::NOT_FOUND.into_response();
    }
    let log = state.request_log.lock().await;
    Json(log.iter().cloned().collect::<Vec<_>>()).into_response()
}

/// Apology sent instead of the replies to a message that failed.
pub fn apology(correlation_id: &str) -> String {
    format!(
        "Sorry, da ist etwas schief gelaufen. Bitte versuche es später erneut. \
         (Fehler-Id: {correlation_id})"
    )
}

/// Webhook endpoint: verifies, dispatches every message in order and sends
/// all replies in one batch.
pub async fn incoming(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if !verify_signature(state.config.bot_auth_code.expose_secret(), &body, signature) {
        warn!("Rejected webhook with invalid signature");
        return Err(WebhookError::InvalidSignature);
    }

    if state.config.log_requests {
        let raw: serde_json::Value = serde_json::from_slice(&body)?;
        info!(body = %raw, "Webhook request");
        state.log_request(raw).await;
    }
    let batch: IncomingBatch = serde_json::from_slice(&body)?;
    debug!("Webhook carries {} messages", batch.messages.len());

    let mut replies = Vec::new();
    for message in &batch.messages {
        match state.dispatcher.process_message(message).await {
            Ok(mut out) => replies.append(&mut out),
            Err(e) => {
                let id = correlation_id(chrono::Utc::now().timestamp(), &message.from);
                error!(correlation_id = %id, from = %message.from, "Handling message failed: {e}");
                replies.push(OutboundMessage::text_reply(message, apology(&id)));
            }
        }
    }

    let kik = &state.dispatcher.services().kik;
    if let Err(e) = kik.send_messages(&replies).await {
        let now = chrono::Utc::now().timestamp();
        let mut seen = BTreeSet::new();
        let apologies: Vec<OutboundMessage> = replies
            .iter()
            .filter(|m| seen.insert((m.to().to_string(), m.chat_id().to_string())))
            .map(|m| {
                let id = correlation_id(now, m.to());
                error!(correlation_id = %id, to = %m.to(), "Sending replies failed: {e}");
                OutboundMessage::Text {
                    to: m.to().to_string(),
                    chat_id: m.chat_id().to_string(),
                    body: apology(&id),
                    keyboards: Vec::new(),
                }
            })
            .collect();

        if let Err(e) = kik.send_messages(&apologies).await {
            error!("Sending apologies failed: {e}");
        }
    }

    Ok(StatusCode::OK)
}
