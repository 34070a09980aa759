//! Webhook server: Kik posts to `/incoming`, uploaded pictures are served
//! from `/picture`.

mod handlers;
mod middleware;

pub use handlers::*;
pub use middleware::{access_log, throttle_webhook, WebhookThrottle, KIK_USERNAME_HEADER};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Webhook bodies kept for `/debug`.
pub const REQUEST_LOG_CAPACITY: usize = 50;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Turns inbound messages into replies
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<Config>,
    /// Most recent webhook bodies, newest last
    pub request_log: Arc<Mutex<VecDeque<serde_json::Value>>>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let config = Arc::clone(&dispatcher.services().config);
        Self {
            dispatcher,
            config,
            request_log: Arc::new(Mutex::new(VecDeque::with_capacity(REQUEST_LOG_CAPACITY))),
        }
    }

    /// Remember a webhook body, dropping the oldest beyond capacity.
    pub async fn log_request(&self, body: serde_json::Value) {
        let mut log = self.request_log.lock().await;
        if log.len() >= REQUEST_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(body);
    }
}

/// Create the router with the configured rate limit.
pub fn create_router(state: AppState) -> Router {
    let throttle = WebhookThrottle::per_minute(state.config.rate_limit_per_minute);
    create_router_with_throttle(state, throttle)
}

/// Create the router with a custom throttle on `/incoming`.
pub fn create_router_with_throttle(state: AppState, throttle: WebhookThrottle) -> Router {
    let pictures = ServeDir::new(state.config.picture_dir());

    Router::new()
        .route("/incoming", post(handlers::incoming))
        .route_layer(axum_middleware::from_fn_with_state(
            throttle,
            throttle_webhook,
        ))
        .route("/health", get(handlers::health))
        .route("/debug", get(handlers::debug_requests))
        .nest_service("/picture", pictures)
        .layer(axum_middleware::from_fn(access_log))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
