//! Axum route handlers for the chat gateway.
//!
//! The chat transport posts each incoming message to `POST /message` and
//! relays the returned `reply` to the user.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use spigot::{ChainClient, RequesterIdentity};

use crate::commands::CommandHandler;
use crate::error::GatewayError;

/// An incoming chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Sender's stable chat identity. Claims without one are refused.
    #[serde(default)]
    pub identity: Option<RequesterIdentity>,
    /// Sender's display name, used in greetings.
    #[serde(default)]
    pub name: Option<String>,
    /// Raw message text.
    pub text: String,
}

/// Reply to relay to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Plain-text reply.
    pub reply: String,
    /// Claim outcome label, or `"command"`.
    pub outcome: String,
}

/// `POST /message` - Answers one chat message.
///
/// # Errors
///
/// Returns 4xx on a malformed body or empty text.
pub async fn post_message<C: ChainClient>(
    State(handler): State<CommandHandler<C>>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, GatewayError> {
    let Json(message) = body?;
    if message.text.trim().is_empty() {
        return Err(GatewayError::EmptyText);
    }
    let reply = handler
        .handle(message.identity, message.name.as_deref(), &message.text)
        .await;
    Ok(Json(MessageResponse {
        reply: reply.text,
        outcome: reply.outcome.to_owned(),
    }))
}

/// `GET /health` - Liveness and in-flight disbursement count.
pub async fn get_health<C: ChainClient>(
    State(handler): State<CommandHandler<C>>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "inFlight": handler.router().in_flight(),
    }))
}

/// Creates an Axum [`axum::Router`] with all gateway endpoints.
///
/// Endpoints:
/// - `POST /message` - answer a chat message
/// - `GET /health` - liveness
pub fn gateway_router<C: ChainClient>(handler: CommandHandler<C>) -> axum::Router {
    axum::Router::new()
        .route("/message", axum::routing::post(post_message::<C>))
        .route("/health", axum::routing::get(get_health::<C>))
        .with_state(handler)
}
