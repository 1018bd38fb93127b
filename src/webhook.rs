//! HTTP front end: Telegram pushes updates to `/telegram` instead of the bot
//! polling for them.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::bot::ReadyBot;
use crate::dispatcher::Dispatcher;
use crate::platform::{update_id, Transport, Update};

// ── Shared state ───────────────────────────────────────────────────────────────

#[derive(Clone)]
struct WebhookState {
    dispatcher: Arc<Dispatcher>,
    transport: Arc<dyn Transport>,
    token: String,
    debug: bool,
    webhook_url: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

// ── Middleware ─────────────────────────────────────────────────────────────────

/// Requests must carry the bot token unless running in debug mode.
async fn validate_token(
    State(state): State<WebhookState>,
    Query(query): Query<TokenQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !state.debug && query.token.as_deref() != Some(state.token.as_str()) {
        error!(
            "Got a {} request from outside telegram",
            request.method()
        );
        return ":)".into_response();
    }

    next.run(request).await
}

// ── Handlers ───────────────────────────────────────────────────────────────────

async fn describe(State(state): State<WebhookState>) -> Result<String, StatusCode> {
    let me = state.transport.get_me().await.map_err(internal)?;
    let info = state.transport.get_webhook_info().await.map_err(internal)?;

    Ok(format!(
        "Hello! My name is {} and my webhook info is {:?}",
        me.user.username.as_deref().unwrap_or(&me.user.first_name),
        info
    ))
}

async fn receive(
    State(state): State<WebhookState>,
    Json(update): Json<Update>,
) -> Result<&'static str, StatusCode> {
    info!("Webhook update {}", update_id(&update));
    state
        .dispatcher
        .process_update(update)
        .await
        .map_err(internal)?;
    Ok("ok")
}

async fn reset(State(state): State<WebhookState>) -> Result<String, StatusCode> {
    let deleted = state.transport.delete_webhook().await.map_err(internal)?;
    let set = state
        .transport
        .set_webhook(&state.webhook_url)
        .await
        .map_err(internal)?;

    info!("Webhook reset (deleted: {}, set: {})", deleted, set);
    Ok(format!("reset. response is {}, {}", deleted, set))
}

fn internal(e: impl std::fmt::Display) -> StatusCode {
    error!("Webhook request failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

// ── Entry points ───────────────────────────────────────────────────────────────

pub fn router(bot: &ReadyBot) -> Router {
    let config = bot.config();
    let state = WebhookState {
        dispatcher: bot.dispatcher(),
        transport: bot.transport(),
        token: config.telegram.bot_token.clone(),
        debug: config.webhook.debug,
        webhook_url: config.webhook_url(),
    };

    Router::new()
        .route("/telegram", get(describe).post(receive).put(reset))
        .layer(middleware::from_fn_with_state(state.clone(), validate_token))
        .with_state(state)
}

/// Serve the webhook on the configured address until `shutdown` resolves.
pub async fn serve(
    bot: &ReadyBot,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = bot.config().webhook.listen.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Webhook listening on http://{}/telegram", addr);

    axum::serve(listener, router(bot))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
