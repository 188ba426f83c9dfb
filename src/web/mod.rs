// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! GitHub webhook server that triggers automated PR reviews

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::review::{is_copilot_authored, ReviewPipeline, FAILURE_COMMENT};
use crate::{AsmfError, Result};

const HANDLED_ACTIONS: [&str; 3] = ["ready_for_review", "opened", "synchronize"];

/// Shared application state
pub struct WebhookState {
    pub webhook_secret: Option<String>,
    pub ollama_url: String,
    pub model: String,
    pub github_token_configured: bool,
    pub pipeline: Arc<dyn ReviewPipeline>,
}

impl WebhookState {
    pub fn from_config(config: &AppConfig, pipeline: Arc<dyn ReviewPipeline>) -> Self {
        Self {
            webhook_secret: config.webhook.webhook_secret.clone().filter(|s| !s.is_empty()),
            ollama_url: config.llm.ollama.url.clone(),
            model: config.review.model.clone(),
            github_token_configured: config.webhook.github_token.is_some(),
            pipeline,
        }
    }
}

type JsonResponse = (StatusCode, Json<Value>);

/// Create the webhook router
pub fn create_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Check `X-Hub-Signature-256` against an HMAC-SHA256 of the raw body.
///
/// Without a configured secret every request passes.
pub fn verify_signature(secret: Option<&str>, body: &[u8], header: Option<&str>) -> bool {
    let Some(secret) = secret else {
        warn!("GITHUB_WEBHOOK_SECRET not set - skipping signature verification");
        return true;
    };
    let Some(header) = header else {
        error!("No signature header provided");
        return false;
    };
    let Some((algorithm, signature)) = header.split_once('=') else {
        error!("Malformed signature header");
        return false;
    };
    if algorithm != "sha256" {
        error!("Unsupported hash algorithm: {}", algorithm);
        return false;
    }
    let Ok(expected) = hex::decode(signature) else {
        error!("Signature is not hex encoded");
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    if mac.verify_slice(&expected).is_err() {
        error!("Signature verification failed");
        return false;
    }
    true
}

/// `sha256=<hex>` signature GitHub would send for `body`
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AsmfError::Config(format!("Invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

fn reply(status: StatusCode, body: Value) -> JsonResponse {
    (status, Json(body))
}

async fn webhook(State(state): State<Arc<WebhookState>>, headers: HeaderMap, body: Bytes) -> JsonResponse {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if !verify_signature(state.webhook_secret.as_deref(), &body, header("X-Hub-Signature-256")) {
        error!("Webhook signature verification failed");
        return reply(StatusCode::FORBIDDEN, json!({"error": "Invalid signature"}));
    }

    let event = header("X-GitHub-Event").unwrap_or("");
    info!("Received webhook event: {}", event);
    if event != "pull_request" {
        return reply(StatusCode::OK, json!({"message": "Event type not handled"}));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Invalid webhook payload: {}", e);
            return reply(StatusCode::BAD_REQUEST, json!({"error": "Invalid JSON payload"}));
        }
    };

    let action = payload.get("action").and_then(Value::as_str).unwrap_or("");
    let pr = payload.get("pull_request").cloned().unwrap_or(Value::Null);
    let repo = payload.pointer("/repository/full_name").and_then(Value::as_str);
    let pr_number = pr.get("number").and_then(Value::as_u64);
    let is_draft = pr.get("draft").and_then(Value::as_bool).unwrap_or(false);

    info!(
        "PR event - Action: {}, Repo: {}, PR: #{}, Draft: {}",
        action,
        repo.unwrap_or("?"),
        pr_number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
        is_draft
    );

    if !HANDLED_ACTIONS.contains(&action) {
        info!("Ignoring action: {}", action);
        return reply(StatusCode::OK, json!({"message": format!("Action {} not handled", action)}));
    }
    if is_draft {
        info!("Skipping draft PR");
        return reply(StatusCode::OK, json!({"message": "Draft PR - skipping review"}));
    }
    let (Some(repo), Some(pr_number)) = (repo, pr_number) else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "Payload is missing repository or pull request number"}),
        );
    };

    info!("Copilot-authored: {}", is_copilot_authored(&pr));
    info!("Triggering Ollama review for PR #{}", pr_number);

    let review = match state.pipeline.review(repo, pr_number).await {
        Ok(review) => review,
        Err(e) => {
            error!("Review of {}#{} failed: {}", repo, pr_number, e);
            if let Err(e) = state.pipeline.post_comment(repo, pr_number, FAILURE_COMMENT).await {
                error!("Failed to post failure comment: {}", e);
            }
            return reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Review failed"}));
        }
    };

    match state.pipeline.post_comment(repo, pr_number, &review).await {
        Ok(()) => reply(
            StatusCode::OK,
            json!({"message": "Review completed and posted", "pr_number": pr_number}),
        ),
        Err(e) => {
            error!("Failed to post comment: {}", e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Failed to post review comment"}))
        }
    }
}

async fn health(State(state): State<Arc<WebhookState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "ollama_url": state.ollama_url,
        "model": state.model,
        "github_token_configured": state.github_token_configured,
        "webhook_secret_configured": state.webhook_secret.is_some(),
    }))
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Ollama PR Review Webhook Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {"webhook": "/webhook", "health": "/health"},
    }))
}

/// Bind and serve until the process is stopped
pub async fn start_server(config: &AppConfig, pipeline: Arc<dyn ReviewPipeline>) -> Result<()> {
    let state = Arc::new(WebhookState::from_config(config, pipeline));

    let addr = format!("{}:{}", config.webhook.host, config.webhook.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Webhook server listening on http://{}", addr);
    info!("Ollama URL: {}", state.ollama_url);
    info!("Ollama Model: {}", state.model);

    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| AsmfError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
