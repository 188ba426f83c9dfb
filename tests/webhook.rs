// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use asmf::review::{ReviewPipeline, FAILURE_COMMENT};
use asmf::web::{create_router, sign, WebhookState};
use asmf::{AsmfError, Result};

const SECRET: &str = "webhook-secret";

#[derive(Default)]
struct RecordingPipeline {
    fail_review: bool,
    fail_post: bool,
    comments: Mutex<Vec<(String, u64, String)>>,
}

#[async_trait]
impl ReviewPipeline for RecordingPipeline {
    async fn review(&self, repo: &str, pr_number: u64) -> Result<String> {
        if self.fail_review {
            return Err(AsmfError::Review("model offline".to_string()));
        }
        Ok(format!("Review of {}#{}", repo, pr_number))
    }

    async fn post_comment(&self, repo: &str, pr_number: u64, body: &str) -> Result<()> {
        self.comments
            .lock()
            .unwrap()
            .push((repo.to_string(), pr_number, body.to_string()));
        if self.fail_post {
            return Err(AsmfError::GitHub("403 Forbidden".to_string()));
        }
        Ok(())
    }
}

fn router(pipeline: Arc<RecordingPipeline>, secret: Option<&str>) -> axum::Router {
    create_router(Arc::new(WebhookState {
        webhook_secret: secret.map(str::to_string),
        ollama_url: "http://localhost:11434".to_string(),
        model: "qwen2.5:14b-q4".to_string(),
        github_token_configured: true,
        pipeline,
    }))
}

fn pr_payload(action: &str, draft: bool) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": action,
        "pull_request": {"number": 42, "draft": draft, "user": {"login": "alice"}, "body": "Fixes a bug"},
        "repository": {"full_name": "owner/repo"},
    }))
    .unwrap()
}

fn signed_request(event: &str, body: Vec<u8>) -> Request<Body> {
    let signature = sign(SECRET, &body).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-GitHub-Event", event)
        .header("X-Hub-Signature-256", signature)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn bad_signature_is_forbidden() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-GitHub-Event", "pull_request")
        .header("X-Hub-Signature-256", "sha256=deadbeef")
        .body(Body::from(pr_payload("opened", false)))
        .unwrap();

    let (status, body) = send(router(pipeline.clone(), Some(SECRET)), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid signature");
    assert!(pipeline.comments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_signature_is_forbidden() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-GitHub-Event", "pull_request")
        .body(Body::from(pr_payload("opened", false)))
        .unwrap();
    let (status, _) = send(router(Arc::new(RecordingPipeline::default()), Some(SECRET)), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn other_events_are_acknowledged() {
    let (status, body) = send(
        router(Arc::new(RecordingPipeline::default()), Some(SECRET)),
        signed_request("push", b"{}".to_vec()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event type not handled");
}

#[tokio::test]
async fn unhandled_action_is_acknowledged() {
    let (status, body) = send(
        router(Arc::new(RecordingPipeline::default()), Some(SECRET)),
        signed_request("pull_request", pr_payload("closed", false)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Action closed not handled");
}

#[tokio::test]
async fn draft_pull_requests_are_skipped() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let (status, body) = send(
        router(pipeline.clone(), Some(SECRET)),
        signed_request("pull_request", pr_payload("opened", true)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Draft PR - skipping review");
    assert!(pipeline.comments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn successful_review_is_posted() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let (status, body) = send(
        router(pipeline.clone(), Some(SECRET)),
        signed_request("pull_request", pr_payload("ready_for_review", false)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Review completed and posted");
    assert_eq!(body["pr_number"], 42);
    let comments = pipeline.comments.lock().unwrap();
    assert_eq!(comments.as_slice(), &[("owner/repo".to_string(), 42, "Review of owner/repo#42".to_string())]);
}

#[tokio::test]
async fn failed_review_posts_failure_comment() {
    let pipeline = Arc::new(RecordingPipeline { fail_review: true, ..Default::default() });
    let (status, body) = send(
        router(pipeline.clone(), Some(SECRET)),
        signed_request("pull_request", pr_payload("synchronize", false)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Review failed");
    assert_eq!(pipeline.comments.lock().unwrap()[0].2, FAILURE_COMMENT);
}

#[tokio::test]
async fn failed_comment_post_is_an_error() {
    let pipeline = Arc::new(RecordingPipeline { fail_post: true, ..Default::default() });
    let (status, body) = send(
        router(pipeline, Some(SECRET)),
        signed_request("pull_request", pr_payload("opened", false)),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to post review comment");
}

#[tokio::test]
async fn unsigned_requests_pass_without_secret() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-GitHub-Event", "pull_request")
        .body(Body::from(pr_payload("opened", false)))
        .unwrap();
    let (status, _) = send(router(Arc::new(RecordingPipeline::default()), None), request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_configuration() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(router(Arc::new(RecordingPipeline::default()), None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "qwen2.5:14b-q4");
    assert_eq!(body["github_token_configured"], true);
    assert_eq!(body["webhook_secret_configured"], false);
}

#[tokio::test]
async fn root_lists_endpoints() {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(router(Arc::new(RecordingPipeline::default()), None), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["webhook"], "/webhook");
}
