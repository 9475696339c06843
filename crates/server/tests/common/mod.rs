//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock collaborators injected, so the job API can be exercised
//! without yt-dlp, whisper or network access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use scribe_core::testing::fixtures::MockPipeline;
use scribe_core::{Config, JobManager, JobState};
use scribe_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use scribe_core::testing::fixtures;

/// Test fixture for API testing with mock collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/jobs", json!({
///         "url": "https://youtu.be/abc",
///         "model": "base"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock collaborators and the store behind the manager
    pub pipeline: MockPipeline,
    /// The manager the router talks to
    pub manager: Arc<JobManager>,
    /// Temporary directory for downloaded artifacts
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_pipeline(|_| {})
    }

    /// Create a test fixture, adjusting the mock pipeline before wiring.
    pub fn with_pipeline(configure: impl FnOnce(&mut MockPipeline)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut pipeline = MockPipeline::new(temp_dir.path().join("downloads"));
        configure(&mut pipeline);

        let manager = Arc::new(pipeline.manager());

        let mut config = Config::default();
        config.manager = pipeline.manager_config.clone();
        config.processor = pipeline.processor_config.clone();
        config.translator = pipeline.translator_config.clone();
        config.reaper = pipeline.reaper_config.clone();

        let state = Arc::new(AppState::new(config, Arc::clone(&manager)));
        let router = create_router(state);

        Self {
            router,
            pipeline,
            manager,
            temp_dir,
        }
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    /// Wait until a job is terminal, returning its final state.
    pub async fn wait_for_terminal(&self, job_id: &str) -> JobState {
        fixtures::wait_for_terminal(&*self.pipeline.store, job_id).await
    }
}
