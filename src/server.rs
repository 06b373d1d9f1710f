use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::agents::claude::ClaudeClient;
use crate::agents::fixer::ClaudeFixer;
use crate::agents::researcher::ClaudeResearcher;
use crate::agents::reviewer::ClaudeReviewer;
use crate::agents::scanner::ClaudeScanner;
use crate::collab::RepoFetcher;
use crate::config::AppConfig;
use crate::pipeline::{interpret, Pipeline};
use crate::publisher::GitHubPublisher;
use crate::workspace::WorkspaceManager;

pub struct AppState {
    pub config: AppConfig,
    pub workspaces: Arc<WorkspaceManager>,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let client = Arc::new(ClaudeClient::new(
            config.claude_api_key(),
            &config.claude.model,
            config.claude.max_tokens,
        ));

        let token = Some(config.github.token.clone()).filter(|t| !t.is_empty());
        let workspaces = Arc::new(WorkspaceManager::new(&config.workspace, token));

        let max_file_size = config.scanner.max_file_size_bytes;
        let pipeline = Pipeline::new(
            Arc::clone(&workspaces) as Arc<dyn RepoFetcher>,
            Arc::new(ClaudeScanner::new(
                Arc::clone(&client),
                config.scanner.max_files,
                max_file_size,
            )),
            Arc::new(ClaudeResearcher::new(Arc::clone(&client), max_file_size)),
            Arc::new(ClaudeFixer::new(Arc::clone(&client), max_file_size)),
            Arc::new(ClaudeReviewer::new(Arc::clone(&client), max_file_size)),
            Arc::new(GitHubPublisher::new(config.github_token())),
            config.stage_timeout(),
            config.pipeline.dry_run,
        );

        Self {
            config,
            workspaces,
            pipeline,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health_check))
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    repo_url: Option<String>,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let Some(repo_url) = request.repo_url.filter(|u| !u.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "repo_url is required"})),
        )
            .into_response();
    };

    tracing::info!(repo = %repo_url, "Analyze request received");

    let record = state.pipeline.run(&repo_url).await;

    // Checkout directories are per run; drop this one regardless of outcome
    if let Some(path) = &record.repo_path {
        let _ = state.workspaces.cleanup(path).await;
    }

    (StatusCode::OK, Json(interpret(&record))).into_response()
}

async fn health_check() -> &'static str {
    "ok"
}

async fn index() -> &'static str {
    "Aegis - automated security vulnerability remediation"
}
