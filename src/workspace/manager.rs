use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::collab::RepoFetcher;
use crate::config::WorkspaceConfig;
use crate::error::{AppError, Result};
use crate::workspace::git;

/// Manages checkout directories for pipeline runs.
///
/// Every run gets its own directory, so concurrent runs against the same
/// repository never collide on disk.
pub struct WorkspaceManager {
    base_dir: PathBuf,
    token: Option<String>,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig, token: Option<String>) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            token,
        }
    }

    /// Clean up an existing checkout directory and ensure its parent exists.
    async fn prepare_checkout_dir(path: &Path) -> Result<()> {
        if path.exists() {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to clean checkout: {e}")))?;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create checkout dir: {e}")))?;
        }
        Ok(())
    }

    fn checkout_path(&self, repo_url: &str) -> PathBuf {
        static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

        let safe_name = repo_url
            .trim_start_matches("https://")
            .trim_end_matches(".git")
            .replace(['/', ':'], "__");
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        self.base_dir
            .join(format!("{safe_name}__{}-{seq}", std::process::id()))
    }

    /// Verify a path is within the checkout (path traversal protection for
    /// file paths coming out of model output).
    pub fn verify_path(checkout_root: &Path, requested_path: &str) -> Result<PathBuf> {
        let requested = Path::new(requested_path);
        if requested.is_absolute() {
            return Err(AppError::Workspace(format!(
                "Absolute fix path rejected: {requested_path}"
            )));
        }

        let full_path = checkout_root.join(requested);

        // Canonicalize to resolve .. and symlinks; fixes only replace
        // existing files, so the target must exist.
        let canonical = full_path
            .canonicalize()
            .map_err(|e| AppError::Workspace(format!("Failed to resolve path: {e}")))?;

        let canonical_root = checkout_root
            .canonicalize()
            .map_err(|e| AppError::Workspace(format!("Failed to resolve checkout root: {e}")))?;

        if !canonical.starts_with(&canonical_root) {
            return Err(AppError::Workspace(format!(
                "Path traversal detected: {requested_path} is outside the checkout"
            )));
        }

        Ok(canonical)
    }
}

#[async_trait]
impl RepoFetcher for WorkspaceManager {
    async fn fetch(&self, repo_url: &str) -> Result<PathBuf> {
        let path = self.checkout_path(repo_url);
        Self::prepare_checkout_dir(&path).await?;

        git::clone(repo_url, &path, self.token.as_deref()).await?;

        tracing::info!(repo = repo_url, path = %path.display(), "Repository checked out");
        Ok(path)
    }

    async fn cleanup(&self, repo_path: &Path) -> Result<()> {
        if repo_path.exists() {
            tokio::fs::remove_dir_all(repo_path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to cleanup checkout: {e}")))?;
        }
        Ok(())
    }
}
