pub mod claude;
pub mod fixer;
pub mod prompt;
pub mod researcher;
pub mod reviewer;
pub mod scanner;

use std::path::Path;

/// Best-effort read of a repository file for inclusion in a prompt.
///
/// Returns `None` for missing, unreadable or oversized files; the agents
/// degrade gracefully rather than abort on a bad path from an earlier stage.
pub(crate) async fn read_source(repo_path: &Path, file: &str, max_bytes: usize) -> Option<String> {
    let path = repo_path.join(file);
    let metadata = tokio::fs::metadata(&path).await.ok()?;
    if metadata.len() as usize > max_bytes {
        tracing::debug!(file, size = metadata.len(), "File too large for prompt");
        return None;
    }
    tokio::fs::read_to_string(&path).await.ok()
}
