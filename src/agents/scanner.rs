use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::claude::{extract_json, ClaudeClient};
use crate::agents::prompt;
use crate::collab::types::{Finding, Severity, VulnerabilityKind};
use crate::collab::Scanner;
use crate::error::{AppError, Result};

/// File extensions considered source code worth scanning.
const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "rb", "php", "java", "go", "rs", "c", "cpp", "cs", "sh",
];

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "target", ".venv", "vendor", "dist"];

/// Claude-backed vulnerability scanner: walks the checkout, prompts the
/// model per source file, and collects structured findings.
pub struct ClaudeScanner {
    client: Arc<ClaudeClient>,
    max_files: usize,
    max_file_size: usize,
}

impl ClaudeScanner {
    pub fn new(client: Arc<ClaudeClient>, max_files: usize, max_file_size: usize) -> Self {
        Self {
            client,
            max_files,
            max_file_size,
        }
    }

    async fn scan_file(&self, relative_path: &str, source: &str) -> Result<Vec<RawFinding>> {
        let response = self
            .client
            .complete(
                &prompt::system_prompt_for_scan(),
                &prompt::scan_file_prompt(relative_path, source),
            )
            .await?;

        let json = extract_json(&response).ok_or_else(|| {
            AppError::Scanner(format!(
                "scanner returned no JSON for {relative_path}: {response}"
            ))
        })?;

        serde_json::from_str(json).map_err(|e| {
            AppError::Scanner(format!("malformed scanner output for {relative_path}: {e}"))
        })
    }
}

#[async_trait]
impl Scanner for ClaudeScanner {
    async fn scan(&self, repo_path: &Path) -> Result<Vec<Finding>> {
        let root = repo_path.to_path_buf();
        let max_files = self.max_files;
        let max_file_size = self.max_file_size;

        let candidates = tokio::task::spawn_blocking(move || {
            collect_source_files(&root, max_files, max_file_size)
        })
        .await
        .map_err(|e| AppError::Scanner(format!("file walk task panicked: {e}")))??;

        tracing::info!(files = candidates.len(), "Scanning source files");

        let mut findings = Vec::new();
        for relative in candidates {
            let source = match tokio::fs::read_to_string(repo_path.join(&relative)).await {
                Ok(s) => s,
                // Binary or unreadable files are not scan targets
                Err(e) => {
                    tracing::debug!(file = %relative.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            let relative_str = relative.to_string_lossy().into_owned();
            for raw in self.scan_file(&relative_str, &source).await? {
                let id = format!("aegis-{:04}", findings.len() + 1);
                findings.push(raw.into_finding(id, &relative_str));
            }
        }

        tracing::info!(findings = findings.len(), "Scan complete");
        Ok(findings)
    }
}

/// One finding as reported by the model, before an id is assigned.
#[derive(Debug, Deserialize)]
struct RawFinding {
    kind: VulnerabilityKind,
    #[serde(default)]
    line: Option<u64>,
    severity: Severity,
    #[serde(default)]
    description: String,
}

impl RawFinding {
    fn into_finding(self, id: String, file: &str) -> Finding {
        Finding {
            id,
            kind: self.kind,
            file: file.to_string(),
            line: self.line,
            severity: self.severity,
            description: self.description,
        }
    }
}

fn collect_source_files(
    root: &Path,
    max_files: usize,
    max_file_size: usize,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| AppError::Scanner(format!("failed to read {}: {e}", dir.display())))?;

        let mut children: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| AppError::Scanner(format!("failed to read dir entry: {e}")))?;
            children.push(entry.path());
        }
        // Deterministic scan order regardless of filesystem
        children.sort();

        for path in children {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if path.is_dir() {
                if !EXCLUDED_DIRS.contains(&name.as_str()) {
                    stack.push(path);
                }
                continue;
            }

            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
                continue;
            }

            let size = std::fs::metadata(&path).map(|m| m.len() as usize).unwrap_or(0);
            if size > max_file_size {
                tracing::debug!(file = %path.display(), size, "Skipping oversized file");
                continue;
            }

            if files.len() >= max_files {
                tracing::warn!(max_files, "Scan file limit reached, remaining files skipped");
                return Ok(files);
            }

            let relative = path
                .strip_prefix(root)
                .map_err(|e| AppError::Scanner(format!("path outside checkout: {e}")))?;
            files.push(relative.to_path_buf());
        }
    }

    Ok(files)
}
