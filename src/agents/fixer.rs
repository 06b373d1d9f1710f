use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::claude::{extract_json, ClaudeClient};
use crate::agents::{prompt, read_source};
use crate::collab::types::{Finding, ProposedFix, ResearchNote};
use crate::collab::FixGenerator;
use crate::error::Result;

/// Claude-backed fix generator: proposes a whole-file replacement for one
/// finding, or declines.
pub struct ClaudeFixer {
    client: Arc<ClaudeClient>,
    max_file_size: usize,
}

impl ClaudeFixer {
    pub fn new(client: Arc<ClaudeClient>, max_file_size: usize) -> Self {
        Self {
            client,
            max_file_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FixResponse {
    #[serde(default)]
    description: String,
    #[serde(default)]
    patched_source: Option<String>,
    #[serde(default)]
    no_fix: Option<String>,
}

#[async_trait]
impl FixGenerator for ClaudeFixer {
    async fn propose(
        &self,
        repo_path: &Path,
        finding: &Finding,
        note: &ResearchNote,
    ) -> Result<Option<ProposedFix>> {
        let Some(source) = read_source(repo_path, &finding.file, self.max_file_size).await else {
            tracing::warn!(finding = %finding.id, file = %finding.file, "Affected file unreadable, no fix");
            return Ok(None);
        };

        let response = self
            .client
            .complete(
                &prompt::system_prompt_for_fix(),
                &prompt::fix_prompt(finding, note, &source),
            )
            .await?;

        let parsed = extract_json(&response)
            .and_then(|json| serde_json::from_str::<FixResponse>(json).ok());

        let fix = match parsed {
            Some(FixResponse {
                patched_source: Some(patched),
                description,
                no_fix: None,
            }) if !patched.is_empty() => Some(ProposedFix {
                finding_id: finding.id.clone(),
                file: finding.file.clone(),
                description,
                patched_source: patched,
            }),
            Some(FixResponse {
                no_fix: Some(reason),
                ..
            }) => {
                tracing::info!(finding = %finding.id, reason = %reason, "Fixer declined");
                None
            }
            _ => {
                tracing::warn!(finding = %finding.id, "Unparseable fixer output, skipping finding");
                None
            }
        };

        Ok(fix)
    }
}
