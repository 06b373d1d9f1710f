use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::claude::{extract_json, ClaudeClient};
use crate::agents::{prompt, read_source};
use crate::collab::types::{ProposedFix, ReviewVerdict};
use crate::collab::Reviewer;
use crate::error::Result;

/// Claude-backed reviewer: accepts or rejects one proposed fix.
pub struct ClaudeReviewer {
    client: Arc<ClaudeClient>,
    max_file_size: usize,
}

impl ClaudeReviewer {
    pub fn new(client: Arc<ClaudeClient>, max_file_size: usize) -> Self {
        Self {
            client,
            max_file_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    verdict: String,
    #[serde(default)]
    reason: Option<String>,
}

#[async_trait]
impl Reviewer for ClaudeReviewer {
    async fn review(&self, repo_path: &Path, fix: &ProposedFix) -> Result<ReviewVerdict> {
        let original = read_source(repo_path, &fix.file, self.max_file_size)
            .await
            .unwrap_or_default();

        let response = self
            .client
            .complete(
                &prompt::system_prompt_for_review(),
                &prompt::review_prompt(fix, &original),
            )
            .await?;

        let parsed = extract_json(&response)
            .and_then(|json| serde_json::from_str::<ReviewResponse>(json).ok());

        let verdict = match parsed {
            Some(parsed) if parsed.verdict == "accept" => ReviewVerdict::Accepted,
            Some(parsed) => ReviewVerdict::Rejected {
                reason: parsed
                    .reason
                    .unwrap_or_else(|| "rejected without a stated reason".to_string()),
            },
            None => {
                tracing::warn!(finding = %fix.finding_id, "Unparseable review output, rejecting fix");
                ReviewVerdict::Rejected {
                    reason: "review output was unparseable".to_string(),
                }
            }
        };

        Ok(verdict)
    }
}
