use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::claude::{extract_json, ClaudeClient};
use crate::agents::{prompt, read_source};
use crate::collab::types::{Finding, ResearchNote};
use crate::collab::Researcher;
use crate::error::Result;

/// Claude-backed researcher: explains one finding and how to remediate it.
pub struct ClaudeResearcher {
    client: Arc<ClaudeClient>,
    max_file_size: usize,
}

impl ClaudeResearcher {
    pub fn new(client: Arc<ClaudeClient>, max_file_size: usize) -> Self {
        Self {
            client,
            max_file_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResearchResponse {
    analysis: String,
    #[serde(default)]
    remediation_guidance: String,
}

#[async_trait]
impl Researcher for ClaudeResearcher {
    async fn research(&self, repo_path: &Path, finding: &Finding) -> Result<ResearchNote> {
        let excerpt = read_source(repo_path, &finding.file, self.max_file_size)
            .await
            .unwrap_or_default();

        // Transport failures propagate; only content problems degrade.
        let response = self
            .client
            .complete(
                &prompt::system_prompt_for_research(),
                &prompt::research_prompt(finding, &excerpt),
            )
            .await?;

        let parsed = extract_json(&response)
            .and_then(|json| serde_json::from_str::<ResearchResponse>(json).ok());

        let note = match parsed {
            Some(parsed) => ResearchNote {
                finding_id: finding.id.clone(),
                analysis: parsed.analysis,
                remediation_guidance: parsed.remediation_guidance,
                degraded: false,
            },
            None => {
                tracing::warn!(finding = %finding.id, "Unparseable research output, degrading");
                ResearchNote::degraded(&finding.id, "model returned unparseable analysis")
            }
        };

        Ok(note)
    }
}
