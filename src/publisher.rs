use std::path::Path;

use async_trait::async_trait;
use octocrab::Octocrab;

use crate::collab::types::ProposedFix;
use crate::collab::Publisher;
use crate::error::{AppError, Result};
use crate::workspace::{git, WorkspaceManager};

/// Publishes accepted fixes as a GitHub pull request: branch, apply, commit,
/// push, open PR.
pub struct GitHubPublisher {
    token: String,
}

impl GitHubPublisher {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }

    fn client(&self) -> Result<Octocrab> {
        Octocrab::builder()
            .personal_token(self.token.clone())
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
    }

    async fn apply_fixes(&self, repo_path: &Path, fixes: &[ProposedFix]) -> Result<()> {
        for fix in fixes {
            let target = WorkspaceManager::verify_path(repo_path, &fix.file)?;
            tokio::fs::write(&target, &fix.patched_source)
                .await
                .map_err(|e| {
                    AppError::Workspace(format!("Failed to write fix for {}: {e}", fix.file))
                })?;
            tracing::info!(file = %fix.file, finding = %fix.finding_id, "Applied fix");
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for GitHubPublisher {
    async fn publish(
        &self,
        repo_path: &Path,
        repo_url: &str,
        branch_name: &str,
        fixes: &[ProposedFix],
    ) -> Result<String> {
        let (owner, repo) = parse_repo(repo_url)?;

        git::create_branch(repo_path, branch_name).await?;
        self.apply_fixes(repo_path, fixes).await?;

        if !git::has_changes(repo_path).await? {
            return Err(AppError::Git(
                "accepted fixes produced no changes to publish".to_string(),
            ));
        }

        git::add_all(repo_path).await?;
        git::commit(repo_path, &commit_message(fixes)).await?;
        git::push(repo_path, branch_name, &self.token).await?;

        let client = self.client()?;

        let default_branch = client
            .repos(&owner, &repo)
            .get()
            .await?
            .default_branch
            .unwrap_or_else(|| "main".to_string());

        let created = client
            .pulls(&owner, &repo)
            .create(pr_title(fixes), branch_name, default_branch)
            .body(pr_body(fixes))
            .send()
            .await?;

        let url = created
            .html_url
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("https://github.com/{owner}/{repo}/pull/{}", created.number));

        tracing::info!(pr = %url, fixes = fixes.len(), "Pull request created");
        Ok(url)
    }
}

fn parse_repo(repo_url: &str) -> Result<(String, String)> {
    let path = repo_url
        .strip_prefix("https://")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_host, path)| path)
        .ok_or_else(|| AppError::InvalidRepoUrl(repo_url.to_string()))?;

    let mut segments = path.split('/');
    let owner = segments.next().filter(|s| !s.is_empty());
    let repo = segments
        .next()
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty());

    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok((owner.to_string(), repo.to_string())),
        _ => Err(AppError::InvalidRepoUrl(repo_url.to_string())),
    }
}

fn commit_message(fixes: &[ProposedFix]) -> String {
    let details = fixes
        .iter()
        .map(|f| format!("- {}: {}", f.file, f.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "fix: remediate {} security finding(s)\n\n{details}",
        fixes.len()
    )
}

fn pr_title(fixes: &[ProposedFix]) -> String {
    format!("Security: remediate {} finding(s)", fixes.len())
}

fn pr_body(fixes: &[ProposedFix]) -> String {
    let details = fixes
        .iter()
        .map(|f| format!("- `{}` ({}): {}", f.file, f.finding_id, f.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Automated security remediation.\n\n## Fixes\n\n{details}\n\n---\n*Automated by Aegis*"
    )
}
