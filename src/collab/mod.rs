pub mod types;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Clones or opens the repository under remediation.
///
/// An `Err` from any collaborator method means the capability itself is
/// unavailable; per-item soft failures are expressed in the return types
/// (degraded notes, `None` fixes, rejected verdicts).
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Fetch the repository and return the local checkout path.
    async fn fetch(&self, repo_url: &str) -> Result<PathBuf>;

    /// Remove a checkout created by `fetch`.
    async fn cleanup(&self, repo_path: &Path) -> Result<()>;
}

/// Static-analysis collaborator that detects vulnerabilities.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, repo_path: &Path) -> Result<Vec<Finding>>;
}

/// Produces an explanation and remediation guidance for one finding.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// A note with `degraded = true` records a per-finding research failure.
    async fn research(&self, repo_path: &Path, finding: &Finding) -> Result<ResearchNote>;
}

/// Synthesizes a candidate code change for one researched finding.
#[async_trait]
pub trait FixGenerator: Send + Sync {
    /// `None` means no viable fix could be proposed for this finding.
    async fn propose(
        &self,
        repo_path: &Path,
        finding: &Finding,
        note: &ResearchNote,
    ) -> Result<Option<ProposedFix>>;
}

/// Reviews a proposed fix before publication.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, repo_path: &Path, fix: &ProposedFix) -> Result<ReviewVerdict>;
}

/// Applies accepted fixes on a branch and opens a change request.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Returns the URL of the created pull request.
    async fn publish(
        &self,
        repo_path: &Path,
        repo_url: &str,
        branch_name: &str,
        fixes: &[ProposedFix],
    ) -> Result<String>;
}
