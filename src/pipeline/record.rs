use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::collab::types::{Finding, ProposedFix, ResearchNote};
use crate::pipeline::stage::{ErrorKind, StageAbort};

/// The remediation stages in their fixed order of progression.
///
/// `Error` is reachable from every non-terminal stage and absorbing;
/// `Complete` is terminal success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initialize,
    Scan,
    Research,
    Fix,
    Review,
    Publish,
    Summarize,
    Complete,
    Error,
}

impl Stage {
    /// The stage that follows this one in normal progression.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Initialize => Some(Stage::Scan),
            Stage::Scan => Some(Stage::Research),
            Stage::Research => Some(Stage::Fix),
            Stage::Fix => Some(Stage::Review),
            Stage::Review => Some(Stage::Publish),
            Stage::Publish => Some(Stage::Summarize),
            Stage::Summarize => Some(Stage::Complete),
            Stage::Complete | Stage::Error => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Initialize => "initialize",
            Stage::Scan => "scan",
            Stage::Research => "research",
            Stage::Fix => "fix",
            Stage::Review => "review",
            Stage::Publish => "publish",
            Stage::Summarize => "summarize",
            Stage::Complete => "complete",
            Stage::Error => "error",
        };
        f.write_str(s)
    }
}

/// The result record threaded through one pipeline run.
///
/// Owned exclusively by the engine for the run's duration; each stage
/// populates only the fields it owns, and the record is discarded once the
/// outcome has been rendered.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub repo_url: String,
    pub repo_path: Option<PathBuf>,
    pub branch_name: Option<String>,
    pub current_stage: Stage,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub vulnerabilities: Vec<Finding>,
    /// Research notes keyed by finding id (stable iteration order).
    pub research_results: BTreeMap<String, ResearchNote>,
    pub fixes: Vec<ProposedFix>,
    /// Subset of `fixes` that passed review.
    pub reviewed_fixes: Vec<ProposedFix>,
    pub pull_request_url: Option<String>,
    pub summary_report: Option<String>,
}

impl RunRecord {
    pub fn new(repo_url: &str) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            repo_path: None,
            branch_name: None,
            current_stage: Stage::Initialize,
            error_kind: None,
            error_message: None,
            vulnerabilities: Vec::new(),
            research_results: BTreeMap::new(),
            fixes: Vec::new(),
            reviewed_fixes: Vec::new(),
            pull_request_url: None,
            summary_report: None,
        }
    }

    /// Advance to the next stage in the fixed order. No-op on terminal
    /// stages, which keeps `Error` absorbing.
    pub fn advance(&mut self) {
        if let Some(next) = self.current_stage.next() {
            self.current_stage = next;
        }
    }

    /// Transition to the absorbing `Error` stage.
    pub fn abort(&mut self, abort: StageAbort) {
        tracing::warn!(
            stage = %self.current_stage,
            kind = %abort.kind,
            message = %abort.message,
            "Pipeline aborted"
        );
        self.error_kind = Some(abort.kind);
        self.error_message = Some(abort.message);
        self.current_stage = Stage::Error;
    }

    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_total() {
        let mut stage = Stage::Initialize;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Initialize,
                Stage::Scan,
                Stage::Research,
                Stage::Fix,
                Stage::Review,
                Stage::Publish,
                Stage::Summarize,
                Stage::Complete,
            ]
        );
    }

    #[test]
    fn test_terminal_stages_have_no_successor() {
        assert_eq!(Stage::Complete.next(), None);
        assert_eq!(Stage::Error.next(), None);
        assert!(Stage::Complete.is_terminal());
        assert!(Stage::Error.is_terminal());
        assert!(!Stage::Publish.is_terminal());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut record = RunRecord::new("https://github.com/acme/app");
        assert_eq!(record.current_stage, Stage::Initialize);
        record.advance();
        assert_eq!(record.current_stage, Stage::Scan);
        record.advance();
        assert_eq!(record.current_stage, Stage::Research);
    }

    #[test]
    fn test_error_is_absorbing() {
        let mut record = RunRecord::new("https://github.com/acme/app");
        record.advance(); // scan
        record.abort(StageAbort::new(ErrorKind::ToolFailure, "scanner crashed"));
        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::ToolFailure));
        assert_eq!(record.error_message.as_deref(), Some("scanner crashed"));

        // Advancing out of Error is impossible
        record.advance();
        assert_eq!(record.current_stage, Stage::Error);
    }
}
