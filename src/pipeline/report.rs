use serde::{Deserialize, Serialize};

use crate::pipeline::record::{RunRecord, Stage};

/// Caller-facing outcome vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
    Incomplete,
}

/// The sole data contract the pipeline core exposes to invocation surfaces.
///
/// HTTP status codes, CLI exit codes and log formatting are adapter
/// responsibilities built on top of this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub vulnerabilities_found: usize,
    pub fixes_applied: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Stage reached when the run ended without completing (incomplete only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Map a terminal record to its outward report.
///
/// Exhaustive and total: every terminal record maps to exactly one outcome.
/// Pure, so interpreting the same record twice yields identical reports.
pub fn interpret(record: &RunRecord) -> RunReport {
    match record.current_stage {
        Stage::Error => RunReport {
            outcome: Outcome::Error,
            vulnerabilities_found: record.vulnerabilities.len(),
            fixes_applied: 0,
            pull_request_url: None,
            summary_report: None,
            error_message: Some(
                record
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error occurred".to_string()),
            ),
            final_stage: None,
            message: None,
        },
        Stage::Complete => RunReport {
            outcome: Outcome::Success,
            vulnerabilities_found: record.vulnerabilities.len(),
            fixes_applied: record.reviewed_fixes.len(),
            pull_request_url: record.pull_request_url.clone(),
            summary_report: record.summary_report.clone(),
            error_message: None,
            final_stage: None,
            message: None,
        },
        // Defensive: the engine's run loop only returns terminal records,
        // but a non-terminal stage observed here must still map somewhere.
        stage => RunReport {
            outcome: Outcome::Incomplete,
            vulnerabilities_found: record.vulnerabilities.len(),
            fixes_applied: record.reviewed_fixes.len(),
            pull_request_url: None,
            summary_report: None,
            error_message: None,
            final_stage: Some(stage.to_string()),
            message: Some("pipeline did not complete all stages".to_string()),
        },
    }
}
