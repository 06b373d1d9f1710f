use std::fmt::Write;

use crate::pipeline::record::RunRecord;

/// Render the human-readable summary report from a finished run.
///
/// Pure formatting over the record; never fails.
pub fn render(record: &RunRecord) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Security remediation report for {}", record.repo_url);
    let _ = writeln!(out);
    let _ = writeln!(out, "Vulnerabilities found: {}", record.vulnerabilities.len());
    let _ = writeln!(out, "Fixes proposed:        {}", record.fixes.len());
    let _ = writeln!(out, "Fixes accepted:        {}", record.reviewed_fixes.len());

    if !record.vulnerabilities.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Findings:");
        for finding in &record.vulnerabilities {
            let location = match finding.line {
                Some(line) => format!("{}:{line}", finding.file),
                None => finding.file.clone(),
            };
            let _ = writeln!(
                out,
                "  - [{}] {} at {}",
                finding.severity, finding.kind, location
            );
            if let Some(note) = record.research_results.get(&finding.id) {
                if note.degraded {
                    let _ = writeln!(out, "    (research unavailable)");
                } else if !note.analysis.is_empty() {
                    let _ = writeln!(out, "    {}", note.analysis);
                }
            }
        }
    }

    if !record.reviewed_fixes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Accepted fixes:");
        for fix in &record.reviewed_fixes {
            let _ = writeln!(out, "  - {}: {}", fix.file, fix.description);
        }
    }

    let _ = writeln!(out);
    match &record.pull_request_url {
        Some(url) => {
            let _ = writeln!(out, "Pull request: {url}");
        }
        None => {
            let _ = writeln!(out, "No fixes were published.");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::types::{Finding, ProposedFix, ResearchNote, Severity, VulnerabilityKind};

    #[test]
    fn test_render_empty_run() {
        let record = RunRecord::new("https://github.com/acme/app");
        let report = render(&record);

        assert!(report.contains("https://github.com/acme/app"));
        assert!(report.contains("Vulnerabilities found: 0"));
        assert!(report.contains("No fixes were published."));
    }

    #[test]
    fn test_render_lists_findings_and_fixes() {
        let mut record = RunRecord::new("https://github.com/acme/app");
        record.vulnerabilities = vec![Finding {
            id: "f-1".to_string(),
            kind: VulnerabilityKind::CommandInjection,
            file: "scripts/deploy.sh".to_string(),
            line: Some(12),
            severity: Severity::Critical,
            description: "shell interpolation of user input".to_string(),
        }];
        record.research_results.insert(
            "f-1".to_string(),
            ResearchNote {
                finding_id: "f-1".to_string(),
                analysis: "user input reaches a shell invocation".to_string(),
                remediation_guidance: "quote arguments".to_string(),
                degraded: false,
            },
        );
        record.reviewed_fixes = vec![ProposedFix {
            finding_id: "f-1".to_string(),
            file: "scripts/deploy.sh".to_string(),
            description: "quoted all interpolated arguments".to_string(),
            patched_source: String::new(),
        }];
        record.pull_request_url = Some("https://github.com/acme/app/pull/9".to_string());

        let report = render(&record);
        assert!(report.contains("[critical] Command Injection at scripts/deploy.sh:12"));
        assert!(report.contains("user input reaches a shell invocation"));
        assert!(report.contains("scripts/deploy.sh: quoted all interpolated arguments"));
        assert!(report.contains("Pull request: https://github.com/acme/app/pull/9"));
    }
}
