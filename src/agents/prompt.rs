use crate::collab::types::{Finding, ProposedFix, ResearchNote, VulnerabilityKind};

pub fn system_prompt_for_scan() -> String {
    let taxonomy = VulnerabilityKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "- {:?}: {} ({})",
                kind,
                kind.description(),
                kind.cwe_ids().join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a static application security scanner. You analyze one source file at a time and report vulnerabilities.

Only report vulnerabilities from this taxonomy:
{taxonomy}

Respond with a JSON array, one object per finding:
[{{"kind": "<taxonomy variant, e.g. SqlInjection>", "line": <line number or null>, "severity": "critical|high|medium|low", "description": "<one sentence>"}}]

Respond with an empty array [] if the file contains no vulnerabilities from the taxonomy. Output only JSON."#
    )
}

pub fn scan_file_prompt(relative_path: &str, source: &str) -> String {
    format!("File: `{relative_path}`\n\n```\n{source}\n```")
}

pub fn system_prompt_for_research() -> String {
    r#"You are a security researcher. Given one vulnerability finding, explain how it can be exploited in this codebase and how it should be remediated.

Respond with a JSON object:
{"analysis": "<how the vulnerability works here>", "remediation_guidance": "<concrete guidance for a fix>"}

Output only JSON."#
        .to_string()
}

pub fn research_prompt(finding: &Finding, source_excerpt: &str) -> String {
    format!(
        r#"Finding: {kind} ({cwes}) in `{file}`{line}, severity {severity}.
{description}

Affected source:
```
{source_excerpt}
```"#,
        kind = finding.kind,
        cwes = finding.kind.cwe_ids().join(", "),
        file = finding.file,
        line = finding
            .line
            .map(|l| format!(" at line {l}"))
            .unwrap_or_default(),
        severity = finding.severity,
        description = finding.description,
    )
}

pub fn system_prompt_for_fix() -> String {
    r#"You are a security engineer writing a minimal fix for one vulnerability. You receive the finding, research guidance, and the full current content of the affected file.

Respond with a JSON object:
{"description": "<one sentence describing the change>", "patched_source": "<the complete fixed file content>"}

If no safe fix is possible without more context, respond with:
{"no_fix": "<reason>"}

Rules:
- Change only what the fix requires; preserve formatting and behavior otherwise.
- Never truncate the file; `patched_source` must be the whole file.
- Output only JSON."#
        .to_string()
}

pub fn fix_prompt(finding: &Finding, note: &ResearchNote, source: &str) -> String {
    format!(
        r#"Finding: {kind} in `{file}`, severity {severity}.
{description}

Research analysis:
{analysis}

Remediation guidance:
{guidance}

Current content of `{file}`:
```
{source}
```"#,
        kind = finding.kind,
        file = finding.file,
        severity = finding.severity,
        description = finding.description,
        analysis = note.analysis,
        guidance = note.remediation_guidance,
    )
}

pub fn system_prompt_for_review() -> String {
    r#"You are a strict code reviewer for automated security fixes. Given a vulnerability finding and a proposed replacement file, decide whether the fix is safe to merge.

Reject the fix if it is incomplete, changes unrelated behavior, introduces new issues, or fails to address the vulnerability.

Respond with a JSON object:
{"verdict": "accept"} or {"verdict": "reject", "reason": "<why>"}

Output only JSON."#
        .to_string()
}

pub fn review_prompt(fix: &ProposedFix, original_source: &str) -> String {
    format!(
        r#"Proposed fix for finding `{id}` in `{file}`: {description}

Original file content:
```
{original_source}
```

Proposed replacement:
```
{patched}
```"#,
        id = fix.finding_id,
        file = fix.file,
        description = fix.description,
        patched = fix.patched_source,
    )
}
