use serde::{Deserialize, Serialize};

/// The fixed taxonomy of vulnerabilities the system detects and fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VulnerabilityKind {
    SqlInjection,
    Xss,
    CommandInjection,
    PathTraversal,
    InsecureDeserialization,
    AuthWeakness,
    CryptoWeakness,
}

impl VulnerabilityKind {
    pub const ALL: [VulnerabilityKind; 7] = [
        VulnerabilityKind::SqlInjection,
        VulnerabilityKind::Xss,
        VulnerabilityKind::CommandInjection,
        VulnerabilityKind::PathTraversal,
        VulnerabilityKind::InsecureDeserialization,
        VulnerabilityKind::AuthWeakness,
        VulnerabilityKind::CryptoWeakness,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            VulnerabilityKind::SqlInjection => "SQL Injection",
            VulnerabilityKind::Xss => "Cross-Site Scripting (XSS)",
            VulnerabilityKind::CommandInjection => "Command Injection",
            VulnerabilityKind::PathTraversal => "Path Traversal",
            VulnerabilityKind::InsecureDeserialization => "Insecure Deserialization",
            VulnerabilityKind::AuthWeakness => "Authentication Issues",
            VulnerabilityKind::CryptoWeakness => "Cryptographic Issues",
        }
    }

    pub fn cwe_ids(&self) -> &'static [&'static str] {
        match self {
            VulnerabilityKind::SqlInjection => &["CWE-89"],
            VulnerabilityKind::Xss => &["CWE-79", "CWE-80"],
            VulnerabilityKind::CommandInjection => &["CWE-78"],
            VulnerabilityKind::PathTraversal => &["CWE-22"],
            VulnerabilityKind::InsecureDeserialization => &["CWE-502"],
            VulnerabilityKind::AuthWeakness => &["CWE-287", "CWE-306"],
            VulnerabilityKind::CryptoWeakness => &["CWE-327", "CWE-328"],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VulnerabilityKind::SqlInjection => "Improper neutralization of SQL commands",
            VulnerabilityKind::Xss => "Improper neutralization of script-related HTML tags",
            VulnerabilityKind::CommandInjection => "OS command injection vulnerabilities",
            VulnerabilityKind::PathTraversal => "Path traversal and directory traversal",
            VulnerabilityKind::InsecureDeserialization => "Deserialization of untrusted data",
            VulnerabilityKind::AuthWeakness => "Authentication and authorization weaknesses",
            VulnerabilityKind::CryptoWeakness => "Weak or broken cryptographic implementations",
        }
    }
}

impl std::fmt::Display for VulnerabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One detected vulnerability instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub kind: VulnerabilityKind,
    /// Path of the affected file, relative to the repository root.
    pub file: String,
    #[serde(default)]
    pub line: Option<u64>,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
}

/// Contextual explanation and remediation guidance for one finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchNote {
    pub finding_id: String,
    pub analysis: String,
    #[serde(default)]
    pub remediation_guidance: String,
    /// True when research for this finding failed and the note only records
    /// the failure reason.
    #[serde(default)]
    pub degraded: bool,
}

impl ResearchNote {
    pub fn degraded(finding_id: &str, reason: &str) -> Self {
        Self {
            finding_id: finding_id.to_string(),
            analysis: format!("Research unavailable for this finding: {reason}"),
            remediation_guidance: String::new(),
            degraded: true,
        }
    }
}

/// A candidate code change addressing one finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedFix {
    pub finding_id: String,
    /// Path of the file to replace, relative to the repository root.
    pub file: String,
    pub description: String,
    /// Complete replacement content for `file`.
    pub patched_source: String,
}

/// A reviewer's decision about one proposed fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewVerdict {
    Accepted,
    Rejected { reason: String },
}
