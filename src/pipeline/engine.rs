use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::collab::types::{Finding, ProposedFix, ResearchNote, ReviewVerdict};
use crate::collab::{FixGenerator, Publisher, RepoFetcher, Researcher, Reviewer, Scanner};
use crate::error::Result;
use crate::pipeline::record::{RunRecord, Stage};
use crate::pipeline::stage::{ErrorKind, StageAbort, StepResult};
use crate::pipeline::summary;

/// Sequences the remediation stages over a single [`RunRecord`].
///
/// The engine holds no per-run state; concurrent `run` calls only share the
/// injected collaborators, which must be safe for concurrent use.
pub struct Pipeline {
    fetcher: Arc<dyn RepoFetcher>,
    scanner: Arc<dyn Scanner>,
    researcher: Arc<dyn Researcher>,
    fixer: Arc<dyn FixGenerator>,
    reviewer: Arc<dyn Reviewer>,
    publisher: Arc<dyn Publisher>,
    stage_timeout: Duration,
    dry_run: bool,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn RepoFetcher>,
        scanner: Arc<dyn Scanner>,
        researcher: Arc<dyn Researcher>,
        fixer: Arc<dyn FixGenerator>,
        reviewer: Arc<dyn Reviewer>,
        publisher: Arc<dyn Publisher>,
        stage_timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            fetcher,
            scanner,
            researcher,
            fixer,
            reviewer,
            publisher,
            stage_timeout,
            dry_run,
        }
    }

    /// Run the full pipeline for one repository.
    pub async fn run(&self, repo_url: &str) -> RunRecord {
        self.run_cancellable(repo_url, || async { false }).await
    }

    /// Run the pipeline, checking `is_cancelled` before each stage.
    ///
    /// Cancellation between stages aborts the run with
    /// [`ErrorKind::Cancelled`]; a stage that is already executing finishes
    /// its current collaborator call first (bounded by the stage timeout).
    pub async fn run_cancellable<F, Fut>(&self, repo_url: &str, is_cancelled: F) -> RunRecord
    where
        F: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut record = RunRecord::new(repo_url);

        while !record.is_terminal() {
            if is_cancelled().await {
                record.abort(StageAbort::new(
                    ErrorKind::Cancelled,
                    format!("run cancelled before {} stage", record.current_stage),
                ));
                break;
            }

            tracing::info!(repo = %record.repo_url, stage = %record.current_stage, "Executing stage");

            match self.step(&mut record).await {
                Ok(()) => record.advance(),
                Err(abort) => record.abort(abort),
            }
        }

        record
    }

    /// Execute the stage the record currently points at.
    ///
    /// Each stage reads only the fields it depends on and writes only the
    /// fields it owns; deltas are applied here, nowhere else.
    async fn step(&self, record: &mut RunRecord) -> StepResult<()> {
        match record.current_stage {
            Stage::Initialize => {
                let path = self.initialize(&record.repo_url).await?;
                record.repo_path = Some(path);
            }
            Stage::Scan => {
                let path = required_path(record)?;
                let findings = self.scan(&path).await?;
                if findings.is_empty() {
                    tracing::info!(repo = %record.repo_url, "Scan found no vulnerabilities");
                }
                record.vulnerabilities = findings;
            }
            Stage::Research => {
                let path = required_path(record)?;
                let notes = self.research(&path, &record.vulnerabilities).await?;
                record.research_results = notes;
            }
            Stage::Fix => {
                let path = required_path(record)?;
                let fixes = self
                    .generate_fixes(&path, &record.vulnerabilities, &record.research_results)
                    .await?;
                record.fixes = fixes;
            }
            Stage::Review => {
                let path = required_path(record)?;
                let reviewed = self.review_fixes(&path, &record.fixes).await?;
                record.reviewed_fixes = reviewed;
            }
            Stage::Publish => {
                if record.reviewed_fixes.is_empty() {
                    tracing::info!(repo = %record.repo_url, "No accepted fixes, skipping publication");
                } else if self.dry_run {
                    tracing::info!(
                        repo = %record.repo_url,
                        fixes = record.reviewed_fixes.len(),
                        "Dry run, skipping publication"
                    );
                } else {
                    let path = required_path(record)?;
                    let branch = remediation_branch_name();
                    let url = self
                        .publish(&path, &record.repo_url, &branch, &record.reviewed_fixes)
                        .await?;
                    record.branch_name = Some(branch);
                    record.pull_request_url = Some(url);
                }
            }
            Stage::Summarize => {
                // Pure formatting, cannot fail
                record.summary_report = Some(summary::render(record));
            }
            // The run loop never dispatches terminal stages
            Stage::Complete | Stage::Error => {}
        }

        Ok(())
    }

    async fn initialize(&self, repo_url: &str) -> StepResult<PathBuf> {
        if let Err(reason) = validate_repo_url(repo_url) {
            return Err(StageAbort::new(ErrorKind::SourceUnavailable, reason));
        }
        self.call(self.fetcher.fetch(repo_url), ErrorKind::SourceUnavailable)
            .await
    }

    async fn scan(&self, repo_path: &Path) -> StepResult<Vec<Finding>> {
        self.call(self.scanner.scan(repo_path), ErrorKind::ToolFailure)
            .await
    }

    async fn research(
        &self,
        repo_path: &Path,
        findings: &[Finding],
    ) -> StepResult<BTreeMap<String, ResearchNote>> {
        let mut notes = BTreeMap::new();
        for finding in findings {
            let note = self
                .call(
                    self.researcher.research(repo_path, finding),
                    ErrorKind::DependencyUnavailable,
                )
                .await?;
            if note.degraded {
                tracing::warn!(finding = %finding.id, "Research degraded for finding");
            }
            notes.insert(finding.id.clone(), note);
        }
        Ok(notes)
    }

    async fn generate_fixes(
        &self,
        repo_path: &Path,
        findings: &[Finding],
        notes: &BTreeMap<String, ResearchNote>,
    ) -> StepResult<Vec<ProposedFix>> {
        let mut fixes = Vec::new();
        for finding in findings {
            let Some(note) = notes.get(&finding.id) else {
                continue;
            };
            let proposed = self
                .call(
                    self.fixer.propose(repo_path, finding, note),
                    ErrorKind::DependencyUnavailable,
                )
                .await?;
            match proposed {
                Some(fix) => fixes.push(fix),
                None => {
                    tracing::info!(finding = %finding.id, "No viable fix proposed, skipping");
                }
            }
        }
        Ok(fixes)
    }

    async fn review_fixes(
        &self,
        repo_path: &Path,
        fixes: &[ProposedFix],
    ) -> StepResult<Vec<ProposedFix>> {
        let mut reviewed = Vec::new();
        for fix in fixes {
            let verdict = self
                .call(
                    self.reviewer.review(repo_path, fix),
                    ErrorKind::DependencyUnavailable,
                )
                .await?;
            match verdict {
                ReviewVerdict::Accepted => reviewed.push(fix.clone()),
                ReviewVerdict::Rejected { reason } => {
                    tracing::info!(finding = %fix.finding_id, reason = %reason, "Fix rejected by review");
                }
            }
        }
        Ok(reviewed)
    }

    async fn publish(
        &self,
        repo_path: &Path,
        repo_url: &str,
        branch: &str,
        fixes: &[ProposedFix],
    ) -> StepResult<String> {
        self.call(
            self.publisher.publish(repo_path, repo_url, branch, fixes),
            ErrorKind::PublishFailure,
        )
        .await
    }

    /// Bound a collaborator call by the stage timeout and translate its
    /// failure into an abort with the stage's declared kind.
    ///
    /// This is the single place collaborator errors cross into the abort
    /// taxonomy; anything a stage did not anticipate surfaces as
    /// `ErrorKind::Internal` here rather than propagating further.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T>>,
        declared: ErrorKind,
    ) -> StepResult<T> {
        match tokio::time::timeout(self.stage_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StageAbort::from_collaborator(declared, &e)),
            Err(_) => Err(StageAbort::new(
                ErrorKind::DependencyTimeout,
                format!(
                    "collaborator call exceeded the {}s stage timeout",
                    self.stage_timeout.as_secs()
                ),
            )),
        }
    }
}

fn required_path(record: &RunRecord) -> StepResult<PathBuf> {
    record.repo_path.clone().ok_or_else(|| {
        StageAbort::new(
            ErrorKind::Internal,
            "repository path missing from record".to_string(),
        )
    })
}

fn validate_repo_url(repo_url: &str) -> std::result::Result<(), String> {
    if repo_url.trim().is_empty() {
        return Err("repository URL is empty".to_string());
    }
    if !repo_url.starts_with("https://") {
        return Err(format!("expected HTTPS repository URL, got: {repo_url}"));
    }
    let rest = &repo_url["https://".len()..];
    if rest.is_empty() || !rest.contains('/') {
        return Err(format!("repository URL has no path: {repo_url}"));
    }
    Ok(())
}

fn remediation_branch_name() -> String {
    format!(
        "aegis/security-fixes-{}",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::collab::types::{Severity, VulnerabilityKind};
    use crate::error::AppError;
    use crate::pipeline::report::{interpret, Outcome};

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn log_call(log: &CallLog, entry: &str) {
        log.lock().unwrap().push(entry.to_string());
    }

    fn finding(id: &str) -> Finding {
        Finding {
            id: id.to_string(),
            kind: VulnerabilityKind::SqlInjection,
            file: format!("src/{id}.py"),
            line: Some(10),
            severity: Severity::High,
            description: "string-built query".to_string(),
        }
    }

    struct StubFetcher {
        log: CallLog,
        fail: bool,
    }

    #[async_trait]
    impl RepoFetcher for StubFetcher {
        async fn fetch(&self, _repo_url: &str) -> Result<PathBuf> {
            log_call(&self.log, "fetch");
            if self.fail {
                return Err(AppError::Git("repository not found".to_string()));
            }
            Ok(PathBuf::from("/tmp/aegis-test-checkout"))
        }

        async fn cleanup(&self, _repo_path: &Path) -> Result<()> {
            Ok(())
        }
    }

    struct StubScanner {
        log: CallLog,
        findings: Vec<Finding>,
        error: Option<fn() -> AppError>,
    }

    #[async_trait]
    impl Scanner for StubScanner {
        async fn scan(&self, _repo_path: &Path) -> Result<Vec<Finding>> {
            log_call(&self.log, "scan");
            if let Some(make_error) = self.error {
                return Err(make_error());
            }
            Ok(self.findings.clone())
        }
    }

    struct StubResearcher {
        log: CallLog,
        degrade: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl Researcher for StubResearcher {
        async fn research(&self, _repo_path: &Path, finding: &Finding) -> Result<ResearchNote> {
            log_call(&self.log, "research");
            if self.fail {
                return Err(AppError::ClaudeApi("connection refused".to_string()));
            }
            if self.degrade.contains(&finding.id) {
                return Ok(ResearchNote::degraded(&finding.id, "model returned no analysis"));
            }
            Ok(ResearchNote {
                finding_id: finding.id.clone(),
                analysis: "parameterize the query".to_string(),
                remediation_guidance: "use bound parameters".to_string(),
                degraded: false,
            })
        }
    }

    struct StubFixer {
        log: CallLog,
        propose_for: Vec<String>,
    }

    #[async_trait]
    impl FixGenerator for StubFixer {
        async fn propose(
            &self,
            _repo_path: &Path,
            finding: &Finding,
            _note: &ResearchNote,
        ) -> Result<Option<ProposedFix>> {
            log_call(&self.log, "propose");
            if !self.propose_for.contains(&finding.id) {
                return Ok(None);
            }
            Ok(Some(ProposedFix {
                finding_id: finding.id.clone(),
                file: finding.file.clone(),
                description: "parameterized the query".to_string(),
                patched_source: "query(sql, params)\n".to_string(),
            }))
        }
    }

    struct StubReviewer {
        log: CallLog,
        accept: Vec<String>,
    }

    #[async_trait]
    impl Reviewer for StubReviewer {
        async fn review(&self, _repo_path: &Path, fix: &ProposedFix) -> Result<ReviewVerdict> {
            log_call(&self.log, "review");
            if self.accept.contains(&fix.finding_id) {
                Ok(ReviewVerdict::Accepted)
            } else {
                Ok(ReviewVerdict::Rejected {
                    reason: "fix does not compile".to_string(),
                })
            }
        }
    }

    struct StubPublisher {
        log: CallLog,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Publisher for StubPublisher {
        async fn publish(
            &self,
            _repo_path: &Path,
            _repo_url: &str,
            _branch: &str,
            _fixes: &[ProposedFix],
        ) -> Result<String> {
            log_call(&self.log, "publish");
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok("https://github.com/acme/app/pull/7".to_string())
        }
    }

    struct Fixture {
        log: CallLog,
        findings: Vec<Finding>,
        fetch_fails: bool,
        scan_error: Option<fn() -> AppError>,
        degrade: Vec<String>,
        research_fails: bool,
        propose_for: Vec<String>,
        accept: Vec<String>,
        publish_delay: Option<Duration>,
        timeout: Duration,
        dry_run: bool,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
                findings: Vec::new(),
                fetch_fails: false,
                scan_error: None,
                degrade: Vec::new(),
                research_fails: false,
                propose_for: Vec::new(),
                accept: Vec::new(),
                publish_delay: None,
                timeout: Duration::from_secs(5),
                dry_run: false,
            }
        }
    }

    impl Fixture {
        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                Arc::new(StubFetcher {
                    log: Arc::clone(&self.log),
                    fail: self.fetch_fails,
                }),
                Arc::new(StubScanner {
                    log: Arc::clone(&self.log),
                    findings: self.findings.clone(),
                    error: self.scan_error,
                }),
                Arc::new(StubResearcher {
                    log: Arc::clone(&self.log),
                    degrade: self.degrade.clone(),
                    fail: self.research_fails,
                }),
                Arc::new(StubFixer {
                    log: Arc::clone(&self.log),
                    propose_for: self.propose_for.clone(),
                }),
                Arc::new(StubReviewer {
                    log: Arc::clone(&self.log),
                    accept: self.accept.clone(),
                }),
                Arc::new(StubPublisher {
                    log: Arc::clone(&self.log),
                    delay: self.publish_delay,
                }),
                self.timeout,
                self.dry_run,
            )
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    const REPO: &str = "https://github.com/acme/app";

    #[tokio::test]
    async fn test_zero_findings_is_a_successful_run() {
        let fixture = Fixture::default();
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Complete);
        assert!(record.vulnerabilities.is_empty());
        assert!(record.pull_request_url.is_none());
        assert!(record.summary_report.is_some());

        let report = interpret(&record);
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.vulnerabilities_found, 0);
        assert_eq!(report.fixes_applied, 0);
        assert!(report.pull_request_url.is_none());

        // Publisher never invoked
        assert!(!fixture.calls().contains(&"publish".to_string()));
    }

    #[tokio::test]
    async fn test_partial_fix_acceptance_still_publishes() {
        let fixture = Fixture {
            findings: vec![finding("f-1"), finding("f-2"), finding("f-3")],
            propose_for: vec!["f-1".to_string(), "f-2".to_string()],
            accept: vec!["f-1".to_string()],
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Complete);
        assert_eq!(record.vulnerabilities.len(), 3);
        assert_eq!(record.research_results.len(), 3);
        assert_eq!(record.fixes.len(), 2);
        assert_eq!(record.reviewed_fixes.len(), 1);
        assert!(record.pull_request_url.is_some());
        assert!(record.branch_name.as_deref().unwrap().starts_with("aegis/"));

        let report = interpret(&record);
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.vulnerabilities_found, 3);
        assert_eq!(report.fixes_applied, 1);
    }

    #[tokio::test]
    async fn test_reviewed_fixes_are_a_subset_of_fixes() {
        let fixture = Fixture {
            findings: vec![finding("f-1"), finding("f-2")],
            propose_for: vec!["f-1".to_string(), "f-2".to_string()],
            accept: vec!["f-2".to_string()],
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        let fix_ids: Vec<&str> = record.fixes.iter().map(|f| f.finding_id.as_str()).collect();
        for reviewed in &record.reviewed_fixes {
            assert!(fix_ids.contains(&reviewed.finding_id.as_str()));
        }
        assert!(record.reviewed_fixes.len() <= record.fixes.len());
    }

    #[tokio::test]
    async fn test_clone_failure_aborts_at_initialize() {
        let fixture = Fixture {
            fetch_fails: true,
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::SourceUnavailable));
        assert!(record.error_message.is_some());
        assert!(record.repo_path.is_none());
        assert!(record.vulnerabilities.is_empty());
        assert!(record.summary_report.is_none());

        let report = interpret(&record);
        assert_eq!(report.outcome, Outcome::Error);
        assert!(report.error_message.is_some());
        assert_eq!(report.vulnerabilities_found, 0);

        // Nothing past the fetch ran
        assert_eq!(fixture.calls(), vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_malformed_repo_url_aborts_without_fetching() {
        let fixture = Fixture::default();
        let record = fixture.pipeline().run("git@github.com:acme/app.git").await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::SourceUnavailable));
        assert!(fixture.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scanner_failure_aborts_before_research() {
        let fixture = Fixture {
            scan_error: Some(|| AppError::Scanner("malformed scanner output".to_string())),
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::ToolFailure));
        assert!(record.research_results.is_empty());
        assert_eq!(fixture.calls(), vec!["fetch", "scan"]);
    }

    #[tokio::test]
    async fn test_unanticipated_error_maps_to_internal() {
        let fixture = Fixture {
            scan_error: Some(|| AppError::Internal("stage panicked".to_string())),
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::Internal));
    }

    #[tokio::test]
    async fn test_unreachable_researcher_aborts_run() {
        let fixture = Fixture {
            findings: vec![finding("f-1")],
            research_fails: true,
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::DependencyUnavailable));
    }

    #[tokio::test]
    async fn test_degraded_research_does_not_abort() {
        let fixture = Fixture {
            findings: vec![finding("f-1"), finding("f-2")],
            degrade: vec!["f-1".to_string()],
            propose_for: vec!["f-2".to_string()],
            accept: vec!["f-2".to_string()],
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Complete);
        assert!(record.research_results["f-1"].degraded);
        assert!(!record.research_results["f-2"].degraded);
        assert_eq!(record.reviewed_fixes.len(), 1);
    }

    #[tokio::test]
    async fn test_publish_timeout_keeps_reviewed_fixes() {
        let fixture = Fixture {
            findings: vec![finding("f-1")],
            propose_for: vec!["f-1".to_string()],
            accept: vec!["f-1".to_string()],
            publish_delay: Some(Duration::from_millis(250)),
            timeout: Duration::from_millis(20),
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::DependencyTimeout));
        // The record still reflects the accepted fixes even though
        // publication did not occur.
        assert_eq!(record.reviewed_fixes.len(), 1);
        assert!(record.pull_request_url.is_none());
    }

    #[tokio::test]
    async fn test_no_accepted_fixes_skips_publication() {
        let fixture = Fixture {
            findings: vec![finding("f-1")],
            propose_for: vec!["f-1".to_string()],
            // reviewer rejects everything
            accept: Vec::new(),
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Complete);
        assert!(record.pull_request_url.is_none());
        assert!(record.branch_name.is_none());
        assert!(!fixture.calls().contains(&"publish".to_string()));

        let report = interpret(&record);
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.fixes_applied, 0);
    }

    #[tokio::test]
    async fn test_dry_run_never_publishes() {
        let fixture = Fixture {
            findings: vec![finding("f-1")],
            propose_for: vec!["f-1".to_string()],
            accept: vec!["f-1".to_string()],
            dry_run: true,
            ..Fixture::default()
        };
        let record = fixture.pipeline().run(REPO).await;

        assert_eq!(record.current_stage, Stage::Complete);
        assert!(record.pull_request_url.is_none());
        assert!(!fixture.calls().contains(&"publish".to_string()));
    }

    #[tokio::test]
    async fn test_collaborators_run_in_stage_order() {
        let fixture = Fixture {
            findings: vec![finding("f-1"), finding("f-2")],
            propose_for: vec!["f-1".to_string(), "f-2".to_string()],
            accept: vec!["f-1".to_string()],
            ..Fixture::default()
        };
        fixture.pipeline().run(REPO).await;

        assert_eq!(
            fixture.calls(),
            vec![
                "fetch", "scan", "research", "research", "propose", "propose", "review",
                "review", "publish",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_the_next_stage() {
        let fixture = Fixture {
            findings: vec![finding("f-1")],
            ..Fixture::default()
        };
        let checks = AtomicUsize::new(0);

        // First check (before INITIALIZE) passes, second cancels.
        let record = fixture
            .pipeline()
            .run_cancellable(REPO, || {
                let cancelled = checks.fetch_add(1, Ordering::SeqCst) >= 1;
                async move { cancelled }
            })
            .await;

        assert_eq!(record.current_stage, Stage::Error);
        assert_eq!(record.error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(fixture.calls(), vec!["fetch"]);
    }

    #[test]
    fn test_validate_repo_url() {
        assert!(validate_repo_url("https://github.com/acme/app").is_ok());
        assert!(validate_repo_url("").is_err());
        assert!(validate_repo_url("git@github.com:acme/app.git").is_err());
        assert!(validate_repo_url("https://").is_err());
        assert!(validate_repo_url("https://github.com").is_err());
    }
}
