use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aegis::collab::types::VulnerabilityKind;
use aegis::collab::RepoFetcher;
use aegis::config::AppConfig;
use aegis::pipeline::{interpret, Outcome, RunReport};
use aegis::server::{create_router, AppState};
use aegis::shutdown::wait_for_shutdown;

#[derive(Parser)]
#[command(name = "aegis", about = "AI-powered security vulnerability remediation")]
struct Cli {
    /// Git repository URL to analyze and fix
    repo_url: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Run as HTTP server
    #[arg(long)]
    server: bool,

    /// List supported vulnerability types and exit
    #[arg(long)]
    list_vulnerabilities: bool,

    /// Run analysis without creating a pull request
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.list_vulnerabilities {
        print_vulnerability_types();
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.pipeline.dry_run = true;
    }

    if cli.server {
        return run_server(config).await;
    }

    let Some(repo_url) = cli.repo_url else {
        anyhow::bail!("repo_url is required when not running in server mode");
    };

    let state = AppState::new(config);

    tracing::info!(repo = %repo_url, "Starting security analysis");
    if state.config.pipeline.dry_run {
        tracing::info!("Running in dry-run mode - no pull request will be created");
    }

    let record = state.pipeline.run(&repo_url).await;
    if let Some(path) = &record.repo_path {
        let _ = state.workspaces.cleanup(path).await;
    }

    let report = interpret(&record);
    print_report(&report);

    Ok(match report.outcome {
        Outcome::Success => ExitCode::SUCCESS,
        Outcome::Error => ExitCode::from(1),
        Outcome::Incomplete => ExitCode::from(2),
    })
}

async fn run_server(config: AppConfig) -> anyhow::Result<ExitCode> {
    let state = Arc::new(AppState::new(config));

    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    Ok(ExitCode::SUCCESS)
}

fn print_vulnerability_types() {
    println!("Supported vulnerability types:");
    for kind in VulnerabilityKind::ALL {
        println!();
        println!("  {}", kind.display_name());
        println!("    CWE IDs: {}", kind.cwe_ids().join(", "));
        println!("    {}", kind.description());
    }
}

fn print_report(report: &RunReport) {
    println!();
    match report.outcome {
        Outcome::Success => {
            println!("Status: SUCCESS");
            println!("Vulnerabilities found: {}", report.vulnerabilities_found);
            println!("Fixes applied:         {}", report.fixes_applied);
            if let Some(url) = &report.pull_request_url {
                println!("Pull request:          {url}");
            }
            if let Some(summary) = &report.summary_report {
                println!();
                println!("{summary}");
            }
        }
        Outcome::Error => {
            println!("Status: ERROR");
            if let Some(error) = &report.error_message {
                println!("Error: {error}");
            }
        }
        Outcome::Incomplete => {
            println!("Status: INCOMPLETE");
            println!("Vulnerabilities found: {}", report.vulnerabilities_found);
            println!("Fixes applied:         {}", report.fixes_applied);
            if let Some(stage) = &report.final_stage {
                println!("Final stage:           {stage}");
            }
            if let Some(message) = &report.message {
                println!("{message}");
            }
        }
    }
}
