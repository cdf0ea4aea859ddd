//! run-tests - browser-automation test runner
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use webcheck::cli::{print_report, print_test_list, RunStatus};
use webcheck::core::config::DriverKind;
use webcheck::{suites, Config, Runner};

/// Run the built-in end-to-end suites against a web app
#[derive(Parser, Debug)]
#[command(name = "run-tests")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only run tests whose name contains this pattern
    pattern: Option<String>,

    /// Per-test timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Origin that relative navigations resolve against
    #[arg(long)]
    base_url: Option<String>,

    /// Write one JSON object per test to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Number of tests to run concurrently
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Browser driver (agent-browser or memory)
    #[arg(long)]
    driver: Option<DriverKind>,

    /// Run in headed browser mode (visible window)
    #[arg(long)]
    headed: bool,

    /// Probe the base URL before running any test
    #[arg(long)]
    preflight: bool,

    /// List matching tests without running them
    #[arg(long)]
    list: bool,

    /// Config file (default: ~/.config/webcheck/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(args).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("error: {:#}", e);
            RunStatus::Infrastructure.into()
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "webcheck=debug" } else { "webcheck=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<RunStatus> {
    // Build configuration
    let mut config = Config::load_from(args.config.as_deref()).context("loading configuration")?;

    // Apply CLI overrides
    if let Some(timeout) = args.timeout {
        config.runner.timeout_ms = timeout;
    }

    if let Some(ref base_url) = args.base_url {
        config.runner.base_url = base_url.clone();
    }

    if let Some(ref report) = args.report {
        config.runner.report_path = Some(report.clone());
    }

    if let Some(jobs) = args.jobs {
        config.runner.jobs = jobs;
    }

    if let Some(driver) = args.driver {
        config.browser.driver = driver;
    }

    if args.headed {
        config.browser.headed = true;
    }

    if args.preflight {
        config.runner.preflight = true;
    }

    config.validate()?;
    debug!(?config, "effective configuration");

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(RunStatus::Passed);
    }

    // Duplicate names abort here, before anything runs
    let registry = suites::builtin().context("registering built-in suites")?;

    if args.list {
        print_test_list(&registry, args.pattern.as_deref());
        return Ok(RunStatus::Passed);
    }

    let runner = Runner::from_config(&config)?;

    if config.runner.preflight {
        webcheck::preflight(&runner.settings().base_url, runner.settings().action_timeout)
            .await
            .context("preflight")?;
        info!(url = %runner.settings().base_url, "target reachable");
    }

    let report = runner.run_all(&registry, args.pattern.as_deref()).await;
    print_report(&report, runner.driver_name());

    if let Some(ref path) = config.runner.report_path {
        report
            .write_jsonl(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }

    Ok(RunStatus::from_report(&report))
}
