//! run-tests - compile-aware test orchestration
//!
//! Runs the browser runner against the compiled test bundle and records the
//! result in a dump file and a short failure message file.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use pagerun_cli::output::{self, OutputFormat};
use pagerun_harness::{compile_succeeded, HarnessConfig, Orchestrator};

/// Run the page test bundle in a headless browser and record the result
#[derive(Parser)]
#[command(name = "run-tests")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Browser runner entry point
    runner_path: PathBuf,

    /// Output of the compile step; tests run only when it starts with "Successfully"
    #[arg(allow_hyphen_values = true)]
    compile_result: String,

    /// Configuration file
    #[arg(short, long, env = "PAGERUN_CONFIG", default_value = "pagerun.toml")]
    config: PathBuf,

    /// Compiled test bundle handed to the runner
    #[arg(long, env = "PAGERUN_BUNDLE")]
    bundle: Option<PathBuf>,

    /// File receiving the raw runner output
    #[arg(long, env = "PAGERUN_DUMP")]
    dump: Option<PathBuf>,

    /// File receiving the short failure message
    #[arg(long, env = "PAGERUN_MESSAGE")]
    message: Option<PathBuf>,

    /// Program used to run the runner entry point (e.g. phantomjs)
    #[arg(long, env = "PAGERUN_LAUNCHER")]
    launcher: Option<String>,

    /// Kill the runner after this many seconds
    #[arg(long, env = "PAGERUN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Also write a JSON run summary to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "plain")]
    format: OutputFormat,

    /// Exit non-zero when the run did not pass
    #[arg(long)]
    exit_code: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(&self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        config.runner_path = self.runner_path.clone();
        if let Some(bundle) = &self.bundle {
            config.bundle_path = bundle.clone();
        }
        if let Some(dump) = &self.dump {
            config.dump_path = dump.clone();
        }
        if let Some(message) = &self.message {
            config.message_path = message.clone();
        }
        if let Some(launcher) = &self.launcher {
            config.launcher = Some(launcher.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.run_timeout_secs = Some(secs);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pagerun_cli::init_logging(cli.verbose);

    debug!("run-tests v{}", pagerun_harness::VERSION);

    let config = cli.harness_config()?;
    debug!("Configuration: {:?}", config);

    let orchestrator = Orchestrator::new(config);

    if compile_succeeded(&cli.compile_result) && matches!(cli.format, OutputFormat::Plain) {
        output::print_status("Running tests...");
    }

    let run = orchestrator
        .run(&cli.compile_result)
        .await
        .context("Failed to record test results")?;

    output::print_run(&run, cli.format);

    if let Some(path) = &cli.summary_json {
        orchestrator
            .write_summary(&run, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if cli.exit_code && !run.outcome.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
