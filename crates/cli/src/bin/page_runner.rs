//! page-runner - load a page headlessly and run its test entry point
//!
//! Exit codes: 0 when the entry point reports success, 1 otherwise.

use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error};

use pagerun_cli::output;
use pagerun_harness::{Browser, BrowserRunner, HarnessResult, PlaywrightDriver, RunnerConfig};

#[derive(Parser, Debug)]
#[command(name = "page-runner")]
#[command(author, version, about = "Load a page in a headless browser and run its tests")]
struct Args {
    /// Page to load: a URL, an HTML file, or a JavaScript test bundle
    url: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "PAGERUN_RUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Global expression that runs every test and returns true on success
    #[arg(long, env = "PAGERUN_ENTRY")]
    entry: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "PAGERUN_BROWSER")]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Node.js binary hosting Playwright
    #[arg(long, env = "PAGERUN_NODE")]
    node: Option<String>,

    /// Seconds to wait for the page to load
    #[arg(long)]
    load_timeout_secs: Option<u64>,

    /// Seconds to wait for the test entry point to return
    #[arg(long)]
    eval_timeout_secs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn runner_config(&self) -> HarnessResult<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load(path)?,
            None => RunnerConfig::default(),
        };

        if let Some(entry) = &self.entry {
            config.entry = entry.clone();
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if self.headed {
            config.headless = false;
        }
        if let Some(node) = &self.node {
            config.node_binary = node.clone();
        }
        if let Some(secs) = self.load_timeout_secs {
            config.load_timeout_secs = secs;
        }
        if let Some(secs) = self.eval_timeout_secs {
            config.eval_timeout_secs = secs;
        }
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();
    pagerun_cli::init_logging(args.verbose);

    let Some(url) = args.url.clone() else {
        output::print_error("Expected a target URL parameter.");
        std::process::exit(1);
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            output::print_error(&format!("Failed to create tokio runtime: {}", e));
            std::process::exit(1);
        }
    };

    match rt.block_on(async_main(&args, &url)) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            output::print_error(&format!("Error: {}", e));
            std::process::exit(1);
        }
    }
}

async fn async_main(args: &Args, url: &str) -> HarnessResult<i32> {
    let config = args.runner_config()?;
    debug!("Configuration: {:?}", config);

    let (console_tx, console_rx) = mpsc::unbounded_channel();
    let driver = PlaywrightDriver::launch(&config, console_tx).await?;

    let mut runner = BrowserRunner::new(driver, console_rx, std::io::stdout(), config);
    let outcome = runner.run(url).await?;

    debug!("Runner finished: {:?}", outcome);
    Ok(outcome.exit_code())
}
