//! Orchestrator: run the browser runner against the test bundle and record the outcome

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::artifacts::{self, Artifacts};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::summary::{failure_message, parse_summary, Summary};

/// Prefix a successful upstream compile step reports.
pub const COMPILE_SUCCESS_PREFIX: &str = "Successfully";

/// Whether the upstream compile step reported success
pub fn compile_succeeded(compile_result: &str) -> bool {
    compile_result.starts_with(COMPILE_SUCCESS_PREFIX)
}

/// Starts the browser runner and collects what it printed.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Run `runner` against `bundle`, returning stdout followed by stderr
    async fn launch(&self, runner: &Path, bundle: &Path) -> HarnessResult<String>;
}

/// Launches the runner as a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    /// Interpreter for the runner entry point, e.g. `phantomjs`
    program: Option<String>,
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(program: Option<String>, timeout: Option<Duration>) -> Self {
        Self { program, timeout }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.launcher.clone(), config.run_timeout())
    }

    fn command(&self, runner: &Path, bundle: &Path) -> (String, Command) {
        match &self.program {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(runner).arg(bundle);
                (program.clone(), cmd)
            }
            None => {
                let mut cmd = Command::new(runner);
                cmd.arg(bundle);
                (runner.display().to_string(), cmd)
            }
        }
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, runner: &Path, bundle: &Path) -> HarnessResult<String> {
        let (program, mut cmd) = self.command(runner, bundle);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Launching {} with {}", program, bundle.display());

        let child = cmd.spawn().map_err(|e| HarnessError::Launch {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| HarnessError::Timeout {
                    what: program.clone(),
                    seconds: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        debug!("{} exited with {}", program, output.status);

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

/// Terminal state of one orchestrated run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The upstream compile step did not succeed; no tests ran
    CompileFailed,
    /// The runner output carried no summary line
    ScriptFailed,
    TestsFailed { count: u64 },
    Passed,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Text written to the message file, `None` when the file is removed
    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::CompileFailed => Some("Compile failed!".to_string()),
            Outcome::ScriptFailed => Some("Script failed!".to_string()),
            Outcome::TestsFailed { count } => failure_message(*count),
            Outcome::Passed => None,
        }
    }
}

/// Structured record of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub summary: Option<Summary>,
    pub message: Option<String>,
    pub duration_ms: u64,
    /// Raw runner output, already persisted in the dump file
    #[serde(skip)]
    pub output: String,
}

/// Drives a single test run
pub struct Orchestrator<L = ProcessLauncher> {
    config: HarnessConfig,
    artifacts: Artifacts,
    launcher: L,
}

impl Orchestrator<ProcessLauncher> {
    pub fn new(config: HarnessConfig) -> Self {
        let launcher = ProcessLauncher::from_config(&config);
        Self::with_launcher(config, launcher)
    }
}

impl<L: Launcher> Orchestrator<L> {
    pub fn with_launcher(config: HarnessConfig, launcher: L) -> Self {
        let artifacts = Artifacts::new(config.dump_path.clone(), config.message_path.clone());
        Self {
            config,
            artifacts,
            launcher,
        }
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Run the tests if `compile_result` reports success, then write both artifacts
    pub async fn run(&self, compile_result: &str) -> HarnessResult<RunSummary> {
        let start = Instant::now();

        if !compile_succeeded(compile_result) {
            warn!("Compile step did not succeed, skipping tests");
            let outcome = Outcome::CompileFailed;
            let message = outcome.message();
            let text = message.clone().unwrap_or_default();
            self.artifacts.write_dump(&text)?;
            self.artifacts.write_message(&text)?;
            return Ok(RunSummary {
                outcome,
                summary: None,
                message,
                duration_ms: start.elapsed().as_millis() as u64,
                output: text,
            });
        }

        info!("Running tests...");

        let output = match self
            .launcher
            .launch(&self.config.runner_path, &self.config.bundle_path)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!("Runner did not complete: {}", e);
                format!("{}\n", e)
            }
        };
        self.artifacts.write_dump(&output)?;

        let summary = parse_summary(&output);
        let outcome = match summary {
            Some(s) if s.failure_count() == 0 => Outcome::Passed,
            Some(s) => Outcome::TestsFailed {
                count: s.failure_count(),
            },
            None => Outcome::ScriptFailed,
        };

        let message = outcome.message();
        match &message {
            Some(text) => self.artifacts.write_message(text)?,
            None => self.artifacts.clear_message()?,
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Test run finished: {:?} ({} ms)", outcome, duration_ms);

        Ok(RunSummary {
            outcome,
            summary,
            message,
            duration_ms,
            output,
        })
    }

    /// Write `summary` as JSON
    pub fn write_summary(&self, summary: &RunSummary, path: &Path) -> HarnessResult<PathBuf> {
        let json = serde_json::to_string_pretty(summary)?;
        artifacts::write_file(path, &json)?;

        info!("Summary written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}
