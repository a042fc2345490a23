//! Harness configuration

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HarnessResult;
use crate::playwright::Browser;

/// Expression evaluated in the page to run every test.
pub const DEFAULT_ENTRY: &str = "derive.runner.run_all_tests()";

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Browser runner entry point handed to the launcher
    pub runner_path: PathBuf,

    /// Compiled test bundle the runner loads
    pub bundle_path: PathBuf,

    /// Raw runner output is written here
    pub dump_path: PathBuf,

    /// Short failure message, removed when every test passes
    pub message_path: PathBuf,

    /// Program that runs `runner_path`; the runner is executed directly when unset
    pub launcher: Option<String>,

    /// Upper bound on the runner subprocess, unbounded when unset
    pub run_timeout_secs: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            runner_path: PathBuf::from("page-runner"),
            bundle_path: PathBuf::from("resources/public/test/js/test.js"),
            dump_path: PathBuf::from("target/test-results.txt"),
            message_path: default_message_path(),
            launcher: None,
            run_timeout_secs: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> HarnessResult<Self> {
        load_or_default(path)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> HarnessResult<T> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        Ok(T::default())
    }
}

/// `$HOME/tmp/testingmsg.txt`
pub fn default_message_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tmp")
        .join("testingmsg.txt")
}

/// Browser runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Global test-entry expression evaluated after the page loads
    pub entry: String,

    pub browser: Browser,

    pub headless: bool,

    /// Node.js binary used to host Playwright
    pub node_binary: String,

    pub load_timeout_secs: u64,

    pub eval_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
            browser: Browser::Chromium,
            headless: true,
            node_binary: "node".to_string(),
            load_timeout_secs: 30,
            eval_timeout_secs: 300,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> HarnessResult<Self> {
        load_or_default(path)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }
}
