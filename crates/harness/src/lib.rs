//! pagerun test harness
//!
//! This crate drives a compiled page test bundle through a headless browser
//! and turns the result into a pair of artifacts:
//! - Runs the browser runner as a subprocess and captures its output
//! - Scrapes the `N failures, M errors` summary line
//! - Writes the raw output dump and a short failure message
//! - Drives the browser itself through a generated Playwright script
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Orchestrator (run-tests)                   │
//! │    ├── Launcher::launch(runner, bundle) -> output           │
//! │    ├── parse_summary(output) -> Option<Summary>             │
//! │    └── Artifacts { dump, message }                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 BrowserRunner (page-runner)                 │
//! │    Idle -> Loading -> LoadFailed                            │
//! │                    -> Loaded -> Evaluated -> Pass | Fail    │
//! │    └── PageDriver (Playwright over node, JSON lines)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod playwright;
pub mod runner;
pub mod summary;

pub use artifacts::Artifacts;
pub use config::{HarnessConfig, RunnerConfig};
pub use driver::{LoadStatus, PageDriver};
pub use error::{HarnessError, HarnessResult};
pub use orchestrator::{compile_succeeded, Launcher, Orchestrator, Outcome, ProcessLauncher, RunSummary};
pub use playwright::{Browser, PlaywrightDriver};
pub use runner::{BrowserRunner, RunnerOutcome};
pub use summary::{failure_message, parse_summary, Summary};

/// pagerun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
