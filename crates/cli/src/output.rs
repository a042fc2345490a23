//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;

use pagerun_harness::{Outcome, RunSummary};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable status lines
    #[default]
    Plain,
    /// JSON run summary
    Json,
}

/// Print the final status of an orchestrated run
pub fn print_run(run: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(run).unwrap_or_default());
        }
        OutputFormat::Plain => match &run.outcome {
            Outcome::Passed => println!("{}", "Tests passed!".green()),
            Outcome::TestsFailed { .. } => println!("{} {}", "Tests failed:".red(), run.output),
            Outcome::ScriptFailed | Outcome::CompileFailed => {
                if let Some(message) = &run.message {
                    print_error(message);
                }
            }
        },
    }
}

/// Print a progress line
pub fn print_status(message: &str) {
    println!("{}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

