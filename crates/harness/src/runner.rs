//! Browser runner: load a page, run its test entry point, report pass or fail

use std::future::Future;
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::config::RunnerConfig;
use crate::driver::{is_truthy, LoadStatus, PageDriver};
use crate::error::HarnessResult;

/// Runner progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Loading,
    LoadFailed,
    Loaded,
    Evaluated,
    Pass,
    Fail,
}

/// How a runner invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerOutcome {
    LoadFailed,
    Passed,
    Failed,
}

impl RunnerOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerOutcome::Passed => 0,
            RunnerOutcome::LoadFailed | RunnerOutcome::Failed => 1,
        }
    }
}

/// Loads one page and evaluates its test entry expression.
///
/// Status lines and relayed console messages go to `out`.
pub struct BrowserRunner<D, W> {
    driver: D,
    console: mpsc::UnboundedReceiver<String>,
    out: W,
    config: RunnerConfig,
    state: RunnerState,
}

impl<D: PageDriver, W: Write> BrowserRunner<D, W> {
    pub fn new(
        driver: D,
        console: mpsc::UnboundedReceiver<String>,
        out: W,
        config: RunnerConfig,
    ) -> Self {
        Self {
            driver,
            console,
            out,
            config,
            state: RunnerState::Idle,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn transition(&mut self, next: RunnerState) {
        debug!("runner: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the page at `url` to completion
    pub async fn run(&mut self, url: &str) -> HarnessResult<RunnerOutcome> {
        writeln!(self.out, "Loading URL: {}", url)?;
        self.transition(RunnerState::Loading);

        let load_timeout = self.config.load_timeout();
        let loaded = tokio::time::timeout(
            load_timeout,
            relay(&mut self.console, &mut self.out, self.driver.open(url)),
        )
        .await;

        let status = match loaded {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!("Loading {} failed: {}", url, e);
                LoadStatus::Fail(e.to_string())
            }
            Err(_) => {
                warn!("Loading {} timed out after {}s", url, load_timeout.as_secs());
                LoadStatus::Fail("timeout".to_string())
            }
        };
        drain(&mut self.console, &mut self.out);

        if let LoadStatus::Fail(reason) = status {
            debug!("load status: {}", reason);
            self.transition(RunnerState::LoadFailed);
            writeln!(self.out, "Failed to open {}", url)?;
            self.shutdown().await;
            return Ok(RunnerOutcome::LoadFailed);
        }

        self.transition(RunnerState::Loaded);
        writeln!(self.out, "Opened {}", url)?;

        let eval_timeout = self.config.eval_timeout();
        let evaluated = tokio::time::timeout(
            eval_timeout,
            relay(
                &mut self.console,
                &mut self.out,
                self.driver.evaluate(&self.config.entry),
            ),
        )
        .await;
        self.transition(RunnerState::Evaluated);

        let passed = match evaluated {
            Ok(Ok(value)) => {
                debug!("{} returned {}", self.config.entry, value);
                is_truthy(&value)
            }
            Ok(Err(e)) => {
                error!("Evaluating {} failed: {}", self.config.entry, e);
                false
            }
            Err(_) => {
                warn!(
                    "Evaluating {} timed out after {}s",
                    self.config.entry,
                    eval_timeout.as_secs()
                );
                false
            }
        };
        drain(&mut self.console, &mut self.out);

        let outcome = if passed {
            self.transition(RunnerState::Pass);
            writeln!(self.out, "Browser runner: Success.")?;
            RunnerOutcome::Passed
        } else {
            self.transition(RunnerState::Fail);
            writeln!(self.out, "Browser runner: *** Tests failed! ***")?;
            RunnerOutcome::Failed
        };

        self.out.flush()?;
        self.shutdown().await;
        Ok(outcome)
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close browser: {}", e);
        }
        let _ = self.out.flush();
    }
}

/// Await `op` while echoing page console messages as they arrive
async fn relay<T, W: Write>(
    console: &mut mpsc::UnboundedReceiver<String>,
    out: &mut W,
    op: impl Future<Output = T>,
) -> T {
    tokio::pin!(op);
    loop {
        tokio::select! {
            biased;
            result = &mut op => return result,
            Some(message) = console.recv() => echo(out, &message),
        }
    }
}

/// Echo console messages that are already queued
fn drain<W: Write>(console: &mut mpsc::UnboundedReceiver<String>, out: &mut W) {
    while let Ok(message) = console.try_recv() {
        echo(out, &message);
    }
}

/// Console lines are best effort; a failed write never ends the run.
fn echo<W: Write>(out: &mut W, message: &str) {
    if let Err(e) = writeln!(out, "Console: {}", message) {
        warn!("Failed to relay console message: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted driver recording what the runner asked of it
    struct ScriptedDriver {
        load: Option<LoadStatus>,
        value: Option<Value>,
        console: mpsc::UnboundedSender<String>,
        calls: Arc<Mutex<Vec<String>>>,
        hang_on_open: bool,
        hang_on_evaluate: bool,
    }

    #[async_trait]
    impl PageDriver for ScriptedDriver {
        async fn open(&mut self, url: &str) -> HarnessResult<LoadStatus> {
            self.calls.lock().unwrap().push(format!("open {}", url));
            if self.hang_on_open {
                std::future::pending::<()>().await;
            }
            let _ = self.console.send("page booted".to_string());
            self.load
                .clone()
                .ok_or_else(|| HarnessError::Driver("browser crashed".to_string()))
        }

        async fn evaluate(&mut self, expression: &str) -> HarnessResult<Value> {
            self.calls.lock().unwrap().push(format!("evaluate {}", expression));
            if self.hang_on_evaluate {
                std::future::pending::<()>().await;
            }
            let _ = self.console.send("Ran 3 tests containing 7 assertions.".to_string());
            let _ = self.console.send("0 failures, 0 errors.".to_string());
            self.value
                .clone()
                .ok_or_else(|| HarnessError::Driver("ReferenceError: derive is not defined".to_string()))
        }

        async fn close(&mut self) -> HarnessResult<()> {
            self.calls.lock().unwrap().push("close".to_string());
            Ok(())
        }
    }

    fn scripted(
        load: Option<LoadStatus>,
        value: Option<Value>,
    ) -> (BrowserRunner<ScriptedDriver, Vec<u8>>, Arc<Mutex<Vec<String>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver {
            load,
            value,
            console: tx,
            calls: calls.clone(),
            hang_on_open: false,
            hang_on_evaluate: false,
        };
        (
            BrowserRunner::new(driver, rx, Vec::new(), RunnerConfig::default()),
            calls,
        )
    }

    fn text(runner: BrowserRunner<ScriptedDriver, Vec<u8>>) -> String {
        String::from_utf8(runner.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_passing_page() {
        let (mut runner, calls) = scripted(Some(LoadStatus::Success), Some(json!(true)));

        let outcome = runner.run("test.html").await.unwrap();

        assert_eq!(outcome, RunnerOutcome::Passed);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(runner.state(), RunnerState::Pass);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "open test.html".to_string(),
                "evaluate derive.runner.run_all_tests()".to_string(),
                "close".to_string(),
            ]
        );
        assert_eq!(
            text(runner),
            "Loading URL: test.html\n\
             Console: page booted\n\
             Opened test.html\n\
             Console: Ran 3 tests containing 7 assertions.\n\
             Console: 0 failures, 0 errors.\n\
             Browser runner: Success.\n"
        );
    }

    #[tokio::test]
    async fn test_failing_page() {
        let (mut runner, _) = scripted(Some(LoadStatus::Success), Some(json!(false)));

        let outcome = runner.run("test.html").await.unwrap();

        assert_eq!(outcome, RunnerOutcome::Failed);
        assert_eq!(outcome.exit_code(), 1);
        assert!(text(runner).ends_with("Browser runner: *** Tests failed! ***\n"));
    }

    #[tokio::test]
    async fn test_load_failure_never_evaluates() {
        let (mut runner, calls) = scripted(
            Some(LoadStatus::Fail("net::ERR_FILE_NOT_FOUND".to_string())),
            Some(json!(true)),
        );

        let outcome = runner.run("missing.html").await.unwrap();

        assert_eq!(outcome, RunnerOutcome::LoadFailed);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(runner.state(), RunnerState::LoadFailed);
        assert!(calls.lock().unwrap().iter().all(|c| !c.starts_with("evaluate")));
        assert!(text(runner).contains("Failed to open missing.html\n"));
    }

    #[tokio::test]
    async fn test_driver_error_during_load_is_load_failure() {
        let (mut runner, _) = scripted(None, Some(json!(true)));
        assert_eq!(runner.run("test.html").await.unwrap(), RunnerOutcome::LoadFailed);
    }

    #[tokio::test]
    async fn test_evaluation_error_fails() {
        let (mut runner, _) = scripted(Some(LoadStatus::Success), None);
        assert_eq!(runner.run("test.html").await.unwrap(), RunnerOutcome::Failed);
    }

    #[tokio::test]
    async fn test_non_boolean_result_uses_truthiness() {
        let (mut runner, _) = scripted(Some(LoadStatus::Success), Some(json!(null)));
        assert_eq!(runner.run("test.html").await.unwrap(), RunnerOutcome::Failed);

        let (mut runner, _) = scripted(Some(LoadStatus::Success), Some(json!(1)));
        assert_eq!(runner.run("test.html").await.unwrap(), RunnerOutcome::Passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_load_times_out() {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver {
            load: Some(LoadStatus::Success),
            value: Some(json!(true)),
            console: tx,
            calls: calls.clone(),
            hang_on_open: true,
            hang_on_evaluate: false,
        };
        let config = RunnerConfig {
            load_timeout_secs: 1,
            ..Default::default()
        };
        let mut runner = BrowserRunner::new(driver, rx, Vec::new(), config);

        let outcome = tokio::time::timeout(Duration::from_secs(10), runner.run("slow.html"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, RunnerOutcome::LoadFailed);
        assert_eq!(calls.lock().unwrap().last().map(String::as_str), Some("close"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_evaluation_times_out() {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver {
            load: Some(LoadStatus::Success),
            value: Some(json!(true)),
            console: tx,
            calls: calls.clone(),
            hang_on_open: false,
            hang_on_evaluate: true,
        };
        let config = RunnerConfig {
            eval_timeout_secs: 1,
            ..Default::default()
        };
        let mut runner = BrowserRunner::new(driver, rx, Vec::new(), config);

        let outcome = tokio::time::timeout(Duration::from_secs(10), runner.run("slow.html"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, RunnerOutcome::Failed);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(runner.state(), RunnerState::Fail);
        assert_eq!(calls.lock().unwrap().last().map(String::as_str), Some("close"));
        let out = String::from_utf8(runner.into_output()).unwrap();
        assert!(out.ends_with("Opened slow.html\nBrowser runner: *** Tests failed! ***\n"), "output was: {out}");
    }

    /// Writer that rejects console lines and accepts everything else
    #[derive(Default)]
    struct NoConsole(Vec<u8>);

    impl Write for NoConsole {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.starts_with(b"Console") {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "console closed"));
            }
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_console_write_failure_does_not_end_run() {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver {
            load: Some(LoadStatus::Success),
            value: Some(json!(true)),
            console: tx,
            calls: calls.clone(),
            hang_on_open: false,
            hang_on_evaluate: false,
        };
        let mut runner = BrowserRunner::new(driver, rx, NoConsole::default(), RunnerConfig::default());

        let outcome = runner.run("test.html").await.unwrap();

        assert_eq!(outcome, RunnerOutcome::Passed);
        assert_eq!(calls.lock().unwrap().last().map(String::as_str), Some("close"));
        let out = String::from_utf8(runner.into_output().0).unwrap();
        assert!(!out.contains("Console"), "output was: {out}");
        assert!(out.ends_with("Browser runner: Success.\n"), "output was: {out}");
    }
}
