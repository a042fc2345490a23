//! Playwright browser automation
//!
//! A small Playwright driver script runs under node and talks to us over
//! newline-delimited JSON: commands on its stdin, events on its stdout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::driver::{LoadStatus, PageDriver};
use crate::error::{HarnessError, HarnessResult};

const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(HarnessError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// What the runner was asked to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTarget {
    /// Navigable URL
    Url(String),
    /// Script bundle injected into a blank page
    Script(PathBuf),
}

impl PageTarget {
    /// Classify `target`, resolving bare paths against `cwd`
    pub fn resolve(target: &str, cwd: &Path) -> Self {
        if target.contains("://") || target.starts_with("about:") || target.starts_with("data:") {
            return PageTarget::Url(target.to_string());
        }

        let path = cwd.join(target);
        if path.extension().map(|ext| ext == "js").unwrap_or(false) {
            PageTarget::Script(path)
        } else {
            PageTarget::Url(format!("file://{}", path.display()))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Open { url: &'a str },
    OpenScript { path: &'a Path },
    Evaluate { expression: &'a str },
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum DriverEvent {
    Console { text: String },
    Load { status: String, reason: Option<String> },
    Result { value: Option<Value> },
    Error { message: String },
}

/// Page driver backed by a node + Playwright child process
pub struct PlaywrightDriver {
    child: Child,
    stdin: Option<ChildStdin>,
    events: mpsc::UnboundedReceiver<DriverEvent>,
}

impl PlaywrightDriver {
    /// Start the browser; page console messages are sent to `console`
    pub async fn launch(
        config: &RunnerConfig,
        console: mpsc::UnboundedSender<String>,
    ) -> HarnessResult<Self> {
        Self::check_node_installed(&config.node_binary).await?;

        let script = build_script(config.browser, config.headless);

        info!("Launching {} (headless: {})", config.browser.as_str(), config.headless);

        // `-e` resolves `require('playwright')` from the working directory.
        let mut child = Command::new(&config.node_binary)
            .arg("-e")
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarnessError::Launch {
                program: config.node_binary.clone(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::Driver("driver stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HarnessError::Driver("driver stderr not captured".to_string()))?;

        let (events_tx, events) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<DriverEvent>(&line) {
                    Ok(DriverEvent::Console { text }) => {
                        let _ = console.send(text);
                    }
                    Ok(event) => {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(_) => debug!("driver: {}", line),
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("driver stderr: {}", line);
            }
        });

        Ok(Self {
            child,
            stdin,
            events,
        })
    }

    async fn check_node_installed(node: &str) -> HarnessResult<()> {
        let status = Command::new(node)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::NodeNotFound),
        }
    }

    async fn send(&mut self, command: &DriverCommand<'_>) -> HarnessResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| HarnessError::Driver("driver is closed".to_string()))?;

        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn next_event(&mut self) -> HarnessResult<DriverEvent> {
        self.events
            .recv()
            .await
            .ok_or_else(|| HarnessError::Driver("driver exited unexpectedly".to_string()))
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn open(&mut self, url: &str) -> HarnessResult<LoadStatus> {
        let cwd = std::env::current_dir()?;
        let target = PageTarget::resolve(url, &cwd);
        debug!("Opening {:?}", target);

        match &target {
            PageTarget::Url(url) => self.send(&DriverCommand::Open { url }).await?,
            PageTarget::Script(path) => self.send(&DriverCommand::OpenScript { path }).await?,
        }

        match self.next_event().await? {
            DriverEvent::Load { status, .. } if status == "success" => Ok(LoadStatus::Success),
            DriverEvent::Load { status, reason } => Ok(LoadStatus::Fail(reason.unwrap_or(status))),
            DriverEvent::Error { message } => Err(HarnessError::Driver(message)),
            other => Err(HarnessError::Driver(format!("unexpected event: {:?}", other))),
        }
    }

    async fn evaluate(&mut self, expression: &str) -> HarnessResult<Value> {
        self.send(&DriverCommand::Evaluate { expression }).await?;

        match self.next_event().await? {
            DriverEvent::Result { value } => Ok(value.unwrap_or(Value::Null)),
            DriverEvent::Error { message } => Err(HarnessError::Driver(message)),
            other => Err(HarnessError::Driver(format!("unexpected event: {:?}", other))),
        }
    }

    async fn close(&mut self) -> HarnessResult<()> {
        if self.stdin.is_some() {
            // The driver may already be gone; killing below covers that.
            let _ = self.send(&DriverCommand::Close).await;
            self.stdin = None;
        }

        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("driver exited with {}", status);
            }
            Err(_) => {
                warn!("driver did not exit within {}s, killing it", CLOSE_GRACE.as_secs());
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

/// Build the node driver script for `browser`
pub fn build_script(browser: Browser, headless: bool) -> String {
    format!(
        r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const readline = require('readline');

const emit = (event) => process.stdout.write(JSON.stringify(event) + '\n');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const page = await browser.newPage();
  page.on('console', (msg) => emit({{ event: 'console', text: msg.text() }}));

  const commands = readline.createInterface({{ input: process.stdin }});
  for await (const line of commands) {{
    let command;
    try {{
      command = JSON.parse(line);
    }} catch (error) {{
      emit({{ event: 'error', message: 'malformed command: ' + line }});
      continue;
    }}

    if (command.cmd === 'close') break;

    try {{
      if (command.cmd === 'open') {{
        try {{
          await page.goto(command.url, {{ waitUntil: 'load', timeout: 0 }});
          emit({{ event: 'load', status: 'success' }});
        }} catch (error) {{
          emit({{ event: 'load', status: 'fail', reason: error.message }});
        }}
      }} else if (command.cmd === 'open_script') {{
        try {{
          await page.goto('about:blank');
          await page.addScriptTag({{ path: command.path }});
          emit({{ event: 'load', status: 'success' }});
        }} catch (error) {{
          emit({{ event: 'load', status: 'fail', reason: error.message }});
        }}
      }} else if (command.cmd === 'evaluate') {{
        const value = await page.evaluate((expression) => (0, eval)(expression), command.expression);
        emit({{ event: 'result', value: value === undefined ? null : value }});
      }} else {{
        emit({{ event: 'error', message: 'unknown command: ' + command.cmd }});
      }}
    }} catch (error) {{
      emit({{ event: 'error', message: error.message }});
    }}
  }}

  await browser.close();
}})().catch((error) => {{
  emit({{ event: 'error', message: error.message }});
  process.exit(1);
}});
"#,
        browser = browser.as_str(),
        headless = headless,
    )
}
