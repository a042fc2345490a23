//! Page driver abstraction used by the browser runner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarnessResult;

/// Status reported when a page finishes loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    Success,
    Fail(String),
}

impl LoadStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, LoadStatus::Success)
    }
}

/// A single headless page.
///
/// Console output from the page is delivered out of band, through the channel
/// the driver was created with.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait for the load to finish
    async fn open(&mut self, url: &str) -> HarnessResult<LoadStatus>;

    /// Evaluate `expression` in the page and return its value
    async fn evaluate(&mut self, expression: &str) -> HarnessResult<Value>;

    /// Shut the browser down
    async fn close(&mut self) -> HarnessResult<()>;
}

/// JavaScript truthiness of an evaluated value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
