//! Result artifacts: the raw output dump and the failure message file

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::HarnessResult;

/// Paths of the two files a run leaves behind
#[derive(Debug, Clone)]
pub struct Artifacts {
    dump_path: PathBuf,
    message_path: PathBuf,
}

impl Artifacts {
    pub fn new(dump_path: impl Into<PathBuf>, message_path: impl Into<PathBuf>) -> Self {
        Self {
            dump_path: dump_path.into(),
            message_path: message_path.into(),
        }
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    pub fn message_path(&self) -> &Path {
        &self.message_path
    }

    /// Overwrite the dump file with `text`
    pub fn write_dump(&self, text: &str) -> HarnessResult<()> {
        write_file(&self.dump_path, text)
    }

    /// Overwrite the message file with `text`
    pub fn write_message(&self, text: &str) -> HarnessResult<()> {
        write_file(&self.message_path, text)
    }

    /// Remove the message file so no stale failure lingers
    pub fn clear_message(&self) -> HarnessResult<()> {
        match std::fs::remove_file(&self.message_path) {
            Ok(()) => {
                debug!("Removed {}", self.message_path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `text` to `path`, creating missing parent directories
pub(crate) fn write_file(path: &Path, text: &str) -> HarnessResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text)?;
    debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}
