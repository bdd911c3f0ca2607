//! Log sink - a shared writer receiving subprocess output and progress lines

use crate::core::PipelineError;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// File holding the overall exit status of a logged run
pub const STATUS_FILE: &str = "pipeline.status";

/// `<dir>/<step>.<ext>`
pub fn step_log_path(dir: &Path, step: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", step, ext))
}

/// Record `Pipeline exit code: <code>` in `<dir>/pipeline.status`
pub fn write_status(dir: &Path, code: i32) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(STATUS_FILE), format!("Pipeline exit code: {}\n", code))
}

/// Write the exit code carried by `result` to `pipeline.status`; `-1` when
/// the failure has none. Write failures are logged, never propagated.
pub fn record_status<T>(dir: &Path, result: &Result<T, PipelineError>) {
    let code = match result {
        Ok(_) => 0,
        Err(e) => e.exit_code().unwrap_or(-1),
    };
    if let Err(e) = write_status(dir, code) {
        warn!(
            "Failed to record exit code {} in {}: {}",
            code,
            dir.join(STATUS_FILE).display(),
            e
        );
    }
}

/// Cloneable handle to a writer shared by every step of a run
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Truncate or create `path` and log into it
    pub fn file(path: &Path) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }

    /// In-memory sink plus a handle for reading back what was written
    pub fn memory() -> (Self, MemoryLog) {
        let buffer = MemoryLog::default();
        (Self::new(buffer.clone()), buffer)
    }

    /// Append raw bytes. Failures are logged, never propagated.
    pub fn write_bytes(&self, data: &[u8]) {
        let mut writer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.write_all(data).and_then(|_| writer.flush()) {
            warn!("Failed to write to log sink: {}", e);
        }
    }

    /// Append one line of text
    pub fn line(&self, message: impl fmt::Display) {
        self.write_bytes(format!("{}\n", message).as_bytes());
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

/// Shared byte buffer usable as a log destination
#[derive(Clone, Default)]
pub struct MemoryLog {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryLog {
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for MemoryLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
