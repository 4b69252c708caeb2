//! JSONL event log of relayed requests, mirrored to `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            request_id: None,
            message: message.into(),
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

struct Logger {
    writer: Option<BufWriter<File>>,
}

impl Logger {
    fn open(file_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
        })
    }

    fn write(&mut self, entry: &LogEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(entry) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }
}

/// Cheaply cloneable handle to the event log.
#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<Logger>>);

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Logger::open(file_path.as_ref())?))))
    }

    /// A logger that only forwards to `tracing`.
    pub fn disabled() -> Self {
        Self(Arc::new(Mutex::new(Logger { writer: None })))
    }

    pub fn log(&self, entry: LogEntry) {
        mirror_to_tracing(&entry);
        if let Ok(mut logger) = self.0.lock() {
            logger.write(&entry);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, component, message));
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, component, message));
    }

    /// Handle that stamps every entry with `request_id`.
    pub fn for_request(&self, request_id: impl Into<String>) -> RequestLogger {
        RequestLogger {
            inner: self.clone(),
            request_id: request_id.into(),
        }
    }
}

#[derive(Clone)]
pub struct RequestLogger {
    inner: SharedLogger,
    request_id: String,
}

impl RequestLogger {
    pub fn log(&self, level: LogLevel, component: &str, message: impl Into<String>) {
        self.inner
            .log(LogEntry::new(level, component, message).with_request_id(self.request_id.clone()));
    }

    pub fn info(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, component, message);
    }

    pub fn warn(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Warn, component, message);
    }
}

fn mirror_to_tracing(entry: &LogEntry) {
    let id = entry.request_id.as_deref().unwrap_or("-");
    match entry.level {
        LogLevel::Debug => {
            tracing::debug!(component = %entry.component, request_id = id, "{}", entry.message)
        }
        LogLevel::Info => {
            tracing::info!(component = %entry.component, request_id = id, "{}", entry.message)
        }
        LogLevel::Warn => {
            tracing::warn!(component = %entry.component, request_id = id, "{}", entry.message)
        }
        LogLevel::Error => {
            tracing::error!(component = %entry.component, request_id = id, "{}", entry.message)
        }
    }
}
