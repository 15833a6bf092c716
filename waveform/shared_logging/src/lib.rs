#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Structured JSON-lines logging and event records shared by the waveform crates.

use std::{
    collections::VecDeque,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Log severity level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    #[default]
    Debug,
    /// Informational events.
    Info,
    /// Warning indicator.
    Warn,
    /// Error indicator.
    Error,
}

/// Structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in ISO8601.
    pub timestamp: DateTime<Utc>,
    /// Component emitting the log (e.g. `preference`).
    pub component: String,
    /// Severity.
    pub level: LogLevel,
    /// Short machine-friendly message.
    pub message: String,
    /// Structured fields attached to the record.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}

impl LogRecord {
    /// Creates a record with empty metadata.
    #[must_use]
    pub fn new(component: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            component: component.into(),
            level,
            message: message.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attaches the fields of a JSON object as metadata. Non-object values are ignored.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let Value::Object(fields) = metadata {
            self.metadata = fields;
        }
        self
    }
}

/// Domain event (e.g. `preference.model.trained`) with a JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Component producing the event.
    pub source: String,
    /// Dotted event type.
    pub event_type: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: Value,
}

impl EventRecord {
    /// Creates an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Thread-safe writer appending one JSON document per line.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    writer: Mutex<File>,
}

impl JsonLogger {
    /// Creates or opens a logger at the desired path, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log dir {}", parent.display()))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Writes a log record as a JSON line.
    pub fn log(&self, record: &LogRecord) -> Result<()> {
        self.append(record)
    }

    /// Writes an event record as a JSON line.
    pub fn event(&self, record: &EventRecord) -> Result<()> {
        self.append(record)
    }

    fn append<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Returns the underlying file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Bounded in-memory buffer of records, oldest dropped first.
#[derive(Debug)]
pub struct MemorySink<T> {
    capacity: usize,
    records: Mutex<VecDeque<T>>,
}

impl<T: Clone> MemorySink<T> {
    /// Creates a sink retaining at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Pushes a record, evicting the oldest one when full.
    pub fn push(&self, record: T) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot of retained records, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.records.lock().iter().cloned().collect()
    }
}
