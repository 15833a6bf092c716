use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{EventRecord, JsonLogger, LogLevel, LogRecord, MemorySink};

use crate::config::TelemetryConfig;

/// Builder for preference telemetry sinks.
pub struct PreferenceTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    event_path: Option<PathBuf>,
    memory_events: Option<Arc<MemorySink<EventRecord>>>,
    min_level: LogLevel,
}

impl PreferenceTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            event_path: None,
            memory_events: None,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sets the JSON-lines event path.
    #[must_use]
    pub fn event_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_path = Some(path.into());
        self
    }

    /// Drops log records below this level. Events are not affected.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Mirrors events into an in-memory sink.
    #[must_use]
    pub fn memory_events(mut self, sink: Arc<MemorySink<EventRecord>>) -> Self {
        self.memory_events = Some(sink);
        self
    }

    /// Applies the paths and minimum level from configuration.
    #[must_use]
    pub fn from_config(mut self, config: &TelemetryConfig) -> Self {
        self.log_path.clone_from(&config.log_path);
        self.event_path.clone_from(&config.event_path);
        self.min_level = config.min_level;
        self
    }

    /// Opens the sinks and builds the handle.
    pub fn build(self) -> Result<PreferenceTelemetry> {
        let logger = self.log_path.map(JsonLogger::new).transpose()?;
        let events = self.event_path.map(JsonLogger::new).transpose()?;
        Ok(PreferenceTelemetry {
            inner: Arc::new(TelemetryInner {
                component: self.component,
                logger,
                events,
                memory_events: self.memory_events,
                min_level: self.min_level,
            }),
        })
    }
}

/// Cloneable telemetry handle.
#[derive(Clone)]
pub struct PreferenceTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for PreferenceTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceTelemetry")
            .field("component", &self.inner.component)
            .finish_non_exhaustive()
    }
}

struct TelemetryInner {
    component: String,
    logger: Option<JsonLogger>,
    events: Option<JsonLogger>,
    memory_events: Option<Arc<MemorySink<EventRecord>>>,
    min_level: LogLevel,
}

impl PreferenceTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> PreferenceTelemetryBuilder {
        PreferenceTelemetryBuilder::new(component)
    }

    /// Writes a structured log line unless `level` is below the minimum.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if level < self.inner.min_level {
            return Ok(());
        }
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.component, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits a domain event.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if self.inner.events.is_none() && self.inner.memory_events.is_none() {
            return Ok(());
        }
        let record = EventRecord::new(&self.inner.component, event_type, payload);
        if let Some(sink) = &self.inner.memory_events {
            sink.push(record.clone());
        }
        if let Some(events) = &self.inner.events {
            events.event(&record)?;
        }
        Ok(())
    }
}
