//! Structured logging with viewer context.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use viewer_core::{InstanceId, ProductId, VariantId};

/// Log level for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "TRACE"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A structured log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Viewer instance the entry belongs to.
    pub instance_id: String,
    /// Product shown by the viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Variant shown when the entry was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Additional structured fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Milliseconds since the logger was created.
    pub elapsed_ms: u64,
}

impl LogEntry {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }

    /// Format as human-readable string.
    pub fn to_human(&self) -> String {
        let mut s = format!("[{}] {} {}", self.level, self.instance_id, self.message);

        if let Some(variant) = &self.variant_id {
            s.push_str(&format!(" ({})", variant));
        }

        if !self.fields.is_empty() {
            s.push_str(" | ");
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            s.push_str(&fields.join(" "));
        }

        s
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format (for log aggregation).
    #[default]
    Json,
    /// Human-readable format (for development).
    Human,
}

/// Structured logger bound to one viewer instance.
///
/// Entries are rendered in the configured format and emitted as `tracing`
/// events under the `viewer` target, so whichever subscriber the host
/// installs decides where they go.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance_id: InstanceId,
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    start_time: Instant,
    min_level: LogLevel,
    format: LogFormat,
}

impl StructuredLogger {
    /// Create a new logger for a viewer instance.
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            product_id: None,
            variant_id: None,
            start_time: Instant::now(),
            min_level: LogLevel::Debug,
            format: LogFormat::Json,
        }
    }

    /// Set the product.
    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Set minimum log level.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Record the variant currently shown.
    pub fn set_variant(&mut self, variant_id: VariantId) {
        self.variant_id = Some(variant_id);
    }

    /// Log at debug level.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, BTreeMap::new());
    }

    /// Log at info level.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, BTreeMap::new());
    }

    /// Log at warn level.
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, BTreeMap::new());
    }

    /// Log at error level.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, BTreeMap::new());
    }

    /// Build the entry, or `None` if it is below the minimum level.
    pub fn entry(
        &self,
        level: LogLevel,
        message: &str,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> Option<LogEntry> {
        if level < self.min_level {
            return None;
        }

        Some(LogEntry {
            level,
            message: message.to_string(),
            instance_id: self.instance_id.to_string(),
            product_id: self.product_id.as_ref().map(ToString::to_string),
            variant_id: self.variant_id.as_ref().map(ToString::to_string),
            fields,
            elapsed_ms: self.start_time.elapsed().as_millis() as u64,
        })
    }

    fn log(&self, level: LogLevel, message: &str, fields: BTreeMap<String, serde_json::Value>) {
        let Some(entry) = self.entry(level, message, fields) else {
            return;
        };

        let output = match self.format {
            LogFormat::Json => entry.to_json(),
            LogFormat::Human => entry.to_human(),
        };

        match level {
            LogLevel::Trace => tracing::trace!(target: "viewer", "{}", output),
            LogLevel::Debug => tracing::debug!(target: "viewer", "{}", output),
            LogLevel::Info => tracing::info!(target: "viewer", "{}", output),
            LogLevel::Warn => tracing::warn!(target: "viewer", "{}", output),
            LogLevel::Error => tracing::error!(target: "viewer", "{}", output),
        }
    }

    /// Get the instance id.
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Time since the logger was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Builder for log entries with fluent API.
pub struct LogBuilder<'a> {
    logger: &'a StructuredLogger,
    level: LogLevel,
    message: String,
    fields: BTreeMap<String, serde_json::Value>,
}

impl<'a> LogBuilder<'a> {
    /// Create a new log builder.
    pub fn new(logger: &'a StructuredLogger, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            logger,
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a string field.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.to_string(), serde_json::json!(value.into()));
        self
    }

    /// Add an integer field.
    pub fn field_u64(mut self, key: &str, value: u64) -> Self {
        self.fields.insert(key.to_string(), serde_json::json!(value));
        self
    }

    /// Add a boolean field.
    pub fn field_bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), serde_json::json!(value));
        self
    }

    /// Add a duration field (in milliseconds).
    pub fn duration_ms(mut self, key: &str, duration: Duration) -> Self {
        self.fields
            .insert(key.to_string(), serde_json::json!(duration.as_millis() as u64));
        self
    }

    /// Build the entry without emitting it.
    pub fn build(self) -> Option<LogEntry> {
        self.logger.entry(self.level, &self.message, self.fields)
    }

    /// Emit the log entry.
    pub fn emit(self) {
        self.logger.log(self.level, &self.message, self.fields);
    }
}

impl StructuredLogger {
    /// Start building an info log entry.
    pub fn info_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Info, message)
    }

    /// Start building a warn log entry.
    pub fn warn_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Warn, message)
    }

    /// Start building an error log entry.
    pub fn error_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Error, message)
    }

    /// Start building a debug log entry.
    pub fn debug_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Debug, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> StructuredLogger {
        let mut logger = StructuredLogger::new(InstanceId::new("rings#0"))
            .with_product(ProductId::new("rings"));
        logger.set_variant(VariantId::new("walnut"));
        logger
    }

    #[test]
    fn test_entry_carries_viewer_context() {
        let entry = logger()
            .info_builder("viewer ready")
            .duration_ms("time_to_ready_ms", Duration::from_millis(420))
            .field_u64("attempt", 1)
            .build()
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(json["instance_id"], "rings#0");
        assert_eq!(json["product_id"], "rings");
        assert_eq!(json["variant_id"], "walnut");
        assert_eq!(json["time_to_ready_ms"], 420);
        assert_eq!(json["level"], "info");
    }

    #[test]
    fn test_min_level_filters() {
        let logger = logger().with_min_level(LogLevel::Warn);
        assert!(logger.debug_builder("tick").build().is_none());
        assert!(logger.error_builder("gone").build().is_some());
    }

    #[test]
    fn test_human_format() {
        let entry = logger()
            .warn_builder("variant switch failed")
            .field("reason", "timeout")
            .build()
            .unwrap();
        assert_eq!(
            entry.to_human(),
            r#"[WARN] rings#0 variant switch failed (walnut) | reason="timeout""#
        );
    }
}
