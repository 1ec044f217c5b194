//! JSON record encoding
//!
//! Every entry becomes exactly one line of JSON. Field order is fixed:
//! timestamp, level, logger name, caller, message, context fields, then the
//! stack trace when one was captured.

use super::error::Result;
use super::log_context::{FieldValue, LogContext};
use super::log_entry::LogEntry;
use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// How the timestamp field is rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Local time with milliseconds and offset: `2025-01-08T18:30:45.123+0800`
    #[default]
    Iso8601,

    /// RFC 3339: `2025-01-08T18:30:45.123456+08:00`
    Rfc3339,

    /// Milliseconds since the Unix epoch, written as a number
    UnixMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Local>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }
}

/// Field names and encoding choices for records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub line_ending: String,
    pub timestamp_format: TimestampFormat,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            time_key: "@timestamp".to_string(),
            level_key: "level".to_string(),
            name_key: "app".to_string(),
            caller_key: "caller".to_string(),
            message_key: "msg".to_string(),
            stacktrace_key: "stacktrace".to_string(),
            line_ending: "\n".to_string(),
            timestamp_format: TimestampFormat::Iso8601,
        }
    }
}

/// Serializes entries into single-line JSON objects
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    config: EncoderConfig,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode an entry with the logger's fields, including the line ending
    pub fn encode(&self, entry: &LogEntry, fields: &LogContext) -> Result<Vec<u8>> {
        let view = RecordView {
            config: &self.config,
            entry,
            fields,
        };
        let mut buf = serde_json::to_vec(&view)?;
        buf.extend_from_slice(self.config.line_ending.as_bytes());
        Ok(buf)
    }
}

struct RecordView<'a> {
    config: &'a EncoderConfig,
    entry: &'a LogEntry,
    fields: &'a LogContext,
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let cfg = self.config;
        let entry = self.entry;
        let mut map = serializer.serialize_map(None)?;

        match cfg.timestamp_format {
            TimestampFormat::UnixMillis => {
                map.serialize_entry(&cfg.time_key, &entry.timestamp.timestamp_millis())?
            }
            ref format => map.serialize_entry(&cfg.time_key, &format.format(&entry.timestamp))?,
        }
        map.serialize_entry(&cfg.level_key, entry.level.to_str())?;
        if let Some(ref name) = entry.logger_name {
            map.serialize_entry(&cfg.name_key, name)?;
        }
        if let Some(ref caller) = entry.caller {
            map.serialize_entry(&cfg.caller_key, &caller.short())?;
        }
        map.serialize_entry(&cfg.message_key, &entry.message)?;

        for (key, value) in self.fields.iter() {
            match value {
                // Non-finite floats have no JSON form
                FieldValue::Float(f) if !f.is_finite() => {
                    map.serialize_entry(key, &f.to_string())?
                }
                _ => map.serialize_entry(key, value)?,
            }
        }

        if let Some(ref stack) = entry.stacktrace {
            map.serialize_entry(&cfg.stacktrace_key, stack)?;
        }
        map.end()
    }
}
