//! Time and Logging Abstractions
//!
//! Injectable time source for the deferred-work dispatcher, and the sink used
//! to mirror orchestrator logs into the host logging pipeline.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::{error::Result, platform::PlatformSendSync};

/// Injectable time source.
///
/// The dispatcher only ever compares millisecond timestamps, so tests can
/// drive grace windows and start delays with a [`ManualClock`].
pub trait Clock: PlatformSendSync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, the unit the dispatcher schedules in.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock backed by `chrono::Utc::now`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    /// Move the clock forward, saturating at `i64::MAX`.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(delta))
            })
            .ok();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.unix_timestamp_millis())
            .single()
            .unwrap_or_default()
    }

    fn unix_timestamp_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Severity of a [`LogEntry`], ordered from `Trace` to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Structured log entry forwarded to a [`LoggerSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code
    pub target: String,
    pub message: String,
    /// Structured fields (`session`, `binding`, `container`...)
    pub fields: HashMap<String, String>,
    /// Name of the span the event was recorded in
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Host-side destination for orchestrator logs.
///
/// Forwards structured logs to host logging pipelines:
/// - **iOS**: OSLog
/// - **Android**: Logcat
/// - **Desktop**: Console, file logs, or system logging
#[async_trait::async_trait]
pub trait LoggerSink: PlatformSendSync {
    /// Hand one entry to the host logger.
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush buffered entries, if the sink buffers.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Logs below this level are filtered out before reaching the sink.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Sink printing one line per entry to stdout, fields sorted by key.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            let mut fields: Vec<_> = entry.fields.iter().collect();
            fields.sort();
            println!(
                "[{}] {} {}: {} {:?}",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.level.as_str().to_uppercase(),
                entry.target,
                entry.message,
                fields
            );
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.unix_timestamp_millis(), 1_000);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.unix_timestamp_millis(), 1_250);
        assert_eq!(clock.now().timestamp_millis(), 1_250);
    }

    #[test]
    fn test_manual_clock_saturates() {
        let clock = ManualClock::new(5);
        clock.advance(Duration::MAX);
        assert_eq!(clock.unix_timestamp_millis(), i64::MAX);

        clock.advance(Duration::from_millis(1));
        assert_eq!(clock.unix_timestamp_millis(), i64::MAX);
    }

    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        assert!(clock.unix_timestamp_millis() > 0);
    }

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Info, "scheduler", "binding activated")
            .with_field("binding", "b-1");

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "scheduler");
        assert_eq!(entry.fields.get("binding"), Some(&"b-1".to_string()));
        assert!(entry.span_id.is_none());
    }

    #[tokio::test]
    async fn test_console_logger() {
        let logger = ConsoleLogger::default();
        let entry = LogEntry::new(LogLevel::Warn, "test", "renderer missing");

        logger.log(entry).await.unwrap();
        assert_eq!(logger.min_level(), LogLevel::Info);
    }
}
