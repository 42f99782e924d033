use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
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
        let label = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Destination for the progress tally every stage reports.
pub trait LogSink: Send + Sync {
    fn log(&self, record: LogRecord);

    fn info(&self, message: &str) {
        self.log(LogRecord::new(LogLevel::Info, message));
    }

    fn warn(&self, message: &str) {
        self.log(LogRecord::new(LogLevel::Warn, message));
    }

    fn error(&self, message: &str) {
        self.log(LogRecord::new(LogLevel::Error, message));
    }
}

#[derive(Default)]
pub struct VecLogSink {
    records: Mutex<Vec<LogRecord>>,
}

impl VecLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.records
            .lock()
            .map(|guard| guard.iter().filter(|r| r.level == level).count())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .map(|guard| guard.iter().any(|r| r.message.contains(needle)))
            .unwrap_or(false)
    }
}

impl LogSink for VecLogSink {
    fn log(&self, record: LogRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
    }
}

/// Prints the tally to stdout, one `[LEVEL] message` line per record.
#[derive(Default, Clone, Copy)]
pub struct StdoutLogSink;

impl StdoutLogSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for StdoutLogSink {
    fn log(&self, record: LogRecord) {
        println!("[{}] {}", record.level, record.message);
    }
}
