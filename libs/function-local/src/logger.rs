use std::sync::{Mutex, PoisonError};

use function_api::FunctionLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Function logger of the local runtime: every line goes to `tracing`
/// with the function name attached, and is optionally kept in memory.
pub struct LocalLogger {
    function: String,
    capture: bool,
    lines: Mutex<Vec<LogLine>>,
}

impl LocalLogger {
    pub fn new(function: impl Into<String>, capture: bool) -> Self {
        Self {
            function: function.into(),
            capture,
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, level: LogLevel, message: &str) {
        if self.capture {
            self.lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(LogLine { level, message: message.to_string() });
        }
    }
}

impl FunctionLogger for LocalLogger {
    fn info(&self, message: &str) {
        tracing::info!(function = %self.function, "{message}");
        self.record(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        tracing::error!(function = %self.function, "{message}");
        self.record(LogLevel::Error, message);
    }
}
