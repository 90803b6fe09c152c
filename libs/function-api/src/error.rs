use std::fmt;

/// Что пошло не так: решает, как host реагирует на ошибку.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Plugin или user config некорректен. Повтор не поможет.
    Config,
    /// Чтение входа или запись результата.
    Io,
    /// Некорректная входная запись.
    Format,
    /// Всё остальное (topic не найден и т.п.).
    Logic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::Logic => "logic",
        };
        f.write_str(name)
    }
}

/// Error that crosses crate and plugin boundaries: a kind plus a message,
/// with no source chain so it stays `Clone`.
#[derive(Clone)]
pub struct FunctionError {
    kind: ErrorKind,
    message: String,
}

impl FunctionError {
    fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Logic, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, message)
    }

    pub fn format_err(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Format, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FunctionError {}

// Used by hosts writing published messages out.
impl From<std::io::Error> for FunctionError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<serde_json::Error> for FunctionError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Self::io(e.to_string())
        } else {
            Self::format_err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_and_json_errors_map_to_kinds() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert_eq!(FunctionError::from(io).kind(), ErrorKind::Io);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(FunctionError::from(json).kind(), ErrorKind::Format);
    }

    #[test]
    fn debug_carries_kind_display_does_not() {
        let err = FunctionError::config("destination missing");
        assert_eq!(format!("{err:?}"), "[config] destination missing");
        assert_eq!(err.to_string(), "destination missing");
        assert_eq!(FunctionError::new("x").kind(), ErrorKind::Logic);
    }
}
