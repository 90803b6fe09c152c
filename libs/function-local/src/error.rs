use function_api::FunctionError;

#[derive(Debug, thiserror::Error)]
pub enum LocalError {
    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("topic '{0}' already registered")]
    TopicExists(String),

    #[error("invalid user config: {0}")]
    UserConfig(String),
}

impl LocalError {
    /// Convert to FunctionError with a matching ErrorKind.
    pub fn into_function_error(self) -> FunctionError {
        match self {
            LocalError::TopicNotFound(_) | LocalError::TopicExists(_) => {
                FunctionError::new(self.to_string())
            }
            LocalError::UserConfig(_) => FunctionError::config(self.to_string()),
        }
    }
}
