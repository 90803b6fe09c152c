#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error(transparent)]
    Function(#[from] function_api::FunctionError),
}
