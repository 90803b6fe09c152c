use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::RunnerError;

#[derive(Parser)]
#[command(name = "function-runner", about = "Run a message function against an in-memory host")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines file of messages through the function
    Run(RunArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Path to the TOML runner config
    #[arg(long, default_value = "runner.toml", env = "RUNNER_CONFIG")]
    pub config: String,
    /// JSON-lines file with one message per line
    #[arg(long)]
    pub input: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    /// Function name, used in log lines.
    #[serde(default = "default_name")]
    pub name: String,
    /// Topic every input message is delivered from.
    pub input_topic: String,
    /// Path to a function .so; the built-in message filter is used when unset.
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default = "default_auto_create_topics")]
    pub auto_create_topics: bool,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Topics registered before the first message.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Function user config (`filterString`, `destinationTopic`, ...).
    #[serde(default)]
    pub user_config: Option<toml::Value>,
}

fn default_name() -> String {
    "message-filter".into()
}
fn default_auto_create_topics() -> bool {
    true
}
fn default_max_records() -> usize {
    100_000
}

impl RunnerConfig {
    pub fn load(path: &str) -> Result<Self, RunnerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RunnerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| RunnerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// User config as JSON, `null` when the table is absent.
    pub fn user_config_json(&self) -> Result<serde_json::Value, RunnerError> {
        match &self.user_config {
            Some(v) => serde_json::to_value(v).map_err(|e| RunnerError::Config {
                context: "user_config",
                detail: e.to_string(),
            }),
            None => Ok(serde_json::Value::Null),
        }
    }
}
