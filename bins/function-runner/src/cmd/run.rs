use std::sync::Arc;

use function_api::{Disposition, Function, FunctionError};
use function_host::PluginFunction;
use function_local::{LocalError, LocalRuntime, LocalRuntimeConfig, user_config_from_value};
use function_message_filter::MessageFilterFunction;

use crate::config::{RunArgs, RunnerConfig};
use crate::error::RunnerError;
use crate::input::{InputRecord, parse_lines, write_published};

/// Dispositions returned by the function, counted at delivery time.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub delivered: usize,
    pub acked: usize,
    pub pending: usize,
    pub unacked: usize,
}

impl Summary {
    fn count(&mut self, disposition: Disposition) {
        self.delivered += 1;
        match disposition {
            Disposition::Acked => self.acked += 1,
            Disposition::Pending => self.pending += 1,
            Disposition::Unacked => self.unacked += 1,
        }
    }
}

pub async fn run(args: RunArgs) -> Result<(), RunnerError> {
    tracing::info!("function-runner starting");

    let config = RunnerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    let user_config = user_config_from_value(config.user_config_json()?)
        .map_err(LocalError::into_function_error)?;
    let runtime = Arc::new(LocalRuntime::new(LocalRuntimeConfig {
        function_name: config.name.clone(),
        user_config,
        auto_create_topics: config.auto_create_topics,
        max_records: config.max_records,
        capture_logs: false,
    }));
    for topic in &config.topics {
        runtime
            .register_topic(topic)
            .map_err(LocalError::into_function_error)?;
    }

    let function: Box<dyn Function> = match &config.plugin {
        Some(path) => Box::new(PluginFunction::load(path, "{}")?),
        None => Box::new(MessageFilterFunction::new()),
    };

    let content = std::fs::read_to_string(&args.input)
        .map_err(|e| FunctionError::io(format!("input '{}': {e}", args.input)))?;
    let records = parse_lines(&content)?;
    tracing::info!(input = %args.input, messages = records.len(), "loaded input");

    let summary = replay(&runtime, function.as_ref(), records, &config.input_topic).await;

    let mut published = Vec::new();
    for topic in runtime.topics() {
        let messages = runtime
            .published(&topic)
            .await
            .map_err(LocalError::into_function_error)?;
        tracing::info!(topic = %topic, published = messages.len(), "topic summary");
        published.extend(messages);
    }

    write_published(std::io::stdout().lock(), &published)?;

    tracing::info!(
        delivered = summary.delivered,
        acked_sync = summary.acked,
        pending = summary.pending,
        misconfigured = summary.unacked,
        acked_total = runtime.acks().len(),
        unacked_total = runtime.unacked().len(),
        "run complete"
    );
    Ok(())
}

/// Deliver every record in order, then wait for outstanding publishes.
pub async fn replay(
    runtime: &Arc<LocalRuntime>,
    function: &dyn Function,
    records: Vec<InputRecord>,
    input_topic: &str,
) -> Summary {
    let mut summary = Summary::default();
    for record in records {
        let message = record.into_message(runtime.next_message_id(), input_topic);
        let id = message.id;
        let disposition = runtime.deliver(function, message);
        tracing::debug!(message_id = %id, %disposition, "delivered");
        summary.count(disposition);
    }
    runtime.drain().await;
    summary
}
