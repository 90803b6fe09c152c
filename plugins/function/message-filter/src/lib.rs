//! Message filter function: forwards messages whose payload contains a
//! configured substring to a destination topic, preserving properties,
//! ordering key, partition key and event time.
//!
//! User config (re-read on every message):
//! - `filterString`: substring to look for; empty or absent matches everything.
//! - `destinationTopic`: required; when missing or falsy (`false`, `0`, empty)
//!   the message is left unacked.

mod config;

use std::collections::HashMap;
use std::sync::Arc;

use function_api::{
    Disposition, Function, FunctionContext, MessageConf, MessageId, PluginCreateResult,
    PublishCallback, SendResult, plugin_ok,
};

pub use config::{DESTINATION_TOPIC_KEY, FILTER_STRING_KEY, FilterSettings};

/// Property added to every forwarded message, holding the input topic name.
pub const INPUT_TOPIC_PROPERTY: &str = "message_filter_function_input_topic";

#[derive(Debug, Default)]
pub struct MessageFilterFunction;

impl MessageFilterFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for MessageFilterFunction {
    fn process(&self, input: &[u8], ctx: Arc<dyn FunctionContext>) -> Disposition {
        let message = String::from_utf8_lossy(input).into_owned();
        let settings = FilterSettings::read(&*ctx);
        let logger = ctx.logger();

        let Some(destination) = settings.destination_topic else {
            logger.error("Destination topic not configured");
            return Disposition::Unacked;
        };

        // Current-message accessors are only valid during this call.
        let input_message_id = ctx.message_id();
        let input_topic = ctx.current_message_topic_name();

        if !message.contains(settings.filter_string.as_str()) {
            logger.info(&format!(
                "Message doesn't contain '{}', skipping",
                settings.filter_string
            ));
            ctx.ack(&input_message_id, &input_topic);
            return Disposition::Acked;
        }

        let conf = MessageConf {
            properties: forwarded_properties(ctx.message_properties(), &input_topic),
            ordering_key: ctx.message_key(),
            partition_key: ctx.partition_key(),
            event_timestamp: ctx.message_eventtime(),
        };
        let callback = ack_on_sent(
            Arc::clone(&ctx),
            destination.clone(),
            input_message_id,
            input_topic,
        );
        ctx.publish(&destination, message.into_bytes(), conf, callback);
        logger.info(&format!("Forwarding message to {destination}"));
        Disposition::Pending
    }
}

/// Inbound properties plus the input topic entry. Inbound entries win on
/// key collision.
fn forwarded_properties(
    inbound: HashMap<String, String>,
    input_topic: &str,
) -> HashMap<String, String> {
    let mut properties = HashMap::with_capacity(inbound.len() + 1);
    properties.insert(INPUT_TOPIC_PROPERTY.to_string(), input_topic.to_string());
    properties.extend(inbound);
    properties
}

/// Completion callback: ack the input message once the forward is confirmed,
/// otherwise log and leave it for redelivery.
fn ack_on_sent(
    ctx: Arc<dyn FunctionContext>,
    destination: String,
    input_message_id: MessageId,
    input_topic: String,
) -> PublishCallback {
    let logger = ctx.logger();
    Box::new(move |result: SendResult, sent_message_id: Option<MessageId>| {
        if result.is_ok() {
            let sent = sent_message_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            logger.info(&format!("Message sent to {destination} with id {sent}"));
            ctx.ack(&input_message_id, &input_topic);
        } else {
            logger.error(&format!(
                "Failed to send message to {destination} for {input_message_id}, result was {result}"
            ));
        }
    })
}

// ---------------------------------------------------------------------------
// FFI exports for dynamic (.so) loading
// ---------------------------------------------------------------------------

function_api::qs_abi_version_fn!();
function_api::qs_destroy_fn!(qs_destroy_function, function_api::Function);

/// # Safety
///
/// The function takes no creation config; `_config_json_ptr` is never read.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qs_create_function(
    _config_json_ptr: *const u8,
    _config_json_len: usize,
) -> PluginCreateResult {
    plugin_ok(Box::new(MessageFilterFunction::new()) as Box<dyn Function>)
}
