use function_api::FunctionContext;
use serde_json::Value;

/// User config key: substring the payload must contain to be forwarded.
pub const FILTER_STRING_KEY: &str = "filterString";
/// User config key: topic that matching messages are forwarded to.
pub const DESTINATION_TOPIC_KEY: &str = "destinationTopic";

/// Filter settings as seen by one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSettings {
    /// Absent is treated as empty, which matches every payload.
    pub filter_string: String,
    /// `None` when unset or falsy (`""`, `false`, `0`, `[]`, `{}`, `null`).
    pub destination_topic: Option<String>,
}

impl FilterSettings {
    /// Read both keys from the context. Never cached: the host may change
    /// user config between invocations.
    pub fn read(ctx: &dyn FunctionContext) -> Self {
        Self {
            filter_string: ctx.user_config_string(FILTER_STRING_KEY).unwrap_or_default(),
            destination_topic: ctx
                .user_config_value(DESTINATION_TOPIC_KEY)
                .filter(is_set)
                .map(|value| match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                }),
        }
    }
}

/// A value that configures something: not null, false, zero or empty.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
