use std::collections::HashMap;
use std::sync::Arc;

use crate::{Disposition, MessageConf, MessageId, SendResult};

// ════════════════════════════════════════════════════════════════
//  Function Traits
// ════════════════════════════════════════════════════════════════

/// Completion callback публикации: `(result, sent_message_id)`.
///
/// `sent_message_id` заполнен только при `SendResult::Ok`.
pub type PublishCallback = Box<dyn FnOnce(SendResult, Option<MessageId>) + Send + 'static>;

/// Логгер, предоставляемый host'ом. Host сам решает, куда идут строки
/// (tracing, log topic, ...).
pub trait FunctionLogger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Возможности host'а, доступные функции при обработке одного сообщения.
///
/// Accessors текущего сообщения (`message_id`, `current_message_topic_name`,
/// `message_properties`, ...) валидны только на время синхронного вызова
/// `Function::process`. Внутри completion callback'а допустимы только
/// `ack` и `logger`.
pub trait FunctionContext: Send + Sync {
    /// Значение из user config функции. Читается заново при каждом вызове.
    fn user_config_value(&self, key: &str) -> Option<serde_json::Value>;

    /// Строковое значение user config. `null` = отсутствует, не-строковые
    /// скаляры отдаются в JSON-представлении.
    fn user_config_string(&self, key: &str) -> Option<String> {
        match self.user_config_value(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn logger(&self) -> Arc<dyn FunctionLogger>;

    fn message_id(&self) -> MessageId;

    fn current_message_topic_name(&self) -> String;

    fn message_properties(&self) -> HashMap<String, String>;

    /// Ordering key текущего сообщения.
    fn message_key(&self) -> Option<String>;

    fn partition_key(&self) -> Option<String>;

    /// Event time текущего сообщения (Unix ms).
    fn message_eventtime(&self) -> Option<i64>;

    /// Асинхронно опубликовать payload в `topic`. Возвращается сразу,
    /// результат приходит в `callback`.
    fn publish(&self, topic: &str, payload: Vec<u8>, conf: MessageConf, callback: PublishCallback);

    /// Подтвердить сообщение `message_id`, полученное из `topic`.
    fn ack(&self, message_id: &MessageId, topic: &str);
}

/// Функция, вызываемая host'ом для каждого входящего сообщения.
pub trait Function: Send + Sync {
    /// Обработать payload входящего сообщения. Никогда не возвращает ошибку:
    /// проблемы видны только через лог и состояние подтверждения.
    ///
    /// The returned [`Disposition`] is informational (logs, summaries).
    /// Hosts must not ack, nack or redeliver based on it: acknowledgment
    /// happens only through [`FunctionContext::ack`].
    fn process(&self, input: &[u8], ctx: Arc<dyn FunctionContext>) -> Disposition;
}
