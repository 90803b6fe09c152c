use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Message Id
// ════════════════════════════════════════════════════════════════

/// Идентификатор сообщения, назначенный host'ом.
///
/// Функция обращается с ним как с непрозрачным значением: захватывает
/// при вызове и передаёт обратно в `ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub ledger_id: u64,
    pub entry_id: u64,
    pub partition: i32,
}

impl MessageId {
    pub fn new(ledger_id: u64, entry_id: u64, partition: i32) -> Self {
        Self { ledger_id, entry_id, partition }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.ledger_id, self.entry_id, self.partition)
    }
}

// ════════════════════════════════════════════════════════════════
//  Inbound Message
// ════════════════════════════════════════════════════════════════

/// Входящее сообщение в том виде, в каком его держит host.
///
/// Функция видит его только через accessors `FunctionContext`, и только
/// на время синхронного вызова `process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    /// Topic, из которого пришло сообщение.
    pub topic: String,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Ordering key (message key).
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
    /// Event time в миллисекундах (Unix epoch).
    #[serde(default)]
    pub event_time: Option<i64>,
}

// ════════════════════════════════════════════════════════════════
//  Message Conf
// ════════════════════════════════════════════════════════════════

/// Per-message опции публикации.
///
/// `None` и `Some("")` различаются и доходят до host'а как есть.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageConf {
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub ordering_key: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
    #[serde(default)]
    pub event_timestamp: Option<i64>,
}

// ════════════════════════════════════════════════════════════════
//  Send Result
// ════════════════════════════════════════════════════════════════

/// Результат асинхронной публикации, передаётся в completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendResult {
    Ok,
    Timeout,
    TopicNotFound,
    ProducerQueueIsFull,
    AlreadyClosed,
    ConnectError,
    UnknownError,
}

impl SendResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, SendResult::Ok)
    }
}

impl std::fmt::Display for SendResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SendResult::Ok => "Ok",
            SendResult::Timeout => "Timeout",
            SendResult::TopicNotFound => "TopicNotFound",
            SendResult::ProducerQueueIsFull => "ProducerQueueIsFull",
            SendResult::AlreadyClosed => "AlreadyClosed",
            SendResult::ConnectError => "ConnectError",
            SendResult::UnknownError => "UnknownError",
        };
        write!(f, "Result.{name}")
    }
}

// ════════════════════════════════════════════════════════════════
//  Disposition
// ════════════════════════════════════════════════════════════════

/// Состояние подтверждения входящего сообщения на момент возврата из
/// `Function::process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Сообщение подтверждено синхронно.
    Acked,
    /// Подтверждение зависит от completion callback публикации.
    Pending,
    /// Сообщение оставлено без подтверждения (redelivery на стороне host'а).
    Unacked,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Acked => f.write_str("acked"),
            Disposition::Pending => f.write_str("pending"),
            Disposition::Unacked => f.write_str("unacked"),
        }
    }
}
