use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio_util::task::TaskTracker;

use function_api::{
    Disposition, Function, FunctionContext, FunctionLogger, InboundMessage, MessageConf,
    MessageId, PublishCallback, SendResult,
};

use crate::error::LocalError;
use crate::logger::{LocalLogger, LogLine};
use crate::topic::{LocalTopic, PublishedMessage};

/// Partition index of a non-partitioned topic.
const NON_PARTITIONED: i32 = -1;

/// Ledger used for ids of messages injected with [`LocalRuntime::message`].
const INBOUND_LEDGER: u64 = 0;

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

fn default_max_records() -> usize {
    100_000
}

#[derive(Debug, Clone)]
pub struct LocalRuntimeConfig {
    /// Имя функции (поле `function` в логах).
    pub function_name: String,
    /// User config, доступный через `FunctionContext::user_config_value`.
    pub user_config: serde_json::Map<String, serde_json::Value>,
    /// Создавать topic при первой публикации. Иначе `SendResult::TopicNotFound`.
    pub auto_create_topics: bool,
    /// Ёмкость ring buffer'а каждого topic'а.
    pub max_records: usize,
    /// Сохранять строки function logger'а в памяти.
    pub capture_logs: bool,
}

impl Default for LocalRuntimeConfig {
    fn default() -> Self {
        Self {
            function_name: "function".into(),
            user_config: serde_json::Map::new(),
            auto_create_topics: true,
            max_records: default_max_records(),
            capture_logs: false,
        }
    }
}

/// Convert an arbitrary JSON value (e.g. a TOML table) into a user config map.
pub fn user_config_from_value(
    value: serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, LocalError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        other => Err(LocalError::UserConfig(format!("expected a table, got {other}"))),
    }
}

// ═══════════════════════════════════════════════════════════════
//  AckRecord
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRecord {
    pub message_id: MessageId,
    pub topic: String,
}

// ═══════════════════════════════════════════════════════════════
//  LocalRuntime
// ═══════════════════════════════════════════════════════════════

/// In-memory host for a single function.
///
/// Publishing is asynchronous: `publish` spawns a tracked Tokio task that
/// stores the message and then fires the completion callback, so it must be
/// called from within a Tokio runtime. [`LocalRuntime::drain`] waits for all
/// of them.
pub struct LocalRuntime {
    user_config: RwLock<serde_json::Map<String, serde_json::Value>>,
    topics: RwLock<HashMap<String, Arc<LocalTopic>>>,
    failures: RwLock<HashMap<String, SendResult>>,
    auto_create_topics: bool,
    max_records: usize,
    next_ledger: AtomicU64,
    next_entry: AtomicU64,
    delivered: Mutex<Vec<MessageId>>,
    acks: Mutex<Vec<AckRecord>>,
    tracker: TaskTracker,
    /// Serializes `drain`: close/wait/reopen of one caller must not
    /// interleave with another's.
    drain_lock: tokio::sync::Mutex<()>,
    logger: Arc<LocalLogger>,
}

impl LocalRuntime {
    pub fn new(config: LocalRuntimeConfig) -> Self {
        Self {
            user_config: RwLock::new(config.user_config),
            topics: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            auto_create_topics: config.auto_create_topics,
            max_records: config.max_records,
            next_ledger: AtomicU64::new(INBOUND_LEDGER + 1),
            next_entry: AtomicU64::new(0),
            delivered: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
            tracker: TaskTracker::new(),
            drain_lock: tokio::sync::Mutex::new(()),
            logger: Arc::new(LocalLogger::new(config.function_name, config.capture_logs)),
        }
    }

    // --- topics ---

    pub fn register_topic(&self, name: &str) -> Result<(), LocalError> {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if topics.contains_key(name) {
            return Err(LocalError::TopicExists(name.to_string()));
        }
        topics.insert(name.to_string(), Arc::new(self.new_topic(name)));
        tracing::info!(topic = %name, "registered topic");
        Ok(())
    }

    /// Names of all known topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn published(&self, topic: &str) -> Result<Vec<PublishedMessage>, LocalError> {
        let topic_arc = self
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .ok_or_else(|| LocalError::TopicNotFound(topic.to_string()))?;
        Ok(topic_arc.snapshot().await)
    }

    fn new_topic(&self, name: &str) -> LocalTopic {
        let ledger_id = self.next_ledger.fetch_add(1, Ordering::Relaxed);
        LocalTopic::new(name.to_string(), ledger_id, self.max_records)
    }

    fn resolve_topic(&self, name: &str) -> Option<Arc<LocalTopic>> {
        if let Some(t) = self.topics.read().unwrap_or_else(PoisonError::into_inner).get(name) {
            return Some(t.clone());
        }
        if !self.auto_create_topics {
            return None;
        }
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let topic = topics
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(topic = %name, "auto-created topic");
                Arc::new(self.new_topic(name))
            })
            .clone();
        Some(topic)
    }

    // --- user config ---

    pub fn set_user_config(&self, key: &str, value: impl Into<serde_json::Value>) {
        self.user_config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }

    pub fn remove_user_config(&self, key: &str) {
        self.user_config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn user_config_value(&self, key: &str) -> Option<serde_json::Value> {
        self.user_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    // --- failure injection ---

    /// Every subsequent publish to `topic` completes with `result`.
    pub fn fail_publishes_to(&self, topic: &str, result: SendResult) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string(), result);
    }

    pub fn clear_publish_failure(&self, topic: &str) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
    }

    fn injected_failure(&self, topic: &str) -> Option<SendResult> {
        self.failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .copied()
            .filter(|r| !r.is_ok())
    }

    // --- delivery ---

    pub fn next_message_id(&self) -> MessageId {
        let entry = self.next_entry.fetch_add(1, Ordering::Relaxed);
        MessageId::new(INBOUND_LEDGER, entry, NON_PARTITIONED)
    }

    /// Inbound message on `topic` with a fresh id and no metadata.
    pub fn message(&self, topic: &str, payload: impl Into<Vec<u8>>) -> InboundMessage {
        InboundMessage {
            id: self.next_message_id(),
            topic: topic.to_string(),
            payload: payload.into(),
            properties: HashMap::new(),
            key: None,
            partition_key: None,
            event_time: None,
        }
    }

    /// Invoke `function` for one message with a per-invocation context.
    pub fn deliver(self: &Arc<Self>, function: &dyn Function, message: InboundMessage) -> Disposition {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.id);

        let invocation = Arc::new(InvocationContext {
            runtime: Arc::clone(self),
            message,
        });
        let ctx: Arc<dyn FunctionContext> = invocation.clone();
        function.process(&invocation.message.payload, ctx)
    }

    fn dispatch_publish(
        self: &Arc<Self>,
        topic: &str,
        payload: Vec<u8>,
        conf: MessageConf,
        callback: PublishCallback,
    ) {
        let runtime = Arc::clone(self);
        let topic = topic.to_string();
        self.tracker.spawn(async move {
            let (result, sent_id) = runtime.store(&topic, payload, conf).await;
            callback(result, sent_id);
        });
    }

    async fn store(
        &self,
        topic: &str,
        payload: Vec<u8>,
        conf: MessageConf,
    ) -> (SendResult, Option<MessageId>) {
        if let Some(result) = self.injected_failure(topic) {
            tracing::warn!(topic = %topic, %result, "injected publish failure");
            return (result, None);
        }
        let Some(target) = self.resolve_topic(topic) else {
            return (SendResult::TopicNotFound, None);
        };
        let entry = self.next_entry.fetch_add(1, Ordering::Relaxed);
        let id = MessageId::new(target.ledger_id, entry, NON_PARTITIONED);
        target
            .save(PublishedMessage {
                id,
                topic: topic.to_string(),
                payload,
                conf,
            })
            .await;
        (SendResult::Ok, Some(id))
    }

    /// Wait until every publish issued so far has stored its message and run
    /// its callback. Concurrent callers are served one at a time.
    pub async fn drain(&self) {
        let _guard = self.drain_lock.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    // --- acks ---

    fn ack(&self, message_id: &MessageId, topic: &str) {
        let mut acks = self.acks.lock().unwrap_or_else(PoisonError::into_inner);
        if acks.iter().any(|a| a.message_id == *message_id) {
            tracing::warn!(message_id = %message_id, topic = %topic, "duplicate ack");
        }
        acks.push(AckRecord {
            message_id: *message_id,
            topic: topic.to_string(),
        });
    }

    /// Every ack call, in call order (duplicates included).
    pub fn acks(&self) -> Vec<AckRecord> {
        self.acks.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn ack_count(&self, message_id: &MessageId) -> usize {
        self.acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.message_id == *message_id)
            .count()
    }

    pub fn is_acked(&self, message_id: &MessageId) -> bool {
        self.ack_count(message_id) > 0
    }

    /// Number of ack calls beyond the first for any message.
    pub fn duplicate_acks(&self) -> usize {
        let acks = self.acks.lock().unwrap_or_else(PoisonError::into_inner);
        let unique: HashSet<MessageId> = acks.iter().map(|a| a.message_id).collect();
        acks.len() - unique.len()
    }

    pub fn delivered(&self) -> Vec<MessageId> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Delivered messages that were never acknowledged, in delivery order.
    pub fn unacked(&self) -> Vec<MessageId> {
        let acked: HashSet<MessageId> = self.acks().into_iter().map(|a| a.message_id).collect();
        self.delivered()
            .into_iter()
            .filter(|id| !acked.contains(id))
            .collect()
    }

    // --- logs ---

    /// Captured function log lines (empty unless `capture_logs` is set).
    pub fn log_lines(&self) -> Vec<LogLine> {
        self.logger.lines()
    }
}

// ═══════════════════════════════════════════════════════════════
//  InvocationContext
// ═══════════════════════════════════════════════════════════════

/// `FunctionContext` of one delivery: message accessors read the delivered
/// message, everything else goes to the shared runtime.
pub struct InvocationContext {
    runtime: Arc<LocalRuntime>,
    message: InboundMessage,
}

impl FunctionContext for InvocationContext {
    fn user_config_value(&self, key: &str) -> Option<serde_json::Value> {
        self.runtime.user_config_value(key)
    }

    fn logger(&self) -> Arc<dyn FunctionLogger> {
        self.runtime.logger.clone()
    }

    fn message_id(&self) -> MessageId {
        self.message.id
    }

    fn current_message_topic_name(&self) -> String {
        self.message.topic.clone()
    }

    fn message_properties(&self) -> HashMap<String, String> {
        self.message.properties.clone()
    }

    fn message_key(&self) -> Option<String> {
        self.message.key.clone()
    }

    fn partition_key(&self) -> Option<String> {
        self.message.partition_key.clone()
    }

    fn message_eventtime(&self) -> Option<i64> {
        self.message.event_time
    }

    fn publish(&self, topic: &str, payload: Vec<u8>, conf: MessageConf, callback: PublishCallback) {
        self.runtime.dispatch_publish(topic, payload, conf, callback);
    }

    fn ack(&self, message_id: &MessageId, topic: &str) {
        self.runtime.ack(message_id, topic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Publishes every payload to `user_config["out"]` and acks on success.
    struct Relay;

    impl Function for Relay {
        fn process(&self, input: &[u8], ctx: Arc<dyn FunctionContext>) -> Disposition {
            let Some(out) = ctx.user_config_string("out") else {
                return Disposition::Unacked;
            };
            let id = ctx.message_id();
            let topic = ctx.current_message_topic_name();
            let acker = ctx.clone();
            ctx.publish(
                &out,
                input.to_vec(),
                MessageConf::default(),
                Box::new(move |result: SendResult, _: Option<MessageId>| {
                    if result.is_ok() {
                        acker.ack(&id, &topic);
                    }
                }),
            );
            Disposition::Pending
        }
    }

    fn runtime(auto_create_topics: bool) -> Arc<LocalRuntime> {
        let mut user_config = serde_json::Map::new();
        user_config.insert("out".into(), "out-topic".into());
        Arc::new(LocalRuntime::new(LocalRuntimeConfig {
            function_name: "relay".into(),
            user_config,
            auto_create_topics,
            capture_logs: true,
            ..Default::default()
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_drains_all_return() {
        let rt = runtime(true);
        for i in 0..16 {
            rt.deliver(&Relay, rt.message("in", format!("m{i}")));
        }

        let drains = (0..4).map(|_| {
            let rt = Arc::clone(&rt);
            tokio::spawn(async move { rt.drain().await })
        });
        let all = join_all(drains.collect());
        tokio::time::timeout(std::time::Duration::from_secs(5), all)
            .await
            .expect("drain calls must not hang");

        assert_eq!(rt.published("out-topic").await.unwrap().len(), 16);
        assert!(rt.unacked().is_empty());
    }

    async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn publish_completes_after_drain_and_acks() {
        let rt = runtime(true);
        let msg = rt.message("in", "hello");
        let id = msg.id;

        assert_eq!(rt.deliver(&Relay, msg), Disposition::Pending);
        rt.drain().await;

        let out = rt.published("out-topic").await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload_text(), "hello");
        assert_ne!(out[0].id.ledger_id, INBOUND_LEDGER);
        assert_eq!(rt.acks(), vec![AckRecord { message_id: id, topic: "in".into() }]);
        assert!(rt.unacked().is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_without_auto_create_fails_publish() {
        let rt = runtime(false);
        let msg = rt.message("in", "hello");
        let id = msg.id;

        rt.deliver(&Relay, msg);
        rt.drain().await;

        assert!(!rt.is_acked(&id));
        assert_eq!(rt.unacked(), vec![id]);
        assert!(rt.published("out-topic").await.is_err());
    }

    #[tokio::test]
    async fn injected_failure_applies_until_cleared() {
        let rt = runtime(true);
        rt.register_topic("out-topic").unwrap();
        rt.fail_publishes_to("out-topic", SendResult::Timeout);

        let first = rt.message("in", "a");
        let first_id = first.id;
        rt.deliver(&Relay, first);
        rt.drain().await;
        assert!(!rt.is_acked(&first_id));

        rt.clear_publish_failure("out-topic");
        let second = rt.message("in", "b");
        let second_id = second.id;
        rt.deliver(&Relay, second);
        rt.drain().await;
        assert!(rt.is_acked(&second_id));
        assert_eq!(rt.published("out-topic").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_config_changes_are_seen_by_next_delivery() {
        let rt = runtime(true);
        rt.remove_user_config("out");
        assert_eq!(rt.deliver(&Relay, rt.message("in", "x")), Disposition::Unacked);

        rt.set_user_config("out", "elsewhere");
        assert_eq!(rt.deliver(&Relay, rt.message("in", "y")), Disposition::Pending);
        rt.drain().await;
        assert_eq!(rt.published("elsewhere").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_string_config_values_render_as_json() {
        let rt = runtime(true);
        rt.set_user_config("n", 5);
        rt.set_user_config("nothing", serde_json::Value::Null);
        let invocation = InvocationContext {
            runtime: rt.clone(),
            message: rt.message("in", ""),
        };
        assert_eq!(invocation.user_config_string("n").as_deref(), Some("5"));
        assert_eq!(invocation.user_config_string("nothing"), None);
        assert_eq!(invocation.user_config_string("missing"), None);
    }

    #[test]
    fn duplicate_acks_are_counted() {
        let rt = runtime(true);
        let id = rt.next_message_id();
        rt.ack(&id, "in");
        rt.ack(&id, "in");
        assert_eq!(rt.ack_count(&id), 2);
        assert_eq!(rt.duplicate_acks(), 1);
    }

    #[test]
    fn register_twice_is_an_error() {
        let rt = runtime(true);
        rt.register_topic("t").unwrap();
        let err = rt.register_topic("t").unwrap_err();
        assert!(matches!(err, LocalError::TopicExists(ref name) if name == "t"));
        assert_eq!(rt.topics(), vec!["t".to_string()]);
    }

    #[test]
    fn user_config_must_be_a_table() {
        assert!(user_config_from_value(serde_json::json!({"a": 1})).is_ok());
        assert!(user_config_from_value(serde_json::Value::Null).unwrap().is_empty());
        let err = user_config_from_value(serde_json::json!([1])).unwrap_err();
        assert_eq!(err.into_function_error().kind(), function_api::ErrorKind::Config);
    }
}
