use std::collections::VecDeque;

use tokio::sync::RwLock;

use function_api::{MessageConf, MessageId};

// ═══════════════════════════════════════════════════════════════
//  PublishedMessage
// ═══════════════════════════════════════════════════════════════

/// Сообщение, принятое local topic'ом от `FunctionContext::publish`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub id: MessageId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub conf: MessageConf,
}

impl PublishedMessage {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

// ═══════════════════════════════════════════════════════════════
//  LocalTopic
// ═══════════════════════════════════════════════════════════════

/// In-memory ring buffer одного topic'а. При переполнении вытесняются
/// самые старые сообщения.
pub struct LocalTopic {
    pub name: String,
    pub ledger_id: u64,
    records: RwLock<VecDeque<PublishedMessage>>,
    max_records: usize,
}

impl LocalTopic {
    pub fn new(name: String, ledger_id: u64, max_records: usize) -> Self {
        Self {
            name,
            ledger_id,
            records: RwLock::new(VecDeque::with_capacity(max_records.min(65536))),
            max_records,
        }
    }

    pub async fn save(&self, message: PublishedMessage) {
        let mut buf = self.records.write().await;
        if self.max_records == 0 {
            return;
        }
        if buf.len() >= self.max_records {
            buf.pop_front();
        }
        buf.push_back(message);
    }

    /// Snapshot всех сообщений в порядке сохранения.
    pub async fn snapshot(&self) -> Vec<PublishedMessage> {
        self.records.read().await.iter().cloned().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
