use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use function_api::{FunctionError, InboundMessage, MessageId};
use function_local::PublishedMessage;

/// One line of the input file.
#[derive(Debug, Deserialize)]
pub struct InputRecord {
    pub payload: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
    #[serde(default)]
    pub event_time: Option<i64>,
}

impl InputRecord {
    pub fn into_message(self, id: MessageId, topic: &str) -> InboundMessage {
        InboundMessage {
            id,
            topic: topic.to_string(),
            payload: self.payload.into_bytes(),
            properties: self.properties,
            key: self.key,
            partition_key: self.partition_key,
            event_time: self.event_time,
        }
    }
}

/// Parse JSON lines, skipping blank ones. Errors name the 1-based line.
pub fn parse_lines(content: &str) -> Result<Vec<InputRecord>, FunctionError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| FunctionError::format_err(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Published message as written to stdout.
#[derive(Debug, Serialize)]
pub struct OutputRecord<'a> {
    pub id: String,
    pub topic: &'a str,
    pub payload: String,
    pub properties: &'a HashMap<String, String>,
    pub ordering_key: Option<&'a str>,
    pub partition_key: Option<&'a str>,
    pub event_timestamp: Option<i64>,
}

impl<'a> From<&'a PublishedMessage> for OutputRecord<'a> {
    fn from(m: &'a PublishedMessage) -> Self {
        Self {
            id: m.id.to_string(),
            topic: &m.topic,
            payload: m.payload_text(),
            properties: &m.conf.properties,
            ordering_key: m.conf.ordering_key.as_deref(),
            partition_key: m.conf.partition_key.as_deref(),
            event_timestamp: m.conf.event_timestamp,
        }
    }
}

/// Write every message as one JSON line.
pub fn write_published<W: Write>(
    mut out: W,
    messages: &[PublishedMessage],
) -> Result<(), FunctionError> {
    for message in messages {
        serde_json::to_writer(&mut out, &OutputRecord::from(message))?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
