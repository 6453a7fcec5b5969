//! Message types and their wire representation.
//!
//! Message text travels inside `<QueueMessage><MessageText>` elements. With
//! [`MessageEncoding::Base64`] (the default) the text is base64-encoded so any
//! content round-trips; [`MessageEncoding::Plain`] sends XML-escaped text.

use crate::error::{QueueStorageError, ValidationError};
use crate::xml::{self, XmlNode, XmlWriter};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

/// Largest encoded message the service accepts
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Largest number of messages returned by one get or peek call
pub const MAX_MESSAGES_PER_REQUEST: u32 = 32;

/// Longest visibility timeout the service accepts
pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Visibility timeout applied by the service when none is given on receive
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// How message text is encoded in request and response bodies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEncoding {
    /// Base64-encode the UTF-8 text
    #[default]
    Base64,
    /// Send the text as-is (XML-escaped)
    Plain,
}

impl MessageEncoding {
    pub(crate) fn encode(&self, text: &str) -> String {
        match self {
            Self::Base64 => STANDARD.encode(text.as_bytes()),
            Self::Plain => text.to_string(),
        }
    }

    pub(crate) fn decode(&self, message_id: &str, raw: &str) -> Result<String, QueueStorageError> {
        match self {
            Self::Plain => Ok(raw.to_string()),
            Self::Base64 => {
                let bytes = STANDARD.decode(raw.trim()).map_err(|e| {
                    QueueStorageError::InvalidMessageContent {
                        message: format!("message {} is not valid base64: {}", message_id, e),
                    }
                })?;
                String::from_utf8(bytes).map_err(|_| QueueStorageError::InvalidMessageContent {
                    message: format!("message {} is not valid UTF-8", message_id),
                })
            }
        }
    }
}

/// Time-to-live of an enqueued message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeToLive {
    /// Message expires after the given duration
    Expires(Duration),
    /// Message never expires
    Infinite,
}

impl TimeToLive {
    /// Value of the `messagettl` query parameter
    pub(crate) fn as_query_value(&self) -> String {
        match self {
            Self::Expires(duration) => duration.as_secs().to_string(),
            Self::Infinite => "-1".to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Expires(duration) if duration.as_secs() == 0 => Err(ValidationError::OutOfRange {
                field: "time_to_live".to_string(),
                message: "must be at least one second or infinite".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Receipt returned when a message is enqueued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub insertion_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub time_next_visible: DateTime<Utc>,
}

/// Message retrieved with a get call; hidden from other consumers until
/// `time_next_visible`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub insertion_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub time_next_visible: DateTime<Utc>,
    pub dequeue_count: u64,
    pub message_text: String,
}

/// Message observed with a peek call; visibility is unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeekedMessage {
    pub message_id: String,
    pub insertion_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub dequeue_count: u64,
    pub message_text: String,
}

/// New pop receipt and visibility returned by an update call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedMessage {
    pub pop_receipt: String,
    pub time_next_visible: DateTime<Utc>,
}

/// Parse an RFC 1123 timestamp such as `Fri, 09 Oct 2009 21:04:30 GMT`
pub(crate) fn parse_http_date(value: &str) -> Result<DateTime<Utc>, QueueStorageError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QueueStorageError::xml(format!("invalid timestamp '{}': {}", value, e)))
}

/// Format a timestamp as RFC 1123, as used by the `x-ms-date` header
pub(crate) fn format_http_date(value: &DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn required_date(node: &XmlNode, name: &str) -> Result<DateTime<Utc>, QueueStorageError> {
    parse_http_date(node.required_text(name)?)
}

/// Build the `<QueueMessage>` request body, checking the size limit
pub(crate) fn message_body(
    text: &str,
    encoding: MessageEncoding,
) -> Result<String, QueueStorageError> {
    let encoded = encoding.encode(text);
    if encoded.len() > MAX_MESSAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "message_text".to_string(),
            message: format!(
                "encoded message is {} bytes (max: {})",
                encoded.len(),
                MAX_MESSAGE_SIZE
            ),
        }
        .into());
    }

    let mut writer = XmlWriter::new();
    writer
        .open("QueueMessage")
        .element("MessageText", &encoded)
        .close("QueueMessage");
    Ok(writer.finish())
}

/// Check a message count for get and peek calls
pub(crate) fn validate_message_count(count: u32) -> Result<(), ValidationError> {
    if count == 0 || count > MAX_MESSAGES_PER_REQUEST {
        return Err(ValidationError::OutOfRange {
            field: "number_of_messages".to_string(),
            message: format!("must be 1-{}, got {}", MAX_MESSAGES_PER_REQUEST, count),
        });
    }
    Ok(())
}

/// Check a visibility timeout against the service limit
pub(crate) fn validate_visibility_timeout(timeout: Duration) -> Result<(), ValidationError> {
    if timeout > MAX_VISIBILITY_TIMEOUT {
        return Err(ValidationError::OutOfRange {
            field: "visibility_timeout".to_string(),
            message: format!("must not exceed 7 days, got {}s", timeout.as_secs()),
        });
    }
    Ok(())
}

pub(crate) fn parse_sent_messages(body: &str) -> Result<Vec<SentMessage>, QueueStorageError> {
    let root = xml::parse_root(body, "QueueMessagesList")?;
    root.children_named("QueueMessage")
        .map(|node| -> Result<SentMessage, QueueStorageError> {
            Ok(SentMessage {
                message_id: node.required_text("MessageId")?.to_string(),
                pop_receipt: node.required_text("PopReceipt")?.to_string(),
                insertion_time: required_date(node, "InsertionTime")?,
                expiration_time: required_date(node, "ExpirationTime")?,
                time_next_visible: required_date(node, "TimeNextVisible")?,
            })
        })
        .collect()
}

pub(crate) fn parse_received_messages(
    body: &str,
    encoding: MessageEncoding,
) -> Result<Vec<QueueMessage>, QueueStorageError> {
    let root = xml::parse_root(body, "QueueMessagesList")?;
    root.children_named("QueueMessage")
        .map(|node| -> Result<QueueMessage, QueueStorageError> {
            let message_id = node.required_text("MessageId")?.to_string();
            let text = node.child_text("MessageText").unwrap_or_default();
            let message_text = encoding.decode(&message_id, text)?;
            Ok(QueueMessage {
                pop_receipt: node.required_text("PopReceipt")?.to_string(),
                insertion_time: required_date(node, "InsertionTime")?,
                expiration_time: required_date(node, "ExpirationTime")?,
                time_next_visible: required_date(node, "TimeNextVisible")?,
                dequeue_count: node.parse_required("DequeueCount")?,
                message_id,
                message_text,
            })
        })
        .collect()
}

pub(crate) fn parse_peeked_messages(
    body: &str,
    encoding: MessageEncoding,
) -> Result<Vec<PeekedMessage>, QueueStorageError> {
    let root = xml::parse_root(body, "QueueMessagesList")?;
    root.children_named("QueueMessage")
        .map(|node| -> Result<PeekedMessage, QueueStorageError> {
            let message_id = node.required_text("MessageId")?.to_string();
            let text = node.child_text("MessageText").unwrap_or_default();
            let message_text = encoding.decode(&message_id, text)?;
            Ok(PeekedMessage {
                insertion_time: required_date(node, "InsertionTime")?,
                expiration_time: required_date(node, "ExpirationTime")?,
                dequeue_count: node.parse_required("DequeueCount")?,
                message_id,
                message_text,
            })
        })
        .collect()
}
