//! Queue-level types: validated names, metadata, properties and listings.

use crate::error::{QueueStorageError, ValidationError};
use crate::xml::{self, XmlNode};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Prefix of the headers that carry queue metadata
pub(crate) const METADATA_HEADER_PREFIX: &str = "x-ms-meta-";

/// Queue metadata: name/value pairs attached to a queue
pub type Metadata = BTreeMap<String, String>;

/// Validated queue name
///
/// Queue names are 3-63 characters of lowercase ASCII letters, digits and
/// hyphens. They start with a letter or digit, do not end with a hyphen and
/// never contain two consecutive hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();

        if name.len() < 3 || name.len() > 63 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: format!("must be 3-63 characters, got {}", name.len()),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only lowercase ASCII letters, digits and hyphens allowed".to_string(),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "no leading/trailing hyphens or consecutive hyphens".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Create a unique queue name `{prefix}-{uuid}`
    pub fn unique(prefix: &str) -> Result<Self, ValidationError> {
        Self::new(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }

    /// Derive a queue name by appending a suffix
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, ValidationError> {
        Self::new(format!("{}{}", self.0, suffix))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that every metadata name is an identifier the service accepts
///
/// Names must start with a letter or underscore and contain only ASCII
/// letters, digits and underscores. Values must be valid header values.
/// Names are sent lowercased, so two names may not differ only by case.
pub fn validate_metadata(metadata: &Metadata) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(metadata.len());
    for (name, value) in metadata {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidFormat {
                field: "metadata".to_string(),
                message: format!("'{}' is not a valid metadata name", name),
            });
        }

        if value.chars().any(|c| c.is_control() || !c.is_ascii()) {
            return Err(ValidationError::InvalidFormat {
                field: "metadata".to_string(),
                message: format!("value of '{}' must be printable ASCII", name),
            });
        }

        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "metadata".to_string(),
                message: format!("'{}' duplicates another name ignoring case", name),
            });
        }
    }
    Ok(())
}

/// Extract `x-ms-meta-*` headers into metadata
pub(crate) fn metadata_from_headers(headers: &HeaderMap) -> Metadata {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(METADATA_HEADER_PREFIX)?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Queue properties returned by a metadata request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProperties {
    /// Approximate number of messages; may lag behind the true count
    pub approximate_message_count: u64,
    pub metadata: Metadata,
}

/// Queue entry in a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub name: String,
    /// Only populated when metadata was requested
    pub metadata: Metadata,
}

/// One page of a list-queues response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSegment {
    pub queues: Vec<QueueItem>,
    /// Continuation marker for the next page; `None` on the last page
    pub next_marker: Option<String>,
}

impl QueueSegment {
    pub(crate) fn from_xml(body: &str) -> Result<Self, QueueStorageError> {
        let root = xml::parse_root(body, "EnumerationResults")?;

        let queues = match root.child("Queues") {
            Some(queues) => queues
                .children_named("Queue")
                .map(queue_item_from_node)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let next_marker = root
            .child_text("NextMarker")
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Ok(Self {
            queues,
            next_marker,
        })
    }
}

fn queue_item_from_node(node: &XmlNode) -> Result<QueueItem, QueueStorageError> {
    let name = node.required_text("Name")?.to_string();
    let metadata = node
        .child("Metadata")
        .map(|m| {
            m.children
                .iter()
                .map(|entry| (entry.name.to_ascii_lowercase(), entry.text.clone()))
                .collect()
        })
        .unwrap_or_default();

    Ok(QueueItem { name, metadata })
}
