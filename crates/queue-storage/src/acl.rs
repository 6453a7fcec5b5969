//! Stored access policies attached to a queue.

use crate::error::{QueueStorageError, ValidationError};
use crate::xml::{self, XmlNode, XmlWriter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "acl_tests.rs"]
mod tests;

/// Maximum number of stored access policies per queue
pub const MAX_SIGNED_IDENTIFIERS: usize = 5;

/// Maximum length of a policy identifier
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Operations a shared access signature derived from a policy may perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePermissions {
    /// Read metadata and peek messages
    pub read: bool,
    /// Enqueue messages
    pub add: bool,
    /// Update messages
    pub update: bool,
    /// Get and delete messages
    pub process: bool,
}

impl QueuePermissions {
    pub fn read() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    pub fn update() -> Self {
        Self {
            update: true,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            read: true,
            add: true,
            update: true,
            process: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.read || self.add || self.update || self.process)
    }

    /// Human readable names of the granted permissions
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.read {
            labels.push("Read");
        }
        if self.add {
            labels.push("Add");
        }
        if self.update {
            labels.push("Update");
        }
        if self.process {
            labels.push("ProcessMessages");
        }
        if labels.is_empty() {
            labels.push("None");
        }
        labels
    }
}

/// Abbreviated wire form, always in `raup` order
impl fmt::Display for QueuePermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (granted, flag) in [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.update, 'u'),
            (self.process, 'p'),
        ] {
            if granted {
                write!(f, "{}", flag)?;
            }
        }
        Ok(())
    }
}

impl FromStr for QueuePermissions {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut permissions = Self::default();
        for flag in s.trim().chars() {
            match flag {
                'r' => permissions.read = true,
                'a' => permissions.add = true,
                'u' => permissions.update = true,
                'p' => permissions.process = true,
                other => {
                    return Err(ValidationError::InvalidFormat {
                        field: "permission".to_string(),
                        message: format!("unknown queue permission '{}'", other),
                    })
                }
            }
        }
        Ok(permissions)
    }
}

/// Validity window and permissions of a stored access policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub start: Option<DateTime<Utc>>,
    pub expiry: Option<DateTime<Utc>>,
    pub permissions: Option<QueuePermissions>,
}

/// Stored access policy with its identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIdentifier {
    pub id: String,
    pub access_policy: AccessPolicy,
}

impl SignedIdentifier {
    pub fn new(id: impl Into<String>, access_policy: AccessPolicy) -> Self {
        Self {
            id: id.into(),
            access_policy,
        }
    }
}

/// Check identifier count and length before a set request
pub(crate) fn validate_identifiers(
    identifiers: &[SignedIdentifier],
) -> Result<(), ValidationError> {
    if identifiers.len() > MAX_SIGNED_IDENTIFIERS {
        return Err(ValidationError::OutOfRange {
            field: "signed_identifiers".to_string(),
            message: format!(
                "at most {} stored access policies allowed, got {}",
                MAX_SIGNED_IDENTIFIERS,
                identifiers.len()
            ),
        });
    }
    for identifier in identifiers {
        if identifier.id.is_empty() || identifier.id.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ValidationError::OutOfRange {
                field: "signed_identifier.id".to_string(),
                message: format!("must be 1-{} characters", MAX_IDENTIFIER_LENGTH),
            });
        }
    }
    Ok(())
}

fn format_iso8601(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn parse_iso8601(value: &str) -> Result<DateTime<Utc>, QueueStorageError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QueueStorageError::xml(format!("invalid ISO 8601 time '{}': {}", value, e)))
}

fn optional_time(node: &XmlNode, name: &str) -> Result<Option<DateTime<Utc>>, QueueStorageError> {
    match node.child_text(name).map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_iso8601(text).map(Some),
    }
}

pub(crate) fn identifiers_to_xml(identifiers: &[SignedIdentifier]) -> String {
    let mut writer = XmlWriter::new();
    writer.open("SignedIdentifiers");
    for identifier in identifiers {
        writer
            .open("SignedIdentifier")
            .element("Id", &identifier.id)
            .open("AccessPolicy");
        let policy = &identifier.access_policy;
        if let Some(start) = &policy.start {
            writer.element("Start", &format_iso8601(start));
        }
        if let Some(expiry) = &policy.expiry {
            writer.element("Expiry", &format_iso8601(expiry));
        }
        if let Some(permissions) = &policy.permissions {
            writer.element("Permission", &permissions.to_string());
        }
        writer.close("AccessPolicy").close("SignedIdentifier");
    }
    writer.close("SignedIdentifiers");
    writer.finish()
}

pub(crate) fn identifiers_from_xml(body: &str) -> Result<Vec<SignedIdentifier>, QueueStorageError> {
    // A queue without policies may answer with an empty body.
    if body.trim_start_matches('\u{feff}').trim().is_empty() {
        return Ok(Vec::new());
    }

    let root = xml::parse_root(body, "SignedIdentifiers")?;
    root.children_named("SignedIdentifier")
        .map(|node| -> Result<SignedIdentifier, QueueStorageError> {
            let id = node.required_text("Id")?.to_string();
            let access_policy = match node.child("AccessPolicy") {
                Some(policy) => AccessPolicy {
                    start: optional_time(policy, "Start")?,
                    expiry: optional_time(policy, "Expiry")?,
                    permissions: policy
                        .child_text("Permission")
                        .map(str::parse::<QueuePermissions>)
                        .transpose()?,
                },
                None => AccessPolicy::default(),
            };
            Ok(SignedIdentifier { id, access_policy })
        })
        .collect()
}
