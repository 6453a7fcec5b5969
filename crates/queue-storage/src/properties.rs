//! Account-level service configuration: analytics logging, metrics, CORS and
//! geo-replication statistics.
//!
//! Every section of [`ServiceProperties`] is optional. A section left as
//! `None` is omitted from the set request and the service keeps its current
//! value, so a read-modify-write only needs to touch what it changes.

use crate::error::{QueueStorageError, ValidationError};
use crate::message::parse_http_date;
use crate::xml::{self, XmlNode, XmlWriter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "properties_tests.rs"]
mod tests;

/// Analytics schema version understood by this binding
pub const ANALYTICS_VERSION: &str = "1.0";

/// Maximum number of CORS rules per service
pub const MAX_CORS_RULES: usize = 5;

/// Maximum retention for logs and metrics
pub const MAX_RETENTION_DAYS: u32 = 365;

/// Queue service properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProperties {
    pub logging: Option<Logging>,
    pub hour_metrics: Option<Metrics>,
    pub minute_metrics: Option<Metrics>,
    /// `None` leaves the rules unchanged; `Some(vec![])` removes all rules
    pub cors: Option<Vec<CorsRule>>,
}

/// Analytics logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logging {
    pub version: String,
    pub delete: bool,
    pub read: bool,
    pub write: bool,
    pub retention_policy: RetentionPolicy,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            version: ANALYTICS_VERSION.to_string(),
            delete: false,
            read: false,
            write: false,
            retention_policy: RetentionPolicy::disabled(),
        }
    }
}

/// Which requests metrics are aggregated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricsLevel {
    /// Metrics disabled
    None,
    /// Service-level aggregates only
    Service,
    /// Service-level aggregates plus per-API breakdown
    ServiceAndApi,
}

/// Hour or minute metrics settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub version: String,
    pub level: MetricsLevel,
    pub retention_policy: RetentionPolicy,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            version: ANALYTICS_VERSION.to_string(),
            level: MetricsLevel::None,
            retention_policy: RetentionPolicy::disabled(),
        }
    }
}

/// How long logs or metrics are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub enabled: bool,
    /// Only meaningful when enabled
    pub days: Option<u32>,
}

impl RetentionPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            days: None,
        }
    }

    pub fn days(days: u32) -> Self {
        Self {
            enabled: true,
            days: Some(days),
        }
    }

    fn validate(&self, section: &str) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        match self.days {
            Some(days) if (1..=MAX_RETENTION_DAYS).contains(&days) => Ok(()),
            Some(days) => Err(ValidationError::OutOfRange {
                field: format!("{}.retention_policy.days", section),
                message: format!("must be 1-{}, got {}", MAX_RETENTION_DAYS, days),
            }),
            None => Err(ValidationError::Required {
                field: format!("{}.retention_policy.days", section),
            }),
        }
    }
}

/// HTTP method allowed by a CORS rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorsMethod {
    Delete,
    Get,
    Head,
    Merge,
    Post,
    Options,
    Put,
    Patch,
}

impl fmt::Display for CorsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Merge => "MERGE",
            Self::Post => "POST",
            Self::Options => "OPTIONS",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CorsMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "MERGE" => Ok(Self::Merge),
            "POST" => Ok(Self::Post),
            "OPTIONS" => Ok(Self::Options),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            other => Err(ValidationError::InvalidFormat {
                field: "allowed_methods".to_string(),
                message: format!("unknown CORS method '{}'", other),
            }),
        }
    }
}

/// Cross-origin resource sharing rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<CorsMethod>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub max_age_in_seconds: u32,
}

/// Geo-replication state of the secondary location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoReplicationStatus {
    Live,
    Bootstrap,
    Unavailable,
}

impl fmt::Display for GeoReplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Bootstrap => write!(f, "bootstrap"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

impl FromStr for GeoReplicationStatus {
    type Err = QueueStorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "bootstrap" => Ok(Self::Bootstrap),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(QueueStorageError::xml(format!(
                "unknown geo-replication status '{}'",
                other
            ))),
        }
    }
}

/// Replication statistics reported by the secondary location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub status: GeoReplicationStatus,
    /// Writes before this time are guaranteed to be readable from the secondary
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl ServiceStats {
    pub(crate) fn from_xml(body: &str) -> Result<Self, QueueStorageError> {
        let root = xml::parse_root(body, "StorageServiceStats")?;
        let geo = root.required_child("GeoReplication")?;

        let status = geo.required_text("Status")?.parse()?;
        let last_sync_time = match geo.child_text("LastSyncTime").map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(parse_http_date(text)?),
        };

        Ok(Self {
            status,
            last_sync_time,
        })
    }
}

impl ServiceProperties {
    /// Check the limits the service enforces before sending a set request
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(logging) = &self.logging {
            logging.retention_policy.validate("logging")?;
        }
        if let Some(metrics) = &self.hour_metrics {
            metrics.retention_policy.validate("hour_metrics")?;
        }
        if let Some(metrics) = &self.minute_metrics {
            metrics.retention_policy.validate("minute_metrics")?;
        }
        if let Some(rules) = &self.cors {
            if rules.len() > MAX_CORS_RULES {
                let count = rules.len();
                let message = format!("at most {} rules allowed, got {}", MAX_CORS_RULES, count);
                return Err(ValidationError::OutOfRange {
                    field: "cors".to_string(),
                    message,
                });
            }
            for rule in rules {
                if rule.allowed_origins.is_empty() {
                    return Err(ValidationError::Required {
                        field: "cors.allowed_origins".to_string(),
                    });
                }
                if rule.allowed_methods.is_empty() {
                    return Err(ValidationError::Required {
                        field: "cors.allowed_methods".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn from_xml(body: &str) -> Result<Self, QueueStorageError> {
        let root = xml::parse_root(body, "StorageServiceProperties")?;

        let logging = root.child("Logging").map(logging_from_node).transpose()?;
        let hour_metrics = root
            .child("HourMetrics")
            .map(metrics_from_node)
            .transpose()?;
        let minute_metrics = root
            .child("MinuteMetrics")
            .map(metrics_from_node)
            .transpose()?;
        let cors = root
            .child("Cors")
            .map(|cors| {
                cors.children_named("CorsRule")
                    .map(cors_rule_from_node)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(Self {
            logging,
            hour_metrics,
            minute_metrics,
            cors,
        })
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut writer = XmlWriter::new();
        writer.open("StorageServiceProperties");

        if let Some(logging) = &self.logging {
            writer
                .open("Logging")
                .element("Version", &logging.version)
                .element("Delete", bool_text(logging.delete))
                .element("Read", bool_text(logging.read))
                .element("Write", bool_text(logging.write));
            write_retention(&mut writer, &logging.retention_policy);
            writer.close("Logging");
        }
        if let Some(metrics) = &self.hour_metrics {
            write_metrics(&mut writer, "HourMetrics", metrics);
        }
        if let Some(metrics) = &self.minute_metrics {
            write_metrics(&mut writer, "MinuteMetrics", metrics);
        }
        if let Some(rules) = &self.cors {
            writer.open("Cors");
            for rule in rules {
                let methods = rule
                    .allowed_methods
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                writer
                    .open("CorsRule")
                    .element("AllowedOrigins", &rule.allowed_origins.join(","))
                    .element("AllowedMethods", &methods)
                    .element("MaxAgeInSeconds", &rule.max_age_in_seconds.to_string())
                    .element("ExposedHeaders", &rule.exposed_headers.join(","))
                    .element("AllowedHeaders", &rule.allowed_headers.join(","))
                    .close("CorsRule");
            }
            writer.close("Cors");
        }

        writer.close("StorageServiceProperties");
        writer.finish()
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn write_retention(writer: &mut XmlWriter, policy: &RetentionPolicy) {
    writer
        .open("RetentionPolicy")
        .element("Enabled", bool_text(policy.enabled));
    if policy.enabled {
        if let Some(days) = policy.days {
            writer.element("Days", &days.to_string());
        }
    }
    writer.close("RetentionPolicy");
}

fn write_metrics(writer: &mut XmlWriter, section: &str, metrics: &Metrics) {
    let enabled = metrics.level != MetricsLevel::None;
    writer
        .open(section)
        .element("Version", &metrics.version)
        .element("Enabled", bool_text(enabled));
    if enabled {
        writer.element(
            "IncludeAPIs",
            bool_text(metrics.level == MetricsLevel::ServiceAndApi),
        );
    }
    write_retention(writer, &metrics.retention_policy);
    writer.close(section);
}

fn retention_from_node(node: Option<&XmlNode>) -> Result<RetentionPolicy, QueueStorageError> {
    let Some(node) = node else {
        return Ok(RetentionPolicy::disabled());
    };
    Ok(RetentionPolicy {
        enabled: node.bool_child("Enabled")?.unwrap_or(false),
        days: node.parse_child("Days")?,
    })
}

fn logging_from_node(node: &XmlNode) -> Result<Logging, QueueStorageError> {
    Ok(Logging {
        version: node
            .child_text("Version")
            .unwrap_or(ANALYTICS_VERSION)
            .to_string(),
        delete: node.bool_child("Delete")?.unwrap_or(false),
        read: node.bool_child("Read")?.unwrap_or(false),
        write: node.bool_child("Write")?.unwrap_or(false),
        retention_policy: retention_from_node(node.child("RetentionPolicy"))?,
    })
}

fn metrics_from_node(node: &XmlNode) -> Result<Metrics, QueueStorageError> {
    let enabled = node.bool_child("Enabled")?.unwrap_or(false);
    let include_apis = node.bool_child("IncludeAPIs")?.unwrap_or(false);
    let level = match (enabled, include_apis) {
        (false, _) => MetricsLevel::None,
        (true, false) => MetricsLevel::Service,
        (true, true) => MetricsLevel::ServiceAndApi,
    };

    Ok(Metrics {
        version: node
            .child_text("Version")
            .unwrap_or(ANALYTICS_VERSION)
            .to_string(),
        level,
        retention_policy: retention_from_node(node.child("RetentionPolicy"))?,
    })
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn cors_rule_from_node(node: &XmlNode) -> Result<CorsRule, QueueStorageError> {
    let allowed_methods = split_list(node.child_text("AllowedMethods"))
        .iter()
        .map(|m| m.parse::<CorsMethod>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsRule {
        allowed_origins: split_list(node.child_text("AllowedOrigins")),
        allowed_methods,
        allowed_headers: split_list(node.child_text("AllowedHeaders")),
        exposed_headers: split_list(node.child_text("ExposedHeaders")),
        max_age_in_seconds: node.parse_child("MaxAgeInSeconds")?.unwrap_or(0),
    })
}
