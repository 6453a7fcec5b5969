//! Storage account settings parsed from a connection string.
//!
//! A connection string is a `;`-separated list of `Key=Value` settings, e.g.
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=myaccount;AccountKey=<base64>;EndpointSuffix=core.windows.net
//! ```
//!
//! `UseDevelopmentStorage=true` selects the local storage emulator with its
//! well-known development account.

use crate::error::QueueStorageError;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::fmt;
use url::Url;

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;

/// Account name of the local storage emulator
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Published account key of the local storage emulator
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEVELOPMENT_QUEUE_PORT: u16 = 10001;
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Credentials used to authorize requests
#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredentials {
    /// Account name and decoded account key, used for Shared Key signing
    SharedKey { account: String, key: Vec<u8> },
    /// Shared access signature query string (without the leading `?`)
    SharedAccessSignature(String),
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Self::SharedAccessSignature(_) => f
                .debug_tuple("SharedAccessSignature")
                .field(&"<redacted>")
                .finish(),
        }
    }
}

/// Parsed storage account settings
#[derive(Debug, Clone)]
pub struct StorageAccount {
    name: String,
    credentials: StorageCredentials,
    queue_endpoint: Url,
    secondary_queue_endpoint: Option<Url>,
}

impl StorageAccount {
    /// Create account settings for an account with a Shared Key
    ///
    /// Endpoints are derived as `https://{name}.queue.core.windows.net`.
    pub fn new(name: &str, key: &str) -> Result<Self, QueueStorageError> {
        let key = decode_key(key)?;
        let queue_endpoint = derived_endpoint("https", name, DEFAULT_ENDPOINT_SUFFIX, false)?;
        let secondary = derived_endpoint("https", name, DEFAULT_ENDPOINT_SUFFIX, true)?;

        Ok(Self {
            name: name.to_string(),
            credentials: StorageCredentials::SharedKey {
                account: name.to_string(),
                key,
            },
            queue_endpoint,
            secondary_queue_endpoint: Some(secondary),
        })
    }

    /// Account settings for the local storage emulator
    pub fn development() -> Self {
        Self::development_with_proxy(None).expect("development storage settings are valid")
    }

    fn development_with_proxy(proxy: Option<&str>) -> Result<Self, QueueStorageError> {
        let (scheme, host) = match proxy {
            Some(proxy) => {
                let proxy = Url::parse(proxy).map_err(|e| {
                    let message = format!("invalid DevelopmentStorageProxyUri '{}': {}", proxy, e);
                    invalid(message)
                })?;
                let host = proxy
                    .host_str()
                    .ok_or_else(|| invalid("DevelopmentStorageProxyUri has no host"))?
                    .to_string();
                (proxy.scheme().to_string(), host)
            }
            None => ("http".to_string(), "127.0.0.1".to_string()),
        };

        let primary = parse_endpoint(&format!(
            "{}://{}:{}/{}",
            scheme, host, DEVELOPMENT_QUEUE_PORT, DEVELOPMENT_ACCOUNT_NAME
        ))?;
        let secondary = parse_endpoint(&format!(
            "{}://{}:{}/{}-secondary",
            scheme, host, DEVELOPMENT_QUEUE_PORT, DEVELOPMENT_ACCOUNT_NAME
        ))?;

        Ok(Self {
            name: DEVELOPMENT_ACCOUNT_NAME.to_string(),
            credentials: StorageCredentials::SharedKey {
                account: DEVELOPMENT_ACCOUNT_NAME.to_string(),
                key: decode_key(DEVELOPMENT_ACCOUNT_KEY)?,
            },
            queue_endpoint: primary,
            secondary_queue_endpoint: Some(secondary),
        })
    }

    /// Parse a storage connection string
    ///
    /// # Errors
    ///
    /// Returns `InvalidConnectionString` when the string is empty, a setting
    /// is malformed or duplicated, the protocol is unknown, the account key is
    /// not valid base64, or no endpoint or credentials can be determined.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, QueueStorageError> {
        let settings = parse_settings(connection_string)?;

        if let Some(value) = settings.get("usedevelopmentstorage") {
            if !value.eq_ignore_ascii_case("true") {
                return Err(invalid(format!(
                    "UseDevelopmentStorage must be 'true', found '{}'",
                    value
                )));
            }
            if let Some(unexpected) = settings
                .keys()
                .find(|k| *k != "usedevelopmentstorage" && *k != "developmentstorageproxyuri")
            {
                return Err(invalid(format!(
                    "UseDevelopmentStorage cannot be combined with '{}'",
                    unexpected
                )));
            }
            let proxy = settings.get("developmentstorageproxyuri");
            return Self::development_with_proxy(proxy.map(String::as_str));
        }

        let protocol = settings
            .get("defaultendpointsprotocol")
            .map(|p| p.to_ascii_lowercase())
            .unwrap_or_else(|| "https".to_string());
        if protocol != "https" && protocol != "http" {
            return Err(invalid(format!(
                "DefaultEndpointsProtocol must be 'http' or 'https', found '{}'",
                protocol
            )));
        }

        let account_name = settings.get("accountname").cloned();
        let suffix = settings
            .get("endpointsuffix")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);

        let (queue_endpoint, secondary_queue_endpoint) = match settings.get("queueendpoint") {
            Some(endpoint) => {
                let primary = parse_endpoint(endpoint)?;
                let secondary = settings
                    .get("queuesecondaryendpoint")
                    .map(|e| parse_endpoint(e))
                    .transpose()?;
                (primary, secondary)
            }
            None => {
                let name = account_name
                    .as_deref()
                    .ok_or_else(|| invalid("AccountName or QueueEndpoint must be specified"))?;
                let primary = derived_endpoint(&protocol, name, suffix, false)?;
                let secondary = match settings.get("queuesecondaryendpoint") {
                    Some(e) => parse_endpoint(e)?,
                    None => derived_endpoint(&protocol, name, suffix, true)?,
                };
                (primary, Some(secondary))
            }
        };

        let name = match account_name {
            Some(name) => name,
            None => queue_endpoint
                .host_str()
                .and_then(|h| h.split('.').next())
                .unwrap_or_default()
                .to_string(),
        };

        let credentials = match (
            settings.get("accountkey"),
            settings.get("sharedaccesssignature"),
        ) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "AccountKey and SharedAccessSignature cannot both be specified",
                ))
            }
            (Some(key), None) => {
                if !settings.contains_key("accountname") {
                    return Err(invalid("AccountKey requires AccountName"));
                }
                StorageCredentials::SharedKey {
                    account: name.clone(),
                    key: decode_key(key)?,
                }
            }
            (None, Some(sas)) => {
                let sas = sas.trim_start_matches('?');
                if sas.is_empty() {
                    return Err(invalid("SharedAccessSignature is empty"));
                }
                StorageCredentials::SharedAccessSignature(sas.to_string())
            }
            (None, None) => {
                return Err(invalid(
                    "AccountKey or SharedAccessSignature must be specified",
                ))
            }
        };

        Ok(Self {
            name,
            credentials,
            queue_endpoint,
            secondary_queue_endpoint,
        })
    }

    /// Storage account name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Credentials used to authorize requests
    pub fn credentials(&self) -> &StorageCredentials {
        &self.credentials
    }

    /// Primary queue service endpoint
    pub fn queue_endpoint(&self) -> &Url {
        &self.queue_endpoint
    }

    /// Secondary (read-access geo-replica) queue endpoint, when known
    pub fn secondary_queue_endpoint(&self) -> Option<&Url> {
        self.secondary_queue_endpoint.as_ref()
    }

    /// Replace the primary endpoint, keeping the credentials
    pub fn with_queue_endpoint(mut self, endpoint: Url) -> Self {
        self.queue_endpoint = endpoint;
        self
    }

    /// Replace the secondary endpoint, keeping the credentials
    pub fn with_secondary_queue_endpoint(mut self, endpoint: Option<Url>) -> Self {
        self.secondary_queue_endpoint = endpoint;
        self
    }
}

fn invalid(message: impl Into<String>) -> QueueStorageError {
    QueueStorageError::InvalidConnectionString {
        message: message.into(),
    }
}

fn parse_settings(connection_string: &str) -> Result<HashMap<String, String>, QueueStorageError> {
    if connection_string.trim().is_empty() {
        return Err(invalid("connection string is empty"));
    }

    let mut settings = HashMap::new();
    for segment in connection_string.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        // Values (keys, signatures) may themselves contain '='.
        let (key, value) = match segment.split_once('=') {
            Some(pair) => pair,
            None => {
                let message = format!("setting '{}' is not of the form Key=Value", segment);
                return Err(invalid(message));
            }
        };
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(invalid("setting with an empty name"));
        }

        if settings.insert(key.clone(), value.trim().to_string()).is_some() {
            let message = format!("setting '{}' is specified more than once", key);
            return Err(invalid(message));
        }
    }

    Ok(settings)
}

fn decode_key(key: &str) -> Result<Vec<u8>, QueueStorageError> {
    let decoded = STANDARD
        .decode(key.trim())
        .map_err(|e| invalid(format!("AccountKey is not valid base64: {}", e)))?;
    if decoded.is_empty() {
        return Err(invalid("AccountKey is empty"));
    }
    Ok(decoded)
}

fn parse_endpoint(endpoint: &str) -> Result<Url, QueueStorageError> {
    let url = Url::parse(endpoint).map_err(|e| {
        let message = format!("endpoint '{}' is not a valid URI: {}", endpoint, e);
        invalid(message)
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        let message = format!("endpoint '{}' must use http or https", endpoint);
        return Err(invalid(message));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid(format!("endpoint '{}' has no host", endpoint)));
    }
    Ok(url)
}

fn derived_endpoint(
    protocol: &str,
    account: &str,
    suffix: &str,
    secondary: bool,
) -> Result<Url, QueueStorageError> {
    if account.is_empty() {
        return Err(invalid("AccountName is empty"));
    }
    let host_account = if secondary {
        format!("{}-secondary", account)
    } else {
        account.to_string()
    };
    parse_endpoint(&format!("{}://{}.queue.{}", protocol, host_account, suffix))
}
