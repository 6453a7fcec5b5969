//! Request authorization: Shared Key signing and shared access signatures.
//!
//! Shared Key signing process:
//! 1. Build the string to sign from the verb, the standard headers, the
//!    canonicalized `x-ms-*` headers and the canonicalized resource
//! 2. HMAC-SHA256 it with the base64-decoded account key
//! 3. Send `Authorization: SharedKey {account}:{base64 signature}`
//!
//! ## References
//!
//! - [Authorize with Shared Key](https://learn.microsoft.com/rest/api/storageservices/authorize-with-shared-key)

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use reqwest::Method;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// Standard headers included, in this order, in the string to sign
const SIGNED_STANDARD_HEADERS: [&str; 10] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
];

/// Shared Key signer for request authentication
#[derive(Clone)]
pub(crate) struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SharedKeySigner {
    pub fn new(account: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            account: account.into(),
            key,
        }
    }

    /// Build the `Authorization` header value for a request
    ///
    /// `headers` must already contain every `x-ms-*` header that will be sent.
    pub fn authorization(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        content_length: usize,
    ) -> String {
        let string_to_sign = self.string_to_sign(method, url, headers, content_length);
        let signature = self.signature(&string_to_sign);
        format!("SharedKey {}:{}", self.account, signature)
    }

    /// Compute the base64 HMAC-SHA256 signature of a string
    pub fn signature(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Build the Shared Key string to sign
    pub fn string_to_sign(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        content_length: usize,
    ) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(SIGNED_STANDARD_HEADERS.len() + 2);
        parts.push(method.as_str().to_string());

        for name in SIGNED_STANDARD_HEADERS {
            let value = if name == "content-length" {
                // Zero length is signed as an empty string.
                if content_length == 0 {
                    String::new()
                } else {
                    content_length.to_string()
                }
            } else {
                header_value(headers, name)
            };
            parts.push(value);
        }
        parts.push(header_value(headers, "range"));

        let mut string_to_sign = parts.join("\n");
        string_to_sign.push('\n');
        string_to_sign.push_str(&canonicalized_headers(headers));
        string_to_sign.push_str(&self.canonicalized_resource(url));
        string_to_sign
    }

    /// `/{account}{path}` followed by one `\nname:values` line per query parameter
    fn canonicalized_resource(&self, url: &Url) -> String {
        let mut resource = format!("/{}{}", self.account, url.path());

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.into_owned());
        }

        for (name, mut values) in params {
            values.sort();
            resource.push('\n');
            resource.push_str(&name);
            resource.push(':');
            resource.push_str(&values.join(","));
        }

        resource
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
}

/// Sorted `name:value\n` lines for every `x-ms-*` header
fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut names: Vec<&str> = headers
        .keys()
        .map(|k| k.as_str())
        .filter(|k| k.starts_with("x-ms-"))
        .collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .map(|name| format!("{}:{}\n", name, header_value(headers, name)))
        .collect()
}

/// Append the query parameters of a shared access signature to a request URL
pub(crate) fn append_shared_access_signature(url: &mut Url, sas: &str) {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(sas.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    for (name, value) in pairs {
        query.append_pair(&name, &value);
    }
}
