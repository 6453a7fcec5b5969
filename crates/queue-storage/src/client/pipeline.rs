//! Request pipeline shared by the service and queue clients.
//!
//! Every request is stamped with the protocol headers, authorized with the
//! account credentials, sent, and retried according to the client's
//! [`RetryPolicy`](crate::retry::RetryPolicy) while the failure is transient.

use super::ClientOptions;
use crate::account::{StorageAccount, StorageCredentials};
use crate::auth::{append_shared_access_signature, SharedKeySigner};
use crate::error::{ConfigurationError, QueueStorageError, ValidationError};
use crate::message::format_http_date;
use crate::xml;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

const VERSION_HEADER: &str = "x-ms-version";
const DATE_HEADER: &str = "x-ms-date";
const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// A request before protocol headers and authorization are applied
#[derive(Debug, Clone)]
pub(crate) struct StorageRequest<'a> {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<String>,
    queue_name: Option<&'a str>,
    message_id: Option<&'a str>,
}

impl<'a> StorageRequest<'a> {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            queue_name: None,
            message_id: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, QueueStorageError> {
        let lowercase = name.to_ascii_lowercase();
        let name = HeaderName::from_bytes(lowercase.as_bytes())
            .map_err(|_| invalid_header(format!("'{}' is not a valid header name", lowercase)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| invalid_header(format!("value of '{}' is not valid", lowercase)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Attach an XML request body
    pub fn xml_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Queue the request addresses, used to name the queue in errors
    pub fn for_queue(mut self, queue_name: &'a str) -> Self {
        self.queue_name = Some(queue_name);
        self
    }

    /// Message the request addresses, used to name the message in errors
    pub fn for_message(mut self, message_id: &'a str) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

/// Buffered response of a successful request
#[derive(Debug)]
pub(crate) struct StorageResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl StorageResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn required_header(&self, name: &str) -> Result<&str, QueueStorageError> {
        self.header(name).ok_or_else(|| {
            QueueStorageError::xml(format!("response is missing the '{}' header", name))
        })
    }
}

/// HTTP client plus the credentials and options used for every request
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    http: reqwest::Client,
    credentials: StorageCredentials,
    signer: Option<SharedKeySigner>,
    options: ClientOptions,
}

impl Pipeline {
    pub fn new(
        account: &StorageAccount,
        options: ClientOptions,
    ) -> Result<Self, QueueStorageError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| QueueStorageError::ConnectionFailed {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let signer = match account.credentials() {
            StorageCredentials::SharedKey { account, key } => {
                Some(SharedKeySigner::new(account.clone(), key.clone()))
            }
            StorageCredentials::SharedAccessSignature(_) => None,
        };

        Ok(Self {
            http,
            credentials: account.credentials().clone(),
            signer,
            options,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Send a request, retrying transient failures
    pub async fn send(
        &self,
        request: StorageRequest<'_>,
    ) -> Result<StorageResponse, QueueStorageError> {
        let policy = &self.options.retry_policy;
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if policy.should_retry(attempt, &e) => {
                    attempt += 1;
                    let delay = policy.calculate_delay(attempt);
                    warn!(
                        method = %request.method,
                        path = %request.url.path(),
                        attempt,
                        delay_ms = (delay.as_millis() as u64),
                        error = %e,
                        "Transient storage failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        request: &StorageRequest<'_>,
    ) -> Result<StorageResponse, QueueStorageError> {
        let mut url = request.url.clone();
        if let StorageCredentials::SharedAccessSignature(sas) = &self.credentials {
            append_shared_access_signature(&mut url, sas);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let mut headers = request.headers.clone();
        headers.insert(VERSION_HEADER, header_value(&self.options.api_version)?);
        headers.insert(DATE_HEADER, header_value(&format_http_date(&Utc::now()))?);
        headers.insert(CLIENT_REQUEST_ID_HEADER, header_value(&request_id)?);

        let body = request.body.clone().unwrap_or_default();
        if request.body.is_some() {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/xml; charset=utf-8"),
            );
        }

        if let Some(signer) = &self.signer {
            let authorization = signer.authorization(&request.method, &url, &headers, body.len());
            headers.insert(AUTHORIZATION, header_value(&authorization)?);
        }

        debug!(
            method = %request.method,
            path = %url.path(),
            request_id = %request_id,
            "Sending storage request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers);
        // Content-Length is required on every write, even without a body.
        if request.method != Method::GET && request.method != Method::HEAD {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                QueueStorageError::Timeout {
                    duration: self.options.timeout,
                }
            } else if e.is_connect() {
                QueueStorageError::ConnectionFailed {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                QueueStorageError::ConnectionFailed {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            let message = format!("Failed to read response body: {}", e);
            QueueStorageError::ConnectionFailed { message }
        })?;

        debug!(
            status = status.as_u16(),
            request_id = %request_id,
            "Received storage response"
        );

        if !status.is_success() {
            return Err(parse_error_response(
                status,
                &headers,
                &body,
                request.queue_name,
                request.message_id,
            ));
        }

        Ok(StorageResponse {
            status,
            headers,
            body,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, QueueStorageError> {
    HeaderValue::from_str(value)
        .map_err(|_| invalid_header(format!("'{}' is not a valid header value", value)).into())
}

fn invalid_header(message: String) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "header".to_string(),
        message,
    }
}

/// Map an error response to the matching error variant
///
/// The error code comes from the `x-ms-error-code` header, falling back to the
/// `<Error><Code>` element of the body (HEAD responses carry no body).
pub(crate) fn parse_error_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    queue_name: Option<&str>,
    message_id: Option<&str>,
) -> QueueStorageError {
    let (body_code, body_message) = match xml::parse_root(body, "Error") {
        Ok(error) => (
            error.child_text("Code").map(str::to_string),
            error.child_text("Message").map(|m| m.trim().to_string()),
        ),
        Err(_) => (None, None),
    };

    let code = headers
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(body_code)
        .unwrap_or_else(|| "Unknown".to_string());
    let message = body_message
        .filter(|m| !m.is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Unknown error".to_string());

    match code.as_str() {
        "QueueNotFound" => QueueStorageError::QueueNotFound {
            queue_name: queue_name.unwrap_or_default().to_string(),
        },
        "QueueAlreadyExists" => QueueStorageError::QueueAlreadyExists {
            queue_name: queue_name.unwrap_or_default().to_string(),
        },
        "MessageNotFound" | "PopReceiptMismatch" => QueueStorageError::MessageNotFound {
            message_id: message_id.unwrap_or_default().to_string(),
        },
        _ if is_auth_failure(&code, status) => QueueStorageError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        },
        _ => QueueStorageError::Service {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

fn is_auth_failure(code: &str, status: StatusCode) -> bool {
    matches!(code, "AuthenticationFailed" | "AuthorizationFailure")
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
}

/// Append path segments to an endpoint, keeping any path it already has
pub(crate) fn resource_url(base: &Url, segments: &[&str]) -> Result<Url, QueueStorageError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ConfigurationError::Invalid {
            message: format!("'{}' cannot be used as a queue endpoint", base),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Append query parameters, leaving the URL untouched when there are none
pub(crate) fn with_query(mut url: Url, params: &[(&str, String)]) -> Url {
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            query.append_pair(name, value);
        }
    }
    url
}
