//! Clients for the queue service REST protocol.
//!
//! [`QueueServiceClient`] covers account-level calls (listing queues, service
//! properties and statistics) and hands out [`QueueClient`]s for queue-level
//! calls. All clients derived from one service client share its HTTP
//! connection pool.
//!
//! # Examples
//!
//! ```no_run
//! use queue_storage::{QueueName, QueueServiceClient, StorageAccount};
//!
//! # async fn example() -> Result<(), queue_storage::QueueStorageError> {
//! let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true")?;
//! let service = QueueServiceClient::new(account)?;
//!
//! let queue = service.queue_client(QueueName::new("orders")?);
//! queue.create_if_not_exists(&Default::default()).await?;
//! queue.send_message("Hello World!", None, None).await?;
//! # Ok(())
//! # }
//! ```

use crate::account::StorageAccount;
use crate::error::{ConfigurationError, QueueStorageError};
use crate::message::MessageEncoding;
use crate::properties::{ServiceProperties, ServiceStats};
use crate::queue::{QueueItem, QueueName, QueueSegment};
use crate::retry::RetryPolicy;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

mod pipeline;
mod queue_client;

pub use queue_client::QueueClient;

use pipeline::{with_query, Pipeline, StorageRequest};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// REST protocol version sent with every request
pub const API_VERSION: &str = "2019-12-12";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout, applied to each attempt
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry_policy: RetryPolicy,
    /// User agent sent with every request
    pub user_agent: String,
    /// Encoding of message text on the wire
    pub message_encoding: MessageEncoding,
    /// Value of the `x-ms-version` header
    pub api_version: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            user_agent: concat!("queue-storage/", env!("CARGO_PKG_VERSION")).to_string(),
            message_encoding: MessageEncoding::default(),
            api_version: API_VERSION.to_string(),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set how message text is encoded.
    pub fn with_message_encoding(mut self, encoding: MessageEncoding) -> Self {
        self.message_encoding = encoding;
        self
    }
}

/// Account-level client
#[derive(Debug, Clone)]
pub struct QueueServiceClient {
    pipeline: Pipeline,
    endpoint: Url,
    secondary_endpoint: Option<Url>,
    account_name: String,
}

impl QueueServiceClient {
    /// Create a client with default options
    pub fn new(account: StorageAccount) -> Result<Self, QueueStorageError> {
        Self::with_options(account, ClientOptions::default())
    }

    pub fn with_options(
        account: StorageAccount,
        options: ClientOptions,
    ) -> Result<Self, QueueStorageError> {
        let pipeline = Pipeline::new(&account, options)?;
        Ok(Self {
            pipeline,
            endpoint: account.queue_endpoint().clone(),
            secondary_endpoint: account.secondary_queue_endpoint().cloned(),
            account_name: account.name().to_string(),
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Primary queue endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn options(&self) -> &ClientOptions {
        self.pipeline.options()
    }

    /// Client for one queue, sharing this client's connection pool
    pub fn queue_client(&self, queue_name: QueueName) -> QueueClient {
        QueueClient::new(self.pipeline.clone(), &self.endpoint, queue_name)
    }

    /// List one page of queues
    ///
    /// `marker` is the `next_marker` of the previous page.
    pub async fn list_queues_segment(
        &self,
        prefix: Option<&str>,
        marker: Option<&str>,
        max_results: Option<u32>,
        include_metadata: bool,
    ) -> Result<QueueSegment, QueueStorageError> {
        let mut params = vec![("comp", "list".to_string())];
        if let Some(prefix) = prefix {
            params.push(("prefix", prefix.to_string()));
        }
        if let Some(marker) = marker {
            params.push(("marker", marker.to_string()));
        }
        if let Some(max_results) = max_results {
            params.push(("maxresults", max_results.to_string()));
        }
        if include_metadata {
            params.push(("include", "metadata".to_string()));
        }

        let url = with_query(self.endpoint.clone(), &params);
        let request = StorageRequest::new(Method::GET, url);
        let response = self.pipeline.send(request).await?;
        QueueSegment::from_xml(&response.body)
    }

    /// List all queues, following continuation markers until exhausted
    pub async fn list_queues(
        &self,
        prefix: Option<&str>,
        include_metadata: bool,
    ) -> Result<Vec<QueueItem>, QueueStorageError> {
        let mut queues = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let segment = self
                .list_queues_segment(prefix, marker.as_deref(), None, include_metadata)
                .await?;
            debug!(
                count = segment.queues.len(),
                has_more = segment.next_marker.is_some(),
                "Listed queue segment"
            );
            queues.extend(segment.queues);

            match segment.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(queues)
    }

    /// Read the logging, metrics and CORS settings of the service
    pub async fn get_properties(&self) -> Result<ServiceProperties, QueueStorageError> {
        let url = service_url(&self.endpoint, "properties");
        let request = StorageRequest::new(Method::GET, url);
        let response = self.pipeline.send(request).await?;
        ServiceProperties::from_xml(&response.body)
    }

    /// Replace the service settings; sections left as `None` are unchanged
    pub async fn set_properties(
        &self,
        properties: &ServiceProperties,
    ) -> Result<(), QueueStorageError> {
        properties.validate()?;

        let url = service_url(&self.endpoint, "properties");
        let body = properties.to_xml();
        let request = StorageRequest::new(Method::PUT, url).xml_body(body);
        self.pipeline.send(request).await?;

        info!(account = %self.account_name, "Service properties updated");
        Ok(())
    }

    /// Read geo-replication statistics from the secondary endpoint
    pub async fn get_statistics(&self) -> Result<ServiceStats, QueueStorageError> {
        let secondary = self
            .secondary_endpoint
            .as_ref()
            .ok_or_else(|| ConfigurationError::Missing {
                key: "secondary queue endpoint".to_string(),
            })?;

        let url = service_url(secondary, "stats");
        let request = StorageRequest::new(Method::GET, url);
        let response = self.pipeline.send(request).await?;
        ServiceStats::from_xml(&response.body)
    }
}

fn service_url(endpoint: &Url, comp: &str) -> Url {
    let params = [
        ("restype", "service".to_string()),
        ("comp", comp.to_string()),
    ];
    with_query(endpoint.clone(), &params)
}
