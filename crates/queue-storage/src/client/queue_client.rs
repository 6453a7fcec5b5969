//! Queue-level operations: lifecycle, metadata, messages and access policies.

use super::pipeline::{resource_url, with_query, Pipeline, StorageRequest, StorageResponse};
use crate::acl::{self, SignedIdentifier};
use crate::error::QueueStorageError;
use crate::message::{
    self, parse_http_date, PeekedMessage, QueueMessage, SentMessage, TimeToLive, UpdatedMessage,
};
use crate::queue::{self, Metadata, QueueName, QueueProperties, METADATA_HEADER_PREFIX};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[cfg(test)]
#[path = "queue_client_tests.rs"]
mod tests;

const APPROXIMATE_COUNT_HEADER: &str = "x-ms-approximate-messages-count";
const POP_RECEIPT_HEADER: &str = "x-ms-popreceipt";
const TIME_NEXT_VISIBLE_HEADER: &str = "x-ms-time-next-visible";

/// Client for a single queue
///
/// Obtained from [`QueueServiceClient::queue_client`](super::QueueServiceClient::queue_client).
#[derive(Debug, Clone)]
pub struct QueueClient {
    pipeline: Pipeline,
    name: QueueName,
    url: Url,
}

impl QueueClient {
    pub(crate) fn new(pipeline: Pipeline, endpoint: &Url, name: QueueName) -> Self {
        let mut url = endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name.as_str());
        }
        Self {
            pipeline,
            name,
            url,
        }
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// URL of the queue resource
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request(&self, method: Method, url: Url) -> StorageRequest<'_> {
        StorageRequest::new(method, url).for_queue(self.name.as_str())
    }

    fn queue_url(&self, params: &[(&str, String)]) -> Url {
        with_query(self.url.clone(), params)
    }

    fn messages_url(&self, params: &[(&str, String)]) -> Result<Url, QueueStorageError> {
        Ok(with_query(resource_url(&self.url, &["messages"])?, params))
    }

    fn with_metadata<'a>(
        request: StorageRequest<'a>,
        metadata: &Metadata,
    ) -> Result<StorageRequest<'a>, QueueStorageError> {
        queue::validate_metadata(metadata)?;
        metadata.iter().try_fold(request, |request, (name, value)| {
            request.header(&format!("{}{}", METADATA_HEADER_PREFIX, name), value)
        })
    }

    async fn send_create(&self, metadata: &Metadata) -> Result<StorageResponse, QueueStorageError> {
        let request = Self::with_metadata(self.request(Method::PUT, self.url.clone()), metadata)?;
        self.pipeline.send(request).await
    }

    /// Create the queue
    ///
    /// Succeeds when the queue already exists with identical metadata; fails
    /// with [`QueueStorageError::QueueAlreadyExists`] when the metadata differs.
    pub async fn create(&self, metadata: &Metadata) -> Result<(), QueueStorageError> {
        self.send_create(metadata).await?;
        info!(queue_name = %self.name, "Queue created");
        Ok(())
    }

    /// Create the queue unless it exists; returns `true` when it was created
    pub async fn create_if_not_exists(
        &self,
        metadata: &Metadata,
    ) -> Result<bool, QueueStorageError> {
        match self.send_create(metadata).await {
            Ok(response) if response.status == StatusCode::CREATED => {
                info!(queue_name = %self.name, "Queue created");
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(QueueStorageError::QueueAlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the queue and every message in it
    pub async fn delete(&self) -> Result<(), QueueStorageError> {
        let request = self.request(Method::DELETE, self.url.clone());
        self.pipeline.send(request).await?;
        info!(queue_name = %self.name, "Queue deleted");
        Ok(())
    }

    /// Delete the queue if it exists; returns `true` when it was deleted
    pub async fn delete_if_exists(&self) -> Result<bool, QueueStorageError> {
        match self.delete().await {
            Ok(()) => Ok(true),
            Err(QueueStorageError::QueueNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self) -> Result<bool, QueueStorageError> {
        match self.get_properties().await {
            Ok(_) => Ok(true),
            Err(QueueStorageError::QueueNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read the approximate message count and the queue metadata
    pub async fn get_properties(&self) -> Result<QueueProperties, QueueStorageError> {
        let url = self.queue_url(&[("comp", "metadata".to_string())]);
        let response = self.pipeline.send(self.request(Method::GET, url)).await?;

        let approximate_message_count = match response.header(APPROXIMATE_COUNT_HEADER) {
            Some(count) => count.trim().parse::<u64>().map_err(|_| {
                QueueStorageError::xml(format!(
                    "'{}' is not a valid {} header",
                    count, APPROXIMATE_COUNT_HEADER
                ))
            })?,
            None => 0,
        };

        Ok(QueueProperties {
            approximate_message_count,
            metadata: queue::metadata_from_headers(&response.headers),
        })
    }

    /// Replace the queue metadata
    pub async fn set_metadata(&self, metadata: &Metadata) -> Result<(), QueueStorageError> {
        let url = self.queue_url(&[("comp", "metadata".to_string())]);
        let request = Self::with_metadata(self.request(Method::PUT, url), metadata)?;
        self.pipeline.send(request).await?;
        Ok(())
    }

    /// Enqueue a message
    ///
    /// `visibility_timeout` delays the first time the message can be received;
    /// `time_to_live` defaults to the service default of seven days.
    pub async fn send_message(
        &self,
        text: &str,
        visibility_timeout: Option<Duration>,
        time_to_live: Option<TimeToLive>,
    ) -> Result<SentMessage, QueueStorageError> {
        let mut params = Vec::new();
        if let Some(timeout) = visibility_timeout {
            message::validate_visibility_timeout(timeout)?;
            params.push(("visibilitytimeout", timeout.as_secs().to_string()));
        }
        if let Some(ttl) = time_to_live {
            ttl.validate()?;
            params.push(("messagettl", ttl.as_query_value()));
        }

        let body = message::message_body(text, self.pipeline.options().message_encoding)?;
        let request = self
            .request(Method::POST, self.messages_url(&params)?)
            .xml_body(body);
        let response = self.pipeline.send(request).await?;

        let sent = message::parse_sent_messages(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| QueueStorageError::xml("send response contains no message"))?;

        debug!(queue_name = %self.name, message_id = %sent.message_id, "Message sent");
        Ok(sent)
    }

    /// Look at up to `count` messages without changing their visibility
    pub async fn peek_messages(&self, count: u32) -> Result<Vec<PeekedMessage>, QueueStorageError> {
        message::validate_message_count(count)?;

        let url = self.messages_url(&[
            ("numofmessages", count.to_string()),
            ("peekonly", "true".to_string()),
        ])?;
        let response = self.pipeline.send(self.request(Method::GET, url)).await?;
        message::parse_peeked_messages(&response.body, self.pipeline.options().message_encoding)
    }

    /// Look at the next message, if any
    pub async fn peek_message(&self) -> Result<Option<PeekedMessage>, QueueStorageError> {
        Ok(self.peek_messages(1).await?.into_iter().next())
    }

    /// Receive up to `count` messages, hiding them for `visibility_timeout`
    /// (service default 30 seconds)
    pub async fn receive_messages(
        &self,
        count: u32,
        visibility_timeout: Option<Duration>,
    ) -> Result<Vec<QueueMessage>, QueueStorageError> {
        message::validate_message_count(count)?;

        let mut params = vec![("numofmessages", count.to_string())];
        if let Some(timeout) = visibility_timeout {
            message::validate_visibility_timeout(timeout)?;
            params.push(("visibilitytimeout", timeout.as_secs().to_string()));
        }

        let url = self.messages_url(&params)?;
        let response = self.pipeline.send(self.request(Method::GET, url)).await?;
        let encoding = self.pipeline.options().message_encoding;
        let messages = message::parse_received_messages(&response.body, encoding)?;

        debug!(queue_name = %self.name, count = messages.len(), "Messages received");
        Ok(messages)
    }

    /// Receive the next message, if any
    pub async fn receive_message(&self) -> Result<Option<QueueMessage>, QueueStorageError> {
        Ok(self.receive_messages(1, None).await?.into_iter().next())
    }

    /// Delete a received message
    pub async fn delete_message(
        &self,
        message_id: &str,
        pop_receipt: &str,
    ) -> Result<(), QueueStorageError> {
        let url = with_query(
            resource_url(&self.url, &["messages", message_id])?,
            &[("popreceipt", pop_receipt.to_string())],
        );
        let request = self.request(Method::DELETE, url).for_message(message_id);
        self.pipeline.send(request).await?;

        debug!(queue_name = %self.name, message_id = %message_id, "Message deleted");
        Ok(())
    }

    /// Change the visibility and optionally the content of a received message
    ///
    /// The returned pop receipt replaces the one passed in.
    pub async fn update_message(
        &self,
        message_id: &str,
        pop_receipt: &str,
        visibility_timeout: Duration,
        text: Option<&str>,
    ) -> Result<UpdatedMessage, QueueStorageError> {
        message::validate_visibility_timeout(visibility_timeout)?;

        let timeout = visibility_timeout.as_secs().to_string();
        let url = with_query(
            resource_url(&self.url, &["messages", message_id])?,
            &[
                ("popreceipt", pop_receipt.to_string()),
                ("visibilitytimeout", timeout),
            ],
        );
        let mut request = self.request(Method::PUT, url).for_message(message_id);
        if let Some(text) = text {
            let encoding = self.pipeline.options().message_encoding;
            request = request.xml_body(message::message_body(text, encoding)?);
        }
        let response = self.pipeline.send(request).await?;

        let time_next_visible = response.required_header(TIME_NEXT_VISIBLE_HEADER)?;
        Ok(UpdatedMessage {
            pop_receipt: response.required_header(POP_RECEIPT_HEADER)?.to_string(),
            time_next_visible: parse_http_date(time_next_visible)?,
        })
    }

    /// Delete every message in the queue
    pub async fn clear_messages(&self) -> Result<(), QueueStorageError> {
        let url = self.messages_url(&[])?;
        self.pipeline.send(self.request(Method::DELETE, url)).await?;
        info!(queue_name = %self.name, "Queue cleared");
        Ok(())
    }

    /// Read the stored access policies of the queue
    pub async fn get_access_policy(&self) -> Result<Vec<SignedIdentifier>, QueueStorageError> {
        let url = self.queue_url(&[("comp", "acl".to_string())]);
        let response = self.pipeline.send(self.request(Method::GET, url)).await?;
        acl::identifiers_from_xml(&response.body)
    }

    /// Replace the stored access policies of the queue
    pub async fn set_access_policy(
        &self,
        identifiers: &[SignedIdentifier],
    ) -> Result<(), QueueStorageError> {
        acl::validate_identifiers(identifiers)?;

        let url = self.queue_url(&[("comp", "acl".to_string())]);
        let request = self
            .request(Method::PUT, url)
            .xml_body(acl::identifiers_to_xml(identifiers));
        self.pipeline.send(request).await?;
        Ok(())
    }
}
