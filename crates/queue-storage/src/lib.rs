//! # Queue Storage
//!
//! Client binding for the cloud queue storage service's REST protocol.
//!
//! This library provides:
//! - Connection string parsing, including the local storage emulator
//! - Shared Key request signing and shared access signatures
//! - Queue lifecycle, metadata and stored access policies
//! - Sending, peeking, receiving, updating and deleting messages
//! - Service properties (logging, metrics, CORS) and geo-replication statistics
//! - Retry policies with exponential backoff for transient failures
//!
//! ## Module Organization
//!
//! - [account] - Storage account settings and credentials
//! - [client] - Service and queue clients
//! - [error] - Error types for all storage operations
//! - [message] - Message types and encoding
//! - [properties] - Service properties and statistics
//! - [acl] - Stored access policies
//! - [retry] - Retry policy

// Module declarations
pub mod account;
pub mod acl;
mod auth;
pub mod client;
pub mod error;
pub mod message;
pub mod properties;
pub mod queue;
pub mod retry;
mod xml;

// Re-export commonly used types at crate root for convenience
pub use account::{StorageAccount, StorageCredentials};
pub use acl::{AccessPolicy, QueuePermissions, SignedIdentifier};
pub use client::{ClientOptions, QueueClient, QueueServiceClient, API_VERSION};
pub use error::{ConfigurationError, QueueStorageError, ValidationError};
pub use message::{
    MessageEncoding, PeekedMessage, QueueMessage, SentMessage, TimeToLive, UpdatedMessage,
};
pub use properties::{
    CorsMethod, CorsRule, GeoReplicationStatus, Logging, Metrics, MetricsLevel, RetentionPolicy,
    ServiceProperties, ServiceStats,
};
pub use queue::{Metadata, QueueItem, QueueName, QueueProperties, QueueSegment};
pub use retry::RetryPolicy;
