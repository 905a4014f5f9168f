//! # IronMQ Runtime
//!
//! Client adapter for the hosted IronMQ message-queue service.
//!
//! This library provides:
//! - An authenticated HTTP+JSON transport with status-classified errors
//! - A queue-operation contract with a capability query
//! - An IronMQ adapter restricted to an allow-list of queue names
//! - Push-queue configuration (subscribers, push type, retry policy)
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Queue names, outbound and reserved messages, push settings
//! - [`config`] - Credentials, allow-list and adapter configuration
//! - [`transport`] - HTTP transport to the service
//! - [`client`] - Queue contract traits and result types
//! - [`providers`] - Concrete adapters
//! - [`search`] - Membership search over decoded JSON

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod providers;
pub mod search;
pub mod transport;

pub use client::{
    Capabilities, Capability, DeleteReport, PushQueueAdapter, QueueAdapter, QueueDeletion,
    QueueDeletionEntry, QueueDeletionReport,
};
pub use config::{AllowList, Credentials, IronMqConfig, OAuthToken};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    MessageId, OutboundMessage, PushType, QueueName, QueueSummary, QueueUpdate, ReceiveOptions,
    ReservedMessage, Subscriber, Timestamp,
};
pub use providers::IronMqAdapter;
pub use transport::{ApiRequest, TransportClient};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
