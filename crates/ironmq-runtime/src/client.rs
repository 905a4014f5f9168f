//! Queue-operation contract and the result types shared by adapters.
//!
//! Queue-scoped operations that are subject to the allow-list return
//! `Ok(None)` when the queue is not permitted. That is a soft failure: the
//! adapter logs it once and makes no request. Errors from the service are
//! always returned as `Err`.

use crate::error::QueueError;
use crate::message::{
    MessageId, OutboundMessage, QueueName, QueueSummary, QueueUpdate, ReceiveOptions,
    ReservedMessage,
};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// Capabilities
// ============================================================================

/// An operation of the generic queue contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Create,
    Delete,
    Send,
    Receive,
    DeleteMessage,
    GetQueues,
    Count,
    IsExists,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Create,
        Capability::Delete,
        Capability::Send,
        Capability::Receive,
        Capability::DeleteMessage,
        Capability::GetQueues,
        Capability::Count,
        Capability::IsExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::DeleteMessage => "delete_message",
            Self::GetQueues => "get_queues",
            Self::Count => "count",
            Self::IsExists => "is_exists",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which operations of the generic contract an adapter supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeMap<Capability, bool>);

impl Capabilities {
    /// Every operation supported except the listed ones.
    pub fn all_except(unsupported: &[Capability]) -> Self {
        Self(
            Capability::ALL
                .iter()
                .map(|c| (*c, !unsupported.contains(c)))
                .collect(),
        )
    }

    pub fn is_supported(&self, capability: Capability) -> bool {
        self.0.get(&capability).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        self.0.iter().map(|(c, s)| (*c, *s))
    }
}

// ============================================================================
// Operation Results
// ============================================================================

/// Outcome of deleting a queue that the service accepted or reported absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDeletion {
    /// The service deleted the queue
    Deleted,
    /// The service reported the queue as not found
    AlreadyAbsent,
}

/// Per-message results of a batch delete
///
/// Deletes run one request per id; a failure for one id does not stop the
/// remaining ids from being attempted.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<MessageId>,
    pub failed: Vec<(MessageId, QueueError)>,
}

impl DeleteReport {
    /// Check if every id was deleted
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &MessageId> {
        self.failed.iter().map(|(id, _)| id)
    }
}

/// Result of deleting one queue as part of a bulk delete
#[derive(Debug)]
pub struct QueueDeletionEntry {
    pub queue: QueueName,
    /// `Ok(None)` when the queue is not in the allow-list
    pub outcome: Result<Option<QueueDeletion>, QueueError>,
}

/// Per-queue results of a bulk delete, in request order
#[derive(Debug, Default)]
pub struct QueueDeletionReport {
    pub entries: Vec<QueueDeletionEntry>,
}

impl QueueDeletionReport {
    /// Number of queues the service actually deleted
    pub fn deleted_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Ok(Some(QueueDeletion::Deleted))))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&QueueName, &QueueError)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().err().map(|err| (&e.queue, err)))
    }

    /// Queues skipped because they are not in the allow-list
    pub fn not_permitted(&self) -> impl Iterator<Item = &QueueName> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Ok(None)))
            .map(|e| &e.queue)
    }
}

// ============================================================================
// Queue Contract
// ============================================================================

/// Generic queue-operation contract
///
/// Implementations translate each call into requests against a concrete
/// queue service. Callers check [`QueueAdapter::capabilities`] before relying
/// on an operation.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Create a queue explicitly
    async fn create_queue(&self, queue: &QueueName) -> Result<(), QueueError>;

    /// Delete a queue
    async fn delete_queue(&self, queue: &QueueName) -> Result<Option<QueueDeletion>, QueueError>;

    /// Enqueue a message and return the id the service assigned
    async fn send(
        &self,
        queue: &QueueName,
        message: OutboundMessage,
    ) -> Result<Option<MessageId>, QueueError>;

    /// Reserve up to `options.max_messages` messages
    ///
    /// An empty vector means the queue had nothing visible.
    async fn receive(
        &self,
        queue: &QueueName,
        options: ReceiveOptions,
    ) -> Result<Option<Vec<ReservedMessage>>, QueueError>;

    /// Delete reserved messages by id
    async fn delete_messages(
        &self,
        queue: &QueueName,
        ids: &[MessageId],
    ) -> Result<Option<DeleteReport>, QueueError>;

    /// List queues in the project, one page at a time
    async fn list_queues(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Vec<QueueSummary>, QueueError>;

    /// Approximate number of messages in a queue
    async fn count(&self, queue: &QueueName) -> Result<Option<u64>, QueueError>;

    /// Check whether a queue exists in the project
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError>;

    /// Operations this adapter supports
    fn capabilities(&self) -> Capabilities;
}

/// Push-queue configuration, for adapters whose service supports it
#[async_trait]
pub trait PushQueueAdapter: QueueAdapter {
    /// Replace the push configuration of a queue
    ///
    /// Returns `false` when the queue is not permitted.
    async fn update_queue(
        &self,
        queue: &QueueName,
        update: &QueueUpdate,
    ) -> Result<bool, QueueError>;

    /// Add subscribers to a push queue
    ///
    /// Returns `false` when the queue is not permitted.
    async fn add_subscribers(
        &self,
        queue: &QueueName,
        urls: &[String],
    ) -> Result<bool, QueueError>;
}
