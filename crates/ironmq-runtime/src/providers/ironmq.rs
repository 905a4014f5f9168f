//! IronMQ adapter over the hosted queue service's v1 HTTP API.
//!
//! ## Allow-list
//!
//! The adapter only touches queues named in its allow-list. A queue-scoped
//! call for any other name logs a single warning, makes no request and
//! returns the negative result of that operation (`None` or `false`).
//! Listing and existence checks are project-wide and are not restricted.
//!
//! ## Queue creation
//!
//! The service creates a queue implicitly on the first message posted to it,
//! so [`QueueAdapter::create_queue`] always fails with
//! [`QueueError::UnsupportedOperation`] pointing at `send`.
//!
//! ## Reservations
//!
//! `receive` reserves messages for their visibility timeout. Redelivery of
//! messages that are not deleted in time is done by the service; the adapter
//! only reports when the reservation lapses (see
//! [`ReservedMessage::reservation_expires_at`]).
//!
//! ## Example
//!
//! ```no_run
//! use ironmq_runtime::{IronMqAdapter, IronMqConfig, OutboundMessage, QueueAdapter, QueueName};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IronMqConfig::new("token", "project-id").with_allowed_queues("orders");
//! let adapter = IronMqAdapter::new(config)?;
//!
//! let orders = QueueName::new("orders")?;
//! if let Some(id) = adapter.send(&orders, OutboundMessage::new("hello")).await? {
//!     println!("queued {}", id);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::{
    Capabilities, Capability, DeleteReport, PushQueueAdapter, QueueAdapter, QueueDeletion,
    QueueDeletionEntry, QueueDeletionReport,
};
use crate::config::{AllowList, Credentials, IronMqConfig};
use crate::error::{QueueError, SerializationError, ValidationError};
use crate::message::{
    MessageId, OutboundMessage, PushType, QueueName, QueueSummary, QueueUpdate, ReceiveOptions,
    ReservedMessage, Subscriber, Timestamp,
};
use crate::search::contains_str;
use crate::transport::{path_segment, ApiRequest, TransportClient};
use async_trait::async_trait;
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "ironmq_tests.rs"]
mod tests;

/// Largest page size the service accepts for queue listings
pub const LISTING_PAGE_SIZE: u32 = 100;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    messages: Vec<SendBody<'a>>,
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReceiveResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    timeout: Option<i64>,
    #[serde(default)]
    reserved_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct QueueInfo {
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct QueueUpdatePayload<'a> {
    subscribers: &'a [Subscriber],
    #[serde(skip_serializing_if = "Option::is_none")]
    push_type: Option<PushType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retries_delay: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SubscribersPayload {
    subscribers: Vec<Subscriber>,
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, QueueError> {
    serde_json::from_value(value).map_err(|e| QueueError::InvalidResponse {
        message: format!("Unexpected {} response: {}", what, e),
    })
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, QueueError> {
    Ok(serde_json::to_value(payload).map_err(SerializationError::from)?)
}

fn queue_path(queue: &QueueName) -> String {
    format!("queues/{}", path_segment(queue.as_str()))
}

fn message_path(queue: &QueueName, id: &MessageId) -> String {
    format!(
        "queues/{}/messages/{}",
        path_segment(queue.as_str()),
        path_segment(id.as_str())
    )
}

// ============================================================================
// IronMQ Adapter
// ============================================================================

/// Queue adapter for the hosted IronMQ service
///
/// ## Thread Safety
///
/// The adapter can be shared across tasks behind an `Arc`. The queue listing
/// used by [`QueueAdapter::queue_exists`] is cached behind an `RwLock` and
/// filled at most once until [`IronMqAdapter::reload_queues`] is called.
pub struct IronMqAdapter {
    transport: TransportClient,
    credentials: Credentials,
    allow_list: AllowList,
    listing_cache: RwLock<Option<Value>>,
}

impl IronMqAdapter {
    /// Create a new adapter from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the token or project id is missing, or
    /// if the base URL or allow-list cannot be parsed. No request is made.
    pub fn new(config: IronMqConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let allow_list = config.allow_list()?;
        if allow_list.is_empty() {
            warn!("No queues are allow-listed; every queue-scoped operation will be skipped");
        }

        Ok(Self {
            transport: TransportClient::new(&config.base_url, config.request_timeout_seconds),
            credentials: config.credentials(),
            allow_list,
            listing_cache: RwLock::new(None),
        })
    }

    /// Queues this adapter is permitted to operate on
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    fn is_permitted(&self, queue: &QueueName, operation: &'static str) -> bool {
        if self.allow_list.contains(queue.as_str()) {
            return true;
        }

        warn!(
            queue = %queue,
            operation,
            "Queue {} is not available", queue
        );
        false
    }

    async fn fetch_listing(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Value, QueueError> {
        let request = ApiRequest::get("queues")
            .query("page", page)
            .query("per_page", per_page);

        let listing = self.transport.send(&self.credentials, request).await?;
        Ok(if listing.is_null() {
            Value::Array(Vec::new())
        } else {
            listing
        })
    }

    /// Fetch every page of the project listing as one JSON array
    ///
    /// Pages are requested at the maximum size until one comes back short.
    async fn fetch_full_listing(&self) -> Result<Value, QueueError> {
        let mut queues = Vec::new();
        let mut page = 0;

        loop {
            let listing = self
                .fetch_listing(Some(page), Some(LISTING_PAGE_SIZE))
                .await?;
            let Value::Array(entries) = listing else {
                return Err(QueueError::InvalidResponse {
                    message: "queue listing is not an array".to_string(),
                });
            };

            let received = entries.len();
            queues.extend(entries);
            if received < LISTING_PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        debug!(queues = queues.len(), pages = page + 1, "Queue listing fetched");
        Ok(Value::Array(queues))
    }

    /// Get the cached project listing, fetching it on first use
    async fn cached_listing(&self) -> Result<Value, QueueError> {
        {
            let cache = self.listing_cache.read().await;
            if let Some(listing) = cache.as_ref() {
                return Ok(listing.clone());
            }
        }

        let mut cache = self.listing_cache.write().await;
        if let Some(listing) = cache.as_ref() {
            return Ok(listing.clone());
        }

        let listing = self.fetch_full_listing().await?;
        *cache = Some(listing.clone());
        Ok(listing)
    }

    /// Replace the cached queue listing with a fresh one from the service
    pub async fn reload_queues(&self) -> Result<Vec<QueueSummary>, QueueError> {
        let listing = self.fetch_full_listing().await?;
        let summaries = decode(listing.clone(), "queue listing")?;

        *self.listing_cache.write().await = Some(listing);
        debug!("Queue listing reloaded");

        Ok(summaries)
    }

    /// Allow-listed queues that currently exist in the project
    ///
    /// Uses the cached listing.
    pub async fn existing_allowed_queues(&self) -> Result<AllowList, QueueError> {
        let summaries: Vec<QueueSummary> = decode(self.cached_listing().await?, "queue listing")?;
        Ok(self.allow_list.resolve_against(&summaries))
    }

    /// Name and message count of every allow-listed queue, in allow-list order
    ///
    /// A queue the service does not know yet is listed without a size.
    pub async fn allowed_queue_overview(&self) -> Result<Vec<QueueSummary>, QueueError> {
        let mut overview = Vec::with_capacity(self.allow_list.len());

        for queue in self.allow_list.iter() {
            let size = match self.fetch_size(queue).await {
                Ok(size) => Some(size),
                Err(QueueError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };

            overview.push(QueueSummary {
                name: queue.to_string(),
                size,
            });
        }

        Ok(overview)
    }

    async fn fetch_size(&self, queue: &QueueName) -> Result<u64, QueueError> {
        let value = self
            .transport
            .send(&self.credentials, ApiRequest::get(queue_path(queue)))
            .await?;

        let info: QueueInfo = decode(value, "queue info")?;
        info.size.ok_or_else(|| {
            QueueError::from(SerializationError::MissingField {
                field: "size".to_string(),
            })
        })
    }

    /// Delete several queues one after another
    ///
    /// Every queue is attempted; failures are reported per queue.
    pub async fn delete_queues(&self, queues: &[QueueName]) -> QueueDeletionReport {
        let mut report = QueueDeletionReport::default();

        for queue in queues {
            let outcome = self.delete_queue(queue).await;
            report.entries.push(QueueDeletionEntry {
                queue: queue.clone(),
                outcome,
            });
        }

        info!(
            requested = queues.len(),
            deleted = report.deleted_count(),
            "Bulk queue deletion finished"
        );

        report
    }

    /// Delete one reserved message
    ///
    /// Returns `false` when the queue is not permitted.
    pub async fn delete_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
    ) -> Result<bool, QueueError> {
        if !self.is_permitted(queue, "delete_message") {
            return Ok(false);
        }

        self.transport
            .send(&self.credentials, ApiRequest::delete(message_path(queue, id)))
            .await?;

        debug!(queue = %queue, message_id = %id, "Message deleted");
        Ok(true)
    }
}

impl fmt::Debug for IronMqAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IronMqAdapter")
            .field("base_url", &self.transport.base_url())
            .field("project_id", &self.credentials.project_id)
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

#[async_trait]
impl QueueAdapter for IronMqAdapter {
    async fn create_queue(&self, _queue: &QueueName) -> Result<(), QueueError> {
        Err(QueueError::UnsupportedOperation {
            operation: "create".to_string(),
            alternative: "send".to_string(),
        })
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<Option<QueueDeletion>, QueueError> {
        if !self.is_permitted(queue, "delete_queue") {
            return Ok(None);
        }

        match self
            .transport
            .send(&self.credentials, ApiRequest::delete(queue_path(queue)))
            .await
        {
            Ok(_) => {
                info!(queue = %queue, "Queue deleted");
                Ok(Some(QueueDeletion::Deleted))
            }
            Err(QueueError::NotFound { .. }) => {
                debug!(queue = %queue, "Queue to delete does not exist");
                Ok(Some(QueueDeletion::AlreadyAbsent))
            }
            Err(e) => Err(e),
        }
    }

    async fn send(
        &self,
        queue: &QueueName,
        message: OutboundMessage,
    ) -> Result<Option<MessageId>, QueueError> {
        if !self.is_permitted(queue, "send") {
            return Ok(None);
        }

        message.validate()?;

        let payload = encode(&SendPayload {
            messages: vec![SendBody {
                body: &message.body,
            }],
        })?;

        let request = ApiRequest::post(format!("{}/messages", queue_path(queue)))
            .query("timeout", message.timeout.map(|d| d.num_seconds()))
            .query("delay", message.delay.map(|d| d.num_seconds()))
            .query("expires_in", message.expires_in.map(|d| d.num_seconds()))
            .json(payload);

        let value = self.transport.send(&self.credentials, request).await?;

        // A 2xx means the message is queued even when the reply is unusable.
        let id = serde_json::from_value::<SendResponse>(value)
            .ok()
            .and_then(|response| response.ids.into_iter().next())
            .and_then(|id| MessageId::new(id).ok());
        let Some(id) = id else {
            warn!(queue = %queue, "Send accepted without a message id");
            return Err(QueueError::EnqueuedWithoutId {
                queue: queue.to_string(),
            });
        };

        debug!(queue = %queue, message_id = %id, "Message sent");
        Ok(Some(id))
    }

    async fn receive(
        &self,
        queue: &QueueName,
        options: ReceiveOptions,
    ) -> Result<Option<Vec<ReservedMessage>>, QueueError> {
        if !self.is_permitted(queue, "receive") {
            return Ok(None);
        }

        options.validate()?;

        let request = ApiRequest::get(format!("{}/messages", queue_path(queue)))
            .query("n", options.max_messages)
            .query("timeout", options.timeout.map(|d| d.num_seconds()));

        let value = self.transport.send(&self.credentials, request).await?;
        let response: ReceiveResponse = if value.is_null() {
            ReceiveResponse::default()
        } else {
            decode(value, "receive")?
        };

        let received_at = Timestamp::now();
        let default_timeout = options.effective_timeout();

        let messages = response
            .messages
            .into_iter()
            .map(|m| {
                let id = MessageId::new(m.id).map_err(|e| QueueError::InvalidResponse {
                    message: e.to_string(),
                })?;
                Ok(ReservedMessage {
                    id,
                    body: m.body,
                    visibility_timeout: m
                        .timeout
                        .map(Duration::seconds)
                        .unwrap_or(default_timeout),
                    reserved_count: m.reserved_count,
                    received_at: received_at.clone(),
                })
            })
            .collect::<Result<Vec<_>, QueueError>>()?;

        debug!(queue = %queue, count = messages.len(), "Messages reserved");
        Ok(Some(messages))
    }

    async fn delete_messages(
        &self,
        queue: &QueueName,
        ids: &[MessageId],
    ) -> Result<Option<DeleteReport>, QueueError> {
        if !self.is_permitted(queue, "delete_messages") {
            return Ok(None);
        }

        let mut report = DeleteReport::default();

        for id in ids {
            match self
                .transport
                .send(&self.credentials, ApiRequest::delete(message_path(queue, id)))
                .await
            {
                Ok(_) => report.deleted.push(id.clone()),
                Err(e) => {
                    warn!(
                        queue = %queue,
                        message_id = %id,
                        error = %e,
                        "Failed to delete message"
                    );
                    report.failed.push((id.clone(), e));
                }
            }
        }

        Ok(Some(report))
    }

    async fn list_queues(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Vec<QueueSummary>, QueueError> {
        let listing = self.fetch_listing(page, per_page).await?;
        decode(listing, "queue listing")
    }

    async fn count(&self, queue: &QueueName) -> Result<Option<u64>, QueueError> {
        if !self.is_permitted(queue, "count") {
            return Ok(None);
        }

        self.fetch_size(queue).await.map(Some)
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        let listing = self.cached_listing().await?;
        Ok(contains_str(&listing, queue.as_str()))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all_except(&[Capability::Create])
    }
}

#[async_trait]
impl PushQueueAdapter for IronMqAdapter {
    async fn update_queue(
        &self,
        queue: &QueueName,
        update: &QueueUpdate,
    ) -> Result<bool, QueueError> {
        if !self.is_permitted(queue, "update_queue") {
            return Ok(false);
        }

        update.validate()?;

        let payload = encode(&QueueUpdatePayload {
            subscribers: &update.subscribers,
            push_type: update.push_type,
            retries: update.retries,
            retries_delay: update.retries_delay.map(|d| d.num_seconds()),
        })?;

        self.transport
            .send(
                &self.credentials,
                ApiRequest::post(queue_path(queue)).json(payload),
            )
            .await?;

        info!(queue = %queue, subscribers = update.subscribers.len(), "Queue updated");
        Ok(true)
    }

    async fn add_subscribers(
        &self,
        queue: &QueueName,
        urls: &[String],
    ) -> Result<bool, QueueError> {
        if !self.is_permitted(queue, "add_subscribers") {
            return Ok(false);
        }

        if urls.is_empty() || urls.iter().any(|u| u.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "subscribers".to_string(),
            }
            .into());
        }

        let payload = encode(&SubscribersPayload {
            subscribers: urls.iter().map(Subscriber::new).collect(),
        })?;

        self.transport
            .send(
                &self.credentials,
                ApiRequest::put(format!("{}/subscribers", queue_path(queue))).json(payload),
            )
            .await?;

        info!(queue = %queue, added = urls.len(), "Subscribers added");
        Ok(true)
    }
}
