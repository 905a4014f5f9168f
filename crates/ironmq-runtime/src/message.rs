//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Longest visibility timeout the service accepts (24 hours).
pub const MAX_TIMEOUT_SECONDS: i64 = 86_400;

/// Longest delivery delay the service accepts (7 days).
pub const MAX_DELAY_SECONDS: i64 = 604_800;

/// Longest message lifetime the service accepts (30 days).
pub const MAX_EXPIRES_IN_SECONDS: i64 = 2_592_000;

/// Visibility timeout the service applies when none is sent.
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 60;

/// Message lifetime the service applies when none is sent.
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 604_800;

/// Most messages a single receive call may reserve.
pub const MAX_RECEIVE_MESSAGES: u32 = 100;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name
///
/// Queue names travel as URL path segments, so slashes and control characters
/// are rejected. Everything else is percent-encoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();

        if name.trim().is_empty() || name.len() > 255 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-255 characters".to_string(),
            });
        }

        if name.contains('/') || name.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "slashes and control characters are not allowed".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Opaque identifier the service assigns to a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an identifier returned by the service
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

fn check_range(field: &str, value: Duration, max_seconds: i64) -> Result<(), ValidationError> {
    // Compare the full duration; `num_seconds` truncates toward zero.
    if value < Duration::zero() || value > Duration::seconds(max_seconds) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("must be between 0 and {} seconds", max_seconds),
        });
    }
    Ok(())
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be sent to a queue
///
/// The body is opaque to the adapter. Any option left unset is omitted from
/// the request so the service default applies (60s timeout, no delay,
/// 7 day expiry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub timeout: Option<Duration>,
    pub delay: Option<Duration>,
    pub expires_in: Option<Duration>,
}

impl OutboundMessage {
    /// Create new message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            timeout: None,
            delay: None,
            expires_in: None,
        }
    }

    /// Time a reserved copy stays invisible before it is redelivered
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Time before the message first becomes available
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Time the service keeps the message before discarding it
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Check the optional fields against the service limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(timeout) = self.timeout {
            check_range("timeout", timeout, MAX_TIMEOUT_SECONDS)?;
        }
        if let Some(delay) = self.delay {
            check_range("delay", delay, MAX_DELAY_SECONDS)?;
        }
        if let Some(expires_in) = self.expires_in {
            check_range("expires_in", expires_in, MAX_EXPIRES_IN_SECONDS)?;
        }
        Ok(())
    }
}

/// A message reserved by a receive call
///
/// The reservation is held by the service. If the message is not deleted
/// before `visibility_timeout` has elapsed since `received_at`, the service
/// makes it visible to other receivers again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedMessage {
    pub id: MessageId,
    pub body: String,
    pub visibility_timeout: Duration,
    pub reserved_count: Option<u32>,
    pub received_at: Timestamp,
}

impl ReservedMessage {
    /// Point in time at which the service will redeliver the message
    pub fn reservation_expires_at(&self) -> Timestamp {
        Timestamp::from_datetime(self.received_at.as_datetime() + self.visibility_timeout)
    }

    /// Check if the reservation has lapsed (the message may already be redelivered)
    pub fn is_reservation_expired(&self) -> bool {
        Timestamp::now() >= self.reservation_expires_at()
    }

    /// Get time left before the service redelivers the message
    pub fn time_until_redelivery(&self) -> Duration {
        let now = Timestamp::now();
        let expires_at = self.reservation_expires_at();
        if now >= expires_at {
            Duration::zero()
        } else {
            expires_at.as_datetime() - now.as_datetime()
        }
    }
}

/// One line of a queue listing
///
/// `size` is approximate and only present when the service reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

// ============================================================================
// Receive Options
// ============================================================================

/// Options for reserving messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Maximum number of messages to reserve (service default is 1)
    pub max_messages: Option<u32>,
    /// Visibility timeout for the reserved messages
    pub timeout: Option<Duration>,
}

impl ReceiveOptions {
    /// Create new receive options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of messages to receive
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Set visibility timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check the options against the service limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(max) = self.max_messages {
            if max == 0 || max > MAX_RECEIVE_MESSAGES {
                return Err(ValidationError::OutOfRange {
                    field: "max_messages".to_string(),
                    message: format!("must be between 1 and {}", MAX_RECEIVE_MESSAGES),
                });
            }
        }
        if let Some(timeout) = self.timeout {
            check_range("timeout", timeout, MAX_TIMEOUT_SECONDS)?;
        }
        Ok(())
    }

    /// Visibility timeout the service will apply to reserved messages
    pub fn effective_timeout(&self) -> Duration {
        self.timeout
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TIMEOUT_SECONDS))
    }
}

// ============================================================================
// Push Queue Configuration
// ============================================================================

/// Delivery mode of a push queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushType {
    /// Push every message to all subscribers
    Multicast,
    /// Push every message to exactly one subscriber
    Unicast,
}

impl std::fmt::Display for PushType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multicast => write!(f, "multicast"),
            Self::Unicast => write!(f, "unicast"),
        }
    }
}

impl FromStr for PushType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multicast" => Ok(Self::Multicast),
            "unicast" => Ok(Self::Unicast),
            _ => Err(ValidationError::InvalidFormat {
                field: "push_type".to_string(),
                message: "must be multicast or unicast".to_string(),
            }),
        }
    }
}

/// HTTP endpoint that receives pushed messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub url: String,
}

impl Subscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Replacement push configuration for a queue
///
/// Unset fields are left out of the request and keep their service defaults
/// (multicast, 3 retries, 60s between retries).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueUpdate {
    pub subscribers: Vec<Subscriber>,
    pub push_type: Option<PushType>,
    pub retries: Option<u32>,
    pub retries_delay: Option<Duration>,
}

impl QueueUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriber(mut self, url: impl Into<String>) -> Self {
        self.subscribers.push(Subscriber::new(url));
        self
    }

    pub fn with_push_type(mut self, push_type: PushType) -> Self {
        self.push_type = Some(push_type);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_retries_delay(mut self, delay: Duration) -> Self {
        self.retries_delay = Some(delay);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(delay) = self.retries_delay {
            if delay.num_seconds() < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "retries_delay".to_string(),
                    message: "must not be negative".to_string(),
                });
            }
        }
        if self.subscribers.iter().any(|s| s.url.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "subscribers.url".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
