//! Adapter configuration: credentials, service endpoint and the queue allow-list.

use crate::error::{ConfigurationError, ValidationError};
use crate::message::{QueueName, QueueSummary};
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroize;

/// Projects endpoint of the hosted queue service.
pub const DEFAULT_BASE_URL: &str = "https://mq-aws-us-east-1.iron.io/1/projects";

/// Per-request timeout applied by the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

// ============================================================================
// Secret Handling
// ============================================================================

/// OAuth token for the queue service
///
/// Never included in Debug output or logs. The backing memory is zeroed
/// when the token is dropped.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct OAuthToken(String);

impl OAuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get token as string (only for building the Authorization header)
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("length", &self.0.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Drop for OAuthToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Token and project the adapter authenticates with
///
/// Owned by the adapter; the transport only borrows it while building a
/// request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: OAuthToken,
    pub project_id: String,
}

// ============================================================================
// Allow-list
// ============================================================================

/// Queue names the adapter is permitted to operate on
///
/// Order follows the configuration so that overviews list queues the way the
/// operator wrote them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    queues: Vec<QueueName>,
}

impl AllowList {
    pub fn new(queues: Vec<QueueName>) -> Self {
        let mut list = Self::default();
        for queue in queues {
            list.push(queue);
        }
        list
    }

    /// Parse the comma-separated form used by the configuration store.
    ///
    /// Entries are trimmed, blank entries skipped and duplicates collapsed.
    pub fn from_comma_separated(value: &str) -> Result<Self, ValidationError> {
        let mut list = Self::default();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            list.push(QueueName::new(entry)?);
        }
        Ok(list)
    }

    fn push(&mut self, queue: QueueName) {
        if !self.queues.contains(&queue) {
            self.queues.push(queue);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.iter().any(|q| q.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueName> {
        self.queues.iter()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Keep only the allowed queues that appear in a remote listing.
    pub fn resolve_against(&self, listing: &[QueueSummary]) -> Self {
        let queues = self
            .queues
            .iter()
            .filter(|q| listing.iter().any(|s| s.name == q.as_str()))
            .cloned()
            .collect();
        Self { queues }
    }
}

// ============================================================================
// Adapter Configuration
// ============================================================================

/// Configuration for the hosted queue adapter
///
/// # Examples
///
/// ```
/// use ironmq_runtime::IronMqConfig;
///
/// let config = IronMqConfig::new("token", "project-id")
///     .with_allowed_queues("orders, invoices");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.allow_list().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct IronMqConfig {
    /// OAuth token for the project
    #[serde(default)]
    pub token: OAuthToken,

    /// Project identifier
    #[serde(default)]
    pub project_id: String,

    /// Comma-separated allow-list of queue names
    #[serde(default)]
    pub queues: String,

    /// Projects endpoint, without the project id
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl IronMqConfig {
    pub fn new(token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            token: OAuthToken::new(token),
            project_id: project_id.into(),
            queues: String::new(),
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Set the comma-separated allow-list.
    pub fn with_allowed_queues(mut self, queues: impl Into<String>) -> Self {
        self.queues = queues.into();
        self
    }

    /// Set the projects endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = seconds;
        self
    }

    /// Check that the configuration can be used to talk to the service.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.token.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "token".to_string(),
            });
        }

        if self.project_id.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "project_id".to_string(),
            });
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| ConfigurationError::Invalid {
            message: format!("base_url '{}' is not a valid URL: {}", self.base_url, e),
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigurationError::Invalid {
                message: format!("base_url must use http or https, got {}", url.scheme()),
            });
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "request_timeout_seconds must be greater than zero".to_string(),
            });
        }

        self.allow_list()?;

        Ok(())
    }

    /// Credentials section of the configuration.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.token.clone(),
            project_id: self.project_id.trim().to_string(),
        }
    }

    /// Parse the configured allow-list.
    pub fn allow_list(&self) -> Result<AllowList, ConfigurationError> {
        AllowList::from_comma_separated(&self.queues).map_err(|e| ConfigurationError::Invalid {
            message: format!("queues: {}", e),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
