//! HTTP transport for the hosted queue service.
//!
//! Every request is addressed as `<base URL>/<project id>/<path>`, carries an
//! `Authorization: OAuth <token>` header and a JSON content type, and comes
//! back either as a decoded [`serde_json::Value`] or as a [`QueueError`]
//! classified from the HTTP status.
//!
//! The transport does not retry. A 503 surfaces as
//! [`QueueError::ServiceUnavailable`] so the caller can apply its own backoff.

use crate::config::Credentials;
use crate::error::{QueueError, SerializationError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;

/// A single call against the project-scoped API
///
/// # Examples
///
/// ```
/// use ironmq_runtime::transport::ApiRequest;
///
/// let request = ApiRequest::get("queues/orders/messages")
///     .query("n", Some(10))
///     .query("timeout", None::<u32>);
///
/// assert_eq!(request.query_pairs(), &[("n".to_string(), "10".to_string())]);
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter; `None` leaves the parameter out entirely.
    pub fn query<T: ToString>(mut self, key: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the project, without a leading slash.
    pub fn path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Percent-encode a value for use as a single URL path segment.
pub fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Authenticated JSON client for the queue service
///
/// The underlying `reqwest::Client` is built on first use and reused for
/// every later request.
#[derive(Debug)]
pub struct TransportClient {
    base_url: String,
    request_timeout_seconds: u64,
    http_client: OnceCell<reqwest::Client>,
}

impl TransportClient {
    /// Create a transport for the given projects endpoint.
    pub fn new(base_url: impl Into<String>, request_timeout_seconds: u64) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            request_timeout_seconds,
            http_client: OnceCell::new(),
        }
    }

    /// Projects endpoint requests are addressed against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a project-relative path.
    pub fn url_for(&self, project_id: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            path_segment(project_id),
            path.trim_start_matches('/')
        )
    }

    async fn http_client(&self) -> Result<&reqwest::Client, QueueError> {
        self.http_client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(self.request_timeout_seconds))
                    .build()
                    .map_err(|e| QueueError::ConnectionFailed {
                        message: format!("Failed to create HTTP client: {}", e),
                    })
            })
            .await
    }

    /// Send a request and decode the JSON response.
    ///
    /// An empty success body decodes to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// - Non-success statuses are classified with [`QueueError::from_status`]
    /// - Network failures become `ConnectionFailed` or `Timeout`
    /// - A success body that is not JSON becomes `InvalidResponse`
    pub async fn send(
        &self,
        credentials: &Credentials,
        request: ApiRequest,
    ) -> Result<Value, QueueError> {
        let client = self.http_client().await?;
        let url = self.url_for(&credentials.project_id, request.path());

        debug!(
            method = %request.method(),
            path = request.path(),
            "Sending request to queue service"
        );

        let mut builder = client
            .request(request.method().clone(), &url)
            .header(
                AUTHORIZATION,
                format!("OAuth {}", credentials.token.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/json");

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }

        if let Some(body) = request.body() {
            let payload = serde_json::to_vec(body).map_err(SerializationError::from)?;
            builder = builder.body(payload);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                QueueError::Timeout {
                    duration: chrono::Duration::seconds(self.request_timeout_seconds as i64),
                }
            } else if e.is_connect() {
                QueueError::ConnectionFailed {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                QueueError::ConnectionFailed {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            let err = QueueError::from_status(
                status.as_u16(),
                request.method().as_str(),
                request.path(),
                &text,
            );

            match err {
                QueueError::UnknownRemoteError { .. } => error!(
                    status = status.as_u16(),
                    method = %request.method(),
                    path = request.path(),
                    body = %text,
                    "Unknown error during request to queue service"
                ),
                _ => warn!(
                    status = status.as_u16(),
                    method = %request.method(),
                    path = request.path(),
                    retryable = err.is_transient(),
                    "Queue service rejected request"
                ),
            }

            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| QueueError::InvalidResponse {
            message: format!("Response body is not valid JSON: {}", e),
        })
    }
}
