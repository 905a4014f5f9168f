//! Common test utilities for ironmq integration tests
//!
//! This module provides:
//! - A stateful stub of the hosted queue service with real reservation expiry
//! - Helpers for wiring an adapter to the stub

use ironmq_runtime::{IronMqAdapter, IronMqConfig, QueueName};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PROJECT: &str = "proj-1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

// ============================================================================
// Stub Queue Service
// ============================================================================

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    timeout: u64,
    visible_at: Instant,
    reserved_count: u32,
}

#[derive(Debug, Default)]
struct ServiceState {
    queues: BTreeMap<String, Vec<StoredMessage>>,
}

/// In-process stand-in for the hosted queue service
///
/// Reserved messages are hidden until their timeout has elapsed and then
/// become visible again, as on the real service.
#[derive(Clone, Default)]
pub struct StubQueueService {
    state: Arc<Mutex<ServiceState>>,
    next_id: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl StubQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with 503 until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Create an empty queue directly in the stub
    pub fn create_queue(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .queues
            .entry(name.to_string())
            .or_default();
    }

    /// Number of messages stored in a queue, reserved or not
    pub fn size(&self, name: &str) -> Option<usize> {
        self.state.lock().unwrap().queues.get(name).map(Vec::len)
    }

    /// Mount the stub on a mock server under the project path
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(format!("^/1/projects/{}/queues", PROJECT)))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    fn next_message_id(&self) -> String {
        format!("{}", 1_000 + self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn list_queues(&self) -> ResponseTemplate {
        let state = self.state.lock().unwrap();
        let listing: Vec<Value> = state
            .queues
            .keys()
            .map(|name| json!({"id": format!("q-{}", name), "project_id": PROJECT, "name": name}))
            .collect();
        ResponseTemplate::new(200).set_body_json(listing)
    }

    fn queue_info(&self, name: &str) -> ResponseTemplate {
        let state = self.state.lock().unwrap();
        match state.queues.get(name) {
            Some(messages) => ResponseTemplate::new(200).set_body_json(json!({
                "id": format!("q-{}", name),
                "project_id": PROJECT,
                "name": name,
                "size": messages.len()
            })),
            None => not_found("Queue not found"),
        }
    }

    fn delete_queue(&self, name: &str) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        match state.queues.remove(name) {
            Some(_) => ResponseTemplate::new(200).set_body_json(json!({"msg": "Deleted."})),
            None => not_found("Queue not found"),
        }
    }

    fn post_messages(&self, name: &str, request: &Request) -> ResponseTemplate {
        let payload: Value = match serde_json::from_slice(&request.body) {
            Ok(payload) => payload,
            Err(_) => return bad_request("Invalid JSON"),
        };
        let Some(messages) = payload["messages"].as_array() else {
            return ResponseTemplate::new(500)
                .set_body_json(json!({"msg": "Required fields are missing."}));
        };

        let timeout = query_u64(request, "timeout").unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let delay = query_u64(request, "delay").unwrap_or(0);
        let now = Instant::now();

        let mut ids = Vec::new();
        let mut stored = Vec::new();
        for message in messages {
            let Some(body) = message["body"].as_str() else {
                return ResponseTemplate::new(500)
                    .set_body_json(json!({"msg": "Required fields are missing."}));
            };
            let id = self.next_message_id();
            ids.push(id.clone());
            stored.push(StoredMessage {
                id,
                body: body.to_string(),
                timeout,
                visible_at: now + Duration::from_secs(delay),
                reserved_count: 0,
            });
        }

        self.state
            .lock()
            .unwrap()
            .queues
            .entry(name.to_string())
            .or_default()
            .extend(stored);

        ResponseTemplate::new(200).set_body_json(json!({"ids": ids, "msg": "Messages put on queue."}))
    }

    fn reserve_messages(&self, name: &str, request: &Request) -> ResponseTemplate {
        let n = query_u64(request, "n").unwrap_or(1) as usize;
        let timeout_override = query_u64(request, "timeout");
        let now = Instant::now();

        let mut state = self.state.lock().unwrap();
        let reserved: Vec<Value> = match state.queues.get_mut(name) {
            Some(messages) => messages
                .iter_mut()
                .filter(|m| m.visible_at <= now)
                .take(n)
                .map(|m| {
                    let timeout = timeout_override.unwrap_or(m.timeout);
                    m.visible_at = now + Duration::from_secs(timeout);
                    m.reserved_count += 1;
                    json!({
                        "id": m.id,
                        "body": m.body,
                        "timeout": timeout,
                        "reserved_count": m.reserved_count
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        ResponseTemplate::new(200).set_body_json(json!({"messages": reserved}))
    }

    fn delete_message(&self, name: &str, id: &str) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let Some(messages) = state.queues.get_mut(name) else {
            return not_found("Queue not found");
        };

        match messages.iter().position(|m| m.id == id) {
            Some(index) => {
                messages.remove(index);
                ResponseTemplate::new(200).set_body_json(json!({"msg": "Deleted"}))
            }
            None => not_found("Message not found"),
        }
    }
}

impl Respond for StubQueueService {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if self.unavailable.load(Ordering::SeqCst) {
            return ResponseTemplate::new(503)
                .set_body_json(json!({"msg": "Service Unavailable"}));
        }

        let prefix = format!("/1/projects/{}/queues", PROJECT);
        let rest = request.url.path().trim_start_matches(&prefix);
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let method = request.method.as_str();

        match (method, segments.as_slice()) {
            ("GET", []) => self.list_queues(),
            ("GET", [name]) => self.queue_info(name),
            ("DELETE", [name]) => self.delete_queue(name),
            ("POST", [name, "messages"]) => self.post_messages(name, request),
            ("GET", [name, "messages"]) => self.reserve_messages(name, request),
            ("DELETE", [name, "messages", id]) => self.delete_message(name, id),
            _ => ResponseTemplate::new(405).set_body_json(json!({"msg": "Method not allowed"})),
        }
    }
}

fn query_u64(request: &Request, key: &str) -> Option<u64> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}

fn not_found(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({"msg": message}))
}

fn bad_request(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({"msg": message}))
}

// ============================================================================
// Fixtures
// ============================================================================

/// Start a mock server backed by a fresh stub service
#[allow(dead_code)]
pub async fn start_stub_service() -> (MockServer, StubQueueService) {
    let server = MockServer::start().await;
    let service = StubQueueService::new();
    service.mount(&server).await;
    (server, service)
}

/// Adapter pointed at the stub with the given comma-separated allow-list
#[allow(dead_code)]
pub fn create_adapter(server: &MockServer, queues: &str) -> IronMqAdapter {
    let config = IronMqConfig::new("test-token", PROJECT)
        .with_allowed_queues(queues)
        .with_base_url(format!("{}/1/projects", server.uri()))
        .with_request_timeout_seconds(5);

    IronMqAdapter::new(config).expect("stub configuration is valid")
}

#[allow(dead_code)]
pub fn queue(name: &str) -> QueueName {
    QueueName::new(name).expect("valid queue name")
}
