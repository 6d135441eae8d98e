//! Platform runtime services ("Mel"): the capability surface handed to nodes.

use crate::store::deadline_after;
use crate::{
    CallMode, DataStore, PlatformConfig, PlatformError, TriggerRequest, WorkflowTrigger,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use melcore::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Data store key under which unmatched workflow returns are kept.
pub fn return_key(call_id: &str) -> String {
    format!("workflow_return:{}", call_id)
}

/// Capabilities every node can reach through the platform
#[async_trait]
pub trait Mel: Send + Sync {
    async fn http_request(&self, request: HttpRequest) -> Result<HttpResponse, PlatformError>;

    async fn call_workflow(
        &self,
        request: CallWorkflowRequest,
        cancel: &CancellationToken,
    ) -> Result<CallWorkflowResponse, PlatformError>;

    async fn return_to_workflow(
        &self,
        call_id: &str,
        data: Value,
        status: &str,
    ) -> Result<ReturnDelivery, PlatformError>;

    async fn store_data(&self, key: &str, data: Value, ttl: Duration) -> Result<(), PlatformError>;

    async fn retrieve_data(&self, key: &str) -> Result<Value, PlatformError>;

    async fn delete_data(&self, key: &str) -> Result<bool, PlatformError>;
}

/// Identity of the workflow step issuing a call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceContext {
    pub workflow_id: String,
    pub run_id: String,
    pub node_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CallWorkflowRequest {
    pub target_workflow_id: String,
    pub call_data: Value,
    pub call_mode: CallMode,
    /// Overall timeout for sync calls; `None` or zero uses the configured default
    pub timeout_seconds: Option<u64>,
    pub source: SourceContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Async call dispatched, no result will follow through this call
    Sent,
    /// Sync call answered by the called workflow
    Completed,
}

#[derive(Debug, Clone)]
pub struct CallWorkflowResponse {
    pub call_id: String,
    pub status: CallStatus,
    pub data: Option<Value>,
    /// Status reported by the called workflow
    pub return_status: Option<String>,
    pub duration: Duration,
}

/// Result of a called workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReturn {
    pub call_id: String,
    pub data: Value,
    pub status: String,
    pub returned_at: DateTime<Utc>,
}

impl WorkflowReturn {
    fn into_value(self) -> Value {
        let mut map = HashMap::new();
        map.insert("call_id".to_string(), Value::String(self.call_id));
        map.insert("status".to_string(), Value::String(self.status));
        map.insert("data".to_string(), self.data);
        map.insert("returned_at".to_string(), Value::String(self.returned_at.to_rfc3339()));
        Value::Object(map)
    }
}

/// Where a workflow return ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDelivery {
    /// Handed to the waiting caller
    Delivered,
    /// No caller was waiting; kept in the data store under [`return_key`]
    Stored,
}

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration: Duration,
}

struct PendingCall {
    source: SourceContext,
    sender: mpsc::Sender<WorkflowReturn>,
    expires_at: Instant,
}

type PendingTable = Mutex<HashMap<String, PendingCall>>;

/// How the wait for a sync call's result ended
enum Wait {
    Returned(WorkflowReturn),
    TimedOut,
    Cancelled,
}

/// Removes a pending call on every exit path of `call_workflow`,
/// including the caller dropping the future.
struct PendingGuard<'a> {
    table: &'a PendingTable,
    call_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if lock(self.table).remove(&self.call_id).is_some() {
            tracing::debug!(call_id = %self.call_id, "Removed pending workflow call");
        }
    }
}

/// In-process implementation of [`Mel`]
pub struct PlatformServices {
    config: PlatformConfig,
    trigger: Arc<dyn WorkflowTrigger>,
    http: reqwest::Client,
    pending: PendingTable,
    store: DataStore,
}

impl PlatformServices {
    pub fn new(config: PlatformConfig, trigger: Arc<dyn WorkflowTrigger>) -> Self {
        let store = DataStore::new(config.store_ttl);
        Self {
            config,
            trigger,
            http: reqwest::Client::new(),
            pending: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Number of sync calls currently waiting for a result.
    pub fn pending_calls(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Result of a call that came back after its caller stopped waiting.
    pub fn retrieve_return(&self, call_id: &str) -> Result<Value, PlatformError> {
        Ok(self.store.retrieve(&return_key(call_id))?)
    }

    /// Dispatch with the trigger budget, independent of the call timeout.
    async fn dispatch(&self, target: &str, request: &TriggerRequest) -> Result<(), PlatformError> {
        match tokio::time::timeout(self.config.trigger_timeout, self.trigger.trigger(target, request)).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::TriggerFailed {
                target: target.to_string(),
                reason: format!("dispatch timed out after {:?}", self.config.trigger_timeout),
            }),
        }
    }

    fn register_pending(
        &self,
        call_id: &str,
        source: SourceContext,
        sender: mpsc::Sender<WorkflowReturn>,
        expires_at: Instant,
    ) -> PendingGuard<'_> {
        lock(&self.pending).insert(
            call_id.to_string(),
            PendingCall {
                source,
                sender,
                expires_at,
            },
        );
        PendingGuard {
            table: &self.pending,
            call_id: call_id.to_string(),
        }
    }
}

#[async_trait]
impl Mel for PlatformServices {
    async fn http_request(&self, request: HttpRequest) -> Result<HttpResponse, PlatformError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| PlatformError::InvalidRequest(format!("Unsupported method: {}", request.method)))?;
        let timeout = request.timeout.unwrap_or(self.config.http_timeout);

        let mut builder = self.http.request(method.clone(), &request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = match request.body {
            Some(Value::String(text)) => builder.body(text),
            Some(Value::Bytes(bytes)) => builder.body(bytes),
            Some(body) => builder.json(&body.to_json()),
            None => builder,
        };

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Http(format!("Failed to read response: {}", e)))?;
        let duration = started.elapsed();

        tracing::debug!(%method, url = %request.url, status, duration_ms = duration.as_millis() as u64, "HTTP request completed");

        Ok(HttpResponse {
            status,
            headers,
            body,
            duration,
        })
    }

    async fn call_workflow(
        &self,
        request: CallWorkflowRequest,
        cancel: &CancellationToken,
    ) -> Result<CallWorkflowResponse, PlatformError> {
        if request.target_workflow_id.is_empty() {
            return Err(PlatformError::InvalidRequest("target workflow id is empty".to_string()));
        }

        let call_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let target = request.target_workflow_id.clone();
        let trigger_request = TriggerRequest {
            call_id: call_id.clone(),
            source_workflow_id: request.source.workflow_id.clone(),
            source_run_id: request.source.run_id.clone(),
            call_data: request.call_data,
            call_mode: request.call_mode,
            called_at: Utc::now(),
        };

        if request.call_mode == CallMode::Async {
            self.dispatch(&target, &trigger_request).await?;
            tracing::info!(%call_id, %target, "Workflow call sent");
            return Ok(CallWorkflowResponse {
                call_id,
                status: CallStatus::Sent,
                data: None,
                return_status: None,
                duration: started.elapsed(),
            });
        }

        let timeout = request
            .timeout_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.config.default_call_timeout);
        let deadline = deadline_after(started, timeout);

        // Registered before the trigger goes out so an early return finds it.
        let (sender, mut receiver) = mpsc::channel(1);
        let guard = self.register_pending(&call_id, request.source, sender, deadline);

        let dispatched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            dispatched = self.dispatch(&target, &trigger_request) => Some(dispatched),
        };
        let waited = match dispatched {
            None => Wait::Cancelled,
            Some(Err(e)) => return Err(e),
            Some(Ok(())) => {
                tracing::info!(%call_id, %target, timeout_ms = timeout.as_millis() as u64, "Waiting for workflow return");
                tokio::select! {
                    biased;
                    received = receiver.recv() => match received {
                        Some(result) => Wait::Returned(result),
                        // The slot closes when an expired return consumed the entry.
                        None if Instant::now() >= deadline => Wait::TimedOut,
                        None => {
                            return Err(PlatformError::DeliveryFailed {
                                call_id,
                                reason: "response slot closed".to_string(),
                            })
                        }
                    },
                    _ = tokio::time::sleep_until(deadline) => Wait::TimedOut,
                    _ = cancel.cancelled() => Wait::Cancelled,
                }
            }
        };

        let result = match waited {
            Wait::Returned(result) => result,
            abandoned => {
                // Unregistering waits out any in-flight hand-off, so a return
                // that won the entry has already filled the slot.
                drop(guard);
                match receiver.try_recv() {
                    Ok(result) => {
                        tracing::debug!(%call_id, "Workflow return arrived while the call was being abandoned");
                        result
                    }
                    Err(_) if matches!(abandoned, Wait::Cancelled) => {
                        tracing::info!(%call_id, %target, "Workflow call cancelled by caller");
                        return Err(PlatformError::Cancelled { call_id });
                    }
                    Err(_) => {
                        tracing::warn!(%call_id, %target, "Workflow call timed out");
                        return Err(PlatformError::Timeout {
                            call_id,
                            seconds: timeout.as_secs(),
                        });
                    }
                }
            }
        };

        tracing::info!(%call_id, status = %result.status, "Workflow call completed");
        Ok(CallWorkflowResponse {
            call_id,
            status: CallStatus::Completed,
            data: Some(result.data),
            return_status: Some(result.status),
            duration: started.elapsed(),
        })
    }

    async fn return_to_workflow(
        &self,
        call_id: &str,
        data: Value,
        status: &str,
    ) -> Result<ReturnDelivery, PlatformError> {
        let result = WorkflowReturn {
            call_id: call_id.to_string(),
            data,
            status: status.to_string(),
            returned_at: Utc::now(),
        };

        // Removal and hand-off share one critical section with the caller's
        // unregistering, which keeps delivery single-shot.
        let mut pending = lock(&self.pending);
        let Some(entry) = pending.remove(call_id) else {
            drop(pending);
            tracing::warn!(%call_id, "No pending call for workflow return, keeping it in the data store");
            self.store.store(return_key(call_id), result.into_value(), self.config.store_ttl);
            return Ok(ReturnDelivery::Stored);
        };

        if Instant::now() >= entry.expires_at {
            drop(pending);
            tracing::warn!(%call_id, source_run = %entry.source.run_id, "Workflow return arrived after expiry");
            return Err(PlatformError::CallExpired {
                call_id: call_id.to_string(),
            });
        }

        let sent = entry.sender.try_send(result);
        drop(pending);

        match sent {
            Ok(()) => {
                tracing::debug!(%call_id, source_run = %entry.source.run_id, "Workflow return delivered");
                Ok(ReturnDelivery::Delivered)
            }
            Err(TrySendError::Full(_)) => Err(PlatformError::DeliveryFailed {
                call_id: call_id.to_string(),
                reason: "response slot already filled".to_string(),
            }),
            Err(TrySendError::Closed(_)) => Err(PlatformError::DeliveryFailed {
                call_id: call_id.to_string(),
                reason: "caller is no longer waiting".to_string(),
            }),
        }
    }

    async fn store_data(&self, key: &str, data: Value, ttl: Duration) -> Result<(), PlatformError> {
        self.store.store(key, data, ttl);
        Ok(())
    }

    async fn retrieve_data(&self, key: &str) -> Result<Value, PlatformError> {
        Ok(self.store.retrieve(key)?)
    }

    async fn delete_data(&self, key: &str) -> Result<bool, PlatformError> {
        Ok(self.store.delete(key))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
