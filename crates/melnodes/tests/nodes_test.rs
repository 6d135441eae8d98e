// crates/melnodes/tests/nodes_test.rs

use async_trait::async_trait;
use melcore::{
    AnyEnvelope, NodeConfig, NodeContext, NodeError, RegistryError, Trace, Value, VariableStore,
};
use melnodes::register_all;
use melruntime::{
    CallWorkflowRequest, CallWorkflowResponse, Capabilities, HttpRequest, HttpResponse, Mel,
    NodeRegistry, PlatformError, ReturnDelivery,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Platform double that answers HTTP with a canned response
struct StubMel {
    requests: Mutex<Vec<HttpRequest>>,
    response: Result<HttpResponse, PlatformError>,
}

impl StubMel {
    fn responding(status: u16, body: &str) -> Arc<Self> {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            response: Ok(HttpResponse {
                status,
                headers,
                body: body.to_string(),
                duration: Duration::from_millis(12),
            }),
        })
    }

    fn failing(error: PlatformError) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            response: Err(error),
        })
    }
}

#[async_trait]
impl Mel for StubMel {
    async fn http_request(&self, request: HttpRequest) -> Result<HttpResponse, PlatformError> {
        self.requests.lock().unwrap().push(request);
        self.response.clone()
    }

    async fn call_workflow(
        &self,
        _request: CallWorkflowRequest,
        _cancel: &CancellationToken,
    ) -> Result<CallWorkflowResponse, PlatformError> {
        Err(PlatformError::InvalidRequest("not supported by stub".to_string()))
    }

    async fn return_to_workflow(
        &self,
        call_id: &str,
        _data: Value,
        _status: &str,
    ) -> Result<ReturnDelivery, PlatformError> {
        Err(PlatformError::CallExpired { call_id: call_id.to_string() })
    }

    async fn store_data(&self, _key: &str, _data: Value, _ttl: Duration) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn retrieve_data(&self, key: &str) -> Result<Value, PlatformError> {
        Err(PlatformError::InvalidRequest(key.to_string()))
    }

    async fn delete_data(&self, _key: &str) -> Result<bool, PlatformError> {
        Ok(false)
    }
}

fn create_registry(mel: Arc<StubMel>) -> NodeRegistry {
    let registry = NodeRegistry::new();
    register_all(&registry, mel).unwrap();
    registry
}

fn create_test_context() -> NodeContext {
    NodeContext::new("agent-1", "run-1", Arc::new(VariableStore::new()))
}

fn envelope(data: Value) -> AnyEnvelope {
    AnyEnvelope::new(data, Trace::new("agent-1", "run-1", "source"))
}

#[test]
fn test_register_all_lists_standard_nodes() {
    let registry = create_registry(StubMel::responding(200, ""));

    let types = registry.list_node_types();
    for expected in [
        "flow.split",
        "flow.aggregate",
        "flow.batch",
        "workflow.call",
        "workflow.return",
        "http.request",
        "debug.log",
        "transform.json_parse",
        "transform.json_stringify",
    ] {
        assert!(types.iter().any(|t| t == expected), "{} should be registered", expected);
    }
    assert_eq!(registry.with_capability(Capabilities::ACTION).len(), types.len());
    assert!(registry.with_capability(Capabilities::MODEL).is_empty());

    let err = register_all(&registry, StubMel::responding(200, "")).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateNodeType(_)));
}

#[tokio::test]
async fn test_http_node_posts_payload_and_reports_response() {
    let mel = StubMel::responding(404, "missing");
    let registry = create_registry(mel.clone());
    let mut headers = HashMap::new();
    headers.insert("X-Trace".to_string(), Value::from("abc"));
    let node = NodeConfig::new("http.request")
        .with_id("fetch")
        .with_config("url", "http://service.local/items")
        .with_config("method", "post")
        .with_config("headers", Value::Object(headers))
        .with_config("timeout_seconds", 3u64);

    let output = registry
        .execute(&create_test_context(), &node, &envelope(Value::from("payload")))
        .await
        .unwrap()
        .single()
        .unwrap();

    assert_eq!(output.data.get_path("status").and_then(Value::as_u64), Some(404));
    assert_eq!(output.data.get_path("body"), Some(&Value::from("missing")));
    assert_eq!(output.data.get_path("headers.content-type"), Some(&Value::from("text/plain")));
    assert_eq!(output.data.get_path("duration_ms").and_then(Value::as_u64), Some(12));

    let requests = mel.requests.lock().unwrap();
    let sent = &requests[0];
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.url, "http://service.local/items");
    assert_eq!(sent.body, Some(Value::from("payload")));
    assert_eq!(sent.headers.get("X-Trace").map(String::as_str), Some("abc"));
    assert_eq!(sent.timeout, Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_http_node_get_sends_no_body() {
    let mel = StubMel::responding(200, "ok");
    let registry = create_registry(mel.clone());
    let node = NodeConfig::new("http.request").with_config("url", "http://service.local/");

    registry
        .execute(&create_test_context(), &node, &envelope(Value::from("ignored")))
        .await
        .unwrap();

    let requests = mel.requests.lock().unwrap();
    assert_eq!(requests[0].method, "GET");
    assert!(requests[0].body.is_none());
}

#[tokio::test]
async fn test_http_node_transport_failure() {
    let registry = create_registry(StubMel::failing(PlatformError::Http("connection refused".to_string())));
    let node = NodeConfig::new("http.request").with_config("url", "http://service.local/");

    let failure = registry
        .execute(&create_test_context(), &node, &envelope(Value::Null))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, NodeError::ExecutionFailed(_)));
    assert!(failure.error.is_retryable());

    let missing_url = NodeConfig::new("http.request");
    let failure = registry
        .execute(&create_test_context(), &missing_url, &envelope(Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(failure.error, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_expired_return_is_not_retryable() {
    let registry = create_registry(StubMel::responding(200, ""));
    let node = NodeConfig::new("workflow.return").with_config("call_id", "gone");

    let failure = registry
        .execute(&create_test_context(), &node, &envelope(Value::Null))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, NodeError::Aborted(_)));
    assert!(!failure.error.is_retryable());
}

#[tokio::test]
async fn test_json_parse_and_stringify() {
    let registry = create_registry(StubMel::responding(200, ""));
    let ctx = create_test_context();

    let parse = NodeConfig::new("transform.json_parse").with_id("parse");
    let parsed = registry
        .execute(&ctx, &parse, &envelope(Value::from(r#"{"name":"widget","qty":3}"#)))
        .await
        .unwrap()
        .single()
        .unwrap();
    assert_eq!(parsed.data.get_path("name"), Some(&Value::from("widget")));
    assert_eq!(parsed.data.get_path("qty").and_then(Value::as_u64), Some(3));
    assert_eq!(parsed.trace.node_id, "parse");

    let stringify = NodeConfig::new("transform.json_stringify").with_id("stringify");
    let text = registry
        .execute(&ctx, &stringify, &parsed)
        .await
        .unwrap()
        .single()
        .unwrap();
    let round_trip: serde_json::Value = serde_json::from_str(text.data.as_str().unwrap()).unwrap();
    assert_eq!(round_trip, serde_json::json!({"name": "widget", "qty": 3}));
}

#[tokio::test]
async fn test_json_parse_rejects_non_string_and_bad_json() {
    let registry = create_registry(StubMel::responding(200, ""));
    let ctx = create_test_context();
    let parse = NodeConfig::new("transform.json_parse");

    let failure = registry
        .execute(&ctx, &parse, &envelope(Value::from(5.0)))
        .await
        .unwrap_err();
    assert!(matches!(failure.error, NodeError::TypeMismatch { .. }));
    assert_eq!(failure.envelope.last_error().unwrap().code.as_deref(), Some("type_mismatch"));

    let failure = registry
        .execute(&ctx, &parse, &envelope(Value::from("{not json")))
        .await
        .unwrap_err();
    assert!(matches!(failure.error, NodeError::ExecutionFailed(_)));
}

#[tokio::test]
async fn test_debug_passes_envelope_through() {
    let registry = create_registry(StubMel::responding(200, ""));
    let node = NodeConfig::new("debug.log")
        .with_id("dbg")
        .with_config("message", "checkpoint");
    let input = envelope(Value::from("data")).with_meta("k", "v");

    let output = registry
        .execute(&create_test_context(), &node, &input)
        .await
        .unwrap()
        .single()
        .unwrap();

    assert_eq!(output.data, input.data);
    assert_eq!(output.get_meta("k"), Some("v"));
    assert_ne!(output.id, input.id);
}
