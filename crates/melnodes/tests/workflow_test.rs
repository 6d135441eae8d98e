// crates/melnodes/tests/workflow_test.rs

use async_trait::async_trait;
use melcore::{meta_keys, AnyEnvelope, NodeConfig, NodeError, Trace, Value};
use melnodes::register_all;
use melruntime::{
    MelRuntime, PlatformError, RuntimeConfig, TriggerRequest, WorkflowTrigger,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hands every dispatched request to the test instead of the network
struct ChannelTrigger {
    sender: mpsc::UnboundedSender<(String, TriggerRequest)>,
}

#[async_trait]
impl WorkflowTrigger for ChannelTrigger {
    async fn trigger(&self, target: &str, request: &TriggerRequest) -> Result<(), PlatformError> {
        let _ = self.sender.send((target.to_string(), request.clone()));
        Ok(())
    }
}

fn create_runtime() -> (Arc<MelRuntime>, mpsc::UnboundedReceiver<(String, TriggerRequest)>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let runtime = MelRuntime::with_trigger(RuntimeConfig::default(), Arc::new(ChannelTrigger { sender }));
    register_all(runtime.registry(), runtime.mel()).expect("standard nodes register once");
    (Arc::new(runtime), receiver)
}

fn call_node(mode: &str) -> NodeConfig {
    NodeConfig::new("workflow.call")
        .with_id("call-billing")
        .with_config("workflow_id", "billing")
        .with_config("mode", mode)
        .with_config("timeout_seconds", 5u64)
}

#[tokio::test]
async fn test_sync_call_returns_called_workflow_result() {
    let (runtime, mut dispatched) = create_runtime();

    // The called workflow: echo the payload back with a status
    let callee = runtime.clone();
    let responder = tokio::spawn(async move {
        let (target, request) = dispatched.recv().await.unwrap();
        assert_eq!(target, "billing");
        assert_eq!(request.source_workflow_id, "orders");

        let ctx = callee.context("billing", "run-called");
        let first = request.into_envelope("billing", "run-called");
        let pipeline = vec![NodeConfig::new("workflow.return")
            .with_id("answer")
            .with_config("status", "paid")];
        callee.run(&ctx, &pipeline, first).await
    });

    let ctx = runtime.context("orders", "run-caller");
    let input = AnyEnvelope::new(Value::from("invoice-42"), Trace::new("orders", "run-caller", "start"));
    let result = runtime.run(&ctx, &[call_node("sync")], input).await;

    assert!(result.is_success(), "Call should succeed: {:?}", result.failures);
    let output = &result.outputs[0];
    assert_eq!(output.data, Value::from("invoice-42"));
    assert_eq!(output.get_meta(meta_keys::RETURN_STATUS), Some("paid"));
    assert!(output.get_meta(meta_keys::OUTBOUND_CALL_ID).is_some());
    assert_eq!(output.trace.node_id, "call-billing");

    let callee_result = responder.await.unwrap();
    assert_eq!(
        callee_result.outputs[0].get_meta(meta_keys::RETURN_DELIVERY),
        Some("delivered")
    );
    assert_eq!(runtime.platform().pending_calls(), 0);
}

#[tokio::test]
async fn test_async_call_acknowledges_immediately() {
    let (runtime, mut dispatched) = create_runtime();
    let ctx = runtime.context("orders", "run-caller");
    let input = AnyEnvelope::new(Value::from(1.0), Trace::new("orders", "run-caller", "start"));

    let result = runtime.run(&ctx, &[call_node("async")], input).await;

    let output = &result.outputs[0];
    assert_eq!(output.data.get_path("status"), Some(&Value::from("sent")));
    let call_id = output.data.get_path("call_id").and_then(Value::as_str).unwrap().to_string();
    assert_eq!(output.get_meta(meta_keys::OUTBOUND_CALL_ID), Some(call_id.as_str()));

    // The eventual return has nobody waiting and lands in the data store
    let (_, request) = dispatched.recv().await.unwrap();
    let callee_ctx = runtime.context("billing", "run-called");
    let pipeline = vec![NodeConfig::new("workflow.return").with_id("answer")];
    let callee = runtime
        .run(&callee_ctx, &pipeline, request.into_envelope("billing", "run-called"))
        .await;

    assert_eq!(callee.outputs[0].get_meta(meta_keys::RETURN_DELIVERY), Some("stored"));
    let stored = runtime.platform().retrieve_return(&call_id).unwrap();
    assert_eq!(stored.get_path("status"), Some(&Value::from("success")));
    assert_eq!(stored.get_path("data"), Some(&Value::from(1.0)));
}

#[tokio::test(start_paused = true)]
async fn test_sync_call_timeout_fails_node() {
    let (runtime, _dispatched) = create_runtime();
    let ctx = runtime.context("orders", "run-caller");
    let node = call_node("sync").with_config("timeout_seconds", 1u64);
    let input = AnyEnvelope::new(Value::Null, Trace::new("orders", "run-caller", "start"));

    let result = runtime.run(&ctx, &[node], input).await;

    assert_eq!(result.failures.len(), 1);
    let failure = &result.failures[0];
    assert_eq!(failure.error, NodeError::Timeout { seconds: 1 });
    assert!(failure.error.is_retryable());
    assert_eq!(failure.envelope.last_error().unwrap().code.as_deref(), Some("timeout"));
    assert_eq!(runtime.platform().pending_calls(), 0);
}

#[tokio::test]
async fn test_call_requires_valid_config() {
    let (runtime, _dispatched) = create_runtime();
    let ctx = runtime.context("orders", "run-caller");
    let input = || AnyEnvelope::new(Value::Null, Trace::new("orders", "run-caller", "start"));

    let no_target = NodeConfig::new("workflow.call");
    let result = runtime.run(&ctx, &[no_target], input()).await;
    assert!(matches!(result.failures[0].error, NodeError::Configuration(_)));

    let bad_mode = call_node("later");
    let result = runtime.run(&ctx, &[bad_mode], input()).await;
    assert!(matches!(result.failures[0].error, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_return_without_call_id_fails() {
    let (runtime, _dispatched) = create_runtime();
    let ctx = runtime.context("billing", "run-called");
    let input = AnyEnvelope::new(Value::Null, Trace::new("billing", "run-called", "start"));

    let pipeline = vec![NodeConfig::new("workflow.return").with_id("answer")];
    let result = runtime.run(&ctx, &pipeline, input).await;

    assert_eq!(
        result.failures[0].error,
        NodeError::MissingInput(meta_keys::WORKFLOW_CALL_ID.to_string())
    );
}

#[tokio::test]
async fn test_return_with_explicit_call_id() {
    let (runtime, _dispatched) = create_runtime();
    let ctx = runtime.context("billing", "run-called");
    let input = AnyEnvelope::new(Value::from("late"), Trace::new("billing", "run-called", "start"));

    let pipeline = vec![NodeConfig::new("workflow.return")
        .with_id("answer")
        .with_config("call_id", "external-7")
        .with_config("status", "error")];
    let result = runtime.run(&ctx, &pipeline, input).await;

    assert!(result.is_success());
    let stored = runtime.platform().retrieve_return("external-7").unwrap();
    assert_eq!(stored.get_path("status"), Some(&Value::from("error")));
}
