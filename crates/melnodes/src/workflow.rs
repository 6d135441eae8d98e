//! Cross-workflow call and return nodes.
//!
//! `workflow.call` hands its payload to another workflow through the platform;
//! in sync mode it suspends until that workflow runs `workflow.return` with
//! the same call id, the timeout fires, or the run is cancelled.

use async_trait::async_trait;
use melcore::{
    meta_keys, AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput,
    NodeTypeMeta, ParameterSpec, Value,
};
use melruntime::{CallMode, CallStatus, CallWorkflowRequest, Mel, PlatformError, ReturnDelivery, SourceContext};
use std::collections::HashMap;
use std::sync::Arc;

pub const CALL_NODE_TYPE: &str = "workflow.call";
pub const RETURN_NODE_TYPE: &str = "workflow.return";

pub struct WorkflowCallNode {
    mel: Arc<dyn Mel>,
}

impl WorkflowCallNode {
    pub fn new(mel: Arc<dyn Mel>) -> Self {
        Self { mel }
    }
}

#[async_trait]
impl NodeDefinition for WorkflowCallNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(CALL_NODE_TYPE, "Call Workflow", "workflow")
            .with_description("Run another workflow with this payload")
            .with_parameter(ParameterSpec::required("workflow_id", "Workflow to call"))
            .with_parameter(ParameterSpec::optional("mode", "sync or async", "sync"))
            .with_parameter(ParameterSpec::optional(
                "timeout_seconds",
                "Sync call timeout; platform default when unset",
                Value::Null,
            ))
    }

    async fn execute(
        &self,
        ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let target = node
            .get_str("workflow_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| NodeError::Configuration("Missing config: workflow_id".to_string()))?;
        let call_mode = match node.get_str("mode").unwrap_or("sync") {
            "sync" => CallMode::Sync,
            "async" => CallMode::Async,
            other => {
                return Err(NodeError::Configuration(format!(
                    "mode must be 'sync' or 'async', got '{}'",
                    other
                )))
            }
        };

        let request = CallWorkflowRequest {
            target_workflow_id: target.to_string(),
            call_data: input.data.clone(),
            call_mode,
            timeout_seconds: node.get_u64("timeout_seconds")?,
            source: SourceContext {
                workflow_id: ctx.agent_id.clone(),
                run_id: ctx.run_id.clone(),
                node_id: Some(node.id.clone()),
            },
        };

        let response = self
            .mel
            .call_workflow(request, &ctx.cancellation)
            .await
            .map_err(node_error)?;

        let envelope = match response.status {
            CallStatus::Completed => input
                .forward(&node.id, response.data.unwrap_or_default())
                .with_meta(meta_keys::RETURN_STATUS, response.return_status.unwrap_or_default()),
            CallStatus::Sent => {
                let mut ack = HashMap::new();
                ack.insert("call_id".to_string(), Value::from(response.call_id.as_str()));
                ack.insert("status".to_string(), Value::from("sent"));
                input.forward(&node.id, Value::Object(ack))
            }
        };

        Ok(NodeOutput::Single(
            envelope.with_meta(meta_keys::OUTBOUND_CALL_ID, response.call_id),
        ))
    }
}

/// Answers the call that started this run.
///
/// The call id comes from the `call_id` config or the `workflow_call_id` meta
/// the trigger put on the run's first envelope.
pub struct WorkflowReturnNode {
    mel: Arc<dyn Mel>,
}

impl WorkflowReturnNode {
    pub fn new(mel: Arc<dyn Mel>) -> Self {
        Self { mel }
    }
}

#[async_trait]
impl NodeDefinition for WorkflowReturnNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(RETURN_NODE_TYPE, "Return to Caller", "workflow")
            .with_description("Send this payload back to the calling workflow")
            .with_parameter(ParameterSpec::optional(
                "call_id",
                "Call to answer; defaults to the workflow_call_id meta",
                "",
            ))
            .with_parameter(ParameterSpec::optional("status", "Status reported to the caller", "success"))
    }

    async fn execute(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let call_id = node
            .get_str("call_id")
            .filter(|id| !id.is_empty())
            .or_else(|| input.get_meta(meta_keys::WORKFLOW_CALL_ID))
            .ok_or_else(|| NodeError::MissingInput(meta_keys::WORKFLOW_CALL_ID.to_string()))?
            .to_string();
        let status = node.get_str("status").unwrap_or("success");

        let delivery = self
            .mel
            .return_to_workflow(&call_id, input.data.clone(), status)
            .await
            .map_err(node_error)?;

        let delivery = match delivery {
            ReturnDelivery::Delivered => "delivered",
            ReturnDelivery::Stored => "stored",
        };
        tracing::info!(node_id = %node.id, %call_id, delivery, "Returned to calling workflow");

        Ok(NodeOutput::Single(
            input
                .forward(&node.id, input.data.clone())
                .with_meta(meta_keys::RETURN_DELIVERY, delivery),
        ))
    }
}

/// Map a platform failure onto the node error with the same retry semantics.
pub(crate) fn node_error(error: PlatformError) -> NodeError {
    match error {
        PlatformError::Timeout { seconds, .. } => NodeError::Timeout { seconds },
        PlatformError::Cancelled { .. } => NodeError::Cancelled,
        PlatformError::InvalidRequest(message) => NodeError::Configuration(message),
        other if other.is_retryable() => NodeError::ExecutionFailed(other.to_string()),
        other => NodeError::Aborted(other.to_string()),
    }
}
