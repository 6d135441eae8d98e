use async_trait::async_trait;
use melcore::{
    AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput, NodeTypeMeta,
    ParameterSpec,
};

pub const DEBUG_NODE_TYPE: &str = "debug.log";

/// Simple debug node that logs the envelope passing through it
pub struct DebugNode;

#[async_trait]
impl NodeDefinition for DebugNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(DEBUG_NODE_TYPE, "Debug", "debug")
            .with_description("Logs input values for debugging")
            .with_parameter(ParameterSpec::optional("message", "Label for the log line", "(no message)"))
    }

    async fn execute(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let message = node.get_str("message").unwrap_or("(no message)");

        tracing::info!(
            node_id = %node.id,
            envelope = %input.id,
            data_type = %input.data_type,
            run_id = %input.trace.run_id,
            errors = input.errors().len(),
            "DEBUG: {}",
            message
        );
        for (key, value) in &input.meta {
            tracing::info!(node_id = %node.id, "  {}: {}", key, value);
        }
        tracing::debug!(node_id = %node.id, data = %input.data.to_json(), "Payload");

        Ok(NodeOutput::Single(input.forward(&node.id, input.data.clone())))
    }
}
