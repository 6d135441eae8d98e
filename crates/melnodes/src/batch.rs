use crate::splitter::sequence;
use async_trait::async_trait;
use melcore::{
    meta_keys, AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput,
    NodeTypeMeta, ParameterSpec, Trace, Value,
};

pub const BATCH_NODE_TYPE: &str = "flow.batch";

/// Cuts a sequence into fixed-size windows.
///
/// Emits the window selected by `batch_index` (default 0). Later windows are
/// reached by running the node again with a higher index, or all at once
/// with `emit_all`.
pub struct BatchNode;

#[async_trait]
impl NodeDefinition for BatchNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(BATCH_NODE_TYPE, "Batch", "flow")
            .with_description("Split a sequence into fixed-size windows")
            .with_parameter(ParameterSpec::required("batch_size", "Items per window"))
            .with_parameter(ParameterSpec::optional("batch_index", "Window to emit", 0u64))
            .with_parameter(ParameterSpec::optional("emit_all", "Emit every window", false))
            .with_parameter(ParameterSpec::optional(
                "path",
                "Dotted path to the sequence inside the payload",
                "",
            ))
    }

    async fn execute(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let batch_size = match node.get_u64("batch_size")? {
            Some(size) if size > 0 => size as usize,
            Some(_) => return Err(NodeError::Configuration("batch_size must be greater than 0".to_string())),
            None => return Err(NodeError::Configuration("Missing config: batch_size".to_string())),
        };

        let items = sequence(node, input)?;
        if items.is_empty() {
            return Err(NodeError::EmptyInput(format!("node {} received no items to batch", node.id)));
        }

        let windows: Vec<&[Value]> = items.chunks(batch_size).collect();
        let total = windows.len();
        let window = |index: usize, trace: Trace| {
            input
                .derive(Value::Array(windows[index].to_vec()), trace)
                .with_meta(meta_keys::BATCH_INDEX, index.to_string())
                .with_meta(meta_keys::TOTAL_BATCHES, total.to_string())
                .with_meta(meta_keys::BATCH_SIZE, batch_size.to_string())
        };

        if node.get_bool("emit_all").unwrap_or(false) {
            let parent = input.trace.next(&node.id);
            let batches = (0..total).map(|i| window(i, parent.child(&node.id, i))).collect();
            tracing::debug!(node_id = %node.id, total, batch_size, "Emitting all batches");
            return Ok(NodeOutput::Many(batches));
        }

        let index = node.get_u64("batch_index")?.unwrap_or(0) as usize;
        if index >= total {
            return Err(NodeError::Configuration(format!(
                "batch_index {} out of range, input has {} batches",
                index, total
            )));
        }

        tracing::debug!(node_id = %node.id, index, total, batch_size, "Emitting batch");
        Ok(NodeOutput::Single(window(index, input.trace.next(&node.id))))
    }
}
