use async_trait::async_trait;
use melcore::{
    meta_keys, AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput,
    NodeTypeMeta, ParameterSpec, Value,
};

pub const SPLIT_NODE_TYPE: &str = "flow.split";

/// Fans a sequence out into one envelope per element.
///
/// Children carry `split_index`/`split_total` meta and a trace derived with
/// [`Trace::child`](melcore::Trace::child), so an aggregator further down can
/// regroup them.
pub struct SplitNode;

#[async_trait]
impl NodeDefinition for SplitNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(SPLIT_NODE_TYPE, "Split", "flow")
            .with_description("Emit one envelope per element of a sequence")
            .with_parameter(ParameterSpec::optional(
                "path",
                "Dotted path to the sequence inside the payload",
                "",
            ))
            .with_parameter(ParameterSpec::optional(
                "preserve_empty",
                "Pass an empty sequence through instead of failing",
                false,
            ))
    }

    async fn execute(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let items = sequence(node, input)?;
        let total = items.len();

        if total == 0 {
            if !node.get_bool("preserve_empty").unwrap_or(false) {
                return Err(NodeError::EmptyInput(format!("node {} received no items to split", node.id)));
            }
            tracing::debug!(node_id = %node.id, "Preserving empty sequence");
            let envelope = input
                .forward(&node.id, Value::Array(Vec::new()))
                .with_meta(meta_keys::SPLIT_TOTAL, "0");
            return Ok(NodeOutput::Single(envelope));
        }

        let parent = input.trace.next(&node.id);
        let children = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                input
                    .derive(item.clone(), parent.child(&node.id, index))
                    .with_meta(meta_keys::SPLIT_INDEX, index.to_string())
                    .with_meta(meta_keys::SPLIT_TOTAL, total.to_string())
            })
            .collect::<Vec<_>>();

        tracing::debug!(node_id = %node.id, total, "Split sequence");
        Ok(NodeOutput::Many(children))
    }
}

/// Resolve the sequence a node operates on: the payload itself, or the
/// value at the node's `path` config.
pub(crate) fn sequence<'a>(node: &NodeConfig, input: &'a AnyEnvelope) -> Result<&'a Vec<Value>, NodeError> {
    let (field, value) = match node.get_str("path").filter(|p| !p.is_empty()) {
        Some(path) => (
            path,
            input
                .data
                .get_path(path)
                .ok_or_else(|| NodeError::MissingInput(path.to_string()))?,
        ),
        None => ("data", &input.data),
    };

    value.as_array().ok_or_else(|| NodeError::InvalidInputType {
        field: field.to_string(),
        expected: "array".to_string(),
        actual: value.data_type().to_string(),
    })
}
