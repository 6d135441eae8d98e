use async_trait::async_trait;
use melcore::{
    meta_keys, AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput,
    NodeTypeMeta, ParameterSpec, Value,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub const AGGREGATE_NODE_TYPE: &str = "flow.aggregate";

/// Groups are scoped to one aggregator node within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    agent_id: String,
    run_id: String,
    node_id: String,
}

/// Collects envelopes until a group is complete, then emits them merged.
///
/// Each invocation either returns [`NodeOutput::Pending`] or the merged
/// envelope. The expected size of a group comes from the `expected_count`
/// config, else the `split_total` meta of its first item, else 1. With
/// `partial_results` every invocation emits what has arrived so far.
///
/// Payloads are merged in arrival order, not split order.
#[derive(Default)]
pub struct AggregateNode {
    groups: Mutex<HashMap<GroupKey, Vec<AnyEnvelope>>>,
}

impl AggregateNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups still waiting for items.
    pub fn open_groups(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GroupKey, Vec<AnyEnvelope>>> {
        self.groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NodeDefinition for AggregateNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(AGGREGATE_NODE_TYPE, "Aggregate", "flow")
            .with_description("Merge split items back into one envelope")
            .with_parameter(ParameterSpec::optional(
                "expected_count",
                "Items per group; defaults to the split_total of the first item",
                Value::Null,
            ))
            .with_parameter(ParameterSpec::optional(
                "partial_results",
                "Emit whatever has arrived on every item",
                false,
            ))
    }

    async fn execute(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let configured = node.get_u64("expected_count")?;
        let partial = node.get_bool("partial_results").unwrap_or(false);
        let key = GroupKey {
            agent_id: input.trace.agent_id.clone(),
            run_id: input.trace.run_id.clone(),
            node_id: node.id.clone(),
        };

        let items = {
            let mut groups = self.lock();
            let group = groups.entry(key.clone()).or_default();
            group.push(input.clone());

            let expected = configured
                .or_else(|| {
                    group
                        .first()
                        .and_then(|first| first.get_meta(meta_keys::SPLIT_TOTAL))
                        .and_then(|total| total.parse::<u64>().ok())
                })
                .unwrap_or(1)
                .max(1) as usize;

            if group.len() < expected && !partial {
                tracing::debug!(node_id = %node.id, received = group.len(), expected, "Waiting for more items");
                return Ok(NodeOutput::Pending);
            }
            groups.remove(&key).unwrap_or_default()
        };

        tracing::debug!(node_id = %node.id, run_id = %key.run_id, count = items.len(), "Emitting aggregate");
        Ok(merge(&node.id, items).map_or(NodeOutput::Pending, NodeOutput::Single))
    }
}

/// Ordered payload list; later meta and variables override earlier ones,
/// errors are concatenated.
fn merge(node_id: &str, items: Vec<AnyEnvelope>) -> Option<AnyEnvelope> {
    let count = items.len();
    let mut items = items.into_iter();
    let first = items.next()?;

    let mut merged = first.derive(Value::Array(Vec::with_capacity(count)), first.trace.next(node_id));
    let mut payloads = vec![first.data];

    for item in items {
        payloads.push(item.data);
        merged.meta.extend(item.meta);
        merged.variables.extend(item.variables);
        merged.binary.extend(item.binary);
        merged.errors.extend(item.errors);
    }

    merged.data = Value::Array(payloads);
    merged.set_meta(meta_keys::AGGREGATE_COUNT, count.to_string());
    Some(merged)
}
