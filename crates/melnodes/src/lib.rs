//! Standard node library
//!
//! Collection of built-in nodes: control flow (split, aggregate, batch),
//! cross-workflow call/return, HTTP, debugging and JSON transforms.

mod aggregator;
mod batch;
mod debug;
mod http;
mod splitter;
mod transform;
mod workflow;

pub use aggregator::{AggregateNode, AGGREGATE_NODE_TYPE};
pub use batch::{BatchNode, BATCH_NODE_TYPE};
pub use debug::{DebugNode, DEBUG_NODE_TYPE};
pub use http::{HttpRequestNode, HTTP_NODE_TYPE};
pub use splitter::{SplitNode, SPLIT_NODE_TYPE};
pub use transform::{JsonParseNode, JsonStringifyNode, JSON_PARSE_NODE_TYPE, JSON_STRINGIFY_NODE_TYPE};
pub use workflow::{WorkflowCallNode, WorkflowReturnNode, CALL_NODE_TYPE, RETURN_NODE_TYPE};

use melcore::RegistryError;
use melruntime::{Mel, NodeRegistration, NodeRegistry};
use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &NodeRegistry, mel: Arc<dyn Mel>) -> Result<(), RegistryError> {
    registry.register_node(Arc::new(SplitNode))?;
    registry.register_node(Arc::new(AggregateNode::new()))?;
    registry.register_node(Arc::new(BatchNode))?;
    registry.register_node(Arc::new(WorkflowCallNode::new(mel.clone())))?;
    registry.register_node(Arc::new(WorkflowReturnNode::new(mel.clone())))?;
    registry.register_node(Arc::new(HttpRequestNode::new(mel)))?;
    registry.register_node(Arc::new(DebugNode))?;
    registry.register(NodeRegistration::typed(JsonParseNode))?;
    registry.register(NodeRegistration::typed(JsonStringifyNode))?;
    Ok(())
}
