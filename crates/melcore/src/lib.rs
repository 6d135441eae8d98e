//! Core abstractions for the Mel workflow engine
//!
//! This crate provides the data contract every node, trigger and worker
//! shares: the [`Envelope`] payload container, [`Trace`] correlation,
//! scoped variables, converters and the node execution traits.

mod contracts;
mod convert;
mod envelope;
mod error;
mod node;
mod trace;
mod value;
mod variables;

pub use contracts::{
    ChatMessage, MemoryNode, ModelNode, ModelRequest, ModelResponse, ToolNode, ToolSpec,
    TriggerNode,
};
pub use convert::{Converter, ConverterSet, JsonConverter, CONTENT_TYPE_JSON, CONTENT_TYPE_JSON_PRETTY};
pub use envelope::{AnyEnvelope, Envelope, EnvelopeId, ExecutionError};
pub use error::{ConvertError, FlowError, NodeError, RegistryError, VariableError};
pub use node::{
    NodeConfig, NodeContext, NodeDefinition, NodeOutput, NodeTypeMeta, ParameterSpec,
    TypedNodeDefinition,
};
pub use trace::Trace;
pub use value::{plain_json, DataKind, DataType, Value};
pub use variables::{VariableContext, VariableScope, VariableStore};

/// Meta keys written by the control-flow nodes
pub mod meta_keys {
    pub const SPLIT_INDEX: &str = "split_index";
    pub const SPLIT_TOTAL: &str = "split_total";
    pub const BATCH_INDEX: &str = "batch_index";
    pub const TOTAL_BATCHES: &str = "total_batches";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const AGGREGATE_COUNT: &str = "aggregate_count";
    pub const WORKFLOW_CALL_ID: &str = "workflow_call_id";
    pub const SOURCE_WORKFLOW_ID: &str = "source_workflow_id";
    pub const SOURCE_RUN_ID: &str = "source_run_id";
    pub const OUTBOUND_CALL_ID: &str = "outbound_call_id";
    pub const RETURN_STATUS: &str = "return_status";
    pub const RETURN_DELIVERY: &str = "return_delivery";
}

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
