use crate::{AnyEnvelope, DataKind, Envelope, NodeError, Value, VariableContext, VariableStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Core trait that all executable nodes implement
#[async_trait]
pub trait NodeDefinition: Send + Sync {
    /// Type metadata (type id, label, category, parameters)
    fn meta(&self) -> NodeTypeMeta;

    /// Execute the node against `input`, producing new envelopes.
    ///
    /// The input is borrowed: a node must never hand back the envelope it was
    /// given, only derivations of it.
    async fn execute(
        &self,
        ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError>;
}

/// Node with statically typed input and output payloads.
///
/// Wrapped by a bridging adapter in the runtime crate to be registered next
/// to untyped [`NodeDefinition`]s.
#[async_trait]
pub trait TypedNodeDefinition: Send + Sync {
    type Input: DeserializeOwned + DataKind + Send + Sync;
    type Output: Serialize + DataKind + Send + Sync;

    fn meta(&self) -> NodeTypeMeta;

    async fn execute_typed(
        &self,
        ctx: &NodeContext,
        node: &NodeConfig,
        input: Envelope<Self::Input>,
    ) -> Result<Envelope<Self::Output>, NodeError>;
}

/// Static description of a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTypeMeta {
    pub type_id: String,
    pub label: String,
    pub category: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl NodeTypeMeta {
    pub fn new(
        type_id: impl Into<String>,
        label: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            label: label.into(),
            category: category.into(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default: Some(default.into()),
        }
    }
}

/// Node instance in a workflow: identity, type tag and configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub node_type: String,
    pub name: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl NodeConfig {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_type: node_type.into(),
            name: None,
            config: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.config.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.config.get(name).and_then(Value::as_bool)
    }

    /// Read a non-negative integer, failing on values of the wrong type.
    pub fn get_u64(&self, name: &str) -> Result<Option<u64>, NodeError> {
        match self.config.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                NodeError::Configuration(format!(
                    "'{}' must be a non-negative integer, got {}",
                    name,
                    value.data_type()
                ))
            }),
        }
    }
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    pub agent_id: String,
    pub run_id: String,
    /// Variable store for global and workflow scopes
    pub variables: Arc<VariableStore>,
    /// Cancellation token for the current run
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(
        agent_id: impl Into<String>,
        run_id: impl Into<String>,
        variables: Arc<VariableStore>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            run_id: run_id.into(),
            variables,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn variable_context(&self) -> VariableContext {
        VariableContext::new(self.agent_id.clone(), self.run_id.clone())
    }
}

/// Result of a single node execution
#[derive(Debug)]
pub enum NodeOutput {
    /// One envelope continues down the pipeline
    Single(AnyEnvelope),
    /// Fan-out: each envelope is processed independently
    Many(Vec<AnyEnvelope>),
    /// Nothing to emit yet (e.g. an aggregator still waiting for items)
    Pending,
}

impl NodeOutput {
    pub fn is_pending(&self) -> bool {
        matches!(self, NodeOutput::Pending)
    }

    pub fn into_envelopes(self) -> Vec<AnyEnvelope> {
        match self {
            NodeOutput::Single(envelope) => vec![envelope],
            NodeOutput::Many(envelopes) => envelopes,
            NodeOutput::Pending => Vec::new(),
        }
    }

    /// The single envelope, if this is a `Single` output.
    pub fn single(self) -> Option<AnyEnvelope> {
        match self {
            NodeOutput::Single(envelope) => Some(envelope),
            _ => None,
        }
    }
}

impl From<AnyEnvelope> for NodeOutput {
    fn from(envelope: AnyEnvelope) -> Self {
        NodeOutput::Single(envelope)
    }
}
