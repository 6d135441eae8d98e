use crate::{Capabilities, TypedAdapter};
use melcore::{
    AnyEnvelope, ExecutionError, MemoryNode, ModelNode, NodeConfig, NodeContext, NodeDefinition,
    NodeError, NodeOutput, NodeTypeMeta, RegistryError, ToolNode, TriggerNode, TypedNodeDefinition,
};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Everything handed to the registry for one node type.
///
/// Extended contracts are attached explicitly; each one adds its capability
/// flag. Every registration is `action` capable.
#[derive(Clone)]
pub struct NodeRegistration {
    definition: Arc<dyn NodeDefinition>,
    model: Option<Arc<dyn ModelNode>>,
    memory: Option<Arc<dyn MemoryNode>>,
    tool: Option<Arc<dyn ToolNode>>,
    trigger: Option<Arc<dyn TriggerNode>>,
}

impl NodeRegistration {
    pub fn new(definition: Arc<dyn NodeDefinition>) -> Self {
        Self {
            definition,
            model: None,
            memory: None,
            tool: None,
            trigger: None,
        }
    }

    /// Register a typed node through the bridging adapter.
    pub fn typed<N>(node: N) -> Self
    where
        N: TypedNodeDefinition + 'static,
    {
        Self::new(Arc::new(TypedAdapter::new(node)))
    }

    pub fn model(mut self, model: Arc<dyn ModelNode>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryNode>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn ToolNode>) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn trigger(mut self, trigger: Arc<dyn TriggerNode>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::ACTION;
        if self.model.is_some() {
            caps |= Capabilities::MODEL;
        }
        if self.memory.is_some() {
            caps |= Capabilities::MEMORY;
        }
        if self.tool.is_some() {
            caps |= Capabilities::TOOL;
        }
        if self.trigger.is_some() {
            caps |= Capabilities::TRIGGER;
        }
        caps
    }

    pub fn type_id(&self) -> String {
        self.definition.meta().type_id
    }
}

/// Registry entry as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub meta: NodeTypeMeta,
    pub capabilities: Capabilities,
}

/// Failed execution: the error plus a derivation of the input that records it
#[derive(Debug)]
pub struct NodeFailure {
    pub error: NodeError,
    pub envelope: AnyEnvelope,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} failed: {}", self.envelope.trace.node_id, self.error)
    }
}

impl std::error::Error for NodeFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

struct Entry {
    type_id: String,
    capabilities: Capabilities,
    registration: NodeRegistration,
}

/// Catalog of available node types.
///
/// Append-only and searched linearly; node catalogs are small.
#[derive(Default)]
pub struct NodeRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Type ids must be unique.
    pub fn register(&self, registration: NodeRegistration) -> Result<(), RegistryError> {
        let type_id = registration.type_id();
        let capabilities = registration.capabilities();
        let mut entries = write(&self.entries);
        if entries.iter().any(|e| e.type_id == type_id) {
            return Err(RegistryError::DuplicateNodeType(type_id));
        }
        tracing::info!(node_type = %type_id, %capabilities, "Registering node type");
        entries.push(Entry {
            type_id,
            capabilities,
            registration,
        });
        Ok(())
    }

    /// Register a plain action node.
    pub fn register_node(&self, definition: Arc<dyn NodeDefinition>) -> Result<(), RegistryError> {
        self.register(NodeRegistration::new(definition))
    }

    pub fn definition(&self, type_id: &str) -> Result<Arc<dyn NodeDefinition>, RegistryError> {
        self.with_entry(type_id, |e| e.registration.definition.clone())
    }

    pub fn capabilities(&self, type_id: &str) -> Result<Capabilities, RegistryError> {
        self.with_entry(type_id, |e| e.capabilities)
    }

    pub fn model(&self, type_id: &str) -> Option<Arc<dyn ModelNode>> {
        self.with_entry(type_id, |e| e.registration.model.clone()).ok().flatten()
    }

    pub fn memory(&self, type_id: &str) -> Option<Arc<dyn MemoryNode>> {
        self.with_entry(type_id, |e| e.registration.memory.clone()).ok().flatten()
    }

    pub fn tool(&self, type_id: &str) -> Option<Arc<dyn ToolNode>> {
        self.with_entry(type_id, |e| e.registration.tool.clone()).ok().flatten()
    }

    pub fn trigger(&self, type_id: &str) -> Option<Arc<dyn TriggerNode>> {
        self.with_entry(type_id, |e| e.registration.trigger.clone()).ok().flatten()
    }

    /// Get metadata for a node type
    pub fn get_meta(&self, type_id: &str) -> Option<NodeTypeMeta> {
        self.with_entry(type_id, |e| e.registration.definition.meta()).ok()
    }

    /// Get all registered node types in registration order
    pub fn list_node_types(&self) -> Vec<String> {
        read(&self.entries).iter().map(|e| e.type_id.clone()).collect()
    }

    pub fn list(&self) -> Vec<NodeSummary> {
        read(&self.entries)
            .iter()
            .map(|e| NodeSummary {
                meta: e.registration.definition.meta(),
                capabilities: e.capabilities,
            })
            .collect()
    }

    /// Types whose capability set includes `capability`.
    pub fn with_capability(&self, capability: Capabilities) -> Vec<String> {
        read(&self.entries)
            .iter()
            .filter(|e| e.capabilities.contains(capability))
            .map(|e| e.type_id.clone())
            .collect()
    }

    /// Dispatch `input` to the node type named by `node.node_type`.
    ///
    /// On failure the returned [`NodeFailure`] carries a derivation of the
    /// input with the error appended, so the caller can decide to halt or
    /// continue with it.
    pub async fn execute(
        &self,
        ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeFailure> {
        if ctx.cancellation.is_cancelled() {
            return Err(Self::failure(node, input, NodeError::Cancelled));
        }

        let definition = self
            .definition(&node.node_type)
            .map_err(|e| Self::failure(node, input, NodeError::Configuration(e.to_string())))?;

        tracing::debug!(node_id = %node.id, node_type = %node.node_type, envelope = %input.id, "Executing node");

        match definition.execute(ctx, node, input).await {
            Ok(output) => Ok(output),
            Err(error) => {
                tracing::warn!(node_id = %node.id, node_type = %node.node_type, %error, "Node failed");
                Err(Self::failure(node, input, error))
            }
        }
    }

    fn failure(node: &NodeConfig, input: &AnyEnvelope, error: NodeError) -> NodeFailure {
        let mut envelope = input.forward(&node.id, input.data.clone());
        envelope.add_error(ExecutionError::from_node_error(&node.id, &error));
        NodeFailure { error, envelope }
    }

    fn with_entry<R>(&self, type_id: &str, f: impl FnOnce(&Entry) -> R) -> Result<R, RegistryError> {
        read(&self.entries)
            .iter()
            .find(|e| e.type_id == type_id)
            .map(f)
            .ok_or_else(|| RegistryError::UnknownNodeType(type_id.to_string()))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
