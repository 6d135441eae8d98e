//! Optional contracts a node can expose on top of plain action execution.

use crate::{AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: HashMap<String, u64>,
}

/// Language model provider usable by agent nodes
#[async_trait]
pub trait ModelNode: NodeDefinition {
    async fn complete(
        &self,
        ctx: &NodeContext,
        request: ModelRequest,
    ) -> Result<ModelResponse, NodeError>;
}

/// Conversation memory keyed by session
#[async_trait]
pub trait MemoryNode: NodeDefinition {
    async fn remember(&self, ctx: &NodeContext, session: &str, entry: Value) -> Result<(), NodeError>;

    /// Most recent entries first, at most `limit`.
    async fn recall(&self, ctx: &NodeContext, session: &str, limit: usize) -> Result<Vec<Value>, NodeError>;
}

/// Description of a callable tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
}

/// Node that can be invoked as a tool by an agent
#[async_trait]
pub trait ToolNode: NodeDefinition {
    fn tool_spec(&self) -> ToolSpec;

    async fn call_tool(&self, ctx: &NodeContext, arguments: Value) -> Result<Value, NodeError>;
}

/// Node that starts runs on its own (webhook, schedule, poll)
#[async_trait]
pub trait TriggerNode: NodeDefinition {
    fn trigger_kind(&self) -> &str;

    /// Begin emitting envelopes into `sink` until [`stop`](Self::stop) is called
    /// or the context is cancelled.
    async fn start(
        &self,
        ctx: NodeContext,
        node: NodeConfig,
        sink: mpsc::Sender<AnyEnvelope>,
    ) -> Result<(), NodeError>;

    async fn stop(&self) -> Result<(), NodeError>;
}
