use async_trait::async_trait;
use melcore::{
    Envelope, NodeConfig, NodeContext, NodeError, NodeTypeMeta, ParameterSpec, TypedNodeDefinition,
};

pub const JSON_PARSE_NODE_TYPE: &str = "transform.json_parse";
pub const JSON_STRINGIFY_NODE_TYPE: &str = "transform.json_stringify";

/// Parse a JSON string payload into structured data
pub struct JsonParseNode;

#[async_trait]
impl TypedNodeDefinition for JsonParseNode {
    type Input = String;
    type Output = serde_json::Value;

    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(JSON_PARSE_NODE_TYPE, "Parse JSON", "transform")
            .with_description("Parse JSON string")
    }

    async fn execute_typed(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: Envelope<String>,
    ) -> Result<Envelope<serde_json::Value>, NodeError> {
        let parsed: serde_json::Value = serde_json::from_str(&input.data)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(input.forward(&node.id, parsed))
    }
}

/// Serialize any payload to a JSON string
pub struct JsonStringifyNode;

#[async_trait]
impl TypedNodeDefinition for JsonStringifyNode {
    type Input = serde_json::Value;
    type Output = String;

    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(JSON_STRINGIFY_NODE_TYPE, "Stringify JSON", "transform")
            .with_description("Convert value to JSON string")
            .with_parameter(ParameterSpec::optional("pretty", "Indent the output", false))
    }

    async fn execute_typed(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: Envelope<serde_json::Value>,
    ) -> Result<Envelope<String>, NodeError> {
        let json_str = if node.get_bool("pretty").unwrap_or(false) {
            serde_json::to_string_pretty(&input.data)
        } else {
            serde_json::to_string(&input.data)
        }
        .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(input.forward(&node.id, json_str))
    }
}
