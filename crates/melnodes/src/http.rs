use crate::workflow::node_error;
use async_trait::async_trait;
use melcore::{
    AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput, NodeTypeMeta,
    ParameterSpec, Value,
};
use melruntime::{HttpRequest, Mel};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const HTTP_NODE_TYPE: &str = "http.request";

/// HTTP request node
///
/// Goes through the platform so timeouts and client setup are shared. A
/// non-2xx status is data, not an error; only transport failures fail the node.
pub struct HttpRequestNode {
    mel: Arc<dyn Mel>,
}

impl HttpRequestNode {
    pub fn new(mel: Arc<dyn Mel>) -> Self {
        Self { mel }
    }
}

#[async_trait]
impl NodeDefinition for HttpRequestNode {
    fn meta(&self) -> NodeTypeMeta {
        NodeTypeMeta::new(HTTP_NODE_TYPE, "HTTP Request", "http")
            .with_description("Make HTTP requests")
            .with_parameter(ParameterSpec::required("url", "Request URL"))
            .with_parameter(ParameterSpec::optional("method", "HTTP method", "GET"))
            .with_parameter(ParameterSpec::optional("headers", "Header map", Value::Null))
            .with_parameter(ParameterSpec::optional(
                "body",
                "Request body; defaults to the payload for POST, PUT and PATCH",
                Value::Null,
            ))
            .with_parameter(ParameterSpec::optional("timeout_seconds", "Request timeout", Value::Null))
    }

    async fn execute(
        &self,
        _ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let url_value = node.require_config("url")?;
        let url = url_value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: "url".to_string(),
            expected: "string".to_string(),
            actual: url_value.data_type().to_string(),
        })?;
        let method = node.get_str("method").unwrap_or("GET").to_uppercase();

        let body = match node.config.get("body") {
            Some(body) if !body.is_null() => Some(body.clone()),
            _ if matches!(method.as_str(), "POST" | "PUT" | "PATCH") && !input.data.is_null() => {
                Some(input.data.clone())
            }
            _ => None,
        };

        let mut request = HttpRequest {
            method: method.clone(),
            url: url.to_string(),
            body,
            ..HttpRequest::default()
        };
        if let Some(Value::Object(headers)) = node.config.get("headers") {
            for (key, value) in headers {
                if let Some(val_str) = value.as_str() {
                    request = request.with_header(key.as_str(), val_str);
                }
            }
        }
        if let Some(secs) = node.get_u64("timeout_seconds")? {
            request = request.with_timeout(Duration::from_secs(secs));
        }

        tracing::info!(node_id = %node.id, %method, %url, "Sending HTTP request");
        let response = self.mel.http_request(request).await.map_err(node_error)?;
        tracing::info!(node_id = %node.id, status = response.status, "Response received");

        let headers_map: HashMap<String, Value> = response
            .headers
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        let mut output = HashMap::new();
        output.insert("status".to_string(), Value::from(response.status as u64));
        output.insert("body".to_string(), Value::String(response.body));
        output.insert("headers".to_string(), Value::Object(headers_map));
        output.insert(
            "duration_ms".to_string(),
            Value::from(response.duration.as_millis() as u64),
        );

        Ok(NodeOutput::Single(input.forward(&node.id, Value::Object(output))))
    }
}
