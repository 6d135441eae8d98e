use async_trait::async_trait;
use melcore::{
    AnyEnvelope, NodeConfig, NodeContext, NodeDefinition, NodeError, NodeOutput, NodeTypeMeta,
    TypedNodeDefinition, Value,
};

/// Bridges a [`TypedNodeDefinition`] into the untyped envelope contract.
///
/// The payload is decoded into the node's declared input type before the
/// call and encoded back afterwards. A payload of the wrong shape fails with
/// [`NodeError::TypeMismatch`]; the node itself is never invoked.
pub struct TypedAdapter<N> {
    inner: N,
}

impl<N> TypedAdapter<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

#[async_trait]
impl<N> NodeDefinition for TypedAdapter<N>
where
    N: TypedNodeDefinition + 'static,
{
    fn meta(&self) -> NodeTypeMeta {
        self.inner.meta()
    }

    async fn execute(
        &self,
        ctx: &NodeContext,
        node: &NodeConfig,
        input: &AnyEnvelope,
    ) -> Result<NodeOutput, NodeError> {
        let data: N::Input = input.data.decode().map_err(|error| {
            tracing::warn!(node_id = %node.id, %error, "Typed node rejected payload");
            error
        })?;
        let typed = input.derive(data, input.trace.clone());

        let output = self.inner.execute_typed(ctx, node, typed).await?;

        let value = Value::encode(&output.data)?;
        Ok(NodeOutput::Single(output.derive(value, output.trace.clone())))
    }
}
