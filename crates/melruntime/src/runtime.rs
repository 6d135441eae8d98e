use crate::{
    HttpWorkflowTrigger, Mel, NodeRegistry, PipelineExecutor, PipelineResult, PlatformServices,
    RuntimeConfig, WorkflowTrigger,
};
use melcore::{AnyEnvelope, ConverterSet, NodeConfig, NodeContext, VariableStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Owns the shared services of one engine instance.
///
/// Nothing here is global: build one runtime per process (or per test),
/// register nodes on [`registry`](Self::registry), and call
/// [`finish_run`](Self::finish_run) when a run completes to drop its state.
pub struct MelRuntime {
    registry: Arc<NodeRegistry>,
    platform: Arc<PlatformServices>,
    variables: Arc<VariableStore>,
    converters: ConverterSet,
    executor: PipelineExecutor,
    shutdown: CancellationToken,
}

impl MelRuntime {
    /// Create a runtime that triggers workflows over HTTP
    pub fn new(config: RuntimeConfig) -> Self {
        let trigger = Arc::new(HttpWorkflowTrigger::new(
            config.platform.trigger_base_url.clone(),
            config.platform.trigger_timeout,
        ));
        Self::with_trigger(config, trigger)
    }

    /// Create a runtime with a custom workflow trigger
    pub fn with_trigger(config: RuntimeConfig, trigger: Arc<dyn WorkflowTrigger>) -> Self {
        Self {
            registry: Arc::new(NodeRegistry::new()),
            platform: Arc::new(PlatformServices::new(config.platform.clone(), trigger)),
            variables: Arc::new(VariableStore::new()),
            converters: ConverterSet::with_defaults(),
            executor: PipelineExecutor::new(config.max_parallel_nodes),
            shutdown: CancellationToken::new(),
        }
    }

    /// Get access to the node registry for registering node types
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn platform(&self) -> Arc<PlatformServices> {
        self.platform.clone()
    }

    /// The platform as the trait object nodes are built with
    pub fn mel(&self) -> Arc<dyn Mel> {
        self.platform.clone()
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    pub fn converters(&self) -> &ConverterSet {
        &self.converters
    }

    /// Context for a new run. Cancelled when the runtime shuts down.
    pub fn context(&self, agent_id: &str, run_id: &str) -> NodeContext {
        NodeContext::new(agent_id, run_id, self.variables.clone())
            .with_cancellation(self.shutdown.child_token())
    }

    /// Execute a pipeline of nodes for one input envelope
    pub async fn run(
        &self,
        ctx: &NodeContext,
        pipeline: &[NodeConfig],
        input: AnyEnvelope,
    ) -> PipelineResult {
        self.executor.run(&self.registry, ctx, pipeline, input).await
    }

    /// Drop the run-scoped variables of a finished run.
    pub fn finish_run(&self, run_id: &str) {
        self.variables.clear_run(run_id);
    }

    /// Cancel every context handed out by this runtime.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down runtime");
        self.shutdown.cancel();
    }
}

impl Default for MelRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
