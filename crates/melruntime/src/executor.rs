use crate::registry::{NodeFailure, NodeRegistry};
use futures::stream::{FuturesUnordered, StreamExt};
use melcore::{AnyEnvelope, NodeConfig, NodeContext, NodeOutput};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Runs envelopes through an ordered chain of nodes.
///
/// Fan-out outputs continue independently and concurrently; branches that
/// end in `Pending` stop there.
pub struct PipelineExecutor {
    max_parallel: usize,
}

impl PipelineExecutor {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    /// Execute `pipeline` starting from `input` and collect every terminal envelope
    pub async fn run(
        &self,
        registry: &NodeRegistry,
        ctx: &NodeContext,
        pipeline: &[NodeConfig],
        input: AnyEnvelope,
    ) -> PipelineResult {
        let start_time = Instant::now();
        let mut result = PipelineResult::default();
        let mut queue = VecDeque::from([(0usize, input)]);
        let mut running = FuturesUnordered::new();

        tracing::info!(run_id = %ctx.run_id, stages = pipeline.len(), "Starting pipeline");

        loop {
            // Spawn ready work up to parallel limit
            while running.len() < self.max_parallel {
                let Some((stage, envelope)) = queue.pop_front() else {
                    break;
                };
                let Some(node) = pipeline.get(stage) else {
                    result.outputs.push(envelope);
                    continue;
                };
                running.push(async move {
                    let outcome = registry.execute(ctx, node, &envelope).await;
                    (stage, outcome)
                });
            }

            // Nothing running means the queue is drained too
            let Some((stage, outcome)) = running.next().await else {
                break;
            };

            result.executions += 1;
            match outcome {
                Ok(NodeOutput::Single(envelope)) => queue.push_back((stage + 1, envelope)),
                Ok(NodeOutput::Many(envelopes)) => {
                    tracing::debug!(stage, fan_out = envelopes.len(), "Fan-out");
                    queue.extend(envelopes.into_iter().map(|e| (stage + 1, e)));
                }
                Ok(NodeOutput::Pending) => result.pending += 1,
                Err(failure) => {
                    tracing::error!(stage, error = %failure.error, "Pipeline branch failed");
                    result.failures.push(failure);
                }
            }
        }

        result.duration = start_time.elapsed();
        tracing::info!(
            run_id = %ctx.run_id,
            outputs = result.outputs.len(),
            failures = result.failures.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Pipeline finished"
        );
        result
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Result of a pipeline run
#[derive(Debug, Default)]
pub struct PipelineResult {
    /// Envelopes that made it past the last node
    pub outputs: Vec<AnyEnvelope>,
    /// Branches that stopped on a node error
    pub failures: Vec<NodeFailure>,
    /// Branches absorbed by a node still waiting for more input
    pub pending: usize,
    /// Node executions performed
    pub executions: usize,
    pub duration: Duration,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
