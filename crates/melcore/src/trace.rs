use serde::{Deserialize, Serialize};

/// Correlation metadata tying node executions of one run together.
///
/// `agent_id` and `run_id` never change once a run has started. Derivations
/// are pure functions of `self`, so concurrent derivations from the same
/// parent cannot interfere with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Workflow identity
    pub agent_id: String,
    /// Execution instance
    pub run_id: String,
    /// Originating node when spawned by a split
    pub parent_id: Option<String>,
    /// Current step
    pub node_id: String,
    /// Human readable label, defaults to the node id
    pub step: String,
    /// Retry counter, starts at 1
    pub attempt: u32,
}

impl Trace {
    pub fn new(
        agent_id: impl Into<String>,
        run_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        let node_id = node_id.into();
        Self {
            agent_id: agent_id.into(),
            run_id: run_id.into(),
            parent_id: None,
            step: node_id.clone(),
            node_id,
            attempt: 1,
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }

    /// Advance to a sibling step. Keeps the parent, resets the attempt.
    pub fn next(&self, node_id: &str) -> Trace {
        Trace {
            agent_id: self.agent_id.clone(),
            run_id: self.run_id.clone(),
            parent_id: self.parent_id.clone(),
            node_id: node_id.to_string(),
            step: node_id.to_string(),
            attempt: 1,
        }
    }

    /// Spawn the `index`-th child: the current node becomes the parent.
    pub fn child(&self, node_id: &str, index: usize) -> Trace {
        Trace {
            agent_id: self.agent_id.clone(),
            run_id: self.run_id.clone(),
            parent_id: Some(self.node_id.clone()),
            node_id: node_id.to_string(),
            step: format!("{}[{}]", node_id, index),
            attempt: 1,
        }
    }

    pub fn retry(&self) -> Trace {
        Trace {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }
}
