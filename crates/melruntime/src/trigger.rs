use crate::PlatformError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use melcore::{meta_keys, AnyEnvelope, Trace, Value};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMode {
    /// Wait for the called workflow to return
    Sync,
    /// Fire and forget
    Async,
}

impl Default for CallMode {
    fn default() -> Self {
        CallMode::Sync
    }
}

/// Request sent to the dispatch layer to start a workflow on behalf of a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub call_id: String,
    pub source_workflow_id: String,
    pub source_run_id: String,
    #[serde(with = "melcore::plain_json")]
    pub call_data: Value,
    pub call_mode: CallMode,
    pub called_at: DateTime<Utc>,
}

impl TriggerRequest {
    /// First envelope of the called run.
    ///
    /// Carries the call id and the caller identity as meta so a
    /// `workflow.return` node in the called workflow can answer.
    pub fn into_envelope(self, agent_id: &str, run_id: &str) -> AnyEnvelope {
        AnyEnvelope::new(self.call_data, Trace::new(agent_id, run_id, "trigger"))
            .with_meta(meta_keys::WORKFLOW_CALL_ID, self.call_id)
            .with_meta(meta_keys::SOURCE_WORKFLOW_ID, self.source_workflow_id)
            .with_meta(meta_keys::SOURCE_RUN_ID, self.source_run_id)
    }
}

/// Starts workflow runs in the external execution layer
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Dispatch `request` to `target_workflow_id`. Only the dispatch is awaited,
    /// never the run itself.
    async fn trigger(&self, target_workflow_id: &str, request: &TriggerRequest) -> Result<(), PlatformError>;
}

/// Triggers workflows by POSTing to `{base_url}/api/v1/workflows/{id}/trigger`
pub struct HttpWorkflowTrigger {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpWorkflowTrigger {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn endpoint(&self, target_workflow_id: &str) -> String {
        format!("{}/api/v1/workflows/{}/trigger", self.base_url, target_workflow_id)
    }
}

#[async_trait]
impl WorkflowTrigger for HttpWorkflowTrigger {
    async fn trigger(&self, target_workflow_id: &str, request: &TriggerRequest) -> Result<(), PlatformError> {
        let url = self.endpoint(target_workflow_id);
        let failed = |reason: String| PlatformError::TriggerFailed {
            target: target_workflow_id.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("dispatch returned {}: {}", status, body)));
        }

        tracing::debug!(%url, call_id = %request.call_id, "Workflow triggered");
        Ok(())
    }
}
