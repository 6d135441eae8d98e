//! Workflow execution runtime
//!
//! This crate provides the node registry with capability tagging, the
//! typed node adapter, the platform runtime services (HTTP passthrough,
//! cross-workflow call/return correlation, ephemeral data store) and a
//! pipeline executor with fan-out.

mod adapter;
mod capabilities;
mod config;
mod error;
mod executor;
mod platform;
mod registry;
mod runtime;
mod store;
mod trigger;

pub use adapter::TypedAdapter;
pub use capabilities::Capabilities;
pub use config::{PlatformConfig, RuntimeConfig};
pub use error::{PlatformError, StoreError};
pub use executor::{PipelineExecutor, PipelineResult};
pub use platform::{
    return_key, CallStatus, CallWorkflowRequest, CallWorkflowResponse, HttpRequest, HttpResponse,
    Mel, PlatformServices, ReturnDelivery, SourceContext, WorkflowReturn,
};
pub use registry::{NodeFailure, NodeRegistration, NodeRegistry, NodeSummary};
pub use runtime::MelRuntime;
pub use store::{DataStore, StoreEntry, DEFAULT_TTL, FAR_FUTURE};
pub use trigger::{CallMode, HttpWorkflowTrigger, TriggerRequest, WorkflowTrigger};
