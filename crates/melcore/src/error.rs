use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Variable error: {0}")]
    Variable(#[from] VariableError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Type mismatch: expected {expected}, got {actual} ({detail})")]
    TypeMismatch {
        expected: String,
        actual: String,
        detail: String,
    },

    #[error("Empty input sequence: {0}")]
    EmptyInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Failed in a way that repeating the execution cannot fix
    #[error("Execution aborted: {0}")]
    Aborted(String),

    #[error("Timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    /// Stable machine-readable code recorded on envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::MissingInput(_) => "missing_input",
            NodeError::InvalidInputType { .. } | NodeError::TypeMismatch { .. } => "type_mismatch",
            NodeError::EmptyInput(_) => "empty_input",
            NodeError::Configuration(_) => "configuration",
            NodeError::ExecutionFailed(_) => "execution_failed",
            NodeError::Aborted(_) => "aborted",
            NodeError::Timeout { .. } => "timeout",
            NodeError::Cancelled => "cancelled",
        }
    }

    /// Whether repeating the same execution could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NodeError::ExecutionFailed(_) | NodeError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node type already registered: {0}")]
    DuplicateNodeType(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("{scope} scope requires '{field}' in the execution context")]
    MissingContext { scope: String, field: String },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
}
