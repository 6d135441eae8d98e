use crate::{
    DataKind, DataType, NodeError, Trace, Value, VariableContext, VariableError, VariableScope,
    VariableStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type EnvelopeId = Uuid;

/// Envelope carrying an untyped payload
pub type AnyEnvelope = Envelope<Value>;

/// Unit of data flowing between nodes.
///
/// An envelope is never edited after it has been handed to another node:
/// every transformation produces a new envelope with a fresh `id`. The
/// [`Clone`] impl follows the same rule and regenerates `id` and `issued_at`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: EnvelopeId,
    pub issued_at: DateTime<Utc>,
    pub version: u32,
    pub data_type: DataType,
    pub data: T,
    #[serde(default)]
    pub binary: HashMap<String, Vec<u8>>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    pub trace: Trace,
    #[serde(default)]
    pub errors: Vec<ExecutionError>,
}

impl<T: DataKind> Envelope<T> {
    pub fn new(data: T, trace: Trace) -> Self {
        Self {
            id: Uuid::new_v4(),
            issued_at: Utc::now(),
            version: 1,
            data_type: data.data_type(),
            data,
            binary: HashMap::new(),
            meta: HashMap::new(),
            variables: HashMap::new(),
            trace,
            errors: Vec::new(),
        }
    }

    /// Build a new envelope from this one with a different payload and trace.
    ///
    /// Version, binary attachments, meta, run variables and errors are carried over.
    pub fn derive<U: DataKind>(&self, data: U, trace: Trace) -> Envelope<U> {
        Envelope {
            id: Uuid::new_v4(),
            issued_at: Utc::now(),
            version: self.version,
            data_type: data.data_type(),
            data,
            binary: self.binary.clone(),
            meta: self.meta.clone(),
            variables: self.variables.clone(),
            trace,
            errors: self.errors.clone(),
        }
    }

    /// [`derive`](Self::derive) with the trace advanced to `node_id`.
    pub fn forward<U: DataKind>(&self, node_id: &str, data: U) -> Envelope<U> {
        self.derive(data, self.trace.next(node_id))
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

impl<T> Envelope<T> {
    pub fn add_error(&mut self, error: ExecutionError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn last_error(&self) -> Option<&ExecutionError> {
        self.errors.last()
    }

    pub fn errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn get_meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn set_binary(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.binary.insert(name.into(), bytes);
    }

    pub fn get_binary(&self, name: &str) -> Option<&[u8]> {
        self.binary.get(name).map(Vec::as_slice)
    }

    /// Read a variable. Run scope checks the inline map before the store.
    pub fn get_variable(
        &self,
        store: &VariableStore,
        scope: VariableScope,
        key: &str,
    ) -> Result<Option<Value>, VariableError> {
        if scope == VariableScope::Run {
            if let Some(value) = self.variables.get(key) {
                return Ok(Some(value.clone()));
            }
        }
        store.get(&VariableContext::from_trace(&self.trace), scope, key)
    }

    /// Write a variable. Run scope writes the inline map only.
    pub fn set_variable(
        &mut self,
        store: &VariableStore,
        scope: VariableScope,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), VariableError> {
        match scope {
            VariableScope::Run => {
                if self.trace.run_id.is_empty() {
                    return Err(VariableError::MissingContext {
                        scope: scope.to_string(),
                        field: "run_id".to_string(),
                    });
                }
                self.variables.insert(key.into(), value);
                Ok(())
            }
            _ => store.set(&VariableContext::from_trace(&self.trace), scope, key, value),
        }
    }
}

impl<T: Clone> Clone for Envelope<T> {
    fn clone(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            issued_at: Utc::now(),
            version: self.version,
            data_type: self.data_type,
            data: self.data.clone(),
            binary: self.binary.clone(),
            meta: self.meta.clone(),
            variables: self.variables.clone(),
            trace: self.trace.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Error recorded on an envelope. Informational only: recording an error
/// does not stop the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub time: DateTime<Utc>,
    pub node_id: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ExecutionError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            node_id: node_id.into(),
            message: message.into(),
            stack: None,
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn from_node_error(node_id: impl Into<String>, error: &NodeError) -> Self {
        Self::new(node_id, error.to_string()).with_code(error.code())
    }
}
