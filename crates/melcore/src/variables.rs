use crate::{Trace, Value, VariableError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Partition a variable lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    Global,
    Workflow,
    Run,
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableScope::Global => f.write_str("global"),
            VariableScope::Workflow => f.write_str("workflow"),
            VariableScope::Run => f.write_str("run"),
        }
    }
}

/// Identity used to pick a partition inside a scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableContext {
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
}

impl VariableContext {
    pub fn new(agent_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            agent_id: non_empty(agent_id.into()),
            run_id: non_empty(run_id.into()),
        }
    }

    pub fn from_trace(trace: &Trace) -> Self {
        Self::new(trace.agent_id.clone(), trace.run_id.clone())
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

type Partition = HashMap<String, Value>;

/// Scoped key/value state shared by the nodes of a process.
///
/// Every scope has its own lock. Workflow and run partitions are never
/// evicted implicitly; callers drop them with [`VariableStore::clear_workflow`]
/// and [`VariableStore::clear_run`] when a run completes.
#[derive(Debug, Default)]
pub struct VariableStore {
    global: RwLock<Partition>,
    workflow: RwLock<HashMap<String, Partition>>,
    run: RwLock<HashMap<String, Partition>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        ctx: &VariableContext,
        scope: VariableScope,
        key: &str,
    ) -> Result<Option<Value>, VariableError> {
        match scope {
            VariableScope::Global => Ok(read(&self.global).get(key).cloned()),
            VariableScope::Workflow | VariableScope::Run => {
                let partition = partition_key(ctx, scope)?;
                let table = read(self.table(scope));
                Ok(table.get(partition).and_then(|p| p.get(key)).cloned())
            }
        }
    }

    pub fn set(
        &self,
        ctx: &VariableContext,
        scope: VariableScope,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), VariableError> {
        let key = key.into();
        match scope {
            VariableScope::Global => {
                write(&self.global).insert(key, value);
            }
            VariableScope::Workflow | VariableScope::Run => {
                let partition = partition_key(ctx, scope)?.to_string();
                write(self.table(scope))
                    .entry(partition)
                    .or_default()
                    .insert(key, value);
            }
        }
        Ok(())
    }

    /// Remove a variable, returning its previous value.
    pub fn delete(
        &self,
        ctx: &VariableContext,
        scope: VariableScope,
        key: &str,
    ) -> Result<Option<Value>, VariableError> {
        match scope {
            VariableScope::Global => Ok(write(&self.global).remove(key)),
            VariableScope::Workflow | VariableScope::Run => {
                let partition = partition_key(ctx, scope)?;
                Ok(write(self.table(scope))
                    .get_mut(partition)
                    .and_then(|p| p.remove(key)))
            }
        }
    }

    /// Snapshot of every variable visible in `scope`.
    pub fn snapshot(
        &self,
        ctx: &VariableContext,
        scope: VariableScope,
    ) -> Result<HashMap<String, Value>, VariableError> {
        match scope {
            VariableScope::Global => Ok(read(&self.global).clone()),
            VariableScope::Workflow | VariableScope::Run => {
                let partition = partition_key(ctx, scope)?;
                Ok(read(self.table(scope))
                    .get(partition)
                    .cloned()
                    .unwrap_or_default())
            }
        }
    }

    pub fn clear_run(&self, run_id: &str) {
        if write(&self.run).remove(run_id).is_some() {
            tracing::debug!(run_id, "Cleared run variables");
        }
    }

    pub fn clear_workflow(&self, agent_id: &str) {
        if write(&self.workflow).remove(agent_id).is_some() {
            tracing::debug!(agent_id, "Cleared workflow variables");
        }
    }

    fn table(&self, scope: VariableScope) -> &RwLock<HashMap<String, Partition>> {
        match scope {
            VariableScope::Run => &self.run,
            _ => &self.workflow,
        }
    }
}

fn partition_key(ctx: &VariableContext, scope: VariableScope) -> Result<&str, VariableError> {
    let (value, field) = match scope {
        VariableScope::Workflow => (ctx.agent_id.as_deref(), "agent_id"),
        VariableScope::Run => (ctx.run_id.as_deref(), "run_id"),
        VariableScope::Global => return Ok(""),
    };
    value.ok_or_else(|| VariableError::MissingContext {
        scope: scope.to_string(),
        field: field.to_string(),
    })
}

// A panicking writer cannot leave a HashMap half-updated, so poisoned locks
// are safe to keep using.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
