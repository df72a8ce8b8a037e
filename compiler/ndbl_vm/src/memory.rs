//! Runtime memory: what evaluation produced, kept apart from the graph.

use ndbl_ast::{NodeId, Value};
use rustc_hash::FxHashMap;

use crate::error::VmError;

#[derive(Debug, Default)]
pub(crate) struct Memory {
    /// Last value of every evaluated node other than variables.
    values: FxHashMap<NodeId, Value>,
    /// Pushed variables; `None` until the declaration is evaluated.
    variables: FxHashMap<NodeId, Option<Value>>,
}

impl Memory {
    pub(crate) fn value(&self, node: NodeId) -> Option<Value> {
        self.values.get(&node).copied()
    }

    pub(crate) fn set_value(&mut self, node: NodeId, value: Value) {
        self.values.insert(node, value);
    }

    pub(crate) fn push_var(&mut self, var: NodeId) {
        if self.variables.insert(var, None).is_some() {
            tracing::warn!(var = ?var, "variable pushed twice, value reset");
        }
    }

    pub(crate) fn pop_var(&mut self, var: NodeId) -> Result<(), VmError> {
        match self.variables.remove(&var) {
            Some(_) => Ok(()),
            None => Err(VmError::VariableNotPushed(var)),
        }
    }

    /// `None` when not pushed, `Some(None)` when pushed but not yet
    /// initialized.
    pub(crate) fn variable(&self, var: NodeId) -> Option<Option<Value>> {
        self.variables.get(&var).copied()
    }

    pub(crate) fn set_variable(&mut self, var: NodeId, value: Value) -> Result<(), VmError> {
        let slot = self
            .variables
            .get_mut(&var)
            .ok_or(VmError::VariableNotPushed(var))?;
        *slot = Some(value);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
        self.variables.clear();
    }
}
