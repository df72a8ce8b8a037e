use std::fmt;

use ndbl_ast::NodeId;
use thiserror::Error;

/// A reason the graph cannot be lowered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("the program is empty")]
    EmptyGraph,
    #[error("variable `{name}` ({node:?}) belongs to no scope")]
    UnscopedVariable { node: NodeId, name: String },
    #[error("variable `{name}` ({node:?}) is already declared")]
    DuplicateVariable { node: NodeId, name: String },
    #[error("no function matches `{signature}` ({node:?})")]
    UnresolvedFunction { node: NodeId, signature: String },
}

/// Every violation found by validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileErrors(Vec<CompileError>);

impl CompileErrors {
    pub(crate) fn new(errors: Vec<CompileError>) -> Self {
        debug_assert!(!errors.is_empty(), "no errors to report");
        CompileErrors(errors)
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, error: &CompileError) -> bool {
        self.0.contains(error)
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
