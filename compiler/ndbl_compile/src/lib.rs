//! Lowering of a Nodable graph into linear instruction code.
//!
//! [`Compiler::compile`] validates the graph, then walks the root scope's
//! backbone and emits [`Code`]: a flat list of [`Instruction`]s for the
//! `ndbl_vm` virtual machine. Instructions refer to graph nodes and scopes
//! by handle, so the graph must outlive any run of the code.

mod code;
mod compiler;
mod error;

pub use code::{Code, Instruction, Op, Register};
pub use compiler::{validate, CompileConfig, Compiler};
pub use error::{CompileError, CompileErrors};
