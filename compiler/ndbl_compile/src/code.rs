//! Linear instruction code.

use std::fmt;

use ndbl_ast::{NodeId, Qword, ScopeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    /// Accumulator. Every evaluation and comparison leaves its result here.
    Rax,
    /// Scratch register for comparisons.
    Rdx,
    /// Instruction pointer.
    Eip,
}

impl Register {
    pub const fn name(self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rdx => "rdx",
            Register::Eip => "eip",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// `rax = (left == right)`, both read as booleans.
    Cmp { left: Register, right: Register },
    /// Move the cursor by `offset`, relative to this instruction.
    Jmp { offset: i64 },
    /// Move the cursor by `offset` unless `rax` holds true.
    Jne { offset: i64 },
    Mov { dst: Register, src: Qword },
    /// Load a node's current value into `rax` without evaluating it.
    Deref { node: NodeId },
    Eval { node: NodeId },
    PushVar { var: NodeId },
    PopVar { var: NodeId },
    PushFrame { scope: ScopeId },
    PopFrame { scope: ScopeId },
    Ret,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Cmp { left, right } => write!(f, "cmp {left}, {right}"),
            Op::Jmp { offset } => write!(f, "jmp {offset:+}"),
            Op::Jne { offset } => write!(f, "jne {offset:+}"),
            Op::Mov { dst, src } => write!(f, "mov {dst}, {:#x}", src.bits()),
            Op::Deref { node } => write!(f, "deref {node:?}"),
            Op::Eval { node } => write!(f, "eval {node:?}"),
            Op::PushVar { var } => write!(f, "push_var {var:?}"),
            Op::PopVar { var } => write!(f, "pop_var {var:?}"),
            Op::PushFrame { scope } => write!(f, "push_frame {scope:?}"),
            Op::PopFrame { scope } => write!(f, "pop_frame {scope:?}"),
            Op::Ret => f.write_str("ret"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Index in the code.
    pub line: usize,
    pub op: Op,
    pub comment: Option<String>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.op.to_string();
        match &self.comment {
            Some(comment) => write!(f, "{:>4}: {op:<28} ; {comment}", self.line),
            None => write!(f, "{:>4}: {op}", self.line),
        }
    }
}

/// A compiled program. Holds handles into the graph it was compiled from
/// but never borrows it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Code {
    instructions: Vec<Instruction>,
}

impl Code {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction. Returns its line.
    pub fn push(&mut self, op: Op) -> usize {
        self.push_instruction(op, None)
    }

    pub fn push_with_comment(&mut self, op: Op, comment: impl Into<String>) -> usize {
        self.push_instruction(op, Some(comment.into()))
    }

    fn push_instruction(&mut self, op: Op, comment: Option<String>) -> usize {
        let line = self.instructions.len();
        tracing::trace!(line, %op, "emit");
        self.instructions.push(Instruction { line, op, comment });
        line
    }

    pub fn get(&self, line: usize) -> Option<&Instruction> {
        self.instructions.get(line)
    }

    pub fn get_mut(&mut self, line: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(line)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Line the next pushed instruction will get.
    pub fn next_index(&self) -> usize {
        self.instructions.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl<'a> IntoIterator for &'a Code {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
