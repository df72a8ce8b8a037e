//! The virtual machine.
//!
//! # States
//!
//! ```text
//!            run_program (to completion)
//!        ┌──────────────────────────────┐
//!        ▼                              │
//!     Stopped ──── debug_program ───► Debugging ── step_over ──┐
//!        ▲                              │    ▲                  │
//!        └──── stop_program / end ──────┘    └──────────────────┘
//! ```
//!
//! `Running` is only observable from inside `run_program`. A program
//! stays loaded across runs until `release_program`.

use ndbl_ast::{Graph, NodeId, NodeKind, Qword, Slot, SlotFlags, Value};
use ndbl_compile::{Code, Op, Register};
use rustc_hash::FxHashSet;

use crate::error::VmError;
use crate::memory::Memory;
use crate::registers::Registers;

#[derive(Clone, Debug, Default)]
pub struct VmConfig {
    /// Abort `run_program` after this many instructions. `None` runs
    /// until the program ends.
    pub step_limit: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VmState {
    Stopped,
    Running,
    Debugging,
}

/// Executes [`Code`] compiled from the graph it borrows.
///
/// The borrow keeps the graph frozen while the machine exists, so node
/// handles in the code stay valid.
#[derive(Debug)]
pub struct VirtualMachine<'g> {
    graph: &'g Graph,
    config: VmConfig,
    program: Option<Code>,
    state: VmState,
    registers: Registers,
    memory: Memory,
    next_node: Option<NodeId>,
    last_evaluated: Option<NodeId>,
    visited: FxHashSet<NodeId>,
    steps: u64,
}

impl<'g> VirtualMachine<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self::with_config(graph, VmConfig::default())
    }

    pub fn with_config(graph: &'g Graph, config: VmConfig) -> Self {
        VirtualMachine {
            graph,
            config,
            program: None,
            state: VmState::Stopped,
            registers: Registers::default(),
            memory: Memory::default(),
            next_node: None,
            last_evaluated: None,
            visited: FxHashSet::default(),
            steps: 0,
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    // ── Program lifecycle ────────────────────────────────────────────

    pub fn load_program(&mut self, code: Code) -> Result<(), VmError> {
        if self.state != VmState::Stopped {
            return Err(VmError::Busy);
        }
        if self.program.is_some() {
            return Err(VmError::AlreadyLoaded);
        }
        tracing::debug!(instructions = code.len(), "program loaded");
        self.program = Some(code);
        self.reset();
        Ok(())
    }

    /// Stop if needed and hand the program back.
    pub fn release_program(&mut self) -> Option<Code> {
        if self.state != VmState::Stopped {
            self.stop_program();
        }
        self.registers.clear();
        let code = self.program.take();
        if code.is_some() {
            tracing::debug!("program released");
        }
        code
    }

    pub fn program(&self) -> Option<&Code> {
        self.program.as_ref()
    }

    /// Execute from the first instruction until the program ends.
    pub fn run_program(&mut self) -> Result<(), VmError> {
        self.start(VmState::Running)?;
        let _span = tracing::debug_span!("run_program").entered();

        let result = loop {
            if let Some(limit) = self.config.step_limit {
                if self.steps >= limit {
                    break Err(VmError::StepLimit(limit));
                }
            }
            match self.step() {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        if let Err(err) = &result {
            tracing::warn!(%err, line = self.registers.cursor(), "program aborted");
        }
        self.stop_program();
        result
    }

    /// Pause before the first instruction. Drive with [`Self::step_over`].
    pub fn debug_program(&mut self) -> Result<(), VmError> {
        self.start(VmState::Debugging)?;
        self.next_node = Some(self.graph.root_node());
        Ok(())
    }

    /// Execute one instruction. Returns `false` once the program has ended,
    /// in which case the machine is stopped.
    pub fn step_over(&mut self) -> Result<bool, VmError> {
        if self.state != VmState::Debugging {
            return Err(VmError::NotRunning);
        }
        match self.step() {
            Ok(true) => {
                if let Some(Op::Eval { node }) = self.next_op() {
                    self.next_node = Some(node);
                }
                Ok(true)
            }
            Ok(false) => {
                self.stop_program();
                Ok(false)
            }
            Err(err) => {
                tracing::warn!(%err, line = self.registers.cursor(), "program aborted");
                self.stop_program();
                Err(err)
            }
        }
    }

    pub fn stop_program(&mut self) {
        if self.state == VmState::Stopped {
            tracing::warn!("stop requested but no program is running");
            return;
        }
        self.state = VmState::Stopped;
        self.next_node = None;
        tracing::debug!(steps = self.steps, "program stopped");
    }

    fn start(&mut self, state: VmState) -> Result<(), VmError> {
        if self.program.is_none() {
            return Err(VmError::NoProgram);
        }
        if self.state != VmState::Stopped {
            return Err(VmError::Busy);
        }
        self.reset();
        self.state = state;
        tracing::debug!(?state, "program started");
        Ok(())
    }

    fn reset(&mut self) {
        self.registers.clear();
        self.memory.clear();
        self.visited.clear();
        self.next_node = None;
        self.last_evaluated = None;
        self.steps = 0;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Running or debugging.
    pub fn is_program_running(&self) -> bool {
        self.state != VmState::Stopped
    }

    pub fn is_debugging(&self) -> bool {
        self.state == VmState::Debugging
    }

    pub fn is_program_stopped(&self) -> bool {
        self.state == VmState::Stopped
    }

    /// Node the debugger is about to evaluate.
    pub fn get_next_node(&self) -> Option<NodeId> {
        self.next_node
    }

    pub fn get_last_evaluated(&self) -> Option<NodeId> {
        self.last_evaluated
    }

    /// Every node evaluated since the program started.
    pub fn visited(&self) -> &FxHashSet<NodeId> {
        &self.visited
    }

    pub fn read_register(&self, register: Register) -> Qword {
        self.registers.read(register)
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Current value of a pushed, initialized variable.
    pub fn read_variable(&self, var: NodeId) -> Option<Value> {
        self.memory.variable(var).flatten()
    }

    /// What an input linked to `node` would read right now.
    pub fn value_of(&self, node: NodeId) -> Option<Value> {
        self.read(node).ok()
    }

    fn next_op(&self) -> Option<Op> {
        let code = self.program.as_ref()?;
        code.get(self.registers.cursor()).map(|i| i.op)
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Execute the instruction under the cursor. Returns whether another
    /// instruction follows.
    fn step(&mut self) -> Result<bool, VmError> {
        let code = self.program.as_ref().ok_or(VmError::NoProgram)?;
        let len = code.len();
        let line = self.registers.cursor();
        let Some(instruction) = code.get(line) else {
            return Ok(false);
        };
        let op = instruction.op;
        tracing::trace!(line, %op, "exec");
        self.steps += 1;

        let mut offset = 1;
        match op {
            Op::Cmp { left, right } => {
                let equal = self.registers.read(left).as_bool() == self.registers.read(right).as_bool();
                self.registers.write(Register::Rax, Qword::from_bool(equal));
            }
            Op::Jmp { offset: jump } => offset = jump,
            Op::Jne { offset: jump } => {
                if !self.registers.read(Register::Rax).as_bool() {
                    offset = jump;
                }
            }
            Op::Mov { dst: Register::Eip, src } => {
                let target = usize::try_from(src.bits()).unwrap_or(usize::MAX);
                if target > len {
                    return Err(VmError::OutOfBounds {
                        from: line,
                        offset: i64::try_from(src.bits()).unwrap_or(i64::MAX),
                        len,
                    });
                }
                self.registers.set_cursor(target);
                return Ok(target < len);
            }
            Op::Mov { dst, src } => self.registers.write(dst, src),
            Op::Deref { node } => {
                let value = self.read(node)?;
                self.registers.write(Register::Rax, value.to_qword());
            }
            Op::Eval { node } => self.eval(node)?,
            Op::PushVar { var } => {
                if !self.graph.contains(var) {
                    return Err(VmError::UnknownNode(var));
                }
                self.memory.push_var(var);
            }
            Op::PopVar { var } => self.memory.pop_var(var)?,
            Op::PushFrame { .. } | Op::PopFrame { .. } => {}
            Op::Ret => return Ok(false),
        }

        let next = line
            .checked_add_signed(isize::try_from(offset).unwrap_or(isize::MAX))
            .filter(|next| *next <= len)
            .ok_or(VmError::OutOfBounds {
                from: line,
                offset,
                len,
            })?;
        self.registers.set_cursor(next);
        Ok(next < len)
    }

    fn eval(&mut self, id: NodeId) -> Result<(), VmError> {
        let graph = self.graph;
        let node = graph.try_node(id).ok_or(VmError::UnknownNode(id))?;

        let value = match node.kind() {
            NodeKind::Variable => match self.memory.variable(id) {
                None => return Err(VmError::VariableNotPushed(id)),
                Some(Some(value)) => value,
                Some(None) => {
                    let value = match node.value_in().and_then(Slot::first_adjacent) {
                        Some(source) => self.read(source.node)?,
                        None => node.value(),
                    };
                    self.memory.set_variable(id, value)?;
                    value
                }
            },
            NodeKind::Function | NodeKind::Operator => {
                let value = self.invoke(id)?;
                self.memory.set_value(id, value);
                value
            }
            _ => {
                let value = self.read(id)?;
                self.memory.set_value(id, value);
                value
            }
        };

        tracing::trace!(node = ?id, ?value, "evaluated");
        self.registers.write(Register::Rax, value.to_qword());
        self.last_evaluated = Some(id);
        self.visited.insert(id);
        Ok(())
    }

    /// Call the node's function with its argument values and write the
    /// result through every by-reference argument.
    fn invoke(&mut self, id: NodeId) -> Result<Value, VmError> {
        let graph = self.graph;
        let node = graph.node(id);
        let function = node
            .signature()
            .and_then(|signature| graph.library().find(signature))
            .ok_or(VmError::Unresolved(id))?;

        let mut args = Vec::new();
        let mut by_ref = Vec::new();
        for slot in node.filter_slots(SlotFlags::INPUT) {
            let property = node.property(slot.property());
            let source = slot.first_adjacent().map(|s| s.node);
            let value = match source {
                Some(source) => self.read(source)?,
                None => property.value(),
            };
            if property.is_ref() {
                by_ref.extend(source.and_then(|s| self.target_variable(s)));
            }
            args.push(value);
        }

        let result = graph
            .library()
            .call(function, &args)
            .map_err(|source| VmError::Call { node: id, source })?;
        for var in by_ref {
            self.memory.set_variable(var, result)?;
        }
        Ok(result)
    }

    /// The variable a by-reference argument writes to.
    fn target_variable(&self, node: NodeId) -> Option<NodeId> {
        match self.graph.node(node).kind() {
            NodeKind::Variable => Some(node),
            NodeKind::VariableRef => self.graph.referenced_variable(node),
            _ => None,
        }
    }

    fn read(&self, id: NodeId) -> Result<Value, VmError> {
        let node = self.graph.try_node(id).ok_or(VmError::UnknownNode(id))?;
        match node.kind() {
            NodeKind::Variable => match self.memory.variable(id) {
                Some(value) => Ok(value.unwrap_or_else(|| node.value())),
                None => Err(VmError::VariableNotPushed(id)),
            },
            NodeKind::VariableRef => match self.graph.referenced_variable(id) {
                Some(var) => self.read(var),
                None => Ok(self.memory.value(id).unwrap_or_else(|| node.value())),
            },
            _ => Ok(self.memory.value(id).unwrap_or_else(|| node.value())),
        }
    }
}

#[cfg(test)]
mod tests;
