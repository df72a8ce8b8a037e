//! Graph to [`Code`] lowering.
//!
//! Lowering is a structural recursion over scope backbones:
//!
//! ```text
//! scope       push_frame, push_var*, node*, [ret], pop_var* (reversed), pop_frame
//! node        input*, eval           (inputs post-order, variables skipped)
//! condition   <condition>, mov rdx <- true, cmp rax rdx, jne <patched>
//! while       condition, <true scope>, jmp <back to condition>
//! for         push_var*, <init>, condition, <true scope>, <iteration>, jmp, pop_var*
//! if          condition, <true scope>, [jmp <patched>, <false scope | else-if>]
//! ```
//!
//! Jump offsets are relative to the jump's own line. Forward jumps are
//! emitted with a zero offset and patched once their target is emitted.

use ndbl_ast::{Branch, BranchSide, Graph, NodeId, NodeKind, Qword, ScopeId, Slot, SlotFlags, SlotId};
use ndbl_stack::ensure_sufficient_stack;

use crate::code::{Code, Op, Register};
use crate::error::{CompileError, CompileErrors};

#[derive(Clone, Debug)]
pub struct CompileConfig {
    /// End the root scope with a `ret`, for programs without an explicit
    /// return.
    pub insert_return: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        CompileConfig {
            insert_return: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Compiler {
    config: CompileConfig,
}

impl Compiler {
    pub fn new(config: CompileConfig) -> Self {
        Compiler { config }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Validate `graph`, then lower it. Never returns partial code.
    pub fn compile(&self, graph: &Graph) -> Result<Code, CompileErrors> {
        validate(graph)?;

        let mut lowering = Lowering {
            graph,
            code: Code::new(),
        };
        lowering.compile_scope(graph.root_scope(), self.config.insert_return);

        tracing::debug!(instructions = lowering.code.len(), "program compiled");
        Ok(lowering.code)
    }
}

/// Check every precondition of lowering and report all violations.
pub fn validate(graph: &Graph) -> Result<(), CompileErrors> {
    if graph.is_empty() {
        return Err(CompileErrors::new(vec![CompileError::EmptyGraph]));
    }

    let mut errors = Vec::new();
    for &id in graph.nodes() {
        let node = graph.node(id);
        if node.is_variable() {
            let name = node.name().to_owned();
            match node.scope() {
                None => errors.push(CompileError::UnscopedVariable { node: id, name }),
                Some(scope) if !graph.scope(scope).variables().contains(&id) => {
                    errors.push(CompileError::DuplicateVariable { node: id, name });
                }
                Some(_) => {}
            }
        }
        if let Some(signature) = node.signature() {
            if graph.library().find(signature).is_none() {
                errors.push(CompileError::UnresolvedFunction {
                    node: id,
                    signature: signature.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        for error in &errors {
            tracing::warn!(%error, "invalid graph");
        }
        Err(CompileErrors::new(errors))
    }
}

/// Signed distance from line `from` to line `to`.
fn jump_offset(from: usize, to: usize) -> i64 {
    if to >= from {
        i64::try_from(to - from).unwrap_or(i64::MAX)
    } else {
        i64::try_from(from - to).map_or(i64::MIN, |d| -d)
    }
}

struct Lowering<'g> {
    graph: &'g Graph,
    code: Code,
}

impl Lowering<'_> {
    fn compile_scope(&mut self, scope: ScopeId, insert_return: bool) {
        let graph = self.graph;
        let data = graph.scope(scope);
        let owner = graph.node(data.owner()).name();

        self.code
            .push_with_comment(Op::PushFrame { scope }, format!("{owner} scope"));
        for &var in data.variables() {
            self.code
                .push_with_comment(Op::PushVar { var }, graph.node(var).name());
        }

        for node in graph.backbone(scope) {
            self.compile_node(node);
        }

        if insert_return {
            self.code.push(Op::Ret);
        }
        for &var in data.variables().iter().rev() {
            self.code
                .push_with_comment(Op::PopVar { var }, graph.node(var).name());
        }
        self.code
            .push_with_comment(Op::PopFrame { scope }, format!("{owner} scope"));
    }

    fn compile_node(&mut self, id: NodeId) {
        ensure_sufficient_stack(|| self.compile_node_inner(id));
    }

    fn compile_node_inner(&mut self, id: NodeId) {
        let graph = self.graph;
        let node = graph.node(id);

        match (node.kind(), node.branch().copied()) {
            (NodeKind::If, Some(branch)) => self.compile_if(id, branch),
            (NodeKind::While, Some(branch)) => self.compile_while(id, branch),
            (NodeKind::For, Some(branch)) => self.compile_for(id, branch),
            (kind, _) => {
                for slot in node.filter_slots(SlotFlags::INPUT) {
                    let Some(source) = slot.first_adjacent() else {
                        continue;
                    };
                    // Variables are evaluated where they are declared.
                    if !graph.node(source.node).is_variable_like() {
                        self.compile_node(source.node);
                    }
                }
                if node.is_invokable() || matches!(kind, NodeKind::Variable | NodeKind::Literal) {
                    self.code
                        .push_with_comment(Op::Eval { node: id }, node.name());
                }
            }
        }
    }

    /// Compile whatever feeds `slot` of `owner`.
    fn compile_input(&mut self, owner: NodeId, slot: Option<SlotId>) {
        let source = slot
            .and_then(|s| self.graph.node(owner).slot(s))
            .and_then(Slot::first_adjacent);
        if let Some(source) = source {
            self.compile_node(source.node);
        }
    }

    /// Leave the condition in `rax`, compare it against `true` and emit
    /// the placeholder `jne`. Returns the `jne` line.
    fn compile_condition(&mut self, owner: NodeId, branch: Branch) -> usize {
        let graph = self.graph;
        let node = graph.node(owner);
        let source = node.slot(branch.condition).and_then(Slot::first_adjacent);

        match source {
            Some(source) if graph.node(source.node).is_variable_like() => {
                self.code.push_with_comment(
                    Op::Deref { node: source.node },
                    graph.node(source.node).name(),
                );
            }
            Some(source) => self.compile_node(source.node),
            None => {
                let value = node
                    .slot(branch.condition)
                    .map(|s| node.property(s.property()).value())
                    .unwrap_or_default();
                self.code.push_with_comment(
                    Op::Mov {
                        dst: Register::Rax,
                        src: value.to_qword(),
                    },
                    "unlinked condition",
                );
            }
        }

        self.code.push(Op::Mov {
            dst: Register::Rdx,
            src: Qword::from_bool(true),
        });
        self.code.push(Op::Cmp {
            left: Register::Rax,
            right: Register::Rdx,
        });
        self.code
            .push_with_comment(Op::Jne { offset: 0 }, format!("{} condition", node.name()))
    }

    /// Point the jump at `line` to the next instruction to be emitted.
    fn patch_forward(&mut self, line: usize) {
        let offset = jump_offset(line, self.code.next_index());
        if let Some(instruction) = self.code.get_mut(line) {
            match &mut instruction.op {
                Op::Jmp { offset: o } | Op::Jne { offset: o } => *o = offset,
                op => tracing::error!(line, %op, "not a jump, left unpatched"),
            }
        }
    }

    fn jump_back(&mut self, to: usize, comment: &str) {
        let offset = jump_offset(self.code.next_index(), to);
        self.code.push_with_comment(Op::Jmp { offset }, comment);
    }

    fn partition(&self, owner: NodeId, side: BranchSide) -> Option<ScopeId> {
        let internal = self.graph.node(owner).internal_scope()?;
        self.graph.scope(internal).partition(side.index())
    }

    fn compile_while(&mut self, id: NodeId, branch: Branch) {
        let condition_line = self.code.next_index();
        let jne = self.compile_condition(id, branch);
        if let Some(body) = self.partition(id, BranchSide::True) {
            self.compile_scope(body, false);
        }
        self.jump_back(condition_line, "loop");
        self.patch_forward(jne);
    }

    fn compile_for(&mut self, id: NodeId, branch: Branch) {
        let graph = self.graph;
        let locals: Vec<NodeId> = graph
            .node(id)
            .internal_scope()
            .map(|s| graph.scope(s).variables().to_vec())
            .unwrap_or_default();

        for &var in &locals {
            self.code
                .push_with_comment(Op::PushVar { var }, graph.node(var).name());
        }
        self.compile_input(id, branch.initialization);

        let condition_line = self.code.next_index();
        let jne = self.compile_condition(id, branch);
        if let Some(body) = self.partition(id, BranchSide::True) {
            self.compile_scope(body, false);
        }
        self.compile_input(id, branch.iteration);
        self.jump_back(condition_line, "loop");
        self.patch_forward(jne);

        for &var in locals.iter().rev() {
            self.code
                .push_with_comment(Op::PopVar { var }, graph.node(var).name());
        }
    }

    fn compile_if(&mut self, id: NodeId, branch: Branch) {
        let graph = self.graph;
        let jne = self.compile_condition(id, branch);
        if let Some(on_true) = self.partition(id, BranchSide::True) {
            self.compile_scope(on_true, false);
        }

        let on_false = self
            .partition(id, BranchSide::False)
            .map(|s| (s, graph.backbone(s)))
            .filter(|(_, backbone)| !backbone.is_empty());

        let Some((on_false, backbone)) = on_false else {
            self.patch_forward(jne);
            return;
        };

        let skip_else = self
            .code
            .push_with_comment(Op::Jmp { offset: 0 }, "skip else");
        self.patch_forward(jne);
        match backbone.as_slice() {
            // `else if`: lowered in place, without a frame of its own.
            [nested] if graph.node(*nested).kind() == NodeKind::If => self.compile_node(*nested),
            _ => self.compile_scope(on_false, false),
        }
        self.patch_forward(skip_else);
    }
}

#[cfg(test)]
mod tests;
