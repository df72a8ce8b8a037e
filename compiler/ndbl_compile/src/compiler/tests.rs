#![expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]

use super::*;
use ndbl_ast::layout::{CONDITION, INITIALIZATION, ITERATION, LVALUE, RVALUE, VALUE};
use ndbl_ast::{GraphFlags, SlotRef, Value, ValueType};
use pretty_assertions::assert_eq;

use ValueType::{Bool, Int};

const SIDE: GraphFlags = GraphFlags::ALLOW_SIDE_EFFECTS;

fn entry(graph: &Graph) -> SlotRef {
    graph
        .branch_out(graph.root_node(), BranchSide::True)
        .unwrap()
}

fn flow(graph: &mut Graph, from: SlotRef, to: NodeId) {
    let input = graph.flow_in(to).unwrap();
    graph.connect(from, input, SIDE).unwrap();
}

fn next(graph: &mut Graph, from: NodeId, to: NodeId) {
    let output = graph.flow_out(from).unwrap();
    flow(graph, output, to);
}

fn branch(graph: &mut Graph, owner: NodeId, side: BranchSide, to: NodeId) {
    let output = graph.branch_out(owner, side).unwrap();
    flow(graph, output, to);
}

/// Feed `from`'s value into the input named `input` of `to`.
fn link(graph: &mut Graph, from: NodeId, to: NodeId, input: &str) {
    let output = graph.value_out(from).unwrap();
    let input = graph.input(to, input).unwrap();
    graph.connect(output, input, SIDE).unwrap();
}

fn partition(graph: &Graph, owner: NodeId, side: BranchSide) -> ScopeId {
    let internal = graph.node(owner).internal_scope().unwrap();
    graph.scope(internal).partition(side.index()).unwrap()
}

fn binary(name: &str, ret: ValueType, operand: ValueType) -> ndbl_ast::Signature {
    ndbl_ast::Signature::new(name, ret).arg(operand).arg(operand)
}

fn ops(code: &Code) -> Vec<Op> {
    code.iter().map(|i| i.op).collect()
}

fn compare_with_true() -> [Op; 2] {
    [
        Op::Mov {
            dst: Register::Rdx,
            src: Qword::from_bool(true),
        },
        Op::Cmp {
            left: Register::Rax,
            right: Register::Rdx,
        },
    ]
}

/// `if (true) { a } else { b }`, `b` omitted when `with_else` is false.
fn if_program(graph: &mut Graph, with_else: bool) -> (NodeId, NodeId, NodeId, Option<NodeId>) {
    let root = graph.root_scope();
    let cond = graph.create_if(root);
    let yes = graph.create_literal(Value::Bool(true), root);
    link(graph, yes, cond, CONDITION);
    let start = entry(graph);
    flow(graph, start, cond);

    let a = graph.create_variable(Int, "a", root);
    branch(graph, cond, BranchSide::True, a);
    let b = with_else.then(|| {
        let b = graph.create_variable(Int, "b", root);
        branch(graph, cond, BranchSide::False, b);
        b
    });
    (cond, yes, a, b)
}

/// `x := 1; while (x < 3) { x = x + 1 }`
fn while_program(graph: &mut Graph) -> [NodeId; 8] {
    let root = graph.root_scope();
    let x = graph.create_variable(Int, "x", root);
    let one = graph.create_literal(Value::Int(1), root);
    link(graph, one, x, VALUE);

    let w = graph.create_while(root);
    let lt = graph.create_operator(binary("<", Bool, Int), root);
    let three = graph.create_literal(Value::Int(3), root);
    link(graph, x, lt, LVALUE);
    link(graph, three, lt, RVALUE);
    link(graph, lt, w, CONDITION);

    let assign = graph.create_operator(ndbl_ast::Signature::new("=", Int).ref_arg(Int).arg(Int), root);
    let plus = graph.create_operator(binary("+", Int, Int), root);
    let one_b = graph.create_literal(Value::Int(1), root);
    link(graph, x, assign, LVALUE);
    link(graph, x, plus, LVALUE);
    link(graph, one_b, plus, RVALUE);
    link(graph, plus, assign, RVALUE);

    let start = entry(graph);
    flow(graph, start, x);
    next(graph, x, w);
    branch(graph, w, BranchSide::True, assign);
    [x, one, w, lt, three, assign, plus, one_b]
}

#[test]
fn empty_graph_is_rejected() {
    let graph = Graph::new();
    let errors = Compiler::default().compile(&graph).unwrap_err();
    assert_eq!(errors.errors(), &[CompileError::EmptyGraph]);
}

#[test]
fn validation_reports_every_problem_at_once() {
    let mut graph = Graph::new();
    let root = graph.root_scope();

    let x = graph.create_variable(Int, "x", root);
    graph.remove_from_scope(x).unwrap();
    graph.create_variable(Int, "y", root);
    let shadow = graph.create_variable(Int, "y", root);
    let bad = graph.create_operator(binary("+", Bool, Bool), root);

    let errors = Compiler::default().compile(&graph).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains(&CompileError::UnscopedVariable {
        node: x,
        name: "x".to_owned(),
    }));
    assert!(errors.contains(&CompileError::DuplicateVariable {
        node: shadow,
        name: "y".to_owned(),
    }));
    assert!(errors.contains(&CompileError::UnresolvedFunction {
        node: bad,
        signature: "bool +(bool, bool)".to_owned(),
    }));
    assert_eq!(errors.to_string().lines().count(), 3);
}

#[test]
fn removing_a_clashing_declaration_makes_the_graph_valid() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let first = graph.create_variable(Int, "x", root);
    let second = graph.create_variable(Int, "x", root);
    let start = entry(&graph);
    flow(&mut graph, start, second);
    assert!(Compiler::default().compile(&graph).is_err());

    graph.destroy(first, SIDE);
    let code = Compiler::default().compile(&graph).unwrap();
    assert!(ops(&code).contains(&Op::PushVar { var: second }));
    assert!(ops(&code).contains(&Op::Eval { node: second }));
}

#[test]
fn sequential_program_in_declaration_order() {
    let mut graph = Graph::new();
    let root = graph.root_scope();

    let x = graph.create_variable(Int, "x", root);
    let five = graph.create_literal(Value::Int(5), root);
    link(&mut graph, five, x, VALUE);
    let y = graph.create_variable(Int, "y", root);
    let plus = graph.create_operator(binary("+", Int, Int), root);
    let two = graph.create_literal(Value::Int(2), root);
    link(&mut graph, x, plus, LVALUE);
    link(&mut graph, two, plus, RVALUE);

    let start = entry(&graph);
    flow(&mut graph, start, x);
    next(&mut graph, x, y);
    next(&mut graph, y, plus);

    let compiler = Compiler::new(CompileConfig {
        insert_return: false,
    });
    let code = compiler.compile(&graph).unwrap();

    assert_eq!(
        ops(&code),
        vec![
            Op::PushFrame { scope: root },
            Op::PushVar { var: x },
            Op::PushVar { var: y },
            Op::Eval { node: five },
            Op::Eval { node: x },
            Op::Eval { node: y },
            Op::Eval { node: two },
            Op::Eval { node: plus },
            Op::PopVar { var: y },
            Op::PopVar { var: x },
            Op::PopFrame { scope: root },
        ]
    );
    for (line, instruction) in code.iter().enumerate() {
        assert_eq!(instruction.line, line);
    }
}

#[test]
fn if_else_jumps_over_the_other_branch() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let (cond, yes, a, b) = if_program(&mut graph, true);
    let b = b.unwrap();
    let on_true = partition(&graph, cond, BranchSide::True);
    let on_false = partition(&graph, cond, BranchSide::False);

    let code = Compiler::default().compile(&graph).unwrap();

    let mut expected = vec![Op::PushFrame { scope: root }, Op::Eval { node: yes }];
    expected.extend(compare_with_true());
    expected.extend([
        Op::Jne { offset: 7 },
        Op::PushFrame { scope: on_true },
        Op::PushVar { var: a },
        Op::Eval { node: a },
        Op::PopVar { var: a },
        Op::PopFrame { scope: on_true },
        Op::Jmp { offset: 6 },
        Op::PushFrame { scope: on_false },
        Op::PushVar { var: b },
        Op::Eval { node: b },
        Op::PopVar { var: b },
        Op::PopFrame { scope: on_false },
        Op::Ret,
        Op::PopFrame { scope: root },
    ]);
    assert_eq!(ops(&code), expected);
}

#[test]
fn if_without_else_has_no_jmp() {
    let mut graph = Graph::new();
    if_program(&mut graph, false);

    let code = Compiler::default().compile(&graph).unwrap();
    let ops = ops(&code);

    assert_eq!(ops.len(), 12);
    assert_eq!(ops[4], Op::Jne { offset: 6 });
    assert_eq!(ops[10], Op::Ret);
    assert!(!ops.iter().any(|op| matches!(op, Op::Jmp { .. })));
}

#[test]
fn else_if_is_lowered_without_its_own_frame() {
    let mut graph = Graph::new();
    let root = graph.root_scope();

    let first = graph.create_if(root);
    let c1 = graph.create_literal(Value::Bool(false), root);
    link(&mut graph, c1, first, CONDITION);
    let second = graph.create_if(root);
    let c2 = graph.create_literal(Value::Bool(true), root);
    link(&mut graph, c2, second, CONDITION);

    let start = entry(&graph);
    flow(&mut graph, start, first);
    let a = graph.create_variable(Int, "a", root);
    branch(&mut graph, first, BranchSide::True, a);
    branch(&mut graph, first, BranchSide::False, second);
    let b = graph.create_variable(Int, "b", root);
    branch(&mut graph, second, BranchSide::True, b);

    let t1 = partition(&graph, first, BranchSide::True);
    let t2 = partition(&graph, second, BranchSide::True);
    let code = Compiler::default().compile(&graph).unwrap();

    let mut expected = vec![Op::PushFrame { scope: root }, Op::Eval { node: c1 }];
    expected.extend(compare_with_true());
    expected.extend([
        Op::Jne { offset: 7 },
        Op::PushFrame { scope: t1 },
        Op::PushVar { var: a },
        Op::Eval { node: a },
        Op::PopVar { var: a },
        Op::PopFrame { scope: t1 },
        Op::Jmp { offset: 10 },
        Op::Eval { node: c2 },
    ]);
    expected.extend(compare_with_true());
    expected.extend([
        Op::Jne { offset: 6 },
        Op::PushFrame { scope: t2 },
        Op::PushVar { var: b },
        Op::Eval { node: b },
        Op::PopVar { var: b },
        Op::PopFrame { scope: t2 },
        Op::Ret,
        Op::PopFrame { scope: root },
    ]);
    assert_eq!(ops(&code), expected);

    let frames = code
        .iter()
        .filter(|i| matches!(i.op, Op::PushFrame { .. }))
        .count();
    assert_eq!(frames, 3);
}

#[test]
fn while_loop_jumps_back_to_its_condition() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let [x, one, w, lt, three, assign, plus, one_b] = while_program(&mut graph);
    let body = partition(&graph, w, BranchSide::True);

    let code = Compiler::default().compile(&graph).unwrap();

    let mut expected = vec![
        Op::PushFrame { scope: root },
        Op::PushVar { var: x },
        Op::Eval { node: one },
        Op::Eval { node: x },
        Op::Eval { node: three },
        Op::Eval { node: lt },
    ];
    expected.extend(compare_with_true());
    expected.extend([
        Op::Jne { offset: 7 },
        Op::PushFrame { scope: body },
        Op::Eval { node: one_b },
        Op::Eval { node: plus },
        Op::Eval { node: assign },
        Op::PopFrame { scope: body },
        Op::Jmp { offset: -10 },
        Op::Ret,
        Op::PopVar { var: x },
        Op::PopFrame { scope: root },
    ]);
    assert_eq!(ops(&code), expected);
}

#[test]
fn for_loop_scopes_its_counter_around_the_loop() {
    let mut graph = Graph::new();
    let root = graph.root_scope();

    let looped = graph.create_for(root);
    let internal = graph.node(looped).internal_scope().unwrap();
    let i = graph.create_variable(Int, "i", internal);

    let assign = ndbl_ast::Signature::new("=", Int).ref_arg(Int).arg(Int);
    let init = graph.create_operator(assign.clone(), root);
    let zero = graph.create_literal(Value::Int(0), root);
    link(&mut graph, i, init, LVALUE);
    link(&mut graph, zero, init, RVALUE);
    link(&mut graph, init, looped, INITIALIZATION);

    let lt = graph.create_operator(binary("<", Bool, Int), root);
    let two = graph.create_literal(Value::Int(2), root);
    link(&mut graph, i, lt, LVALUE);
    link(&mut graph, two, lt, RVALUE);
    link(&mut graph, lt, looped, CONDITION);

    let step = graph.create_operator(assign, root);
    let plus = graph.create_operator(binary("+", Int, Int), root);
    let one = graph.create_literal(Value::Int(1), root);
    link(&mut graph, i, step, LVALUE);
    link(&mut graph, i, plus, LVALUE);
    link(&mut graph, one, plus, RVALUE);
    link(&mut graph, plus, step, RVALUE);
    link(&mut graph, step, looped, ITERATION);

    let start = entry(&graph);
    flow(&mut graph, start, looped);
    let body = partition(&graph, looped, BranchSide::True);

    let code = Compiler::default().compile(&graph).unwrap();

    let mut expected = vec![
        Op::PushFrame { scope: root },
        Op::PushVar { var: i },
        Op::Eval { node: zero },
        Op::Eval { node: init },
        Op::Eval { node: two },
        Op::Eval { node: lt },
    ];
    expected.extend(compare_with_true());
    expected.extend([
        Op::Jne { offset: 7 },
        Op::PushFrame { scope: body },
        Op::PopFrame { scope: body },
        Op::Eval { node: one },
        Op::Eval { node: plus },
        Op::Eval { node: step },
        Op::Jmp { offset: -10 },
        Op::PopVar { var: i },
        Op::Ret,
        Op::PopFrame { scope: root },
    ]);
    assert_eq!(ops(&code), expected);
}

#[test]
fn variable_condition_is_read_not_evaluated() {
    let mut graph = Graph::new();
    let root = graph.root_scope();

    let flag = graph.create_variable(Bool, "flag", root);
    let cond = graph.create_if(root);
    link(&mut graph, flag, cond, CONDITION);
    let start = entry(&graph);
    flow(&mut graph, start, flag);
    next(&mut graph, flag, cond);

    let code = Compiler::default().compile(&graph).unwrap();
    let ops = ops(&code);

    assert_eq!(ops[2], Op::Eval { node: flag });
    assert_eq!(ops[3], Op::Deref { node: flag });
    let evals = ops
        .iter()
        .filter(|op| **op == Op::Eval { node: flag })
        .count();
    assert_eq!(evals, 1);
}

#[test]
fn unlinked_condition_reads_its_own_value() {
    let mut graph = Graph::new();
    let root = graph.root_scope();

    let cond = graph.create_while(root);
    assert!(graph.set_property_value(cond, CONDITION, Value::Bool(true)));
    let start = entry(&graph);
    flow(&mut graph, start, cond);

    let code = Compiler::default().compile(&graph).unwrap();
    assert_eq!(
        code.get(1).unwrap().op,
        Op::Mov {
            dst: Register::Rax,
            src: Qword::from_bool(true),
        }
    );
}

#[test]
fn listing_shows_operands_and_comments() {
    let mut graph = Graph::new();
    if_program(&mut graph, true);

    let listing = Compiler::default().compile(&graph).unwrap().to_string();

    assert!(listing.contains("cmp rax, rdx"));
    assert!(listing.contains("jne +7"));
    assert!(listing.contains("jmp +6"));
    assert!(listing.contains("; if condition"));
    assert_eq!(listing.lines().count(), 18);
}

#[test]
fn jump_offsets_are_signed_distances() {
    assert_eq!(jump_offset(4, 11), 7);
    assert_eq!(jump_offset(14, 4), -10);
    assert_eq!(jump_offset(3, 3), 0);
}
