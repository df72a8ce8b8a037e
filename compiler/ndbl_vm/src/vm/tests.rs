#![expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]

use super::*;
use ndbl_ast::layout::{CONDITION, INITIALIZATION, ITERATION, LVALUE, RVALUE, VALUE};
use ndbl_ast::{BranchSide, CallError, GraphFlags, Signature, SlotRef, ValueType};
use ndbl_compile::Compiler;
use pretty_assertions::assert_eq;

use ValueType::{Bool, Int};

const SIDE: GraphFlags = GraphFlags::ALLOW_SIDE_EFFECTS;

fn flow(graph: &mut Graph, from: SlotRef, to: NodeId) {
    let input = graph.flow_in(to).unwrap();
    graph.connect(from, input, SIDE).unwrap();
}

fn start(graph: &mut Graph, to: NodeId) {
    let entry = graph
        .branch_out(graph.root_node(), BranchSide::True)
        .unwrap();
    flow(graph, entry, to);
}

fn next(graph: &mut Graph, from: NodeId, to: NodeId) {
    let output = graph.flow_out(from).unwrap();
    flow(graph, output, to);
}

fn branch(graph: &mut Graph, owner: NodeId, side: BranchSide, to: NodeId) {
    let output = graph.branch_out(owner, side).unwrap();
    flow(graph, output, to);
}

fn link(graph: &mut Graph, from: NodeId, to: NodeId, input: &str) {
    let output = graph.value_out(from).unwrap();
    let input = graph.input(to, input).unwrap();
    graph.connect(output, input, SIDE).unwrap();
}

fn binary(name: &str, ret: ValueType, operand: ValueType) -> Signature {
    Signature::new(name, ret).arg(operand).arg(operand)
}

fn assign(ty: ValueType) -> Signature {
    Signature::new("=", ty).ref_arg(ty).arg(ty)
}

/// `x := 1; while (x < 3) { x = x + 1 }`. Returns `x`, the first literal
/// and the loop condition.
fn while_program(graph: &mut Graph) -> (NodeId, NodeId, NodeId) {
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

    let set = graph.create_operator(assign(Int), root);
    let plus = graph.create_operator(binary("+", Int, Int), root);
    let step = graph.create_literal(Value::Int(1), root);
    link(graph, x, set, LVALUE);
    link(graph, x, plus, LVALUE);
    link(graph, step, plus, RVALUE);
    link(graph, plus, set, RVALUE);

    start(graph, x);
    next(graph, x, w);
    branch(graph, w, BranchSide::True, set);
    (x, one, lt)
}

fn loaded<'g>(graph: &'g Graph, config: VmConfig) -> VirtualMachine<'g> {
    let code = Compiler::default().compile(graph).unwrap();
    let mut vm = VirtualMachine::with_config(graph, config);
    vm.load_program(code).unwrap();
    vm
}

#[test]
fn while_loop_runs_to_completion() {
    crate::init_tracing();
    let mut graph = Graph::new();
    let (x, one, lt) = while_program(&mut graph);
    let mut vm = loaded(&graph, VmConfig::default());

    vm.run_program().unwrap();

    assert!(vm.is_program_stopped());
    assert_eq!(vm.read_variable(x), Some(Value::Int(3)));
    assert!(!vm.read_register(Register::Rax).as_bool());
    assert_eq!(vm.value_of(lt), Some(Value::Bool(false)));
    assert_eq!(vm.get_last_evaluated(), Some(lt));
    assert!(vm.visited().contains(&one));
    assert!(vm.program().is_some());
}

#[test]
fn stepping_reaches_the_same_state_as_running() {
    let mut graph = Graph::new();
    let (x, _, _) = while_program(&mut graph);

    let mut run = loaded(&graph, VmConfig::default());
    run.run_program().unwrap();

    let mut debug = loaded(&graph, VmConfig::default());
    debug.debug_program().unwrap();
    let mut steps = 0;
    while debug.step_over().unwrap() {
        assert!(debug.is_debugging());
        steps += 1;
    }

    assert!(steps > 0);
    assert!(debug.is_program_stopped());
    assert_eq!(debug.registers(), run.registers());
    assert_eq!(debug.read_variable(x), run.read_variable(x));
}

#[test]
fn debugger_tracks_the_next_node_to_evaluate() {
    let mut graph = Graph::new();
    let (x, one, _) = while_program(&mut graph);
    let mut vm = loaded(&graph, VmConfig::default());

    vm.debug_program().unwrap();
    assert_eq!(vm.get_next_node(), Some(graph.root_node()));

    assert!(vm.step_over().unwrap()); // push_frame
    assert_eq!(vm.get_next_node(), Some(graph.root_node()));
    assert!(vm.step_over().unwrap()); // push_var x
    assert_eq!(vm.get_next_node(), Some(one));
    assert!(vm.step_over().unwrap()); // eval 1
    assert_eq!(vm.get_next_node(), Some(x));
    assert_eq!(vm.read_register(Register::Rax), Qword::from_i64(1));

    vm.stop_program();
    assert!(vm.is_program_stopped());
    assert_eq!(vm.get_next_node(), None);
    assert_eq!(vm.step_over(), Err(VmError::NotRunning));
}

#[test]
fn misuse_is_rejected_without_state_change() {
    let mut graph = Graph::new();
    while_program(&mut graph);
    let code = Compiler::default().compile(&graph).unwrap();
    let mut vm = VirtualMachine::new(&graph);

    assert_eq!(vm.run_program(), Err(VmError::NoProgram));
    assert_eq!(vm.debug_program(), Err(VmError::NoProgram));
    assert_eq!(vm.step_over(), Err(VmError::NotRunning));

    vm.load_program(code.clone()).unwrap();
    assert_eq!(vm.load_program(code.clone()), Err(VmError::AlreadyLoaded));

    vm.debug_program().unwrap();
    assert_eq!(vm.run_program(), Err(VmError::Busy));
    assert_eq!(vm.load_program(code.clone()), Err(VmError::Busy));
    assert!(vm.is_debugging());
    assert!(vm.is_program_running());

    let released = vm.release_program().unwrap();
    assert_eq!(released, code);
    assert!(vm.is_program_stopped());
    assert!(vm.program().is_none());
    assert_eq!(vm.release_program(), None);
    vm.load_program(released).unwrap();
}

#[test]
fn step_limit_stops_a_run() {
    let mut graph = Graph::new();
    while_program(&mut graph);
    let mut vm = loaded(
        &graph,
        VmConfig {
            step_limit: Some(5),
        },
    );

    assert_eq!(vm.run_program(), Err(VmError::StepLimit(5)));
    assert!(vm.is_program_stopped());
    assert_eq!(vm.registers().cursor(), 5);
}

#[test]
fn jumping_outside_the_program_fails() {
    let graph = Graph::new();

    let mut forward = Code::new();
    forward.push(Op::Jmp { offset: 5 });
    let mut vm = VirtualMachine::new(&graph);
    vm.load_program(forward).unwrap();
    assert_eq!(
        vm.run_program(),
        Err(VmError::OutOfBounds {
            from: 0,
            offset: 5,
            len: 1,
        })
    );

    let mut backward = Code::new();
    backward.push(Op::Jmp { offset: -1 });
    vm.release_program();
    vm.load_program(backward).unwrap();
    assert!(matches!(vm.run_program(), Err(VmError::OutOfBounds { .. })));
    assert!(vm.is_program_stopped());
}

#[test]
fn code_compiled_from_another_graph_is_rejected() {
    let mut compiled = Graph::new();
    let (x, _, _) = while_program(&mut compiled);
    let code = Compiler::default().compile(&compiled).unwrap();

    let mut other = Graph::new();
    while_program(&mut other);
    let mut vm = VirtualMachine::new(&other);
    vm.load_program(code).unwrap();

    assert_eq!(vm.run_program(), Err(VmError::UnknownNode(x)));
    assert!(vm.is_program_stopped());
    assert!(vm.visited().is_empty());
}

#[test]
fn native_failures_name_the_node() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let div = graph.create_operator(binary("/", Int, Int), root);
    let one = graph.create_literal(Value::Int(1), root);
    let zero = graph.create_literal(Value::Int(0), root);
    link(&mut graph, one, div, LVALUE);
    link(&mut graph, zero, div, RVALUE);
    start(&mut graph, div);

    let mut vm = loaded(&graph, VmConfig::default());
    assert_eq!(
        vm.run_program(),
        Err(VmError::Call {
            node: div,
            source: CallError::DivisionByZero,
        })
    );
    assert_eq!(vm.value_of(zero), Some(Value::Int(0)));
}

#[test]
fn if_takes_one_branch() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let cond = graph.create_if(root);
    assert!(graph.set_property_value(cond, CONDITION, Value::Bool(false)));
    start(&mut graph, cond);
    let a = graph.create_variable(Int, "a", root);
    let b = graph.create_variable(Int, "b", root);
    branch(&mut graph, cond, BranchSide::True, a);
    branch(&mut graph, cond, BranchSide::False, b);

    let mut vm = loaded(&graph, VmConfig::default());
    vm.run_program().unwrap();

    assert!(vm.visited().contains(&b));
    assert!(!vm.visited().contains(&a));
}

#[test]
fn for_loop_counter_lives_only_inside_the_loop() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let looped = graph.create_for(root);
    let internal = graph.node(looped).internal_scope().unwrap();
    let i = graph.create_variable(Int, "i", internal);

    let init = graph.create_operator(assign(Int), root);
    let zero = graph.create_literal(Value::Int(0), root);
    link(&mut graph, i, init, LVALUE);
    link(&mut graph, zero, init, RVALUE);
    link(&mut graph, init, looped, INITIALIZATION);

    let lt = graph.create_operator(binary("<", Bool, Int), root);
    let three = graph.create_literal(Value::Int(3), root);
    link(&mut graph, i, lt, LVALUE);
    link(&mut graph, three, lt, RVALUE);
    link(&mut graph, lt, looped, CONDITION);

    let step = graph.create_operator(assign(Int), root);
    let plus = graph.create_operator(binary("+", Int, Int), root);
    let one = graph.create_literal(Value::Int(1), root);
    link(&mut graph, i, step, LVALUE);
    link(&mut graph, i, plus, LVALUE);
    link(&mut graph, one, plus, RVALUE);
    link(&mut graph, plus, step, RVALUE);
    link(&mut graph, step, looped, ITERATION);
    start(&mut graph, looped);

    let mut vm = loaded(&graph, VmConfig::default());
    vm.run_program().unwrap();

    assert_eq!(vm.value_of(step), Some(Value::Int(3)));
    assert_eq!(vm.value_of(lt), Some(Value::Bool(false)));
    assert_eq!(vm.read_variable(i), None);
    assert_eq!(vm.value_of(i), None);
}

#[test]
fn references_read_and_write_their_variable() {
    let mut graph = Graph::new();
    let root = graph.root_scope();
    let x = graph.create_variable(Int, "x", root);
    graph.set_value(x, Value::Int(4));
    let r = graph.create_variable_ref(x, root).unwrap();

    let plus = graph.create_operator(binary("+", Int, Int), root);
    let one = graph.create_literal(Value::Int(1), root);
    link(&mut graph, r, plus, LVALUE);
    link(&mut graph, one, plus, RVALUE);

    let set = graph.create_operator(assign(Int), root);
    let nine = graph.create_literal(Value::Int(9), root);
    link(&mut graph, r, set, LVALUE);
    link(&mut graph, nine, set, RVALUE);

    start(&mut graph, x);
    next(&mut graph, x, plus);
    next(&mut graph, plus, set);

    let mut vm = loaded(&graph, VmConfig::default());
    vm.run_program().unwrap();

    assert_eq!(vm.value_of(plus), Some(Value::Int(5)));
    assert_eq!(vm.read_variable(x), Some(Value::Int(9)));
    assert_eq!(vm.value_of(r), Some(Value::Int(9)));
}
