//! Property and slot layout of each node kind.
//!
//! | kind | slots |
//! |------|-------|
//! | default, `;` | flow in (fan-in), flow out (1), value out |
//! | entry point | branch flow out (1) into its internal scope |
//! | literal | value out |
//! | variable | flow in, flow out, value in (1, initializer), value out |
//! | variable ref | value in (1, the variable), value out |
//! | function, operator | flow in, flow out, value out, one value in (1) per argument |
//! | if, while | flow in, flow out (1), false/true branch outs (1), condition in (1) |
//! | for | as `while`, plus initialization and iteration ins (1) |

use crate::library::Signature;
use crate::node::{Branch, BranchSide, Node, NodeKind};
use crate::property::{Property, PropertyFlags, PropertyId};
use crate::slot::SlotFlags;
use crate::token::{Token, TokenKind};
use crate::value::{Value, ValueType};
use crate::NodeId;

pub const VALUE: &str = "value";
pub const CONDITION: &str = "condition";
pub const INITIALIZATION: &str = "initialization";
pub const ITERATION: &str = "iteration";
pub const LVALUE: &str = "lvalue";
pub const RVALUE: &str = "rvalue";

fn value_property(ty: ValueType, extra: PropertyFlags) -> Property {
    Property::new(VALUE, ty, PropertyFlags::IS_NODE_VALUE | extra)
}

fn add_flow(node: &mut Node, fan_in: u8) {
    let value = node.value_property_id();
    node.add_slot(value, SlotFlags::FLOW_IN, fan_in, 0);
    node.add_slot(value, SlotFlags::FLOW_OUT, 1, 0);
}

fn add_input(node: &mut Node, property: PropertyId) {
    node.add_slot(property, SlotFlags::INPUT, 1, 0);
}

pub(crate) fn default_node(id: NodeId, capacity: u8) -> Node {
    let mut node = Node::new(id, NodeKind::Default, "node", value_property(ValueType::Void, PropertyFlags::IS_OUTPUT));
    add_flow(&mut node, capacity);
    let value = node.value_property_id();
    node.add_slot(value, SlotFlags::OUTPUT, capacity, 0);
    node
}

pub(crate) fn empty_instruction(id: NodeId, capacity: u8) -> Node {
    let mut node = default_node(id, capacity);
    node.kind = NodeKind::EmptyInstruction;
    node.name = ";".to_owned();
    let value = node.value_property_id();
    node.property_mut(value)
        .set_token(Token::owned(TokenKind::EndOfInstruction, ";"));
    node
}

pub(crate) fn entry_point(id: NodeId) -> Node {
    let mut node = Node::new(id, NodeKind::EntryPoint, "entry point", value_property(ValueType::Void, PropertyFlags::empty()));
    let value = node.value_property_id();
    node.add_slot(value, SlotFlags::FLOW_OUT | SlotFlags::IS_BRANCH, 1, 0);
    node
}

pub(crate) fn literal(id: NodeId, value: Value, capacity: u8) -> Node {
    let mut property = value_property(value.ty(), PropertyFlags::IS_OUTPUT);
    property.set_value(value);
    let mut node = Node::new(id, NodeKind::Literal, value.to_string(), property);
    let prop = node.value_property_id();
    node.add_slot(prop, SlotFlags::OUTPUT, capacity, 0);
    node
}

pub(crate) fn variable(id: NodeId, ty: ValueType, name: &str, capacity: u8) -> Node {
    let property = value_property(ty, PropertyFlags::IS_INPUT | PropertyFlags::IS_OUTPUT);
    let mut node = Node::new(id, NodeKind::Variable, name, property);
    add_flow(&mut node, capacity);
    let value = node.value_property_id();
    add_input(&mut node, value);
    node.add_slot(value, SlotFlags::OUTPUT, capacity, 0);
    node
}

pub(crate) fn variable_ref(id: NodeId, ty: ValueType, name: &str, capacity: u8) -> Node {
    let property = value_property(
        ty,
        PropertyFlags::IS_INPUT | PropertyFlags::IS_OUTPUT | PropertyFlags::IS_REF,
    );
    let mut node = Node::new(id, NodeKind::VariableRef, name, property);
    let value = node.value_property_id();
    add_input(&mut node, value);
    node.add_slot(value, SlotFlags::OUTPUT, capacity, 0);
    node
}

pub(crate) fn invokable(id: NodeId, kind: NodeKind, signature: Signature, capacity: u8) -> Node {
    debug_assert!(kind.is_invokable(), "{kind:?} is not invokable");
    debug_assert!(
        kind != NodeKind::Operator || (1..=2).contains(&signature.arity()),
        "operators take one or two operands"
    );

    let mut node = Node::new(
        id,
        kind,
        signature.name(),
        value_property(signature.ret(), PropertyFlags::IS_OUTPUT),
    );
    node.property_mut(node.value_property_id())
        .set_token(Token::owned(TokenKind::Operator, signature.name()));
    add_flow(&mut node, capacity);
    let value = node.value_property_id();
    node.add_slot(value, SlotFlags::OUTPUT, capacity, 0);

    for (i, arg) in signature.args().iter().enumerate() {
        let name = match (kind, i) {
            (NodeKind::Operator, 0) => LVALUE.to_owned(),
            (NodeKind::Operator, _) => RVALUE.to_owned(),
            _ => format!("arg{i}"),
        };
        let mut flags = PropertyFlags::IS_INPUT;
        if arg.by_ref {
            flags |= PropertyFlags::IS_REF;
        }
        let property = node.add_property(Property::new(name, arg.ty, flags));
        add_input(&mut node, property);
    }

    node.signature = Some(signature);
    node
}

pub(crate) fn conditional(id: NodeId, kind: NodeKind, capacity: u8) -> Node {
    debug_assert!(kind.is_conditional(), "{kind:?} is not a conditional");
    let name = match kind {
        NodeKind::If => "if",
        NodeKind::For => "for",
        _ => "while",
    };
    let mut node = Node::new(id, kind, name, value_property(ValueType::Void, PropertyFlags::empty()));
    let token_kind = match kind {
        NodeKind::If => TokenKind::If,
        NodeKind::For => TokenKind::For,
        _ => TokenKind::While,
    };
    node.property_mut(node.value_property_id())
        .set_token(Token::owned(token_kind, name));
    add_flow(&mut node, capacity);

    let value = node.value_property_id();
    let branch = SlotFlags::FLOW_OUT | SlotFlags::IS_BRANCH;
    let on_false = node.add_slot(value, branch, 1, BranchSide::False as u8);
    let on_true = node.add_slot(value, branch, 1, BranchSide::True as u8);

    let condition = node.add_property(Property::new(CONDITION, ValueType::Bool, PropertyFlags::IS_INPUT));
    let condition = node.add_slot(condition, SlotFlags::INPUT, 1, 0);

    let (initialization, iteration) = if kind == NodeKind::For {
        let init = node.add_property(Property::new(INITIALIZATION, ValueType::Void, PropertyFlags::IS_INPUT));
        let iter = node.add_property(Property::new(ITERATION, ValueType::Void, PropertyFlags::IS_INPUT));
        (
            Some(node.add_slot(init, SlotFlags::INPUT, 1, 0)),
            Some(node.add_slot(iter, SlotFlags::INPUT, 1, 0)),
        )
    } else {
        (None, None)
    };

    node.branch = Some(Branch {
        condition,
        on_true,
        on_false,
        initialization,
        iteration,
    });
    node
}
