//! Named, typed values owned by a node.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::token::{Token, TokenKind};
use crate::value::{Value, ValueType};

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct PropertyFlags: u8 {
        /// The node's primary value. Flow slots hang off this property.
        const IS_NODE_VALUE = 1 << 0;
        /// Passed by reference: an evaluation writes back through it.
        const IS_REF = 1 << 1;
        /// Fed by an input slot.
        const IS_INPUT = 1 << 2;
        /// Read through an output slot.
        const IS_OUTPUT = 1 << 3;
    }
}

/// Index of a property inside its node's bag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PropertyId(u8);

impl PropertyId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct Property {
    name: String,
    ty: ValueType,
    value: Value,
    token: Token,
    flags: PropertyFlags,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: ValueType, flags: PropertyFlags) -> Self {
        let value = ty.default_value();
        Property {
            name: name.into(),
            ty,
            value,
            token: Token::literal(value),
            flags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: PropertyFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn is_ref(&self) -> bool {
        self.flags.contains(PropertyFlags::IS_REF)
    }

    /// Change the type. A value of another type is reset to the new
    /// type's default.
    pub fn set_type(&mut self, ty: ValueType) {
        if self.value.ty() != ty {
            self.set_value(ty.default_value());
        }
        self.ty = ty;
    }

    /// Set the value. A literal or empty token gets its word rewritten to
    /// match, keeping any prefix and suffix; keyword and operator tokens
    /// are left alone.
    pub fn set_value(&mut self, value: Value) {
        self.ty = value.ty();
        self.value = value;
        match self.token.kind() {
            TokenKind::Literal(_) => {
                self.token.set_kind(TokenKind::Literal(value.ty()));
                self.token.word_replace(&value.to_string());
            }
            _ if self.token.is_empty() => self.token.word_replace(&value.to_string()),
            _ => {}
        }
    }

    pub fn set_token(&mut self, token: Token) {
        self.token = token;
    }

    pub fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    /// Back to the type's default value and default literal text.
    pub fn reset_to_default(&mut self) {
        self.set_value(self.ty.default_value());
    }
}

/// Ordered properties of a node; most nodes have one to three.
#[derive(Clone, Debug, Default)]
pub struct PropertyBag {
    props: SmallVec<[Property; 3]>,
}

impl PropertyBag {
    pub fn add(&mut self, property: Property) -> PropertyId {
        debug_assert!(
            self.find(property.name()).is_none(),
            "duplicate property `{}`",
            property.name()
        );
        let Ok(raw) = u8::try_from(self.props.len()) else {
            panic!("too many properties on one node");
        };
        self.props.push(property);
        PropertyId(raw)
    }

    pub fn get(&self, id: PropertyId) -> &Property {
        &self.props[id.index()]
    }

    pub fn get_mut(&mut self, id: PropertyId) -> &mut Property {
        &mut self.props[id.index()]
    }

    pub fn find(&self, name: &str) -> Option<PropertyId> {
        self.props
            .iter()
            .position(|p| p.name() == name)
            .and_then(|i| u8::try_from(i).ok())
            .map(PropertyId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &Property)> {
        (0u8..).zip(self.props.iter()).map(|(i, p)| (PropertyId(i), p))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}
