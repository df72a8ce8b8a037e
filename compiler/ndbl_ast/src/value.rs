//! Runtime values and their 8-byte register form.

use std::fmt;

/// Primitive types a property, variable or function argument can carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    #[default]
    Void,
    Bool,
    Int,
    Double,
}

impl ValueType {
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Void => "void",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Double => "double",
        }
    }

    /// Zero value of the type, also used to reset disconnected inputs.
    pub const fn default_value(self) -> Value {
        match self {
            ValueType::Void => Value::Void,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Double => Value::Double(0.0),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value held by a property or produced by an evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
}

impl Value {
    pub const fn ty(self) -> ValueType {
        match self {
            Value::Void => ValueType::Void,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
        }
    }

    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub const fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    pub const fn as_double(self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(d),
            _ => None,
        }
    }

    /// Raw register form. The type tag is dropped; callers keep it.
    pub fn to_qword(self) -> Qword {
        match self {
            Value::Void => Qword::ZERO,
            Value::Bool(b) => Qword::from_bool(b),
            Value::Int(i) => Qword::from_i64(i),
            Value::Double(d) => Qword::from_f64(d),
        }
    }

    /// Reinterpret a register word as a value of `ty`.
    pub fn from_qword(ty: ValueType, word: Qword) -> Value {
        match ty {
            ValueType::Void => Value::Void,
            ValueType::Bool => Value::Bool(word.as_bool()),
            ValueType::Int => Value::Int(word.as_i64()),
            ValueType::Double => Value::Double(word.as_f64()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
        }
    }
}

/// Eight raw bytes: the uniform representation of every primitive moved
/// through registers and instruction operands.
///
/// Booleans occupy the low byte, integers the full word in two's
/// complement, doubles their IEEE-754 bits.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Qword(u64);

crate::static_assert_size!(Qword, 8);

impl Qword {
    pub const ZERO: Qword = Qword(0);

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Qword(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_bool(b: bool) -> Self {
        Qword(u64::from(b))
    }

    #[inline]
    pub const fn from_i64(i: i64) -> Self {
        Qword(u64::from_ne_bytes(i.to_ne_bytes()))
    }

    #[inline]
    pub const fn from_f64(d: f64) -> Self {
        Qword(d.to_bits())
    }

    /// Reads the low byte only.
    #[inline]
    pub const fn as_bool(self) -> bool {
        self.0 & 0xFF != 0
    }

    #[inline]
    pub const fn as_i64(self) -> i64 {
        i64::from_ne_bytes(self.0.to_ne_bytes())
    }

    #[inline]
    pub const fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Debug for Qword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qword({:#018x})", self.0)
    }
}
