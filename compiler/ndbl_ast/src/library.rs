//! Callable registry: what function and operator nodes resolve to.
//!
//! A node only carries a [`Signature`]. The compiler resolves it against a
//! [`Library`] before lowering, and the VM calls the matching native
//! function when it evaluates the node.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::value::{Value, ValueType};

/// Failure raised by a native function.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CallError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("expected {expected} argument(s), got {found}")]
    Arity { expected: usize, found: usize },
    #[error("argument {index} expected `{expected}`, got `{found}`")]
    Type {
        index: usize,
        expected: ValueType,
        found: ValueType,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Arg {
    pub ty: ValueType,
    /// The callee's result is written back to whatever feeds this argument.
    pub by_ref: bool,
}

/// Name, return type and argument list of a callable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    ret: ValueType,
    args: SmallVec<[Arg; 2]>,
}

impl Signature {
    pub fn new(name: impl Into<String>, ret: ValueType) -> Self {
        Signature {
            name: name.into(),
            ret,
            args: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, ty: ValueType) -> Self {
        self.args.push(Arg { ty, by_ref: false });
        self
    }

    #[must_use]
    pub fn ref_arg(mut self, ty: ValueType) -> Self {
        self.args.push(Arg { ty, by_ref: true });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ret(&self) -> ValueType {
        self.ret
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Same name and argument types. Return type and by-ref markers are not
    /// part of overload resolution.
    pub fn accepts(&self, other: &Signature) -> bool {
        self.name == other.name
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.ty == b.ty)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if arg.by_ref {
                f.write_str("&")?;
            }
            write!(f, "{}", arg.ty)?;
        }
        f.write_str(")")
    }
}

pub type NativeFn = fn(&[Value]) -> Result<Value, CallError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone)]
pub struct Function {
    pub signature: Signature,
    pub native: NativeFn,
    pub is_operator: bool,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &format_args!("{}", self.signature))
            .field("is_operator", &self.is_operator)
            .finish_non_exhaustive()
    }
}

/// Every callable a graph may reference.
#[derive(Clone, Debug, Default)]
pub struct Library {
    functions: Vec<Function>,
    by_name: FxHashMap<String, SmallVec<[FunctionId; 4]>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arithmetic, comparison, logic and assignment operators plus a few
    /// numeric functions.
    pub fn standard() -> Self {
        let mut lib = Library::new();
        register_standard(&mut lib);
        lib
    }

    pub fn register_function(&mut self, signature: Signature, native: NativeFn) -> FunctionId {
        self.register(signature, native, false)
    }

    pub fn register_operator(&mut self, signature: Signature, native: NativeFn) -> FunctionId {
        self.register(signature, native, true)
    }

    fn register(&mut self, signature: Signature, native: NativeFn, is_operator: bool) -> FunctionId {
        let Ok(raw) = u32::try_from(self.functions.len()) else {
            panic!("function library is full");
        };
        let id = FunctionId(raw);
        self.by_name
            .entry(signature.name().to_owned())
            .or_default()
            .push(id);
        self.functions.push(Function {
            signature,
            native,
            is_operator,
        });
        id
    }

    /// Resolve a signature to a registered callable.
    pub fn find(&self, signature: &Signature) -> Option<FunctionId> {
        self.by_name
            .get(signature.name())?
            .iter()
            .copied()
            .find(|id| self.functions[id.index()].signature.accepts(signature))
    }

    pub fn get(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn is_operator(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .is_some_and(|ids| ids.iter().any(|id| self.functions[id.index()].is_operator))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .filter_map(|(i, f)| u32::try_from(i).ok().map(|raw| (FunctionId(raw), f)))
    }

    /// Check arity and argument types, then call.
    pub fn call(&self, id: FunctionId, args: &[Value]) -> Result<Value, CallError> {
        let Some(function) = self.get(id) else {
            panic!("unknown function {id:?}");
        };
        let expected = function.signature.args();
        if expected.len() != args.len() {
            return Err(CallError::Arity {
                expected: expected.len(),
                found: args.len(),
            });
        }
        for (index, (arg, value)) in expected.iter().zip(args).enumerate() {
            if arg.ty != value.ty() {
                return Err(CallError::Type {
                    index,
                    expected: arg.ty,
                    found: value.ty(),
                });
            }
        }
        (function.native)(args)
    }
}

// ── Standard callables ───────────────────────────────────────────────

// Arguments are type-checked by `Library::call`; these accessors only
// unwrap the variant.
fn int(args: &[Value], i: usize) -> i64 {
    args[i].as_int().unwrap_or_default()
}

fn double(args: &[Value], i: usize) -> f64 {
    args[i].as_double().unwrap_or_default()
}

fn boolean(args: &[Value], i: usize) -> bool {
    args[i].as_bool().unwrap_or_default()
}

macro_rules! binary {
    ($lib:ident, $op:literal, $get:ident: $ty:ident -> $ret:ident, |$a:ident, $b:ident| $body:expr) => {
        $lib.register_operator(Signature::new($op, $ret).arg($ty).arg($ty), |args| {
            let ($a, $b) = ($get(args, 0), $get(args, 1));
            Ok($body)
        });
    };
}

fn register_standard(lib: &mut Library) {
    use ValueType::{Bool, Double, Int};

    binary!(lib, "+", int: Int -> Int, |a, b| Value::Int(a.wrapping_add(b)));
    binary!(lib, "-", int: Int -> Int, |a, b| Value::Int(a.wrapping_sub(b)));
    binary!(lib, "*", int: Int -> Int, |a, b| Value::Int(a.wrapping_mul(b)));
    binary!(lib, "+", double: Double -> Double, |a, b| Value::Double(a + b));
    binary!(lib, "-", double: Double -> Double, |a, b| Value::Double(a - b));
    binary!(lib, "*", double: Double -> Double, |a, b| Value::Double(a * b));
    binary!(lib, "/", double: Double -> Double, |a, b| Value::Double(a / b));

    lib.register_operator(Signature::new("/", Int).arg(Int).arg(Int), |args| {
        let (a, b) = (int(args, 0), int(args, 1));
        a.checked_div(b).map(Value::Int).ok_or(CallError::DivisionByZero)
    });

    binary!(lib, "<", int: Int -> Bool, |a, b| Value::Bool(a < b));
    binary!(lib, ">", int: Int -> Bool, |a, b| Value::Bool(a > b));
    binary!(lib, "<=", int: Int -> Bool, |a, b| Value::Bool(a <= b));
    binary!(lib, ">=", int: Int -> Bool, |a, b| Value::Bool(a >= b));
    binary!(lib, "==", int: Int -> Bool, |a, b| Value::Bool(a == b));
    binary!(lib, "!=", int: Int -> Bool, |a, b| Value::Bool(a != b));
    binary!(lib, "<", double: Double -> Bool, |a, b| Value::Bool(a < b));
    binary!(lib, ">", double: Double -> Bool, |a, b| Value::Bool(a > b));
    binary!(lib, "<=", double: Double -> Bool, |a, b| Value::Bool(a <= b));
    binary!(lib, ">=", double: Double -> Bool, |a, b| Value::Bool(a >= b));
    binary!(lib, "==", boolean: Bool -> Bool, |a, b| Value::Bool(a == b));
    binary!(lib, "!=", boolean: Bool -> Bool, |a, b| Value::Bool(a != b));
    binary!(lib, "&&", boolean: Bool -> Bool, |a, b| Value::Bool(a && b));
    binary!(lib, "||", boolean: Bool -> Bool, |a, b| Value::Bool(a || b));

    lib.register_operator(Signature::new("!", Bool).arg(Bool), |args| {
        Ok(Value::Bool(!boolean(args, 0)))
    });
    lib.register_operator(Signature::new("-", Int).arg(Int), |args| {
        Ok(Value::Int(int(args, 0).wrapping_neg()))
    });
    lib.register_operator(Signature::new("-", Double).arg(Double), |args| {
        Ok(Value::Double(-double(args, 0)))
    });

    // Assignment yields the right-hand side; the evaluator stores it into
    // the left-hand variable.
    for ty in [Bool, Int, Double] {
        lib.register_operator(Signature::new("=", ty).ref_arg(ty).arg(ty), |args| Ok(args[1]));
    }

    lib.register_function(Signature::new("min", Int).arg(Int).arg(Int), |args| {
        Ok(Value::Int(int(args, 0).min(int(args, 1))))
    });
    lib.register_function(Signature::new("max", Int).arg(Int).arg(Int), |args| {
        Ok(Value::Int(int(args, 0).max(int(args, 1))))
    });
    lib.register_function(Signature::new("abs", Int).arg(Int), |args| {
        Ok(Value::Int(int(args, 0).wrapping_abs()))
    });
    lib.register_function(Signature::new("abs", Double).arg(Double), |args| {
        Ok(Value::Double(double(args, 0).abs()))
    });
    lib.register_function(Signature::new("not", Bool).arg(Bool), |args| {
        Ok(Value::Bool(!boolean(args, 0)))
    });
}
