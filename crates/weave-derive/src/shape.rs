//! The type descriptor boundary.
//!
//! The engine never inspects types itself. A [`Describe`] implementation
//! reports whether a concrete type is a product, a sum, or opaque, and
//! yields its fields or variants with type arguments already substituted.

use std::fmt;
use std::rc::Rc;

use weave_common::Span;

use crate::ty::Ty;
use crate::value::Value;

/// Structural inspection of concrete types.
pub trait Describe {
    fn describe(&self, ty: &Ty) -> Shape;
}

/// What a type looks like structurally.
#[derive(Clone, Debug)]
pub enum Shape {
    Product(ProductShape),
    Sum(SumShape),
    /// Neither product nor sum: only a registry instance can satisfy it.
    Opaque,
}

#[derive(Clone, Debug)]
pub struct ProductShape {
    /// Constructor name, used as the record name of instances.
    pub name: String,
    /// A zero-field object with exactly one inhabitant.
    pub singleton: bool,
    /// A single-field pass-through type.
    pub wrapper: bool,
    pub fields: Vec<FieldShape>,
    pub span: Option<Span>,
}

#[derive(Clone, Debug)]
pub struct FieldShape {
    pub name: String,
    /// Declared type. For a variadic field this is the element type: the
    /// capability is resolved for one element, and the field's value is the
    /// record's tail, read and built as a `Value::List`.
    pub ty: Ty,
    pub variadic: bool,
    pub default: Option<DefaultValue>,
    pub span: Option<Span>,
}

#[derive(Clone, Debug)]
pub struct SumShape {
    pub name: String,
    pub variants: Vec<VariantShape>,
    pub span: Option<Span>,
}

#[derive(Clone, Debug)]
pub struct VariantShape {
    pub name: String,
    /// The variant's concrete type, or why it cannot be a member of the
    /// requested instantiation of the sum.
    pub ty: Result<Ty, BoundMismatch>,
    pub span: Option<Span>,
}

/// A variant pins a type parameter of its sum to a type incompatible with
/// the requested type argument (e.g. `IntLit: Expr<Int>` under `Expr<String>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundMismatch {
    pub param: String,
    pub required: Ty,
    pub found: Ty,
}

impl fmt::Display for BoundMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type parameter {} is pinned to {} but was requested as {}",
            self.param, self.required, self.found
        )
    }
}

/// A constructor default, evaluated only when asked for.
#[derive(Clone)]
pub struct DefaultValue(Rc<dyn Fn() -> Value>);

impl DefaultValue {
    pub fn new(thunk: impl Fn() -> Value + 'static) -> Self {
        DefaultValue(Rc::new(thunk))
    }

    pub fn constant(value: Value) -> Self {
        DefaultValue::new(move || value.clone())
    }

    pub fn evaluate(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultValue(..)")
    }
}
