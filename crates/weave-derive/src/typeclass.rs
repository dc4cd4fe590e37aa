//! Capability definitions and the descriptors handed to their hooks.
//!
//! A [`Typeclass`] is the user's side of a derivation: a name and two hooks.
//! `combine` turns a [`CaseClass`] (a product whose fields already carry
//! resolved instances) into an instance; `dispatch` does the same for a
//! [`SealedTrait`]. The engine decides *which* instances exist. The hooks
//! decide what an instance *means*.

use std::fmt;
use std::rc::Rc;

use crate::knot::Binding;
use crate::shape::DefaultValue;
use crate::value::Value;

type CombineFn<I> = dyn Fn(CaseClass<I>) -> I;
type DispatchFn<I> = dyn Fn(SealedTrait<I>) -> I;

/// Which assembly hook a derivation needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    Combine,
    Dispatch,
}

impl Hook {
    /// The signature the capability must provide, for error messages.
    pub fn signature(&self, capability: &str) -> String {
        match self {
            Hook::Combine => format!("combine(CaseClass<{0}>) -> {0}", capability),
            Hook::Dispatch => format!("dispatch(SealedTrait<{0}>) -> {0}", capability),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Combine => f.write_str("combine"),
            Hook::Dispatch => f.write_str("dispatch"),
        }
    }
}

/// A derivable capability.
pub struct Typeclass<I> {
    name: String,
    combine: Option<Box<CombineFn<I>>>,
    dispatch: Option<Box<DispatchFn<I>>>,
}

impl<I> Typeclass<I> {
    /// A capability with no hooks yet. Add at least one with
    /// [`with_combine`](Self::with_combine) or [`with_dispatch`](Self::with_dispatch).
    pub fn new(name: impl Into<String>) -> Self {
        Typeclass {
            name: name.into(),
            combine: None,
            dispatch: None,
        }
    }

    pub fn with_combine(mut self, combine: impl Fn(CaseClass<I>) -> I + 'static) -> Self {
        self.combine = Some(Box::new(combine));
        self
    }

    pub fn with_dispatch(mut self, dispatch: impl Fn(SealedTrait<I>) -> I + 'static) -> Self {
        self.dispatch = Some(Box::new(dispatch));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_hook(&self, hook: Hook) -> bool {
        match hook {
            Hook::Combine => self.combine.is_some(),
            Hook::Dispatch => self.dispatch.is_some(),
        }
    }

    pub(crate) fn combine(&self, case_class: CaseClass<I>) -> Option<I> {
        self.combine.as_ref().map(|f| f(case_class))
    }

    pub(crate) fn dispatch(&self, sealed: SealedTrait<I>) -> Option<I> {
        self.dispatch.as_ref().map(|f| f(sealed))
    }
}

// ── Products ───────────────────────────────────────────────────────────

/// One field of a product, with its resolved capability instance.
pub struct Param<I> {
    label: String,
    type_name: String,
    owner: String,
    index: usize,
    variadic: bool,
    typeclass: Binding<I>,
    default: Option<DefaultValue>,
}

impl<I> Clone for Param<I> {
    fn clone(&self) -> Self {
        Param {
            label: self.label.clone(),
            type_name: self.type_name.clone(),
            owner: self.owner.clone(),
            index: self.index,
            variadic: self.variadic,
            typeclass: self.typeclass.clone(),
            default: self.default.clone(),
        }
    }
}

impl<I> Param<I> {
    pub(crate) fn new(
        label: String,
        type_name: String,
        owner: String,
        index: usize,
        variadic: bool,
        typeclass: Binding<I>,
        default: Option<DefaultValue>,
    ) -> Self {
        Param {
            label,
            type_name,
            owner,
            index,
            variadic,
            typeclass,
            default,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Display form of the field's declared type. For a variadic field this
    /// is the element type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Full type of the product this field belongs to, e.g. `Branch<String>`.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// The capability instance for this field's type (the element type, for
    /// a variadic field). Must not be called from inside `combine` itself:
    /// for a recursive field the instance is still being assembled.
    pub fn typeclass(&self) -> Rc<I> {
        self.typeclass.get()
    }

    pub fn binding(&self) -> &Binding<I> {
        &self.typeclass
    }

    /// The constructor default, unevaluated.
    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Read this field off a product instance. A variadic field collects the
    /// record's tail into a list. Anything other than a record reads as `Unit`.
    pub fn dereference(&self, value: &Value) -> Value {
        match value {
            Value::Record { fields, .. } if self.variadic => {
                Value::List(fields.get(self.index..).map(<[Value]>::to_vec).unwrap_or_default())
            }
            Value::Record { fields, .. } => fields.get(self.index).cloned().unwrap_or(Value::Unit),
            _ => Value::Unit,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Constructor {
    /// Returns the one inhabitant, ignoring the supplier.
    Singleton(Value),
    /// Builds a record named after the product.
    Record(String),
}

/// A product type being derived.
pub struct CaseClass<I> {
    type_name: String,
    full_name: String,
    singleton: bool,
    wrapper: bool,
    params: Rc<[Param<I>]>,
    constructor: Constructor,
}

impl<I> Clone for CaseClass<I> {
    fn clone(&self) -> Self {
        CaseClass {
            type_name: self.type_name.clone(),
            full_name: self.full_name.clone(),
            singleton: self.singleton,
            wrapper: self.wrapper,
            params: Rc::clone(&self.params),
            constructor: self.constructor.clone(),
        }
    }
}

impl<I> CaseClass<I> {
    pub(crate) fn new(
        type_name: String,
        full_name: String,
        singleton: bool,
        wrapper: bool,
        params: Vec<Param<I>>,
        constructor: Constructor,
    ) -> Self {
        CaseClass {
            type_name,
            full_name,
            singleton,
            wrapper,
            params: params.into(),
            constructor,
        }
    }

    /// Constructor name, e.g. `Branch`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Full type, e.g. `Branch<String>`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn is_wrapper(&self) -> bool {
        self.wrapper
    }

    pub fn params(&self) -> &[Param<I>] {
        &self.params
    }

    pub fn param(&self, label: &str) -> Option<&Param<I>> {
        self.params.iter().find(|p| p.label == label)
    }

    /// Build a new instance, asking `supply` for each field's value in
    /// declaration order. A variadic field's supplied list is spread into
    /// the record's tail.
    pub fn construct(&self, mut supply: impl FnMut(&Param<I>) -> Value) -> Value {
        match &self.constructor {
            Constructor::Singleton(value) => value.clone(),
            Constructor::Record(name) => {
                let mut fields = Vec::with_capacity(self.params.len());
                for param in self.params.iter() {
                    match supply(param) {
                        Value::List(items) if param.variadic => fields.extend(items),
                        value => fields.push(value),
                    }
                }
                Value::record(name.clone(), fields)
            }
        }
    }
}

// ── Sums ───────────────────────────────────────────────────────────────

/// One variant of a sum, with its resolved capability instance.
pub struct Subtype<I> {
    type_name: String,
    index: usize,
    typeclass: Binding<I>,
}

impl<I> Clone for Subtype<I> {
    fn clone(&self) -> Self {
        Subtype {
            type_name: self.type_name.clone(),
            index: self.index,
            typeclass: self.typeclass.clone(),
        }
    }
}

impl<I> Subtype<I> {
    pub(crate) fn new(type_name: String, index: usize, typeclass: Binding<I>) -> Self {
        Subtype {
            type_name,
            index,
            typeclass,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn typeclass(&self) -> Rc<I> {
        self.typeclass.get()
    }

    pub fn binding(&self) -> &Binding<I> {
        &self.typeclass
    }

    /// Whether `value` is an instance of this variant.
    pub fn is_member(&self, value: &Value) -> bool {
        value.record_name() == Some(self.type_name.as_str())
    }

    /// View `value` as this variant. `None` unless [`is_member`](Self::is_member) holds.
    pub fn narrow<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.is_member(value).then_some(value)
    }
}

/// A sum type being derived.
pub struct SealedTrait<I> {
    type_name: String,
    full_name: String,
    subtypes: Rc<[Subtype<I>]>,
}

impl<I> Clone for SealedTrait<I> {
    fn clone(&self) -> Self {
        SealedTrait {
            type_name: self.type_name.clone(),
            full_name: self.full_name.clone(),
            subtypes: Rc::clone(&self.subtypes),
        }
    }
}

impl<I> SealedTrait<I> {
    pub(crate) fn new(type_name: String, full_name: String, subtypes: Vec<Subtype<I>>) -> Self {
        SealedTrait {
            type_name,
            full_name,
            subtypes: subtypes.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn subtypes(&self) -> &[Subtype<I>] {
        &self.subtypes
    }

    /// Find the variant `value` belongs to and hand it, narrowed, to `f`.
    pub fn dispatch<R>(&self, value: &Value, f: impl FnOnce(&Subtype<I>, &Value) -> R) -> Option<R> {
        let subtype = self.subtypes.iter().find(|s| s.is_member(value))?;
        Some(f(subtype, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knot::BindingName;

    fn param(label: &str, index: usize, variadic: bool) -> Param<()> {
        Param::new(
            label.to_string(),
            "String".to_string(),
            "Args".to_string(),
            index,
            variadic,
            Binding::ready(BindingName(index as u32), ()),
            None,
        )
    }

    #[test]
    fn construct_spreads_variadic_tail() {
        let case_class = CaseClass::new(
            "Args".to_string(),
            "Args".to_string(),
            false,
            false,
            vec![param("head", 0, false), param("rest", 1, true)],
            Constructor::Record("Args".to_string()),
        );
        let value = case_class.construct(|p| match p.label() {
            "head" => Value::str("a"),
            _ => Value::List(vec![Value::str("b"), Value::str("c")]),
        });
        assert_eq!(
            value,
            Value::record("Args", vec![Value::str("a"), Value::str("b"), Value::str("c")])
        );

        let rest = &case_class.params()[1];
        assert_eq!(
            rest.dereference(&value),
            Value::List(vec![Value::str("b"), Value::str("c")])
        );
        assert_eq!(case_class.params()[0].dereference(&value), Value::str("a"));
        assert_eq!(rest.owner(), "Args");
    }

    #[test]
    fn singleton_ignores_supplier() {
        let case_class: CaseClass<()> = CaseClass::new(
            "Origin".to_string(),
            "Origin".to_string(),
            true,
            false,
            vec![],
            Constructor::Singleton(Value::record("Origin", vec![])),
        );
        let value = case_class.construct(|_| panic!("no fields to supply"));
        assert_eq!(value, Value::record("Origin", vec![]));
    }

    #[test]
    fn narrow_requires_membership() {
        let leaf = Subtype::new("Leaf".to_string(), 0, Binding::ready(BindingName(0), ()));
        let value = Value::record("Leaf", vec![Value::str("x")]);
        let other = Value::record("Branch", vec![]);
        assert!(leaf.is_member(&value));
        assert_eq!(leaf.narrow(&value), Some(&value));
        assert_eq!(leaf.narrow(&other), None);
    }

    #[test]
    fn hook_signatures() {
        assert_eq!(
            Hook::Dispatch.signature("Show"),
            "dispatch(SealedTrait<Show>) -> Show"
        );
    }
}
