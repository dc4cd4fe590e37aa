//! Hand-built type tables and capabilities shared by the engine tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use weave_common::Span;
use weave_derive::{
    Binding, BoundMismatch, CaseClass, DefaultValue, Describe, FieldShape, InstanceRegistry,
    InstanceRule, ProductShape, SealedTrait, Shape, SumShape, Ty, Typeclass, Value, VariantShape,
};

type ShapeFn = dyn Fn(&[Ty]) -> Shape;

/// Declarations keyed by head constructor. Records every `describe` call.
#[derive(Default)]
pub struct TypeTable {
    decls: HashMap<String, Box<ShapeFn>>,
    described: RefCell<Vec<Ty>>,
    next_offset: u32,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn span(&mut self) -> Option<Span> {
        let start = self.next_offset;
        self.next_offset += 10;
        Some(Span::new(start, start + 5))
    }

    /// A generic declaration, built from the requested type arguments.
    pub fn with(mut self, name: &str, shape: impl Fn(&[Ty]) -> Shape + 'static) -> Self {
        self.decls.insert(name.to_string(), Box::new(shape));
        self
    }

    /// A non-generic product. Fields get distinct spans.
    pub fn product(mut self, name: &str, fields: &[(&str, Ty)]) -> Self {
        let span = self.span();
        let fields: Vec<FieldShape> = fields
            .iter()
            .map(|(n, ty)| FieldShape {
                span: self.span(),
                ..field(n, ty.clone())
            })
            .collect();
        let shape = ProductShape {
            name: name.to_string(),
            singleton: false,
            wrapper: false,
            fields,
            span,
        };
        self.with(name, move |_| Shape::Product(shape.clone()))
    }

    pub fn singleton(self, name: &str) -> Self {
        let shape = ProductShape {
            name: name.to_string(),
            singleton: true,
            wrapper: false,
            fields: Vec::new(),
            span: None,
        };
        self.with(name, move |_| Shape::Product(shape.clone()))
    }

    /// A non-generic sum over already-declared variant types.
    pub fn sum(mut self, name: &str, variants: &[&str]) -> Self {
        let span = self.span();
        let shape = SumShape {
            name: name.to_string(),
            variants: variants
                .iter()
                .map(|v| VariantShape {
                    name: v.to_string(),
                    ty: Ok(Ty::con(*v)),
                    span: None,
                })
                .collect(),
            span,
        };
        self.with(name, move |_| Shape::Sum(shape.clone()))
    }

    pub fn described(&self) -> Vec<Ty> {
        self.described.borrow().clone()
    }
}

impl Describe for TypeTable {
    fn describe(&self, ty: &Ty) -> Shape {
        self.described.borrow_mut().push(ty.clone());
        match ty.head().and_then(|(name, args)| Some((self.decls.get(name)?, args))) {
            Some((decl, args)) => decl(args),
            None => Shape::Opaque,
        }
    }
}

pub fn field(name: &str, ty: Ty) -> FieldShape {
    FieldShape {
        name: name.to_string(),
        ty,
        variadic: false,
        default: None,
        span: None,
    }
}

pub fn product(name: &str, fields: Vec<FieldShape>) -> Shape {
    Shape::Product(ProductShape {
        name: name.to_string(),
        singleton: false,
        wrapper: false,
        fields,
        span: None,
    })
}

pub fn variant(name: &str, ty: Ty) -> VariantShape {
    VariantShape {
        name: name.to_string(),
        ty: Ok(ty),
        span: None,
    }
}

pub fn pinned_variant(name: &str, param: &str, required: Ty, found: Ty) -> VariantShape {
    VariantShape {
        name: name.to_string(),
        ty: Err(BoundMismatch {
            param: param.to_string(),
            required,
            found,
        }),
        span: None,
    }
}

/// `Tree<T> = Leaf(value: T) | Branch(left: Tree<T>, right: Tree<T>)`.
pub fn tree_table() -> TypeTable {
    TypeTable::new()
        .with("Tree", |args| {
            Shape::Sum(SumShape {
                name: "Tree".to_string(),
                variants: vec![
                    variant("Leaf", Ty::app("Leaf", args.to_vec())),
                    variant("Branch", Ty::app("Branch", args.to_vec())),
                ],
                span: None,
            })
        })
        .with("Leaf", |args| product("Leaf", vec![field("value", args[0].clone())]))
        .with("Branch", |args| {
            let tree = Ty::app("Tree", args.to_vec());
            product("Branch", vec![field("left", tree.clone()), field("right", tree)])
        })
}

// ── Show ───────────────────────────────────────────────────────────────

pub type ShowFn = Rc<dyn Fn(&Value) -> String>;

pub fn show_typeclass() -> Typeclass<ShowFn> {
    Typeclass::new("Show")
        .with_combine(|case_class: CaseClass<ShowFn>| {
            Rc::new(move |value: &Value| {
                let fields: Vec<String> = case_class
                    .params()
                    .iter()
                    .map(|p| {
                        let show = p.typeclass();
                        let shown = match p.dereference(value) {
                            Value::List(items) if p.is_variadic() => {
                                let items: Vec<String> = items.iter().map(|i| show(i)).collect();
                                format!("[{}]", items.join(","))
                            }
                            field => show(&field),
                        };
                        format!("{}={}", p.label(), shown)
                    })
                    .collect();
                format!("{}({})", case_class.type_name(), fields.join(","))
            }) as ShowFn
        })
        .with_dispatch(|sealed: SealedTrait<ShowFn>| {
            Rc::new(move |value: &Value| {
                sealed
                    .dispatch(value, |subtype, narrowed| (subtype.typeclass())(narrowed))
                    .unwrap_or_else(|| format!("<not a {}>", sealed.type_name()))
            }) as ShowFn
        })
}

pub fn show_registry() -> InstanceRegistry<ShowFn> {
    let mut registry = InstanceRegistry::new("Show");
    registry
        .insert(Ty::string(), Rc::new(|v: &Value| match v {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }) as ShowFn)
        .unwrap();
    registry
        .insert(Ty::int(), Rc::new(|v: &Value| v.to_string()) as ShowFn)
        .unwrap();
    registry
        .register(
            InstanceRule::new(Ty::list(Ty::con("T")), |deps: &[Binding<ShowFn>]| {
                let item = deps[0].clone();
                Rc::new(move |v: &Value| match v {
                    Value::List(items) => {
                        let shown: Vec<String> = items.iter().map(|i| (item.get())(i)).collect();
                        format!("[{}]", shown.join(","))
                    }
                    other => other.to_string(),
                }) as ShowFn
            })
            .requires(vec![Ty::con("T")]),
        )
        .unwrap();
    registry
}

// ── Default ────────────────────────────────────────────────────────────

pub type DefaultFn = Rc<dyn Fn() -> Value>;

pub fn default_typeclass() -> Typeclass<DefaultFn> {
    Typeclass::new("Default")
        .with_combine(|case_class: CaseClass<DefaultFn>| {
            Rc::new(move || {
                case_class.construct(|p| match p.default() {
                    Some(default) => default.evaluate(),
                    None => (p.typeclass())(),
                })
            }) as DefaultFn
        })
        .with_dispatch(|sealed: SealedTrait<DefaultFn>| {
            Rc::new(move || match sealed.subtypes().first() {
                Some(first) => (first.typeclass())(),
                None => Value::Unit,
            }) as DefaultFn
        })
}

pub fn default_registry() -> InstanceRegistry<DefaultFn> {
    let mut registry = InstanceRegistry::new("Default");
    registry
        .insert(Ty::string(), Rc::new(|| Value::str("")) as DefaultFn)
        .unwrap();
    registry
        .insert(Ty::int(), Rc::new(|| Value::Int(0)) as DefaultFn)
        .unwrap();
    registry
}

pub fn with_default(mut field: FieldShape, value: Value) -> FieldShape {
    field.default = Some(DefaultValue::constant(value));
    field
}

// ── Layout ─────────────────────────────────────────────────────────────

/// Renders each product as its fields' binding names, to observe sharing.
pub fn layout_typeclass() -> Typeclass<String> {
    Typeclass::new("Layout")
        .with_combine(|case_class: CaseClass<String>| {
            let fields: Vec<String> = case_class
                .params()
                .iter()
                .map(|p| format!("{}:{}", p.label(), p.binding().name()))
                .collect();
            format!("{}{{{}}}", case_class.type_name(), fields.join(","))
        })
        .with_dispatch(|sealed: SealedTrait<String>| {
            let names: Vec<&str> = sealed.subtypes().iter().map(|s| s.type_name()).collect();
            names.join("|")
        })
}
