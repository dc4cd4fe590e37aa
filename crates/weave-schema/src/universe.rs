//! The declared types of a schema, described on demand for the engine.

use rustc_hash::FxHashMap;
use tracing::trace;
use weave_common::Span;
use weave_derive::shape::{
    BoundMismatch, DefaultValue, Describe, FieldShape, ProductShape, Shape, SumShape, VariantShape,
};
use weave_derive::unify::{freshen_with, InferCtx, TypeParams};
use weave_derive::{Ty, Value};

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub params: Vec<String>,
    pub kind: TypeKind,
    /// Span of the declared name.
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Opaque,
    Product { wrapper: bool, fields: Vec<FieldDef> },
    Object,
    Sum { variants: Vec<VariantDef> },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    /// Mentions the owner's parameters as `Con` types. For a variadic field
    /// this is the element type.
    pub ty: Ty,
    pub variadic: bool,
    pub default: Option<Value>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: String,
    /// `None` for a singleton variant.
    pub fields: Option<Vec<FieldDef>>,
    /// The enum application this variant is restricted to.
    pub pinned: Option<Ty>,
    pub span: Span,
}

/// Every type and variant declared in a schema.
///
/// Variants are addressable types in their own right: `Leaf<String>` is the
/// `Leaf` variant of `Tree<String>`, taking the enum's type arguments.
#[derive(Debug, Default)]
pub struct Universe {
    types: FxHashMap<String, TypeDef>,
    /// Variant name to (enum name, variant index).
    variants: FxHashMap<String, (String, usize)>,
}

impl Universe {
    pub(crate) fn insert(&mut self, def: TypeDef) {
        if let TypeKind::Sum { variants } = &def.kind {
            for (index, variant) in variants.iter().enumerate() {
                self.variants
                    .insert(variant.name.clone(), (def.name.clone(), index));
            }
        }
        self.types.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// The enum declaring variant `name`, and the variant.
    pub fn variant(&self, name: &str) -> Option<(&TypeDef, &VariantDef)> {
        let (owner, index) = self.variants.get(name)?;
        let def = self.types.get(owner)?;
        match &def.kind {
            TypeKind::Sum { variants } => Some((def, variants.get(*index)?)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn describe_def(&self, def: &TypeDef, args: &[Ty]) -> Shape {
        match &def.kind {
            TypeKind::Opaque => Shape::Opaque,
            TypeKind::Object => Shape::Product(ProductShape {
                name: def.name.clone(),
                singleton: true,
                wrapper: false,
                fields: Vec::new(),
                span: Some(def.span),
            }),
            TypeKind::Product { wrapper, fields } => Shape::Product(ProductShape {
                name: def.name.clone(),
                singleton: false,
                wrapper: *wrapper,
                fields: fields
                    .iter()
                    .map(|f| field_shape(f, &def.params, args))
                    .collect(),
                span: Some(def.span),
            }),
            TypeKind::Sum { variants } => Shape::Sum(SumShape {
                name: def.name.clone(),
                variants: variants
                    .iter()
                    .map(|v| VariantShape {
                        name: v.name.clone(),
                        ty: variant_ty(def, v, args),
                        span: Some(v.span),
                    })
                    .collect(),
                span: Some(def.span),
            }),
        }
    }

    fn describe_variant(&self, owner: &TypeDef, variant: &VariantDef, args: &[Ty]) -> Shape {
        let fields = match &variant.fields {
            None => {
                return Shape::Product(ProductShape {
                    name: variant.name.clone(),
                    singleton: true,
                    wrapper: false,
                    fields: Vec::new(),
                    span: Some(variant.span),
                })
            }
            Some(fields) => fields,
        };
        Shape::Product(ProductShape {
            name: variant.name.clone(),
            singleton: false,
            wrapper: false,
            fields: fields
                .iter()
                .map(|f| field_shape(f, &owner.params, args))
                .collect(),
            span: Some(variant.span),
        })
    }
}

impl Describe for Universe {
    fn describe(&self, ty: &Ty) -> Shape {
        let Some((name, args)) = ty.head() else {
            return Shape::Opaque;
        };
        if let Some(def) = self.types.get(name) {
            if def.params.len() != args.len() {
                trace!(ty = %ty, expected = def.params.len(), "arity mismatch, opaque");
                return Shape::Opaque;
            }
            return self.describe_def(def, args);
        }
        if let Some((owner, variant)) = self.variant(name) {
            if owner.params.len() != args.len() {
                return Shape::Opaque;
            }
            return self.describe_variant(owner, variant, args);
        }
        trace!(ty = %ty, "undeclared, opaque");
        Shape::Opaque
    }
}

fn field_shape(field: &FieldDef, params: &[String], args: &[Ty]) -> FieldShape {
    FieldShape {
        name: field.name.clone(),
        ty: substitute(&field.ty, params, args),
        variadic: field.variadic,
        default: field.default.clone().map(DefaultValue::constant),
        span: Some(field.span),
    }
}

/// The type of `variant` when its enum is applied to `args`, or the first
/// parameter its pin rules out.
fn variant_ty(owner: &TypeDef, variant: &VariantDef, args: &[Ty]) -> Result<Ty, BoundMismatch> {
    if let Some((_, pinned)) = variant.pinned.as_ref().and_then(Ty::head) {
        let mut ctx = InferCtx::new();
        let mut fresh = FxHashMap::default();
        for ((param, required), found) in owner.params.iter().zip(pinned).zip(args) {
            let pattern = freshen_with(required, TypeParams::Exact(&owner.params), &mut ctx, &mut fresh);
            if ctx.unify(pattern, found.clone()).is_err() {
                return Err(BoundMismatch {
                    param: param.clone(),
                    required: required.clone(),
                    found: found.clone(),
                });
            }
        }
    }
    Ok(Ty::app(variant.name.clone(), args.to_vec()))
}

/// Replace each parameter in `ty` with the matching argument.
pub fn substitute(ty: &Ty, params: &[String], args: &[Ty]) -> Ty {
    match ty {
        Ty::Con(con) => params
            .iter()
            .position(|p| *p == con.name)
            .and_then(|i| args.get(i).cloned())
            .unwrap_or_else(|| ty.clone()),
        Ty::App(head, head_args) => Ty::App(
            Box::new(substitute(head, params, args)),
            head_args.iter().map(|a| substitute(a, params, args)).collect(),
        ),
        Ty::Var(_) => ty.clone(),
    }
}
