//! Name resolution and validation from syntax tree to [`Schema`].

use rustc_hash::FxHashMap;
use weave_common::Span;
use weave_derive::{Hook, Ty, Value};

use crate::ast::{Decl, FieldDecl, Literal, Name, ProductKind, SourceFile, TypeRef, VariantDecl};
use crate::error::SchemaError;
use crate::schema::{CapabilityDecl, DeriveDecl, InstanceDecl, Schema};
use crate::universe::{FieldDef, TypeDef, TypeKind, VariantDef};

pub fn lower(file: &SourceFile) -> Result<Schema, SchemaError> {
    let mut lowerer = Lowerer::default();
    lowerer.declare_names(file)?;

    let mut schema = Schema::default();
    for decl in &file.decls {
        match decl {
            Decl::Opaque { name, params, .. } => schema.universe.insert(TypeDef {
                name: name.text.clone(),
                params: texts(params),
                kind: TypeKind::Opaque,
                span: name.span,
            }),
            Decl::Object { name, .. } => schema.universe.insert(TypeDef {
                name: name.text.clone(),
                params: Vec::new(),
                kind: TypeKind::Object,
                span: name.span,
            }),
            Decl::Product {
                kind,
                name,
                params,
                fields,
                ..
            } => {
                if *kind == ProductKind::Newtype && fields.len() != 1 {
                    return Err(SchemaError::NewtypeFieldCount {
                        name: name.text.clone(),
                        found: fields.len(),
                        span: name.span,
                    });
                }
                let fields = lowerer.fields(fields, params)?;
                schema.universe.insert(TypeDef {
                    name: name.text.clone(),
                    params: texts(params),
                    kind: TypeKind::Product {
                        wrapper: *kind == ProductKind::Newtype,
                        fields,
                    },
                    span: name.span,
                });
            }
            Decl::Enum {
                name,
                params,
                variants,
                ..
            } => {
                let variants = variants
                    .iter()
                    .map(|v| lowerer.variant(v, name, params))
                    .collect::<Result<Vec<_>, _>>()?;
                schema.universe.insert(TypeDef {
                    name: name.text.clone(),
                    params: texts(params),
                    kind: TypeKind::Sum { variants },
                    span: name.span,
                });
            }
            Decl::Capability { name, hooks, span } => {
                let mut lowered = Vec::new();
                for hook in hooks {
                    let hook = match hook.text.as_str() {
                        "combine" => Hook::Combine,
                        "dispatch" => Hook::Dispatch,
                        _ => {
                            return Err(SchemaError::UnknownHook {
                                name: hook.text.clone(),
                                span: hook.span,
                            })
                        }
                    };
                    if !lowered.contains(&hook) {
                        lowered.push(hook);
                    }
                }
                schema.capabilities.push(CapabilityDecl {
                    name: name.text.clone(),
                    hooks: lowered,
                    span: *span,
                });
            }
            Decl::Instance {
                capability,
                ty,
                requires,
                span,
            } => {
                lowerer.check_capability(capability)?;
                schema.instances.push(InstanceDecl {
                    capability: capability.text.clone(),
                    pattern: lowerer.ty(ty, &[])?,
                    requires: requires
                        .iter()
                        .map(|r| lowerer.ty(r, &[]))
                        .collect::<Result<_, _>>()?,
                    span: *span,
                });
            }
            Decl::Derive {
                capability,
                ty,
                span,
            } => {
                lowerer.check_capability(capability)?;
                schema.derives.push(DeriveDecl {
                    capability: capability.text.clone(),
                    ty: lowerer.ty(ty, &[])?,
                    span: *span,
                });
            }
        }
    }
    Ok(schema)
}

#[derive(Default)]
struct Lowerer {
    /// Type and variant names to (arity, declaring span).
    arities: FxHashMap<String, (usize, Span)>,
    capabilities: FxHashMap<String, Span>,
}

impl Lowerer {
    /// First pass: every type, variant and capability name, so references
    /// may point forward.
    fn declare_names(&mut self, file: &SourceFile) -> Result<(), SchemaError> {
        for decl in &file.decls {
            match decl {
                Decl::Opaque { name, params, .. }
                | Decl::Product { name, params, .. } => self.declare_type(name, params.len())?,
                Decl::Object { name, .. } => self.declare_type(name, 0)?,
                Decl::Enum {
                    name,
                    params,
                    variants,
                    ..
                } => {
                    self.declare_type(name, params.len())?;
                    for variant in variants {
                        self.declare_type(&variant.name, params.len())?;
                    }
                }
                Decl::Capability { name, .. } => {
                    if let Some(previous) = self.capabilities.insert(name.text.clone(), name.span) {
                        return Err(SchemaError::DuplicateName {
                            name: name.text.clone(),
                            span: name.span,
                            previous,
                        });
                    }
                }
                Decl::Instance { .. } | Decl::Derive { .. } => {}
            }
        }
        Ok(())
    }

    fn declare_type(&mut self, name: &Name, arity: usize) -> Result<(), SchemaError> {
        match self.arities.get(&name.text) {
            Some(&(_, previous)) => Err(SchemaError::DuplicateName {
                name: name.text.clone(),
                span: name.span,
                previous,
            }),
            None => {
                self.arities.insert(name.text.clone(), (arity, name.span));
                Ok(())
            }
        }
    }

    fn check_capability(&self, name: &Name) -> Result<(), SchemaError> {
        if self.capabilities.contains_key(&name.text) {
            Ok(())
        } else {
            Err(SchemaError::UnknownCapability {
                name: name.text.clone(),
                span: name.span,
            })
        }
    }

    /// Lower a written type. Names in `params` stay as parameters; names
    /// declared nowhere are kept and later describe as opaque.
    fn ty(&self, ty: &TypeRef, params: &[Name]) -> Result<Ty, SchemaError> {
        let name = &ty.name.text;
        let expected = if params.iter().any(|p| &p.text == name) {
            Some(0)
        } else {
            self.arities.get(name).map(|&(arity, _)| arity)
        };
        if let Some(expected) = expected {
            if expected != ty.args.len() {
                return Err(SchemaError::WrongArity {
                    name: name.clone(),
                    expected,
                    found: ty.args.len(),
                    span: ty.span,
                });
            }
        }
        let args = ty
            .args
            .iter()
            .map(|a| self.ty(a, params))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Ty::app(name.clone(), args))
    }

    fn fields(&self, fields: &[FieldDecl], params: &[Name]) -> Result<Vec<FieldDef>, SchemaError> {
        let last = fields.len().saturating_sub(1);
        fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                if field.variadic && index != last {
                    return Err(SchemaError::VariadicNotLast {
                        field: field.name.text.clone(),
                        span: field.span,
                    });
                }
                let ty = self.ty(&field.ty, params)?;
                Ok(FieldDef {
                    name: field.name.text.clone(),
                    ty,
                    variadic: field.variadic,
                    default: field.default.as_ref().map(literal_value),
                    span: field.span,
                })
            })
            .collect()
    }

    fn variant(
        &self,
        variant: &VariantDecl,
        owner: &Name,
        params: &[Name],
    ) -> Result<VariantDef, SchemaError> {
        let fields = match &variant.fields {
            Some(fields) => Some(self.fields(fields, params)?),
            None => None,
        };
        let pinned = match &variant.pinned {
            Some(pinned) => {
                if pinned.name.text != owner.text {
                    return Err(SchemaError::BadPin {
                        variant: variant.name.text.clone(),
                        expected: owner.text.clone(),
                        found: pinned.name.text.clone(),
                        span: pinned.span,
                    });
                }
                Some(self.ty(pinned, params)?)
            }
            None => None,
        };
        Ok(VariantDef {
            name: variant.name.text.clone(),
            fields,
            pinned,
            span: variant.span,
        })
    }
}

fn texts(names: &[Name]) -> Vec<String> {
    names.iter().map(|n| n.text.clone()).collect()
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::str(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::EmptyList => Value::List(Vec::new()),
    }
}
