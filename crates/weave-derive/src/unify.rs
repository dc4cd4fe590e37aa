//! Structural unification over [`Ty`], backed by `ena`'s union-find table.
//!
//! The derivation engine never infers types. Unification is used for two
//! matching problems: deciding whether an instance registry pattern such as
//! `List<T>` applies to a concrete type, and checking whether a sum variant
//! pinned to `Expr<Int>` is compatible with a requested `Expr<String>`.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::ty::{Ty, TyVar};

/// Why two types failed to unify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// Different constructors (or a constructor against an application).
    Types { expected: Ty, found: Ty },
    /// Same constructor, different number of arguments.
    Arity { expected: usize, found: usize },
    /// Binding the variable would create an infinite type.
    Occurs { var: TyVar, ty: Ty },
}

/// A throwaway unification context.
///
/// Each match attempt gets its own context so that a failed attempt leaves
/// no bindings behind.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
        }
    }

    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.table.new_key(None))
    }

    /// Resolve a type by following union-find indirection, recursively.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            Ty::App(con, args) => {
                let con = Box::new(self.resolve(*con));
                let args = args.into_iter().map(|a| self.resolve(a)).collect();
                Ty::App(con, args)
            }
            other => other,
        }
    }

    fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if *v == var || self.table.find(*v) == self.table.find(var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Con(_) => false,
            Ty::App(con, args) => {
                self.occurs_in(var, con) || args.iter().any(|a| self.occurs_in(var, a))
            }
        }
    }

    /// Unify two types, binding variables on either side.
    pub fn unify(&mut self, a: Ty, b: Ty) -> Result<(), Mismatch> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) => {
                // Both unbound after resolve, so union cannot conflict.
                let _ = self.table.unify_var_var(v1, v2);
                Ok(())
            }

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    return Err(Mismatch::Occurs { var: v, ty });
                }
                let _ = self.table.unify_var_value(v, Some(ty));
                Ok(())
            }

            (Ty::Con(c1), Ty::Con(c2)) => {
                if c1 == c2 {
                    Ok(())
                } else {
                    Err(Mismatch::Types {
                        expected: Ty::Con(c1),
                        found: Ty::Con(c2),
                    })
                }
            }

            // `Point` and `Point<>` are the same type.
            (Ty::Con(ref c), Ty::App(ref con, ref args))
            | (Ty::App(ref con, ref args), Ty::Con(ref c))
                if args.is_empty() && matches!(con.as_ref(), Ty::Con(ac) if ac == c) =>
            {
                Ok(())
            }

            (Ty::App(c1, a1), Ty::App(c2, a2)) => {
                self.unify(*c1, *c2)?;
                if a1.len() != a2.len() {
                    return Err(Mismatch::Arity {
                        expected: a1.len(),
                        found: a2.len(),
                    });
                }
                for (a, b) in a1.into_iter().zip(a2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }

            (expected, found) => Err(Mismatch::Types { expected, found }),
        }
    }
}

/// Which names in a type count as type parameters.
#[derive(Clone, Copy, Debug)]
pub enum TypeParams<'a> {
    /// The listed names, plus any single uppercase ASCII letter.
    Implicit(&'a [String]),
    /// Only the listed names.
    Exact(&'a [String]),
}

impl TypeParams<'static> {
    /// No listed names; single letters are still parameters.
    pub const IMPLICIT: TypeParams<'static> = TypeParams::Implicit(&[]);
}

/// Whether `name` is a type parameter under `params`.
pub fn is_type_param(name: &str, params: TypeParams<'_>) -> bool {
    match params {
        TypeParams::Implicit(listed) => {
            (name.len() == 1 && name.as_bytes()[0].is_ascii_uppercase())
                || listed.iter().any(|p| p == name)
        }
        TypeParams::Exact(listed) => listed.iter().any(|p| p == name),
    }
}

/// Replace type parameters in `ty` with fresh variables.
///
/// The returned map lets callers resolve a parameter after unification
/// (e.g. to learn what `T` was bound to).
pub fn freshen(ty: &Ty, params: TypeParams<'_>, ctx: &mut InferCtx) -> (Ty, FxHashMap<String, Ty>) {
    let mut map = FxHashMap::default();
    let fresh = freshen_with(ty, params, ctx, &mut map);
    (fresh, map)
}

/// Like [`freshen`], reusing (and extending) an existing parameter map so
/// several types can share the same variables.
pub fn freshen_with(
    ty: &Ty,
    params: TypeParams<'_>,
    ctx: &mut InferCtx,
    map: &mut FxHashMap<String, Ty>,
) -> Ty {
    match ty {
        Ty::Con(c) if is_type_param(&c.name, params) => map
            .entry(c.name.clone())
            .or_insert_with(|| ctx.fresh_var())
            .clone(),
        Ty::App(con, args) => Ty::App(
            Box::new(freshen_with(con, params, ctx, map)),
            args.iter().map(|a| freshen_with(a, params, ctx, map)).collect(),
        ),
        _ => ty.clone(),
    }
}
