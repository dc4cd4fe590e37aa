//! Type representation for derivation requests.
//!
//! A [`Ty`] is the concrete, comparable identity of a type: it keys the
//! derivation stack and the resolution cache, and it is what the type
//! descriptor provider and the instance registry are asked about.

use std::fmt;

/// A type variable, identified by a `u32` index into the unification table.
///
/// Variables only appear while matching registry patterns; a derivation
/// request is always made for a fully concrete type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// A named type constructor such as `Int`, `List` or `Tree`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyCon {
    pub name: String,
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into() }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A type.
///
/// - `Var`: a pattern variable (registry matching only)
/// - `Con`: a nullary constructor (`Int`, `Person`)
/// - `App`: a constructor applied to arguments (`List<Node>`, `Tree<String>`)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Var(TyVar),
    Con(TyCon),
    App(Box<Ty>, Vec<Ty>),
}

impl Ty {
    /// A nullary constructor.
    pub fn con(name: impl Into<String>) -> Ty {
        Ty::Con(TyCon::new(name))
    }

    /// `name<args..>`, collapsing to [`Ty::con`] when there are no arguments
    /// so that `Point` and `Point<>` are the same cache key.
    pub fn app(name: impl Into<String>, args: Vec<Ty>) -> Ty {
        if args.is_empty() {
            Ty::con(name)
        } else {
            Ty::App(Box::new(Ty::con(name)), args)
        }
    }

    pub fn int() -> Ty {
        Ty::con("Int")
    }

    pub fn string() -> Ty {
        Ty::con("String")
    }

    pub fn bool() -> Ty {
        Ty::con("Bool")
    }

    pub fn list(inner: Ty) -> Ty {
        Ty::app("List", vec![inner])
    }

    /// The head constructor name and argument list, or `None` for a variable.
    pub fn head(&self) -> Option<(&str, &[Ty])> {
        match self {
            Ty::Con(c) => Some((c.name.as_str(), &[][..])),
            Ty::App(con, args) => match con.as_ref() {
                Ty::Con(c) => Some((c.name.as_str(), args.as_slice())),
                _ => None,
            },
            Ty::Var(_) => None,
        }
    }

    /// Whether the type contains no variables.
    pub fn is_concrete(&self) -> bool {
        match self {
            Ty::Var(_) => false,
            Ty::Con(_) => true,
            Ty::App(con, args) => con.is_concrete() && args.iter().all(Ty::is_concrete),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Con(c) => write!(f, "{}", c),
            Ty::App(con, args) => {
                write!(f, "{}", con)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}
