//! Externally provided capability instances.
//!
//! Before deriving a type structurally the engine asks an [`InstanceSource`]
//! for an existing instance. A hit always wins, even for types that could be
//! derived. An instance may itself require instances for other types (a
//! `Show<List<T>>` needs a `Show<T>`); those requirements are resolved by the
//! engine as chained capabilities.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::knot::Binding;
use crate::ty::Ty;
use crate::unify::{freshen, freshen_with, InferCtx, TypeParams};

type BuildFn<I> = dyn Fn(&[Binding<I>]) -> I;

/// Lookup of pre-existing instances for one capability.
pub trait InstanceSource<I> {
    /// An instance for exactly `ty`, if one exists.
    fn lookup_direct(&self, ty: &Ty) -> Option<DirectInstance<I>>;
}

/// A registry hit, not yet built.
pub struct DirectInstance<I> {
    /// Human-readable origin, e.g. `Show<List<T>>`.
    pub origin: String,
    /// Concrete types whose instances must be resolved first, in the order
    /// the builder expects them.
    pub requires: Vec<Ty>,
    build: Rc<BuildFn<I>>,
}

impl<I> DirectInstance<I> {
    pub fn new(
        origin: impl Into<String>,
        requires: Vec<Ty>,
        build: impl Fn(&[Binding<I>]) -> I + 'static,
    ) -> Self {
        DirectInstance {
            origin: origin.into(),
            requires,
            build: Rc::new(build),
        }
    }

    /// Build the instance from resolved requirement bindings.
    pub fn build(&self, deps: &[Binding<I>]) -> I {
        (self.build)(deps)
    }
}

impl<I> fmt::Debug for DirectInstance<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectInstance")
            .field("origin", &self.origin)
            .field("requires", &self.requires)
            .finish()
    }
}

/// A source with no instances at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInstances;

impl<I> InstanceSource<I> for NoInstances {
    fn lookup_direct(&self, _ty: &Ty) -> Option<DirectInstance<I>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("instance for `{new}` overlaps the instance already registered for `{existing}`")]
    Overlapping { new: String, existing: String },
    #[error("instance pattern `{0}` has no head constructor")]
    NoHead(String),
}

/// A registered instance rule: `pattern` with type parameters, the
/// requirements it needs (in terms of those parameters), and a builder.
pub struct InstanceRule<I> {
    pattern: Ty,
    params: Vec<String>,
    exact: bool,
    requires: Vec<Ty>,
    build: Rc<BuildFn<I>>,
}

impl<I> InstanceRule<I> {
    /// A rule for a concrete type with no requirements.
    pub fn new(pattern: Ty, build: impl Fn(&[Binding<I>]) -> I + 'static) -> Self {
        InstanceRule {
            pattern,
            params: Vec::new(),
            exact: false,
            requires: Vec::new(),
            build: Rc::new(build),
        }
    }

    /// Treat exactly these names as type parameters. Without this, any
    /// single uppercase letter in the pattern is one.
    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self.exact = true;
        self
    }

    /// Requirement types, e.g. `T` for `Show<List<T>>`.
    pub fn requires(mut self, requires: Vec<Ty>) -> Self {
        self.requires = requires;
        self
    }

    pub fn pattern(&self) -> &Ty {
        &self.pattern
    }

    fn type_params(&self) -> TypeParams<'_> {
        if self.exact {
            TypeParams::Exact(&self.params)
        } else {
            TypeParams::Implicit(&self.params)
        }
    }
}

/// The stock [`InstanceSource`]: rules keyed by head constructor, matched
/// structurally by temporary unification.
pub struct InstanceRegistry<I> {
    capability: String,
    rules: FxHashMap<String, Vec<InstanceRule<I>>>,
}

impl<I> InstanceRegistry<I> {
    pub fn new(capability: impl Into<String>) -> Self {
        InstanceRegistry {
            capability: capability.into(),
            rules: FxHashMap::default(),
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a rule. Two rules whose patterns unify would make lookup
    /// ambiguous, so the second is rejected.
    pub fn register(&mut self, rule: InstanceRule<I>) -> Result<(), RegistryError> {
        let head = match rule.pattern.head() {
            Some((name, _)) => name.to_string(),
            None => return Err(RegistryError::NoHead(rule.pattern.to_string())),
        };
        let existing = self.rules.entry(head).or_default();
        for other in existing.iter() {
            let mut ctx = InferCtx::new();
            let (a, _) = freshen(&other.pattern, other.type_params(), &mut ctx);
            let (b, _) = freshen(&rule.pattern, rule.type_params(), &mut ctx);
            if ctx.unify(a, b).is_ok() {
                return Err(RegistryError::Overlapping {
                    new: rule.pattern.to_string(),
                    existing: other.pattern.to_string(),
                });
            }
        }
        existing.push(rule);
        Ok(())
    }

    /// Convenience for a concrete, requirement-free instance.
    pub fn insert(&mut self, ty: Ty, instance: I) -> Result<(), RegistryError>
    where
        I: Clone + 'static,
    {
        self.register(InstanceRule::new(ty, move |_| instance.clone()))
    }
}

impl<I> InstanceSource<I> for InstanceRegistry<I> {
    fn lookup_direct(&self, ty: &Ty) -> Option<DirectInstance<I>> {
        let (head, _) = ty.head()?;
        for rule in self.rules.get(head)? {
            let mut ctx = InferCtx::new();
            let mut map = FxHashMap::default();
            let pattern = freshen_with(&rule.pattern, rule.type_params(), &mut ctx, &mut map);
            if ctx.unify(pattern, ty.clone()).is_err() {
                continue;
            }
            let requires: Vec<Ty> = rule
                .requires
                .iter()
                .map(|r| {
                    let fresh = freshen_with(r, rule.type_params(), &mut ctx, &mut map);
                    ctx.resolve(fresh)
                })
                .collect();
            if requires.iter().any(|r| !r.is_concrete()) {
                // A requirement mentions a parameter the pattern never binds.
                continue;
            }
            return Some(DirectInstance {
                origin: format!("{}<{}>", self.capability, rule.pattern),
                requires,
                build: Rc::clone(&rule.build),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_rule() -> InstanceRule<String> {
        InstanceRule::new(Ty::list(Ty::con("T")), |deps| format!("list of {}", deps.len()))
            .requires(vec![Ty::con("T")])
    }

    #[test]
    fn concrete_lookup() {
        let mut registry = InstanceRegistry::new("Show");
        registry.insert(Ty::int(), "int".to_string()).unwrap();

        let hit = registry.lookup_direct(&Ty::int()).unwrap();
        assert!(hit.requires.is_empty());
        assert_eq!(hit.build(&[]), "int");
        assert_eq!(hit.origin, "Show<Int>");
        assert!(registry.lookup_direct(&Ty::string()).is_none());
    }

    #[test]
    fn generic_rule_resolves_requirements() {
        let mut registry = InstanceRegistry::new("Show");
        registry.register(list_rule()).unwrap();

        let hit = registry.lookup_direct(&Ty::list(Ty::con("Node"))).unwrap();
        assert_eq!(hit.requires, vec![Ty::con("Node")]);
        assert_eq!(hit.origin, "Show<List<T>>");

        let nested = registry.lookup_direct(&Ty::list(Ty::list(Ty::int()))).unwrap();
        assert_eq!(nested.requires, vec![Ty::list(Ty::int())]);
    }

    #[test]
    fn no_false_positive_on_other_constructor() {
        let mut registry = InstanceRegistry::new("Show");
        registry.register(list_rule()).unwrap();
        assert!(registry.lookup_direct(&Ty::app("Set", vec![Ty::int()])).is_none());
        assert!(registry.lookup_direct(&Ty::con("List")).is_none());
    }

    #[test]
    fn overlapping_rules_rejected() {
        let mut registry = InstanceRegistry::new("Show");
        registry.register(list_rule()).unwrap();
        let err = registry
            .insert(Ty::list(Ty::int()), "ints".to_string())
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Overlapping {
                new: "List<Int>".to_string(),
                existing: "List<T>".to_string(),
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_concrete_rules_coexist() {
        let mut registry = InstanceRegistry::new("Eq");
        registry.insert(Ty::int(), 1u8).unwrap();
        registry.insert(Ty::string(), 2u8).unwrap();
        registry.insert(Ty::bool(), 3u8).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.lookup_direct(&Ty::string()).unwrap().build(&[]), 2);
    }

    #[test]
    fn exact_params_make_single_letters_concrete() {
        let mut registry: InstanceRegistry<u8> = InstanceRegistry::new("Show");
        let pair = Ty::app("Pair", vec![Ty::con("X"), Ty::con("T")]);
        registry
            .register(
                InstanceRule::new(pair, |deps| deps.len() as u8)
                    .with_params(vec!["T".to_string()])
                    .requires(vec![Ty::con("T")]),
            )
            .unwrap();

        let hit = registry
            .lookup_direct(&Ty::app("Pair", vec![Ty::con("X"), Ty::int()]))
            .unwrap();
        assert_eq!(hit.requires, vec![Ty::int()]);
        assert!(registry
            .lookup_direct(&Ty::app("Pair", vec![Ty::int(), Ty::int()]))
            .is_none());
    }

    #[test]
    fn unbound_requirement_is_skipped() {
        let mut registry: InstanceRegistry<u8> = InstanceRegistry::new("Show");
        registry
            .register(InstanceRule::new(Ty::int(), |_| 0).requires(vec![Ty::con("U")]))
            .unwrap();
        assert!(registry.lookup_direct(&Ty::int()).is_none());
    }
}
