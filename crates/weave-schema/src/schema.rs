use std::rc::Rc;

use tracing::debug;
use weave_common::Span;
use weave_derive::{Binding, Hook, InstanceRegistry, InstanceRule, RegistryError, Ty};

use crate::error::SchemaError;
use crate::universe::Universe;

/// A lowered schema: the types, plus what to do with them.
#[derive(Debug, Default)]
pub struct Schema {
    pub universe: Universe,
    pub capabilities: Vec<CapabilityDecl>,
    pub instances: Vec<InstanceDecl>,
    pub derives: Vec<DeriveDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDecl {
    pub name: String,
    pub hooks: Vec<Hook>,
    pub span: Span,
}

impl CapabilityDecl {
    pub fn has(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }
}

/// `instance Show for List<T> requires T`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDecl {
    pub capability: String,
    pub pattern: Ty,
    pub requires: Vec<Ty>,
    pub span: Span,
}

/// `derive Show for Tree<String>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveDecl {
    pub capability: String,
    pub ty: Ty,
    pub span: Span,
}

impl Schema {
    pub fn capability(&self, name: &str) -> Option<&CapabilityDecl> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    /// Registry of every `instance` declared for `capability`. `build` makes
    /// the instance for a declaration from its requirements' instances.
    pub fn registry_for<I: 'static>(
        &self,
        capability: &str,
        build: impl Fn(&InstanceDecl, &[Binding<I>]) -> I + 'static,
    ) -> Result<InstanceRegistry<I>, SchemaError> {
        let build = Rc::new(build);
        let mut registry = InstanceRegistry::new(capability);
        for decl in self.instances.iter().filter(|d| d.capability == capability) {
            let build = Rc::clone(&build);
            let owned = decl.clone();
            let rule = InstanceRule::new(decl.pattern.clone(), move |deps| build(&owned, deps))
                .with_params(self.instance_params(&decl.pattern))
                .requires(decl.requires.clone());
            registry.register(rule).map_err(|err| match err {
                RegistryError::Overlapping { new, existing } => SchemaError::OverlappingInstance {
                    capability: capability.to_string(),
                    new,
                    existing,
                    span: decl.span,
                },
                RegistryError::NoHead(ty) => SchemaError::Expected {
                    expected: "a named type".to_string(),
                    found: ty,
                    span: decl.span,
                },
            })?;
        }
        debug!(capability, rules = registry.len(), "instance registry built");
        Ok(registry)
    }

    /// Type parameters of an instance pattern: single uppercase letters the
    /// schema does not declare as a type or variant.
    fn instance_params(&self, pattern: &Ty) -> Vec<String> {
        let mut params = Vec::new();
        self.collect_params(pattern, &mut params);
        params
    }

    fn collect_params(&self, ty: &Ty, params: &mut Vec<String>) {
        match ty {
            Ty::Con(con) => {
                let name = &con.name;
                let letter = name.len() == 1 && name.as_bytes()[0].is_ascii_uppercase();
                let declared = self.universe.get(name).is_some() || self.universe.variant(name).is_some();
                if letter && !declared && !params.contains(name) {
                    params.push(name.clone());
                }
            }
            Ty::App(con, args) => {
                self.collect_params(con, params);
                for arg in args {
                    self.collect_params(arg, params);
                }
            }
            Ty::Var(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use weave_derive::InstanceSource;

    use super::*;
    use crate::parse;

    fn registry(source: &str) -> InstanceRegistry<usize> {
        let schema = parse(source).unwrap();
        schema.registry_for("Show", |_, deps| deps.len()).unwrap()
    }

    #[test]
    fn declared_single_letter_type_is_not_a_parameter() {
        let registry = registry(
            "opaque Int\nobject X\nstruct Pair<L, R> { left: L, right: R }\n\
             capability Show(combine)\ninstance Show for Pair<X, Int>\n",
        );
        let pair = |left: &str| Ty::app("Pair", vec![Ty::con(left), Ty::int()]);
        assert!(registry.lookup_direct(&pair("X")).is_some());
        assert!(registry.lookup_direct(&pair("Int")).is_none());
    }

    #[test]
    fn undeclared_single_letter_is_a_parameter() {
        let registry = registry(
            "opaque Int\nobject X\nopaque Box<A>\ncapability Show(combine)\n\
             instance Show for Box<T> requires X, T\n",
        );
        let hit = registry.lookup_direct(&Ty::app("Box", vec![Ty::int()])).unwrap();
        assert_eq!(hit.requires, vec![Ty::con("X"), Ty::int()]);
    }
}
