//! A record of how one request was resolved, for `--explain` output and tests.

use std::fmt;

use crate::knot::{BindingName, KnotSummary};
use crate::ty::Ty;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// Satisfied by a registry instance.
    Registry { origin: String },
    /// Derived structurally as a product.
    Product { fields: usize },
    Singleton,
    /// Derived structurally as a sum.
    Sum { variants: usize },
    /// Deferred to a binding further up the stack.
    Deferred { binding: BindingName },
    /// Reused from an earlier resolution in the same request.
    Cached,
    /// Could not be resolved.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub ty: Ty,
    pub depth: usize,
    pub kind: StepKind,
}

/// Ordered resolution steps plus counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DerivationReport {
    pub steps: Vec<Step>,
    /// Calls made to the type descriptor provider.
    pub described: usize,
    pub cache_hits: usize,
    pub knots: KnotSummary,
}

impl DerivationReport {
    /// Reserve a step for a type about to be resolved, so steps read
    /// outermost first. Starts as `Failed` until [`finish`](Self::finish).
    pub(crate) fn begin(&mut self, ty: &Ty, depth: usize) -> usize {
        self.push(ty, depth, StepKind::Failed);
        self.steps.len() - 1
    }

    pub(crate) fn finish(&mut self, step: usize, kind: StepKind) {
        if let Some(step) = self.steps.get_mut(step) {
            step.kind = kind;
        }
    }

    pub(crate) fn push(&mut self, ty: &Ty, depth: usize, kind: StepKind) {
        if kind == StepKind::Cached {
            self.cache_hits += 1;
        }
        self.steps.push(Step {
            ty: ty.clone(),
            depth,
            kind,
        });
    }

    /// Steps for one type.
    pub fn steps_for<'a>(&'a self, ty: &'a Ty) -> impl Iterator<Item = &'a Step> + 'a {
        self.steps.iter().filter(move |s| &s.ty == ty)
    }

    /// Number of types derived structurally (products, singletons, sums).
    pub fn derived(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| {
                matches!(
                    s.kind,
                    StepKind::Product { .. } | StepKind::Singleton | StepKind::Sum { .. }
                )
            })
            .count()
    }

    pub fn deferred(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.kind, StepKind::Deferred { .. }))
            .count()
    }
}

impl fmt::Display for DerivationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{:indent$}{}: ", "", step.ty, indent = step.depth * 2)?;
            match &step.kind {
                StepKind::Registry { origin } => writeln!(f, "instance {}", origin)?,
                StepKind::Product { fields } => writeln!(f, "product, {} field(s)", fields)?,
                StepKind::Singleton => writeln!(f, "singleton")?,
                StepKind::Sum { variants } => writeln!(f, "sum, {} variant(s)", variants)?,
                StepKind::Deferred { binding } => writeln!(f, "deferred to {}", binding)?,
                StepKind::Cached => writeln!(f, "cached")?,
                StepKind::Failed => writeln!(f, "unresolved")?,
            }
        }
        Ok(())
    }
}
