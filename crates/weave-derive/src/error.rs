//! Derivation errors and the process-wide set of reported failures.

use std::fmt;
use std::sync::OnceLock;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use thiserror::Error;
use weave_common::Span;

use crate::shape::BoundMismatch;
use crate::stack::TypePath;
use crate::ty::Ty;
use crate::typeclass::Hook;

/// Why a leaf type could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LeafReason {
    /// Opaque type with no registry instance.
    NoInstance,
    /// A sum variant whose bound is incompatible with the requested type.
    IncompatibleBound(BoundMismatch),
}

/// A type that could not be resolved, with the chain of fields and
/// variants that led to it, innermost first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnresolvedLeaf {
    pub capability: String,
    pub ty: Ty,
    pub reason: LeafReason,
    pub path: Vec<TypePath>,
}

impl UnresolvedLeaf {
    /// Span of the innermost segment that has one.
    pub fn primary_span(&self) -> Option<Span> {
        self.path.iter().find_map(TypePath::span)
    }

    /// The headline, without the path.
    pub fn headline(&self) -> String {
        match &self.reason {
            LeafReason::NoInstance => format!(
                "could not derive {} instance for type {}",
                self.capability, self.ty
            ),
            LeafReason::IncompatibleBound(mismatch) => format!(
                "could not derive {} instance for variant {}: {}",
                self.capability, self.ty, mismatch
            ),
        }
    }
}

impl fmt::Display for UnresolvedLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())?;
        for segment in &self.path {
            write!(f, "\n    in {}", segment)?;
        }
        Ok(())
    }
}

/// Every unresolved leaf of one failed top-level request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unresolved {
    pub capability: String,
    /// The type the request was made for.
    pub requested: Ty,
    /// All leaves, in the order they were recorded. Never empty.
    pub leaves: Vec<UnresolvedLeaf>,
    /// The subset of `leaves` not reported by any earlier request.
    pub newly_reported: Vec<UnresolvedLeaf>,
}

impl Unresolved {
    /// The first recorded (outermost) failure.
    pub fn primary(&self) -> &UnresolvedLeaf {
        &self.leaves[0]
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())
    }
}

#[derive(Clone, Debug, Error)]
pub enum DeriveError {
    /// A type depends on itself with no intervening field or variant.
    #[error("the type {ty} recurses into itself with no intervening structure")]
    DirectRecursion {
        capability: String,
        ty: Ty,
        path: Vec<TypePath>,
    },
    #[error("{0}")]
    Unresolved(Box<Unresolved>),
    #[error("the {capability} capability cannot derive {ty}: it defines no `{}`", .hook.signature(.capability))]
    MissingHook {
        capability: String,
        hook: Hook,
        ty: Ty,
    },
    #[error("sum type {ty} has no variants")]
    MalformedSum { ty: Ty, span: Option<Span> },
}

impl DeriveError {
    pub fn unresolved(&self) -> Option<&Unresolved> {
        match self {
            DeriveError::Unresolved(u) => Some(u),
            _ => None,
        }
    }
}

/// Failures already surfaced to the user, keyed by capability, type and path.
///
/// Shared across every request in the process (or across the requests that
/// were handed the same instance), so the same failure reached from several
/// derive sites is reported once. Insertion is thread-safe.
#[derive(Default)]
pub struct ReportedLeaves {
    seen: Mutex<FxHashSet<UnresolvedLeaf>>,
}

impl ReportedLeaves {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide set.
    pub fn global() -> &'static ReportedLeaves {
        static GLOBAL: OnceLock<ReportedLeaves> = OnceLock::new();
        GLOBAL.get_or_init(ReportedLeaves::new)
    }

    /// Insert `leaves` and return those not seen before, in order.
    pub fn report(&self, leaves: &[UnresolvedLeaf]) -> Vec<UnresolvedLeaf> {
        let mut seen = self.seen.lock();
        leaves
            .iter()
            .filter(|leaf| seen.insert((*leaf).clone()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
