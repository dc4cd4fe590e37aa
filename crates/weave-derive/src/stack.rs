//! The per-request derivation stack.
//!
//! One frame per type currently being resolved, outermost first. The stack
//! is the cycle detector (a type already on it is deferred to its binding)
//! and the source of the human-readable path reported with every failure.

use std::fmt;

use tracing::trace;
use weave_common::Span;

use crate::cache::ResolutionCache;
use crate::error::{DeriveError, LeafReason, UnresolvedLeaf};
use crate::knot::{Binding, BindingName};
use crate::ty::Ty;

/// Why a type was being resolved: one breadcrumb of a failure path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypePath {
    /// The type of field `field` of product `owner`.
    ProductField {
        field: String,
        owner: String,
        span: Option<Span>,
    },
    /// One of the variants of `sum`. Sibling variants share this segment.
    SumVariant { sum: String, span: Option<Span> },
    /// A requirement of a registry instance for `ty`.
    ChainedCapability { ty: String },
}

impl TypePath {
    pub fn span(&self) -> Option<Span> {
        match self {
            TypePath::ProductField { span, .. } | TypePath::SumVariant { span, .. } => *span,
            TypePath::ChainedCapability { .. } => None,
        }
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePath::ProductField { field, owner, .. } => {
                write!(f, "field `{}` of product type {}", field, owner)
            }
            TypePath::SumVariant { sum, .. } => write!(f, "a variant of sum type {}", sum),
            TypePath::ChainedCapability { ty } => write!(f, "chained instance for type {}", ty),
        }
    }
}

struct Frame<I> {
    /// `None` for the top-level request.
    path: Option<TypePath>,
    ty: Ty,
    binding: Binding<I>,
}

/// What the caller should do with a type it is about to resolve.
pub enum Enter<I> {
    /// The type is already on the stack: emit a deferred reference.
    AlreadyDeriving(Binding<I>),
    /// Resolved earlier in this request (`None` if it failed).
    Cached(Option<Binding<I>>),
    /// A frame was pushed; resolve, then call [`DerivationStack::exit`].
    Proceed(Binding<I>),
}

/// Frames and accumulated failures of one top-level request.
pub struct DerivationStack<I> {
    capability: String,
    frames: Vec<Frame<I>>,
    errors: Vec<UnresolvedLeaf>,
    next_binding: u32,
}

impl<I> DerivationStack<I> {
    pub fn new(capability: impl Into<String>) -> Self {
        DerivationStack {
            capability: capability.into(),
            frames: Vec::new(),
            errors: Vec::new(),
            next_binding: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, ty: &Ty) -> bool {
        self.frames.iter().any(|f| &f.ty == ty)
    }

    /// Decide how to proceed with `ty`, reached via `path`.
    ///
    /// Fails with `DirectRecursion` when `ty` is the innermost frame's own
    /// type: there is no structure between the two to defer through.
    pub fn enter(
        &mut self,
        ty: &Ty,
        path: Option<TypePath>,
        cache: &ResolutionCache<I>,
    ) -> Result<Enter<I>, DeriveError> {
        if let Some(innermost) = self.frames.last() {
            if &innermost.ty == ty {
                return Err(DeriveError::DirectRecursion {
                    capability: self.capability.clone(),
                    ty: ty.clone(),
                    path: self.path_with(path),
                });
            }
        }

        if let Some(frame) = self.frames.iter().find(|f| &f.ty == ty) {
            trace!(ty = %ty, binding = %frame.binding.name(), "already deriving, deferring");
            return Ok(Enter::AlreadyDeriving(frame.binding.clone()));
        }

        if let Some(cached) = cache.get(ty) {
            trace!(ty = %ty, found = cached.is_some(), "cache hit");
            return Ok(Enter::Cached(cached.cloned()));
        }

        self.next_binding += 1;
        let binding = Binding::new(BindingName(self.next_binding));
        trace!(ty = %ty, binding = %binding.name(), depth = self.frames.len(), "enter");
        self.frames.push(Frame {
            path,
            ty: ty.clone(),
            binding: binding.clone(),
        });
        Ok(Enter::Proceed(binding))
    }

    /// Pop the innermost frame. Must be called exactly once per `Proceed`.
    pub fn exit(&mut self) -> Option<(Ty, Binding<I>)> {
        let frame = self.frames.pop()?;
        trace!(ty = %frame.ty, binding = %frame.binding.name(), "exit");
        Some((frame.ty, frame.binding))
    }

    /// Path segments of the current frames, innermost first.
    pub fn path(&self) -> Vec<TypePath> {
        self.frames
            .iter()
            .rev()
            .filter_map(|f| f.path.clone())
            .collect()
    }

    fn path_with(&self, innermost: Option<TypePath>) -> Vec<TypePath> {
        let mut path: Vec<TypePath> = innermost.into_iter().collect();
        path.extend(self.path());
        path
    }

    /// Record a failure for `ty`. `extra` is a segment below the current
    /// innermost frame (used for variants that never get a frame).
    pub fn record_leaf(&mut self, ty: &Ty, reason: LeafReason, extra: Option<TypePath>) {
        let leaf = UnresolvedLeaf {
            capability: self.capability.clone(),
            ty: ty.clone(),
            reason,
            path: self.path_with(extra),
        };
        if !self.errors.contains(&leaf) {
            trace!(ty = %ty, depth = self.frames.len(), "unresolved leaf");
            self.errors.push(leaf);
        }
    }

    pub fn errors(&self) -> &[UnresolvedLeaf] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<UnresolvedLeaf> {
        std::mem::take(&mut self.errors)
    }
}
