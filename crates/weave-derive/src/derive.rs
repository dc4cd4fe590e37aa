//! The derivation engine.
//!
//! [`Deriver::derive`] is the single entry point. Each call is one top-level
//! request with its own stack, cache and deferred references; nothing but
//! the [`ReportedLeaves`] set outlives it. For every type reached the engine
//! tries, in order:
//!
//! 1. a deferred reference, if the type is already being derived above
//! 2. the request's cache
//! 3. the instance source (registry instances always win)
//! 4. structural derivation as a product or sum
//!
//! and records an unresolved leaf, with its path, when all of them fail.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::cache::ResolutionCache;
use crate::error::{DeriveError, LeafReason, ReportedLeaves, Unresolved, UnresolvedLeaf};
use crate::knot::{Binding, DeferredRefs, Derived, Resolution};
use crate::registry::{DirectInstance, InstanceSource};
use crate::report::{DerivationReport, StepKind};
use crate::shape::{Describe, ProductShape, Shape, SumShape};
use crate::stack::{DerivationStack, Enter, TypePath};
use crate::ty::Ty;
use crate::typeclass::{CaseClass, Constructor, Hook, Param, SealedTrait, Subtype, Typeclass};
use crate::value::Value;

/// A successful derivation and how it was reached.
pub struct Derivation<I> {
    pub instance: Derived<I>,
    pub report: DerivationReport,
}

/// State owned by one top-level request.
struct Request<I> {
    stack: DerivationStack<I>,
    cache: ResolutionCache<I>,
    deferred: DeferredRefs<I>,
    report: DerivationReport,
}

impl<I> Request<I> {
    fn new(capability: &str) -> Self {
        Request {
            stack: DerivationStack::new(capability),
            cache: ResolutionCache::new(),
            deferred: DeferredRefs::new(),
            report: DerivationReport::default(),
        }
    }
}

type Assembled<I> = Option<(I, StepKind)>;

/// Derives instances of one capability.
pub struct Deriver<'a, I> {
    typeclass: &'a Typeclass<I>,
    types: &'a dyn Describe,
    instances: &'a dyn InstanceSource<I>,
    reported: &'a ReportedLeaves,
}

impl<'a, I> Deriver<'a, I> {
    /// A deriver reporting failures into the process-wide set.
    pub fn new(
        typeclass: &'a Typeclass<I>,
        types: &'a dyn Describe,
        instances: &'a dyn InstanceSource<I>,
    ) -> Self {
        Deriver {
            typeclass,
            types,
            instances,
            reported: ReportedLeaves::global(),
        }
    }

    /// Deduplicate reported failures against `reported` instead of the
    /// process-wide set.
    pub fn with_reported(mut self, reported: &'a ReportedLeaves) -> Self {
        self.reported = reported;
        self
    }

    pub fn derive(&self, ty: &Ty) -> Result<Derived<I>, DeriveError> {
        self.derive_traced(ty).map(|d| d.instance)
    }

    /// Like [`derive`](Self::derive), also returning the resolution report.
    pub fn derive_traced(&self, ty: &Ty) -> Result<Derivation<I>, DeriveError> {
        let capability = self.typeclass.name();
        debug!(capability, ty = %ty, "derivation request");

        let mut req = Request::new(capability);
        let resolution = self.resolve(&mut req, ty, None)?;
        debug_assert!(req.stack.is_empty(), "frames left after top-level resolution");

        let Request {
            mut stack,
            deferred,
            mut report,
            ..
        } = req;
        report.knots = deferred.tie();
        for (binding, ty) in &report.knots.dangling {
            debug!(%binding, ty = %ty, "dropping deferred reference into a failed branch");
        }
        debug!(
            capability,
            ty = %ty,
            tied = report.knots.tied,
            described = report.described,
            "derivation finished"
        );

        let leaves = stack.take_errors();
        if let Some(instance) = resolution.into_binding().and_then(Derived::new) {
            if !leaves.is_empty() {
                debug!(count = leaves.len(), "discarding failures from bypassed alternatives");
            }
            return Ok(Derivation { instance, report });
        }

        Err(self.fail(ty, leaves))
    }

    fn fail(&self, ty: &Ty, mut leaves: Vec<UnresolvedLeaf>) -> DeriveError {
        if leaves.is_empty() {
            leaves.push(UnresolvedLeaf {
                capability: self.typeclass.name().to_string(),
                ty: ty.clone(),
                reason: LeafReason::NoInstance,
                path: Vec::new(),
            });
        }
        let newly_reported = self.reported.report(&leaves);
        for leaf in &newly_reported {
            warn!("{}", leaf);
        }
        DeriveError::Unresolved(Box::new(Unresolved {
            capability: self.typeclass.name().to_string(),
            requested: ty.clone(),
            leaves,
            newly_reported,
        }))
    }

    /// Resolve the capability for `ty`, reached via `path`.
    fn resolve(
        &self,
        req: &mut Request<I>,
        ty: &Ty,
        path: Option<TypePath>,
    ) -> Result<Resolution<I>, DeriveError> {
        let depth = req.stack.depth();
        match req.stack.enter(ty, path, &req.cache)? {
            Enter::AlreadyDeriving(target) => {
                req.report.push(
                    ty,
                    depth,
                    StepKind::Deferred {
                        binding: target.name(),
                    },
                );
                Ok(Resolution::Deferred(req.deferred.defer(ty, &target)))
            }
            Enter::Cached(hit) => {
                req.report.push(ty, depth, StepKind::Cached);
                Ok(match hit {
                    Some(binding) => Resolution::Found(binding),
                    None => Resolution::NotFound,
                })
            }
            Enter::Proceed(binding) => {
                let step = req.report.begin(ty, depth);
                let mark = req.cache.mark();
                let outcome = self.resolve_fresh(req, ty);
                req.stack.exit();
                match outcome? {
                    Some((instance, kind)) => {
                        binding.fill(instance);
                        req.report.finish(step, kind);
                        req.cache.insert(ty, Some(binding.clone()));
                        Ok(Resolution::Found(binding))
                    }
                    None => {
                        // Anything derived since this frame was pushed may
                        // hold a placeholder for a binding that will never fill.
                        req.cache.evict_found_since(mark);
                        req.cache.insert(ty, None);
                        Ok(Resolution::NotFound)
                    }
                }
            }
        }
    }

    /// Resolve a type that has a fresh frame on the stack.
    fn resolve_fresh(&self, req: &mut Request<I>, ty: &Ty) -> Result<Assembled<I>, DeriveError> {
        let mut chained_failed = false;
        if let Some(direct) = self.instances.lookup_direct(ty) {
            match self.resolve_chained(req, ty, &direct)? {
                Some(deps) => {
                    debug!(ty = %ty, origin = %direct.origin, "registry instance");
                    let origin = direct.origin.clone();
                    return Ok(Some((direct.build(&deps), StepKind::Registry { origin })));
                }
                None => {
                    debug!(ty = %ty, origin = %direct.origin, "registry instance unusable, trying structure");
                    chained_failed = true;
                }
            }
        }

        req.report.described += 1;
        match self.types.describe(ty) {
            Shape::Product(shape) => self.derive_product(req, ty, shape),
            Shape::Sum(shape) => self.derive_sum(req, ty, shape),
            Shape::Opaque => {
                // A failed chained requirement already recorded the root cause.
                if !chained_failed {
                    req.stack.record_leaf(ty, LeafReason::NoInstance, None);
                }
                Ok(None)
            }
        }
    }

    /// Resolve a registry instance's requirements. `None` if any failed.
    fn resolve_chained(
        &self,
        req: &mut Request<I>,
        ty: &Ty,
        direct: &DirectInstance<I>,
    ) -> Result<Option<Vec<Binding<I>>>, DeriveError> {
        let mut deps = Vec::with_capacity(direct.requires.len());
        let mut failed = false;
        for required in &direct.requires {
            let path = TypePath::ChainedCapability { ty: ty.to_string() };
            match self.resolve(req, required, Some(path))?.into_binding() {
                Some(binding) => deps.push(binding),
                None => failed = true,
            }
        }
        Ok((!failed).then_some(deps))
    }

    fn require_hook(&self, hook: Hook, ty: &Ty) -> Result<(), DeriveError> {
        if self.typeclass.has_hook(hook) {
            Ok(())
        } else {
            Err(DeriveError::MissingHook {
                capability: self.typeclass.name().to_string(),
                hook,
                ty: ty.clone(),
            })
        }
    }

    fn derive_product(
        &self,
        req: &mut Request<I>,
        ty: &Ty,
        shape: ProductShape,
    ) -> Result<Assembled<I>, DeriveError> {
        self.require_hook(Hook::Combine, ty)?;

        if shape.singleton {
            debug!(ty = %ty, "singleton");
            let value = Value::record(shape.name.clone(), Vec::new());
            let case_class = CaseClass::new(
                shape.name,
                ty.to_string(),
                true,
                shape.wrapper,
                Vec::new(),
                Constructor::Singleton(value),
            );
            return Ok(self
                .typeclass
                .combine(case_class)
                .map(|instance| (instance, StepKind::Singleton)));
        }

        // Fields of identical type share one resolution.
        let mut by_type: FxHashMap<Ty, Option<Binding<I>>> = FxHashMap::default();
        let mut params = Vec::with_capacity(shape.fields.len());
        let mut failed = false;
        for (index, field) in shape.fields.into_iter().enumerate() {
            let resolved = match by_type.get(&field.ty) {
                Some(earlier) => earlier.clone(),
                None => {
                    let path = TypePath::ProductField {
                        field: field.name.clone(),
                        owner: shape.name.clone(),
                        span: field.span,
                    };
                    let binding = self.resolve(req, &field.ty, Some(path))?.into_binding();
                    by_type.insert(field.ty.clone(), binding.clone());
                    binding
                }
            };
            match resolved {
                Some(binding) => params.push(Param::new(
                    field.name,
                    field.ty.to_string(),
                    ty.to_string(),
                    index,
                    field.variadic,
                    binding,
                    field.default,
                )),
                None => failed = true,
            }
        }
        if failed {
            return Ok(None);
        }

        let fields = params.len();
        debug!(ty = %ty, fields, "combining product");
        let case_class = CaseClass::new(
            shape.name.clone(),
            ty.to_string(),
            false,
            shape.wrapper,
            params,
            Constructor::Record(shape.name),
        );
        Ok(self
            .typeclass
            .combine(case_class)
            .map(|instance| (instance, StepKind::Product { fields })))
    }

    fn derive_sum(
        &self,
        req: &mut Request<I>,
        ty: &Ty,
        shape: SumShape,
    ) -> Result<Assembled<I>, DeriveError> {
        self.require_hook(Hook::Dispatch, ty)?;
        if shape.variants.is_empty() {
            return Err(DeriveError::MalformedSum {
                ty: ty.clone(),
                span: shape.span,
            });
        }

        let path = TypePath::SumVariant {
            sum: shape.name.clone(),
            span: shape.span,
        };
        let mut subtypes = Vec::with_capacity(shape.variants.len());
        let mut failed = false;
        for (index, variant) in shape.variants.into_iter().enumerate() {
            match variant.ty {
                Ok(variant_ty) => {
                    match self.resolve(req, &variant_ty, Some(path.clone()))?.into_binding() {
                        Some(binding) => subtypes.push(Subtype::new(variant.name, index, binding)),
                        None => failed = true,
                    }
                }
                Err(mismatch) => {
                    debug!(ty = %ty, variant = %variant.name, %mismatch, "variant excluded by bound");
                    let args = ty.head().map(|(_, args)| args.to_vec()).unwrap_or_default();
                    req.stack.record_leaf(
                        &Ty::app(variant.name, args),
                        LeafReason::IncompatibleBound(mismatch),
                        Some(path.clone()),
                    );
                    failed = true;
                }
            }
        }
        if failed {
            return Ok(None);
        }

        debug!(ty = %ty, variants = subtypes.len(), "dispatching sum");
        let variants = subtypes.len();
        let sealed = SealedTrait::new(shape.name, ty.to_string(), subtypes);
        Ok(self
            .typeclass
            .dispatch(sealed)
            .map(|instance| (instance, StepKind::Sum { variants })))
    }
}
