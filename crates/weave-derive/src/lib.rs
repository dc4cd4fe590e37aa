//! Recursive derivation of capability instances.
//!
//! A capability (a [`Typeclass`]) supplies two hooks: `combine`, which builds
//! an instance for a product from its fields' instances, and `dispatch`,
//! which builds one for a sum from its variants' instances. [`Deriver`] walks
//! a type's structure through a [`Describe`] provider, prefers instances from
//! an [`InstanceSource`] wherever one applies, and assembles the rest.
//!
//! Recursive types are handled by deferring to a [`Binding`] that is filled
//! once the enclosing derivation completes. A type that refers to itself with
//! no structure in between is rejected. Every type that cannot be resolved is
//! collected, with the path of fields and variants that led to it, and
//! reported once per process.

pub mod cache;
pub mod derive;
pub mod diagnostics;
pub mod error;
pub mod knot;
pub mod registry;
pub mod report;
pub mod shape;
pub mod stack;
pub mod ty;
pub mod typeclass;
pub mod unify;
pub mod value;

pub use derive::{Derivation, Deriver};
pub use diagnostics::{render_diagnostic, render_plain};
pub use error::{DeriveError, LeafReason, ReportedLeaves, Unresolved, UnresolvedLeaf};
pub use knot::{Binding, BindingName, Derived};
pub use registry::{DirectInstance, InstanceRegistry, InstanceRule, InstanceSource, NoInstances, RegistryError};
pub use report::{DerivationReport, Step, StepKind};
pub use shape::{BoundMismatch, DefaultValue, Describe, FieldShape, ProductShape, Shape, SumShape, VariantShape};
pub use stack::TypePath;
pub use ty::Ty;
pub use typeclass::{CaseClass, Hook, Param, SealedTrait, Subtype, Typeclass};
pub use value::Value;
