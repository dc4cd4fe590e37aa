//! Shared building blocks for the weave crates.
//!
//! - [`span`]: byte-offset spans into schema source and on-demand line lookup
//! - [`diagnostics`]: rendering options shared by every diagnostic renderer

pub mod diagnostics;
pub mod span;

pub use diagnostics::DiagnosticOptions;
pub use span::{LineIndex, Span};
