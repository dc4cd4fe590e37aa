//! The `.weave` declaration language.
//!
//! A schema declares types (`opaque`, `struct`, `newtype`, `object`, `enum`),
//! capabilities with the hooks they implement, hand-written `instance`s, and
//! the `derive` requests to run. [`parse`] lexes, parses and lowers a source
//! file into a [`Schema`], whose [`Universe`] describes types to the engine
//! and whose instances populate an [`InstanceRegistry`](weave_derive::InstanceRegistry).

pub mod ast;
mod cursor;
pub mod error;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod schema;
pub mod token;
pub mod universe;

pub use error::{render_schema_error, SchemaError};
pub use schema::{CapabilityDecl, DeriveDecl, InstanceDecl, Schema};
pub use universe::Universe;

/// Parse and lower `source`.
pub fn parse(source: &str) -> Result<Schema, SchemaError> {
    let file = parser::parse_source(source)?;
    let schema = lower::lower(&file)?;
    tracing::debug!(
        types = schema.universe.len(),
        capabilities = schema.capabilities.len(),
        instances = schema.instances.len(),
        derives = schema.derives.len(),
        "schema loaded"
    );
    Ok(schema)
}
