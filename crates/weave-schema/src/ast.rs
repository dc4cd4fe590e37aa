//! Syntax tree produced by the parser. Names are unresolved; spans cover the
//! whole construct unless noted.

use weave_common::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub decls: Vec<Decl>,
}

/// A name with the span of the identifier alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

/// A written type such as `Tree<List<T>>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: Name,
    pub args: Vec<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    EmptyList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Name,
    pub ty: TypeRef,
    /// Written `T*`.
    pub variadic: bool,
    pub default: Option<Literal>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecl {
    pub name: Name,
    /// `None` for a bare `Red`; `Some(vec![])` for `Red()`.
    pub fields: Option<Vec<FieldDecl>>,
    /// The `: Expr<Int>` result type restricting this variant.
    pub pinned: Option<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    Struct,
    Newtype,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Opaque {
        name: Name,
        params: Vec<Name>,
        span: Span,
    },
    Product {
        kind: ProductKind,
        name: Name,
        params: Vec<Name>,
        fields: Vec<FieldDecl>,
        span: Span,
    },
    Object {
        name: Name,
        span: Span,
    },
    Enum {
        name: Name,
        params: Vec<Name>,
        variants: Vec<VariantDecl>,
        span: Span,
    },
    Capability {
        name: Name,
        hooks: Vec<Name>,
        span: Span,
    },
    Instance {
        capability: Name,
        ty: TypeRef,
        requires: Vec<TypeRef>,
        span: Span,
    },
    Derive {
        capability: Name,
        ty: TypeRef,
        span: Span,
    },
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Opaque { span, .. }
            | Decl::Product { span, .. }
            | Decl::Object { span, .. }
            | Decl::Enum { span, .. }
            | Decl::Capability { span, .. }
            | Decl::Instance { span, .. }
            | Decl::Derive { span, .. } => *span,
        }
    }
}
