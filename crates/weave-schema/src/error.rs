//! Schema errors and their ariadne rendering.

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use thiserror::Error;
use weave_common::{DiagnosticOptions, Span};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unexpected character `{found}`")]
    UnexpectedChar { found: String, span: Span },
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("the name `{name}` is declared more than once")]
    DuplicateName {
        name: String,
        span: Span,
        previous: Span,
    },
    #[error("`{name}` takes {expected} type argument(s) but {found} were given")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("newtype `{name}` must have exactly one field, found {found}")]
    NewtypeFieldCount {
        name: String,
        found: usize,
        span: Span,
    },
    #[error("variadic field `{field}` must be the last field")]
    VariadicNotLast { field: String, span: Span },
    #[error("unknown capability `{name}`")]
    UnknownCapability { name: String, span: Span },
    #[error("unknown hook `{name}`")]
    UnknownHook { name: String, span: Span },
    #[error("variant `{variant}` can only be pinned to `{expected}`, found `{found}`")]
    BadPin {
        variant: String,
        expected: String,
        found: String,
        span: Span,
    },
    #[error("{capability} instance for {new} overlaps with the instance for {existing}")]
    OverlappingInstance {
        capability: String,
        new: String,
        existing: String,
        span: Span,
    },
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::UnexpectedChar { .. } => "S0001",
            SchemaError::UnterminatedString { .. } => "S0002",
            SchemaError::Expected { .. } => "S0003",
            SchemaError::DuplicateName { .. } => "S0004",
            SchemaError::WrongArity { .. } => "S0005",
            SchemaError::NewtypeFieldCount { .. } => "S0006",
            SchemaError::VariadicNotLast { .. } => "S0007",
            SchemaError::UnknownCapability { .. } => "S0008",
            SchemaError::UnknownHook { .. } => "S0009",
            SchemaError::BadPin { .. } => "S0010",
            SchemaError::OverlappingInstance { .. } => "S0011",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SchemaError::UnexpectedChar { span, .. }
            | SchemaError::UnterminatedString { span }
            | SchemaError::Expected { span, .. }
            | SchemaError::DuplicateName { span, .. }
            | SchemaError::WrongArity { span, .. }
            | SchemaError::NewtypeFieldCount { span, .. }
            | SchemaError::VariadicNotLast { span, .. }
            | SchemaError::UnknownCapability { span, .. }
            | SchemaError::UnknownHook { span, .. }
            | SchemaError::BadPin { span, .. }
            | SchemaError::OverlappingInstance { span, .. } => *span,
        }
    }

    fn label(&self) -> String {
        match self {
            SchemaError::UnexpectedChar { .. } => "not valid here".to_string(),
            SchemaError::UnterminatedString { .. } => "string starts here".to_string(),
            SchemaError::Expected { expected, .. } => format!("expected {}", expected),
            SchemaError::DuplicateName { .. } => "declared again here".to_string(),
            SchemaError::WrongArity { expected, .. } => {
                format!("expected {} type argument(s)", expected)
            }
            SchemaError::NewtypeFieldCount { .. } => "wraps exactly one value".to_string(),
            SchemaError::VariadicNotLast { .. } => "variadic field".to_string(),
            SchemaError::UnknownCapability { .. } => "not declared".to_string(),
            SchemaError::UnknownHook { .. } => "unknown hook".to_string(),
            SchemaError::BadPin { expected, .. } => format!("must be an application of {}", expected),
            SchemaError::OverlappingInstance { existing, .. } => {
                format!("also matched by {}", existing)
            }
        }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            SchemaError::UnknownHook { .. } => Some("hooks are `combine` and `dispatch`"),
            SchemaError::VariadicNotLast { .. } => Some("move it to the end of the field list"),
            SchemaError::UnknownCapability { .. } => {
                Some("declare it with `capability Name(combine, dispatch)`")
            }
            _ => None,
        }
    }
}

/// Render a schema error against its source.
pub fn render_schema_error(
    err: &SchemaError,
    source: &str,
    _filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let config = Config::default().with_color(options.color);
    let span = err.span().clamped(source.len());

    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(err.code())
        .with_message(err.to_string())
        .with_config(config)
        .with_label(Label::new(span).with_message(err.label()).with_color(Color::Red));
    if let SchemaError::DuplicateName { previous, .. } = err {
        builder.add_label(
            Label::new(previous.clamped(source.len()))
                .with_message("first declared here")
                .with_color(Color::Blue),
        );
    }
    if let Some(help) = err.help() {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    builder
        .finish()
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_labels_both_declarations() {
        let source = "object A\nobject A\n";
        let err = SchemaError::DuplicateName {
            name: "A".to_string(),
            span: Span::new(16, 17),
            previous: Span::new(7, 8),
        };
        let output = render_schema_error(&err, source, "test.weave", &DiagnosticOptions::colorless());
        assert!(output.contains("S0004"));
        assert!(output.contains("the name `A` is declared more than once"));
        assert!(output.contains("declared again here"));
        assert!(output.contains("first declared here"));
    }

    #[test]
    fn unknown_hook_has_help() {
        let err = SchemaError::UnknownHook {
            name: "merge".to_string(),
            span: Span::new(16, 21),
        };
        let output = render_schema_error(
            &err,
            "capability Show(merge)",
            "test.weave",
            &DiagnosticOptions::colorless(),
        );
        assert!(output.contains("hooks are `combine` and `dispatch`"));
    }
}
