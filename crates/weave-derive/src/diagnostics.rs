//! Ariadne rendering for derivation errors.
//!
//! Spans come from the [`TypePath`] segments the error carries, so the
//! report points at the field or variant declarations that led to the
//! failure. Errors without spans still render, anchored at the start of
//! the source.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportBuilder, ReportKind, Source};
use weave_common::{DiagnosticOptions, Span};

use crate::error::{DeriveError, LeafReason, UnresolvedLeaf};
use crate::stack::TypePath;

/// Error code for each [`DeriveError`] variant.
pub fn error_code(err: &DeriveError) -> &'static str {
    match err {
        DeriveError::DirectRecursion { .. } => "D0001",
        DeriveError::Unresolved(_) => "D0002",
        DeriveError::MissingHook { .. } => "D0003",
        DeriveError::MalformedSum { .. } => "D0004",
    }
}

/// Leaves to show for an unresolved error: the primary one, then every
/// other leaf not already surfaced by an earlier request.
pub fn leaves_to_render(err: &DeriveError) -> Vec<&UnresolvedLeaf> {
    let Some(unresolved) = err.unresolved() else {
        return Vec::new();
    };
    let primary = unresolved.primary();
    let mut leaves = vec![primary];
    leaves.extend(unresolved.newly_reported.iter().filter(|l| *l != primary));
    leaves
}

/// Render `err` against the schema `source` it was derived from.
pub fn render_diagnostic(
    err: &DeriveError,
    source: &str,
    _filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let config = Config::default().with_color(options.color);
    let source_len = source.len();
    let span_of = |span: Option<Span>| span.unwrap_or_default().clamped(source_len);
    let code = error_code(err);

    let reports: Vec<Report<'_, Range<usize>>> = match err {
        DeriveError::DirectRecursion { ty, path, .. } => {
            let span = span_of(path.iter().find_map(TypePath::span));
            let builder = Report::build(ReportKind::Error, span.clone())
                .with_code(code)
                .with_message(err.to_string())
                .with_config(config)
                .with_label(
                    Label::new(span)
                        .with_message(format!("{} refers to itself here", ty))
                        .with_color(Color::Red),
                )
                .with_help("place the recursive reference inside a container such as a list");
            vec![with_path_notes(builder, path).finish()]
        }

        DeriveError::Unresolved(_) => leaves_to_render(err)
            .into_iter()
            .map(|leaf| {
                let span = span_of(leaf.primary_span());
                let message = match &leaf.reason {
                    LeafReason::NoInstance => {
                        format!("no {} instance for {}", leaf.capability, leaf.ty)
                    }
                    LeafReason::IncompatibleBound(_) => {
                        format!("variant {} cannot be a member of this type", leaf.ty)
                    }
                };
                let mut builder = Report::build(ReportKind::Error, span.clone())
                    .with_code(code)
                    .with_message(leaf.headline())
                    .with_config(config)
                    .with_label(Label::new(span.clone()).with_message(message).with_color(Color::Red));
                // Outer segments that carry their own spans get secondary labels.
                for segment in leaf.path.iter().skip(1) {
                    if let Some(outer) = segment.span() {
                        let outer = outer.clamped(source_len);
                        if outer != span {
                            builder.add_label(
                                Label::new(outer)
                                    .with_message(format!("required by {}", segment))
                                    .with_color(Color::Blue),
                            );
                        }
                    }
                }
                if matches!(leaf.reason, LeafReason::NoInstance) {
                    builder.set_help(format!(
                        "declare `instance {} for {}`",
                        leaf.capability, leaf.ty
                    ));
                }
                with_path_notes(builder, &leaf.path).finish()
            })
            .collect(),

        DeriveError::MissingHook { hook, .. } => {
            let span = span_of(None);
            vec![Report::build(ReportKind::Error, span)
                .with_code(code)
                .with_message(err.to_string())
                .with_config(config)
                .with_help(format!("add `{}` to the capability declaration", hook))
                .finish()]
        }

        DeriveError::MalformedSum { ty, span } => {
            let span = span_of(*span);
            vec![Report::build(ReportKind::Error, span.clone())
                .with_code(code)
                .with_message(err.to_string())
                .with_config(config)
                .with_label(
                    Label::new(span)
                        .with_message(format!("{} is declared without variants", ty))
                        .with_color(Color::Red),
                )
                .finish()]
        }
    };

    let mut buf = Vec::new();
    for report in reports {
        report
            .write(Source::from(source), &mut buf)
            .expect("failed to write diagnostic");
    }
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

fn with_path_notes<'a>(
    builder: ReportBuilder<'a, Range<usize>>,
    path: &[TypePath],
) -> ReportBuilder<'a, Range<usize>> {
    path.iter()
        .fold(builder, |builder, segment| builder.with_note(format!("in {}", segment)))
}

/// Render without source context: the error and its path as plain lines.
pub fn render_plain(err: &DeriveError) -> String {
    let code = error_code(err);
    match err {
        DeriveError::DirectRecursion { path, .. } => {
            let mut out = format!("error[{}]: {}", code, err);
            for segment in path {
                out.push_str(&format!("\n    in {}", segment));
            }
            out
        }
        DeriveError::Unresolved(_) => leaves_to_render(err)
            .into_iter()
            .map(|leaf| format!("error[{}]: {}", code, leaf))
            .collect::<Vec<_>>()
            .join("\n"),
        DeriveError::MissingHook { .. } | DeriveError::MalformedSum { .. } => {
            format!("error[{}]: {}", code, err)
        }
    }
}
