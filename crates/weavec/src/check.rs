//! `weavec check`: load a schema and run every `derive` declaration.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use weave_common::{DiagnosticOptions, LineIndex, Span};
use weave_derive::diagnostics::{error_code, leaves_to_render};
use weave_derive::{
    render_diagnostic, CaseClass, DeriveError, Deriver, Hook, InstanceRegistry, SealedTrait,
    TypePath, Typeclass,
};
use weave_schema::{render_schema_error, CapabilityDecl, DeriveDecl, Schema, SchemaError};

use crate::manifest::{Format, Manifest, ManifestError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("'{}' does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("no '{}' found in '{}'", Manifest::FILE_NAME, .0.display())]
    NoManifest(PathBuf),
    #[error("failed to read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Flags given on the command line. Each one, when set, wins over the manifest.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckFlags {
    pub explain: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Effective settings after merging flags and manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub explain: bool,
    pub diagnostics: DiagnosticOptions,
}

impl Settings {
    pub fn resolve(flags: CheckFlags, manifest: Option<&Manifest>) -> Settings {
        let explain = flags.explain || manifest.is_some_and(|m| m.check.explain);
        let json = flags.json || manifest.is_some_and(|m| m.diagnostics.format == Format::Json);
        let color = !flags.no_color && !json && manifest.map_or(true, |m| m.diagnostics.color);
        Settings {
            explain,
            diagnostics: DiagnosticOptions { color, json },
        }
    }
}

/// The schema file to check, and the manifest that named it if any.
#[derive(Debug)]
pub struct Target {
    pub schema: PathBuf,
    pub manifest: Option<Manifest>,
}

impl Target {
    /// `path` is a schema file, a manifest file, or a directory holding a manifest.
    pub fn locate(path: &Path) -> Result<Target, CliError> {
        if !path.exists() {
            return Err(CliError::NotFound(path.to_path_buf()));
        }
        let manifest_path = if path.is_dir() {
            let candidate = path.join(Manifest::FILE_NAME);
            if !candidate.is_file() {
                return Err(CliError::NoManifest(path.to_path_buf()));
            }
            candidate
        } else if path.file_name().is_some_and(|n| n == Manifest::FILE_NAME) {
            path.to_path_buf()
        } else {
            return Ok(Target {
                schema: path.to_path_buf(),
                manifest: None,
            });
        };

        let manifest = Manifest::from_file(&manifest_path)?;
        let root = manifest_path.parent().unwrap_or(Path::new("."));
        let schema = root.join(&manifest.project.schema);
        debug!(project = %manifest.project.name, schema = %schema.display(), "manifest loaded");
        Ok(Target {
            schema,
            manifest: Some(manifest),
        })
    }
}

/// Run every derive in the schema at `path`. Returns whether all of them
/// succeeded. Diagnostics go to stderr, per-derive results to stdout.
pub fn check(path: &Path, flags: CheckFlags) -> Result<bool, CliError> {
    let target = Target::locate(path)?;
    let settings = Settings::resolve(flags, target.manifest.as_ref());
    let source = std::fs::read_to_string(&target.schema).map_err(|source| CliError::Read {
        path: target.schema.clone(),
        source,
    })?;
    let filename = target.schema.display().to_string();
    let emitter = Emitter {
        source: &source,
        filename: &filename,
        options: settings.diagnostics,
        lines: LineIndex::new(&source),
    };

    let schema = match weave_schema::parse(&source) {
        Ok(schema) => schema,
        Err(err) => {
            emitter.schema_error(&err);
            return Ok(false);
        }
    };

    let mut capabilities = Vec::with_capacity(schema.capabilities.len());
    for decl in &schema.capabilities {
        match Capability::new(&schema, decl) {
            Ok(capability) => capabilities.push(capability),
            Err(err) => {
                emitter.schema_error(&err);
                return Ok(false);
            }
        }
    }

    if schema.derives.is_empty() {
        info!(file = %filename, "schema declares no derives");
    }

    let mut failed = 0;
    for derive in &schema.derives {
        // Lowering rejects derives naming an undeclared capability.
        let Some(capability) = capabilities.iter().find(|c| c.name() == derive.capability) else {
            continue;
        };
        if !capability.check(&schema, derive, &settings, &emitter) {
            failed += 1;
        }
    }

    println!(
        "{} derivation(s) checked, {} failed",
        schema.derives.len(),
        failed
    );
    Ok(failed == 0)
}

/// A declared capability, made concrete.
///
/// The instance is a one-line summary of the shape the derivation found,
/// built only from the type's own structure so recursive fields never need
/// their instance read.
struct Capability {
    typeclass: Typeclass<String>,
    registry: InstanceRegistry<String>,
}

impl Capability {
    fn new(schema: &Schema, decl: &CapabilityDecl) -> Result<Capability, SchemaError> {
        let registry = schema.registry_for(&decl.name, |instance, _deps| {
            format!("instance {} for {}", instance.capability, instance.pattern)
        })?;
        Ok(Capability {
            typeclass: summary_typeclass(decl),
            registry,
        })
    }

    fn name(&self) -> &str {
        self.typeclass.name()
    }

    fn check(
        &self,
        schema: &Schema,
        derive: &DeriveDecl,
        settings: &Settings,
        emitter: &Emitter<'_>,
    ) -> bool {
        let deriver = Deriver::new(&self.typeclass, &schema.universe, &self.registry);
        match deriver.derive_traced(&derive.ty) {
            Ok(derivation) => {
                println!("ok    {} for {}: {}", derive.capability, derive.ty, derivation.instance);
                if settings.explain {
                    for line in derivation.report.to_string().lines() {
                        println!("    {}", line);
                    }
                }
                true
            }
            Err(err) => {
                println!("FAIL  {} for {}", derive.capability, derive.ty);
                emitter.derive_error(&err);
                false
            }
        }
    }
}

fn summary_typeclass(decl: &CapabilityDecl) -> Typeclass<String> {
    let mut typeclass = Typeclass::new(decl.name.clone());
    if decl.has(Hook::Combine) {
        typeclass = typeclass.with_combine(|case_class: CaseClass<String>| {
            if case_class.is_singleton() {
                return case_class.type_name().to_string();
            }
            let labels: Vec<String> = case_class
                .params()
                .iter()
                .map(|p| {
                    if p.is_variadic() {
                        format!("{}*", p.label())
                    } else {
                        p.label().to_string()
                    }
                })
                .collect();
            format!("{}({})", case_class.type_name(), labels.join(", "))
        });
    }
    if decl.has(Hook::Dispatch) {
        typeclass = typeclass.with_dispatch(|sealed: SealedTrait<String>| {
            let names: Vec<&str> = sealed.subtypes().iter().map(|s| s.type_name()).collect();
            names.join(" | ")
        });
    }
    typeclass
}

/// Writes diagnostics for one schema file to stderr.
struct Emitter<'a> {
    source: &'a str,
    filename: &'a str,
    options: DiagnosticOptions,
    lines: LineIndex,
}

impl Emitter<'_> {
    fn schema_error(&self, err: &SchemaError) {
        if self.options.json {
            let span = self.span(err.span(), String::new());
            self.emit_json(JsonDiagnostic {
                code: err.code(),
                severity: "error",
                message: err.to_string(),
                file: self.filename,
                spans: vec![span],
                path: Vec::new(),
            });
        } else {
            eprint!(
                "{}",
                render_schema_error(err, self.source, self.filename, &self.options)
            );
        }
    }

    fn derive_error(&self, err: &DeriveError) {
        if !self.options.json {
            eprint!(
                "{}",
                render_diagnostic(err, self.source, self.filename, &self.options)
            );
            return;
        }
        let code = error_code(err);
        match err {
            DeriveError::Unresolved(_) => {
                for leaf in leaves_to_render(err) {
                    self.emit_json(JsonDiagnostic {
                        code,
                        severity: "error",
                        message: leaf.headline(),
                        file: self.filename,
                        spans: self.path_spans(&leaf.path),
                        path: leaf.path.iter().map(ToString::to_string).collect(),
                    });
                }
            }
            DeriveError::DirectRecursion { path, .. } => self.emit_json(JsonDiagnostic {
                code,
                severity: "error",
                message: err.to_string(),
                file: self.filename,
                spans: self.path_spans(path),
                path: path.iter().map(ToString::to_string).collect(),
            }),
            DeriveError::MalformedSum { ty, span } => self.emit_json(JsonDiagnostic {
                code,
                severity: "error",
                message: err.to_string(),
                file: self.filename,
                spans: span
                    .iter()
                    .map(|s| self.span(*s, format!("{} is declared without variants", ty)))
                    .collect(),
                path: Vec::new(),
            }),
            DeriveError::MissingHook { .. } => self.emit_json(JsonDiagnostic {
                code,
                severity: "error",
                message: err.to_string(),
                file: self.filename,
                spans: Vec::new(),
                path: Vec::new(),
            }),
        }
    }

    fn path_spans(&self, path: &[TypePath]) -> Vec<JsonSpan> {
        path.iter()
            .filter_map(|segment| {
                let span = segment.span()?;
                Some(self.span(span, format!("in {}", segment)))
            })
            .collect()
    }

    fn span(&self, span: Span, label: String) -> JsonSpan {
        let (line, column) = self.lines.line_col(span.start);
        JsonSpan {
            start: span.start,
            end: span.end,
            line,
            column,
            label,
        }
    }

    fn emit_json(&self, diagnostic: JsonDiagnostic<'_>) {
        match serde_json::to_string(&diagnostic) {
            Ok(line) => eprintln!("{}", line),
            Err(err) => eprintln!("error: failed to serialize diagnostic: {}", err),
        }
    }
}

/// One diagnostic per line in `--json` mode.
#[derive(Debug, Serialize)]
struct JsonDiagnostic<'a> {
    code: &'static str,
    severity: &'static str,
    message: String,
    file: &'a str,
    spans: Vec<JsonSpan>,
    path: Vec<String>,
}

#[derive(Debug, Serialize)]
struct JsonSpan {
    start: u32,
    end: u32,
    line: u32,
    column: u32,
    label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(extra: &str) -> Manifest {
        Manifest::parse(&format!(
            "[project]\nname = \"p\"\nschema = \"main.weave\"\n{}",
            extra
        ))
        .unwrap()
    }

    #[test]
    fn settings_without_manifest_follow_flags() {
        let settings = Settings::resolve(CheckFlags::default(), None);
        assert!(!settings.explain);
        assert_eq!(settings.diagnostics, DiagnosticOptions::default());

        let flags = CheckFlags {
            explain: true,
            json: true,
            no_color: false,
        };
        let settings = Settings::resolve(flags, None);
        assert!(settings.explain);
        assert!(settings.diagnostics.json);
        assert!(!settings.diagnostics.color);
    }

    #[test]
    fn manifest_settings_apply_when_flags_are_unset() {
        let manifest = manifest("[check]\nexplain = true\n[diagnostics]\ncolor = false\n");
        let settings = Settings::resolve(CheckFlags::default(), Some(&manifest));
        assert!(settings.explain);
        assert!(!settings.diagnostics.color);
        assert!(!settings.diagnostics.json);
    }

    #[test]
    fn no_color_flag_overrides_manifest() {
        let manifest = manifest("[diagnostics]\ncolor = true\n");
        let flags = CheckFlags {
            no_color: true,
            ..CheckFlags::default()
        };
        let settings = Settings::resolve(flags, Some(&manifest));
        assert!(!settings.diagnostics.color);
    }

    #[test]
    fn locate_reads_manifest_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("weave.toml"),
            "[project]\nname = \"shapes\"\nschema = \"src/shapes.weave\"\n",
        )
        .unwrap();
        let target = Target::locate(dir.path()).unwrap();
        assert_eq!(target.schema, dir.path().join("src/shapes.weave"));
        assert_eq!(target.manifest.unwrap().project.name, "shapes");
    }

    #[test]
    fn locate_rejects_directory_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = Target::locate(dir.path()).unwrap_err();
        assert!(matches!(err, CliError::NoManifest(_)));
    }

    #[test]
    fn summary_of_product_and_sum() {
        let schema = weave_schema::parse(
            "opaque String\n\
             capability Show(combine, dispatch)\n\
             instance Show for String\n\
             enum Shape { Dot, Line(from: String, to: String), Poly(points: String*) }\n\
             derive Show for Shape\n",
        )
        .unwrap();
        let capability = Capability::new(&schema, &schema.capabilities[0]).unwrap();
        let deriver = Deriver::new(&capability.typeclass, &schema.universe, &capability.registry);
        let instance = deriver.derive(&schema.derives[0].ty).unwrap();
        assert_eq!(*instance, "Dot | Line | Poly");

        let line = deriver.derive(&weave_derive::Ty::con("Line")).unwrap();
        assert_eq!(*line, "Line(from, to)");
        let poly = deriver.derive(&weave_derive::Ty::con("Poly")).unwrap();
        assert_eq!(*poly, "Poly(points*)");
    }

    #[test]
    fn registry_summary_names_the_instance() {
        let schema = weave_schema::parse(
            "opaque Int\ncapability Show(combine)\ninstance Show for Int\n",
        )
        .unwrap();
        let capability = Capability::new(&schema, &schema.capabilities[0]).unwrap();
        let deriver = Deriver::new(&capability.typeclass, &schema.universe, &capability.registry);
        assert_eq!(
            *deriver.derive(&weave_derive::Ty::int()).unwrap(),
            "instance Show for Int"
        );
    }
}
