//! End-to-end tests for the weavec binary.
//!
//! Each test writes a schema (and sometimes a `weave.toml`) into a temp
//! directory, runs `weavec check` on it, and asserts on exit status and output.

use std::path::Path;
use std::process::{Command, Output};

const TREE: &str = "\
opaque String
capability Show(combine, dispatch)
instance Show for String
enum Tree<T> { Leaf(value: T), Branch(left: Tree<T>, right: Tree<T>) }
derive Show for Tree<String>
";

const MISSING_EMAIL: &str = "\
opaque String
capability Show(combine)
instance Show for String
struct Person { name: String, email: Email }
derive Show for Person
";

fn weavec(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weavec"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke weavec")
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create dir");
    }
    std::fs::write(&path, content).expect("failed to write file");
    path.to_str().unwrap().to_string()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    stderr(output)
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).expect("invalid JSON diagnostic"))
        .collect()
}

#[test]
fn check_recursive_schema_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "tree.weave", TREE);

    let output = weavec(&["check", &schema, "--no-color"]);
    assert!(
        output.status.success(),
        "weavec check failed:\nstdout: {}\nstderr: {}",
        stdout(&output),
        stderr(&output)
    );
    assert_eq!(
        stdout(&output),
        "ok    Show for Tree<String>: Leaf | Branch\n1 derivation(s) checked, 0 failed\n"
    );
    assert_eq!(stderr(&output), "");
}

#[test]
fn explain_prints_resolution_trace() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "tree.weave", TREE);

    let output = weavec(&["check", &schema, "--explain"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("    Tree<String>: sum, 2 variant(s)"), "stdout: {}", out);
    assert!(out.contains("      Leaf<String>: product, 1 field(s)"), "stdout: {}", out);
    assert!(out.contains("Tree<String>: deferred to $"), "stdout: {}", out);
}

#[test]
fn unresolved_field_fails_with_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "person.weave", MISSING_EMAIL);

    let output = weavec(&["check", &schema, "--no-color"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout(&output),
        "FAIL  Show for Person\n1 derivation(s) checked, 1 failed\n"
    );
    let err = stderr(&output);
    assert!(err.contains("D0002"), "stderr: {}", err);
    assert!(
        err.contains("could not derive Show instance for type Email"),
        "stderr: {}",
        err
    );
    assert!(err.contains("declare `instance Show for Email`"), "stderr: {}", err);
}

#[test]
fn json_diagnostics_carry_path_and_position() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "person.weave", MISSING_EMAIL);

    let output = weavec(&["check", &schema, "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let diagnostics = json_lines(&output);
    assert_eq!(diagnostics.len(), 1, "stderr: {}", stderr(&output));

    let diag = &diagnostics[0];
    assert_eq!(diag["code"], "D0002");
    assert_eq!(diag["severity"], "error");
    assert_eq!(diag["message"], "could not derive Show instance for type Email");
    assert_eq!(diag["path"][0], "field `email` of product type Person");
    assert_eq!(diag["spans"][0]["line"], 4);
}

#[test]
fn every_failing_leaf_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(
        dir.path(),
        "pair.weave",
        "capability Show(combine)\nstruct Pair { left: Foo, right: Bar }\nderive Show for Pair\n",
    );

    let output = weavec(&["check", &schema, "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let messages: Vec<String> = json_lines(&output)
        .iter()
        .map(|d| d["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        messages,
        vec![
            "could not derive Show instance for type Foo".to_string(),
            "could not derive Show instance for type Bar".to_string(),
        ]
    );
}

#[test]
fn direct_recursion_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(
        dir.path(),
        "loop.weave",
        "capability Show(combine)\nstruct Loop { next: Loop }\nderive Show for Loop\n",
    );

    let output = weavec(&["check", &schema, "--no-color"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("D0001"), "stderr: {}", err);
    assert!(
        err.contains("the type Loop recurses into itself with no intervening structure"),
        "stderr: {}",
        err
    );
}

#[test]
fn schema_error_stops_before_deriving() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write(dir.path(), "bad.weave", "struct P { x Int }\n");

    let output = weavec(&["check", &schema, "--no-color"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("S0003"), "stderr: {}", stderr(&output));
}

#[test]
fn manifest_project_uses_its_settings() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "weave.toml",
        "[project]\nname = \"people\"\nschema = \"src/person.weave\"\n\n[diagnostics]\nformat = \"json\"\n",
    );
    write(dir.path(), "src/person.weave", MISSING_EMAIL);

    let output = weavec(&["check", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let diagnostics = json_lines(&output);
    assert_eq!(diagnostics.len(), 1, "stderr: {}", stderr(&output));
    assert!(diagnostics[0]["file"]
        .as_str()
        .unwrap()
        .ends_with("person.weave"));
}

#[test]
fn manifest_with_unknown_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "weave.toml",
        "[project]\nname = \"p\"\nschema = \"main.weave\"\ncolour = true\n",
    );
    write(dir.path(), "main.weave", TREE);

    let output = weavec(&["check", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("error: failed to parse"), "stderr: {}", err);
}

#[test]
fn missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.weave");

    let output = weavec(&["check", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("does not exist"));
}

#[test]
fn directory_without_manifest_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let output = weavec(&["check", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no 'weave.toml' found"));
}
