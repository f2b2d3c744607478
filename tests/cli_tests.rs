use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn cmd() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("doccomb").unwrap()
}

fn json_output(args: &[&str]) -> serde_json::Value {
    let output = cmd().args(args).output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    serde_json::from_str(&stdout).unwrap()
}

const SHAPES: &str = r#"#pragma once

/// Shapes and their areas.

namespace shapes {
/// A circle.
struct Circle {
  /// Radius in meters.
  double radius;

  /// Area of the circle.
  double area() const;
};

/// Length type.
using meters = double;
}

/// Largest supported radius.
#define MAX_RADIUS 1000
"#;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("include")).unwrap();
    fs::write(dir.path().join("include/shapes.hxx"), SHAPES).unwrap();
    fs::write(dir.path().join(".doccombrc.toml"), "cache = \"\"\n").unwrap();
    dir
}

fn root(dir: &tempfile::TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[test]
fn scan_json_lists_comments() {
    let dir = project();
    let file = dir.path().join("include/shapes.hxx");
    let parsed = json_output(&["scan", file.to_str().unwrap(), "--format", "json"]);

    let comments = parsed["directive_comments"].as_array().unwrap();
    let found: Vec<_> = comments
        .iter()
        .map(|c| {
            (
                c["directive"].as_str().unwrap(),
                c["namespace"].as_str().unwrap(),
                c["signature"].as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        found,
        vec![
            ("struct", "shapes", "Circle"),
            ("member", "shapes::Circle", "double radius"),
            ("function", "shapes::Circle", "double area() const"),
            ("type-alias", "shapes", "meters = double"),
            ("macro", "", "MAX_RADIUS"),
        ]
    );
    assert_eq!(parsed["floating_comments"].as_array().unwrap().len(), 1);
    assert_eq!(
        parsed["floating_comments"][0]["text"][0],
        "Shapes and their areas."
    );
}

#[test]
fn scan_missing_file_fails() {
    cmd()
        .args(["scan", "/nonexistent/missing.hxx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.hxx"));
}

#[test]
fn index_reports_summary() {
    let dir = project();
    fs::write(dir.path().join("notes.txt"), "/// not a source file\n").unwrap();
    let parsed = json_output(&["index", root(&dir), "--format", "json"]);
    assert_eq!(parsed["summary"]["files"], 1);
    assert_eq!(parsed["summary"]["directive_comments"], 5);
    assert_eq!(parsed["summary"]["floating_comments"], 1);
    assert_eq!(parsed["files"][0]["file"], "include/shapes.hxx");
}

#[test]
fn index_text_output() {
    let dir = project();
    cmd()
        .args(["index", root(&dir)])
        .assert()
        .success()
        .stdout(predicate::str::contains("across"));
}

#[test]
fn duplicate_documentation_fails_with_both_locations() {
    let dir = project();
    fs::write(
        dir.path().join("include/again.hxx"),
        "namespace shapes {\n/// Another circle.\nstruct Circle {};\n}\n",
    )
    .unwrap();
    cmd()
        .args(["index", root(&dir)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate"))
        .stderr(predicate::str::contains("again.hxx:3"))
        .stderr(predicate::str::contains("shapes.hxx:7"));
}

#[test]
fn query_hit_prints_directive_block() {
    let dir = project();
    cmd()
        .args([
            "query",
            "cpp:function",
            "double",
            "area()",
            "const",
            "--namespace",
            "shapes::Circle",
            "--root",
            root(&dir),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            ".. cpp:function:: double area() const\n\n  Area of the circle.",
        ));
}

#[test]
fn query_class_renders_as_class() {
    let dir = project();
    cmd()
        .args(["query", "class", "Circle", "-n", "shapes", "-r", root(&dir)])
        .assert()
        .success()
        .stdout(predicate::str::contains(".. class:: Circle\n\n  A circle."));
}

#[test]
fn query_class_finds_struct() {
    let dir = project();
    let parsed = json_output(&[
        "query", "class", "Circle", "-n", "shapes", "-r", root(&dir), "-f", "json",
    ]);
    assert_eq!(parsed["found"], true);
    assert_eq!(parsed["comment"]["text"][0], "A circle.");
    assert_eq!(parsed["comment"]["file"], "include/shapes.hxx");
}

#[test]
fn query_miss_exits_1_with_close_matches() {
    let dir = project();
    cmd()
        .args([
            "query",
            "member",
            "double",
            "radus",
            "-n",
            "shapes::Circle",
            "-r",
            root(&dir),
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("no documentation"))
        .stdout(predicate::str::contains("double radius"))
        .stdout(predicate::str::contains("include/shapes.hxx:9"));
}

#[test]
fn query_records_document_references_in_cache() {
    let dir = project();
    fs::remove_file(dir.path().join(".doccombrc.toml")).unwrap();
    cmd()
        .args([
            "query", "macro", "MAX_RADIUS", "--document", "api/limits", "-r", root(&dir),
        ])
        .assert()
        .success();

    let cache = fs::read_to_string(dir.path().join(".doccomb-cache.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&cache).unwrap();
    let references = parsed["references"]["api/limits"].as_array().unwrap();
    assert_eq!(references.len(), 1);
    assert!(references[0]
        .as_str()
        .unwrap()
        .ends_with("shapes.hxx"));
}

#[test]
fn members_lists_namespace() {
    let dir = project();
    let parsed = json_output(&[
        "members", "--namespace", "shapes::Circle", "--root", root(&dir), "--format", "json",
    ]);
    let members = parsed["members"].as_array().unwrap();
    let signatures: Vec<_> = members
        .iter()
        .map(|m| m["signature"].as_str().unwrap())
        .collect();
    assert_eq!(signatures, vec!["double area() const", "double radius"]);
}

#[test]
fn members_of_unknown_namespace_is_empty() {
    let dir = project();
    let parsed = json_output(&["members", "-n", "nowhere", "-r", root(&dir), "-f", "json"]);
    assert!(parsed["members"].as_array().unwrap().is_empty());
}

#[test]
fn config_file_args_apply() {
    let dir = project();
    fs::write(
        dir.path().join("include/api.hxx"),
        "/// Declares Foo.\nDECLARE(Foo);\n",
    )
    .unwrap();
    let query = ["query", "function", "DECLARE(Foo)", "-r", root(&dir)];
    cmd().args(query).assert().success();

    // Once DECLARE is a known macro, the line is an expansion, not a
    // declaration, and the comment documents nothing.
    fs::write(
        dir.path().join(".doccombrc.toml"),
        "cache = \"\"\n\n[file_args]\n\"include/api.hxx\" = [\"-DDECLARE(x)=\"]\n",
    )
    .unwrap();
    cmd().args(query).assert().failure().code(1);
}

#[test]
fn format_from_config() {
    let dir = project();
    fs::write(
        dir.path().join(".doccombrc.toml"),
        "cache = \"\"\nformat = \"json\"\n",
    )
    .unwrap();
    let parsed = json_output(&["index", root(&dir)]);
    assert_eq!(parsed["summary"]["files"], 1);
}

#[test]
fn init_creates_config() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["init"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Created .doccombrc.toml"));

    assert!(dir.path().join(".doccombrc.toml").exists());
}

#[test]
fn init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".doccombrc.toml"), "").unwrap();
    cmd()
        .args(["init"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn init_then_index_uses_template() {
    let dir = project();
    fs::remove_file(dir.path().join(".doccombrc.toml")).unwrap();
    cmd().args(["init"]).current_dir(dir.path()).assert().success();
    cmd()
        .args(["index", root(&dir), "--format", "json"])
        .assert()
        .success();
    assert!(dir.path().join(".doccomb-cache.json").exists());
}
