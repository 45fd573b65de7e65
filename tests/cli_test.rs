use assert_cmd::Command;
use predicates::prelude::*;

// These tests only use the built-in archive pseudo-provider so no schema
// plugin needs to exist on PATH.

#[test]
fn convert_writes_the_target_program() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("main.tf"),
        r#"
data "archive_file" "src" {
  type        = "zip"
  source_file = "a.txt"
  output_path = "src.zip"
}

output "path" {
  value = "${data.archive_file.src.output_path}"
}
"#,
    )
    .unwrap();

    let out = dir.path().join("index.ts");
    Command::cargo_bin("terracast")
        .unwrap()
        .args([
            "--path",
            dir.path().to_str().unwrap(),
            "convert",
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted"));

    let program = std::fs::read_to_string(&out).unwrap();
    assert!(program.contains("new pulumi.asset.AssetArchive({"));
    assert!(program.contains("export const path = src.outputPath;"));
}

#[test]
fn graph_prints_dot_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("main.tf"),
        r#"
data "archive_file" "src" {
  type        = "zip"
  source_file = "a.txt"
  output_path = "src.zip"
}

output "path" {
  value = "${data.archive_file.src.output_path}"
}
"#,
    )
    .unwrap();

    Command::cargo_bin("terracast")
        .unwrap()
        .args(["--path", dir.path().to_str().unwrap(), "graph"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph nodes {"))
        .stdout(predicate::str::contains("data.archive_file.src"));
}

#[test]
fn missing_configuration_directory_fails() {
    Command::cargo_bin("terracast")
        .unwrap()
        .args(["--path", "/definitely/not/here", "convert"])
        .assert()
        .failure();
}
