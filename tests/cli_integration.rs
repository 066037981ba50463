//! CLI integration tests
//!
//! These tests drive the packscout binary and check output and exit codes.

mod support;

use std::fs;
use std::process::{Command, Output};
use support::{
    formula_fixture, packscout_bin, project_fixture, JX_1_0_2_SHA256, JX_DESCRIPTION,
    JX_URL_TEMPLATE,
};
use tempfile::TempDir;

fn packscout(args: &[&str]) -> Output {
    Command::new(packscout_bin())
        .args(args)
        .env_remove("PACKSCOUT_REGISTRY")
        .env_remove("RUST_LOG")
        .env("PACKSCOUT_LOG_LEVEL", "error")
        .output()
        .expect("Failed to execute packscout")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_help() {
    let output = packscout(&["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["render", "verify", "regenerate", "classify", "scan", "checksum"] {
        assert!(text.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_cli_version() {
    let output = packscout(&["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_classify_prints_buildpack() {
    let path = project_fixture("java-maven");
    let output = packscout(&["classify", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).lines().next(), Some("maven"));
}

#[test]
fn test_classify_unknown() {
    let path = project_fixture("no-markers");
    let output = packscout(&["classify", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output).lines().next(), Some("unknown"));
}

#[test]
fn test_classify_json() {
    let path = project_fixture("node-express");
    let output = packscout(&["classify", path.to_str().unwrap(), "--format", "json"]);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["classification"]["buildpack"]["name"], "javascript");
    assert_eq!(value["classification"]["ambiguous"], false);
}

#[test]
fn test_classify_ambiguous_exits_2() {
    let dir = TempDir::new().unwrap();
    let registry = dir.path().join("packs.yaml");
    fs::write(
        &registry,
        r#"
buildpacks:
  - name: make
    priority: 10
    signals:
      - { type: marker_path, value: Makefile, weight: 5, mandatory: true }
  - name: cmake
    priority: 10
    signals:
      - { type: marker_path, value: Makefile, weight: 5, mandatory: true }
"#,
    )
    .unwrap();
    let project = dir.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("Makefile"), "all:\n").unwrap();

    let output = packscout(&[
        "classify",
        project.to_str().unwrap(),
        "--registry",
        registry.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert_eq!(text.lines().next(), Some("ambiguous"));
    assert!(text.contains("cmake"));
    assert!(text.contains("make"));
}

#[test]
fn test_classify_missing_path_fails() {
    let output = packscout(&["classify", "/nonexistent/packscout/project"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_scan_yaml() {
    let path = project_fixture("go-mod");
    let output = packscout(&["scan", path.to_str().unwrap(), "--format", "yaml"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("go.mod"));
    assert!(text.contains("has_marker_file"));
}

#[test]
fn test_verify_fixture_pair_fails() {
    let output = packscout(&[
        "verify",
        "--current",
        formula_fixture("current").to_str().unwrap(),
        "--golden",
        formula_fixture("golden").to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("-  version \"1.0.1\""));
    assert!(text.contains("+  version \"1.0.2\""));
    assert!(text.contains("0/1 fixtures match"));
}

#[test]
fn test_render_verify_regenerate_cycle() {
    let dir = TempDir::new().unwrap();
    let current = dir.path().join("current").join("jx.rb");
    let golden = dir.path().join("golden").join("jx.rb");

    let render = packscout(&[
        "render",
        "--binary",
        "jx",
        "--version",
        "1.0.2",
        "--checksum",
        JX_1_0_2_SHA256,
        "--url-template",
        JX_URL_TEMPLATE,
        "--shell",
        "bash",
        "--shell",
        "zsh",
        "--field",
        &format!("description={}", JX_DESCRIPTION),
        "--field",
        "homepage=https://jenkins-x.io/",
        "--strict",
        "--out",
        current.to_str().unwrap(),
    ]);
    assert!(render.status.success());
    assert_eq!(
        fs::read(&current).unwrap(),
        fs::read(formula_fixture("current")).unwrap()
    );

    let verify_args = [
        "verify",
        "--current",
        current.to_str().unwrap(),
        "--golden",
        golden.to_str().unwrap(),
    ];
    assert_eq!(packscout(&verify_args).status.code(), Some(1));
    assert!(!golden.exists());

    let regenerate = packscout(&[
        "regenerate",
        "--current",
        current.to_str().unwrap(),
        "--golden",
        golden.to_str().unwrap(),
    ]);
    assert!(regenerate.status.success());

    assert_eq!(packscout(&verify_args).status.code(), Some(0));
}

#[test]
fn test_render_missing_field_fails() {
    let output = packscout(&[
        "render",
        "--binary",
        "jx",
        "--version",
        "1.0.2",
        "--checksum",
        "abc",
        "--url-template",
        JX_URL_TEMPLATE,
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("description"));
}

#[test]
fn test_render_with_artifact_checksum() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("jx.tar.gz");
    fs::write(&artifact, b"abc").unwrap();
    let template = dir.path().join("line.txt.tmpl");
    fs::write(&template, "{{binary_name}} {{version}} {{checksum}}\n").unwrap();

    let output = packscout(&[
        "render",
        "--template",
        template.to_str().unwrap(),
        "--binary",
        "jx",
        "--version",
        "2.0.0",
        "--artifact",
        artifact.to_str().unwrap(),
        "--url-template",
        "https://example.com/jx",
    ]);

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "jx 2.0.0 ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n"
    );
}

#[test]
fn test_checksum_command() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("empty");
    fs::write(&file, b"").unwrap();

    let output = packscout(&["checksum", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_config_json() {
    let output = packscout(&["config", "--format", "json"]);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["log_level"], "error");
    assert_eq!(value["registry"], "built-in");
}

#[test]
fn test_invalid_config_fails() {
    let output = Command::new(packscout_bin())
        .args(["config"])
        .env("PACKSCOUT_TIMEOUT", "0")
        .output()
        .expect("Failed to execute packscout");
    assert_eq!(output.status.code(), Some(1));
}
