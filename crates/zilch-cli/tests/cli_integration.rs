//! CLI subprocess integration tests.
//!
//! These tests invoke the `zilch` binary as a subprocess against the mock
//! backend and verify exit codes, manifest contents, and JSON output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn zilch_bin(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_zilch"));
    cmd.env("ZILCH_BACKEND", "mock")
        .env("HOME", home)
        .env_remove("ZILCH_PATH");
    cmd
}

fn write_manifest(dir: &Path) -> PathBuf {
    let path = dir.join("zilch.toml");
    fs::write(
        &path,
        format!(
            "version = 1\nresource_path = \"{}\"\n",
            dir.join("res").display()
        ),
    )
    .unwrap();
    path
}

#[test]
fn cli_version_exits_zero() {
    let home = tempfile::tempdir().unwrap();
    let output = zilch_bin(home.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "zilch --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("zilch"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    let output = zilch_bin(home.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["install", "remove", "sync", "shell", "source"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn install_writes_manifest_and_build_description() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());

    let output = zilch_bin(home.path())
        .args(["--path", &manifest.to_string_lossy(), "install", "hello"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "install failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let text = fs::read_to_string(&manifest).unwrap();
    assert!(text.contains("name = \"hello\""));
    assert!(text.contains("alias = \"nixpkgs\""));

    let res = project.path().join("res");
    assert!(res.join("flake.nix").exists());
    assert!(res.join("flake.lock").exists());
    let flake = fs::read_to_string(res.join("flake.nix")).unwrap();
    assert!(!flake.contains("?rev="), "flake must stay floating: {flake}");
}

#[test]
fn list_shows_installed_packages() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "install", "hello", "cowsay"])
        .status()
        .unwrap()
        .success());

    let output = zilch_bin(home.path())
        .args(["--path", &path, "list"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"));
    assert!(stdout.contains("cowsay"));
}

#[test]
fn list_json_is_parseable() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "install", "hello"])
        .status()
        .unwrap()
        .success());

    let output = zilch_bin(home.path())
        .args(["--path", &path, "--json", "list"])
        .output()
        .unwrap();
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("list --json must emit valid JSON");
    assert_eq!(parsed[0]["name"], "hello");
    assert_eq!(parsed[0]["source"], "nixpkgs");
}

#[test]
fn remove_deletes_the_manifest_entry() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "install", "hello"])
        .status()
        .unwrap()
        .success());
    assert!(zilch_bin(home.path())
        .args(["--path", &path, "remove", "hello"])
        .status()
        .unwrap()
        .success());

    let text = fs::read_to_string(&manifest).unwrap();
    assert!(!text.contains("name = \"hello\""));
}

#[test]
fn install_from_unknown_source_fails_and_leaves_manifest_alone() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let before = fs::read_to_string(&manifest).unwrap();

    let output = zilch_bin(home.path())
        .args([
            "--path",
            &manifest.to_string_lossy(),
            "--source",
            "ghost",
            "install",
            "hello",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ghost"), "stderr: {stderr}");
    assert_eq!(fs::read_to_string(&manifest).unwrap(), before);
}

#[test]
fn batch_install_continues_past_bad_items() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "install", "hello"])
        .status()
        .unwrap()
        .success());

    // Second install of `hello` fails per-item; `cowsay` still lands.
    let output = zilch_bin(home.path())
        .args(["--path", &path, "install", "hello", "cowsay"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = fs::read_to_string(&manifest).unwrap();
    assert!(text.contains("name = \"cowsay\""));
}

#[test]
fn source_add_list_remove_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "source", "add", "github:foo/bar", "bar"])
        .status()
        .unwrap()
        .success());

    let output = zilch_bin(home.path())
        .args(["--path", &path, "source", "list"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bar"));
    assert!(stdout.contains("nixpkgs"));

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "source", "remove", "bar"])
        .status()
        .unwrap()
        .success());
    let text = fs::read_to_string(&manifest).unwrap();
    assert!(!text.contains("alias = \"bar\""));
}

#[test]
fn source_remove_refuses_while_in_use() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    assert!(zilch_bin(home.path())
        .args(["--path", &path, "install", "hello"])
        .status()
        .unwrap()
        .success());

    let output = zilch_bin(home.path())
        .args(["--path", &path, "source", "remove", "nixpkgs"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("still used"), "stderr: {stderr}");
}

#[test]
fn shell_applies_the_environment_delta() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());
    let path = manifest.to_string_lossy().to_string();

    let status = zilch_bin(home.path())
        .args([
            "--path",
            &path,
            "shell",
            "--",
            "sh",
            "-c",
            "test \"$ZILCH_MOCK_ENV\" = \"1\"",
        ])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn shell_propagates_command_exit_status() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());

    let status = zilch_bin(home.path())
        .args([
            "--path",
            &manifest.to_string_lossy(),
            "shell",
            "--",
            "false",
        ])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn search_reports_entries_per_source() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path());

    let output = zilch_bin(home.path())
        .args(["--path", &manifest.to_string_lossy(), "search", "ripgrep"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ripgrep"));
    assert!(stdout.contains("nixpkgs"));
}

#[test]
fn completions_generate_without_a_project() {
    let home = tempfile::tempdir().unwrap();
    let output = zilch_bin(home.path())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}
