// Integration tests for the recipe-rs binary
use std::{fs, path::Path, process::Command};

use tempfile::tempdir;

fn recipe_rs(recipe: &Path, run: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_recipe-rs"))
        .arg("--recipe")
        .arg(recipe)
        .arg("--run-dir")
        .arg(run)
        .args(args)
        .output()
        .expect("Failed to run binary")
}

#[test]
fn test_export_with_override_then_show() {
    let recipe = tempdir().unwrap();
    let run = tempdir().unwrap();
    fs::write(recipe.path().join("recipe.yaml"), "name: brokkr\n").unwrap();
    fs::write(recipe.path().join("LICENSE"), "MIT\n").unwrap();

    let export = recipe_rs(recipe.path(), run.path(), &["--pkg-version", "1.2.3", "export"]);
    assert!(
        export.status.success(),
        "{}",
        String::from_utf8_lossy(&export.stderr)
    );
    assert!(String::from_utf8_lossy(&export.stdout).contains("origin_kind: local"));
    assert!(run.path().join("export_source/LICENSE").is_file());

    let show = recipe_rs(recipe.path(), run.path(), &["show"]);
    let stdout = String::from_utf8_lossy(&show.stdout);
    assert!(show.status.success());
    assert!(stdout.contains("version:"));
    assert!(stdout.contains("1.2.3"));
    assert!(stdout.contains("origin_kind: local"));
    assert!(stdout.contains("state: source_identity_recorded"));
}

#[test]
fn test_show_before_export_fails() {
    let recipe = tempdir().unwrap();
    let run = tempdir().unwrap();
    fs::write(recipe.path().join("recipe.yaml"), "name: brokkr\n").unwrap();

    let show = recipe_rs(recipe.path(), run.path(), &["show"]);
    assert!(!show.status.success());
    assert!(String::from_utf8_lossy(&show.stderr).contains("Diagnostic ID"));
}

#[test]
fn test_missing_recipe_file_fails() {
    let recipe = tempdir().unwrap();
    let run = tempdir().unwrap();

    let export = recipe_rs(recipe.path(), run.path(), &["--pkg-version", "1.0.0", "export"]);
    assert!(!export.status.success());
}

#[test]
fn test_log_file_respects_env_filter() {
    let recipe = tempdir().unwrap();
    let run = tempdir().unwrap();
    fs::write(recipe.path().join("recipe.yaml"), "name: brokkr\n").unwrap();

    let export = Command::new(env!("CARGO_BIN_EXE_recipe-rs"))
        .env("RUST_LOG", "info")
        .arg("--recipe")
        .arg(recipe.path())
        .arg("--run-dir")
        .arg(run.path())
        .args(["--pkg-version", "1.2.3", "export"])
        .output()
        .expect("Failed to run binary");
    assert!(
        export.status.success(),
        "{}",
        String::from_utf8_lossy(&export.stderr)
    );

    let mut log = String::new();
    for entry in fs::read_dir(run.path().join("logs")).unwrap() {
        log.push_str(&fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    assert!(log.contains("stage started"));
    assert!(!log.contains("\"level\":\"DEBUG\""));
    assert!(!log.contains("\"level\":\"TRACE\""));
}
