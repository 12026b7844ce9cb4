//! CLI integration tests for the `stagehand` binary.
//!
//! Runs the built binary inside scratch projects and checks exit codes and
//! the resulting output trees.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run stagehand in `dir` with the given arguments.
fn stagehand(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stagehand"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute stagehand")
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// The single-environment project; `cp` stands in for both compilers.
fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "stagehand.toml",
        r#"
[dev]
clean = ["out"]
assets = []
html = { src = ["index.html"], outDir = "out" }
typescript = { src = ["a.ts"], outDir = "out", outExt = ".js", minify = false, sourceMaps = { use = false } }
sass = { src = ["a.scss"], outDir = "out", outExt = ".css" }

[dev.tools.typescript]
program = "cp"
args = ["{input}", "{output}"]
emitExt = "js"

[dev.tools.sass]
program = "cp"
args = ["{input}", "{output}"]
emitExt = "css"
"#,
    );
    write(temp.path(), "a.ts", "console.log(1);\n");
    write(temp.path(), "a.scss", "a { color: red; }\n");
    write(temp.path(), "nav.html", "<nav></nav>\n");
    write(temp.path(), "index.html", "<body>\n  @@include('nav.html')\n</body>\n");
    temp
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn test_unknown_environment_exits_nonzero_without_side_effects() {
    let temp = project();
    write(temp.path(), "out/keep.txt", "precious");

    let output = stagehand(temp.path(), &["full-build", "--env", "prod"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown environment 'prod'"), "{}", stderr);
    assert!(stderr.contains("dev"), "{}", stderr);
    assert_eq!(fs::read_to_string(temp.path().join("out/keep.txt")).unwrap(), "precious");
}

#[test]
fn test_missing_config_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nowhere.toml");
    let output = stagehand(temp.path(), &["--config", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unknown_task_is_invalid_usage() {
    let temp = project();
    let output = stagehand(temp.path(), &["deploy"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_help_task() {
    let temp = TempDir::new().unwrap();
    let output = stagehand(temp.path(), &["help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("full-build"), "{}", stdout);
    assert!(stdout.contains("--env"), "{}", stdout);
}

// ============================================================================
// Builds
// ============================================================================

#[cfg(unix)]
#[test]
fn test_default_task_runs_full_build() {
    let temp = project();
    write(temp.path(), "out/stale.js", "old");

    let output = stagehand(temp.path(), &[]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let out = temp.path().join("out");
    assert!(!out.join("stale.js").exists());
    assert_eq!(fs::read_to_string(out.join("a.js")).unwrap(), "console.log(1);\n");
    assert!(!out.join("a.js.map").exists());
    assert!(out.join("a.css").exists());
    assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "<body>\n  <nav></nav>\n</body>\n");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Build succeeded"), "{}", stdout);
}

#[cfg(unix)]
#[test]
fn test_failing_compiler_fails_build() {
    let temp = project();
    let config = fs::read_to_string(temp.path().join("stagehand.toml")).unwrap();
    fs::write(temp.path().join("stagehand.toml"), config.replacen("program = \"cp\"", "program = \"false\"", 1))
        .unwrap();

    let output = stagehand(temp.path(), &["full-build"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("type-compile"), "{}", stderr);
    assert!(!temp.path().join("out/index.html").exists());
}

#[cfg(unix)]
#[test]
fn test_single_stage_task() {
    let temp = project();
    let output = stagehand(temp.path(), &["html"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(temp.path().join("out/index.html").exists());
    assert!(!temp.path().join("out/a.js").exists());
}

#[test]
fn test_config_found_from_subdirectory() {
    let temp = project();
    fs::create_dir_all(temp.path().join("deep/er")).unwrap();

    let output = stagehand(&temp.path().join("deep/er"), &["clean"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}
