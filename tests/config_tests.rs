//! Configuration discovery and environment selection tests.
//!
//! Tests that change the process working directory run serially.

use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use stagehand::config::{load_config, ConfigError, EnvironmentResolver};

const JSON5_DOC: &str = r#"{
  // staging is declared first
  staging: {
    html: { src: ["index.html"], outDir: "staging" },
    typescript: { src: ["a.ts"], outDir: "staging", outExt: ".js" },
    sass: { src: ["a.scss"], outDir: "staging", outExt: ".css" },
  },
  dev: {
    html: { src: ["index.html"], outDir: "out" },
    typescript: { src: ["a.ts"], outDir: "out", outExt: ".js" },
    sass: { src: ["a.scss"], outDir: "out", outExt: ".css" },
  },
}"#;

/// Run `f` with the working directory set to `dir`, restoring it afterwards.
fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir).unwrap();
    let result = f();
    env::set_current_dir(previous).unwrap();
    result
}

#[test]
#[serial]
fn test_discovers_config_from_working_directory() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config.json5"), JSON5_DOC).unwrap();
    let nested = temp.path().join("src/ts");
    fs::create_dir_all(&nested).unwrap();

    let (document, path) = in_dir(&nested, || load_config(None)).unwrap();
    assert!(path.ends_with("config.json5"));
    assert_eq!(document.names().collect::<Vec<_>>(), vec!["staging", "dev"]);
}

#[test]
#[serial]
fn test_no_config_found() {
    let temp = TempDir::new().unwrap();
    // A config in a parent of the temp dir would be found instead
    if stagehand::config::loader::find_config_from(temp.path().to_path_buf()).is_some() {
        return;
    }
    let result = in_dir(temp.path(), || load_config(None));
    assert!(matches!(result, Err(ConfigError::NotFound)));
}

#[test]
fn test_first_declared_environment_is_stable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json5");
    fs::write(&path, JSON5_DOC).unwrap();

    let (document, _) = load_config(Some(&path)).unwrap();
    let resolver = EnvironmentResolver::new(document);
    let first = resolver.resolve(None).unwrap().name.clone();
    assert_eq!(first, "staging");
    for _ in 0..3 {
        assert_eq!(resolver.resolve(None).unwrap().name, first);
    }
}

#[test]
fn test_empty_document_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    fs::write(&path, "{}").unwrap();

    let (document, _) = load_config(Some(&path)).unwrap();
    let err = EnvironmentResolver::new(document).resolve(None).unwrap_err();
    assert!(matches!(err, ConfigError::NoEnvironments));
}
