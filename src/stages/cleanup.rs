//! cleanup: delete the declared output paths.
//!
//! Entries are literal paths or globs (with `!` exclusions) relative to the
//! project root. Every match is checked before anything is deleted: a match
//! outside the project root, or the root itself, refuses the whole run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::{has_glob_meta, BuildContext, GlobSet, StageError, StageKind, StageReport};

const STAGE: StageKind = StageKind::Cleanup;

/// Canonical location of an existing entry. A symlink resolves to the link
/// itself, never its target.
fn resolve_entry(entry: &Path) -> Result<PathBuf, String> {
    let resolved = match (entry.parent(), entry.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().map(|p| p.join(name)),
        _ => entry.canonicalize(),
    };
    resolved.map_err(|e| format!("Cannot resolve {}: {}", entry.display(), e))
}

/// Resolve `patterns` to the existing paths they name, refusing unsafe ones.
pub fn plan(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let globs = GlobSet::new(root, patterns).map_err(|e| e.to_string())?;
    let mut entries = globs.entries();
    for literal in patterns.iter().filter(|p| !p.starts_with('!') && !has_glob_meta(p)) {
        let path = root.join(literal);
        if fs::symlink_metadata(&path).is_ok() && !globs.is_excluded(&path) {
            entries.push(path);
        }
    }
    if entries.is_empty() {
        return Ok(entries);
    }

    let root = root.canonicalize().map_err(|e| format!("Cannot resolve project root {}: {}", root.display(), e))?;
    let mut targets = Vec::with_capacity(entries.len());
    for entry in entries {
        let resolved = resolve_entry(&entry)?;
        if resolved == root || !resolved.starts_with(&root) {
            return Err(format!("Refusing to delete {}: outside the project root", entry.display()));
        }
        targets.push(resolved);
    }

    targets.sort();
    targets.dedup();
    Ok(targets)
}

fn remove(path: &Path) -> std::io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

pub fn run(ctx: &BuildContext) -> Result<StageReport, StageError> {
    let targets = plan(ctx.project_root(), &ctx.env().clean).map_err(|e| StageError::new(STAGE, e))?;

    let mut report = StageReport::new();
    for target in targets {
        // Parents sort first; their children are already gone
        match remove(&target) {
            Ok(true) => {
                tracing::debug!("Deleted {}", target.display());
                report.outputs.push(target);
            }
            Ok(false) => {}
            Err(e) => {
                return Err(StageError::new(STAGE, format!("Failed to delete {}: {}", target.display(), e)));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::context::sample_environment;
    use crate::tools::Toolchain;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn context(root: &Path, clean: &[&str]) -> BuildContext {
        let mut env = sample_environment();
        env.clean = patterns(clean);
        BuildContext::from_parts("dev", Arc::new(env), root.to_path_buf(), Toolchain::passthrough())
    }

    #[test]
    fn test_deletes_declared_directory() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out/js/a.js");
        touch(temp.path(), "src/a.ts");

        let report = run(&context(temp.path(), &["out"])).unwrap();
        assert_eq!(report.outputs.len(), 1);
        assert!(!temp.path().join("out").exists());
        assert!(temp.path().join("src/a.ts").exists());
    }

    #[test]
    fn test_missing_paths_are_a_no_op() {
        let temp = TempDir::new().unwrap();
        let report = run(&context(temp.path(), &["out", "dist/**"])).unwrap();
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn test_globs_with_exclusions() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out/a.js");
        touch(temp.path(), "out/b.css");
        touch(temp.path(), "out/keep.txt");

        run(&context(temp.path(), &["out/*", "!out/keep.txt"])).unwrap();
        assert!(!temp.path().join("out/a.js").exists());
        assert!(!temp.path().join("out/b.css").exists());
        assert!(temp.path().join("out/keep.txt").exists());
    }

    #[test]
    fn test_nested_matches_are_deleted_once() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out/js/a.js");

        let report = run(&context(temp.path(), &["out", "out/**"])).unwrap();
        assert_eq!(report.outputs, vec![temp.path().canonicalize().unwrap().join("out")]);
    }

    #[test]
    fn test_refuses_paths_outside_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("project");
        touch(&root, "out/a.js");
        touch(outer.path(), "precious/data.txt");

        let err = run(&context(&root, &["out", "../precious"])).unwrap_err();
        assert!(err.message.contains("outside the project root"), "{}", err.message);
        assert!(outer.path().join("precious/data.txt").exists());
        // Nothing is deleted when any entry is refused
        assert!(root.join("out/a.js").exists());
    }

    #[test]
    fn test_refuses_project_root() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/a.ts");

        let err = plan(temp.path(), &patterns(&["."])).unwrap_err();
        assert!(err.contains("Refusing"));
        assert!(temp.path().join("src/a.ts").exists());
    }
}
