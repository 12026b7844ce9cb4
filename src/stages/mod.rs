//! Concrete transform stages.
//!
//! Each stage reads its file set from the environment, hands the files to
//! the collaborators in the [`crate::tools::Toolchain`], and writes into its
//! output directory. All stages are safe to re-run: outputs are overwritten
//! with the same bytes for the same inputs.

pub mod assets;
pub mod cleanup;
pub mod markup;
pub mod script;
pub mod size;
pub mod style;

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::{BuildContext, StageError, StageKind, StageReport};
use crate::sourcemap::OutputFile;

/// Run one stage against the context.
pub fn run(kind: StageKind, ctx: &BuildContext) -> Result<StageReport, StageError> {
    match kind {
        StageKind::Cleanup => cleanup::run(ctx),
        StageKind::TypeCompile => script::run(ctx),
        StageKind::StyleCompile => style::run(ctx),
        StageKind::MarkupInclude => markup::run(ctx),
        StageKind::AssetCopy => assets::run(ctx),
        StageKind::SizeReport => size::run(ctx),
    }
}

/// Output path for a source: same relative location, extension replaced by `out_ext`.
///
/// Only the last extension is replaced, so `app.ts` with `.min.js` becomes `app.min.js`.
pub(crate) fn renamed(relative: &Path, out_ext: &str) -> PathBuf {
    let stem = relative.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    relative.with_file_name(format!("{}{}", stem, out_ext))
}

/// Write one file, creating parent directories.
pub(crate) fn write_file(path: &Path, contents: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    fs::write(path, contents).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

/// Write rendered outputs below `out_dir`, returning the written paths.
pub(crate) fn write_outputs(out_dir: &Path, files: &[OutputFile]) -> Result<Vec<PathBuf>, String> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = out_dir.join(&file.relative);
        write_file(&path, file.contents.as_bytes())?;
        written.push(path);
    }
    Ok(written)
}
