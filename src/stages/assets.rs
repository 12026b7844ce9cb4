//! asset-copy: copy every declared `{src, outDir}` pair verbatim.
//!
//! Pairs are independent and copied concurrently; the stage succeeds only
//! when every pair did.

use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;

use crate::build::{BuildContext, GlobSet, StageError, StageKind, StageReport};
use crate::config::AssetPair;

const STAGE: StageKind = StageKind::AssetCopy;

/// Inputs and written files of one pair.
type Copied = (Vec<PathBuf>, Vec<PathBuf>);

fn copy_pair(ctx: &BuildContext, pair: &AssetPair) -> Result<Copied, String> {
    let globs = GlobSet::new(ctx.project_root(), &pair.src).map_err(|e| e.to_string())?;
    let out_dir = ctx.resolve_path(&pair.out_dir);

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for source in globs.files() {
        let dest = out_dir.join(&source.relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
        }
        fs::copy(&source.path, &dest)
            .map_err(|e| format!("Failed to copy {} to {}: {}", source.path.display(), dest.display(), e))?;
        inputs.push(source.path);
        outputs.push(dest);
    }

    tracing::debug!("Copied {} file(s) into {}", outputs.len(), out_dir.display());
    Ok((inputs, outputs))
}

pub fn run(ctx: &BuildContext) -> Result<StageReport, StageError> {
    let results: Vec<Result<Copied, String>> =
        ctx.env().assets.par_iter().map(|pair| copy_pair(ctx, pair)).collect();

    let mut report = StageReport::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok((inputs, outputs)) => {
                report.inputs.extend(inputs);
                report.outputs.extend(outputs);
            }
            Err(message) => errors.push(message),
        }
    }

    if errors.is_empty() {
        Ok(report)
    } else {
        Err(StageError::new(STAGE, errors.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::context::sample_environment;
    use crate::tools::Toolchain;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn context(root: &Path, assets: Vec<AssetPair>) -> BuildContext {
        let mut env = sample_environment();
        env.assets = assets;
        BuildContext::from_parts("dev", Arc::new(env), root.to_path_buf(), Toolchain::passthrough())
    }

    fn pair(src: &[&str], out_dir: &str) -> AssetPair {
        AssetPair { src: src.iter().map(|s| s.to_string()).collect(), out_dir: PathBuf::from(out_dir) }
    }

    #[test]
    fn test_copies_every_pair_verbatim() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/img/logo.png", &[0x89, b'P', b'N', b'G']);
        write(temp.path(), "src/img/icons/x.svg", b"<svg/>");
        write(temp.path(), "src/fonts/a.woff2", b"font");

        let ctx = context(
            temp.path(),
            vec![pair(&["src/img/**/*"], "out/img"), pair(&["src/fonts/*.woff2"], "out/fonts")],
        );
        let report = run(&ctx).unwrap();

        assert_eq!(report.outputs.len(), 3);
        assert_eq!(fs::read(temp.path().join("out/img/logo.png")).unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert_eq!(fs::read(temp.path().join("out/img/icons/x.svg")).unwrap(), b"<svg/>");
        assert_eq!(fs::read(temp.path().join("out/fonts/a.woff2")).unwrap(), b"font");
    }

    #[test]
    fn test_no_pairs() {
        let temp = TempDir::new().unwrap();
        let report = run(&context(temp.path(), vec![])).unwrap();
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn test_one_failing_pair_fails_the_stage() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/img/logo.png", b"png");
        // A file where the output directory should be
        write(temp.path(), "blocked", b"");

        let ctx = context(temp.path(), vec![pair(&["src/img/*"], "out/img"), pair(&["src/img/*"], "blocked/img")]);
        let err = run(&ctx).unwrap_err();
        assert_eq!(err.stage, StageKind::AssetCopy);
        assert!(err.message.contains("blocked"), "{}", err.message);
        assert!(temp.path().join("out/img/logo.png").exists());
    }
}
