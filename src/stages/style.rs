//! style-compile: prefix, compile, optionally minify and map each stylesheet.
//!
//! Errors are logged and collected as problems; files that compiled are
//! still written and the stage reports degraded success.

use rayon::prelude::*;

use super::{renamed, write_outputs};
use crate::build::{BuildContext, SourceFile, StageError, StageKind, StageReport};
use crate::config::StyleConfig;
use crate::sourcemap::{self, CommentStyle, OutputFile};
use crate::tools::{SourceInput, ToolError, Toolchain};

const STAGE: StageKind = StageKind::StyleCompile;

/// Partials (`_name.scss`) are only compiled through the files that import them.
fn is_partial(source: &SourceFile) -> bool {
    source.path.file_name().is_some_and(|name| name.to_string_lossy().starts_with('_'))
}

pub fn run(ctx: &BuildContext) -> Result<StageReport, StageError> {
    let config = &ctx.env().sass;
    let globs = ctx.input_globs(STAGE).map_err(|e| StageError::new(STAGE, e.to_string()))?;
    let sources: Vec<SourceFile> = globs.files().into_iter().filter(|s| !is_partial(s)).collect();
    let mut report = StageReport::new().with_inputs(sources.iter().map(|s| s.path.clone()).collect());

    let results: Vec<Result<Vec<OutputFile>, String>> = sources
        .par_iter()
        .map(|source| {
            compile(source, config, ctx.toolchain())
                .map_err(|e| format!("{}: {}", source.relative.display(), e))
        })
        .collect();

    let out_dir = ctx.resolve_path(&config.compile.out_dir);
    for result in results {
        let written = result.and_then(|files| write_outputs(&out_dir, &files));
        match written {
            Ok(paths) => report.outputs.extend(paths),
            Err(message) => {
                tracing::error!("{}: {}", STAGE, message);
                report.problems.push(message);
            }
        }
    }

    Ok(report)
}

fn compile(source: &SourceFile, config: &StyleConfig, tools: &Toolchain) -> Result<Vec<OutputFile>, ToolError> {
    let compile = &config.compile;
    let maps = &compile.source_maps;

    let text = SourceInput::file(&source.path).read()?;
    let prefixed = tools.style_prefixer.prefix(&text, &source.path)?;
    let mut emitted = tools.style_compiler.compile(SourceInput::rewritten(&source.path, &prefixed), maps.enabled)?;

    let relative = renamed(&source.relative, &compile.out_ext);
    if compile.minify {
        emitted = tools.style_minifier.minify(emitted, &relative)?;
    }
    Ok(sourcemap::emit(&relative, emitted.code, emitted.map, maps, CommentStyle::Block))
}
