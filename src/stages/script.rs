//! type-compile: script sources through the compiler, optional minifier and map emission.
//!
//! All-or-nothing: outputs are written only when every source compiled, so
//! a compile error never leaves a half-updated output directory behind.

use rayon::prelude::*;

use super::{renamed, write_outputs};
use crate::build::{BuildContext, SourceFile, StageError, StageKind, StageReport};
use crate::config::CompileConfig;
use crate::sourcemap::{self, CommentStyle, OutputFile};
use crate::tools::{SourceInput, ToolError, Toolchain};

const STAGE: StageKind = StageKind::TypeCompile;

pub fn run(ctx: &BuildContext) -> Result<StageReport, StageError> {
    let config = &ctx.env().typescript;
    let globs = ctx.input_globs(STAGE).map_err(|e| StageError::new(STAGE, e.to_string()))?;
    let sources = globs.files();
    let report = StageReport::new().with_inputs(sources.iter().map(|s| s.path.clone()).collect());

    if sources.is_empty() {
        tracing::warn!("{}: no sources matched {:?}", STAGE, config.src);
        return Ok(report);
    }

    let results: Vec<Result<Vec<OutputFile>, String>> = sources
        .par_iter()
        .map(|source| {
            compile(source, config, ctx.toolchain())
                .map_err(|e| format!("{}: {}", source.relative.display(), e))
        })
        .collect();

    let mut files = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(outputs) => files.extend(outputs),
            Err(message) => errors.push(message),
        }
    }
    if !errors.is_empty() {
        return Err(StageError::new(STAGE, errors.join("\n")));
    }

    let out_dir = ctx.resolve_path(&config.out_dir);
    let outputs = write_outputs(&out_dir, &files).map_err(|e| StageError::new(STAGE, e))?;
    Ok(StageReport { outputs, ..report })
}

fn compile(source: &SourceFile, config: &CompileConfig, tools: &Toolchain) -> Result<Vec<OutputFile>, ToolError> {
    let maps = &config.source_maps;
    let mut emitted = tools.script_compiler.compile(SourceInput::file(&source.path), maps.enabled)?;
    let relative = renamed(&source.relative, &config.out_ext);
    if config.minify {
        emitted = tools.script_minifier.minify(emitted, &relative)?;
    }
    Ok(sourcemap::emit(&relative, emitted.code, emitted.map, maps, CommentStyle::Line))
}
