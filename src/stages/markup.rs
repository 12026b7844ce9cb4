//! markup-include: expand inclusion directives in every markup source.

use super::write_file;
use crate::build::{BuildContext, StageError, StageKind, StageReport};
use crate::include::Expander;

const STAGE: StageKind = StageKind::MarkupInclude;

pub fn run(ctx: &BuildContext) -> Result<StageReport, StageError> {
    let html = &ctx.env().html;
    let expander = Expander::from_config(html, ctx.project_root()).map_err(|e| StageError::new(STAGE, e.to_string()))?;
    let globs = ctx.input_globs(STAGE).map_err(|e| StageError::new(STAGE, e.to_string()))?;
    let sources = globs.files();

    let mut expanded = Vec::with_capacity(sources.len());
    for source in &sources {
        let text = expander
            .expand_file(&source.path)
            .map_err(|e| StageError::new(STAGE, format!("{}: {}", source.relative.display(), e)))?;
        expanded.push((&source.relative, text));
    }

    let out_dir = ctx.resolve_path(&html.out_dir);
    let mut report = StageReport::new().with_inputs(sources.iter().map(|s| s.path.clone()).collect());
    for (relative, text) in expanded {
        let path = out_dir.join(relative);
        write_file(&path, text.as_bytes()).map_err(|e| StageError::new(STAGE, e))?;
        report.outputs.push(path);
    }
    Ok(report)
}
