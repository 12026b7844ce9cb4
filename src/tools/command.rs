//! External-command collaborator.
//!
//! Runs a configured program in a scratch directory. The program either
//! writes `{output}` (preferred), writes `<stem>.<emitExt>` somewhere below
//! `{outdir}`, or prints the result on stdout. Succeeding without any of
//! these is a failure. When a map is requested, `<emitted>.map` is picked up
//! if the program wrote one.
//!
//! `{project}` expands to a scratch compiler project that extends the
//! configured project file and lists only the input.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{Compiler, Emitted, Minifier, SourceInput, ToolError};
use crate::config::ToolCommand;
use crate::sourcemap::strip_mapping_comment;

/// A compiler or minifier backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandTool {
    command: ToolCommand,
    working_dir: PathBuf,
    project: Option<PathBuf>,
}

impl CommandTool {
    pub fn new(command: ToolCommand, working_dir: &Path) -> Self {
        Self { command, working_dir: working_dir.to_path_buf(), project: None }
    }

    /// Project file extended by the scratch project behind `{project}`.
    pub fn with_project(mut self, project: PathBuf) -> Self {
        self.project = Some(project);
        self
    }

    /// Name of the program, for messages.
    pub fn program(&self) -> &str {
        &self.command.program
    }

    /// Expand `{input}`, `{output}`, `{outdir}` and `{dir}` in one argument.
    fn expand(arg: &str, input: &Path, output: &Path, outdir: &Path, dir: &Path) -> String {
        arg.replace("{input}", &input.to_string_lossy())
            .replace("{output}", &output.to_string_lossy())
            .replace("{outdir}", &outdir.to_string_lossy())
            .replace("{dir}", &dir.to_string_lossy())
    }

    /// Write `scratch/tsconfig.json`: the configured project (when it exists)
    /// narrowed to `input`.
    fn write_project(&self, input: &Path, scratch: &Path) -> Result<PathBuf, ToolError> {
        let mut project = serde_json::json!({
            "files": [input.to_string_lossy()],
            "include": [],
        });
        if let Some(base) = self.project.as_ref().filter(|p| p.is_file()) {
            project["extends"] = serde_json::Value::String(base.to_string_lossy().into_owned());
        }
        let path = scratch.join("tsconfig.json");
        fs::write(&path, project.to_string())
            .map_err(|source| ToolError::Io { context: format!("writing {}", path.display()), source })?;
        Ok(path)
    }

    /// Find what the program emitted for `input`.
    ///
    /// Compilers that mirror the source tree (tsc after widening its root)
    /// write `<subdir>/<stem>.<ext>` instead of `{output}`; the match is the
    /// file whose scratch-relative path is a suffix of the input path.
    fn find_emitted(&self, input: &Path, output: &Path, scratch: &Path) -> Option<PathBuf> {
        if output.is_file() {
            return Some(output.to_path_buf());
        }
        let file_name = output.file_name()?;
        let staged = scratch.join("in");
        let mut stack = vec![scratch.to_path_buf()];
        let mut best: Option<(usize, PathBuf)> = None;
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if path != staged {
                        stack.push(path);
                    }
                    continue;
                }
                if path.file_name() != Some(file_name) {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(scratch) else { continue };
                let Some(parent) = relative.parent() else { continue };
                if !input.parent().unwrap_or(Path::new("")).ends_with(parent) {
                    continue;
                }
                let depth = parent.components().count();
                if best.as_ref().map_or(true, |(d, _)| depth > *d) {
                    best = Some((depth, path));
                }
            }
        }
        best.map(|(_, path)| path)
    }

    /// Run the program on `input`. `origin` is the user-visible source path.
    fn run(&self, input: &Path, origin: &Path, scratch: &Path, want_map: bool) -> Result<Emitted, ToolError> {
        let stem = origin.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let output = scratch.join(format!("{}.{}", stem, self.command.emit_ext));
        let dir = origin.parent().unwrap_or(Path::new("."));

        let extra = if want_map { &self.command.source_map_args } else { &self.command.no_source_map_args };
        let uses_project = self.command.args.iter().chain(extra.iter()).any(|arg| arg.contains("{project}"));
        let project = if uses_project { Some(self.write_project(input, scratch)?) } else { None };
        let args: Vec<String> = self
            .command
            .args
            .iter()
            .chain(extra.iter())
            .map(|arg| {
                let arg = Self::expand(arg, input, &output, scratch, dir);
                match &project {
                    Some(project) => arg.replace("{project}", &project.to_string_lossy()),
                    None => arg,
                }
            })
            .collect();

        tracing::debug!("Running {} {}", self.command.program, args.join(" "));
        let result = Command::new(&self.command.program)
            .args(&args)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|source| ToolError::Spawn { program: self.command.program.clone(), source })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stdout = String::from_utf8_lossy(&result.stdout);
            // tsc reports diagnostics on stdout
            let message = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
            return Err(ToolError::Failed {
                program: self.command.program.clone(),
                status: result.status.to_string(),
                message: message.to_string(),
            });
        }

        let emitted = self.find_emitted(input, &output, scratch);
        let code = match &emitted {
            Some(path) => fs::read_to_string(path).map_err(|source| ToolError::Io {
                context: format!("reading {} output", self.command.program),
                source,
            })?,
            None if !result.stdout.is_empty() => String::from_utf8_lossy(&result.stdout).into_owned(),
            None => {
                return Err(ToolError::Failed {
                    program: self.command.program.clone(),
                    status: result.status.to_string(),
                    message: format!("produced no output for {}", origin.display()),
                })
            }
        };

        let map = match (&emitted, want_map) {
            (Some(path), true) => fs::read_to_string(format!("{}.map", path.display())).ok(),
            _ => None,
        };

        Ok(Emitted { code: strip_mapping_comment(&code), map })
    }

    fn scratch(&self) -> Result<tempfile::TempDir, ToolError> {
        tempfile::Builder::new()
            .prefix("stagehand-")
            .tempdir()
            .map_err(|source| ToolError::Io { context: "creating scratch directory".to_string(), source })
    }

    /// Write `contents` to `scratch/in/<name>` and return that path.
    fn stage_input(scratch: &Path, name: &Path, contents: &str) -> Result<PathBuf, ToolError> {
        let dir = scratch.join("in");
        let file_name = name.file_name().unwrap_or(name.as_os_str());
        let path = dir.join(file_name);
        fs::create_dir_all(&dir)
            .and_then(|_| fs::write(&path, contents))
            .map_err(|source| ToolError::Io { context: format!("staging {}", path.display()), source })?;
        Ok(path)
    }
}

impl Compiler for CommandTool {
    fn compile(&self, input: SourceInput<'_>, want_map: bool) -> Result<Emitted, ToolError> {
        let scratch = self.scratch()?;
        let actual = match input.contents {
            Some(contents) => Self::stage_input(scratch.path(), input.path, contents)?,
            None => input.path.to_path_buf(),
        };
        self.run(&actual, input.path, scratch.path(), want_map)
    }
}

impl Minifier for CommandTool {
    fn minify(&self, emitted: Emitted, path: &Path) -> Result<Emitted, ToolError> {
        let scratch = self.scratch()?;
        let staged = Self::stage_input(scratch.path(), path, &emitted.code)?;
        let minified = self.run(&staged, path, scratch.path(), false)?;
        // The tool does not see the incoming map; keep it rather than lose it
        Ok(Emitted { code: minified.code, map: minified.map.or(emitted.map) })
    }
}
