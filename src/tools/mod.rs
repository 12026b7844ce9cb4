//! Transform collaborators.
//!
//! Stages never compile anything themselves: they hand sources to a
//! [`Compiler`], optionally a [`Minifier`] and, for stylesheets, a
//! [`Prefixer`]. The [`Toolchain`] bundles one implementation of each for an
//! environment; tests swap in in-process fakes.

mod command;
mod css;

pub use command::CommandTool;
pub use css::{browsers_from_targets, CssMinifier, CssPrefixer};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::loader::resolve_path;
use crate::config::Environment;

/// Error reported by a collaborator
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The external program could not be started
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The external program exited unsuccessfully
    #[error("'{program}' exited with {status}: {message}")]
    Failed { program: String, status: String, message: String },
    /// Scratch file handling failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    /// In-process stylesheet processing failed
    #[error("{}: {message}", .path.display())]
    Css { path: PathBuf, message: String },
}

/// Source handed to a compiler.
#[derive(Debug, Clone, Copy)]
pub struct SourceInput<'a> {
    /// Original location (names outputs, resolves relative imports)
    pub path: &'a Path,
    /// Replacement contents when an earlier step rewrote the file
    pub contents: Option<&'a str>,
}

impl<'a> SourceInput<'a> {
    /// Compile the file as it is on disk.
    pub fn file(path: &'a Path) -> Self {
        Self { path, contents: None }
    }

    /// Compile `contents` as if it were the file at `path`.
    pub fn rewritten(path: &'a Path, contents: &'a str) -> Self {
        Self { path, contents: Some(contents) }
    }

    /// Current text of the source.
    pub fn read(&self) -> Result<String, ToolError> {
        match self.contents {
            Some(text) => Ok(text.to_string()),
            None => std::fs::read_to_string(self.path).map_err(|source| ToolError::Io {
                context: format!("reading {}", self.path.display()),
                source,
            }),
        }
    }
}

/// Compiled code plus an optional source map (JSON text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub code: String,
    pub map: Option<String>,
}

impl Emitted {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), map: None }
    }
}

/// Turns one source file into output code.
pub trait Compiler: Send + Sync {
    fn compile(&self, input: SourceInput<'_>, want_map: bool) -> Result<Emitted, ToolError>;
}

/// Shrinks already-compiled code. `path` names the output for messages and scratch files.
pub trait Minifier: Send + Sync {
    fn minify(&self, emitted: Emitted, path: &Path) -> Result<Emitted, ToolError>;
}

/// Adds vendor prefixes to stylesheet source text.
pub trait Prefixer: Send + Sync {
    fn prefix(&self, source: &str, path: &Path) -> Result<String, ToolError>;
}

/// A collaborator that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Compiler for Passthrough {
    fn compile(&self, input: SourceInput<'_>, _want_map: bool) -> Result<Emitted, ToolError> {
        Ok(Emitted::new(input.read()?))
    }
}

impl Minifier for Passthrough {
    fn minify(&self, emitted: Emitted, _path: &Path) -> Result<Emitted, ToolError> {
        Ok(emitted)
    }
}

impl Prefixer for Passthrough {
    fn prefix(&self, source: &str, _path: &Path) -> Result<String, ToolError> {
        Ok(source.to_string())
    }
}

/// The collaborators used by the compile stages of one environment.
#[derive(Clone)]
pub struct Toolchain {
    pub script_compiler: Arc<dyn Compiler>,
    pub script_minifier: Arc<dyn Minifier>,
    pub style_prefixer: Arc<dyn Prefixer>,
    pub style_compiler: Arc<dyn Compiler>,
    pub style_minifier: Arc<dyn Minifier>,
}

impl Toolchain {
    /// Build the configured toolchain. External commands run from `root`.
    pub fn from_environment(env: &Environment, root: &Path) -> Self {
        let browsers = browsers_from_targets(&env.sass.browsers);
        Self {
            script_compiler: Arc::new(
                CommandTool::new(env.tools.typescript.clone(), root)
                    .with_project(resolve_path(root, env.typescript.project_file())),
            ),
            script_minifier: Arc::new(CommandTool::new(env.tools.script_minifier.clone(), root)),
            style_prefixer: Arc::new(CssPrefixer::new(browsers)),
            style_compiler: Arc::new(CommandTool::new(env.tools.sass.clone(), root)),
            style_minifier: Arc::new(CssMinifier::new(browsers)),
        }
    }

    /// A toolchain that copies sources through unchanged.
    pub fn passthrough() -> Self {
        Self {
            script_compiler: Arc::new(Passthrough),
            script_minifier: Arc::new(Passthrough),
            style_prefixer: Arc::new(Passthrough),
            style_compiler: Arc::new(Passthrough),
            style_minifier: Arc::new(Passthrough),
        }
    }

    pub fn with_script_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.script_compiler = compiler;
        self
    }

    pub fn with_script_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.script_minifier = minifier;
        self
    }

    pub fn with_style_prefixer(mut self, prefixer: Arc<dyn Prefixer>) -> Self {
        self.style_prefixer = prefixer;
        self
    }

    pub fn with_style_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.style_compiler = compiler;
        self
    }

    pub fn with_style_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.style_minifier = minifier;
        self
    }
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_input_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.ts");
        std::fs::write(&path, "let a = 1;").unwrap();

        assert_eq!(SourceInput::file(&path).read().unwrap(), "let a = 1;");
        assert_eq!(SourceInput::rewritten(&path, "let b = 2;").read().unwrap(), "let b = 2;");
    }

    #[test]
    fn test_source_input_missing_file() {
        let err = SourceInput::file(Path::new("/nonexistent/a.ts")).read().unwrap_err();
        assert!(err.to_string().contains("reading /nonexistent/a.ts"));
    }

    #[test]
    fn test_passthrough_toolchain() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.scss");
        std::fs::write(&path, "a { b: c }").unwrap();

        let tools = Toolchain::passthrough();
        let prefixed = tools.style_prefixer.prefix("a { b: c }", &path).unwrap();
        let compiled = tools.style_compiler.compile(SourceInput::rewritten(&path, &prefixed), true).unwrap();
        let minified = tools.style_minifier.minify(compiled.clone(), &path).unwrap();
        assert_eq!(minified, compiled);
        assert_eq!(minified.code, "a { b: c }");
        assert_eq!(minified.map, None);
    }
}
