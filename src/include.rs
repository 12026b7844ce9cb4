//! Markup file inclusion
//!
//! Expands `@@include('path')` and `@@include('path', {context})` directives
//! (the `@@` prefix is configurable). Included files are expanded
//! recursively with the merged context, `@@name` variables are replaced from
//! that context, and the indentation of the directive line is repeated on
//! every line of the included text.

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::HtmlConfig;

/// Error type for include resolution failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IncludeError {
    /// Circular include detected
    #[error("Circular include detected: {}", .0.display())]
    CircularInclude(PathBuf),
    /// File not found
    #[error("Include file not found '{}': {1}", .0.display())]
    FileNotFound(PathBuf, String),
    /// Context argument is not a JSON object
    #[error("Invalid include context in '{}': {1}", .0.display())]
    InvalidContext(PathBuf, String),
    /// IO error reading file
    #[error("Error reading include file '{}': {1}", .0.display())]
    IoError(PathBuf, String),
    /// The directive prefix could not be turned into a pattern
    #[error("Invalid include prefix '{0}': {1}")]
    InvalidPrefix(String, String),
}

/// Where include paths are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Basepath {
    /// The directory of the file containing the directive
    File,
    /// A fixed directory
    Dir(PathBuf),
}

impl Basepath {
    /// Interpret a configured basepath: `@file`, `@root`, or a directory relative to `root`.
    pub fn from_config(value: &str, root: &Path) -> Self {
        match value {
            "@file" => Basepath::File,
            "@root" => Basepath::Dir(root.to_path_buf()),
            dir => Basepath::Dir(crate::config::resolve_path(root, Path::new(dir))),
        }
    }
}

/// Expands inclusion directives in markup files.
#[derive(Debug, Clone)]
pub struct Expander {
    prefix: String,
    basepath: Basepath,
    indent: bool,
    include_re: Regex,
    var_re: Regex,
}

impl Expander {
    /// Create an expander for `prefix` (usually `@@`).
    pub fn new(prefix: &str, basepath: Basepath) -> Result<Self, IncludeError> {
        let escaped = regex::escape(prefix);
        let invalid = |e: regex::Error| IncludeError::InvalidPrefix(prefix.to_string(), e.to_string());

        // Only the head; the optional context object is scanned by `directive_tail`
        let include_re =
            Regex::new(&format!(r#"{}include\(\s*['"]([^'"]+)['"]"#, escaped)).map_err(invalid)?;
        let var_re =
            Regex::new(&format!(r"{}([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)", escaped)).map_err(invalid)?;

        Ok(Self { prefix: prefix.to_string(), basepath, indent: true, include_re, var_re })
    }

    /// Build the expander configured for an environment's markup stage.
    pub fn from_config(html: &HtmlConfig, root: &Path) -> Result<Self, IncludeError> {
        Self::new(&html.prefix, Basepath::from_config(&html.basepath, root))
    }

    /// Toggle indentation-preserving substitution (on by default).
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Directive prefix in use.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Read and fully expand a markup file.
    pub fn expand_file(&self, path: &Path) -> Result<String, IncludeError> {
        let canonical =
            path.canonicalize().map_err(|e| IncludeError::FileNotFound(path.to_path_buf(), e.to_string()))?;
        let text = fs::read_to_string(&canonical).map_err(|e| IncludeError::IoError(canonical.clone(), e.to_string()))?;
        let mut stack = vec![canonical.clone()];
        self.expand(&text, &canonical, &Map::new(), &mut stack)
    }

    fn expand(
        &self,
        text: &str,
        file: &Path,
        context: &Map<String, Value>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, IncludeError> {
        let text = self.substitute(text, context);
        let mut out = String::with_capacity(text.len());

        for line in text.split_inclusive('\n') {
            let indent: String = if self.indent {
                line.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
            } else {
                String::new()
            };

            let mut last = 0;
            let mut pos = 0;
            while let Some(caps) = self.include_re.captures_at(line, pos) {
                let Some(head) = caps.get(0) else {
                    break;
                };
                let Some((raw_context, consumed)) = directive_tail(&line[head.end()..]) else {
                    pos = head.end();
                    continue;
                };
                out.push_str(&line[last..head.start()]);

                let target = caps.get(1).map_or("", |m| m.as_str());
                let child_context = match raw_context {
                    Some(raw) => merge_context(context, raw, file)?,
                    None => context.clone(),
                };
                let included = self.include(target, file, &child_context, stack)?;
                if indent.is_empty() {
                    out.push_str(&included);
                } else {
                    out.push_str(&included.replace('\n', &format!("\n{}", indent)));
                }
                last = head.end() + consumed;
                pos = last;
            }
            out.push_str(&line[last..]);
        }

        Ok(out)
    }

    fn include(
        &self,
        target: &str,
        from: &Path,
        context: &Map<String, Value>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, IncludeError> {
        let base = match &self.basepath {
            Basepath::File => from.parent().unwrap_or(Path::new(".")).to_path_buf(),
            Basepath::Dir(dir) => dir.clone(),
        };
        let path = base.join(target);
        let canonical = path.canonicalize().map_err(|e| IncludeError::FileNotFound(path.clone(), e.to_string()))?;

        if stack.contains(&canonical) {
            return Err(IncludeError::CircularInclude(canonical));
        }

        let text = fs::read_to_string(&canonical).map_err(|e| IncludeError::IoError(canonical.clone(), e.to_string()))?;

        stack.push(canonical.clone());
        let expanded = self.expand(&text, &canonical, context, stack);
        stack.pop();

        let mut expanded = expanded?;
        if expanded.ends_with('\n') {
            expanded.pop();
            if expanded.ends_with('\r') {
                expanded.pop();
            }
        }
        Ok(expanded)
    }

    /// Replace `@@name` (and `@@a.b`) with context values; unknown names stay as written.
    fn substitute(&self, text: &str, context: &Map<String, Value>) -> String {
        if context.is_empty() {
            return text.to_string();
        }
        self.var_re
            .replace_all(text, |caps: &Captures<'_>| {
                let whole = caps.get(0).map_or("", |m| m.as_str()).to_string();
                let name = caps.get(1).map_or("", |m| m.as_str());
                if name == "include" {
                    return whole;
                }
                match lookup(context, name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => whole,
                    Some(other) => other.to_string(),
                }
            })
            .into_owned()
    }
}

fn lookup<'a>(context: &'a Map<String, Value>, dotted: &str) -> Option<&'a Value> {
    let mut parts = dotted.split('.');
    let mut value = context.get(parts.next()?)?;
    for part in parts {
        value = value.as_object()?.get(part)?;
    }
    Some(value)
}

/// Parse what follows the target of a directive: `)` or `, {...})`.
///
/// Returns the context object text (if any) and the number of bytes
/// consumed, closing parenthesis included.
fn directive_tail(rest: &str) -> Option<(Option<&str>, usize)> {
    let trimmed = rest.trim_start();
    let mut offset = rest.len() - trimmed.len();
    if trimmed.starts_with(')') {
        return Some((None, offset + 1));
    }

    let after_comma = trimmed.strip_prefix(',')?;
    let object = after_comma.trim_start();
    offset += 1 + after_comma.len() - object.len();

    let end = object_end(object)?;
    let tail = &object[end..];
    let close = tail.trim_start();
    close.starts_with(')').then(|| (Some(&object[..end]), offset + end + tail.len() - close.len() + 1))
}

/// Byte length of the brace-balanced object at the start of `text`.
/// Braces inside quoted strings do not count.
fn object_end(text: &str) -> Option<usize> {
    if !text.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parent context overlaid with the directive's own context object.
fn merge_context(parent: &Map<String, Value>, raw: &str, file: &Path) -> Result<Map<String, Value>, IncludeError> {
    let parsed: Value =
        json5::from_str(raw).map_err(|e| IncludeError::InvalidContext(file.to_path_buf(), e.to_string()))?;
    let Value::Object(own) = parsed else {
        return Err(IncludeError::InvalidContext(file.to_path_buf(), "expected an object".to_string()));
    };
    let mut merged = parent.clone();
    merged.extend(own);
    Ok(merged)
}
