//! Source file discovery for the build stages.
//!
//! A [`GlobSet`] is an ordered list of include patterns plus `!`-prefixed
//! exclusions, resolved against the project root. Every matched file keeps
//! the path relative to the static base of the pattern that found it, so
//! outputs mirror the source layout below that base.
//!
//! Brace alternation (`img/*.{png,jpg}`) is expanded before patterns are
//! compiled; the base is taken from the unexpanded pattern.

use glob::{glob_with, MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Error during source discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    InvalidPattern(String, glob::PatternError),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, err)
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Static base directory of the pattern that matched it
    pub base: PathBuf,
    /// Path relative to `base`; output paths are derived from this
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct Include {
    raw: String,
    pattern: Pattern,
    base: PathBuf,
}

/// Options shared by expansion and matching.
///
/// `*` stops at path separators and leading dots must be matched literally,
/// so editor swap files like `.#index.html` never trigger a stage.
fn match_options() -> MatchOptions {
    MatchOptions { case_sensitive: true, require_literal_separator: true, require_literal_leading_dot: true }
}

/// Check whether a string contains glob metacharacters.
pub fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Expand `{a,b}` alternation into one pattern per alternative, in order.
///
/// Braces without a top-level comma, or without a closing brace, are literal.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let mut start = 0;
    while let Some(offset) = pattern[start..].find('{') {
        let open = start + offset;
        let mut depth = 0usize;
        let mut bounds = vec![open];
        let mut close = None;
        for (i, c) in pattern[open..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                ',' if depth == 1 => bounds.push(open + i),
                _ => {}
            }
        }
        match close {
            Some(close) if bounds.len() > 1 => {
                bounds.push(close);
                let (prefix, suffix) = (&pattern[..open], &pattern[close + 1..]);
                let mut out = Vec::new();
                for pair in bounds.windows(2) {
                    let alternative = &pattern[pair[0] + 1..pair[1]];
                    for expanded in expand_braces(&format!("{}{}{}", prefix, alternative, suffix)) {
                        if !out.contains(&expanded) {
                            out.push(expanded);
                        }
                    }
                }
                return out;
            }
            _ => start = open + 1,
        }
    }
    vec![pattern.to_string()]
}

/// The static (non-glob) leading directory of a pattern.
///
/// - `src/ts/**/*.ts` -> `src/ts`
/// - `src/index.html` -> `src` (a literal file uses its parent)
/// - `**/*.css` -> `` (the root itself)
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();

    for component in path.components() {
        if let Component::Normal(part) = component {
            if has_glob_meta(&part.to_string_lossy()) {
                return base;
            }
        }
        base.push(component);
    }

    // No metacharacters at all: the pattern names a file
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Compiled include/exclude patterns for one stage input or output set.
#[derive(Debug, Clone)]
pub struct GlobSet {
    includes: Vec<Include>,
    excludes: Vec<Pattern>,
}

impl GlobSet {
    /// Compile `patterns` relative to `root`.
    ///
    /// Patterns starting with `!` exclude matches of the others, regardless of
    /// their position in the list.
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, DiscoveryError> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        let escaped_root = Pattern::escape(&root.to_string_lossy());

        for raw in patterns {
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw.as_str()),
            };

            let base = root.join(glob_base(body.trim_start_matches("./")));
            for alternative in expand_braces(body) {
                let absolute = if Path::new(&alternative).is_absolute() {
                    alternative
                } else {
                    format!("{}/{}", escaped_root.trim_end_matches('/'), alternative.trim_start_matches("./"))
                };
                let pattern =
                    Pattern::new(&absolute).map_err(|e| DiscoveryError::InvalidPattern(raw.clone(), e))?;

                if negated {
                    excludes.push(pattern);
                } else {
                    includes.push(Include { raw: absolute, pattern, base: base.clone() });
                }
            }
        }

        Ok(Self { includes, excludes })
    }

    /// True when no include pattern was declared.
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Check whether a path is named by one of the `!` patterns.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excludes.iter().any(|p| p.matches_path_with(path, match_options()))
    }

    /// Check whether a path is selected by this set, without touching the filesystem.
    pub fn matches(&self, path: &Path) -> bool {
        self.includes.iter().any(|inc| inc.pattern.matches_path_with(path, match_options()))
            && !self.is_excluded(path)
    }

    /// Every existing path (files and directories) selected by this set.
    pub fn entries(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for include in &self.includes {
            let Ok(paths) = glob_with(&include.raw, match_options()) else {
                continue;
            };
            for entry in paths {
                match entry {
                    Ok(path) => {
                        if !self.is_excluded(&path) && seen.insert(path.clone()) {
                            out.push(path);
                        }
                    }
                    Err(e) => tracing::warn!("Error reading path: {}", e),
                }
            }
        }

        out.sort();
        out
    }

    /// Every existing regular file selected by this set, sorted by path.
    ///
    /// When several patterns match the same file, the first pattern's base wins.
    pub fn files(&self) -> Vec<SourceFile> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for include in &self.includes {
            let Ok(paths) = glob_with(&include.raw, match_options()) else {
                continue;
            };
            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!("Error reading path: {}", e);
                        continue;
                    }
                };
                if !path.is_file() || self.is_excluded(&path) || !seen.insert(path.clone()) {
                    continue;
                }
                let relative = match path.strip_prefix(&include.base) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => PathBuf::from(path.file_name().unwrap_or_default()),
                };
                files.push(SourceFile { path, base: include.base.clone(), relative });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Base directories of the include patterns, deduplicated, in declaration order.
    pub fn bases(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.includes
            .iter()
            .filter(|inc| seen.insert(inc.base.clone()))
            .map(|inc| inc.base.clone())
            .collect()
    }

    /// Existing directories a file watcher should observe for this set.
    ///
    /// A base that does not exist yet is replaced by its closest existing ancestor.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        for base in self.bases() {
            let mut dir = base.as_path();
            while !dir.is_dir() {
                match dir.parent() {
                    Some(parent) => dir = parent,
                    None => break,
                }
            }
            if dir.is_dir() && seen.insert(dir.to_path_buf()) {
                roots.push(dir.to_path_buf());
            }
        }
        roots
    }
}
