//! Source map emission.
//!
//! Compilers hand back a map as JSON text; this module decides where it goes:
//! inline as a base64 data URL, or as a sibling file under a configured
//! directory with a `sourceMappingURL` comment pointing at it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::SourceMapConfig;

/// Comment syntax of the output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `//# sourceMappingURL=...`
    Line,
    /// `/*# sourceMappingURL=... */`
    Block,
}

impl CommentStyle {
    fn render(self, url: &str) -> String {
        match self {
            CommentStyle::Line => format!("//# sourceMappingURL={}", url),
            CommentStyle::Block => format!("/*# sourceMappingURL={} */", url),
        }
    }
}

fn mapping_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?://[#@] sourceMappingURL=[^\r\n]*|/\*[#@] sourceMappingURL=[^\r\n]*?\*/)[ \t]*(?:\r?\n|$)")
            .expect("static regex")
    })
}

/// Remove any `sourceMappingURL` comments a tool left behind.
pub fn strip_mapping_comment(code: &str) -> String {
    let stripped = mapping_comment_re().replace_all(code, "");
    let mut out = stripped.trim_end().to_string();
    if code.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Rewrite the map's `file` field to the final output name.
///
/// Maps that are not JSON objects are passed through untouched.
pub fn retarget_map(map: &str, file_name: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(map) {
        Ok(serde_json::Value::Object(mut obj)) => {
            obj.insert("file".to_string(), serde_json::Value::String(file_name.to_string()));
            serde_json::Value::Object(obj).to_string()
        }
        _ => map.to_string(),
    }
}

/// A file to be written by a stage: relative to the stage's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub relative: PathBuf,
    pub contents: String,
}

/// Attach a map to compiled code according to `config`.
///
/// `relative` is the output path relative to the stage's `outDir`. Returns the
/// code file plus, for external maps, the map file.
pub fn emit(
    relative: &Path,
    code: String,
    map: Option<String>,
    config: &SourceMapConfig,
    style: CommentStyle,
) -> Vec<OutputFile> {
    let code = strip_mapping_comment(&code);
    let map = match (config.enabled, map) {
        (true, Some(map)) => map,
        _ => return vec![OutputFile { relative: relative.to_path_buf(), contents: code }],
    };

    let file_name = relative.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let map = retarget_map(&map, &file_name);

    if !config.external {
        let url = format!("data:application/json;charset=utf8;base64,{}", STANDARD.encode(map));
        let contents = append_comment(code, &style.render(&url));
        return vec![OutputFile { relative: relative.to_path_buf(), contents }];
    }

    let rel_dir = config.external_rel_dir.as_deref().unwrap_or(".");
    let parent = relative.parent().unwrap_or(Path::new(""));
    let map_relative = normalize(&Path::new(rel_dir).join(parent).join(format!("{}.map", file_name)));

    let url = match config.external_url_prefix.as_deref().filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), to_url(&map_relative)),
        None => to_url(&relative_from(parent, &map_relative)),
    };

    let contents = append_comment(code, &style.render(&url));
    vec![
        OutputFile { relative: relative.to_path_buf(), contents },
        OutputFile { relative: map_relative, contents: map },
    ]
}

fn append_comment(mut code: String, comment: &str) -> String {
    if !code.is_empty() && !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str(comment);
    code.push('\n');
    code
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Path of `target` as seen from directory `from` (both relative to the same root).
fn relative_from(from: &Path, target: &Path) -> PathBuf {
    let from: Vec<_> = from.components().collect();
    let target_parts: Vec<_> = target.components().collect();
    let common = from.iter().zip(&target_parts).take_while(|(a, b)| a == b).count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part);
    }
    out
}

fn to_url(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
