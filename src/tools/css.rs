//! In-process stylesheet collaborators built on lightningcss.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::path::Path;

use super::{Emitted, Minifier, Prefixer, ToolError};
use crate::config::BrowserTargets;

/// Parse a `major[.minor[.patch]]` version into lightningcss's packed form.
fn parse_version(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map_or(Ok(0), str::parse).ok()?;
    let patch: u32 = parts.next().map_or(Ok(0), str::parse).ok()?;
    if parts.next().is_some() || major > 0xffff || minor > 0xff || patch > 0xff {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

/// Convert configured browser versions to lightningcss targets.
///
/// Versions that do not parse are logged and left out.
pub fn browsers_from_targets(targets: &BrowserTargets) -> Browsers {
    let convert = |name: &str, version: &Option<String>| -> Option<u32> {
        let raw = version.as_deref()?;
        let parsed = parse_version(raw);
        if parsed.is_none() {
            tracing::warn!("Ignoring unrecognized {} version '{}'", name, raw);
        }
        parsed
    };

    Browsers {
        chrome: convert("chrome", &targets.chrome),
        edge: convert("edge", &targets.edge),
        firefox: convert("firefox", &targets.firefox),
        safari: convert("safari", &targets.safari),
        ios_saf: convert("iosSaf", &targets.ios_saf),
        samsung: convert("samsung", &targets.samsung),
        opera: convert("opera", &targets.opera),
        android: convert("android", &targets.android),
        ..Browsers::default()
    }
}

fn render(source: &str, path: &Path, browsers: Browsers, minify: bool) -> Result<String, ToolError> {
    let css_error = |message: String| ToolError::Css { path: path.to_path_buf(), message };
    let targets = Targets::from(browsers);

    let options = ParserOptions { filename: path.display().to_string(), ..ParserOptions::default() };
    let mut sheet = StyleSheet::parse(source, options).map_err(|e| css_error(e.to_string()))?;
    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| css_error(e.to_string()))?;
    let printed = sheet
        .to_css(PrinterOptions { minify, targets, ..PrinterOptions::default() })
        .map_err(|e| css_error(e.to_string()))?;
    Ok(printed.code)
}

/// Adds vendor prefixes for the configured browsers.
///
/// Runs on stylesheet source before compilation. Preprocessor syntax that is
/// not plain CSS cannot be parsed; such sources pass through unchanged.
///
/// Prefixing goes through the lightningcss optimizer even when the stage does
/// not minify: adjacent rules are merged, nesting is flattened and values are
/// shortened (`blue` becomes `#00f`). The compiler, and so any source map it
/// emits, sees that rewritten source rather than the file on disk.
#[derive(Debug, Clone, Copy)]
pub struct CssPrefixer {
    browsers: Browsers,
}

impl CssPrefixer {
    pub fn new(browsers: Browsers) -> Self {
        Self { browsers }
    }
}

impl Prefixer for CssPrefixer {
    fn prefix(&self, source: &str, path: &Path) -> Result<String, ToolError> {
        match render(source, path, self.browsers, false) {
            Ok(prefixed) => Ok(prefixed),
            Err(err) => {
                tracing::debug!("Skipping prefixes for {}: {}", path.display(), err);
                Ok(source.to_string())
            }
        }
    }
}

/// Minifies compiled CSS.
#[derive(Debug, Clone, Copy)]
pub struct CssMinifier {
    browsers: Browsers,
}

impl CssMinifier {
    pub fn new(browsers: Browsers) -> Self {
        Self { browsers }
    }
}

impl Minifier for CssMinifier {
    fn minify(&self, emitted: Emitted, path: &Path) -> Result<Emitted, ToolError> {
        let code = render(&emitted.code, path, self.browsers, true)?;
        Ok(Emitted { code, map: emitted.map })
    }
}
