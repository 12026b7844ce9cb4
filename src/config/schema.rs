//! Configuration schema types for the environment document
//!
//! A configuration document maps environment names to fully parametrized
//! [`Environment`] records. Declaration order is preserved so that the
//! first-declared environment is a well-defined default.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Accept either a single glob string or a list of globs.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Source map settings shared by the script and style stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapConfig {
    /// Capture source maps at all
    #[serde(rename = "use", default)]
    pub enabled: bool,
    /// Write maps as separate files instead of inline data URLs
    #[serde(default)]
    pub external: bool,
    /// Directory (relative to the stage `outDir`) for external maps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_rel_dir: Option<String>,
    /// URL prefix used in the `sourceMappingURL` comment for external maps
    #[serde(
        rename = "externalURLPrefix",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub external_url_prefix: Option<String>,
}

/// Settings for a compile stage (script or style)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileConfig {
    /// Source globs (`!` prefix excludes)
    #[serde(deserialize_with = "string_or_seq")]
    pub src: Vec<String>,
    /// Output directory
    pub out_dir: PathBuf,
    /// Extension given to every output file (e.g. `.js`, `.min.css`)
    pub out_ext: String,
    /// Run the minifier after compilation
    #[serde(default)]
    pub minify: bool,
    /// Source map capture and emission
    #[serde(default)]
    pub source_maps: SourceMapConfig,
    /// Compiler project file the script compiler extends (`{project}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<PathBuf>,
}

impl CompileConfig {
    /// The configured project file, `tsconfig.json` when unset.
    pub fn project_file(&self) -> &Path {
        self.project.as_deref().unwrap_or(Path::new("tsconfig.json"))
    }
}

/// Browser versions used as vendor-prefix targets.
///
/// Versions are `major[.minor[.patch]]` strings; absent browsers are not targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firefox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safari: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samsung: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
}

impl Default for BrowserTargets {
    /// Roughly "last two versions" of the evergreen browsers.
    fn default() -> Self {
        Self {
            chrome: Some("120".to_string()),
            edge: Some("120".to_string()),
            firefox: Some("120".to_string()),
            safari: Some("16".to_string()),
            ios_saf: Some("16".to_string()),
            samsung: None,
            opera: None,
            android: None,
        }
    }
}

/// Style stage settings: the compile shape plus prefix targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    #[serde(flatten)]
    pub compile: CompileConfig,
    /// Vendor-prefix targets applied before compilation
    #[serde(default)]
    pub browsers: BrowserTargets,
}

/// Markup include stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlConfig {
    #[serde(deserialize_with = "string_or_seq")]
    pub src: Vec<String>,
    pub out_dir: PathBuf,
    /// Directive prefix for inclusions
    #[serde(default = "default_include_prefix")]
    pub prefix: String,
    /// `@file` (relative to the including file), `@root` (project root), or a directory
    #[serde(default = "default_basepath")]
    pub basepath: String,
}

fn default_include_prefix() -> String {
    "@@".to_string()
}

fn default_basepath() -> String {
    "@file".to_string()
}

/// One verbatim copy rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPair {
    #[serde(deserialize_with = "string_or_seq")]
    pub src: Vec<String>,
    pub out_dir: PathBuf,
}

/// External command used as a compile or minify collaborator.
///
/// Arguments may contain `{input}`, `{output}`, `{outdir}` and `{dir}`
/// placeholders, expanded per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Appended when source maps are requested
    #[serde(default)]
    pub source_map_args: Vec<String>,
    /// Appended when source maps are not requested
    #[serde(default)]
    pub no_source_map_args: Vec<String>,
    /// Extension of the file the tool writes to `{output}`
    #[serde(default = "default_emit_ext")]
    pub emit_ext: String,
}

fn default_emit_ext() -> String {
    "out".to_string()
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_typescript_tool() -> ToolCommand {
    ToolCommand {
        program: "tsc".to_string(),
        args: args(&["--pretty", "false", "-p", "{project}", "--outDir", "{outdir}"]),
        source_map_args: args(&["--sourceMap"]),
        no_source_map_args: vec![],
        emit_ext: "js".to_string(),
    }
}

fn default_script_minifier() -> ToolCommand {
    ToolCommand {
        program: "terser".to_string(),
        args: args(&["{input}", "--compress", "--mangle", "--output", "{output}"]),
        source_map_args: vec![],
        no_source_map_args: vec![],
        emit_ext: "js".to_string(),
    }
}

fn default_sass_tool() -> ToolCommand {
    ToolCommand {
        program: "sass".to_string(),
        args: args(&["--style=expanded", "--load-path={dir}", "{input}", "{output}"]),
        source_map_args: args(&["--source-map", "--embed-sources"]),
        no_source_map_args: args(&["--no-source-map"]),
        emit_ext: "css".to_string(),
    }
}

/// External collaborator commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default = "default_typescript_tool")]
    pub typescript: ToolCommand,
    #[serde(default = "default_script_minifier")]
    pub script_minifier: ToolCommand,
    #[serde(default = "default_sass_tool")]
    pub sass: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            typescript: default_typescript_tool(),
            script_minifier: default_script_minifier(),
            sass: default_sass_tool(),
        }
    }
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Live server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Index document served for directory requests
    #[serde(default = "default_index")]
    pub index: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_index() -> String {
    "index.html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), index: default_index() }
    }
}

/// One named build target: every stage is parametrized from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub html: HtmlConfig,
    pub typescript: CompileConfig,
    pub sass: StyleConfig,
    #[serde(default)]
    pub assets: Vec<AssetPair>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub clean: Vec<String>,
    /// Output root, measured by the size report and served by the live server.
    /// Defaults to the markup output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<PathBuf>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "prod.typescript.outExt")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

impl Environment {
    /// The output root: `dist` when declared, otherwise `html.outDir`.
    pub fn dist_dir(&self) -> &Path {
        self.dist.as_deref().unwrap_or(&self.html.out_dir)
    }

    /// Validate this environment, prefixing field paths with `name`.
    pub fn validate(&self, name: &str) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: &str| {
            errors.push(ConfigValidationError { field, message: message.to_string() });
        };

        for (kind, stage) in [("typescript", &self.typescript), ("sass", &self.sass.compile)] {
            if stage.out_dir.as_os_str().is_empty() {
                push(format!("{}.{}.outDir", name, kind), "must be a non-empty path");
            }
            if !stage.out_ext.starts_with('.') || stage.out_ext.len() < 2 {
                push(format!("{}.{}.outExt", name, kind), "must start with '.' (e.g. \".js\")");
            }
            let maps = &stage.source_maps;
            if maps.enabled
                && maps.external
                && maps.external_rel_dir.as_deref().map_or(true, str::is_empty)
            {
                push(
                    format!("{}.{}.sourceMaps.externalRelDir", name, kind),
                    "is required when external source maps are enabled",
                );
            }
        }

        if self.html.out_dir.as_os_str().is_empty() {
            push(format!("{}.html.outDir", name), "must be a non-empty path");
        }
        if self.html.prefix.is_empty() {
            push(format!("{}.html.prefix", name), "must be a non-empty string");
        }

        for (i, pair) in self.assets.iter().enumerate() {
            if pair.src.is_empty() {
                push(format!("{}.assets[{}].src", name, i), "must contain at least one glob");
            }
        }

        if self.dist.as_ref().is_some_and(|dist| dist.as_os_str().is_empty()) {
            push(format!("{}.dist", name), "must be a non-empty path");
        }

        if self.watch.debounce_ms == 0 {
            push(format!("{}.watch.debounceMs", name), "must be a positive integer");
        }

        errors
    }
}

/// The whole configuration document: environment name -> environment.
///
/// Declaration order is significant and preserved in every format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    environments: IndexMap<String, Environment>,
}

impl ConfigDocument {
    /// Build a document from already-ordered entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Environment)>) -> Self {
        Self { environments: entries.into_iter().collect() }
    }

    /// Environment names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }

    /// Look up an environment by name.
    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    /// The first-declared environment, if any.
    pub fn first(&self) -> Option<(&str, &Environment)> {
        self.environments.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Validate every declared environment.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        self.environments.iter().flat_map(|(name, env)| env.validate(name)).collect()
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[dev]
dist = "out"
clean = ["out"]

[dev.html]
src = ["index.html"]
outDir = "out"

[dev.typescript]
src = ["a.ts"]
outDir = "out"
outExt = ".js"

[dev.typescript.sourceMaps]
use = false

[dev.sass]
src = "styles/*.scss"
outDir = "out/css"
outExt = ".css"
"#;

    #[test]
    fn test_minimal_config_parse() {
        let doc: ConfigDocument = toml::from_str(MINIMAL).unwrap();
        assert_eq!(doc.len(), 1);

        let env = doc.get("dev").unwrap();
        assert_eq!(env.dist_dir(), Path::new("out"));
        assert_eq!(env.typescript.src, vec!["a.ts".to_string()]);
        assert_eq!(env.typescript.out_ext, ".js");
        assert!(!env.typescript.minify);
        assert!(!env.typescript.source_maps.enabled);
        assert_eq!(env.sass.compile.src, vec!["styles/*.scss".to_string()]);
        assert_eq!(env.sass.browsers, BrowserTargets::default());
        assert_eq!(env.html.prefix, "@@");
        assert_eq!(env.html.basepath, "@file");
        assert!(env.assets.is_empty());
        assert_eq!(env.watch.debounce_ms, 100);
        assert_eq!(env.server.port, 3000);
        assert_eq!(env.tools.typescript.program, "tsc");
        assert!(env.tools.typescript.args.iter().any(|arg| arg == "{project}"));
        assert_eq!(env.typescript.project_file(), Path::new("tsconfig.json"));
        assert!(doc.is_valid());
    }

    #[test]
    fn test_dist_defaults_to_markup_output() {
        let toml = MINIMAL.replace("dist = \"out\"\n", "").replace("outDir = \"out\"\n\n[dev.typescript]", "outDir = \"site\"\n\n[dev.typescript]");
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let env = doc.get("dev").unwrap();
        assert_eq!(env.dist, None);
        assert_eq!(env.dist_dir(), Path::new("site"));
        assert!(doc.is_valid());
    }

    #[test]
    fn test_json_source_maps_parse() {
        let json = r#"{
            "prod": {
                "html": {"src": ["src/*.html"], "outDir": "dist"},
                "typescript": {
                    "src": ["src/ts/**/*.ts"], "outDir": "dist/js", "outExt": ".min.js",
                    "minify": true,
                    "sourceMaps": {"use": true, "external": true,
                                   "externalRelDir": "maps", "externalURLPrefix": "/js"}
                },
                "sass": {"src": ["src/scss/*.scss"], "outDir": "dist/css", "outExt": ".css",
                         "browsers": {"chrome": "100", "safari": "15.4"}},
                "assets": [{"src": "src/img/**/*", "outDir": "dist/img"}],
                "clean": "dist",
                "dist": "dist"
            }
        }"#;
        let doc: ConfigDocument = serde_json::from_str(json).unwrap();
        let env = doc.get("prod").unwrap();

        let maps = &env.typescript.source_maps;
        assert!(maps.enabled);
        assert!(maps.external);
        assert_eq!(maps.external_rel_dir.as_deref(), Some("maps"));
        assert_eq!(maps.external_url_prefix.as_deref(), Some("/js"));
        assert_eq!(env.sass.browsers.chrome.as_deref(), Some("100"));
        assert_eq!(env.sass.browsers.firefox, None);
        assert_eq!(env.assets[0].src, vec!["src/img/**/*".to_string()]);
        assert_eq!(env.clean, vec!["dist".to_string()]);
    }

    #[test]
    fn test_typescript_project_parse() {
        let toml = MINIMAL.replace("outExt = \".js\"", "outExt = \".js\"\nproject = \"config/tsconfig.app.json\"");
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let env = doc.get("dev").unwrap();
        assert_eq!(env.typescript.project_file(), Path::new("config/tsconfig.app.json"));
    }

    #[test]
    fn test_declaration_order_preserved() {
        let toml = format!(
            "{}\n{}\n{}",
            MINIMAL.replace("[dev", "[zeta"),
            MINIMAL.replace("[dev", "[alpha"),
            MINIMAL.replace("[dev", "[mid")
        );
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let names: Vec<_> = doc.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(doc.first().map(|(name, _)| name), Some("zeta"));
    }

    #[test]
    fn test_validation_bad_out_ext() {
        let toml = MINIMAL.replace("outExt = \".js\"", "outExt = \"js\"");
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let errors = doc.validate();
        assert!(errors.iter().any(|e| e.field == "dev.typescript.outExt"));
    }

    #[test]
    fn test_validation_external_maps_need_dir() {
        let toml = MINIMAL.replace("use = false", "use = true\nexternal = true");
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let errors = doc.validate();
        assert!(errors.iter().any(|e| e.field == "dev.typescript.sourceMaps.externalRelDir"));
    }

    #[test]
    fn test_validation_zero_debounce() {
        let toml = format!("{}\n[dev.watch]\ndebounceMs = 0\n", MINIMAL);
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let errors = doc.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "dev.watch.debounceMs");
        assert!(errors[0].to_string().contains("positive"));
    }

    #[test]
    fn test_partial_tool_override() {
        let toml = format!(
            "{}\n[dev.tools.typescript]\nprogram = \"esbuild\"\nargs = [\"{{input}}\"]\n",
            MINIMAL
        );
        let doc: ConfigDocument = toml::from_str(&toml).unwrap();
        let tools = &doc.get("dev").unwrap().tools;
        assert_eq!(tools.typescript.program, "esbuild");
        assert_eq!(tools.typescript.args, vec!["{input}".to_string()]);
        assert_eq!(tools.typescript.emit_ext, "out");
        assert_eq!(tools.sass.program, "sass");
    }
}
