//! Watch coordinator integration tests.
//!
//! Exercises routing and re-invocation against real stages in a scratch
//! project, with counting collaborators and a recording notifier.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use stagehand::build::{BuildContext, BuildPipeline, StageKind};
use stagehand::config::{parse_config, resolve};
use stagehand::reload::{Notifier, ReloadScope};
use stagehand::tools::{Compiler, Emitted, SourceInput, ToolError, Toolchain};
use stagehand::watch::WatchCoordinator;

const DOC: &str = r#"
[dev]
clean = ["out"]
html = { src = ["src/*.html"], outDir = "out" }
typescript = { src = ["src/ts/**/*.ts"], outDir = "out/js", outExt = ".js" }
sass = { src = ["src/scss/*.scss"], outDir = "out/css", outExt = ".css" }
assets = [{ src = ["src/img/*"], outDir = "out/img" }]
"#;

/// Counts calls; fails while the source contains `FAIL`.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl Compiler for Counting {
    fn compile(&self, input: SourceInput<'_>, _want_map: bool) -> Result<Emitted, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let code = input.read()?;
        if code.contains("FAIL") {
            return Err(ToolError::Failed {
                program: "fake".to_string(),
                status: "exit status: 1".to_string(),
                message: "broken".to_string(),
            });
        }
        Ok(Emitted::new(code))
    }
}

#[derive(Default)]
struct Recording {
    scopes: Mutex<Vec<ReloadScope>>,
}

impl Recording {
    fn take(&self) -> Vec<ReloadScope> {
        std::mem::take(&mut *self.scopes.lock().unwrap())
    }
}

impl Notifier for Recording {
    fn notify(&self, scope: ReloadScope) {
        self.scopes.lock().unwrap().push(scope);
    }
}

struct Fixture {
    temp: TempDir,
    scripts: Arc<Counting>,
    styles: Arc<Counting>,
    notifier: Arc<Recording>,
    coordinator: WatchCoordinator,
}

impl Fixture {
    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/index.html", "<p>@@include('parts/x.html')</p>\n");
    write(temp.path(), "src/parts/x.html", "x");
    write(temp.path(), "src/ts/app.ts", "let a;\n");
    write(temp.path(), "src/scss/app.scss", "a { color: red; }\n");
    write(temp.path(), "src/scss/print.scss", "a { color: black; }\n");
    write(temp.path(), "src/img/logo.svg", "<svg/>");

    let scripts = Arc::new(Counting::default());
    let styles = Arc::new(Counting::default());
    let notifier = Arc::new(Recording::default());

    let document = parse_config(Path::new("stagehand.toml"), DOC).unwrap();
    let resolved = resolve(&document, None).unwrap();
    let toolchain =
        Toolchain::passthrough().with_script_compiler(scripts.clone()).with_style_compiler(styles.clone());
    let context = BuildContext::new(&resolved, temp.path().to_path_buf()).with_toolchain(toolchain);
    let coordinator = WatchCoordinator::new(BuildPipeline::new(context), notifier.clone()).unwrap();

    Fixture { temp, scripts, styles, notifier, coordinator }
}

/// Route the changed paths and re-run each concerned stage once.
fn change(fixture: &Fixture, paths: &[&str]) -> Vec<StageKind> {
    let paths: Vec<PathBuf> = paths.iter().map(|p| fixture.path(p)).collect();
    let stages = fixture.coordinator.route(&paths);
    for stage in &stages {
        fixture.coordinator.reinvoke(*stage);
    }
    stages
}

#[test]
fn test_style_change_reruns_only_style() {
    let fixture = fixture();
    let stages = change(&fixture, &["src/scss/app.scss"]);

    assert_eq!(stages, vec![StageKind::StyleCompile]);
    // one stage run compiles both stylesheets
    assert_eq!(fixture.styles.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fixture.scripts.calls.load(Ordering::SeqCst), 0);
    assert!(fixture.path("out/css/app.css").exists());
    assert!(!fixture.path("out/index.html").exists());

    let scopes = fixture.notifier.take();
    assert_eq!(scopes.len(), 1);
    match &scopes[0] {
        ReloadScope::StreamUpdate { stage, paths } => {
            assert_eq!(*stage, StageKind::StyleCompile);
            assert_eq!(paths.len(), 2);
        }
        other => panic!("expected a stream update, got {}", other),
    }
}

#[test]
fn test_burst_of_style_changes_is_one_run() {
    let fixture = fixture();
    let stages = change(&fixture, &["src/scss/app.scss", "src/scss/print.scss", "src/scss/app.scss"]);
    assert_eq!(stages, vec![StageKind::StyleCompile]);
    assert_eq!(fixture.notifier.take().len(), 1);
}

#[test]
fn test_markup_change_requests_full_reload() {
    let fixture = fixture();
    change(&fixture, &["src/index.html"]);
    assert_eq!(fixture.notifier.take(), vec![ReloadScope::Full]);
    assert_eq!(fs::read_to_string(fixture.path("out/index.html")).unwrap(), "<p>x</p>\n");

    // Still a full reload when the expansion fails
    write(fixture.temp.path(), "src/index.html", "@@include('nope.html')");
    change(&fixture, &["src/index.html"]);
    assert_eq!(fixture.notifier.take(), vec![ReloadScope::Full]);
    assert!(fixture.coordinator.is_failing(StageKind::MarkupInclude));
}

#[test]
fn test_partial_outside_markup_glob_is_ignored() {
    let fixture = fixture();
    // src/*.html does not reach into src/parts/
    assert!(change(&fixture, &["src/parts/x.html"]).is_empty());
    assert!(fixture.notifier.take().is_empty());
}

#[test]
fn test_script_failure_keeps_watching_and_recovers() {
    let fixture = fixture();
    write(fixture.temp.path(), "src/ts/app.ts", "FAIL");
    change(&fixture, &["src/ts/app.ts"]);
    assert!(fixture.coordinator.is_failing(StageKind::TypeCompile));

    let scopes = fixture.notifier.take();
    assert_eq!(scopes.len(), 1);
    assert!(!scopes[0].is_full());

    write(fixture.temp.path(), "src/ts/app.ts", "let b;\n");
    change(&fixture, &["src/ts/app.ts"]);
    assert!(!fixture.coordinator.is_failing(StageKind::TypeCompile));
    assert_eq!(fs::read_to_string(fixture.path("out/js/app.js")).unwrap(), "let b;\n");
    assert_eq!(
        fixture.notifier.take(),
        vec![ReloadScope::StreamUpdate { stage: StageKind::TypeCompile, paths: vec![fixture.path("out/js/app.js")] }]
    );
}

#[test]
fn test_asset_change_copies_and_reloads() {
    let fixture = fixture();
    assert_eq!(change(&fixture, &["src/img/logo.svg"]), vec![StageKind::AssetCopy]);
    assert!(fixture.path("out/img/logo.svg").exists());
    assert_eq!(fixture.notifier.take(), vec![ReloadScope::Full]);
}

#[test]
fn test_mixed_batch_routes_each_stage_once() {
    let fixture = fixture();
    let stages = change(&fixture, &["src/ts/app.ts", "src/scss/app.scss", "README.md"]);
    assert_eq!(stages, vec![StageKind::TypeCompile, StageKind::StyleCompile]);
    assert_eq!(fixture.scripts.calls.load(Ordering::SeqCst), 1);
}
