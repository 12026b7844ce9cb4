//! Live-reload development server.
//!
//! Serves the output tree, pushes reload notifications to browsers over
//! server-sent events, and injects the small client script that listens for
//! them into every HTML document it serves.

use axum::{
    extract::{Request, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::get,
    Router,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::build::BuildContext;
use crate::reload::{BroadcastNotifier, ReloadScope};

/// Event stream endpoint.
pub const EVENTS_PATH: &str = "/__stagehand/events";
/// Client script endpoint.
pub const CLIENT_PATH: &str = "/__stagehand/client.js";

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__stagehand/events");
  source.addEventListener("reload", function () {
    location.reload();
  });
  source.addEventListener("update", function (event) {
    var data = JSON.parse(event.data);
    if (data.paths.length === 0) return;
    if (data.stage !== "style-compile") {
      location.reload();
      return;
    }
    var stamp = Date.now();
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
      var url = new URL(link.href, location.href);
      if (data.paths.indexOf(url.pathname) !== -1) {
        url.searchParams.set("v", stamp);
        link.href = url.toString();
      }
    });
  });
})();
"#;

/// Errors from the live-reload server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Cannot listen on {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Where and what to serve.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    /// Static root, normally the environment's dist directory
    pub root: PathBuf,
    /// Document served for directory requests
    pub index: String,
}

impl ServerOptions {
    pub fn from_context(context: &BuildContext) -> Self {
        let server = &context.env().server;
        Self { host: server.host.clone(), port: server.port, root: context.dist_dir(), index: server.index.clone() }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
struct AppState {
    root: Arc<PathBuf>,
    index: Arc<str>,
    notifier: BroadcastNotifier,
}

/// Build the router without binding a socket.
pub fn router(options: &ServerOptions, notifier: BroadcastNotifier) -> Router {
    let state = AppState {
        root: Arc::new(options.root.clone()),
        index: Arc::from(options.index.as_str()),
        notifier,
    };
    Router::new()
        .route(EVENTS_PATH, get(events))
        .route(CLIENT_PATH, get(client_script))
        .fallback(static_file)
        .with_state(state)
}

/// Serve until the process ends.
pub async fn serve(options: ServerOptions, notifier: BroadcastNotifier) -> Result<(), ServerError> {
    let addr = options.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

    if !options.root.is_dir() {
        tracing::warn!("{} does not exist yet", options.root.display());
    }
    tracing::info!("Serving {} at http://{}", options.root.display(), addr);

    axum::serve(listener, router(&options, notifier)).await.map_err(ServerError::Serve)
}

/// Event name and JSON data sent to clients for a notification.
///
/// Output paths become URL paths under the static root; paths outside it are dropped.
pub fn client_event(scope: &ReloadScope, root: &Path) -> (&'static str, String) {
    match scope {
        ReloadScope::Full => ("reload", "{}".to_string()),
        ReloadScope::StreamUpdate { stage, paths } => {
            let urls: Vec<String> = paths.iter().filter_map(|p| url_path(p, root)).collect();
            ("update", serde_json::json!({ "stage": stage, "paths": urls }).to_string())
        }
    }
}

fn url_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(format!("/{}", segments.join("/")))
}

async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("Reload client connected");
    let root = state.root.clone();

    let stream = BroadcastStream::new(state.notifier.subscribe()).filter_map(move |msg| {
        let root = root.clone();
        async move {
            match msg {
                Ok(scope) => {
                    let (name, data) = client_event(&scope, &root);
                    Some(Ok(Event::default().event(name).data(data)))
                }
                Err(e) => {
                    tracing::warn!("Reload client lagging: {}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS)
}

/// Insert the client script tag before the closing body tag, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", CLIENT_PATH);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], tag, &html[at..]),
        None => format!("{}{}", html, tag),
    }
}

/// The HTML document a request path names, if any.
fn html_target(root: &Path, index: &str, uri_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in uri_path.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    if path.is_dir() {
        path.push(index);
    }

    let is_html = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
    (is_html && path.is_file()).then_some(path)
}

async fn static_file(State(state): State<AppState>, request: Request) -> Response {
    if let Some(file) = html_target(&state.root, &state.index, request.uri().path()) {
        match tokio::fs::read_to_string(&file).await {
            Ok(text) => return Html(inject_client(&text)).into_response(),
            Err(e) => tracing::debug!("Serving {} without injection: {}", file.display(), e),
        }
    }

    match ServeDir::new(state.root.as_path()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::StageKind;
    use axum::body::Body;
    use axum::http::StatusCode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inject_before_body_close() {
        assert_eq!(
            inject_client("<html><BODY>x</BODY></html>"),
            "<html><BODY>x<script src=\"/__stagehand/client.js\"></script></BODY></html>"
        );
        assert_eq!(inject_client("<p>x</p>"), "<p>x</p><script src=\"/__stagehand/client.js\"></script>");
    }

    #[test]
    fn test_client_event_urls() {
        let root = Path::new("/p/out");
        let scope = ReloadScope::StreamUpdate {
            stage: StageKind::StyleCompile,
            paths: vec![PathBuf::from("/p/out/css/app.css"), PathBuf::from("/elsewhere/x.css")],
        };
        let (name, data) = client_event(&scope, root);
        assert_eq!(name, "update");
        let json: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(json["stage"], "style-compile");
        assert_eq!(json["paths"], serde_json::json!(["/css/app.css"]));

        assert_eq!(client_event(&ReloadScope::Full, root).0, "reload");
    }

    #[test]
    fn test_html_target() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("index.html"), "").unwrap();
        fs::write(temp.path().join("docs/index.html"), "").unwrap();
        fs::write(temp.path().join("app.js"), "").unwrap();

        assert_eq!(html_target(temp.path(), "index.html", "/"), Some(temp.path().join("index.html")));
        assert_eq!(html_target(temp.path(), "index.html", "/docs/"), Some(temp.path().join("docs/index.html")));
        assert_eq!(html_target(temp.path(), "index.html", "/app.js"), None);
        assert_eq!(html_target(temp.path(), "index.html", "/../etc/passwd"), None);
        assert_eq!(html_target(temp.path(), "index.html", "/missing.html"), None);
    }

    fn options(root: &Path) -> ServerOptions {
        ServerOptions { host: "127.0.0.1".to_string(), port: 0, root: root.to_path_buf(), index: "index.html".to_string() }
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app.oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_serves_documents_with_client() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<body>hi</body>").unwrap();
        fs::write(temp.path().join("app.js"), "console.log(1)").unwrap();
        let app = router(&options(temp.path()), BroadcastNotifier::new());

        let (status, body) = get_body(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hi<script src=\"/__stagehand/client.js\"></script></body>"));

        let (_, body) = get_body(app.clone(), "/app.js").await;
        assert_eq!(body, "console.log(1)");

        let (_, body) = get_body(app.clone(), CLIENT_PATH).await;
        assert!(body.contains("EventSource"));

        let (status, _) = get_body(app, "/nope.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
