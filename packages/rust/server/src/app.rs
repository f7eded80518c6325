//! HTTP routing: static files or reverse proxy, plus the live-reload socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{FromRef, Request, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use url::Url;

use crate::livereload::{LIVERELOAD_PATH, LiveReload, inject, websocket_handler};
use crate::proxy;

/// What the dev server answers regular requests with.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Serve files from a build directory.
    Static { root: PathBuf },
    /// Forward everything to an upstream server.
    Proxy {
        upstream: Url,
        client: reqwest::Client,
    },
}

#[derive(Clone)]
pub struct AppState {
    pub mode: Arc<Mode>,
    pub reload: LiveReload,
}

impl FromRef<AppState> for LiveReload {
    fn from_ref(state: &AppState) -> Self {
        state.reload.clone()
    }
}

/// Build the router for `mode`.
pub fn router(mode: Mode, reload: LiveReload) -> Router {
    let state = AppState {
        mode: Arc::new(mode),
        reload,
    };

    Router::new()
        .route(LIVERELOAD_PATH, get(websocket_handler))
        .fallback(dispatch)
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    match state.mode.as_ref() {
        Mode::Static { root } => serve_static(root, request.uri()).await,
        Mode::Proxy { upstream, client } => proxy::forward(client, upstream, request).await,
    }
}

/// Map a percent-encoded request path onto `root`.
///
/// Segments are decoded first; dot segments, separators and NUL bytes in the
/// decoded form are refused, as is anything that is not UTF-8.
pub fn resolve_path(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for raw in uri_path.split('/').filter(|s| !s.is_empty()) {
        let segment = percent_decode_str(raw).decode_utf8().ok()?;
        if segment == "."
            || segment == ".."
            || segment.contains(['/', '\\', '\0'])
        {
            return None;
        }
        path.push(&*segment);
    }
    Some(path)
}

async fn serve_static(root: &Path, uri: &Uri) -> Response {
    let Some(mut path) = resolve_path(root, uri.path()) else {
        warn!(path = uri.path(), "rejected path outside the served root");
        return StatusCode::FORBIDDEN.into_response();
    };

    if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path.push("index.html");
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = uri.path(), "not found");
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "read failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let body = if mime.essence_str() == "text/html" {
        Body::from(inject(&String::from_utf8_lossy(&bytes)))
    } else {
        Body::from(bytes)
    };

    ([(header::CONTENT_TYPE, mime.as_ref().to_string())], body).into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::livereload::CLIENT_SCRIPT;

    /// Serve `app` on an ephemeral port.
    pub(crate) async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn dist() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets/css")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<html><body>home</body></html>").unwrap();
        std::fs::write(dir.path().join("assets/css/main.min.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn resolve_rejects_dot_segments() {
        let root = Path::new("/srv/dist");
        assert_eq!(
            resolve_path(root, "/assets/css/main.min.css"),
            Some(PathBuf::from("/srv/dist/assets/css/main.min.css"))
        );
        assert_eq!(resolve_path(root, "/"), Some(PathBuf::from("/srv/dist")));
        assert_eq!(resolve_path(root, "/../etc/passwd"), None);
        assert_eq!(resolve_path(root, "/a/..\\b"), None);
    }

    #[test]
    fn resolve_decodes_before_checking() {
        let root = Path::new("/srv/dist");
        assert_eq!(
            resolve_path(root, "/about%20us.html"),
            Some(PathBuf::from("/srv/dist/about us.html"))
        );
        assert_eq!(
            resolve_path(root, "/caf%C3%A9.html"),
            Some(PathBuf::from("/srv/dist/café.html"))
        );
        assert_eq!(resolve_path(root, "/%2e%2e/etc/passwd"), None);
        assert_eq!(resolve_path(root, "/..%2fetc%2fpasswd"), None);
        assert_eq!(resolve_path(root, "/a%5c..%5cb"), None);
        assert_eq!(resolve_path(root, "/bad%FF.html"), None);
    }

    #[tokio::test]
    async fn serves_index_with_reload_script() {
        let dir = dist();
        let app = router(
            Mode::Static {
                root: dir.path().to_path_buf(),
            },
            LiveReload::new(),
        );
        let addr = spawn(app).await;

        let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(
            resp.headers()[reqwest::header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let body = resp.text().await.unwrap();
        assert!(body.contains(CLIENT_SCRIPT));
        assert!(body.ends_with("</body></html>"));
    }

    #[tokio::test]
    async fn serves_assets_and_404s() {
        let dir = dist();
        let app = router(
            Mode::Static {
                root: dir.path().to_path_buf(),
            },
            LiveReload::new(),
        );
        let addr = spawn(app).await;

        let css = reqwest::get(format!("http://{addr}/assets/css/main.min.css"))
            .await
            .unwrap();
        assert_eq!(css.headers()[reqwest::header::CONTENT_TYPE], "text/css");
        assert_eq!(css.text().await.unwrap(), "body{}");

        let missing = reqwest::get(format!("http://{addr}/nope.html")).await.unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn serves_encoded_names_and_refuses_encoded_traversal() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = dist();
        std::fs::write(dir.path().join("about us.html"), "<p>about</p>").unwrap();
        std::fs::write(dir.path().join("café.html"), "<p>menu</p>").unwrap();
        let app = router(
            Mode::Static {
                root: dir.path().to_path_buf(),
            },
            LiveReload::new(),
        );
        let addr = spawn(app).await;

        let space = reqwest::get(format!("http://{addr}/about%20us.html")).await.unwrap();
        assert_eq!(space.status(), 200);
        let accented = reqwest::get(format!("http://{addr}/café.html")).await.unwrap();
        assert_eq!(accented.status(), 200);
        assert!(accented.text().await.unwrap().contains("menu"));

        // Raw request: HTTP clients normalize `%2e%2e` before sending.
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /%2e%2e/index.html HTTP/1.1\r\nHost: dev\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 403"), "{reply}");
    }
}
