//! Accepting connections and dispatching requests.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServeConfig;
use crate::error::ServeError;
use crate::range::range_from_headers;
use crate::resolve::resolve;
use crate::respond::respond;

/// The HTTP front end. Owns the configuration and shares it read-only with
/// every request; each connection is served on its own task.
#[derive(Debug, Clone)]
pub struct FileServer {
    config: Arc<ServeConfig>,
}

impl FileServer {
    pub fn new(config: ServeConfig) -> Self {
        FileServer { config: Arc::new(config) }
    }

    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Every path goes to the same handler; routing happens in [`resolve`].
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(handle_request)
            .with_state(self.config.clone())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
    }

    /// Binds all interfaces on the configured port.
    pub async fn bind(&self) -> Result<TcpListener, ServeError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port()));
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })
    }

    /// Checks the served directory, binds, and serves until the process exits.
    pub async fn serve(self) -> Result<(), ServeError> {
        self.check_paths().await?;
        let listener = self.bind().await?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServeError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            %addr,
            root = %self.config.root_dir().display(),
            "serving"
        );
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// The served directory must be readable; missing media files only warrant a warning.
    pub async fn check_paths(&self) -> Result<(), ServeError> {
        let root = self.config.root_dir();
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|source| ServeError::RootDir { path: root.to_path_buf(), source })?;
        if !metadata.is_dir() {
            return Err(ServeError::NotADirectory(root.to_path_buf()));
        }
        // readable, not just present
        drop(
            tokio::fs::read_dir(root)
                .await
                .map_err(|source| ServeError::RootDir { path: root.to_path_buf(), source })?,
        );

        for path in [self.config.video_path(), self.config.labels_path()] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                tracing::warn!(path = %path.display(), "configured media file does not exist");
            }
        }
        Ok(())
    }
}

async fn handle_request(
    State(config): State<Arc<ServeConfig>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::NOT_IMPLEMENTED, "Unsupported method").into_response();
    }

    let range = range_from_headers(&headers);
    let request_path = uri.path();
    let target = resolve(request_path, &config).await;
    tracing::debug!(%method, request_path, ?range, target = %target.path.display(), "resolved");

    let response = respond(&target, range, request_path).await;
    tracing::info!(%method, path = %request_path, status = response.status().as_u16(), "served");
    response
}
