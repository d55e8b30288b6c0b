use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Failures that stop the server from starting or keep it from serving.
///
/// Per-request problems never surface here; they become 404 or 416
/// responses on their own connection.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("cannot access served directory {}: {source}", path.display())]
    RootDir { path: PathBuf, source: io::Error },

    #[error("served path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}
