//! # range-httpd
//!
//! A static file server for exercising HTTP byte-range requests in
//! integration tests. Media players scrub through video with partial content
//! requests; this server answers them, including the awkward cases (open
//! ended ranges, malformed headers, ranges past the end of the file), and
//! serves plain `200` responses when no `Range` header is sent.
//!
//! A request flows through four pieces:
//!
//! 1. [`range::parse_range_header`] turns the `Range` header into an optional
//!    [`ByteRange`].
//! 2. [`resolve::resolve`] maps the request path onto the filesystem, applying
//!    the configured per-resource delay and the logical routes of
//!    [`RouteTable`].
//! 3. [`respond::respond`] builds the response: a full or partial file, a
//!    redirect, a directory listing, or a 404.
//! 4. [`FileServer`] accepts connections and drives the above per request.
//!
//! ```no_run
//! use range_httpd::{FileServer, ServeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), range_httpd::ServeError> {
//!     let config = ServeConfig::new("public", "media/video.mp4", "media/video-labels.json")
//!         .with_port(8000);
//!     FileServer::new(config).serve().await
//! }
//! ```
//!
//! Any type implementing both [`AsyncRead`] and [`AsyncSeekStart`] can be
//! served as a ranged body through the [`KnownSize`] adapter, with special
//! cased support for [`tokio::fs::File`] in [`KnownSize::file`].

pub mod config;
pub mod listing;
pub mod range;
pub mod resolve;
pub mod respond;

mod error;
mod file;
mod server;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncSeek};

pub use config::{DelayPolicy, RouteTable, ServeConfig, Sleeper};
pub use error::ServeError;
pub use file::KnownSize;
pub use range::ByteRange;
pub use resolve::ResolvedTarget;
pub use respond::{Ranged, RangedResponse, RangeNotSatisfiable};
pub use server::FileServer;
pub use stream::RangedStream;

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying file.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Behaviour is not guaranteed if it does change.
    fn byte_size(&self) -> u64;

    /// Last modification time, sent as `Last-Modified` when known.
    fn modified(&self) -> Option<SystemTime> { None }
}
