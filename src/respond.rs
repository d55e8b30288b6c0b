//! Building the response for a resolved request.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, ContentType, LastModified};
use mime_guess::Mime;

use crate::listing::DirectoryListing;
use crate::range::ByteRange;
use crate::resolve::ResolvedTarget;
use crate::{KnownSize, RangeBody, RangedStream};

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];
const LEGACY_DATA_SUFFIX: &str = "data";

/// Produces the response for `target`.
///
/// `request_path` is the path as the client sent it; it decides whether a
/// directory gets redirected and titles directory listings.
pub async fn respond(target: &ResolvedTarget, range: Option<ByteRange>, request_path: &str) -> Response {
    let mut path = target.path.clone();

    if target.is_dir {
        if !request_path.ends_with('/') {
            return redirect_to_dir(request_path);
        }
        match find_index(&path).await {
            Some(index) => path = index,
            None => return list_directory(&path, request_path).await,
        }
    }

    if let Some(aliased) = legacy_data_alias(&path).await {
        tracing::debug!(from = %path.display(), to = %aliased.display(), "legacy /data alias");
        path = aliased;
    }

    let body = match open(&path).await {
        Ok(body) => body,
        Err(e) => {
            tracing::info!(path = %path.display(), error = %e, "file not found");
            return not_found("File not found");
        }
    };

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ranged::new(range, body, content_type).into_response()
}

async fn open(path: &Path) -> io::Result<KnownSize<tokio::fs::File>> {
    let file = tokio::fs::File::open(path).await?;
    KnownSize::file(file).await
}

fn redirect_to_dir(request_path: &str) -> Response {
    let location = format!("{request_path}/");
    match HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => not_found("File not found"),
    }
}

async fn find_index(dir: &Path) -> Option<PathBuf> {
    for name in INDEX_FILES {
        let candidate = dir.join(name);
        if exists(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

async fn list_directory(dir: &Path, request_path: &str) -> Response {
    match DirectoryListing::read(dir, request_path).await {
        Ok(listing) => listing.into_response(),
        Err(e) => {
            tracing::info!(path = %dir.display(), error = %e, "cannot list directory");
            not_found("No permission to list directory")
        }
    }
}

// Older clients append `/data` to resource paths.
async fn legacy_data_alias(path: &Path) -> Option<PathBuf> {
    if path.file_name()? != LEGACY_DATA_SUFFIX {
        return None;
    }
    if exists(path).await {
        return None;
    }
    let parent = path.parent()?;
    exists(parent).await.then(|| parent.to_path_buf())
}

// Any lookup error, `ENOTDIR` included, counts as missing.
async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

fn not_found(message: &'static str) -> Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

/// A file-like body together with the optional requested range. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Ranged<B: RangeBody + Send + 'static> {
    range: Option<ByteRange>,
    body: B,
    content_type: Mime,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`]
    /// and an optional parsed [`ByteRange`].
    pub fn new(range: Option<ByteRange>, body: B, content_type: Mime) -> Self {
        Ranged { range, body, content_type }
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`]. Returns [`RangeNotSatisfiable`] if the range
    /// starts at or past the end of the body.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeNotSatisfiable> {
        let total_bytes = self.body.byte_size();
        let last_modified = self.body.modified();
        let content_type = self.content_type;

        match self.range {
            None => {
                let stream = RangedStream::new(self.body, 0, total_bytes);
                Ok(RangedResponse::Full {
                    content_length: ContentLength(total_bytes),
                    stream,
                    content_type,
                    last_modified,
                })
            }
            Some(range) => {
                let unsatisfiable = || RangeNotSatisfiable(ContentRange::unsatisfied_bytes(total_bytes));

                let window = range.clamp_to(total_bytes).ok_or_else(|| {
                    tracing::debug!(?range, total_bytes, "range starts past end of body");
                    unsatisfiable()
                })?;
                let (start, end) = (*window.start(), *window.end());
                let length = end - start + 1;

                let content_range = ContentRange::bytes(window, total_bytes)
                    .map_err(|_| unsatisfiable())?;
                let stream = RangedStream::new(self.body, start, length);

                tracing::debug!(start, end, total_bytes, "serving partial content");
                Ok(RangedResponse::Partial {
                    content_range,
                    content_length: ContentLength(length),
                    stream,
                    content_type,
                    last_modified,
                })
            }
        }
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}

/// Error type indicating that the requested range was not satisfiable. Implements [`IntoResponse`].
#[derive(Debug, Clone)]
pub struct RangeNotSatisfiable(pub ContentRange);

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(self.0);
        (status, header, ()).into_response()
    }
}

/// Data type containing computed headers and body for a file response. Implements [`IntoResponse`].
#[derive(Debug)]
pub enum RangedResponse<B> {
    /// Whole body, no range requested.
    Full {
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
        last_modified: Option<SystemTime>,
    },
    /// A single satisfiable range.
    Partial {
        content_range: ContentRange,
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
        last_modified: Option<SystemTime>,
    },
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        use RangedResponse::*;
        match self {
            Full { content_length, stream, content_type, last_modified } => {
                (
                    StatusCode::OK,
                    TypedHeader(AcceptRanges::bytes()),
                    TypedHeader(ContentType::from(content_type)),
                    TypedHeader(content_length),
                    last_modified.map(|t| TypedHeader(LastModified::from(t))),
                    stream,
                ).into_response()
            }
            Partial { content_range, content_length, stream, content_type, last_modified } => {
                (
                    StatusCode::PARTIAL_CONTENT,
                    TypedHeader(AcceptRanges::bytes()),
                    TypedHeader(ContentType::from(content_type)),
                    TypedHeader(content_range),
                    TypedHeader(content_length),
                    last_modified.map(|t| TypedHeader(LastModified::from(t))),
                    stream,
                ).into_response()
            }
        }
    }
}
