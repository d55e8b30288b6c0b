//! HTML directory listings, generated on demand.

use std::io;
use std::path::Path;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// A symbolic link; `to_dir` is set when it points at a directory.
    Symlink { to_dir: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl ListingEntry {
    /// Name as shown: `/` after directories, `@` after symlinks.
    pub fn display_name(&self) -> String {
        match self.kind {
            EntryKind::File => self.name.clone(),
            EntryKind::Directory => format!("{}/", self.name),
            EntryKind::Symlink { .. } => format!("{}@", self.name),
        }
    }

    /// Relative link target, percent-encoded. Links to directories, symlinked
    /// or not, end in `/`.
    pub fn href(&self) -> String {
        let encoded = urlencoding::encode(&self.name);
        match self.kind {
            EntryKind::Directory | EntryKind::Symlink { to_dir: true } => format!("{encoded}/"),
            _ => encoded.into_owned(),
        }
    }
}

/// The entries of one directory, sorted case-insensitively by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    display_path: String,
    entries: Vec<ListingEntry>,
}

impl DirectoryListing {
    /// Builds a listing from already collected entries.
    pub fn new(display_path: impl Into<String>, mut entries: Vec<ListingEntry>) -> Self {
        entries.sort_by_cached_key(|entry| entry.name.to_lowercase());
        DirectoryListing { display_path: display_path.into(), entries }
    }

    /// Reads `dir` from disk. `request_path` is the raw request path, shown
    /// decoded in the page title.
    pub async fn read(dir: &Path, request_path: &str) -> io::Result<Self> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_symlink() {
                // follows the link; a dangling one is not a directory
                let to_dir = tokio::fs::metadata(entry.path())
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                EntryKind::Symlink { to_dir }
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(ListingEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        let display_path = urlencoding::decode_binary(request_path.as_bytes());
        let display_path = String::from_utf8_lossy(&display_path).into_owned();
        Ok(DirectoryListing::new(display_path, entries))
    }

    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn to_html(&self) -> String {
        let title = escape_html(&self.display_path);
        let mut html = String::with_capacity(256 + self.entries.len() * 64);
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>Directory listing for {title}</title>\n</head>\n"));
        html.push_str(&format!("<body>\n<h2>Directory listing for {title}</h2>\n"));
        html.push_str("<hr>\n<ul>\n");
        for entry in &self.entries {
            html.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                escape_html(&entry.href()),
                escape_html(&entry.display_name()),
            ));
        }
        html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
        html
    }
}

impl IntoResponse for DirectoryListing {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_static("text/html; charset=utf-8");
        (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], self.to_html()).into_response()
    }
}

pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
