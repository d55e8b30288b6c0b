//! Translation of request paths into filesystem paths.

use std::path::{Component, Path, PathBuf};

use crate::config::ServeConfig;

/// Where a single request landed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Resolves `request_path` against `config`.
///
/// Waits for the delay configured for the final path component first, so a
/// slow resource only holds up its own request. A logical route for the
/// final component wins over the served root; otherwise the normalised
/// components are joined onto the root and can never leave it.
pub async fn resolve(request_path: &str, config: &ServeConfig) -> ResolvedTarget {
    let components = normalize_request_path(request_path);
    let filename = components.last().map(String::as_str).unwrap_or("");

    config.delay_for(filename).await;

    let path = match config.routes().lookup(filename) {
        Some(target) => {
            tracing::debug!(request_path, target = %target.display(), "logical route");
            target.to_path_buf()
        }
        None => join_under(config.root_dir(), &components),
    };

    let is_dir = tokio::fs::metadata(&path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false);

    ResolvedTarget { path, is_dir }
}

/// Splits a request target into decoded, normalised path components.
///
/// Query string and fragment are dropped, the rest is percent-decoded, and
/// `.`/`..` segments are folded the way a POSIX path would be, never going
/// above the root. Empty segments from repeated slashes disappear.
pub fn normalize_request_path(request_path: &str) -> Vec<String> {
    let path = request_path
        .split_once('?')
        .map_or(request_path, |(path, _)| path);
    let path = path.split_once('#').map_or(path, |(path, _)| path);

    let decoded = urlencoding::decode_binary(path.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut components: Vec<String> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            segment => components.push(segment.to_owned()),
        }
    }
    components
}

fn join_under(root: &Path, components: &[String]) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in components {
        // keeps only the last plain name, dropping drive prefixes and separators
        let name = Path::new(component)
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .last();
        if let Some(name) = name {
            path.push(name);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LABELS_ROUTE, VIDEO_ROUTE};

    fn config(root: &Path) -> ServeConfig {
        ServeConfig::new(root, "/media/test-video.mp4", "/media/test-labels.json")
    }

    #[test]
    fn test_normalize_strips_query_and_fragment() {
        assert_eq!(vec!["a", "b.txt"], normalize_request_path("/a/b.txt?x=1#top"));
        assert_eq!(vec!["a"], normalize_request_path("/a#frag?not-a-query"));
    }

    #[test]
    fn test_normalize_collapses_slashes_and_dots() {
        assert_eq!(vec!["a", "b"], normalize_request_path("//a///./b/"));
        assert_eq!(vec!["b"], normalize_request_path("/a/../b"));
        assert_eq!(vec!["etc", "passwd"], normalize_request_path("/../../etc/passwd"));
        assert!(normalize_request_path("/").is_empty());
        assert!(normalize_request_path("").is_empty());
    }

    #[test]
    fn test_normalize_percent_decodes() {
        assert_eq!(vec!["my file.txt"], normalize_request_path("/my%20file.txt"));
        assert_eq!(vec!["a", "b"], normalize_request_path("/a%2Fb"));
        assert_eq!(vec!["x"], normalize_request_path("/a/%2E%2E/x"));
        assert_eq!(vec!["\u{FFFD}.bin"], normalize_request_path("/%FF.bin"));
    }

    #[test]
    fn test_join_ignores_prefixes() {
        let root = Path::new("/srv");
        let joined = join_under(root, &["a".to_owned(), "b.txt".to_owned()]);
        assert_eq!(PathBuf::from("/srv/a/b.txt"), joined);
    }

    #[tokio::test]
    async fn test_resolve_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/file.txt"), b"hi").unwrap();
        let config = config(dir.path());

        let target = resolve("/sub/file.txt", &config).await;
        assert_eq!(dir.path().join("sub/file.txt"), target.path);
        assert!(!target.is_dir);

        let target = resolve("/sub", &config).await;
        assert_eq!(dir.path().join("sub"), target.path);
        assert!(target.is_dir);

        let target = resolve("/", &config).await;
        assert_eq!(dir.path(), target.path);
        assert!(target.is_dir);
    }

    #[tokio::test]
    async fn test_resolve_never_escapes_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let target = resolve("/../../../etc/passwd", &config).await;
        assert_eq!(dir.path().join("etc/passwd"), target.path);

        let target = resolve("/%2e%2e/%2e%2e/secret", &config).await;
        assert_eq!(dir.path().join("secret"), target.path);
    }

    #[tokio::test]
    async fn test_logical_routes_ignore_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        for request in ["/video.mp4", "/deep/nested/video.mp4", "/x/video.mp4?t=10"] {
            let target = resolve(request, &config).await;
            assert_eq!(PathBuf::from("/media/test-video.mp4"), target.path, "{request}");
        }

        let target = resolve(&format!("/data/{LABELS_ROUTE}"), &config).await;
        assert_eq!(PathBuf::from("/media/test-labels.json"), target.path);

        // only the exact final component is routed
        let target = resolve(&format!("/{VIDEO_ROUTE}/extra"), &config).await;
        assert_eq!(dir.path().join(VIDEO_ROUTE).join("extra"), target.path);
    }

    #[tokio::test]
    async fn test_missing_path_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = resolve("/nope", &config(dir.path())).await;
        assert_eq!(dir.path().join("nope"), target.path);
        assert!(!target.is_dir);
    }
}
