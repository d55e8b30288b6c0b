//! Startup configuration shared read-only by every request handler.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

/// Final path component that is always served from the configured video file.
pub const VIDEO_ROUTE: &str = "video.mp4";
/// Final path component that is always served from the configured labels file.
pub const LABELS_ROUTE: &str = "video-labels.json";

pub const DEFAULT_PORT: u16 = 8000;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "range_httpd=info,tower_http=info";

/// Waits for the given duration. Injected so tests can skip real sleeping.
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Logical routes: a request whose final path component matches a key is
/// served from the mapped path, whatever directories precede it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<String, PathBuf>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the override for `filename`.
    pub fn insert(&mut self, filename: impl Into<String>, target: impl Into<PathBuf>) {
        self.routes.insert(filename.into(), target.into());
    }

    pub fn lookup(&self, filename: &str) -> Option<&Path> {
        self.routes.get(filename).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Artificial latency applied before serving a resource, keyed by the final
/// component of the request path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayPolicy {
    default: Duration,
    per_name: HashMap<String, Duration>,
}

impl DelayPolicy {
    pub fn new(default: Duration) -> Self {
        DelayPolicy { default, per_name: HashMap::new() }
    }

    pub fn set(&mut self, filename: impl Into<String>, delay: Duration) {
        self.per_name.insert(filename.into(), delay);
    }

    /// The delay for `filename`, falling back to the default.
    pub fn for_name(&self, filename: &str) -> Duration {
        self.per_name.get(filename).copied().unwrap_or(self.default)
    }

    pub fn default_delay(&self) -> Duration {
        self.default
    }
}

/// Immutable server configuration, built once at startup.
#[derive(Clone)]
pub struct ServeConfig {
    root_dir: PathBuf,
    video_path: PathBuf,
    labels_path: PathBuf,
    routes: RouteTable,
    delays: DelayPolicy,
    sleeper: Sleeper,
    port: u16,
}

impl ServeConfig {
    /// Creates a config serving `root_dir`, with the two logical routes
    /// pointing at `video_path` and `labels_path`, no delay and port 8000.
    pub fn new(
        root_dir: impl Into<PathBuf>,
        video_path: impl Into<PathBuf>,
        labels_path: impl Into<PathBuf>,
    ) -> Self {
        let video_path = video_path.into();
        let labels_path = labels_path.into();

        let mut routes = RouteTable::new();
        routes.insert(VIDEO_ROUTE, video_path.clone());
        routes.insert(LABELS_ROUTE, labels_path.clone());

        ServeConfig {
            root_dir: root_dir.into(),
            video_path,
            labels_path,
            routes,
            delays: DelayPolicy::default(),
            sleeper: Arc::new(|delay: Duration| tokio::time::sleep(delay).boxed()),
            port: DEFAULT_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.delays.default = delay;
        self
    }

    /// Overrides the delay for requests whose final path component is `filename`.
    pub fn with_delay_for(mut self, filename: impl Into<String>, delay: Duration) -> Self {
        self.delays.set(filename, delay);
        self
    }

    /// Adds a logical route besides the video and labels ones.
    pub fn with_route(mut self, filename: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        self.routes.insert(filename, target);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn labels_path(&self) -> &Path {
        &self.labels_path
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn delays(&self) -> &DelayPolicy {
        &self.delays
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the configured delay of `filename`. Returns immediately for a zero delay.
    pub async fn delay_for(&self, filename: &str) {
        let delay = self.delays.for_name(filename);
        if delay.is_zero() {
            return;
        }
        tracing::debug!(filename, ?delay, "delaying response");
        (self.sleeper)(delay).await;
    }
}

impl fmt::Debug for ServeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeConfig")
            .field("root_dir", &self.root_dir)
            .field("video_path", &self.video_path)
            .field("labels_path", &self.labels_path)
            .field("routes", &self.routes)
            .field("delays", &self.delays)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
