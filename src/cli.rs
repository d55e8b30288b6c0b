use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use range_httpd::config::{DEFAULT_PORT, LABELS_ROUTE, VIDEO_ROUTE};
use range_httpd::ServeConfig;

/// Serve static files with HTTP Range support, for scrubbing tests.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to serve static files from [default: current directory]
    #[arg(short, long)]
    pub serve_path: Option<PathBuf>,

    /// Path to test video [default: test/data/video.mp4]
    #[arg(short = 'v', long, visible_alias = "video")]
    pub video_path: Option<PathBuf>,

    /// Path to test labels [default: test/data/video-labels.json]
    #[arg(short = 'l', long, visible_alias = "video-labels")]
    pub video_labels_path: Option<PathBuf>,

    /// Seconds to wait before serving any request
    #[arg(short, long, default_value = "0", value_parser = parse_delay, help_heading = "Delays")]
    pub delay: Duration,

    /// Seconds to wait before serving a video request
    #[arg(long, value_parser = parse_delay, help_heading = "Delays")]
    pub video_delay: Option<Duration>,

    /// Seconds to wait before serving a video labels request
    #[arg(long, value_parser = parse_delay, help_heading = "Delays")]
    pub video_labels_delay: Option<Duration>,
}

impl Cli {
    /// Builds the server configuration, filling path defaults relative to `cwd`.
    pub fn into_config(self, cwd: PathBuf) -> ServeConfig {
        let data_dir = cwd.join("test").join("data");
        let video_path = self.video_path.unwrap_or_else(|| data_dir.join(VIDEO_ROUTE));
        let labels_path = self.video_labels_path.unwrap_or_else(|| data_dir.join(LABELS_ROUTE));
        let serve_path = self.serve_path.unwrap_or(cwd);

        let mut config = ServeConfig::new(serve_path, video_path, labels_path)
            .with_port(self.port)
            .with_default_delay(self.delay);
        // an explicit zero still overrides the default delay
        if let Some(delay) = self.video_delay {
            config = config.with_delay_for(VIDEO_ROUTE, delay);
        }
        if let Some(delay) = self.video_labels_delay {
            config = config.with_delay_for(LABELS_ROUTE, delay);
        }
        config
    }
}

fn parse_delay(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("{s} is not a valid number of seconds"))
}
