// cli.rs - Command-line interface configuration
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::ViewerConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "stlview")]
#[command(about = "Terminal STL viewer", long_about = None)]
pub struct Cli {
    /// STL file to open; a built-in cube is shown when omitted
    pub path: Option<PathBuf>,

    /// Start with the edge overlay hidden
    #[arg(long = "no-edges", default_value = "false")]
    pub no_edges: bool,

    /// Start with back-face culling disabled
    #[arg(long = "no-cull", default_value = "false")]
    pub no_cull: bool,

    /// Target frame rate
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Import progress polling interval in milliseconds
    #[arg(long = "poll-ms", default_value_t = 5)]
    pub poll_ms: u64,

    /// Automatic orbit about the vertical axis, degrees per frame
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub spin: f32,

    /// Zoom change per unit of ctrl+right drag
    #[arg(long = "zoom-sensitivity", default_value_t = 5.0)]
    pub zoom_sensitivity: f32,

    /// Write log output to this file instead of stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn config(&self) -> ViewerConfig {
        ViewerConfig {
            path: self.path.clone(),
            show_edges: !self.no_edges,
            cull_back_faces: !self.no_cull,
            frame_time: Duration::from_millis(1000 / u64::from(self.fps.max(1))),
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            spin_deg: self.spin,
            zoom_sensitivity: self.zoom_sensitivity,
        }
    }
}
