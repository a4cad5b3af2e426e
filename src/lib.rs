pub mod config;
pub mod error;
pub mod graph;
pub mod signals;
pub mod stats;
pub mod supervisor;
pub mod sync;
pub mod watchdog;

use clap::Parser;

use config::{OutputCodec, OutputContainer};

#[derive(Parser, Debug)]
#[command(
    name = "resilient-relay",
    about = "Resilient live-video relay with A/B ingest failover, dynamic graph rebuild and a frame-synchronized constant-rate output"
)]
pub struct Cli {
    /// Path to an optional TOML config file; CLI flags below override it.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub recv_buffer_size: Option<u32>,
    #[arg(long)]
    pub jitter_buffer_ms: Option<u32>,
    #[arg(long)]
    pub max_queue_ms: Option<u32>,

    #[arg(long)]
    pub output_host: Option<String>,
    #[arg(long)]
    pub output_port: Option<u16>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub fps: Option<u32>,
    #[arg(long)]
    pub bitrate_kbps: Option<u32>,
    #[arg(long)]
    pub keyframe_interval: Option<u32>,
    #[arg(long)]
    pub output_codec: Option<OutputCodec>,
    #[arg(long)]
    pub output_container: Option<OutputContainer>,
    #[arg(long)]
    pub shm_path: Option<String>,
    #[arg(long)]
    pub shm_size: Option<u32>,
    #[arg(long)]
    pub output_file: Option<String>,

    #[arg(long)]
    pub stats_interval_s: Option<u32>,
    #[arg(long, default_value_t = false)]
    pub verbose: bool,

    #[arg(long)]
    pub watchdog_timeout_ms: Option<u64>,
    #[arg(long)]
    pub resume_threshold_ms: Option<u64>,
    #[arg(long)]
    pub no_signal_timeout_ms: Option<u64>,
}
