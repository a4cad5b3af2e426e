use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Full runtime configuration: loaded from an optional TOML file, then
/// overlaid with any CLI flags the caller passed. Immutable once built.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default = "default_stats_interval_s")]
    pub stats_interval_s: u32,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: u32,
    #[serde(default = "default_jitter_buffer_ms")]
    pub jitter_buffer_ms: u32,
    #[serde(default = "default_max_queue_ms")]
    pub max_queue_ms: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            port: default_port(),
            recv_buffer_size: default_recv_buffer_size(),
            jitter_buffer_ms: default_jitter_buffer_ms(),
            max_queue_ms: default_max_queue_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    Raw,
    H264,
    H265,
    Vp8,
    Vp9,
}

impl std::str::FromStr for OutputCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(OutputCodec::Raw),
            "h264" => Ok(OutputCodec::H264),
            "h265" => Ok(OutputCodec::H265),
            "vp8" => Ok(OutputCodec::Vp8),
            "vp9" => Ok(OutputCodec::Vp9),
            other => anyhow::bail!("unknown output codec '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputContainer {
    Rtp,
    MpegTs,
    SharedMemory,
    RawUdp,
    File,
}

impl std::str::FromStr for OutputContainer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "rtp" => Ok(OutputContainer::Rtp),
            "mpeg-ts" | "mpegts" => Ok(OutputContainer::MpegTs),
            "shared-memory" | "shm" => Ok(OutputContainer::SharedMemory),
            "raw-udp" | "raw" => Ok(OutputContainer::RawUdp),
            "file" => Ok(OutputContainer::File),
            other => anyhow::bail!("unknown output container '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default = "default_output_host")]
    pub host: String,
    #[serde(default = "default_output_port")]
    pub port: u16,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u32,
    #[serde(default = "default_codec")]
    pub codec: OutputCodec,
    #[serde(default = "default_container")]
    pub container: OutputContainer,
    #[serde(default = "default_shm_path")]
    pub shm_path: String,
    #[serde(default = "default_shm_size")]
    pub shm_size: u32,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            host: default_output_host(),
            port: default_output_port(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            bitrate_kbps: default_bitrate_kbps(),
            keyframe_interval: default_keyframe_interval(),
            codec: default_codec(),
            container: default_container(),
            shm_path: default_shm_path(),
            shm_size: default_shm_size(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThresholdsConfig {
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
    #[serde(default = "default_resume_threshold_ms")]
    pub resume_threshold_ms: u64,
    #[serde(default = "default_no_signal_timeout_ms")]
    pub no_signal_timeout_ms: u64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        ThresholdsConfig {
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            resume_threshold_ms: default_resume_threshold_ms(),
            no_signal_timeout_ms: default_no_signal_timeout_ms(),
        }
    }
}

fn default_port() -> u16 {
    5000
}
fn default_recv_buffer_size() -> u32 {
    8 * 1024 * 1024
}
fn default_jitter_buffer_ms() -> u32 {
    1000
}
fn default_max_queue_ms() -> u32 {
    3000
}
fn default_output_host() -> String {
    "127.0.0.1".to_string()
}
fn default_output_port() -> u16 {
    5004
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_fps() -> u32 {
    25
}
fn default_bitrate_kbps() -> u32 {
    1500
}
fn default_keyframe_interval() -> u32 {
    25
}
fn default_codec() -> OutputCodec {
    OutputCodec::H264
}
fn default_container() -> OutputContainer {
    OutputContainer::Rtp
}
fn default_shm_path() -> String {
    "/tmp/resilient-relay.sock".to_string()
}
fn default_shm_size() -> u32 {
    16 * 1024 * 1024
}
fn default_watchdog_timeout_ms() -> u64 {
    2000
}
fn default_resume_threshold_ms() -> u64 {
    100
}
fn default_no_signal_timeout_ms() -> u64 {
    5000
}
fn default_stats_interval_s() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            thresholds: ThresholdsConfig::default(),
            stats_interval_s: default_stats_interval_s(),
            verbose: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Overlay explicit CLI flags on top of this config. Only `Some(_)` fields
    /// in `cli` are applied; CLI always wins over file values.
    pub fn apply_cli(&mut self, cli: &crate::Cli) {
        if let Some(v) = cli.port {
            self.input.port = v;
        }
        if let Some(v) = cli.recv_buffer_size {
            self.input.recv_buffer_size = v;
        }
        if let Some(v) = cli.jitter_buffer_ms {
            self.input.jitter_buffer_ms = v;
        }
        if let Some(v) = cli.max_queue_ms {
            self.input.max_queue_ms = v;
        }
        if let Some(v) = &cli.output_host {
            self.output.host = v.clone();
        }
        if let Some(v) = cli.output_port {
            self.output.port = v;
        }
        if let Some(v) = cli.width {
            self.output.width = v;
        }
        if let Some(v) = cli.height {
            self.output.height = v;
        }
        if let Some(v) = cli.fps {
            self.output.fps = v;
        }
        if let Some(v) = cli.bitrate_kbps {
            self.output.bitrate_kbps = v;
        }
        if let Some(v) = cli.keyframe_interval {
            self.output.keyframe_interval = v;
        }
        if let Some(v) = &cli.output_codec {
            self.output.codec = *v;
        }
        if let Some(v) = &cli.output_container {
            self.output.container = *v;
        }
        if let Some(v) = &cli.shm_path {
            self.output.shm_path = v.clone();
        }
        if let Some(v) = cli.shm_size {
            self.output.shm_size = v;
        }
        if let Some(v) = &cli.output_file {
            self.output.file_path = Some(v.clone());
        }
        if let Some(v) = cli.stats_interval_s {
            self.stats_interval_s = v;
        }
        if cli.verbose {
            self.verbose = true;
        }
        if let Some(v) = cli.watchdog_timeout_ms {
            self.thresholds.watchdog_timeout_ms = v;
        }
        if let Some(v) = cli.resume_threshold_ms {
            self.thresholds.resume_threshold_ms = v;
        }
        if let Some(v) = cli.no_signal_timeout_ms {
            self.thresholds.no_signal_timeout_ms = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.port, 5000);
        assert_eq!(config.output.width, 640);
        assert_eq!(config.output.height, 480);
        assert_eq!(config.output.fps, 25);
        assert_eq!(config.output.codec, OutputCodec::H264);
        assert_eq!(config.output.container, OutputContainer::Rtp);
        assert_eq!(config.thresholds.watchdog_timeout_ms, 2000);
        assert_eq!(config.thresholds.resume_threshold_ms, 100);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
            [input]
            port = 6000

            [output]
            codec = "vp8"
            container = "shared-memory"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.input.port, 6000);
        assert_eq!(config.output.codec, OutputCodec::Vp8);
        assert_eq!(config.output.container, OutputContainer::SharedMemory);
        assert_eq!(config.output.width, 640);
    }

    #[test]
    fn test_codec_from_str_rejects_unknown() {
        assert!("av1".parse::<OutputCodec>().is_err());
        assert!("h264".parse::<OutputCodec>().is_ok());
    }
}
