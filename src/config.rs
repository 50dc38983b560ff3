use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const DEFAULT_CAM_IP: &str = "192.168.0.10";
pub const DEFAULT_CAM_PORT: u16 = 554;
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_RTSP_PATH: &str = "h264Preview_01_sub";
pub const DEFAULT_OUT_IP: &str = "127.0.0.1";
pub const DEFAULT_OUT_PORT: u16 = 23445;
pub const DEFAULT_FORMAT: &str = "RGB16";
pub const DEFAULT_WIDTH: u32 = 320;
pub const DEFAULT_HEIGHT: u32 = 240;
pub const DEFAULT_LATENCY_MS: u32 = 0;

/// Network sink used for the relayed stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Transport {
    /// Connection-oriented server sink (clients connect to `out_ip:out_port`).
    #[default]
    Tcp,
    /// Connectionless datagram sink sending to `out_ip:out_port`.
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => f.write_str("tcp"),
            Transport::Udp => f.write_str("udp"),
        }
    }
}

/// Shape of the processing graph after the scaler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Topology {
    /// Scaled frames go straight to the network sink.
    Single,
    /// Scaled frames are teed to the network sink and an application endpoint
    /// that a drain thread keeps empty.
    #[default]
    Tee,
}

/// Everything the relay needs to know, resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub cam_ip: String,
    pub cam_port: u16,
    pub username: String,
    pub password: String,
    pub rtsp_path: String,
    pub out_ip: String,
    pub out_port: u16,
    pub transport: Transport,
    pub video: VideoSettings,
    pub latency_ms: u32,
    pub topology: Topology,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSettings {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cam_ip: DEFAULT_CAM_IP.to_string(),
            cam_port: DEFAULT_CAM_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            rtsp_path: DEFAULT_RTSP_PATH.to_string(),
            out_ip: DEFAULT_OUT_IP.to_string(),
            out_port: DEFAULT_OUT_PORT,
            transport: Transport::default(),
            video: VideoSettings::default(),
            latency_ms: DEFAULT_LATENCY_MS,
            topology: Topology::default(),
        }
    }
}

/// On-disk overrides. Every field is optional; absent fields keep the defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RelayConfigFile {
    pub camera: Option<CameraConfigFile>,
    pub output: Option<OutputConfigFile>,
    pub video: Option<VideoConfigFile>,
    pub drain: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CameraConfigFile {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub path: Option<String>,
    pub latency_ms: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfigFile {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub udp: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct VideoConfigFile {
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RelayConfig {
    /// Defaults with the file's values layered on top.
    pub fn from_file(file: RelayConfigFile) -> Self {
        let mut cfg = Self::default();
        if let Some(camera) = file.camera {
            if let Some(ip) = camera.ip {
                cfg.cam_ip = ip;
            }
            if let Some(port) = camera.port {
                cfg.cam_port = port;
            }
            if let Some(username) = camera.username {
                cfg.username = username;
            }
            if let Some(password) = camera.password {
                cfg.password = password;
            }
            if let Some(path) = camera.path {
                cfg.rtsp_path = path;
            }
            if let Some(latency_ms) = camera.latency_ms {
                cfg.latency_ms = latency_ms;
            }
        }
        if let Some(output) = file.output {
            if let Some(ip) = output.ip {
                cfg.out_ip = ip;
            }
            if let Some(port) = output.port {
                cfg.out_port = port;
            }
            if output.udp == Some(true) {
                cfg.transport = Transport::Udp;
            }
        }
        if let Some(video) = file.video {
            if let Some(format) = video.format {
                cfg.video.format = format;
            }
            if let Some(width) = video.width {
                cfg.video.width = width;
            }
            if let Some(height) = video.height {
                cfg.video.height = height;
            }
        }
        if file.drain == Some(false) {
            cfg.topology = Topology::Single;
        }
        cfg
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        Ok(Self::from_file(read_config_file(path)?))
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
