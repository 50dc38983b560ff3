//! Command-line front end for the relay binary.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{RelayConfig, Topology, Transport};
use crate::engine;
use crate::relay::{self, Termination};

#[derive(Parser, Debug)]
#[command(
    name = "rtsp_relay",
    version,
    about = "Relay an IP camera RTSP stream to a local TCP server or UDP sink"
)]
pub struct Args {
    /// Camera IP address (default: 192.168.0.10)
    #[arg(long, env = "RELAY_CAM_IP", value_name = "IP", allow_hyphen_values = true)]
    cam_ip: Option<String>,

    /// Camera RTSP port, 0-65535 (default: 554)
    #[arg(long, env = "RELAY_CAM_PORT", value_name = "PORT")]
    cam_port: Option<u16>,

    /// RTSP username (default: admin)
    #[arg(long, env = "RELAY_USERNAME", value_name = "USER", allow_hyphen_values = true)]
    username: Option<String>,

    /// RTSP password (default: password)
    #[arg(
        long,
        env = "RELAY_PASSWORD",
        value_name = "PASS",
        hide_env_values = true,
        allow_hyphen_values = true
    )]
    password: Option<String>,

    /// RTSP stream path (default: h264Preview_01_sub)
    #[arg(long, env = "RELAY_RTSP_PATH", value_name = "PATH", allow_hyphen_values = true)]
    rtsp_path: Option<String>,

    /// Output host IP (default: 127.0.0.1)
    #[arg(long, env = "RELAY_OUT_IP", value_name = "IP", allow_hyphen_values = true)]
    out_ip: Option<String>,

    /// Output port, 0-65535 (default: 23445)
    #[arg(long, env = "RELAY_OUT_PORT", value_name = "PORT")]
    out_port: Option<u16>,

    /// Use UDP instead of a TCP server sink
    #[arg(long, env = "RELAY_UDP")]
    udp: bool,

    /// JSON config file; flags and environment override its values
    #[arg(long, env = "RELAY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Raw video format after conversion (default: RGB16)
    #[arg(long, env = "RELAY_FORMAT", value_name = "FORMAT")]
    format: Option<String>,

    /// Scaled frame width (default: 320)
    #[arg(long, env = "RELAY_WIDTH", value_name = "PX")]
    width: Option<u32>,

    /// Scaled frame height (default: 240)
    #[arg(long, env = "RELAY_HEIGHT", value_name = "PX")]
    height: Option<u32>,

    /// RTSP source jitter buffer latency in milliseconds (default: 0)
    #[arg(long, env = "RELAY_LATENCY", value_name = "MS")]
    latency: Option<u32>,

    /// Send frames straight to the network sink, without the drained tee branch
    #[arg(long)]
    no_drain: bool,
}

impl Args {
    /// Resolve against the config file (if any) and the built-in defaults.
    pub fn into_config(self) -> Result<RelayConfig> {
        let mut cfg = match self.config.as_deref() {
            Some(path) => RelayConfig::load_file(path)?,
            None => RelayConfig::default(),
        };
        if let Some(cam_ip) = self.cam_ip {
            cfg.cam_ip = cam_ip;
        }
        if let Some(cam_port) = self.cam_port {
            cfg.cam_port = cam_port;
        }
        if let Some(username) = self.username {
            cfg.username = username;
        }
        if let Some(password) = self.password {
            cfg.password = password;
        }
        if let Some(rtsp_path) = self.rtsp_path {
            cfg.rtsp_path = rtsp_path;
        }
        if let Some(out_ip) = self.out_ip {
            cfg.out_ip = out_ip;
        }
        if let Some(out_port) = self.out_port {
            cfg.out_port = out_port;
        }
        if self.udp {
            cfg.transport = Transport::Udp;
        }
        if let Some(format) = self.format {
            cfg.video.format = format;
        }
        if let Some(width) = self.width {
            cfg.video.width = width;
        }
        if let Some(height) = self.height {
            cfg.video.height = height;
        }
        if let Some(latency) = self.latency {
            cfg.latency_ms = latency;
        }
        if self.no_drain {
            cfg.topology = Topology::Single;
        }
        Ok(cfg)
    }
}

/// What the process should do after looking at its arguments.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(RelayConfig),
    Exit(i32),
}

/// Parse `args` (including the program name). Usage and diagnostics are
/// printed here; the caller only acts on the returned [`Invocation`].
pub fn parse_from<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = err.print();
                    Invocation::Exit(0)
                }
                _ => {
                    let _ = err.print();
                    eprintln!();
                    eprintln!("{}", Args::command().render_help());
                    Invocation::Exit(1)
                }
            };
        }
    };

    match args.into_config() {
        Ok(cfg) => Invocation::Run(cfg),
        Err(err) => {
            eprintln!("error: {:#}", err);
            eprintln!();
            eprintln!("{}", Args::command().render_help());
            Invocation::Exit(1)
        }
    }
}

/// Run the relay with process arguments and return the exit code.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = match parse_from(args) {
        Invocation::Run(config) => config,
        Invocation::Exit(code) => return code,
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = match engine::default_engine() {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{:#}", err);
            return 1;
        }
    };

    match relay::run(&config, engine.as_ref()) {
        Ok(summary) => {
            match &summary.termination {
                Termination::Error { source, .. } => log::info!(
                    "stopped after pipeline error from {}",
                    source.as_deref().unwrap_or("<unknown>")
                ),
                Termination::EndOfStream => log::info!("stopped at end of stream"),
                Termination::BusClosed => log::info!("stopped after bus closed"),
            }
            0
        }
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    }
}
