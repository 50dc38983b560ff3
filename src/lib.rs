//! RTSP camera relay.
//!
//! Pulls one H.264 RTSP stream from an IP camera, decodes and scales it through
//! GStreamer, and ships the raw frames to a local TCP server sink or UDP sink.
//! An optional tee branch ends in an application sink that a dedicated thread
//! keeps drained.
//!
//! # Module Structure
//!
//! - `cli`: argument parsing and the binary entry point
//! - `config`: the resolved relay configuration and its JSON file layer
//! - `stream_url`: credential encoding and RTSP address construction
//! - `pipeline`: typed graph of stages rendered to launch syntax
//! - `engine`: the pipeline engine seam (GStreamer, scripted)
//! - `relay`: session lifecycle, drain loop, and bus event loop

pub mod cli;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod relay;
pub mod stream_url;

pub use config::{RelayConfig, Topology, Transport, VideoSettings};
pub use engine::{BusEvent, Engine, Frame, FrameSource, MessageBus, Pipeline, PipelineState};
pub use pipeline::{Caps, Element, PipelineGraph, Stage, DRAIN_SINK_NAME};
pub use relay::{RelaySession, RunSummary, ShutdownSignal, Termination};
pub use stream_url::{percent_encode, stream_url};
