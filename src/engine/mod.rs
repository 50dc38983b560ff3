//! Pipeline engine seam.
//!
//! The relay never touches media itself. It hands a launch description to an
//! [`Engine`], drives the resulting [`Pipeline`] through its states, watches its
//! [`MessageBus`], and keeps the application endpoint drained through a
//! [`FrameSource`].
//!
//! Backends:
//! - GStreamer (feature: rtsp-gstreamer)
//! - Scripted (in-process replay of bus messages and frames, for tests)

use anyhow::Result;
use std::fmt;

#[cfg(feature = "rtsp-gstreamer")]
pub mod gst;
pub mod scripted;

#[cfg(feature = "rtsp-gstreamer")]
pub use gst::GstEngine;
pub use scripted::{ScriptedEngine, ScriptedProbe};

/// Element states as the engine reports them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    VoidPending,
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::VoidPending => "VOID_PENDING",
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}

/// A bus message, reduced to what the relay reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    StateChanged {
        old: PipelineState,
        new: PipelineState,
        /// True when the message was posted by the top-level pipeline rather
        /// than one of its elements.
        from_pipeline: bool,
    },
    Error {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    Eos,
    Other,
}

/// A frame pulled from the application endpoint. Only its size is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub bytes: usize,
}

/// Parses launch descriptions into running pipelines.
pub trait Engine {
    fn launch(&self, description: &str) -> Result<Box<dyn Pipeline>>;
}

/// A launched pipeline instance.
pub trait Pipeline {
    fn set_state(&self, state: PipelineState) -> Result<()>;

    fn bus(&self) -> Result<Box<dyn MessageBus>>;

    /// Look up the named application endpoint.
    fn frame_source(&self, name: &str) -> Result<Box<dyn FrameSource>>;
}

pub trait MessageBus {
    /// Block until the next message of interest. `None` means the bus is gone.
    fn next_event(&mut self) -> Option<BusEvent>;
}

pub trait FrameSource: Send {
    /// Block until the next frame. `None` on end-of-stream, error, or flush.
    fn pull(&mut self) -> Option<Frame>;
}

/// The engine compiled into this build.
pub fn default_engine() -> Result<Box<dyn Engine>> {
    #[cfg(feature = "rtsp-gstreamer")]
    {
        Ok(Box::new(GstEngine::new()?))
    }
    #[cfg(not(feature = "rtsp-gstreamer"))]
    {
        anyhow::bail!("relaying requires the rtsp-gstreamer feature")
    }
}
