// ----------------------------------------------------------------------------
// GStreamer backend
// ----------------------------------------------------------------------------

use anyhow::{anyhow, Context, Result};
use gstreamer::prelude::*;

use super::{BusEvent, Engine, Frame, FrameSource, MessageBus, Pipeline, PipelineState};

pub struct GstEngine {
    _private: (),
}

impl GstEngine {
    pub fn new() -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;
        Ok(Self { _private: () })
    }
}

impl Engine for GstEngine {
    fn launch(&self, description: &str) -> Result<Box<dyn Pipeline>> {
        let pipeline = gstreamer::parse::launch(description)
            .context("parse pipeline description")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("launched description is not a Pipeline"))?;
        Ok(Box::new(GstPipeline { pipeline }))
    }
}

struct GstPipeline {
    pipeline: gstreamer::Pipeline,
}

impl Pipeline for GstPipeline {
    fn set_state(&self, state: PipelineState) -> Result<()> {
        self.pipeline
            .set_state(to_gst_state(state))
            .with_context(|| format!("set pipeline to {}", state))?;
        Ok(())
    }

    fn bus(&self) -> Result<Box<dyn MessageBus>> {
        let bus = self.pipeline.bus().context("pipeline has no bus")?;
        Ok(Box::new(GstBus {
            bus,
            pipeline: self.pipeline.clone().upcast::<gstreamer::Object>(),
        }))
    }

    fn frame_source(&self, name: &str) -> Result<Box<dyn FrameSource>> {
        let appsink = self
            .pipeline
            .by_name(name)
            .with_context(|| format!("could not find element named '{}' in the pipeline", name))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("element '{}' is not an appsink", name))?;
        Ok(Box::new(AppSinkSource { appsink }))
    }
}

struct GstBus {
    bus: gstreamer::Bus,
    pipeline: gstreamer::Object,
}

impl MessageBus for GstBus {
    fn next_event(&mut self) -> Option<BusEvent> {
        let message = self.bus.timed_pop_filtered(
            gstreamer::ClockTime::NONE,
            &[
                gstreamer::MessageType::Error,
                gstreamer::MessageType::Eos,
                gstreamer::MessageType::StateChanged,
            ],
        )?;

        use gstreamer::MessageView;
        let event = match message.view() {
            MessageView::Error(err) => BusEvent::Error {
                source: err.src().map(|s| s.path_string().to_string()),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
            MessageView::Eos(..) => BusEvent::Eos,
            MessageView::StateChanged(changed) => BusEvent::StateChanged {
                old: from_gst_state(changed.old()),
                new: from_gst_state(changed.current()),
                from_pipeline: changed.src() == Some(&self.pipeline),
            },
            _ => BusEvent::Other,
        };
        Some(event)
    }
}

struct AppSinkSource {
    appsink: gstreamer_app::AppSink,
}

impl FrameSource for AppSinkSource {
    fn pull(&mut self) -> Option<Frame> {
        // Err covers EOS and flushing; the sample is released on return.
        let sample = self.appsink.pull_sample().ok()?;
        let bytes = sample.buffer().map(|buffer| buffer.size()).unwrap_or(0);
        Some(Frame { bytes })
    }
}

fn to_gst_state(state: PipelineState) -> gstreamer::State {
    match state {
        PipelineState::VoidPending => gstreamer::State::VoidPending,
        PipelineState::Null => gstreamer::State::Null,
        PipelineState::Ready => gstreamer::State::Ready,
        PipelineState::Paused => gstreamer::State::Paused,
        PipelineState::Playing => gstreamer::State::Playing,
    }
}

fn from_gst_state(state: gstreamer::State) -> PipelineState {
    match state {
        gstreamer::State::Null => PipelineState::Null,
        gstreamer::State::Ready => PipelineState::Ready,
        gstreamer::State::Paused => PipelineState::Paused,
        gstreamer::State::Playing => PipelineState::Playing,
        _ => PipelineState::VoidPending,
    }
}
