//! Scripted engine.
//!
//! Replays a fixed list of bus messages and feeds frames through an in-process
//! channel. Stopping the pipeline (any transition to READY or NULL) closes the
//! frame channel, which unblocks a pending pull the same way a flushing appsink
//! does. A [`ScriptedProbe`] records what the relay did to the pipeline.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::{BusEvent, Engine, Frame, FrameSource, MessageBus, Pipeline, PipelineState};
use crate::pipeline::DRAIN_SINK_NAME;

#[derive(Clone, Debug)]
pub struct ScriptedEngine {
    events: Vec<BusEvent>,
    frames: Vec<Frame>,
    launch_error: Option<String>,
    endpoints: Vec<String>,
    keep_feed_open: bool,
    probe: ScriptedProbe,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            frames: Vec::new(),
            launch_error: None,
            endpoints: vec![DRAIN_SINK_NAME.to_string()],
            keep_feed_open: true,
            probe: ScriptedProbe::default(),
        }
    }

    /// Bus messages delivered in order. The bus reports closed after the last one.
    pub fn with_events(mut self, events: impl IntoIterator<Item = BusEvent>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    /// Frames queued on the application endpoint at launch.
    pub fn with_frames(mut self, count: usize, bytes: usize) -> Self {
        self.frames = vec![Frame { bytes }; count];
        self
    }

    /// Make `launch` fail with `message`.
    pub fn failing_launch(mut self, message: &str) -> Self {
        self.launch_error = Some(message.to_string());
        self
    }

    /// Named endpoints that exist in launched pipelines.
    pub fn with_endpoints(mut self, names: &[&str]) -> Self {
        self.endpoints = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Close the frame feed right after the queued frames, like a stream that
    /// reached end-of-stream on its own.
    pub fn end_feed_after_frames(mut self) -> Self {
        self.keep_feed_open = false;
        self
    }

    pub fn probe(&self) -> ScriptedProbe {
        self.probe.clone()
    }
}

impl Engine for ScriptedEngine {
    fn launch(&self, description: &str) -> Result<Box<dyn Pipeline>> {
        self.probe.inner.launches.fetch_add(1, Ordering::SeqCst);
        lock(&self.probe.inner.descriptions).push(description.to_string());
        if let Some(message) = &self.launch_error {
            return Err(anyhow!("{}", message));
        }

        let (tx, rx) = mpsc::channel();
        for frame in &self.frames {
            tx.send(*frame)
                .map_err(|_| anyhow!("scripted frame feed closed"))?;
        }
        *lock(&self.probe.inner.feed) = if self.keep_feed_open { Some(tx) } else { None };

        Ok(Box::new(ScriptedPipeline {
            events: Mutex::new(Some(self.events.iter().cloned().collect())),
            frames: Mutex::new(Some(rx)),
            endpoints: self.endpoints.clone(),
            probe: self.probe.clone(),
        }))
    }
}

struct ScriptedPipeline {
    events: Mutex<Option<VecDeque<BusEvent>>>,
    frames: Mutex<Option<Receiver<Frame>>>,
    endpoints: Vec<String>,
    probe: ScriptedProbe,
}

impl Pipeline for ScriptedPipeline {
    fn set_state(&self, state: PipelineState) -> Result<()> {
        lock(&self.probe.inner.states).push(state);
        if matches!(state, PipelineState::Ready | PipelineState::Null) {
            lock(&self.probe.inner.feed).take();
        }
        Ok(())
    }

    fn bus(&self) -> Result<Box<dyn MessageBus>> {
        let events = lock(&self.events)
            .take()
            .ok_or_else(|| anyhow!("scripted bus already taken"))?;
        Ok(Box::new(ScriptedBus { events }))
    }

    fn frame_source(&self, name: &str) -> Result<Box<dyn FrameSource>> {
        if !self.endpoints.iter().any(|endpoint| endpoint == name) {
            return Err(anyhow!("no element named '{}' in pipeline", name));
        }
        let rx = lock(&self.frames)
            .take()
            .ok_or_else(|| anyhow!("endpoint '{}' already taken", name))?;
        Ok(Box::new(ScriptedFrameSource {
            rx,
            probe: self.probe.clone(),
        }))
    }
}

impl Drop for ScriptedPipeline {
    fn drop(&mut self) {
        self.probe.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedBus {
    events: VecDeque<BusEvent>,
}

impl MessageBus for ScriptedBus {
    fn next_event(&mut self) -> Option<BusEvent> {
        self.events.pop_front()
    }
}

struct ScriptedFrameSource {
    rx: Receiver<Frame>,
    probe: ScriptedProbe,
}

impl FrameSource for ScriptedFrameSource {
    fn pull(&mut self) -> Option<Frame> {
        let frame = self.rx.recv().ok();
        if frame.is_some() {
            self.probe.inner.pulled.fetch_add(1, Ordering::SeqCst);
        }
        frame
    }
}

/// Shared view of what happened to scripted pipelines.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Debug, Default)]
struct ProbeInner {
    launches: AtomicUsize,
    released: AtomicUsize,
    pulled: AtomicUsize,
    descriptions: Mutex<Vec<String>>,
    states: Mutex<Vec<PipelineState>>,
    feed: Mutex<Option<Sender<Frame>>>,
}

impl ScriptedProbe {
    pub fn launches(&self) -> usize {
        self.inner.launches.load(Ordering::SeqCst)
    }

    /// Number of pipeline instances dropped.
    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Frames handed out by the application endpoint.
    pub fn pulled(&self) -> usize {
        self.inner.pulled.load(Ordering::SeqCst)
    }

    pub fn descriptions(&self) -> Vec<String> {
        lock(&self.inner.descriptions).clone()
    }

    /// Every state transition requested, in order.
    pub fn states(&self) -> Vec<PipelineState> {
        lock(&self.inner.states).clone()
    }

    /// Push one more frame into the live feed. False once the feed is closed.
    pub fn push_frame(&self, bytes: usize) -> bool {
        match lock(&self.inner.feed).as_ref() {
            Some(tx) => tx.send(Frame { bytes }).is_ok(),
            None => false,
        }
    }

    pub fn feed_open(&self) -> bool {
        lock(&self.inner.feed).is_some()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
