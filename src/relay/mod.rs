//! Relay session: startup, event wait, and teardown.
//!
//! Teardown order:
//! 1. raise the shutdown signal
//! 2. stop the pipeline (READY) so a blocked drain pull returns
//! 3. join the drain thread
//! 4. set the pipeline to NULL and release it
//!
//! Teardown runs at most once per session, either from [`RelaySession::shutdown`]
//! or from `Drop` when startup bails out part way.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::engine::{Engine, MessageBus, Pipeline, PipelineState};
use crate::pipeline::PipelineGraph;
use crate::stream_url::{redacted_stream_url, stream_url};

pub mod drain;
pub mod events;

pub use drain::{DrainHandle, DrainStats};
pub use events::{run_event_loop, Termination};

/// One-shot cancellation token shared with the drain thread.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns true only for the call that raised it.
    pub fn trigger(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A launched, playing pipeline plus its drain thread.
pub struct RelaySession {
    pipeline: Option<Box<dyn Pipeline>>,
    bus: Option<Box<dyn MessageBus>>,
    drain: Option<DrainHandle>,
    shutdown: ShutdownSignal,
}

impl RelaySession {
    /// Launch `description`, attach to `drain_endpoint` if given, and start playing.
    pub fn start(
        engine: &dyn Engine,
        description: &str,
        drain_endpoint: Option<&str>,
    ) -> Result<Self> {
        let pipeline = engine
            .launch(description)
            .context("failed to create pipeline")?;
        let mut session = Self {
            pipeline: Some(pipeline),
            bus: None,
            drain: None,
            shutdown: ShutdownSignal::new(),
        };

        session.begin(drain_endpoint)?;
        Ok(session)
    }

    fn begin(&mut self, drain_endpoint: Option<&str>) -> Result<()> {
        let pipeline = self
            .pipeline
            .as_deref()
            .context("pipeline already torn down")?;
        let source = drain_endpoint
            .map(|name| pipeline.frame_source(name))
            .transpose()?;
        self.bus = Some(pipeline.bus()?);
        pipeline
            .set_state(PipelineState::Playing)
            .context("failed to start pipeline")?;

        if let Some(source) = source {
            self.drain = Some(drain::spawn(source, self.shutdown.clone())?);
        }
        Ok(())
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Block until the bus reports a terminal condition.
    pub fn wait(&mut self) -> Termination {
        match self.bus.as_deref_mut() {
            Some(bus) => run_event_loop(bus),
            None => Termination::BusClosed,
        }
    }

    /// Tear the session down and report what the drain thread saw.
    pub fn shutdown(mut self) -> Result<Option<DrainStats>> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<Option<DrainStats>> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(None);
        };
        self.shutdown.trigger();

        let mut stats = Ok(None);
        if let Some(drain) = self.drain.take() {
            if let Err(err) = pipeline.set_state(PipelineState::Ready) {
                log::warn!("failed to stop pipeline before joining drain: {:#}", err);
            }
            stats = drain.join().map(Some);
        }

        let stopped = pipeline.set_state(PipelineState::Null);
        self.bus.take();
        drop(pipeline);

        stopped?;
        stats
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            log::error!("relay teardown failed: {:#}", err);
        }
    }
}

/// Outcome of a relay run that got as far as playing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub termination: Termination,
    pub drain: Option<DrainStats>,
}

/// Build the graph for `config`, run it on `engine` until error or EOS, and tear down.
///
/// Construction failures come back as `Err`. Runtime errors and EOS are both a
/// normal `Ok` return carrying the termination reason.
pub fn run(config: &RelayConfig, engine: &dyn Engine) -> Result<RunSummary> {
    let url = stream_url(config);
    log::info!(
        "relaying {} to {} {}:{}",
        redacted_stream_url(config),
        config.transport,
        config.out_ip,
        config.out_port
    );

    let graph = PipelineGraph::from_config(config, &url);
    let description = graph.render();
    println!("Pipeline:\n{}", description);

    let mut session = RelaySession::start(engine, &description, graph.drain_endpoint())?;
    let termination = session.wait();
    let drain = session.shutdown().unwrap_or_else(|err| {
        log::error!("relay teardown failed: {:#}", err);
        None
    });
    println!("Exiting cleanly.");

    Ok(RunSummary { termination, drain })
}
