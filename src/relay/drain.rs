//! Drain loop for the passive tee branch.
//!
//! The thread's only blocking point is `FrameSource::pull`. The shutdown signal
//! is checked each time a pull returns, so a stop takes effect within one frame
//! interval, or immediately once the engine flushes the endpoint.

use anyhow::{anyhow, Context, Result};
use std::thread::JoinHandle;

use super::ShutdownSignal;
use crate::engine::FrameSource;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub frames: u64,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct DrainHandle {
    join: JoinHandle<DrainStats>,
}

impl DrainHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn join(self) -> Result<DrainStats> {
        self.join
            .join()
            .map_err(|_| anyhow!("drain thread panicked"))
    }
}

/// Start the drain thread. It owns `source` until it exits.
pub fn spawn(mut source: Box<dyn FrameSource>, shutdown: ShutdownSignal) -> Result<DrainHandle> {
    let join = std::thread::Builder::new()
        .name("drain".to_string())
        .spawn(move || drain(source.as_mut(), &shutdown))
        .context("spawn drain thread")?;
    Ok(DrainHandle { join })
}

/// Pull and discard frames until the source ends or shutdown is signalled.
pub fn drain(source: &mut dyn FrameSource, shutdown: &ShutdownSignal) -> DrainStats {
    let mut stats = DrainStats::default();
    while !shutdown.is_triggered() {
        let Some(frame) = source.pull() else {
            break;
        };
        stats.frames += 1;
        stats.bytes += frame.bytes as u64;
    }
    log::info!(
        "drain: exiting after {} frames ({} bytes)",
        stats.frames,
        stats.bytes
    );
    stats
}
