//! Bus event loop.

use crate::engine::{BusEvent, MessageBus};

/// Why the event loop stopped waiting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Error {
        source: Option<String>,
        message: String,
    },
    EndOfStream,
    /// The engine stopped delivering messages without an error or EOS.
    BusClosed,
}

/// Block on `bus` until an error, end-of-stream, or a closed bus.
///
/// Top-level pipeline state changes are reported on stdout; element state
/// changes and every other message kind are ignored.
pub fn run_event_loop(bus: &mut dyn MessageBus) -> Termination {
    loop {
        let Some(event) = bus.next_event() else {
            log::warn!("pipeline bus closed");
            return Termination::BusClosed;
        };
        if let Some(termination) = handle_event(event) {
            return termination;
        }
    }
}

fn handle_event(event: BusEvent) -> Option<Termination> {
    match event {
        BusEvent::Error {
            source,
            message,
            debug,
        } => {
            eprintln!("[Error] {}", message);
            log::debug!(
                "error from {}: {}",
                source.as_deref().unwrap_or("<unknown>"),
                debug.as_deref().unwrap_or("no debug info")
            );
            Some(Termination::Error { source, message })
        }
        BusEvent::Eos => {
            println!("[EOS] End of Stream");
            Some(Termination::EndOfStream)
        }
        BusEvent::StateChanged {
            old,
            new,
            from_pipeline: true,
        } => {
            println!("Pipeline state changed from {} to {}", old, new);
            None
        }
        BusEvent::StateChanged { .. } | BusEvent::Other => None,
    }
}
