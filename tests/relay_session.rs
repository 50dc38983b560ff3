//! Session lifecycle tests against the scripted engine.
//!
//! Covers startup ordering, termination on bus errors and EOS, drain thread
//! shutdown, and exactly-once teardown.

use std::time::{Duration, Instant};

use anyhow::Result;
use rtsp_relay::engine::{ScriptedEngine, ScriptedProbe};
use rtsp_relay::relay::{self, RelaySession};
use rtsp_relay::{
    BusEvent, PipelineGraph, PipelineState, RelayConfig, Termination, Topology, DRAIN_SINK_NAME,
};

fn state_change(old: PipelineState, new: PipelineState) -> BusEvent {
    BusEvent::StateChanged {
        old,
        new,
        from_pipeline: true,
    }
}

fn runtime_error() -> BusEvent {
    BusEvent::Error {
        source: Some("rtspsrc0".to_string()),
        message: "Could not read from resource.".to_string(),
        debug: Some("gstrtspsrc.c: connection refused".to_string()),
    }
}

fn null_transitions(probe: &ScriptedProbe) -> usize {
    probe
        .states()
        .iter()
        .filter(|state| **state == PipelineState::Null)
        .count()
}

fn wait_for(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn error_message_reaches_teardown_exactly_once() -> Result<()> {
    let engine = ScriptedEngine::new()
        .with_events([
            state_change(PipelineState::Null, PipelineState::Ready),
            state_change(PipelineState::Ready, PipelineState::Paused),
            runtime_error(),
            BusEvent::Eos,
        ])
        .with_frames(5, 153_600);
    let probe = engine.probe();

    let summary = relay::run(&RelayConfig::default(), &engine)?;

    assert_eq!(
        summary.termination,
        Termination::Error {
            source: Some("rtspsrc0".to_string()),
            message: "Could not read from resource.".to_string(),
        }
    );
    assert_eq!(probe.launches(), 1);
    assert_eq!(probe.released(), 1);
    assert_eq!(null_transitions(&probe), 1);
    assert_eq!(
        probe.states(),
        vec![
            PipelineState::Playing,
            PipelineState::Ready,
            PipelineState::Null
        ]
    );
    // the error may arrive before the drain thread has seen every queued frame
    let drain = summary.drain.expect("tee topology runs a drain thread");
    assert!(drain.frames <= 5);
    assert_eq!(drain.frames as usize, probe.pulled());
    assert_eq!(drain.bytes, drain.frames * 153_600);
    Ok(())
}

#[test]
fn eos_takes_the_same_teardown_path() -> Result<()> {
    let engine = ScriptedEngine::new().with_events([BusEvent::Eos]);
    let probe = engine.probe();

    let summary = relay::run(&RelayConfig::default(), &engine)?;

    assert_eq!(summary.termination, Termination::EndOfStream);
    assert_eq!(summary.drain.map(|d| d.frames), Some(0));
    assert_eq!(probe.released(), 1);
    assert_eq!(null_transitions(&probe), 1);
    Ok(())
}

#[test]
fn single_branch_run_has_no_drain() -> Result<()> {
    let engine = ScriptedEngine::new()
        .with_endpoints(&[])
        .with_events([BusEvent::Eos]);
    let probe = engine.probe();
    let config = RelayConfig {
        topology: Topology::Single,
        ..RelayConfig::default()
    };

    let summary = relay::run(&config, &engine)?;

    assert_eq!(summary.drain, None);
    assert_eq!(
        probe.states(),
        vec![PipelineState::Playing, PipelineState::Null]
    );
    assert!(!probe.descriptions()[0].contains("appsink"));
    Ok(())
}

#[test]
fn launched_description_matches_rendered_graph() -> Result<()> {
    let engine = ScriptedEngine::new().with_events([BusEvent::Eos]);
    let probe = engine.probe();
    let config = RelayConfig::default();

    relay::run(&config, &engine)?;

    let expected = PipelineGraph::from_config(&config, &rtsp_relay::stream_url(&config)).render();
    assert_eq!(probe.descriptions(), vec![expected]);
    Ok(())
}

#[test]
fn launch_failure_is_an_error_without_teardown() {
    let engine = ScriptedEngine::new().failing_launch("no element \"avdec_h264\"");
    let probe = engine.probe();

    let err = relay::run(&RelayConfig::default(), &engine).expect_err("launch fails");

    assert!(format!("{:#}", err).contains("failed to create pipeline"));
    assert!(format!("{:#}", err).contains("avdec_h264"));
    assert!(probe.states().is_empty());
    assert_eq!(probe.released(), 0);
}

#[test]
fn missing_drain_endpoint_releases_the_pipeline() {
    let engine = ScriptedEngine::new()
        .with_endpoints(&["mysink"])
        .with_events([BusEvent::Eos]);
    let probe = engine.probe();

    let err = relay::run(&RelayConfig::default(), &engine).expect_err("endpoint missing");

    assert!(err.to_string().contains(DRAIN_SINK_NAME));
    assert_eq!(probe.released(), 1);
    assert_eq!(null_transitions(&probe), 1);
    assert!(!probe.states().contains(&PipelineState::Playing));
}

#[test]
fn shutdown_unblocks_an_idle_drain_thread() -> Result<()> {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();

    let session = RelaySession::start(&engine, "scripted", Some(DRAIN_SINK_NAME))?;
    assert!(probe.push_frame(32));
    assert!(probe.push_frame(32));
    wait_for(|| probe.pulled() == 2);

    let started = Instant::now();
    let stats = session.shutdown()?.expect("drain stats");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.frames, 2);
    assert!(!probe.feed_open());
    assert_eq!(null_transitions(&probe), 1);
    Ok(())
}

#[test]
fn shutdown_signal_is_raised_on_teardown() -> Result<()> {
    let engine = ScriptedEngine::new().end_feed_after_frames().with_frames(1, 4);
    let session = RelaySession::start(&engine, "scripted", Some(DRAIN_SINK_NAME))?;
    let signal = session.shutdown_signal().clone();
    assert!(!signal.is_triggered());

    session.shutdown()?;

    assert!(signal.is_triggered());
    assert!(!signal.trigger());
    Ok(())
}

#[test]
fn dropping_a_session_tears_down_once() -> Result<()> {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();

    let mut session = RelaySession::start(&engine, "scripted", Some(DRAIN_SINK_NAME))?;
    assert_eq!(session.wait(), Termination::BusClosed);
    drop(session);

    assert_eq!(probe.released(), 1);
    assert_eq!(null_transitions(&probe), 1);
    Ok(())
}
