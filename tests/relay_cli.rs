use std::process::Command;

use tempfile::NamedTempFile;

use rtsp_relay::cli::{parse_from, Invocation};
use rtsp_relay::{Topology, Transport};

fn relay_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rtsp_relay"));
    for key in [
        "RELAY_CAM_IP",
        "RELAY_CAM_PORT",
        "RELAY_USERNAME",
        "RELAY_PASSWORD",
        "RELAY_RTSP_PATH",
        "RELAY_OUT_IP",
        "RELAY_OUT_PORT",
        "RELAY_UDP",
        "RELAY_CONFIG",
        "RELAY_FORMAT",
        "RELAY_WIDTH",
        "RELAY_HEIGHT",
        "RELAY_LATENCY",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn unknown_flag_prints_usage_and_exits_one() {
    let output = relay_bin().arg("--bogus").output().expect("run binary");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--bogus"));
    assert!(stderr.contains("Usage"));
    assert!(stderr.contains("--cam-ip"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Pipeline"));
}

#[test]
fn help_exits_zero() {
    let output = relay_bin().arg("--help").output().expect("run binary");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--rtsp-path"));
    assert!(stdout.contains("--udp"));
}

#[test]
fn missing_value_exits_one() {
    let output = relay_bin().arg("--out-port").output().expect("run binary");
    assert_eq!(output.status.code(), Some(1));
}

#[cfg(not(feature = "rtsp-gstreamer"))]
#[test]
fn build_without_gstreamer_refuses_to_run() {
    let output = relay_bin().output().expect("run binary");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rtsp-gstreamer"));
}

#[test]
fn config_file_is_layered_under_flags() {
    let file = NamedTempFile::new().expect("temp config");
    std::fs::write(
        file.path(),
        r#"{
            "camera": { "ip": "10.9.9.9", "port": 8554, "path": "live" },
            "output": { "ip": "0.0.0.0", "udp": true },
            "drain": false
        }"#,
    )
    .expect("write config");
    let path = file.path().to_str().expect("utf-8 path");

    let Invocation::Run(cfg) = parse_from(["rtsp_relay", "--config", path, "--cam-port", "9554"])
    else {
        panic!("expected a run");
    };

    assert_eq!(cfg.cam_ip, "10.9.9.9");
    assert_eq!(cfg.cam_port, 9554);
    assert_eq!(cfg.rtsp_path, "live");
    assert_eq!(cfg.out_ip, "0.0.0.0");
    assert_eq!(cfg.transport, Transport::Udp);
    assert_eq!(cfg.topology, Topology::Single);
}

#[test]
fn unreadable_config_file_exits_one() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("relay.json");
    let invocation = parse_from([
        "rtsp_relay".to_string(),
        "--config".to_string(),
        missing.display().to_string(),
    ]);
    assert_eq!(invocation, Invocation::Exit(1));
}
