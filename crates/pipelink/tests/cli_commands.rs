#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use pipelink_channel::{Channel, ChannelConfig};
use pipelink_transport::Endpoint;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pipelink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Retry until the listener child has bound its socket.
fn connect_with_retry(path: &Path, timeout: Duration) -> Channel<Bytes> {
    let config = ChannelConfig {
        endpoint: Endpoint::with_path(path),
        ..ChannelConfig::default()
    };
    let channel = Channel::with_config("cli-test", config);

    let start = Instant::now();
    loop {
        match channel.connect() {
            Ok(()) => return channel,
            Err(err) => {
                if start.elapsed() >= timeout {
                    panic!("connect timeout: {err}");
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

#[test]
fn listen_prints_received_messages_and_exits_at_count() {
    let dir = unique_temp_dir("listen");
    let sock = dir.join("manager.sock");

    let child = Command::new(env!("CARGO_BIN_EXE_pipelink"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg("--path")
        .arg(&sock)
        .arg("--count")
        .arg("2")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let channel = connect_with_retry(&sock, Duration::from_secs(3));
    channel
        .send(Bytes::from_static(b"first"))
        .expect("first send should queue");
    channel
        .send(Bytes::from_static(b"second"))
        .expect("second send should queue");

    let output = child
        .wait_with_output()
        .expect("listen should exit after count");
    channel.disconnect();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("first"), "stdout: {stdout}");
    assert!(stdout.contains("second"), "stdout: {stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_delivers_payload_to_listener() {
    let dir = unique_temp_dir("send");
    let sock = dir.join("manager.sock");

    let listener = Command::new(env!("CARGO_BIN_EXE_pipelink"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("raw")
        .arg("listen")
        .arg("--path")
        .arg(&sock)
        .arg("--count")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    // The listener binds asynchronously; retry send until it succeeds.
    let start = Instant::now();
    loop {
        let status = Command::new(env!("CARGO_BIN_EXE_pipelink"))
            .arg("--log-level")
            .arg("error")
            .arg("send")
            .arg("--path")
            .arg(&sock)
            .arg("--data")
            .arg("hello-manager")
            .status()
            .expect("send should run");
        if status.success() {
            break;
        }
        if start.elapsed() >= Duration::from_secs(3) {
            panic!("send never succeeded: {status}");
        }
        thread::sleep(Duration::from_millis(25));
    }

    let output = listener
        .wait_with_output()
        .expect("listen should exit after one message");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello-manager"), "stdout: {stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_fails_fast_when_manager_absent() {
    let dir = unique_temp_dir("absent");
    let sock = dir.join("missing.sock");

    let output = Command::new(env!("CARGO_BIN_EXE_pipelink"))
        .arg("send")
        .arg("--path")
        .arg(&sock)
        .arg("--data")
        .arg("nobody-home")
        .output()
        .expect("send should run");

    assert!(!output.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn endpoint_reports_platform_transport() {
    let output = Command::new(env!("CARGO_BIN_EXE_pipelink"))
        .arg("--format")
        .arg("json")
        .arg("endpoint")
        .output()
        .expect("endpoint should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("endpoint should emit json");
    assert_eq!(
        payload.get("transport").and_then(|v| v.as_str()),
        Some("unix-domain-socket")
    );
    assert!(payload
        .get("path")
        .and_then(|v| v.as_str())
        .is_some_and(|p| p.ends_with("minecraft_manager")));
}

#[test]
fn doctor_passes_on_clean_env() {
    let output = Command::new(env!("CARGO_BIN_EXE_pipelink"))
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .output()
        .expect("doctor should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("doctor should emit json");
    assert_eq!(
        payload.get("overall").and_then(|v| v.as_str()),
        Some("pass")
    );
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_pipelink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
