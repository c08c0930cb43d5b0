//! Command-line behaviour of the daemon binary.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[device]
port = "/dev/ledwatch-test-missing"
led_count = 4

[monitor]
interval = "30s"
startup_effect = "0s"

[[services]]
name = "router"
method = "ping"
host = "192.168.1.1"

[[services]]
name = "search"
method = "http"
url = "https://www.example.com"

[[services]]
name = "spare"
method = "placeholder"
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn ledwatchd(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ledwatchd"))
        .args(args)
        .env_remove("LEDWATCH_CONFIG")
        .env("RUST_LOG", "error")
        .output()
        .unwrap()
}

#[test]
fn check_config_prints_layout() {
    let config = write_config(CONFIG);
    let out = ledwatchd(&["check-config", "--config", config.path().to_str().unwrap()]);

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("3 services on 4 LEDs"));
    assert!(stdout.contains("router"));
    assert!(stdout.contains("placeholder"));
    assert!(stdout.contains("(1 LEDs unused)"));
}

#[test]
fn check_config_reads_path_from_env() {
    let config = write_config(CONFIG);
    let out = Command::new(env!("CARGO_BIN_EXE_ledwatchd"))
        .arg("check-config")
        .env("LEDWATCH_CONFIG", config.path())
        .output()
        .unwrap();
    assert!(out.status.success());
}

#[test]
fn check_config_rejects_duplicate_names() {
    let config = write_config(&CONFIG.replace("name = \"search\"", "name = \"router\""));
    let out = ledwatchd(&["check-config", "--config", config.path().to_str().unwrap()]);

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("router"));
}

#[test]
fn missing_config_exits_nonzero() {
    let out = ledwatchd(&["check-config", "--config", "/nonexistent/ledwatch.toml"]);
    assert!(!out.status.success());
}

#[test]
fn run_without_device_exits_nonzero() {
    let config = write_config(CONFIG);
    let out = ledwatchd(&["run", "--config", config.path().to_str().unwrap()]);

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("device open failed"));
}
