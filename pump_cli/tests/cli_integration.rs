use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[pump]
max_speed = 450.0
accel_per_sec = 50.0
halt_per_sec = 200.0

[motors]
local_count = 1

[control]
tick_ms = 10

{extra}
"#
    );
    let path = dir.path().join("pump.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn pump(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("pump").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("error");
    cmd
}

#[rstest]
#[case::flow(&["simulate", "--flow", "6", "--seconds", "2"], 0, "motor 0: flow")]
#[case::dose_finishes(&["simulate", "--dose", "5", "--seconds", "20"], 0, "motor 0: stopped")]
#[case::remote_motor(&["simulate", "--motor", "1", "--peer-motors", "2", "--flow", "3", "--seconds", "1"], 0, "motor 1: flow")]
#[case::discover(&["discover"], 0, "peer at 0x20 with 4 motor(s)")]
#[case::self_check(&["self-check"], 0, "self-check ok")]
fn successful_commands(#[case] args: &[&str], #[case] code: i32, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    pump(&cfg)
        .args(args)
        .assert()
        .code(code)
        .stdout(predicate::str::contains(needle));
}

#[rstest]
#[case::zero_volume(&["simulate", "--dose", "0"], 1, "Dose volume is zero")]
#[case::unknown_motor(&["simulate", "--motor", "5", "--flow", "1"], 1, "Motor 5 does not exist")]
#[case::bad_usage(&["simulate", "--flow", "1", "--dose", "2"], 2, "cannot be used with")]
fn failing_commands(#[case] args: &[&str], #[case] code: i32, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    pump(&cfg)
        .args(args)
        .assert()
        .code(code)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("pump")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:").and(predicate::str::contains("serve")));
}

#[test]
fn discovery_without_peer_exits_with_link_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[subordinate]\naddress = 0x40\n");
    pump(&cfg)
        .arg("discover")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No subordinate answered"));
}

#[test]
fn json_errors_carry_reason_and_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[subordinate]\naddress = 0x40\n");
    let out = pump(&cfg).arg("--json").arg("discover").output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("json error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "NoPeer");
    assert_eq!(v["exit_code"], 3);
}

#[test]
fn json_simulation_reports_motor_state() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let out = pump(&cfg)
        .args(["--json", "simulate", "--dose", "4", "--seconds", "20"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let motor = &v["motors"][0];
    assert_eq!(motor["status"], "stopped");
    assert!(motor["dosing_remaining_ml"].as_f64().unwrap() < 0.1);
    assert!(motor["total_volume_l"].as_f64().unwrap() > 0.0035);
}

#[rstest]
#[case::invalid_value("[pump]\nmax_speed = -1.0\n")]
#[case::bad_rotation("[logging]\nrotation = \"weekly\"\n")]
#[case::parse_error("[pump\n")]
fn bad_config_exits_with_config_code(#[case] toml: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();
    pump(&path)
        .arg("self-check")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn missing_config_file_exits_with_config_code() {
    let dir = tempdir().unwrap();
    pump(&dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(4);
}

#[test]
fn serve_answers_framed_requests_on_stdout() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[subordinate]\nmotor_count = 2\n");
    // [len=2][hello, xor], then a frame with a bad checksum.
    let input = [2u8, 0x01, 0x01, 3, 0x23, 0x00, 0x00];
    let out = assert_cmd::Command::from_std(pump(&cfg))
        .arg("serve")
        .write_stdin(input.to_vec())
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout.len(), 7);
    assert_eq!(&out.stdout[..3], &[6, 0x50, 0x58]);
    // Motor count in the hello record.
    assert_eq!(out.stdout[4], 2);
}

#[test]
fn file_logging_writes_json_lines() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("pump.log");
    let extra = format!(
        "[logging]\nfile = \"{}\"\nlevel = \"info\"\n",
        log.display().to_string().replace('\\', "/")
    );
    let cfg = write_config(&dir, &extra);
    pump(&cfg)
        .args(["simulate", "--dose", "2", "--seconds", "10"])
        .assert()
        .success();
    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("dose start"));
}
