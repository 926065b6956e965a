use pump_config::{Config, load_file, load_toml};
use rstest::rstest;
use std::io::Write;

#[test]
fn empty_document_yields_firmware_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults validate");
    assert_eq!(cfg.pump.max_speed, 450.0);
    assert_eq!(cfg.pump.min_speed, 0.01);
    assert_eq!(cfg.pump.accel_per_sec, 50.0);
    assert_eq!(cfg.pump.halt_per_sec, 200.0);
    assert_eq!(cfg.pump.ml_per_rev_cw, 2.6);
    assert_eq!(cfg.pump.dosing_speed, 180.0);
    assert_eq!(cfg.motors.local_count, 1);
    assert_eq!(cfg.control.tick_ms, 10);
    assert!(!cfg.link.enabled);
    assert_eq!((cfg.link.address_from, cfg.link.address_to), (0x20, 0x2F));
    assert_eq!(cfg.link.poll_interval_ms, 300);
    assert_eq!(cfg.link.discovery_interval_ms, 2000);
    assert_eq!(cfg.subordinate.motor_count, 4);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml = r#"
[pump]
max_speed = 300.0

[link]
enabled = true
address_from = 0x21
address_to = 0x21
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.pump.max_speed, 300.0);
    assert_eq!(cfg.pump.halt_per_sec, 200.0);
    assert!(cfg.link.enabled);
    assert_eq!(cfg.link.timeout_ms, 120);
}

#[rstest]
#[case("[pump]\nmax_speed = 0.0", "max_speed must be > 0")]
#[case("[pump]\nmin_speed = 500.0", "min_speed must be in")]
#[case("[pump]\nhalt_per_sec = -1.0", "halt_per_sec must be > 0")]
#[case("[pump]\nml_per_rev_ccw = 0.0", "ml_per_rev")]
#[case("[motors]\nlocal_count = 5", "local_count must be in 1..=4")]
#[case("[motors]\nlocal_count = 0", "local_count must be in 1..=4")]
#[case("[control]\ntick_ms = 0", "tick_ms must be >= 1")]
#[case("[link]\naddress_from = 0x30\naddress_to = 0x20", "address_from must be <=")]
#[case("[link]\naddress_from = 0x70\naddress_to = 0x80", "<= 0x7f")]
#[case("[link]\nmax_remote_motors = 0", "max_remote_motors must be in 1..=4")]
#[case("[link]\npoll_interval_ms = 0", "intervals must be >= 1")]
#[case("[link]\ntimeout_ms = 0", "timeout_ms must be >= 1")]
#[case("[subordinate]\nmotor_count = 9", "subordinate.motor_count")]
#[case("[hardware]\nstep_pins = [1, 2]\ndir_pins = [3]", "same length")]
#[case("[logging]\nrotation = \"weekly\"", "rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    let msg = format!("{err}").to_lowercase();
    assert!(msg.contains(&needle.to_lowercase()), "{msg}");
}

#[test]
fn unknown_types_fail_to_parse() {
    assert!(load_toml("[motors]\nlocal_count = \"two\"").is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pump.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "[motors]\nlocal_count = 2\n[logging]\nrotation = \"daily\"").unwrap();
    let cfg: Config = load_file(&path).expect("load");
    assert_eq!(cfg.motors.local_count, 2);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[control]\ntick_ms = 0\n").unwrap();
    assert!(load_file(&bad).is_err());
    assert!(load_file(&dir.path().join("missing.toml")).is_err());
}
