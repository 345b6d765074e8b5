use rstest::rstest;
use std::io::Write;
use weigh_config::{load_file, load_toml};

const VALID: &str = r#"
[[devices]]
name = "B1"
port = "/dev/ttyUSB0"
baud_rate = 9600

[[devices]]
name = "B2"
port = "/dev/ttyUSB1"
baud_rate = 2400
active = false
reverse_digits = true

[acquisition]
poll_ms = 100
read_timeout_ms = 500
reconnect_interval_ms = 5000
queue_soft_limit = 100
backpressure_pause_ms = 10
history_capacity = 4

[logging]
level = "info"
rotation = "daily"
"#;

#[test]
fn accepts_full_station_config() {
    let cfg = load_toml(VALID).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.devices.len(), 2);
    let active: Vec<_> = cfg.active_devices().map(|d| d.name.as_str()).collect();
    assert_eq!(active, vec!["B1"]);
}

#[test]
fn acquisition_section_is_optional() {
    let cfg = load_toml(
        r#"
[[devices]]
name = "B1"
port = "COM1"
baud_rate = 9600
"#,
    )
    .expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.acquisition.poll_ms, 100);
}

#[test]
fn rejects_empty_device_list() {
    let cfg = load_toml("[acquisition]\npoll_ms = 100\n").expect("parse TOML");
    let err = cfg.validate().expect_err("no devices");
    assert!(format!("{err}").contains("at least one [[devices]]"));
}

#[test]
fn rejects_duplicate_device_names() {
    let cfg = load_toml(
        r#"
[[devices]]
name = "B1"
port = "COM1"
baud_rate = 9600

[[devices]]
name = "B1"
port = "COM2"
baud_rate = 9600
"#,
    )
    .expect("parse TOML");
    let err = cfg.validate().expect_err("duplicate names");
    assert!(format!("{err}").contains("duplicate device name: B1"));
}

#[rstest]
#[case("poll_ms = 0", "poll_ms must be >= 1")]
#[case("read_timeout_ms = 0", "read_timeout_ms must be >= 1")]
#[case("reconnect_interval_ms = 0", "reconnect_interval_ms must be >= 1")]
#[case("queue_soft_limit = 0", "queue_soft_limit must be >= 1")]
#[case("history_capacity = 0", "history_capacity must be >= 1")]
#[case("poll_ms = 120000", "poll_ms is unreasonably large")]
fn rejects_bad_acquisition_values(#[case] line: &str, #[case] needle: &str) {
    let toml = format!(
        "[[devices]]\nname = \"B1\"\nport = \"COM1\"\nbaud_rate = 9600\n\n[acquisition]\n{line}\n"
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn rejects_unknown_rotation() {
    let cfg = load_toml(
        r#"
[[devices]]
name = "B1"
port = "COM1"
baud_rate = 9600

[logging]
rotation = "weekly"
"#,
    )
    .expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[rstest]
#[case("", "COM1", 9600, "name must not be empty")]
#[case("B1", "  ", 9600, "port must not be empty")]
#[case("B1", "COM1", 1234, "not a standard rate")]
fn device_entry_problems_are_reported_per_entry(
    #[case] name: &str,
    #[case] port: &str,
    #[case] baud: u32,
    #[case] needle: &str,
) {
    let toml = format!("[[devices]]\nname = \"{name}\"\nport = \"{port}\"\nbaud_rate = {baud}\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.devices[0].validate().expect_err("bad entry");
    assert!(format!("{err}").contains(needle), "expected {needle:?} in {err}");
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weigh.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(VALID.as_bytes()).unwrap();
    let cfg = load_file(&path).expect("load");
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));

    let missing = dir.path().join("nope.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}
