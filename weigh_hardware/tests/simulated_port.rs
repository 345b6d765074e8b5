use rstest::rstest;
use std::time::Duration;
use weigh_hardware::{HwError, SimulatedConnector};
use weigh_traits::{LinkConnector, PortSettings, SerialLink};

fn settings() -> PortSettings {
    PortSettings::new("/dev/ttyUSB0", 9600, Duration::from_millis(500))
}

#[test]
fn unplug_closes_the_live_link_and_blocks_reopen() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("/dev/ttyUSB0");
    let mut link = conn.open(&settings()).unwrap();
    assert!(link.is_open());

    port.unplug();
    assert!(!link.is_open());
    let err = link.read_available().expect_err("read after unplug");
    assert!(err.downcast_ref::<HwError>().is_some_and(|e| matches!(e, HwError::Closed)));
    assert!(conn.open(&settings()).is_err());

    port.replug();
    let fresh = conn.open(&settings()).unwrap();
    assert!(fresh.is_open());
    // The link from before the unplug stays dead.
    assert!(!link.is_open());
    assert_eq!(port.open_count(), 2);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(3)]
fn refused_opens_are_counted_down(#[case] n: u32) {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("/dev/ttyUSB0");
    port.fail_next_opens(n);
    for _ in 0..n {
        let err = conn.open(&settings()).err().expect("refused");
        assert!(err.to_string().contains("port busy"));
    }
    assert!(conn.open(&settings()).is_ok());
    assert_eq!(port.open_count(), 1);
}

#[test]
fn pending_transmissions_survive_a_reconnect() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("/dev/ttyUSB0");
    port.push_all(["100", "200"]);
    let mut first = conn.open(&settings()).unwrap();
    assert_eq!(first.read_available().unwrap(), "100");
    port.unplug();
    port.replug();
    let mut second = conn.open(&settings()).unwrap();
    assert_eq!(second.read_available().unwrap(), "200");
    assert_eq!(port.pending(), 0);
}
