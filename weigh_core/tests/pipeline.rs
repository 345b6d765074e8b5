//! End-to-end: simulated ports → queue → stabilizer → bus.

use std::time::{Duration, Instant};

use weigh_core::{Acquisition, AcquisitionCfg, Decimal, DeviceConfig, WeightEvent};
use weigh_hardware::SimulatedConnector;

fn fast_cfg() -> AcquisitionCfg {
    AcquisitionCfg {
        poll_period: Duration::from_millis(5),
        read_timeout: Duration::from_millis(50),
        reconnect_interval: Duration::from_millis(40),
        ..AcquisitionCfg::default()
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn next_event(rx: &crossbeam_channel::Receiver<WeightEvent>) -> WeightEvent {
    rx.recv_timeout(Duration::from_secs(3))
        .expect("no weight event within 3s")
}

#[test]
fn repeated_value_is_emitted_once() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    port.push_all(["120 120 119 120", "120"]);

    let mut acq = Acquisition::builder()
        .with_connector(conn.clone())
        .with_config(fast_cfg())
        .build()
        .unwrap();
    let rx = acq.events();
    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();

    let ev = next_event(&rx);
    assert_eq!(ev.weight.channel.as_str(), "B1");
    assert_eq!(ev.weight.value, Decimal::from(120));
    assert_eq!(ev.readings.get("B1"), Some(&Decimal::from(120)));

    assert!(wait_until(Duration::from_secs(2), || port.pending() == 0));
    acq.stop();
    assert_eq!(rx.try_iter().count(), 0);
    assert_eq!(acq.latest_readings().get("B1"), Some(&Decimal::from(120)));
}

#[test]
fn malformed_text_produces_nothing() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    port.push_all(["ERR OL --", "kg kg kg", "\r\n"]);

    let mut acq = Acquisition::builder()
        .with_connector(conn.clone())
        .with_config(fast_cfg())
        .build()
        .unwrap();
    let rx = acq.events();
    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    assert!(wait_until(Duration::from_secs(2), || port.pending() == 0));
    acq.stop();
    assert_eq!(rx.try_iter().count(), 0);
    assert!(acq.latest_readings().is_empty());
}

#[test]
fn channels_are_stabilized_independently() {
    let conn = SimulatedConnector::new();
    conn.add_port("COM1").push("4500 4500");
    conn.add_port("COM2").push("021 021");

    let mut acq = Acquisition::builder()
        .with_connector(conn.clone())
        .with_config(fast_cfg())
        .build()
        .unwrap();
    let rx = acq.events();
    acq.start(&[
        DeviceConfig::new("B1", "COM1", 9600),
        DeviceConfig::new("B2", "COM2", 4800).with_reverse_digits(true),
    ])
    .unwrap();

    next_event(&rx);
    next_event(&rx);
    let readings = acq.latest_readings();
    assert_eq!(readings.get("B1"), Some(&Decimal::from(4500)));
    assert_eq!(readings.get("B2"), Some(&Decimal::from(120)));
    assert_eq!(conn.port("COM2").unwrap().last_baud(), Some(4800));
}

#[test]
fn unplugged_scale_is_reopened_and_resumes() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    port.push("100");

    let mut acq = Acquisition::builder()
        .with_connector(conn.clone())
        .with_config(fast_cfg())
        .build()
        .unwrap();
    let rx = acq.events();
    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    assert_eq!(next_event(&rx).weight.value, Decimal::from(100));

    port.unplug();
    assert!(wait_until(Duration::from_secs(2), || {
        !acq.channel_status()[0].connected
    }));
    port.replug();
    assert!(wait_until(Duration::from_secs(3), || {
        acq.channel_status()[0].connected
    }));
    port.push("200 200 200 200");

    assert_eq!(next_event(&rx).weight.value, Decimal::from(200));
    let status = &acq.channel_status()[0];
    assert!(status.reconnect_attempts >= 1);
    assert!(port.open_count() >= 2);
}

#[test]
fn device_that_fails_first_open_is_picked_up_later() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    port.fail_next_opens(1);
    port.push("55");

    let mut acq = Acquisition::builder()
        .with_connector(conn.clone())
        .with_config(fast_cfg())
        .build()
        .unwrap();
    let rx = acq.events();
    let report = acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    assert!(report.started.is_empty());
    assert_eq!(report.disconnected, vec!["B1".to_string()]);

    assert_eq!(next_event(&rx).weight.value, Decimal::from(55));
    assert!(acq.channel_status()[0].connected);
}

#[test]
fn subscribers_run_for_every_change() {
    use std::sync::{Arc, Mutex};

    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    let mut acq = Acquisition::builder()
        .with_connector(conn.clone())
        .with_config(AcquisitionCfg {
            history_capacity: 1,
            ..fast_cfg()
        })
        .build()
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    acq.subscribe(move |ev| sink.lock().unwrap().push(ev.weight.value));
    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();

    port.push_all(["1", "1", "2", "3", "3"]);
    assert!(wait_until(Duration::from_secs(3), || seen.lock().unwrap().len() == 3));
    acq.stop();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Decimal::from(1), Decimal::from(2), Decimal::from(3)]
    );
}
