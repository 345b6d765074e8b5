//! Start/stop rules of the acquisition facade.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use weigh_core::mocks::{NoopConnector, RefusingConnector};
use weigh_core::{Acquisition, AcquisitionCfg, AcquisitionError, Decimal, DeviceConfig};
use weigh_hardware::SimulatedConnector;

fn cfg() -> AcquisitionCfg {
    AcquisitionCfg {
        poll_period: Duration::from_millis(5),
        reconnect_interval: Duration::from_millis(20),
        ..AcquisitionCfg::default()
    }
}

#[test]
fn second_start_is_a_state_error() {
    let mut acq = Acquisition::builder()
        .with_connector(NoopConnector)
        .with_config(cfg())
        .build()
        .unwrap();
    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    let err = acq
        .start(&[DeviceConfig::new("B2", "COM2", 9600)])
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AcquisitionError>(),
        Some(AcquisitionError::State(_))
    ));
    assert!(acq.is_running());
}

#[test]
fn stop_is_idempotent_and_restart_works() {
    let conn = SimulatedConnector::new();
    conn.add_port("COM1");
    let mut acq = Acquisition::builder()
        .with_connector(conn)
        .with_config(cfg())
        .build()
        .unwrap();
    let devices = [DeviceConfig::new("B1", "COM1", 9600)];

    acq.start(&devices).unwrap();
    assert!(acq.channel_status()[0].connected);
    acq.stop();
    acq.stop();
    assert!(!acq.is_running());
    assert!(!acq.channel_status()[0].connected);

    let report = acq.start(&devices).unwrap();
    assert_eq!(report.started, vec!["B1".to_string()]);
    assert!(acq.channel_status()[0].connected);
}

#[test]
fn bad_entries_are_rejected_without_stopping_the_rest() {
    let mut acq = Acquisition::builder()
        .with_connector(NoopConnector)
        .with_config(cfg())
        .build()
        .unwrap();
    let report = acq
        .start(&[
            DeviceConfig::new("B1", "COM1", 9600),
            DeviceConfig::new("B2", "", 9600),
            DeviceConfig::new("B3", "COM3", 12345),
            DeviceConfig::new("B1", "COM4", 9600),
            DeviceConfig::new("B5", "COM5", 9600).with_active(false),
        ])
        .unwrap();
    assert_eq!(report.started, vec!["B1".to_string()]);
    assert_eq!(report.skipped, vec!["B5".to_string()]);
    let reasons: Vec<_> = report
        .rejected
        .iter()
        .map(|r| (r.name.as_str(), r.reason.as_str()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("B2", "empty port name"),
            ("B3", "invalid baud rate 12345"),
            ("B1", "duplicate device name"),
        ]
    );
    assert_eq!(acq.channel_status().len(), 1);
}

#[test]
fn nothing_to_start_is_an_error() {
    let mut acq = Acquisition::builder()
        .with_connector(NoopConnector)
        .build()
        .unwrap();
    let err = acq
        .start(&[DeviceConfig::new("B1", "COM1", 9600).with_active(false)])
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<AcquisitionError>(),
        Some(&AcquisitionError::NoDevices)
    );
    assert!(!acq.is_running());
}

#[test]
fn refused_devices_stay_registered_and_drop_joins_everything() {
    let mut acq = Acquisition::builder()
        .with_connector(RefusingConnector)
        .with_config(cfg())
        .build()
        .unwrap();
    let report = acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    assert_eq!(report.disconnected, vec!["B1".to_string()]);
    std::thread::sleep(Duration::from_millis(60));
    let status = acq.channel_status();
    assert!(!status[0].connected);
    assert!(status[0].reconnect_attempts >= 1);
    assert!(
        status[0]
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused"))
    );
    drop(acq);
}

#[test]
fn stop_processes_every_frame_already_queued() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    port.push_all((1..=10).map(|i| i.to_string()));
    let mut acq = Acquisition::builder()
        .with_connector(conn)
        .with_config(AcquisitionCfg {
            poll_period: Duration::from_millis(1),
            history_capacity: 1,
            ..cfg()
        })
        .build()
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    // Slow subscriber: frames pile up in the queue behind it.
    acq.subscribe(move |ev| {
        std::thread::sleep(Duration::from_millis(30));
        sink.lock().unwrap().push(ev.weight.value);
    });
    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    while port.pending() > 0 {
        std::thread::sleep(Duration::from_millis(2));
    }
    std::thread::sleep(Duration::from_millis(20));
    assert!(seen.lock().unwrap().len() < 10);

    acq.stop();
    let expected: Vec<_> = (1..=10).map(Decimal::from).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
    assert_eq!(acq.latest_readings()["B1"], Decimal::from(10));
}

#[test]
fn dropped_event_receivers_are_unsubscribed() {
    let conn = SimulatedConnector::new();
    let port = conn.add_port("COM1");
    let mut acq = Acquisition::builder()
        .with_connector(conn)
        .with_config(AcquisitionCfg {
            history_capacity: 1,
            ..cfg()
        })
        .build()
        .unwrap();
    let live = acq.events();
    for _ in 0..100 {
        drop(acq.events());
    }
    assert_eq!(acq.bus().subscriber_count(), 101);

    acq.start(&[DeviceConfig::new("B1", "COM1", 9600)]).unwrap();
    port.push("120");
    let ev = live.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(ev.weight.value, Decimal::from(120));
    acq.stop();
    assert_eq!(acq.bus().subscriber_count(), 1);
}
