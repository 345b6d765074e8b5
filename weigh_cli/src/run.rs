//! Subcommand implementations: config/connector assembly and the event loops.

use crossbeam_channel as xch;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use weigh_core::conversions::devices_from;
use weigh_core::error::AcquisitionError;
use weigh_core::{
    Acquisition, AcquisitionCfg, CaptureSnapshot, CaptureState, CaptureStateMachine, DeviceConfig, StartReport,
    WeightEvent,
};
use weigh_hardware::{SerialPortConnector, SimulatedConnector};
use weigh_traits::LinkConnector;

use crate::cli::{Cli, Commands, SIM_FRAMES_ENV};

pub fn run(cli: Cli) -> eyre::Result<()> {
    if matches!(cli.cmd, Commands::Ports) {
        crate::logging::init(cli.json, cli.log_level.as_deref().unwrap_or("info"), None)?;
        return list_ports(cli.json);
    }

    let loaded = weigh_config::load_file(&cli.config)
        .map_err(|e| eyre::Report::new(AcquisitionError::Config(e.to_string())));
    let level = cli
        .log_level
        .as_deref()
        .or_else(|| loaded.as_ref().ok().and_then(|c| c.logging.level.as_deref()))
        .unwrap_or("info");
    crate::logging::init(
        cli.json,
        level,
        loaded.as_ref().ok().map(|c| &c.logging),
    )?;
    let cfg = loaded?;
    tracing::debug!(path = ?cli.config, devices = cfg.devices.len(), "config loaded");

    match cli.cmd {
        Commands::CheckConfig => check_config(&cfg, cli.json),
        Commands::Monitor { duration_ms } => {
            let mut acq = build_acquisition(&cfg, cli.simulate)?;
            monitor(&mut acq, &devices_from(&cfg), duration_ms, cli.json)
        }
        Commands::Capture {
            channel,
            timeout_ms,
        } => {
            let devices = devices_from(&cfg);
            if !devices.iter().any(|d| d.name == channel && d.active) {
                return Err(eyre::Report::new(AcquisitionError::Config(format!(
                    "no active device named {channel}"
                ))));
            }
            let mut acq = build_acquisition(&cfg, cli.simulate)?;
            capture(
                &mut acq,
                &devices,
                &channel,
                Duration::from_millis(timeout_ms),
                cli.json,
            )
        }
        Commands::Ports => Ok(()),
    }
}

fn build_acquisition(cfg: &weigh_config::Config, simulate: bool) -> eyre::Result<Acquisition> {
    let connector: Arc<dyn LinkConnector + Send + Sync> = if simulate {
        Arc::new(simulated_connector(cfg))
    } else {
        Arc::new(SerialPortConnector)
    };
    Acquisition::builder()
        .with_shared_connector(connector)
        .with_config(AcquisitionCfg::from(&cfg.acquisition))
        .build()
}

/// Every configured port, each preloaded with the `WEIGH_SIM_FRAMES` script.
fn simulated_connector(cfg: &weigh_config::Config) -> SimulatedConnector {
    let script = std::env::var(SIM_FRAMES_ENV).unwrap_or_default();
    let chunks: Vec<&str> = script
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    let conn = SimulatedConnector::new();
    for d in cfg.active_devices() {
        conn.add_port(d.port.trim()).push_all(chunks.iter().copied());
    }
    tracing::info!(ports = cfg.devices.len(), chunks = chunks.len(), "simulated ports ready");
    conn
}

/// Sender fires once on Ctrl-C.
fn ctrl_c_channel() -> eyre::Result<xch::Receiver<()>> {
    let (tx, rx) = xch::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    Ok(rx)
}

fn start(acq: &mut Acquisition, devices: &[DeviceConfig], json: bool) -> eyre::Result<StartReport> {
    let report = acq.start(devices)?;
    for r in &report.rejected {
        if !json {
            eprintln!("skipping {}: {}", r.name, r.reason);
        }
    }
    if !report.disconnected.is_empty() && !json {
        eprintln!(
            "not connected yet (retrying): {}",
            report.disconnected.join(", ")
        );
    }
    Ok(report)
}

fn print_event(ev: &WeightEvent, json: bool) {
    if json {
        let readings: serde_json::Map<String, serde_json::Value> = ev
            .readings
            .iter()
            .map(|(k, v)| (k.clone(), json!(v.to_string())))
            .collect();
        println!(
            "{}",
            json!({
                "channel": ev.weight.channel.as_str(),
                "weight": ev.weight.value.to_string(),
                "readings": readings,
            })
        );
    } else {
        println!("{}: {}", ev.weight.channel, ev.weight.value);
    }
}

fn monitor(
    acq: &mut Acquisition,
    devices: &[DeviceConfig],
    duration_ms: Option<u64>,
    json: bool,
) -> eyre::Result<()> {
    let events = acq.events();
    let interrupted = ctrl_c_channel()?;
    let deadline = duration_ms.map_or_else(xch::never, |ms| xch::after(Duration::from_millis(ms)));
    start(acq, devices, json)?;

    loop {
        xch::select! {
            recv(events) -> ev => match ev {
                Ok(ev) => print_event(&ev, json),
                Err(_) => break,
            },
            recv(interrupted) -> _ => {
                tracing::info!("interrupted");
                break;
            }
            recv(deadline) -> _ => break,
        }
    }
    acq.stop();
    // Events published while stopping.
    for ev in events.try_iter() {
        print_event(&ev, json);
    }
    Ok(())
}

fn print_capture(channel: &str, s: &CaptureSnapshot, json: bool) {
    let show = |d: Option<weigh_core::Decimal>| d.map_or_else(|| "-".to_string(), |v| v.to_string());
    if json {
        println!(
            "{}",
            json!({
                "channel": channel,
                "bruto": s.bruto.map(|v| v.to_string()),
                "tara": s.tara.to_string(),
                "neto": s.neto.map(|v| v.to_string()),
            })
        );
    } else {
        println!("channel: {channel}");
        println!("bruto:   {}", show(s.bruto));
        println!("tara:    {}", s.tara);
        println!("neto:    {}", show(s.neto));
    }
}

fn capture(
    acq: &mut Acquisition,
    devices: &[DeviceConfig],
    channel: &str,
    timeout: Duration,
    json: bool,
) -> eyre::Result<()> {
    let machine = Arc::new(Mutex::new(CaptureStateMachine::new(channel)));
    CaptureStateMachine::attach(&machine, acq.bus());
    // Subscribed after the machine, so each event arrives here already applied.
    let events = acq.events();
    let interrupted = ctrl_c_channel()?;
    let deadline = xch::after(timeout);
    start(acq, devices, json)?;

    let snapshot = |m: &Arc<Mutex<CaptureStateMachine>>| {
        m.lock().unwrap_or_else(PoisonError::into_inner).snapshot()
    };
    let outcome = loop {
        xch::select! {
            recv(events) -> ev => {
                if ev.is_err() {
                    break Err(AcquisitionError::Closed);
                }
                let s = snapshot(&machine);
                if s.state == CaptureState::SecondCaptured {
                    break Ok(s);
                }
                if !json && s.bruto.is_some() {
                    eprintln!("first reading captured, waiting for the second...");
                }
            }
            recv(interrupted) -> _ => break Err(AcquisitionError::State("interrupted".into())),
            recv(deadline) -> _ => break Err(AcquisitionError::Timeout),
        }
    };
    acq.stop();

    let s = outcome.map_err(eyre::Report::new)?;
    print_capture(channel, &s, json);
    Ok(())
}

fn check_config(cfg: &weigh_config::Config, json: bool) -> eyre::Result<()> {
    let mut problems = Vec::new();
    let mut rows = Vec::new();
    for d in &cfg.devices {
        let status = match d.validate() {
            Ok(()) if d.active => "ok".to_string(),
            Ok(()) => "inactive".to_string(),
            Err(e) => {
                problems.push(e.to_string());
                format!("invalid: {e}")
            }
        };
        rows.push((d, status));
    }

    if json {
        let devices: Vec<_> = rows
            .iter()
            .map(|(d, status)| {
                json!({
                    "name": d.name,
                    "port": d.port,
                    "baud_rate": d.baud_rate,
                    "active": d.active,
                    "reverse_digits": d.reverse_digits,
                    "status": status,
                })
            })
            .collect();
        println!("{}", json!({ "devices": devices, "valid": problems.is_empty() }));
    } else {
        println!("{:<12} {:<20} {:>7} {:<8} status", "name", "port", "baud", "reverse");
        for (d, status) in &rows {
            println!(
                "{:<12} {:<20} {:>7} {:<8} {}",
                d.name, d.port, d.baud_rate, d.reverse_digits, status
            );
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(eyre::Report::new(AcquisitionError::Config(problems.join("; "))))
    }
}

fn list_ports(json: bool) -> eyre::Result<()> {
    let ports = weigh_hardware::available_ports()?;
    if json {
        println!("{}", json!({ "ports": ports }));
    } else if ports.is_empty() {
        println!("no serial ports found");
    } else {
        for p in ports {
            println!("{p}");
        }
    }
    Ok(())
}
