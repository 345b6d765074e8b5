//! Human-readable error descriptions and structured JSON error formatting.

use weigh_core::error::{AcquisitionError, BuildError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingConnector => {
                "What happened: No transport was provided to the acquisition engine.\nLikely causes: The CLI could not decide between serial ports and simulation.\nHow to fix: Re-run, optionally with --simulate.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid acquisition settings ({msg}).\nLikely causes: Zero or out-of-range values under [acquisition].\nHow to fix: Edit the config file, then rerun `weigh check-config`."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<AcquisitionError>() {
        return match ae {
            AcquisitionError::NoDevices => "What happened: No device could be started.\nLikely causes: Every [[devices]] entry is inactive or invalid.\nHow to fix: Run `weigh check-config`, fix the entries, and mark at least one device active.".to_string(),
            AcquisitionError::Timeout => "What happened: Timed out waiting for the scale.\nLikely causes: Scale not transmitting, wrong port or baud rate, or the weighing took longer than --timeout-ms.\nHow to fix: Check cabling and [[devices]] settings, or raise --timeout-ms.".to_string(),
            AcquisitionError::Config(msg) => format!(
                "What happened: Configuration problem: {msg}.\nLikely causes: Missing file, TOML syntax error, or an invalid value.\nHow to fix: Edit the config file, then rerun `weigh check-config`."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("permission denied") {
        return "What happened: Access to the serial port was denied.\nLikely causes: The user is not in the dialout/uucp group.\nHow to fix: Grant the user access to the port, then log in again.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for usage/config problems, 3 when no device could be started.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<AcquisitionError>() {
        Some(AcquisitionError::Config(_)) => 2,
        Some(AcquisitionError::NoDevices) => 3,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingConnector => "MissingConnector",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<AcquisitionError>() {
        Some(AcquisitionError::Transport(_)) => "Transport",
        Some(AcquisitionError::Timeout) => "Timeout",
        Some(AcquisitionError::Config(_)) => "Config",
        Some(AcquisitionError::State(_)) => "State",
        Some(AcquisitionError::Closed) => "Closed",
        Some(AcquisitionError::NoDevices) => "NoDevices",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        let cfg = eyre::Report::new(AcquisitionError::Config("bad".into()));
        assert_eq!(exit_code_for_error(&cfg), 2);
        let none = eyre::Report::new(AcquisitionError::NoDevices);
        assert_eq!(exit_code_for_error(&none), 3);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn json_error_names_the_reason() {
        let err = eyre::Report::new(AcquisitionError::Timeout);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Timeout");
        assert_eq!(v["exit_code"], 1);
        assert!(v["message"].as_str().unwrap().contains("Timed out"));
    }
}
