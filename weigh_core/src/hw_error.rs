//! Maps `Box<dyn Error>` from the transport traits to typed `AcquisitionError`.
//!
//! `weigh_traits` keeps its errors boxed; with the `hardware-errors` feature the
//! concrete `weigh_hardware::HwError` is recognised by downcasting.

use crate::error::AcquisitionError;

/// Map a trait-boundary error to a typed `AcquisitionError`.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> AcquisitionError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<weigh_hardware::HwError>() {
            return match hw {
                weigh_hardware::HwError::Timeout => AcquisitionError::Timeout,
                weigh_hardware::HwError::Closed => AcquisitionError::Closed,
                other => AcquisitionError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        AcquisitionError::Timeout
    } else {
        AcquisitionError::Transport(s)
    }
}
