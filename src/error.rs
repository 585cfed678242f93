//! Unified error types for the Servopoint firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! coordinator's error handling uniform.  All variants are `Copy` so they can
//! be latched in a `Cell` and handed between cooperative tasks without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A switch or servo index outside the configured range was requested.
    OutOfRange { index: usize },
    /// The hardware access subsystem failed in a non-recoverable way.
    Driver(DriverError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Peripheral or system initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index } => write!(f, "index {index} out of range"),
            Self::Driver(e) => write!(f, "driver: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Failures reported by the GPIO / PWM driver layer.
///
/// A failed read of a single pin is transient — the affected switch simply
/// retains its previous state until the next poll cycle.  Everything else
/// means the hardware subsystem is gone and no further input is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// GPIO level read returned an error (per-pin, transient).
    GpioReadFailed(i32),
    /// LEDC duty-cycle write failed on the given channel.
    PwmWriteFailed(u8),
    /// The driver subsystem is unavailable (systemic, fatal).
    Unavailable,
}

impl DriverError {
    /// Transient failures are isolated at the input-source boundary;
    /// fatal ones cross into the poller and terminate it.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::GpioReadFailed(_))
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioReadFailed(gpio) => write!(f, "GPIO {gpio} read failed"),
            Self::PwmWriteFailed(ch) => write!(f, "PWM write failed on channel {ch}"),
            Self::Unavailable => write!(f, "hardware subsystem unavailable"),
        }
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_read_failure_is_transient() {
        assert!(!DriverError::GpioReadFailed(4).is_fatal());
        assert!(DriverError::PwmWriteFailed(0).is_fatal());
        assert!(DriverError::Unavailable.is_fatal());
    }

    #[test]
    fn display_formats() {
        let e: Error = DriverError::Unavailable.into();
        assert_eq!(e.to_string(), "driver: hardware subsystem unavailable");
        assert_eq!(
            Error::OutOfRange { index: 9 }.to_string(),
            "index 9 out of range"
        );
    }
}
