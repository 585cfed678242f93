//! Port traits — the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ core (switches, servos, coordinator)
//! ```
//!
//! Driven adapters (GPIO/PWM hardware, event sinks, storage) implement
//! these traits.  The core consumes them via generics, so it never touches
//! hardware directly and runs unmodified under host-side tests.

use crate::config::SystemConfig;
use crate::error::DriverError;

// ───────────────────────────────────────────────────────────────
// GPIO input port (driven adapter: hardware → core)
// ───────────────────────────────────────────────────────────────

/// Read-side port for switch input pins.
pub trait GpioPort {
    /// Current level of one input pin (true = high).
    fn read_pin(&mut self, gpio: i32) -> Result<bool, DriverError>;
}

// ───────────────────────────────────────────────────────────────
// PWM output port (driven adapter: core → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for servo outputs.
pub trait PwmPort {
    /// Set the duty register of one output channel.  Duty 0 removes the
    /// pulse entirely (servo de-energized).
    fn write_duty(&mut self, channel: u8, duty: u16) -> Result<(), DriverError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s through
/// this port.  Adapters decide where they go (serial log, network, ...).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: core ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting — a corrupted or
/// hand-edited store must not be able to inject an out-of-range wiring
/// table (e.g. two switches bound to one servo).
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: core ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems, and
/// writes must be atomic — no partial blobs on power loss.  The ESP-IDF
/// NVS API guarantees this natively; the in-memory simulation trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
