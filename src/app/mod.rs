//! Application boundary — port traits and the structured events the core
//! emits through them.
//!
//! The switch/servo/coordinator core talks to the outside world only via
//! the **port traits** defined in [`ports`]; adapters on the other side
//! bind them to real peripherals, logging, and storage.  This keeps the
//! whole control core testable on the host without hardware.

pub mod events;
pub mod ports;
