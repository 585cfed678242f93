//! Outbound application events.
//!
//! The coordinator and poller emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them — log to serial, publish over the network,
//! etc.

use crate::servo::Demand;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The system finished building and starts up.
    Started { switches: usize, servos: usize },

    /// The poll scheduler began sampling.
    PollerStarted { interval_ms: u32 },

    /// A virtual switch changed value during a poll cycle.
    SwitchChanged { index: usize, state: bool },

    /// Startup positioning: a servo was set directly from the initial scan.
    StartupPosition { servo: usize, duty: u16 },

    /// A motion task was dispatched toward a new target.
    MotionDispatched { servo: usize, target: Demand },
}
