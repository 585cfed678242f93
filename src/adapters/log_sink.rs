//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production).  A network telemetry
//! adapter would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { switches, servos } => {
                info!("START  | {} switches, {} servos", switches, servos);
            }
            AppEvent::PollerStarted { interval_ms } => {
                info!("POLL   | sampling every {}ms", interval_ms);
            }
            AppEvent::SwitchChanged { index, state } => {
                info!("SWITCH | {} -> {}", index, if *state { "on" } else { "off" });
            }
            AppEvent::StartupPosition { servo, duty } => {
                info!("SERVO  | {} positioned at duty {}", servo, duty);
            }
            AppEvent::MotionDispatched { servo, target } => {
                info!("MOTION | servo {} -> {:?}", servo, target);
            }
        }
    }
}
