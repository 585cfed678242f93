//! Onboard status LED and the heartbeat task.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the LED GPIO via hw_init.
//! On host/test: tracks state in-memory only.

use embassy_time::{Duration, Timer};

use crate::drivers::hw_init;

/// LED on-time per heartbeat blink.
const HEARTBEAT_ON: Duration = Duration::from_millis(100);
/// Dark interval between blinks.
const HEARTBEAT_OFF: Duration = Duration::from_millis(2000);

pub struct StatusLed {
    gpio: i32,
    lit: bool,
}

impl StatusLed {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, lit: false }
    }

    pub fn set(&mut self, lit: bool) {
        hw_init::gpio_write(self.gpio, lit);
        self.lit = lit;
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

/// Activity indicator: short blink, long pause, forever.  Purely a
/// liveness cue — the blink cadence shows the executor is still turning
/// over while servos move.
pub async fn heartbeat(mut led: StatusLed) {
    loop {
        led.set(true);
        Timer::after(HEARTBEAT_ON).await;
        led.set(false);
        Timer::after(HEARTBEAT_OFF).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_level_in_memory() {
        let mut led = StatusLed::new(48);
        assert!(!led.is_lit());
        led.set(true);
        assert!(led.is_lit());
        led.set(false);
        assert!(!led.is_lit());
    }
}
