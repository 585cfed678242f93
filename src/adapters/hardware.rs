//! Hardware adapter — bridges real GPIO/LEDC peripherals to the port
//! traits.
//!
//! This is the only module in the running system that touches actual
//! hardware, via the `hw_init` accessors.  On non-espidf targets those
//! accessors are simulation stubs; the adapter additionally mirrors the
//! last written duty per channel so diagnostics (and the host sim) can
//! inspect outputs.

use crate::app::ports::{GpioPort, PwmPort};
use crate::drivers::hw_init;
use crate::error::DriverError;

const LEDC_CHANNELS: usize = 8;

/// Concrete adapter combining switch input pins and servo PWM outputs.
pub struct HardwareAdapter {
    last_duty: [u16; LEDC_CHANNELS],
}

impl HardwareAdapter {
    pub fn new() -> Self {
        Self { last_duty: [0; LEDC_CHANNELS] }
    }

    /// Last duty written to a channel (diagnostic mirror).
    pub fn duty(&self, channel: u8) -> u16 {
        self.last_duty
            .get(channel as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl GpioPort for HardwareAdapter {
    fn read_pin(&mut self, gpio: i32) -> Result<bool, DriverError> {
        hw_init::read_pin(gpio)
    }
}

impl PwmPort for HardwareAdapter {
    fn write_duty(&mut self, channel: u8, duty: u16) -> Result<(), DriverError> {
        hw_init::ledc_set_duty_counts(channel, duty)?;
        if let Some(slot) = self.last_duty.get_mut(channel as usize) {
            *slot = duty;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_written_duty() {
        let mut hw = HardwareAdapter::new();
        hw.write_duty(2, 1500).unwrap();
        assert_eq!(hw.duty(2), 1500);
        assert_eq!(hw.duty(3), 0);
    }
}
