//! System configuration parameters
//!
//! All tunable parameters for the Servopoint system: polling and motion
//! timing, switch pin assignments, servo calibration, and the switch→servo
//! wiring table.  Values can be overridden via NVS.

use serde::{Deserialize, Serialize};

use crate::pins;

/// Upper bound on virtual switches; sizes the switch bank and scan batches.
pub const MAX_SWITCHES: usize = 16;
/// Upper bound on servo outputs (the S3 LEDC block has 8 channels, but the
/// table also covers boards with an external PWM expander).
pub const MAX_SERVOS: usize = 16;
/// Each binding targets a distinct servo, so bindings are bounded likewise.
pub const MAX_BINDINGS: usize = MAX_SERVOS;

/// Where switch states come from.  Selected once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    /// Panel switches wired to GPIO pins.
    Hardware,
    /// Virtual switches set by a network transport.
    Network,
}

/// One panel switch input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub gpio: i32,
}

/// One servo output: LEDC channel, its GPIO, the calibrated duty pair and
/// the full-travel transit time.  `off_duty` may be numerically greater
/// than `on_duty` to reverse the direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoConfig {
    pub channel: u8,
    pub gpio: i32,
    pub off_duty: u16,
    pub on_duty: u16,
    pub transit_ms: u32,
}

/// Wires one virtual switch to one servo.  `invert` flips the sense so a
/// closed switch can drive the servo to its off position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub switch: u8,
    pub servo: u8,
    pub invert: bool,
}

/// Station credentials for the network input variant: the AP name, the
/// passphrase, and the two-letter regulatory-domain code the radio must be
/// configured with before association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredentials {
    pub ssid: heapless::String<32>,
    pub passphrase: heapless::String<64>,
    pub country: heapless::String<2>,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Input ---
    /// Switch input source variant.
    pub input: InputMode,
    /// Number of virtual switches (must match the pin list in hardware mode).
    pub virtual_switches: u8,
    /// Switch sampling interval (milliseconds).
    pub poll_interval_ms: u32,
    /// Debounce settle delay between the two reads of a pin (milliseconds).
    pub settle_ms: u32,

    // --- Motion ---
    /// Scheduling granularity of servo motion (milliseconds per step).
    pub step_period_ms: u32,
    /// De-energize a servo after it completes a transit (stops idle hum;
    /// the commanded position is retained).
    pub rest_after_transit: bool,
    /// Hold time at the end position before de-energizing (milliseconds).
    pub rest_settle_ms: u32,

    // --- Indicators ---
    /// Blink the onboard LED as an activity indicator.
    pub heartbeat: bool,

    // --- Wiring ---
    pub switches: heapless::Vec<SwitchConfig, MAX_SWITCHES>,
    pub servos: heapless::Vec<ServoConfig, MAX_SERVOS>,
    pub bindings: heapless::Vec<BindingConfig, MAX_BINDINGS>,

    // --- Network ---
    /// Required in network input mode.
    pub credentials: Option<NetworkCredentials>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let switches = heapless::Vec::from_slice(&[
            SwitchConfig { gpio: pins::SWITCH_0_GPIO },
            SwitchConfig { gpio: pins::SWITCH_1_GPIO },
            SwitchConfig { gpio: pins::SWITCH_2_GPIO },
        ])
        .unwrap_or_default();

        // Servo 1 mirrors servo 0 (reversed duty pair); servo 3 is a slow
        // semaphore-style movement.
        let servos = heapless::Vec::from_slice(&[
            ServoConfig {
                channel: 0,
                gpio: pins::SERVO_0_GPIO,
                off_duty: pins::DUTY_1MS,
                on_duty: pins::DUTY_2MS,
                transit_ms: 1000,
            },
            ServoConfig {
                channel: 1,
                gpio: pins::SERVO_1_GPIO,
                off_duty: pins::DUTY_2MS,
                on_duty: pins::DUTY_1MS,
                transit_ms: 1000,
            },
            ServoConfig {
                channel: 2,
                gpio: pins::SERVO_2_GPIO,
                off_duty: pins::DUTY_1MS,
                on_duty: pins::DUTY_2MS,
                transit_ms: 1000,
            },
            ServoConfig {
                channel: 3,
                gpio: pins::SERVO_3_GPIO,
                off_duty: pins::DUTY_1MS,
                on_duty: pins::DUTY_2MS,
                transit_ms: 2000,
            },
        ])
        .unwrap_or_default();

        // Switch 0 throws a crossover (two servos); switches 1 and 2 drive
        // one servo each.
        let bindings = heapless::Vec::from_slice(&[
            BindingConfig { switch: 0, servo: 0, invert: false },
            BindingConfig { switch: 0, servo: 1, invert: false },
            BindingConfig { switch: 1, servo: 2, invert: false },
            BindingConfig { switch: 2, servo: 3, invert: false },
        ])
        .unwrap_or_default();

        Self {
            input: InputMode::Hardware,
            virtual_switches: 3,
            poll_interval_ms: 200,
            settle_ms: 5,
            step_period_ms: 20,
            rest_after_transit: false,
            rest_settle_ms: 200,
            heartbeat: true,
            switches,
            servos,
            bindings,
            credentials: None,
        }
    }
}

impl SystemConfig {
    /// Range-check the whole configuration.  Called before persisting and
    /// again when the coordinator is built from it.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be non-zero");
        }
        if self.step_period_ms == 0 {
            return Err("step_period_ms must be non-zero");
        }
        let n = self.virtual_switches as usize;
        if n == 0 || n > MAX_SWITCHES {
            return Err("virtual_switches outside supported range");
        }
        if self.input == InputMode::Hardware && self.switches.len() != n {
            return Err("hardware mode: switch pin list must match virtual_switches");
        }
        if self.input == InputMode::Network && self.credentials.is_none() {
            return Err("network mode: credentials required");
        }
        if self.servos.is_empty() {
            return Err("at least one servo required");
        }
        for (i, s) in self.servos.iter().enumerate() {
            if s.transit_ms == 0 {
                return Err("servo transit_ms must be non-zero");
            }
            if self.servos[..i].iter().any(|o| o.channel == s.channel) {
                return Err("servo channels must be distinct");
            }
        }
        let mut bound = [false; MAX_SERVOS];
        for b in &self.bindings {
            if b.switch as usize >= n {
                return Err("binding references unknown switch");
            }
            let servo = b.servo as usize;
            if servo >= self.servos.len() {
                return Err("binding references unknown servo");
            }
            // Two switches must never fight over the same servo.
            if bound[servo] {
                return Err("servo is bound to more than one switch");
            }
            bound[servo] = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.virtual_switches as usize, c.switches.len());
        assert!(c.poll_interval_ms > 0);
        assert!(c.step_period_ms > 0);
        assert!(!c.servos.is_empty());
        assert!(c.bindings.len() <= c.servos.len());
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.poll_interval_ms, c2.poll_interval_ms);
        assert_eq!(c.servos, c2.servos);
        assert_eq!(c.bindings, c2.bindings);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.switches, c2.switches);
        assert_eq!(c.servos, c2.servos);
    }

    #[test]
    fn rejects_double_bound_servo() {
        let mut c = SystemConfig::default();
        c.bindings
            .push(BindingConfig { switch: 1, servo: 0, invert: false })
            .unwrap();
        assert_eq!(c.validate(), Err("servo is bound to more than one switch"));
    }

    #[test]
    fn rejects_out_of_range_binding() {
        let mut c = SystemConfig::default();
        c.bindings[0].switch = 7;
        assert_eq!(c.validate(), Err("binding references unknown switch"));
    }

    #[test]
    fn rejects_network_mode_without_credentials() {
        let mut c = SystemConfig::default();
        c.input = InputMode::Network;
        assert_eq!(c.validate(), Err("network mode: credentials required"));
    }

    #[test]
    fn rejects_mismatched_pin_list() {
        let mut c = SystemConfig::default();
        c.virtual_switches = 4;
        assert!(c.validate().is_err());
    }
}
