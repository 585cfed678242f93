//! GPIO / peripheral pin assignments for the Servopoint main board.
//!
//! Single source of truth — the default [`SystemConfig`](crate::config)
//! references this module rather than hard-coding pin numbers.  Change a
//! pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Panel switches (latching toggles, active-low with internal pull-up)
// ---------------------------------------------------------------------------

/// Panel switch 0 — closed contact pulls the pin to ground.
pub const SWITCH_0_GPIO: i32 = 4;
/// Panel switch 1.
pub const SWITCH_1_GPIO: i32 = 5;
/// Panel switch 2.
pub const SWITCH_2_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Servo outputs (LEDC PWM, one channel per servo)
// ---------------------------------------------------------------------------

pub const SERVO_0_GPIO: i32 = 1;
pub const SERVO_1_GPIO: i32 = 2;
pub const SERVO_2_GPIO: i32 = 3;
pub const SERVO_3_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// Heartbeat LED
// ---------------------------------------------------------------------------

/// Onboard LED on the ESP32-S3 DevKit.
pub const HEARTBEAT_LED_GPIO: i32 = 48;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// Standard hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC timer resolution (bits).  14-bit gives 16384 duty counts per
/// 20 ms frame, ~1.2 µs of pulse-width resolution.
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;

/// Duty counts for a 1.0 ms pulse (nominal servo "low" end).
pub const DUTY_1MS: u16 = 819;
/// Duty counts for a 1.5 ms pulse (nominal servo centre).
pub const DUTY_1_5MS: u16 = 1229;
/// Duty counts for a 2.0 ms pulse (nominal servo "high" end).
pub const DUTY_2MS: u16 = 1638;
