//! One-shot hardware peripheral initialization and raw accessors.
//!
//! Configures the switch input GPIOs, the heartbeat LED output, and the
//! LEDC timer/channels for the servo outputs using raw ESP-IDF sys calls.
//! Called once from `main()` before the executor starts.
//!
//! The servo LEDC timer runs at 50 Hz with 14-bit resolution: 16384 duty
//! counts per 20 ms frame, so one count is ~1.2 µs of pulse width.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::config::SystemConfig;
use crate::error::DriverError;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcTimerFailed(i32),
    LedcChannelFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcTimerFailed(rc) => write!(f, "LEDC timer config failed (rc={})", rc),
            Self::LedcChannelFailed(rc) => write!(f, "LEDC channel config failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(config: &SystemConfig) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the executor starts;
    // single-threaded.
    unsafe {
        init_switch_inputs(config)?;
        init_led_output()?;
        init_servo_ledc(config)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_config: &SystemConfig) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── Switch inputs (pulled-up GPIOs) ───────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_switch_inputs(config: &SystemConfig) -> Result<(), HwInitError> {
    for sw in &config.switches {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << sw.gpio,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }
    info!("hw_init: {} switch inputs configured (pull-up)", config.switches.len());
    Ok(())
}

// ── Heartbeat LED output ──────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_led_output() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << crate::pins::HEARTBEAT_LED_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

// ── Servo LEDC (50 Hz, 14-bit) ────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_servo_ledc(config: &SystemConfig) -> Result<(), HwInitError> {
    let timer_cfg = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        duty_resolution: crate::pins::SERVO_PWM_RESOLUTION_BITS,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        freq_hz: crate::pins::SERVO_PWM_FREQ_HZ,
        clk_cfg: ledc_clk_cfg_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcTimerFailed(ret));
    }

    for servo in &config.servos {
        let ch_cfg = ledc_channel_config_t {
            gpio_num: servo.gpio,
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: u32::from(servo.channel),
            intr_type: ledc_intr_type_t_LEDC_INTR_DISABLE,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        let ret = unsafe { ledc_channel_config(&ch_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::LedcChannelFailed(ret));
        }
    }
    info!("hw_init: LEDC servo timer at {} Hz, {} channels",
        crate::pins::SERVO_PWM_FREQ_HZ, config.servos.len());
    Ok(())
}

// ── Runtime accessors ─────────────────────────────────────────

/// Level of one input pin.  The ESP-IDF read itself cannot fail once the
/// pin is configured; the `Result` carries the contract for other
/// [`GpioPort`](crate::app::ports::GpioPort) implementations.
#[cfg(target_os = "espidf")]
pub fn read_pin(gpio: i32) -> Result<bool, DriverError> {
    // SAFETY: gpio_get_level is safe on any configured pin.
    Ok(unsafe { gpio_get_level(gpio) } != 0)
}

#[cfg(not(target_os = "espidf"))]
pub fn read_pin(_gpio: i32) -> Result<bool, DriverError> {
    // Sim: pulled-up bus with nothing attached.
    Ok(true)
}

/// Set a digital output level (heartbeat LED).
#[cfg(target_os = "espidf")]
pub fn gpio_write(gpio: i32, high: bool) {
    // SAFETY: gpio_set_level is safe on any configured output pin.
    unsafe {
        gpio_set_level(gpio, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_gpio: i32, _high: bool) {}

/// Write one LEDC channel's duty register and latch it.
#[cfg(target_os = "espidf")]
pub fn ledc_set_duty_counts(channel: u8, duty: u16) -> Result<(), DriverError> {
    let ch = u32::from(channel);
    // SAFETY: channel was configured in init_servo_ledc.
    unsafe {
        if ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, ch, u32::from(duty)) != ESP_OK as i32 {
            return Err(DriverError::PwmWriteFailed(channel));
        }
        if ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, ch) != ESP_OK as i32 {
            return Err(DriverError::PwmWriteFailed(channel));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set_duty_counts(_channel: u8, _duty: u16) -> Result<(), DriverError> {
    Ok(())
}
