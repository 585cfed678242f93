//! Servopoint Firmware — Main Entry Point
//!
//! Hexagonal wiring around a cooperative single-threaded core.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter       NvsAdapter        WifiAdapter           │
//! │  (GpioPort+PwmPort)    (ConfigPort)      (ConnectivityPort)    │
//! │  LogEventSink                                                  │
//! │  (EventSink)                                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  System coordinator (edge-executor LocalExecutor)      │    │
//! │  │  poll scheduler · switch bank · servo motion tasks     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
mod config;
mod coordinator;
mod error;
mod notify;
mod pins;
mod servo;
mod switch;

mod adapters;
mod app;
mod drivers;

#[cfg(target_os = "espidf")]
mod runtime_shims;

// ── Imports ───────────────────────────────────────────────────
use core::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use embassy_time::Duration;
use log::{error, info, warn};

use adapters::hardware::HardwareAdapter;
use adapters::log_sink::LogEventSink;
use adapters::nvs::NvsAdapter;
use adapters::wifi::{ConnectivityPort, WifiAdapter};
use app::ports::ConfigPort;
use config::{InputMode, MAX_SWITCHES, SystemConfig};
use coordinator::System;
use switch::source::{HardwareSource, NetworkSource, PinBinding, SwitchSource};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Servopoint v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Initialise hardware peripherals ────────────────────
    if let Err(e) = drivers::hw_init::init_peripherals(&config) {
        // Peripheral init failure is critical — log and halt.
        // In production this triggers the watchdog reset after timeout.
        error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    let hw = Rc::new(RefCell::new(HardwareAdapter::new()));
    let sink = LogEventSink::new();

    // ── 4. Select the input source and run ────────────────────
    let result = match config.input {
        InputMode::Hardware => {
            let bindings: heapless::Vec<PinBinding, MAX_SWITCHES> = config
                .switches
                .iter()
                .enumerate()
                .map(|(i, sw)| PinBinding { gpio: sw.gpio, switch: i })
                .collect();
            let source = HardwareSource::new(
                hw.clone(),
                bindings,
                Duration::from_millis(u64::from(config.settle_ms)),
            );
            run_system(&config, source, hw, sink)
        }
        InputMode::Network => {
            let mut wifi = WifiAdapter::new();
            if let Some(creds) = &config.credentials {
                if let Err(e) = wifi.set_credentials(creds) {
                    error!("WiFi credentials rejected: {} — halting", e);
                    #[allow(clippy::empty_loop)]
                    loop {}
                }
            }
            if let Err(e) = wifi.connect() {
                warn!("WiFi: initial connect failed ({}), switches hold initial state", e);
            }
            let source = NetworkSource::new();
            // The control transport that will feed this handle is still
            // undesigned; until it exists the virtual switches only ever
            // hold their initial (all-off) state.
            let _remote = source.handle();
            warn!("network input: no control transport registered yet");
            run_system(&config, source, hw, sink)
        }
    };

    // ── 5. The run loop returns only on a fatal error ─────────
    if let Err(e) = result {
        error!("fatal: {} — no further switch input possible, halting", e);
    }
    #[allow(clippy::empty_loop)]
    loop {}
}

fn run_system<S: SwitchSource + 'static>(
    config: &SystemConfig,
    source: S,
    hw: Rc<RefCell<HardwareAdapter>>,
    sink: LogEventSink,
) -> error::Result<()> {
    let system = System::build(config, source, hw, sink)?;
    system.run()
}
