//! Switch input sources.
//!
//! A [`SwitchSource`] produces `(index, value)` updates for the virtual
//! switch bank.  Two variants exist, selected at build time:
//!
//! - [`HardwareSource`] samples panel switches on GPIO pins with a
//!   read–settle–reread debounce.
//! - [`NetworkSource`] drains updates pushed by a network transport
//!   through a [`RemoteSwitches`] handle.  The transport itself (framing,
//!   authentication, scheduling) lives outside this module.
//!
//! Per-input failures never abort a scan: an unreadable or bouncing pin
//! simply produces no update, so the bank retains its previous state until
//! the next cycle.  Only a systemic driver failure surfaces as an error.

use core::cell::RefCell;
use std::rc::Rc;

use embassy_time::{Duration, Timer};
use log::{debug, trace};

use crate::app::ports::GpioPort;
use crate::config::MAX_SWITCHES;
use crate::error::DriverError;

/// One observed switch value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchReading {
    pub index: usize,
    pub value: bool,
}

/// Updates produced by one sampling pass.
pub type ScanBatch = heapless::Vec<SwitchReading, MAX_SWITCHES>;

/// Polymorphic producer of switch states.
#[allow(async_fn_in_trait)]
pub trait SwitchSource {
    /// Sample all configured inputs, returning zero or more updates.
    ///
    /// `Err` means the input subsystem is gone — the caller treats it as
    /// fatal.  Individual input failures are absorbed here.
    async fn scan(&mut self) -> Result<ScanBatch, DriverError>;
}

// ───────────────────────────────────────────────────────────────
// Hardware variant
// ───────────────────────────────────────────────────────────────

/// Maps one input pin to its virtual switch index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinBinding {
    pub gpio: i32,
    pub switch: usize,
}

/// Panel switches on pulled-up GPIO pins; a closed contact reads low.
///
/// Debounce policy: each pin is read twice with a settle delay in between
/// and only a stable pair produces an update.  A bouncing contact is
/// indistinguishable from a read failure at this boundary — both retain
/// the prior state for one poll cycle.
pub struct HardwareSource<G: GpioPort> {
    gpio: Rc<RefCell<G>>,
    pins: heapless::Vec<PinBinding, MAX_SWITCHES>,
    settle: Duration,
}

impl<G: GpioPort> HardwareSource<G> {
    pub fn new(
        gpio: Rc<RefCell<G>>,
        pins: heapless::Vec<PinBinding, MAX_SWITCHES>,
        settle: Duration,
    ) -> Self {
        Self { gpio, pins, settle }
    }
}

impl<G: GpioPort> SwitchSource for HardwareSource<G> {
    async fn scan(&mut self) -> Result<ScanBatch, DriverError> {
        let mut batch = ScanBatch::new();
        for pin in &self.pins {
            let first = match self.gpio.borrow_mut().read_pin(pin.gpio) {
                Ok(level) => level,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("switch {}: {e}, retaining prior state", pin.switch);
                    continue;
                }
            };
            Timer::after(self.settle).await;
            let second = match self.gpio.borrow_mut().read_pin(pin.gpio) {
                Ok(level) => level,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("switch {}: {e}, retaining prior state", pin.switch);
                    continue;
                }
            };
            if first == second {
                // Pull-up wiring: low level means the contact is closed.
                batch.push(SwitchReading { index: pin.switch, value: !second }).ok();
            } else {
                trace!("switch {}: contact bounce, retaining prior state", pin.switch);
            }
        }
        Ok(batch)
    }
}

// ───────────────────────────────────────────────────────────────
// Network variant
// ───────────────────────────────────────────────────────────────

/// Depth of the pending-update queue shared with the transport.
const REMOTE_QUEUE_DEPTH: usize = 32;

type RemoteQueue = Rc<RefCell<heapless::Deque<SwitchReading, REMOTE_QUEUE_DEPTH>>>;

/// Cloneable handle a network transport uses to set virtual switches.
///
/// The transport runs as another task on the same executor, so no locking
/// is involved — pushes and the draining `scan()` never overlap.
#[derive(Clone)]
pub struct RemoteSwitches {
    queue: RemoteQueue,
}

impl RemoteSwitches {
    /// Queue one switch update.  Returns `false` when the queue is full
    /// (the update is dropped; the transport should re-send).
    pub fn set(&self, index: usize, value: bool) -> bool {
        self.queue
            .borrow_mut()
            .push_back(SwitchReading { index, value })
            .is_ok()
    }
}

/// Virtual switches fed over the network.
///
/// Identical contract to the hardware variant; `scan()` simply drains
/// whatever the transport queued since the last cycle.
pub struct NetworkSource {
    queue: RemoteQueue,
}

impl NetworkSource {
    pub fn new() -> Self {
        Self { queue: Rc::new(RefCell::new(heapless::Deque::new())) }
    }

    /// Handle for the transport side.
    pub fn handle(&self) -> RemoteSwitches {
        RemoteSwitches { queue: self.queue.clone() }
    }
}

impl SwitchSource for NetworkSource {
    async fn scan(&mut self) -> Result<ScanBatch, DriverError> {
        let mut batch = ScanBatch::new();
        let mut queue = self.queue.borrow_mut();
        while let Some(reading) = queue.pop_front() {
            if batch.push(reading).is_err() {
                break;
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    /// Scripted GPIO port: per-pin levels plus optional failure injection.
    struct ScriptedGpio {
        levels: std::collections::HashMap<i32, bool>,
        failing: Option<i32>,
        unavailable: bool,
    }

    impl ScriptedGpio {
        fn with_levels(levels: &[(i32, bool)]) -> Self {
            Self {
                levels: levels.iter().copied().collect(),
                failing: None,
                unavailable: false,
            }
        }
    }

    impl GpioPort for ScriptedGpio {
        fn read_pin(&mut self, gpio: i32) -> Result<bool, DriverError> {
            if self.unavailable {
                return Err(DriverError::Unavailable);
            }
            if self.failing == Some(gpio) {
                return Err(DriverError::GpioReadFailed(gpio));
            }
            Ok(*self.levels.get(&gpio).unwrap_or(&true))
        }
    }

    fn pin_map(n: usize) -> heapless::Vec<PinBinding, MAX_SWITCHES> {
        (0..n)
            .map(|i| PinBinding { gpio: 10 + i as i32, switch: i })
            .collect()
    }

    #[test]
    fn stable_low_reads_as_on() {
        // Pins 10 and 12 pulled low (closed), pin 11 high (open).
        let gpio = Rc::new(RefCell::new(ScriptedGpio::with_levels(&[
            (10, false),
            (11, true),
            (12, false),
        ])));
        let mut src = HardwareSource::new(gpio, pin_map(3), Duration::from_millis(1));
        let batch = block_on(src.scan()).unwrap();
        assert_eq!(
            batch.as_slice(),
            &[
                SwitchReading { index: 0, value: true },
                SwitchReading { index: 1, value: false },
                SwitchReading { index: 2, value: true },
            ]
        );
    }

    #[test]
    fn failed_pin_is_skipped_others_update() {
        let gpio = Rc::new(RefCell::new(ScriptedGpio::with_levels(&[
            (10, false),
            (11, false),
            (12, false),
            (13, false),
            (14, false),
        ])));
        gpio.borrow_mut().failing = Some(13);
        let mut src = HardwareSource::new(gpio, pin_map(5), Duration::from_millis(1));
        let batch = block_on(src.scan()).unwrap();
        // Switch 3 produced no update; 0-2 and 4 did.
        let indices: Vec<usize> = batch.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4]);
        assert!(batch.iter().all(|r| r.value));
    }

    #[test]
    fn systemic_failure_aborts_scan() {
        let gpio = Rc::new(RefCell::new(ScriptedGpio::with_levels(&[(10, false)])));
        gpio.borrow_mut().unavailable = true;
        let mut src = HardwareSource::new(gpio, pin_map(1), Duration::from_millis(1));
        assert_eq!(block_on(src.scan()), Err(DriverError::Unavailable));
    }

    #[test]
    fn network_scan_drains_pending_updates() {
        let mut src = NetworkSource::new();
        let handle = src.handle();
        assert!(handle.set(2, true));
        assert!(handle.set(0, false));
        let batch = block_on(src.scan()).unwrap();
        assert_eq!(
            batch.as_slice(),
            &[
                SwitchReading { index: 2, value: true },
                SwitchReading { index: 0, value: false },
            ]
        );
        // Drained: a second scan is empty.
        assert!(block_on(src.scan()).unwrap().is_empty());
    }
}
