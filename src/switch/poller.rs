//! Periodic switch poll scheduler.
//!
//! One infinite cooperative task: scan the active input source, apply the
//! batch to the switch bank, raise the change notification if anything
//! actually changed, then sleep one polling interval.  The inter-cycle
//! sleep is the yield point that lets servo motion tasks run.
//!
//! All updates of a cycle land in the bank *before* the notification is
//! raised, so the consumer always observes a consistent batch — never a
//! partial one.  Changes arriving while the consumer is busy coalesce into
//! a single wake.

use core::cell::RefCell;
use std::rc::Rc;

use embassy_time::{Duration, Timer};
use log::{error, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::notify::{ChangeNotifier, FaultLatch};
use crate::switch::SwitchBank;
use crate::switch::source::SwitchSource;

/// Run the poll loop until the input subsystem dies.
///
/// A fatal scan error is latched and the notifier raised so the waiting
/// coordinator observes the shutdown; the task then ends.  Per-input
/// failures were already absorbed inside `scan()` and inherently retry on
/// the next cycle.
pub async fn run<S: SwitchSource, E: EventSink>(
    mut source: S,
    bank: Rc<RefCell<SwitchBank>>,
    notify: Rc<ChangeNotifier>,
    faults: Rc<FaultLatch>,
    sink: Rc<RefCell<E>>,
    interval: Duration,
) {
    loop {
        match source.scan().await {
            Ok(batch) => {
                let mut changed = false;
                {
                    // No suspension point while the bank is borrowed: each
                    // cycle's updates are applied as one atomic batch.
                    let mut bank = bank.borrow_mut();
                    for reading in &batch {
                        match bank.set_state(reading.index, reading.value) {
                            Ok(true) => {
                                changed = true;
                                sink.borrow_mut().emit(&AppEvent::SwitchChanged {
                                    index: reading.index,
                                    state: reading.value,
                                });
                            }
                            Ok(false) => {}
                            // A stray index must not abort the cycle for
                            // the other inputs.
                            Err(e) => warn!("poll: {e}, reading dropped"),
                        }
                    }
                }
                if changed {
                    notify.raise();
                }
            }
            Err(e) => {
                error!("poll: input subsystem lost ({e}), stopping");
                faults.latch(e.into());
                notify.raise();
                return;
            }
        }
        Timer::after(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::switch::source::{ScanBatch, SwitchReading};
    use edge_executor::LocalExecutor;
    use futures_lite::future::block_on;

    /// Plays back one prepared batch per cycle, then fails.
    struct ScriptedSource {
        batches: Vec<Result<ScanBatch, DriverError>>,
        cycle: usize,
    }

    impl SwitchSource for ScriptedSource {
        async fn scan(&mut self) -> Result<ScanBatch, DriverError> {
            let i = self.cycle.min(self.batches.len() - 1);
            self.cycle += 1;
            self.batches[i].clone()
        }
    }

    struct RecordingSink {
        events: Vec<AppEvent>,
    }

    impl EventSink for RecordingSink {
        fn emit(&mut self, event: &AppEvent) {
            self.events.push(*event);
        }
    }

    fn batch(readings: &[(usize, bool)]) -> Result<ScanBatch, DriverError> {
        Ok(readings
            .iter()
            .map(|&(index, value)| SwitchReading { index, value })
            .collect())
    }

    #[test]
    fn two_changes_in_one_cycle_raise_once() {
        let bank = Rc::new(RefCell::new(SwitchBank::new(3).unwrap()));
        let notify = Rc::new(ChangeNotifier::new());
        let faults = Rc::new(FaultLatch::new());
        let sink = Rc::new(RefCell::new(RecordingSink { events: Vec::new() }));
        let source = ScriptedSource {
            batches: vec![
                batch(&[(0, true), (2, true)]),
                // Steady state afterwards: no further notification.
                batch(&[(0, true), (2, true)]),
                Err(DriverError::Unavailable),
            ],
            cycle: 0,
        };

        let ex: LocalExecutor<'_, 8> = LocalExecutor::new();
        ex.spawn(run(
            source,
            bank.clone(),
            notify.clone(),
            faults.clone(),
            sink.clone(),
            Duration::from_millis(10),
        ))
        .detach();
        block_on(ex.run(Timer::after(Duration::from_millis(15))));

        // Both changes applied before the single coalesced raise.
        assert!(notify.pending());
        assert!(bank.borrow().get_state(0).unwrap());
        assert!(!bank.borrow().get_state(1).unwrap());
        assert!(bank.borrow().get_state(2).unwrap());
        assert_eq!(sink.borrow().events.len(), 2);
    }

    #[test]
    fn fatal_scan_latches_and_stops() {
        let bank = Rc::new(RefCell::new(SwitchBank::new(1).unwrap()));
        let notify = Rc::new(ChangeNotifier::new());
        let faults = Rc::new(FaultLatch::new());
        let sink = Rc::new(RefCell::new(RecordingSink { events: Vec::new() }));
        let source = ScriptedSource {
            batches: vec![Err(DriverError::Unavailable)],
            cycle: 0,
        };

        let ex: LocalExecutor<'_, 8> = LocalExecutor::new();
        ex.spawn(run(
            source,
            bank,
            notify.clone(),
            faults.clone(),
            sink,
            Duration::from_millis(5),
        ))
        .detach();
        block_on(ex.run(Timer::after(Duration::from_millis(20))));

        assert_eq!(faults.take(), Some(DriverError::Unavailable.into()));
        assert!(notify.pending());
    }

    #[test]
    fn out_of_range_reading_is_isolated() {
        let bank = Rc::new(RefCell::new(SwitchBank::new(2).unwrap()));
        let notify = Rc::new(ChangeNotifier::new());
        let faults = Rc::new(FaultLatch::new());
        let sink = Rc::new(RefCell::new(RecordingSink { events: Vec::new() }));
        let source = ScriptedSource {
            batches: vec![batch(&[(7, true), (1, true)]), Err(DriverError::Unavailable)],
            cycle: 0,
        };

        let ex: LocalExecutor<'_, 8> = LocalExecutor::new();
        ex.spawn(run(
            source,
            bank.clone(),
            notify.clone(),
            faults.clone(),
            sink,
            Duration::from_millis(100),
        ))
        .detach();
        block_on(ex.run(Timer::after(Duration::from_millis(20))));

        // The in-range reading still landed.
        assert!(bank.borrow().get_state(1).unwrap());
        assert!(notify.pending());
        assert_eq!(faults.take(), None);
    }
}
