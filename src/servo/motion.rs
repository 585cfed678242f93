//! Timed linear motion with cancellation-on-supersede.
//!
//! A motion task interpolates an actuator's duty from its current value to
//! the value implied by the target demand, one driver write per step, one
//! timer suspension between steps.  Dispatching a new target while a motion
//! is in flight supersedes it: the old task's cancel flag is set and the
//! new interpolation starts from the *current* (possibly mid-transit) duty,
//! so the horn never jumps.
//!
//! Cancellation is cooperative and explicit: the flag is checked after
//! every suspension point, before the next driver write, so a superseded
//! task never writes again once its successor has been dispatched.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use edge_executor::LocalExecutor;
use embassy_time::{Duration, Timer};
use log::debug;

use crate::app::ports::PwmPort;
use crate::error::DriverError;
use crate::notify::{ChangeNotifier, FaultLatch};
use crate::servo::{Demand, ServoActuator};

/// Shared stop request for one in-flight motion.
#[derive(Clone)]
pub struct CancelFlag {
    flag: Rc<Cell<bool>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self { flag: Rc::new(Cell::new(false)) }
    }

    pub fn cancel(&self) {
        self.flag.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }
}

/// Per-actuator motion dispatcher enforcing the one-live-motion rule.
pub struct Motion<P: PwmPort> {
    actuator: Rc<RefCell<ServoActuator<P>>>,
    step_period: Duration,
    /// When set, a completed transit holds this long and then de-energizes.
    rest_settle: Option<Duration>,
    faults: Rc<FaultLatch>,
    notify: Rc<ChangeNotifier>,
    active: Option<CancelFlag>,
}

impl<P: PwmPort + 'static> Motion<P> {
    pub fn new(
        actuator: Rc<RefCell<ServoActuator<P>>>,
        step_period: Duration,
        rest_settle: Option<Duration>,
        faults: Rc<FaultLatch>,
        notify: Rc<ChangeNotifier>,
    ) -> Self {
        Self {
            actuator,
            step_period,
            rest_settle,
            faults,
            notify,
            active: None,
        }
    }

    /// Direct positioning without motion (startup).
    pub fn set_immediate(&mut self, demand: Demand, constrain: bool) -> Result<(), DriverError> {
        self.actuator.borrow_mut().set_immediate(demand, constrain)
    }

    pub fn actuator(&self) -> &Rc<RefCell<ServoActuator<P>>> {
        &self.actuator
    }

    /// Start a linear motion toward `target`, superseding any motion still
    /// in flight on this actuator.
    ///
    /// Re-dispatching the target the actuator already rests at (or is
    /// already moving toward) is a no-op — no driver writes.
    pub fn dispatch<'a, const C: usize>(&mut self, ex: &LocalExecutor<'a, C>, target: Demand) {
        let (current_target, at_end) = {
            let act = self.actuator.borrow();
            (act.target(), act.duty() == act.spec().duty_for(target))
        };
        if current_target == Some(target) {
            if at_end {
                return;
            }
            if self.active.as_ref().is_some_and(|c| !c.is_cancelled()) {
                return;
            }
        }

        if let Some(prev) = self.active.take() {
            // The loser observes the flag at its next suspension point,
            // before its next driver write.
            prev.cancel();
        }

        self.actuator.borrow_mut().set_target(target);
        let cancel = CancelFlag::new();
        ex.spawn(run(
            self.actuator.clone(),
            target,
            self.step_period,
            self.rest_settle,
            cancel.clone(),
            self.faults.clone(),
            self.notify.clone(),
        ))
        .detach();
        self.active = Some(cancel);
    }
}

/// The motion task body.
///
/// A driver write failure is fatal: it is latched and the notifier raised
/// so the coordinator's run loop terminates.
async fn run<P: PwmPort>(
    actuator: Rc<RefCell<ServoActuator<P>>>,
    target: Demand,
    step_period: Duration,
    rest_settle: Option<Duration>,
    cancel: CancelFlag,
    faults: Rc<FaultLatch>,
    notify: Rc<ChangeNotifier>,
) {
    let (channel, start, end, steps) = {
        let act = actuator.borrow();
        let spec = act.spec();
        (spec.channel, act.duty(), spec.duty_for(target), spec.steps(step_period))
    };
    if start == end {
        return;
    }

    let inc = (f32::from(end) - f32::from(start)) / steps as f32;
    for k in 1..=steps {
        if cancel.is_cancelled() {
            debug!("servo {channel}: motion superseded at duty {}", actuator.borrow().duty());
            return;
        }
        // Final step lands exactly on the target; intermediate steps are
        // computed from the start value to avoid accumulating drift.
        let duty = if k == steps {
            end
        } else {
            inc.mul_add(k as f32, f32::from(start)).round() as u16
        };
        let written = actuator.borrow_mut().write(duty);
        if let Err(e) = written {
            faults.latch(e.into());
            notify.raise();
            return;
        }
        Timer::after(step_period).await;
    }
    debug!("servo {channel}: transit complete at duty {end}");

    if let Some(settle) = rest_settle {
        Timer::after(settle).await;
        if cancel.is_cancelled() {
            return;
        }
        let rested = actuator.borrow_mut().rest_output();
        if let Err(e) = rested {
            faults.latch(e.into());
            notify.raise();
        }
    }
}
