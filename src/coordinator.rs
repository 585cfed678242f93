//! System coordinator: wires switches to servos and runs the control loop.
//!
//! Two-phase lifecycle.  **Build** turns a validated [`SystemConfig`] into
//! the switch bank, one actuator per servo, and the binding table.
//! **Run** first performs one direct startup scan so every servo is driven
//! to a known position (a power cycle leaves horns wherever they were),
//! then spawns the poll scheduler and waits on the change notification,
//! dispatching superseding motion tasks for every binding whose switch
//! changed.  The coordinator never blocks on a motion finishing.
//!
//! The loop is infinite; it returns only when a background task latches a
//! fatal driver error.

use core::cell::RefCell;
use std::rc::Rc;

use edge_executor::LocalExecutor;
use embassy_time::Duration;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, PwmPort};
use crate::config::{MAX_BINDINGS, MAX_SERVOS, SystemConfig};
use crate::drivers::status_led::{self, StatusLed};
use crate::error::{Error, Result};
use crate::notify::{ChangeNotifier, FaultLatch};
use crate::pins;
use crate::servo::motion::Motion;
use crate::servo::{Demand, ServoActuator, ServoSpec};
use crate::switch::SwitchBank;
use crate::switch::poller;
use crate::switch::source::SwitchSource;

/// Executor slots: poller + heartbeat + one motion per servo, with room
/// for superseded tasks that have not unwound yet.
pub const EXECUTOR_CAPACITY: usize = 48;

/// One switch→servo wire, with the sense inversion and the last state
/// this binding was dispatched for.
struct SwitchServoBinding {
    switch: usize,
    servo: usize,
    invert: bool,
    last: Option<bool>,
}

/// The assembled system.
pub struct System<S, P, E>
where
    S: SwitchSource + 'static,
    P: PwmPort + 'static,
    E: EventSink + 'static,
{
    source: Option<S>,
    bank: Rc<RefCell<SwitchBank>>,
    bindings: heapless::Vec<SwitchServoBinding, MAX_BINDINGS>,
    motions: heapless::Vec<Motion<P>, MAX_SERVOS>,
    notify: Rc<ChangeNotifier>,
    faults: Rc<FaultLatch>,
    sink: Rc<RefCell<E>>,
    poll_interval: Duration,
    heartbeat: bool,
}

impl<S, P, E> System<S, P, E>
where
    S: SwitchSource + 'static,
    P: PwmPort + 'static,
    E: EventSink + 'static,
{
    /// Build the system from a validated configuration.
    pub fn build(
        config: &SystemConfig,
        source: S,
        pwm: Rc<RefCell<P>>,
        sink: E,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let bank = Rc::new(RefCell::new(SwitchBank::new(
            config.virtual_switches as usize,
        )?));
        let notify = Rc::new(ChangeNotifier::new());
        let faults = Rc::new(FaultLatch::new());

        let step_period = Duration::from_millis(u64::from(config.step_period_ms));
        let rest_settle = config
            .rest_after_transit
            .then(|| Duration::from_millis(u64::from(config.rest_settle_ms)));

        let mut motions = heapless::Vec::new();
        for servo_cfg in &config.servos {
            let actuator = Rc::new(RefCell::new(ServoActuator::new(
                ServoSpec::from_config(servo_cfg),
                pwm.clone(),
            )));
            motions
                .push(Motion::new(
                    actuator,
                    step_period,
                    rest_settle,
                    faults.clone(),
                    notify.clone(),
                ))
                .ok()
                .ok_or(Error::Config("too many servos"))?;
        }

        let mut bindings = heapless::Vec::new();
        for b in &config.bindings {
            bindings
                .push(SwitchServoBinding {
                    switch: b.switch as usize,
                    servo: b.servo as usize,
                    invert: b.invert,
                    last: None,
                })
                .ok()
                .ok_or(Error::Config("too many bindings"))?;
        }

        Ok(Self {
            source: Some(source),
            bank,
            bindings,
            motions,
            notify: notify.clone(),
            faults,
            sink: Rc::new(RefCell::new(sink)),
            poll_interval: Duration::from_millis(u64::from(config.poll_interval_ms)),
            heartbeat: config.heartbeat,
        })
    }

    /// Commanded duty of one servo (test/diagnostic hook).
    pub fn actuator_duty(&self, servo: usize) -> Option<u16> {
        self.motions.get(servo).map(|m| m.actuator().borrow().duty())
    }

    /// One direct scan plus immediate positioning of every bound servo.
    ///
    /// Runs before the poll scheduler exists, so the physical position is
    /// known before any motion logic starts.
    async fn startup(&mut self) -> Result<()> {
        let source = self
            .source
            .as_mut()
            .ok_or(Error::Init("input source already consumed"))?;
        let batch = source.scan().await.map_err(Error::from)?;
        {
            let mut bank = self.bank.borrow_mut();
            for reading in &batch {
                if let Err(e) = bank.set_state(reading.index, reading.value) {
                    warn!("startup: {e}, reading dropped");
                }
            }
        }

        for binding in &mut self.bindings {
            let state = self.bank.borrow().get_state(binding.switch)?;
            let demand = Demand::from_state(state != binding.invert);
            self.motions[binding.servo]
                .set_immediate(demand, true)
                .map_err(Error::from)?;
            binding.last = Some(state);
            let duty = self.motions[binding.servo].actuator().borrow().duty();
            self.sink.borrow_mut().emit(&AppEvent::StartupPosition {
                servo: binding.servo,
                duty,
            });
        }

        self.sink.borrow_mut().emit(&AppEvent::Started {
            switches: self.bank.borrow().len(),
            servos: self.motions.len(),
        });
        Ok(())
    }

    /// Drive the whole system on its own executor.  Returns only on a
    /// fatal error.
    pub fn run(mut self) -> Result<()> {
        let ex: LocalExecutor<'_, EXECUTOR_CAPACITY> = LocalExecutor::new();
        futures_lite::future::block_on(ex.run(self.run_on(&ex)))
    }

    /// Startup, background tasks, and the dispatch loop, on a caller-owned
    /// executor.
    pub async fn run_on<const C: usize>(&mut self, ex: &LocalExecutor<'_, C>) -> Result<()> {
        self.startup().await?;

        let source = self
            .source
            .take()
            .ok_or(Error::Init("input source already consumed"))?;
        self.sink.borrow_mut().emit(&AppEvent::PollerStarted {
            interval_ms: self.poll_interval.as_millis() as u32,
        });
        ex.spawn(poller::run(
            source,
            self.bank.clone(),
            self.notify.clone(),
            self.faults.clone(),
            self.sink.clone(),
            self.poll_interval,
        ))
        .detach();

        if self.heartbeat {
            ex.spawn(status_led::heartbeat(StatusLed::new(
                pins::HEARTBEAT_LED_GPIO,
            )))
            .detach();
        }

        info!(
            "coordinator: running ({} switches, {} servos, {} bindings)",
            self.bank.borrow().len(),
            self.motions.len(),
            self.bindings.len()
        );

        loop {
            self.notify.wait().await;
            if let Some(e) = self.faults.take() {
                return Err(e);
            }

            // Collect first: the bank borrow must not outlive dispatching.
            let mut due: heapless::Vec<(usize, Demand), MAX_BINDINGS> = heapless::Vec::new();
            {
                let bank = self.bank.borrow();
                for binding in &mut self.bindings {
                    let state = match bank.get_state(binding.switch) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("dispatch: {e}, binding skipped");
                            continue;
                        }
                    };
                    if binding.last != Some(state) {
                        binding.last = Some(state);
                        due.push((binding.servo, Demand::from_state(state != binding.invert)))
                            .ok();
                    }
                }
            }

            for (servo, target) in due {
                self.sink
                    .borrow_mut()
                    .emit(&AppEvent::MotionDispatched { servo, target });
                self.motions[servo].dispatch(ex, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindingConfig;
    use crate::error::DriverError;
    use crate::switch::source::NetworkSource;

    struct NullPwm;
    impl PwmPort for NullPwm {
        fn write_duty(&mut self, _channel: u8, _duty: u16) -> core::result::Result<(), DriverError> {
            Ok(())
        }
    }

    struct NullSink;
    impl EventSink for NullSink {
        fn emit(&mut self, _event: &AppEvent) {}
    }

    fn network_config() -> SystemConfig {
        let mut c = SystemConfig::default();
        c.input = crate::config::InputMode::Network;
        c.credentials = Some(crate::config::NetworkCredentials {
            ssid: heapless::String::try_from("layout").unwrap(),
            passphrase: heapless::String::try_from("pointwork").unwrap(),
            country: heapless::String::try_from("GB").unwrap(),
        });
        c
    }

    #[test]
    fn build_rejects_double_bound_servo() {
        let mut config = network_config();
        config
            .bindings
            .push(BindingConfig { switch: 1, servo: 0, invert: false })
            .unwrap();
        let pwm = Rc::new(RefCell::new(NullPwm));
        let err = System::build(&config, NetworkSource::new(), pwm, NullSink)
            .err()
            .unwrap();
        assert_eq!(err, Error::Config("servo is bound to more than one switch"));
    }

    #[test]
    fn build_sizes_bank_to_switch_count() {
        let config = network_config();
        let pwm = Rc::new(RefCell::new(NullPwm));
        let sys = System::build(&config, NetworkSource::new(), pwm, NullSink).unwrap();
        assert_eq!(sys.bank.borrow().len(), 3);
        assert_eq!(sys.motions.len(), 4);
        assert_eq!(sys.bindings.len(), 4);
    }
}
