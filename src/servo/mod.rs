//! Servo actuation: calibration, demand→duty mapping, and the linear
//! motion tasks that move a servo over its transit time.
//!
//! Each physical servo is one [`ServoActuator`] owning one LEDC channel.
//! Demands are logical — off, on, or a proportional level — and are mapped
//! onto the calibrated duty pair.  The calibration is order-free:
//! `off_duty` greater than `on_duty` reverses the direction of travel.

pub mod motion;

use core::cell::RefCell;
use std::rc::Rc;

use embassy_time::Duration;

use crate::app::ports::PwmPort;
use crate::config::ServoConfig;
use crate::error::DriverError;

/// Logical demand for a servo position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Demand {
    Off,
    On,
    /// Proportional position between the calibrated endpoints.
    Level(f32),
}

impl Demand {
    pub fn from_state(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    /// Normalized position: 0 is the off calibration, 1 the on calibration.
    /// `Level` is deliberately not clamped here — constraining is the duty
    /// mapping's decision.
    pub fn level(self) -> f32 {
        match self {
            Self::Off => 0.0,
            Self::On => 1.0,
            Self::Level(x) => x,
        }
    }
}

/// Immutable per-servo calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoSpec {
    pub channel: u8,
    pub off_duty: u16,
    pub on_duty: u16,
    pub transit: Duration,
}

impl ServoSpec {
    pub fn from_config(cfg: &ServoConfig) -> Self {
        Self {
            channel: cfg.channel,
            off_duty: cfg.off_duty,
            on_duty: cfg.on_duty,
            transit: Duration::from_millis(u64::from(cfg.transit_ms)),
        }
    }

    /// Calibrated interval as (lower, upper), independent of travel
    /// direction.
    pub fn bounds(&self) -> (u16, u16) {
        if self.off_duty <= self.on_duty {
            (self.off_duty, self.on_duty)
        } else {
            (self.on_duty, self.off_duty)
        }
    }

    fn map(&self, level: f32) -> f32 {
        let off = f32::from(self.off_duty);
        let on = f32::from(self.on_duty);
        (on - off).mul_add(level, off)
    }

    /// Demand→duty with the result constrained to the calibrated interval.
    pub fn duty_for(&self, demand: Demand) -> u16 {
        let (lo, hi) = self.bounds();
        let duty = self.map(demand.level()).round();
        duty.clamp(f32::from(lo), f32::from(hi)) as u16
    }

    /// Demand→duty without constraining to the calibration — the caller
    /// takes responsibility for over-travel.  Saturates at the register
    /// range.
    pub fn duty_for_unconstrained(&self, demand: Demand) -> u16 {
        let duty = self.map(demand.level()).round();
        duty.clamp(0.0, f32::from(u16::MAX)) as u16
    }

    /// Number of interpolation steps a full transit takes at the given
    /// scheduling granularity.  Never zero.
    pub fn steps(&self, step_period: Duration) -> u32 {
        let step_ms = step_period.as_millis().max(1);
        (self.transit.as_millis() / step_ms).max(1) as u32
    }
}

/// One servo output: calibration plus the current commanded duty and the
/// last commanded motion target.
///
/// Shared as `Rc<RefCell<..>>` between the coordinator and the motion task
/// currently driving it; the supersede rule in [`motion`] guarantees at
/// most one live writer.
pub struct ServoActuator<P: PwmPort> {
    spec: ServoSpec,
    pwm: Rc<RefCell<P>>,
    duty: u16,
    target: Option<Demand>,
}

impl<P: PwmPort> ServoActuator<P> {
    /// The position at power-on is whatever the previous power cycle left;
    /// `duty` stays meaningless until the startup scan calls
    /// [`set_immediate`](Self::set_immediate).
    pub fn new(spec: ServoSpec, pwm: Rc<RefCell<P>>) -> Self {
        Self { spec, pwm, duty: 0, target: None }
    }

    /// Map a demand to a duty value and write it to the driver in one go.
    /// Exactly one driver write, no motion.
    pub fn set_immediate(&mut self, demand: Demand, constrain: bool) -> Result<(), DriverError> {
        let duty = if constrain {
            self.spec.duty_for(demand)
        } else {
            self.spec.duty_for_unconstrained(demand)
        };
        self.write(duty)?;
        self.target = Some(demand);
        Ok(())
    }

    /// Single driver write, recording the commanded duty.
    pub(crate) fn write(&mut self, duty: u16) -> Result<(), DriverError> {
        self.pwm.borrow_mut().write_duty(self.spec.channel, duty)?;
        self.duty = duty;
        Ok(())
    }

    /// Zero the PWM pulse to de-energize the servo.  The commanded duty is
    /// retained — the horn holds its position mechanically.
    pub(crate) fn rest_output(&mut self) -> Result<(), DriverError> {
        self.pwm.borrow_mut().write_duty(self.spec.channel, 0)
    }

    pub(crate) fn set_target(&mut self, target: Demand) {
        self.target = Some(target);
    }

    pub fn duty(&self) -> u16 {
        self.duty
    }

    pub fn target(&self) -> Option<Demand> {
        self.target
    }

    pub fn spec(&self) -> &ServoSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(off: u16, on: u16) -> ServoSpec {
        ServoSpec {
            channel: 0,
            off_duty: off,
            on_duty: on,
            transit: Duration::from_millis(1000),
        }
    }

    struct RecordingPwm {
        writes: Vec<(u8, u16)>,
    }

    impl PwmPort for RecordingPwm {
        fn write_duty(&mut self, channel: u8, duty: u16) -> Result<(), DriverError> {
            self.writes.push((channel, duty));
            Ok(())
        }
    }

    #[test]
    fn half_demand_maps_to_midpoint() {
        assert_eq!(spec(1000, 2000).duty_for(Demand::Level(0.5)), 1500);
    }

    #[test]
    fn endpoint_demands_map_to_calibration() {
        let s = spec(1000, 2000);
        assert_eq!(s.duty_for(Demand::Off), 1000);
        assert_eq!(s.duty_for(Demand::On), 2000);
    }

    #[test]
    fn reversed_calibration_maps_and_clamps() {
        // off numerically above on: travel is reversed, bounds still hold.
        let s = spec(2000, 1000);
        assert_eq!(s.duty_for(Demand::Off), 2000);
        assert_eq!(s.duty_for(Demand::On), 1000);
        assert_eq!(s.duty_for(Demand::Level(1.5)), 1000);
        assert_eq!(s.duty_for(Demand::Level(-0.5)), 2000);
    }

    #[test]
    fn over_travel_is_clamped_only_when_constrained() {
        let s = spec(1000, 2000);
        assert_eq!(s.duty_for(Demand::Level(2.0)), 2000);
        assert_eq!(s.duty_for_unconstrained(Demand::Level(2.0)), 3000);
    }

    #[test]
    fn step_count_floors_at_one() {
        let mut s = spec(1000, 2000);
        assert_eq!(s.steps(Duration::from_millis(100)), 10);
        s.transit = Duration::from_millis(5);
        assert_eq!(s.steps(Duration::from_millis(100)), 1);
    }

    #[test]
    fn set_immediate_is_one_write() {
        let pwm = Rc::new(RefCell::new(RecordingPwm { writes: Vec::new() }));
        let mut act = ServoActuator::new(spec(1000, 2000), pwm.clone());
        act.set_immediate(Demand::On, true).unwrap();
        assert_eq!(pwm.borrow().writes, vec![(0, 2000)]);
        assert_eq!(act.duty(), 2000);
        assert_eq!(act.target(), Some(Demand::On));
    }
}
