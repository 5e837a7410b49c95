//! Single-axis PID with integral clamping and derivative on measurement.

use serde::Deserialize;

use crate::error::{CtlError, CtlResult};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// NaN is treated as 0 before clamping. Never panics, unlike `f64::clamp`, even if
    /// the bounds are inverted.
    pub fn clamp(&self, v: f64) -> f64 {
        let v = if v.is_nan() { 0.0 } else { v };
        v.max(self.min).min(self.max)
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Terms of the last update, kept for tuning and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub output: f64,
}

#[derive(Debug, Clone)]
pub struct Pid {
    gains: Gains,
    setpoint: f64,
    output_limits: Bounds,
    integral_limits: Bounds,

    integral: f64,
    prev_meas: Option<f64>,
    last: PidTerms,
}

impl Pid {
    pub fn new(
        gains: Gains,
        setpoint: f64,
        output_limits: Bounds,
        integral_limits: Bounds,
    ) -> Self {
        Self {
            gains,
            setpoint,
            output_limits,
            integral_limits,
            integral: 0.0,
            prev_meas: None,
            last: PidTerms::default(),
        }
    }

    pub fn update(&mut self, measurement: f64, dt: f64) -> CtlResult<f64> {
        // also rejects NaN
        if !(dt > 0.0) {
            return Err(CtlError::InvalidDt(dt));
        }

        let error = self.setpoint - measurement;

        // accumulate first, then clamp, so a saturated integrator can unwind
        self.integral = self.integral_limits.clamp(self.integral + error * dt);

        let d = match self.prev_meas {
            Some(prev) => -(measurement - prev) / dt,
            None => 0.0,
        };
        self.prev_meas = Some(measurement);

        let p = self.gains.kp * error;
        let i = self.gains.ki * self.integral;
        let d = self.gains.kd * d;
        let output = self.output_limits.clamp(p + i + d);
        self.last = PidTerms { p, i, d, output };
        Ok(output)
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_meas = None;
        self.last = PidTerms::default();
    }

    /// Does not reset; callers reset on mode entry.
    pub fn set_setpoint(&mut self, sp: f64) {
        self.setpoint = sp;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn tune(&mut self, gains: Gains) {
        self.gains = gains;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn last_terms(&self) -> PidTerms {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(kp: f64, ki: f64, kd: f64) -> Pid {
        Pid::new(Gains { kp, ki, kd }, 10.0, Bounds::new(-100.0, 100.0), Bounds::new(-50.0, 50.0))
    }

    #[test]
    fn rejects_non_positive_dt() {
        let mut p = pid(1.0, 0.0, 0.0);
        assert_eq!(p.update(0.0, 0.0), Err(CtlError::InvalidDt(0.0)));
        assert!(p.update(0.0, -0.1).is_err());
        assert!(p.update(0.0, f64::NAN).is_err());
        // rejected calls leave no trace
        assert_eq!(p.integral(), 0.0);
    }

    #[test]
    fn proportional_only() {
        let mut p = pid(0.6, 0.0, 0.0);
        let u = p.update(4.0, 0.1).unwrap();
        assert!((u - 3.6).abs() < 1e-12);
    }

    #[test]
    fn integral_accumulates_then_clamps() {
        let mut p = Pid::new(
            Gains { kp: 0.0, ki: 1.0, kd: 0.0 },
            1.0,
            Bounds::new(-10.0, 10.0),
            Bounds::new(-0.25, 0.25),
        );
        p.update(0.0, 0.1).unwrap();
        assert!((p.integral() - 0.1).abs() < 1e-12);
        for _ in 0..10 {
            p.update(0.0, 0.1).unwrap();
        }
        assert_eq!(p.integral(), 0.25);

        // unwinds immediately once the error flips
        p.update(2.0, 0.1).unwrap();
        assert!((p.integral() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn derivative_on_measurement() {
        let mut p = pid(0.0, 0.0, 1.0);
        assert_eq!(p.update(0.0, 0.1).unwrap(), 0.0);
        // measurement rising 1 m per 0.1 s => derivative -10
        let u = p.update(1.0, 0.1).unwrap();
        assert!((u + 10.0).abs() < 1e-9);
    }

    #[test]
    fn no_kick_after_setpoint_change_and_reset() {
        let mut p = pid(0.5, 0.1, 2.0);
        p.update(3.0, 0.1).unwrap();
        p.update(3.5, 0.1).unwrap();
        p.set_setpoint(80.0);
        p.reset();
        p.update(3.5, 0.1).unwrap();
        assert_eq!(p.last_terms().d, 0.0);
    }

    #[test]
    fn setpoint_change_alone_keeps_integral() {
        let mut p = pid(0.0, 1.0, 0.0);
        p.update(0.0, 0.5).unwrap();
        let before = p.integral();
        p.set_setpoint(-3.0);
        assert_eq!(p.integral(), before);
    }

    #[test]
    fn stays_within_bounds() {
        let out = Bounds::new(-1.0, 1.0);
        let int = Bounds::new(-0.2, 0.2);
        let mut p = Pid::new(Gains { kp: 3.0, ki: 5.0, kd: 0.7 }, 0.0, out, int);
        let meas = [1e6, -1e6, 0.0, 42.0, -0.001, 1e-9, 17.5, -300.0];
        let dts = [0.001, 0.1, 2.0, 0.02];
        for (k, m) in meas.iter().cycle().take(200).enumerate() {
            let sp = (k as f64 * 7.3).sin() * 50.0;
            p.set_setpoint(sp);
            let u = p.update(*m, dts[k % dts.len()]).unwrap();
            assert!(out.contains(u), "output {} out of bounds", u);
            assert!(int.contains(p.integral()), "integral {} out of bounds", p.integral());
        }
    }

    #[test]
    fn nan_clamps_to_zero_or_nearest_bound() {
        assert_eq!(Bounds::new(-1.0, 1.0).clamp(f64::NAN), 0.0);
        assert_eq!(Bounds::new(0.2, 1.0).clamp(f64::NAN), 0.2);
        assert_eq!(Bounds::new(-1.0, 1.0).clamp(f64::INFINITY), 1.0);
    }

    #[test]
    fn nan_setpoint_gives_zero_output_and_clean_integral() {
        let mut p = pid(0.6, 0.2, 0.05);
        p.set_setpoint(f64::NAN);
        assert_eq!(p.update(3.0, 0.1).unwrap(), 0.0);
        assert_eq!(p.integral(), 0.0);

        // recovers once the setpoint is sane again
        p.set_setpoint(10.0);
        assert!(p.update(3.0, 0.1).unwrap() > 0.0);
    }

    #[test]
    fn converges_on_first_order_plant() {
        let mut p = pid(0.6, 0.2, 0.05);
        let mut x = 0.0;
        for _ in 0..400 {
            let u = p.update(x, 0.1).unwrap();
            x += 0.05 * u;
        }
        assert!((x - 10.0).abs() < 0.1, "x = {}", x);
    }
}
