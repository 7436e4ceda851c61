//! Cumulative numerical integration
//!
//! All rules share the convention `out[0] = 0`: an integrator produces the
//! running integral relative to the start of its input. Carrying continuity
//! across frame boundaries is the caller's job (the pipeline adds the
//! previous frame's final value as an offset).

use serde::{Deserialize, Serialize};

use crate::KinError;

/// Quadrature rule, selected once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadratureRule {
    /// `out[i] = out[i-1] + x[i] * dt`
    Rectangular,
    /// `out[i] = out[i-1] + (x[i-1] + x[i]) * dt / 2`
    Trapezoidal,
    /// Composite Simpson over pairs of intervals; an odd interval count
    /// falls back to the trapezoid rule for the final interval.
    Simpson,
}

/// Cumulative integrator with a fixed time step.
#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    rule: QuadratureRule,
    dt: f64,
}

impl Integrator {
    pub fn new(rule: QuadratureRule, dt: f64) -> Result<Self, KinError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(KinError::InvalidParameter(format!(
                "time step dt must be positive and finite, got {dt}"
            )));
        }
        Ok(Self { rule, dt })
    }

    pub fn rule(&self) -> QuadratureRule {
        self.rule
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Cumulative integral of `samples`; `out[0] = 0`, `out[i]` approximates
    /// the integral from sample 0 to sample i. Empty input yields empty
    /// output.
    pub fn integrate(&self, samples: &[f64]) -> Vec<f64> {
        match self.rule {
            QuadratureRule::Rectangular => self.rectangular(samples),
            QuadratureRule::Trapezoidal => self.trapezoidal(samples),
            QuadratureRule::Simpson => self.simpson(samples),
        }
    }

    fn rectangular(&self, samples: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; samples.len()];
        for i in 1..samples.len() {
            out[i] = out[i - 1] + samples[i] * self.dt;
        }
        out
    }

    fn trapezoidal(&self, samples: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; samples.len()];
        for i in 1..samples.len() {
            out[i] = out[i - 1] + (samples[i - 1] + samples[i]) * self.dt / 2.0;
        }
        out
    }

    fn simpson(&self, samples: &[f64]) -> Vec<f64> {
        let n = samples.len();
        let mut out = vec![0.0; n];
        if n < 2 {
            return out;
        }

        // Simpson needs pairs of intervals: fill out[i+1] from out[i-1]
        // for odd i, then interpolate the skipped midpoints with a
        // trapezoid step so the output stays strictly cumulative.
        let mut i = 1;
        while i + 1 < n {
            out[i + 1] = out[i - 1]
                + (samples[i - 1] + 4.0 * samples[i] + samples[i + 1]) * self.dt / 3.0;
            out[i] = out[i - 1] + (samples[i - 1] + samples[i]) * self.dt / 2.0;
            i += 2;
        }

        if n % 2 == 0 {
            log::debug!(
                "Simpson rule over {} samples leaves an unmatched interval; \
                 using trapezoid rule for the final step",
                n
            );
            out[n - 1] = out[n - 2] + (samples[n - 2] + samples[n - 1]) * self.dt / 2.0;
        }

        out
    }
}
