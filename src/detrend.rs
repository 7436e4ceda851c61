//! Online and batch detrending
//!
//! [`RlsDetrender`] maintains a continuously-adapting linear model of a
//! signal versus time via recursive least squares with exponential
//! forgetting; its state persists across calls, which is what lets it track
//! slow drift instead of refitting from scratch every frame.
//! [`PolynomialDetrender`] is the stateless batch alternative.

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::KinError;

/// Initial covariance scale: large multiple of identity, low initial
/// confidence in the all-zero parameter vector.
const INITIAL_COVARIANCE: f64 = 1000.0;

/// Adaptation state of one RLS detrender: the fitted line `y = slope*t +
/// intercept` and the parameter covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct RlsState {
    /// Parameter vector `[slope, intercept]`.
    pub theta: Vector2<f64>,
    /// 2x2 parameter covariance; stays symmetric positive semi-definite
    /// under the forgetting-factor update.
    pub p: Matrix2<f64>,
}

impl RlsState {
    fn initial() -> Self {
        Self {
            theta: Vector2::zeros(),
            p: Matrix2::identity() * INITIAL_COVARIANCE,
        }
    }
}

impl Default for RlsState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Recursive least-squares linear detrender with exponential forgetting.
///
/// The forgetting factor is fixed at construction; build a new detrender to
/// change it.
#[derive(Debug, Clone)]
pub struct RlsDetrender {
    q: f64,
    state: RlsState,
}

impl RlsDetrender {
    /// Creates a detrender with forgetting factor `q` in (0, 1]. Values
    /// closer to 1 discount past observations more slowly.
    pub fn new(q: f64) -> Result<Self, KinError> {
        if !q.is_finite() || q <= 0.0 || q > 1.0 {
            return Err(KinError::InvalidParameter(format!(
                "forgetting factor must lie in (0, 1], got {q}"
            )));
        }
        Ok(Self {
            q,
            state: RlsState::initial(),
        })
    }

    pub fn forgetting_factor(&self) -> f64 {
        self.q
    }

    pub fn state(&self) -> &RlsState {
        &self.state
    }

    /// Restores `theta = [0, 0]`, `P = 1000 * I`.
    pub fn reset(&mut self) {
        self.state = RlsState::initial();
        log::debug!("RLS detrender reset");
    }

    /// Feeds `batch` through the recursion sample by sample, then subtracts
    /// the trend evaluated with the final parameters over all of
    /// `time_values`. Returns `(detrended, trend)`.
    ///
    /// The reported trend for early samples uses parameters updated by later
    /// samples in the same batch; the internal adaptation itself is strictly
    /// causal. State carries over to the next call.
    pub fn update_and_detrend(
        &mut self,
        batch: &[f64],
        time_values: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), KinError> {
        if batch.len() != time_values.len() {
            return Err(KinError::LengthMismatch {
                context: "detrend time vector",
                expected: batch.len(),
                got: time_values.len(),
            });
        }

        for (&y, &t) in batch.iter().zip(time_values) {
            let phi = Vector2::new(t, 1.0);

            let y_pred = self.state.theta.dot(&phi);
            let e = y - y_pred;

            let p_phi = self.state.p * phi;
            let denom = self.q + phi.dot(&p_phi);
            if denom == 0.0 {
                // Degenerate gain denominator: zero gain, so theta is left
                // untouched and the covariance update reduces to the
                // forgetting division.
                log::debug!("RLS gain denominator is zero; using zero gain");
                self.state.p /= self.q;
                continue;
            }
            let k = p_phi / denom;

            self.state.theta += k * e;
            self.state.p = (self.state.p - k * (phi.transpose() * self.state.p)) / self.q;
        }

        let trend: Vec<f64> = time_values
            .iter()
            .map(|&t| self.state.theta.dot(&Vector2::new(t, 1.0)))
            .collect();
        let detrended: Vec<f64> = batch.iter().zip(&trend).map(|(&y, &tr)| y - tr).collect();

        Ok((detrended, trend))
    }
}

/// Stateless least-squares polynomial detrender of fixed degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolynomialDetrender {
    degree: usize,
}

impl PolynomialDetrender {
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Fits a polynomial of the configured degree to `(time_values, batch)`,
    /// evaluates it at `time_values` and subtracts. Returns
    /// `(detrended, trend)`. Needs at least `degree + 1` points.
    pub fn detrend(
        &self,
        batch: &[f64],
        time_values: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), KinError> {
        if batch.len() != time_values.len() {
            return Err(KinError::LengthMismatch {
                context: "detrend time vector",
                expected: batch.len(),
                got: time_values.len(),
            });
        }
        let n = batch.len();
        let terms = self.degree + 1;
        if n < terms {
            return Err(KinError::InvalidInput(format!(
                "polynomial fit of degree {} needs at least {terms} points, got {n}",
                self.degree
            )));
        }

        // Vandermonde normal equations: (A^T A) c = A^T y.
        let a = DMatrix::from_fn(n, terms, |i, j| time_values[i].powi(j as i32));
        let y = DVector::from_column_slice(batch);
        let ata = a.transpose() * &a;
        let aty = a.transpose() * y;

        let coeffs = ata.lu().solve(&aty).ok_or_else(|| {
            KinError::InvalidInput(
                "polynomial fit is degenerate for the given time values".to_string(),
            )
        })?;

        let trend: Vec<f64> = time_values
            .iter()
            .map(|&t| {
                coeffs
                    .iter()
                    .enumerate()
                    .map(|(j, &c)| c * t.powi(j as i32))
                    .sum()
            })
            .collect();
        let detrended: Vec<f64> = batch.iter().zip(&trend).map(|(&v, &tr)| v - tr).collect();

        Ok((detrended, trend))
    }
}

/// Detrending method selected at configuration time.
///
/// Tagged-variant dispatch resolved once at construction, not a per-call
/// string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DetrendMethod {
    /// Pass data through with an all-zero trend.
    None,
    /// Recursive least squares with forgetting factor `q`.
    Rls { q: f64 },
    /// Batch least-squares polynomial of the given degree.
    Polynomial { degree: usize },
}

/// A built detrender, dispatched by variant.
#[derive(Debug, Clone)]
pub enum Detrender {
    None,
    Rls(RlsDetrender),
    Polynomial(PolynomialDetrender),
}

impl DetrendMethod {
    pub fn build(self) -> Result<Detrender, KinError> {
        match self {
            DetrendMethod::None => Ok(Detrender::None),
            DetrendMethod::Rls { q } => Ok(Detrender::Rls(RlsDetrender::new(q)?)),
            DetrendMethod::Polynomial { degree } => {
                Ok(Detrender::Polynomial(PolynomialDetrender::new(degree)))
            }
        }
    }
}

impl Detrender {
    pub fn detrend(
        &mut self,
        batch: &[f64],
        time_values: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), KinError> {
        match self {
            Detrender::None => {
                if batch.len() != time_values.len() {
                    return Err(KinError::LengthMismatch {
                        context: "detrend time vector",
                        expected: batch.len(),
                        got: time_values.len(),
                    });
                }
                Ok((batch.to_vec(), vec![0.0; batch.len()]))
            }
            Detrender::Rls(rls) => rls.update_and_detrend(batch, time_values),
            Detrender::Polynomial(poly) => poly.detrend(batch, time_values),
        }
    }

    /// Clears adaptive state; a no-op for the stateless variants.
    pub fn reset(&mut self) {
        if let Detrender::Rls(rls) = self {
            rls.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_axis(n: usize, dt: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    #[test]
    fn test_forgetting_factor_domain() {
        assert!(RlsDetrender::new(0.9825).is_ok());
        assert!(RlsDetrender::new(1.0).is_ok());
        assert!(RlsDetrender::new(0.0).is_err());
        assert!(RlsDetrender::new(1.5).is_err());
        assert!(RlsDetrender::new(-0.5).is_err());
        assert!(RlsDetrender::new(f64::NAN).is_err());
    }

    #[test]
    fn test_initial_state() {
        let det = RlsDetrender::new(0.98).unwrap();
        assert_eq!(det.state().theta, Vector2::zeros());
        assert_eq!(det.state().p, Matrix2::identity() * 1000.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut det = RlsDetrender::new(0.98).unwrap();
        let err = det.update_and_detrend(&[1.0, 2.0], &[0.0]).unwrap_err();
        assert!(matches!(err, KinError::LengthMismatch { .. }));
    }

    #[test]
    fn test_rls_converges_on_exact_line() {
        let mut det = RlsDetrender::new(0.98).unwrap();
        let (a, b) = (2.0, -1.0);
        let t = time_axis(200, 0.01);
        let y: Vec<f64> = t.iter().map(|&ti| a * ti + b).collect();

        let mut detrended = Vec::new();
        for chunk in 0..10 {
            let lo = chunk * 20;
            let (d, _) = det
                .update_and_detrend(&y[lo..lo + 20], &t[lo..lo + 20])
                .unwrap();
            detrended = d;
        }

        // Convergence from P = 1000*I is asymptotic: after 200 samples the
        // parameters sit within ~1e-5 of the true line.
        let theta = det.state().theta;
        assert!((theta[0] - a).abs() < 1e-4, "slope {}", theta[0]);
        assert!((theta[1] - b).abs() < 1e-4, "intercept {}", theta[1]);
        for v in detrended {
            assert!(v.abs() < 1e-4);
        }
    }

    #[test]
    fn test_rls_trend_uses_final_theta() {
        // On a step-free line the batch trend must match the line at every
        // index once converged, including the earliest samples of the batch.
        let mut det = RlsDetrender::new(1.0).unwrap();
        let t = time_axis(100, 0.01);
        let y: Vec<f64> = t.iter().map(|&ti| 3.0 * ti + 0.5).collect();
        let (_, trend) = det.update_and_detrend(&y, &t).unwrap();
        // After one 100-sample batch the fit is within ~2e-4 of the line,
        // at the early indices too.
        assert!((trend[0] - y[0]).abs() < 1e-3);
        assert!((trend[99] - y[99]).abs() < 1e-3);
    }

    #[test]
    fn test_rls_state_persists_across_calls() {
        let mut det = RlsDetrender::new(0.98).unwrap();
        let t = time_axis(20, 0.01);
        let y: Vec<f64> = t.iter().map(|&ti| 5.0 * ti).collect();

        det.update_and_detrend(&y, &t).unwrap();
        let theta_after_first = det.state().theta;
        det.update_and_detrend(&y, &t).unwrap();
        assert_ne!(det.state().theta, theta_after_first);
    }

    #[test]
    fn test_rls_reset_restores_initial_state() {
        let mut det = RlsDetrender::new(0.98).unwrap();
        let t = time_axis(20, 0.01);
        let y = vec![1.0; 20];
        det.update_and_detrend(&y, &t).unwrap();
        det.reset();
        assert_eq!(det.state(), &RlsState::initial());
    }

    #[test]
    fn test_rls_covariance_stays_symmetric() {
        let mut det = RlsDetrender::new(0.95).unwrap();
        let t = time_axis(50, 0.01);
        let y: Vec<f64> = t.iter().map(|&ti| (ti * 40.0).sin()).collect();
        det.update_and_detrend(&y, &t).unwrap();
        let p = det.state().p;
        assert!((p[(0, 1)] - p[(1, 0)]).abs() < 1e-9);
    }

    #[test]
    fn test_polynomial_removes_quadratic_trend() {
        let poly = PolynomialDetrender::new(2);
        let t = time_axis(50, 0.02);
        let y: Vec<f64> = t.iter().map(|&ti| 1.5 * ti * ti - 0.3 * ti + 2.0).collect();
        let (detrended, trend) = poly.detrend(&y, &t).unwrap();
        for (d, (v, tr)) in detrended.iter().zip(y.iter().zip(&trend)) {
            assert!(d.abs() < 1e-9);
            assert!((v - tr).abs() < 1e-9);
        }
    }

    #[test]
    fn test_polynomial_is_stateless() {
        let poly = PolynomialDetrender::new(1);
        let t = time_axis(10, 0.1);
        let y: Vec<f64> = t.iter().map(|&ti| 2.0 * ti).collect();
        let first = poly.detrend(&y, &t).unwrap();
        let second = poly.detrend(&y, &t).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_polynomial_needs_enough_points() {
        let poly = PolynomialDetrender::new(3);
        let t = time_axis(3, 0.1);
        let y = vec![1.0; 3];
        assert!(matches!(
            poly.detrend(&y, &t),
            Err(KinError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_polynomial_degenerate_time_axis() {
        let poly = PolynomialDetrender::new(1);
        // All abscissae identical: the fit has no unique solution.
        let t = vec![0.5; 4];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert!(poly.detrend(&y, &t).is_err());
    }

    #[test]
    fn test_method_factory() {
        assert!(matches!(
            DetrendMethod::Rls { q: 0.98 }.build(),
            Ok(Detrender::Rls(_))
        ));
        assert!(DetrendMethod::Rls { q: 2.0 }.build().is_err());
        assert!(matches!(
            DetrendMethod::Polynomial { degree: 2 }.build(),
            Ok(Detrender::Polynomial(_))
        ));

        let mut none = DetrendMethod::None.build().unwrap();
        let (d, trend) = none.detrend(&[1.0, 2.0], &[0.0, 0.1]).unwrap();
        assert_eq!(d, vec![1.0, 2.0]);
        assert_eq!(trend, vec![0.0, 0.0]);
    }
}
