//! kinest - Kinematic estimation from streaming acceleration
//!
//! Turns a noisy, drifting stream of acceleration samples into velocity and
//! displacement estimates in real time, one fixed-size frame at a time.
//! Double integration amplifies low-frequency noise and residual bias into
//! unbounded drift; this crate suppresses that drift continuously with a
//! recursive least-squares trend estimator, without resetting state or
//! introducing discontinuities at frame boundaries.

pub mod channel;
pub mod config;
pub mod detrend;
pub mod filter;
pub mod integrator;
pub mod pipeline;

pub use channel::{Axis, SensorChannel};
pub use config::PipelineConfig;
pub use detrend::{DetrendMethod, Detrender, PolynomialDetrender, RlsDetrender, RlsState};
pub use filter::{FilterMethod, FrameFilter};
pub use integrator::{Integrator, QuadratureRule};
pub use pipeline::{CumulativeResults, FrameOutput, KinematicPipeline};

use thiserror::Error;

/// Errors produced by the kinematic estimation core.
///
/// Numeric degeneracies (a zero RLS gain denominator, the Simpson trapezoid
/// tail) are handled locally with documented fallbacks and surface only as
/// log diagnostics, never as errors.
#[derive(Debug, Error)]
pub enum KinError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
