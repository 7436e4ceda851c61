//! Streaming acceleration pre-filters
//!
//! Optional conditioning applied on the ingestion side, upstream of the
//! kinematic pipeline; the pipeline itself returns acceleration untouched.
//! All filters are stateful across frames so frame boundaries introduce no
//! discontinuity.

use serde::{Deserialize, Serialize};

use crate::KinError;

/// Pre-filter selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterMethod {
    None,
    /// Moving average over the last `window` samples.
    MovingAverage { window: usize },
    /// Single-pole low-pass: `y += alpha * (x - y)`.
    LowPass { alpha: f64 },
    /// Single-pole high-pass: the input minus its low-pass component.
    HighPass { alpha: f64 },
}

impl FilterMethod {
    pub fn build(self) -> Result<FrameFilter, KinError> {
        match self {
            FilterMethod::None => Ok(FrameFilter::None),
            FilterMethod::MovingAverage { window } => {
                if window == 0 {
                    return Err(KinError::InvalidParameter(
                        "moving average window must be at least 1".to_string(),
                    ));
                }
                Ok(FrameFilter::MovingAverage {
                    window,
                    history: std::collections::VecDeque::with_capacity(window),
                    sum: 0.0,
                })
            }
            FilterMethod::LowPass { alpha } => {
                validate_alpha(alpha)?;
                Ok(FrameFilter::LowPass { alpha, state: None })
            }
            FilterMethod::HighPass { alpha } => {
                validate_alpha(alpha)?;
                Ok(FrameFilter::HighPass { alpha, state: None })
            }
        }
    }
}

fn validate_alpha(alpha: f64) -> Result<(), KinError> {
    if !alpha.is_finite() || alpha <= 0.0 || alpha > 1.0 {
        return Err(KinError::InvalidParameter(format!(
            "filter alpha must lie in (0, 1], got {alpha}"
        )));
    }
    Ok(())
}

/// A built streaming filter.
#[derive(Debug, Clone)]
pub enum FrameFilter {
    None,
    MovingAverage {
        window: usize,
        history: std::collections::VecDeque<f64>,
        sum: f64,
    },
    LowPass {
        alpha: f64,
        /// Seeded from the first sample so the filter does not ring in
        /// from zero.
        state: Option<f64>,
    },
    HighPass {
        alpha: f64,
        state: Option<f64>,
    },
}

impl FrameFilter {
    /// Filters one frame, carrying state from previous frames.
    pub fn apply(&mut self, frame: &[f64]) -> Vec<f64> {
        match self {
            FrameFilter::None => frame.to_vec(),
            FrameFilter::MovingAverage {
                window,
                history,
                sum,
            } => frame
                .iter()
                .map(|&x| {
                    if history.len() == *window {
                        *sum -= history.pop_front().unwrap_or(0.0);
                    }
                    history.push_back(x);
                    *sum += x;
                    *sum / history.len() as f64
                })
                .collect(),
            FrameFilter::LowPass { alpha, state } => frame
                .iter()
                .map(|&x| {
                    let y = state.unwrap_or(x);
                    let y = y + *alpha * (x - y);
                    *state = Some(y);
                    y
                })
                .collect(),
            FrameFilter::HighPass { alpha, state } => frame
                .iter()
                .map(|&x| {
                    let y = state.unwrap_or(x);
                    let y = y + *alpha * (x - y);
                    *state = Some(y);
                    x - y
                })
                .collect(),
        }
    }

    /// Clears filter memory.
    pub fn reset(&mut self) {
        match self {
            FrameFilter::None => {}
            FrameFilter::MovingAverage { history, sum, .. } => {
                history.clear();
                *sum = 0.0;
            }
            FrameFilter::LowPass { state, .. } | FrameFilter::HighPass { state, .. } => {
                *state = None;
            }
        }
    }
}
