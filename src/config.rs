//! Pipeline configuration
//!
//! A [`PipelineConfig`] is immutable for the lifetime of a pipeline: changing
//! any field means building a replacement pipeline, since the rolling buffers
//! cannot be resized mid-stream.

use serde::{Deserialize, Serialize};

use crate::integrator::QuadratureRule;
use crate::KinError;

/// Configuration for a [`KinematicPipeline`](crate::KinematicPipeline).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sample period in seconds, > 0.
    pub dt: f64,
    /// Number of samples per ingestion call, >= 1.
    pub sample_frame_size: usize,
    /// Rolling-buffer length as a multiple of `sample_frame_size`, >= 1.
    pub calc_frame_multiplier: usize,
    /// Forgetting factor for the velocity detrender, in (0, 1].
    pub rls_q_vel: f64,
    /// Forgetting factor for the displacement detrender, in (0, 1].
    pub rls_q_disp: f64,
    /// Frames to process before outputs are considered reliable.
    pub warmup_frames: u64,
    /// Quadrature rule used for both integration stages.
    pub quadrature: QuadratureRule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dt: 0.005,
            sample_frame_size: 20,
            calc_frame_multiplier: 100,
            rls_q_vel: 0.9825,
            rls_q_disp: 0.9825,
            warmup_frames: 5,
            quadrature: QuadratureRule::Trapezoidal,
        }
    }
}

impl PipelineConfig {
    /// Length of the rolling history buffers.
    pub fn calc_frame_size(&self) -> usize {
        self.sample_frame_size * self.calc_frame_multiplier
    }

    pub fn validate(&self) -> Result<(), KinError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(KinError::InvalidParameter(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }

        if self.sample_frame_size == 0 {
            return Err(KinError::InvalidParameter(
                "sample_frame_size must be at least 1".to_string(),
            ));
        }

        if self.calc_frame_multiplier == 0 {
            return Err(KinError::InvalidParameter(
                "calc_frame_multiplier must be at least 1".to_string(),
            ));
        }

        for (name, q) in [("rls_q_vel", self.rls_q_vel), ("rls_q_disp", self.rls_q_disp)] {
            if !q.is_finite() || q <= 0.0 || q > 1.0 {
                return Err(KinError::InvalidParameter(format!(
                    "{name} must lie in (0, 1], got {q}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calc_frame_size(), 2000);
    }

    #[test]
    fn test_nonpositive_dt_rejected() {
        let config = PipelineConfig {
            dt: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(KinError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_forgetting_factor_out_of_range_rejected() {
        let config = PipelineConfig {
            rls_q_vel: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(KinError::InvalidParameter(_))
        ));

        let config = PipelineConfig {
            rls_q_disp: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_frame_size_rejected() {
        let config = PipelineConfig {
            sample_frame_size: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            calc_frame_multiplier: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
