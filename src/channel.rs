//! Per-axis channel container
//!
//! A sensor channel owns three fully independent pipelines, one per axis,
//! built from the same configuration. Nothing is shared or synchronized
//! between axes; distinct channels may be driven concurrently by their own
//! producer tasks, but calls into one channel must come from a single
//! writer in arrival order.

use crate::config::PipelineConfig;
use crate::pipeline::{CumulativeResults, FrameOutput, KinematicPipeline};
use crate::KinError;

/// Sensor axis identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Three independent kinematic pipelines for one three-axis sensor.
#[derive(Debug, Clone)]
pub struct SensorChannel {
    axes: [KinematicPipeline; 3],
}

impl SensorChannel {
    /// Builds one pipeline per axis, all with the same configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, KinError> {
        Ok(Self {
            axes: [
                KinematicPipeline::new(config)?,
                KinematicPipeline::new(config)?,
                KinematicPipeline::new(config)?,
            ],
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        self.axes[0].config()
    }

    /// Processes one frame on a single axis, leaving the others untouched.
    pub fn process_frame(&mut self, axis: Axis, frame: &[f64]) -> FrameOutput {
        self.axes[axis.index()].process_frame(frame)
    }

    /// Processes one frame per axis; the frames belong to the same
    /// acquisition instant.
    pub fn process_triplet(&mut self, x: &[f64], y: &[f64], z: &[f64]) -> [FrameOutput; 3] {
        [
            self.axes[0].process_frame(x),
            self.axes[1].process_frame(y),
            self.axes[2].process_frame(z),
        ]
    }

    pub fn pipeline(&self, axis: Axis) -> &KinematicPipeline {
        &self.axes[axis.index()]
    }

    pub fn cumulative_results(&self, axis: Axis) -> CumulativeResults<'_> {
        self.axes[axis.index()].get_cumulative_results()
    }

    /// True once every axis has processed its warmup frames.
    pub fn is_warmed_up(&self) -> bool {
        self.axes.iter().all(KinematicPipeline::is_warmed_up)
    }

    /// Resets all three axes.
    pub fn reset(&mut self) {
        for pipeline in &mut self.axes {
            pipeline.reset();
        }
    }
}
