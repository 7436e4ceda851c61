//! Kinematic estimation pipeline
//!
//! Per frame: integrate acceleration to velocity, detrend, integrate to
//! displacement, detrend, and append everything to a bounded rolling
//! history. Continuity offsets carry the final value of each raw integral
//! into the next frame, so the integrated quantities never reset to zero at
//! frame boundaries.
//!
//! One pipeline serves one logical sample stream: `process_frame` calls
//! must arrive in order from a single writer. Channels that need several
//! axes own one pipeline per axis (see [`crate::channel`]).

use crate::config::PipelineConfig;
use crate::detrend::RlsDetrender;
use crate::integrator::Integrator;
use crate::KinError;

/// Per-frame result, each stream `sample_frame_size` long.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    /// Detrended displacement for this frame.
    pub disp: Vec<f64>,
    /// Detrended velocity for this frame.
    pub vel: Vec<f64>,
    /// The normalized input acceleration, unmodified.
    pub acc: Vec<f64>,
}

impl FrameOutput {
    fn nan(len: usize) -> Self {
        Self {
            disp: vec![f64::NAN; len],
            vel: vec![f64::NAN; len],
            acc: vec![f64::NAN; len],
        }
    }

    /// True when every sample in every stream is the NaN sentinel, i.e.
    /// this is the "no data" result for an empty input frame.
    pub fn is_no_data(&self) -> bool {
        self.disp.iter().all(|v| v.is_nan())
            && self.vel.iter().all(|v| v.is_nan())
            && self.acc.iter().all(|v| v.is_nan())
    }
}

/// Borrowed view of the rolling history, every slice `calc_frame_size`
/// long regardless of how many frames have been processed (unfilled
/// portions hold zeros).
#[derive(Debug, Clone, Copy)]
pub struct CumulativeResults<'a> {
    /// Buffer time axis, `i * dt`, relative to the last reset.
    pub time_vector: &'a [f64],
    pub disp: &'a [f64],
    pub vel: &'a [f64],
    pub acc: &'a [f64],
}

/// Real-time acceleration-to-displacement estimator for one sample stream.
///
/// Configuration is fixed for the lifetime of the instance: resizing the
/// rolling buffers mid-stream has no safe incremental definition, so a
/// parameter change means constructing a replacement pipeline.
#[derive(Debug, Clone)]
pub struct KinematicPipeline {
    config: PipelineConfig,
    integrator: Integrator,
    rls_vel: RlsDetrender,
    rls_disp: RlsDetrender,

    acc_buffer: Vec<f64>,
    vel_buffer: Vec<f64>,
    disp_buffer: Vec<f64>,
    buffer_time: Vec<f64>,
    frame_time: Vec<f64>,

    /// Carried-forward final raw velocity, the next frame's initial
    /// condition for the first integration stage.
    vel_offset: f64,
    /// Carried-forward final raw displacement for the second stage.
    disp_offset: f64,

    frame_count: u64,
}

impl KinematicPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, KinError> {
        config.validate()?;

        let calc_frame_size = config.calc_frame_size();
        let pipeline = Self {
            integrator: Integrator::new(config.quadrature, config.dt)?,
            rls_vel: RlsDetrender::new(config.rls_q_vel)?,
            rls_disp: RlsDetrender::new(config.rls_q_disp)?,
            acc_buffer: vec![0.0; calc_frame_size],
            vel_buffer: vec![0.0; calc_frame_size],
            disp_buffer: vec![0.0; calc_frame_size],
            buffer_time: (0..calc_frame_size).map(|i| i as f64 * config.dt).collect(),
            frame_time: (0..config.sample_frame_size)
                .map(|i| i as f64 * config.dt)
                .collect(),
            vel_offset: 0.0,
            disp_offset: 0.0,
            frame_count: 0,
            config,
        };

        log::info!(
            "kinematic pipeline: dt={}, frame_size={}, calc_buffer_size={}, q_vel={}, q_disp={}, warmup={}",
            pipeline.config.dt,
            pipeline.config.sample_frame_size,
            calc_frame_size,
            pipeline.config.rls_q_vel,
            pipeline.config.rls_q_disp,
            pipeline.config.warmup_frames
        );

        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Frames processed since construction or the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// True once enough frames have been processed for the adaptive state
    /// to be considered converged. Advisory: outputs are computed and
    /// returned either way.
    pub fn is_warmed_up(&self) -> bool {
        self.frame_count >= self.config.warmup_frames
    }

    /// Zeroes all buffers and adaptive state. Equivalent to a freshly
    /// constructed pipeline with the same configuration.
    pub fn reset(&mut self) {
        self.acc_buffer.fill(0.0);
        self.vel_buffer.fill(0.0);
        self.disp_buffer.fill(0.0);
        self.rls_vel.reset();
        self.rls_disp.reset();
        self.vel_offset = 0.0;
        self.disp_offset = 0.0;
        self.frame_count = 0;
        log::info!("kinematic pipeline reset");
    }

    /// Processes one frame of raw acceleration (m/s^2).
    ///
    /// An empty frame yields the NaN "no data" result without advancing any
    /// state. Oversized frames are truncated and undersized frames are
    /// zero-padded at the tail to `sample_frame_size` before any numeric
    /// work; the padding enters the integrator and therefore the trend
    /// estimate.
    pub fn process_frame(&mut self, raw_acc_frame: &[f64]) -> FrameOutput {
        let frame_size = self.config.sample_frame_size;

        if raw_acc_frame.is_empty() {
            log::warn!("empty acceleration frame; returning NaN output, state unchanged");
            return FrameOutput::nan(frame_size);
        }

        let acc = self.normalize_frame(raw_acc_frame);

        // Stage 1: acceleration -> velocity, continuous across frames.
        let mut raw_vel = self.integrator.integrate(&acc);
        for v in &mut raw_vel {
            *v += self.vel_offset;
        }
        self.vel_offset = raw_vel[frame_size - 1];

        // Detrenders never fail here: batch and time vector are both
        // frame_size long by construction.
        let (vel, _) = self
            .rls_vel
            .update_and_detrend(&raw_vel, &self.frame_time)
            .expect("frame and time vector lengths match by construction");

        // Stage 2: detrended velocity -> displacement.
        let mut raw_disp = self.integrator.integrate(&vel);
        for d in &mut raw_disp {
            *d += self.disp_offset;
        }
        self.disp_offset = raw_disp[frame_size - 1];

        let (disp, _) = self
            .rls_disp
            .update_and_detrend(&raw_disp, &self.frame_time)
            .expect("frame and time vector lengths match by construction");

        self.push_frame(&acc, &vel, &disp);
        self.frame_count += 1;

        if !self.is_warmed_up() {
            log::debug!(
                "frame {}/{} processed (warm-up phase)",
                self.frame_count,
                self.config.warmup_frames
            );
        }

        FrameOutput { disp, vel, acc }
    }

    /// Carried continuity offsets `(velocity, displacement)`: the final
    /// value of each raw integral from the last processed frame, used as
    /// the next frame's initial condition. Diagnostic accessor.
    pub fn continuity_offsets(&self) -> (f64, f64) {
        (self.vel_offset, self.disp_offset)
    }

    /// The full rolling history plus its time axis.
    pub fn get_cumulative_results(&self) -> CumulativeResults<'_> {
        CumulativeResults {
            time_vector: &self.buffer_time,
            disp: &self.disp_buffer,
            vel: &self.vel_buffer,
            acc: &self.acc_buffer,
        }
    }

    fn normalize_frame(&self, raw: &[f64]) -> Vec<f64> {
        let frame_size = self.config.sample_frame_size;
        match raw.len().cmp(&frame_size) {
            std::cmp::Ordering::Equal => raw.to_vec(),
            std::cmp::Ordering::Greater => {
                log::warn!(
                    "input frame length {} > sample_frame_size {}; truncating",
                    raw.len(),
                    frame_size
                );
                raw[..frame_size].to_vec()
            }
            std::cmp::Ordering::Less => {
                log::warn!(
                    "input frame length {} < sample_frame_size {}; zero-padding tail",
                    raw.len(),
                    frame_size
                );
                let mut padded = vec![0.0; frame_size];
                padded[..raw.len()].copy_from_slice(raw);
                padded
            }
        }
    }

    /// Shifts out the oldest `sample_frame_size` entries of each rolling
    /// buffer and appends the new frame at the tail.
    fn push_frame(&mut self, acc: &[f64], vel: &[f64], disp: &[f64]) {
        let frame_size = self.config.sample_frame_size;
        for (buffer, frame) in [
            (&mut self.acc_buffer, acc),
            (&mut self.vel_buffer, vel),
            (&mut self.disp_buffer, disp),
        ] {
            buffer.rotate_left(frame_size);
            let tail = buffer.len() - frame_size;
            buffer[tail..].copy_from_slice(frame);
        }
    }
}
