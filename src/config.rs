//! Receiver configuration.

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::consts::TransmissionMode;
use crate::error::{DabError, Result};

pub use crate::sync::coarse::CoarseCorrector;
pub use crate::sync::window::WindowPlacement;

/// Tunable parameters of a `Receiver`, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct ReceiverConfig {
    /// Transmission mode of the tuned ensemble.
    pub mode: TransmissionMode,
    /// Integer frequency offset estimator.
    pub coarse_corrector: CoarseCorrector,
    /// FFT window placement policy.
    pub window_placement: WindowPlacement,
    /// Whether to decode transmitter identification from each null symbol.
    pub decode_tii: bool,
    /// Fraction of the running average power below which the null symbol is taken to
    /// start.
    pub null_threshold_start: f32,
    /// Fraction of the running average power above which the null symbol is taken to
    /// end.
    pub null_threshold_end: f32,
    /// Minimum ratio, in dB, of the channel impulse response peak to its mean for the
    /// phase reference to be taken as found.
    pub prs_threshold_db: f32,
    /// Largest integer frequency offset searched, in Hz.
    pub coarse_range_hz: f32,
    /// Number of consecutive failed frames after which lock is declared lost.
    pub lost_after: usize,
    /// Number of frame durations without sync after which no signal is reported.
    pub no_signal_timeout_frames: usize,
    /// Capacity, in sample blocks, of the threaded pipeline's input queue.
    pub queue_depth: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            mode: TransmissionMode::I,
            coarse_corrector: CoarseCorrector::default(),
            window_placement: WindowPlacement::default(),
            decode_tii: false,
            null_threshold_start: 0.35,
            null_threshold_end: 0.75,
            prs_threshold_db: 15.0,
            coarse_range_hz: 35_000.0,
            lost_after: 5,
            no_signal_timeout_frames: 20,
            queue_depth: 32,
        }
    }
}

impl ReceiverConfig {
    pub fn with_mode(mut self, mode: TransmissionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_coarse_corrector(mut self, c: CoarseCorrector) -> Self {
        self.coarse_corrector = c;
        self
    }

    pub fn with_window_placement(mut self, w: WindowPlacement) -> Self {
        self.window_placement = w;
        self
    }

    pub fn with_tii(mut self, enable: bool) -> Self {
        self.decode_tii = enable;
        self
    }

    pub fn with_null_thresholds(mut self, start: f32, end: f32) -> Self {
        self.null_threshold_start = start;
        self.null_threshold_end = end;
        self
    }

    pub fn with_prs_threshold(mut self, db: f32) -> Self {
        self.prs_threshold_db = db;
        self
    }

    pub fn with_lost_after(mut self, frames: usize) -> Self {
        self.lost_after = frames;
        self
    }

    pub fn with_no_signal_timeout(mut self, frames: usize) -> Self {
        self.no_signal_timeout_frames = frames;
        self
    }

    pub fn with_queue_depth(mut self, blocks: usize) -> Self {
        self.queue_depth = blocks;
        self
    }

    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(DabError::InvalidConfig(msg.to_string()));

        if !(self.null_threshold_start > 0.0 && self.null_threshold_start < 1.0) {
            return invalid("null start threshold must be within (0, 1)");
        }

        if !(self.null_threshold_end > self.null_threshold_start &&
             self.null_threshold_end <= 1.0)
        {
            return invalid("null end threshold must be within (start, 1]");
        }

        if !(self.prs_threshold_db > 0.0) {
            return invalid("PRS threshold must be positive");
        }

        if !(self.coarse_range_hz >= 0.0) {
            return invalid("coarse range must not be negative");
        }

        if self.lost_after == 0 {
            return invalid("lost-after count must be at least 1");
        }

        if self.no_signal_timeout_frames == 0 {
            return invalid("no-signal timeout must be at least 1 frame");
        }

        if self.queue_depth == 0 {
            return invalid("queue depth must be at least 1");
        }

        Ok(())
    }
}
