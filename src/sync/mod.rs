//! Frame synchronization: finding the null symbol, correcting the carrier frequency
//! offset, and aligning the FFT window with the phase reference symbol.
//!
//! Acquisition runs once per lock. The null symbol is found from a sustained dip in the
//! sample power, the fractional frequency offset is estimated from the cyclic prefix of
//! the phase reference, the integer offset with the configured `CoarseCorrector`, and the
//! FFT window from the channel impulse response with the configured `WindowPlacement`.
//! Once locked, each following frame is located from the position of the previous one
//! and only re-checked and refined.

use std::collections::VecDeque;
use std::sync::Arc;

use num::complex::Complex32;
use rustfft::{Fft, FftPlanner};
use tracing::{debug, info, trace};

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::config::ReceiverConfig;
use crate::consts::{ModeParams, SAMPLE_RATE};
use crate::ofdm::prs;

pub mod coarse;
pub mod window;

/// Number of power measurement blocks per null symbol.
const NULL_BLOCKS: usize = 16;

/// Number of blocks used to seed the running average power.
const WARMUP_BLOCKS: usize = 16;

/// Weight of each new block in the running average power.
const LEVEL_ALPHA: f32 = 0.05;

/// Guard carriers on each side of the band excluded from the noise estimate.
const SNR_GUARD: i32 = 8;

/// Highest reported SNR in dB.
const SNR_MAX: f32 = 99.0;

/// Synchronization progress.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum SyncState {
    /// Looking for a null symbol.
    Searching,
    /// A null symbol was found and the phase reference is being collected.
    NullDetected,
    /// The integer frequency offset was removed.
    CoarseCorrected,
    /// Frames are being delivered.
    FrameSynced,
    /// Lock was lost after consecutive failed frames and a null symbol is being searched
    /// for again.
    Lost,
}

impl Default for SyncState {
    fn default() -> Self { SyncState::Searching }
}

/// Events produced by the `Synchronizer`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncEvent {
    /// The synchronization state changed to the given state.
    State(SyncState),
    /// A frequency corrected frame is available from `Synchronizer::frame`.
    Frame,
}

/// Current processing stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    /// Watching the power for a null symbol.
    FindNull,
    /// Collecting the null and phase reference symbols.
    ReadHead,
    /// Collecting the symbols of a frame, which is delivered if `emit` is set.
    ReadFrame { emit: bool },
}

/// Detects the null symbol as a sustained dip in the average sample magnitude.
struct NullDetector {
    /// Most recent samples, up to one null symbol.
    history: VecDeque<Complex32>,
    /// Capacity of `history`.
    cap: usize,
    block_len: usize,
    /// Sum of sample magnitudes in the current block.
    sum: f32,
    /// Samples in the current block.
    count: usize,
    /// Running average block magnitude.
    level: f32,
    /// Number of blocks seen during warmup.
    warmup: usize,
    /// Number of consecutive blocks below the start threshold.
    low: usize,
    start: f32,
    end: f32,
}

impl NullDetector {
    fn new(params: &ModeParams, start: f32, end: f32) -> NullDetector {
        NullDetector {
            history: VecDeque::with_capacity(params.null_len),
            cap: params.null_len,
            block_len: params.null_len / NULL_BLOCKS,
            sum: 0.0,
            count: 0,
            level: 0.0,
            warmup: 0,
            low: 0,
            start: start,
            end: end,
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.sum = 0.0;
        self.count = 0;
        self.level = 0.0;
        self.warmup = 0;
        self.low = 0;
    }

    /// Minimum number of low blocks for a dip to be taken as a null symbol.
    fn min_low(&self) -> usize { NULL_BLOCKS / 2 }

    /// Number of low blocks after which the dip is taken as a drop in signal level.
    fn max_low(&self) -> usize { NULL_BLOCKS * 4 }

    /// Consume samples up to the end of a null symbol. Return the number of samples
    /// consumed and whether a null symbol ended with the last one.
    fn feed(&mut self, samples: &[Complex32]) -> (usize, bool) {
        for (i, &s) in samples.iter().enumerate() {
            if self.history.len() == self.cap {
                self.history.pop_front();
            }

            self.history.push_back(s);

            self.sum += s.re.abs() + s.im.abs();
            self.count += 1;

            if self.count == self.block_len {
                let level = self.sum / self.count as f32;

                self.sum = 0.0;
                self.count = 0;

                if self.block(level) {
                    return (i + 1, true);
                }
            }
        }

        (samples.len(), false)
    }

    /// Handle the average magnitude of a block and return whether it ended a null.
    fn block(&mut self, level: f32) -> bool {
        if self.warmup < WARMUP_BLOCKS {
            self.level = if self.warmup == 0 {
                level
            } else {
                self.level + (level - self.level) / (self.warmup + 1) as f32
            };

            self.warmup += 1;

            return false;
        }

        if self.low < self.min_low() {
            if level < self.start * self.level {
                self.low += 1;
            } else {
                self.low = 0;
                self.level += LEVEL_ALPHA * (level - self.level);
            }

            return false;
        }

        if level > self.end * self.level {
            trace!("null end at level {} of {}", level, self.level);
            self.low = 0;

            return true;
        }

        self.low += 1;

        if self.low > self.max_low() {
            debug!("signal level dropped from {} to {}", self.level, level);
            self.level = level;
            self.low = 0;
        }

        false
    }
}

/// Mix the given samples down by the given frequency in cycles per sample.
fn mix(samples: &mut [Complex32], offset: f32) {
    let w = -2.0 * std::f64::consts::PI * offset as f64;

    for (n, s) in samples.iter_mut().enumerate() {
        let (sin, cos) = (w * n as f64).sin_cos();
        *s = *s * Complex32::new(cos as f32, sin as f32);
    }
}

/// Estimate the frequency offset, in cycles per sample, from the correlation between
/// the cyclic prefix and the end of each symbol starting at the given positions.
fn prefix_offset<I>(samples: &[Complex32], starts: I, params: &ModeParams) -> f32
    where I: Iterator<Item = usize>
{
    let size = params.fft_len;
    let prefix = params.prefix_len();

    let corr = starts
        .flat_map(|s| s..s + prefix)
        .map(|n| samples[n].conj() * samples[n + size])
        .fold(Complex32::default(), |a, x| a + x);

    if corr.norm() > 0.0 {
        corr.arg() / (2.0 * std::f32::consts::PI * size as f32)
    } else {
        0.0
    }
}

fn mean_power(samples: &[Complex32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    samples.iter().map(|s| s.norm_sqr()).sum::<f32>() / samples.len() as f32
}

/// Estimate the SNR, in dB, from the phase reference spectrum as the ratio of carrier
/// power to the power left in the guard bands.
fn snr(params: &ModeParams, bins: &[Complex32]) -> f32 {
    let half = params.carriers as i32 / 2;
    let edge = params.fft_len as i32 / 2;

    let signal = prs::carriers(params)
        .map(|k| bins[prs::bin(params, k)].norm_sqr())
        .sum::<f32>() / params.carriers as f32;

    let guard = (half + SNR_GUARD + 1..edge)
        .flat_map(|k| vec![k, -k])
        .map(|k| bins[prs::bin(params, k)].norm_sqr())
        .collect::<Vec<_>>();

    let noise = guard.iter().sum::<f32>() / guard.len().max(1) as f32;

    if !(noise > 0.0) {
        return SNR_MAX;
    }

    let ratio = (signal - noise).max(0.0) / noise;

    if ratio > 0.0 {
        (10.0 * ratio.log10()).min(SNR_MAX)
    } else {
        -SNR_MAX
    }
}

/// Recovers frequency corrected transmission frames from a stream of baseband samples.
pub struct Synchronizer {
    params: ModeParams,
    config: ReceiverConfig,
    state: SyncState,
    stage: Stage,
    detector: NullDetector,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Phase reference in FFT bin order.
    reference: Vec<Complex32>,
    /// Raw null and phase reference symbols.
    head: Buffer<Complex32>,
    /// Raw samples from the start of the phase reference through the following null.
    frame: Buffer<Complex32>,
    /// Corrected symbols of the last frame.
    symbols: Vec<Complex32>,
    /// Corrected null symbol preceding the last frame.
    null: Vec<Complex32>,
    /// FFT work buffer.
    bins: Vec<Complex32>,
    /// Frequency offset in cycles per sample.
    offset: f32,
    snr: f32,
    /// Consecutive failed frames while locked.
    failures: usize,
    events: VecDeque<SyncEvent>,
}

impl Synchronizer {
    pub fn new(config: &ReceiverConfig) -> Synchronizer {
        let params = config.mode.params();
        let mut planner = FftPlanner::<f32>::new();

        Synchronizer {
            params: params,
            config: *config,
            state: SyncState::Searching,
            stage: Stage::FindNull,
            detector: NullDetector::new(&params, config.null_threshold_start,
                                        config.null_threshold_end),
            fft: planner.plan_fft_forward(params.fft_len),
            ifft: planner.plan_fft_inverse(params.fft_len),
            reference: prs::reference(&params),
            head: Buffer::new(params.null_len + params.symbol_len),
            frame: Buffer::new(params.symbols * params.symbol_len + params.null_len),
            symbols: vec![Complex32::default(); params.symbols * params.symbol_len],
            null: vec![Complex32::default(); params.null_len],
            bins: vec![Complex32::default(); params.fft_len],
            offset: 0.0,
            snr: 0.0,
            failures: 0,
            events: VecDeque::new(),
        }
    }

    /// Drop all timing and frequency state and start searching from scratch.
    pub fn reset(&mut self) {
        self.state = SyncState::Searching;
        self.stage = Stage::FindNull;
        self.detector.reset();
        self.head.reset();
        self.frame.reset();
        self.offset = 0.0;
        self.snr = 0.0;
        self.failures = 0;
        self.events.clear();
    }

    /// Drop all state after the sample stream ended, leaving the synchronizer `Lost`
    /// until the next null symbol.
    pub fn stop(&mut self) {
        self.reset();
        self.state = SyncState::Lost;
    }

    pub fn state(&self) -> SyncState { self.state }

    pub fn params(&self) -> &ModeParams { &self.params }

    /// Estimated carrier frequency offset in Hz.
    pub fn offset_hz(&self) -> f32 { self.offset * SAMPLE_RATE as f32 }

    /// SNR estimated from the last phase reference, in dB.
    pub fn snr(&self) -> f32 { self.snr }

    /// Corrected samples of the last delivered frame: `symbols` consecutive symbols,
    /// each with its cyclic prefix, starting with the phase reference.
    pub fn frame(&self) -> &[Complex32] { &self.symbols[..] }

    /// Corrected samples of the null symbol preceding the last delivered frame.
    pub fn null_symbol(&self) -> &[Complex32] { &self.null[..] }

    /// Consume samples until the next event or until the given samples are exhausted.
    /// Return the number of samples consumed and the event, if any. All samples have
    /// been consumed when no event is returned.
    pub fn feed(&mut self, samples: &[Complex32]) -> (usize, Option<SyncEvent>) {
        if let Some(e) = self.events.pop_front() {
            return (0, Some(e));
        }

        let mut used = 0;

        while used < samples.len() {
            used += self.handle(&samples[used..]);

            if let Some(e) = self.events.pop_front() {
                return (used, Some(e));
            }
        }

        (used, None)
    }

    fn handle(&mut self, samples: &[Complex32]) -> usize {
        match self.stage {
            Stage::FindNull => {
                let (used, found) = self.detector.feed(samples);

                if found {
                    let (a, b) = self.detector.history.as_slices();

                    self.head.reset();
                    self.head.fill(a);
                    self.head.fill(b);

                    self.set_state(SyncState::NullDetected);
                    self.stage = Stage::ReadHead;
                }

                used
            },
            Stage::ReadHead => {
                let used = self.head.fill(samples);

                if self.head.is_full() {
                    self.handle_head();
                }

                used
            },
            Stage::ReadFrame { emit } => {
                let used = self.frame.fill(samples);

                if self.frame.is_full() {
                    self.handle_frame(emit);
                }

                used
            },
        }
    }

    fn set_state(&mut self, state: SyncState) {
        if state == self.state {
            return;
        }

        debug!("sync state {:?} -> {:?}", self.state, state);

        self.state = state;
        self.events.push_back(SyncEvent::State(state));
    }

    fn handle_head(&mut self) {
        let locked = self.state == SyncState::FrameSynced;

        match self.locate(locked) {
            Some(start) => {
                self.failures = 0;

                if !locked {
                    info!("frame sync acquired at {:.1} Hz offset, {:.1} dB SNR",
                          self.offset_hz(), self.snr);
                    self.set_state(SyncState::FrameSynced);
                }

                self.start_frame(start, true);
            },
            None if locked => {
                self.failures += 1;
                debug!("frame failed while locked ({} of {})", self.failures,
                       self.config.lost_after);

                if self.failures >= self.config.lost_after {
                    info!("frame sync lost");
                    self.lose(SyncState::Lost);
                } else {
                    // Keep the timing of the last good frame.
                    let start = self.params.null_len;
                    self.start_frame(start, false);
                }
            },
            None => self.lose(SyncState::Searching),
        }
    }

    /// Begin collecting a frame with its phase reference at the given position in the
    /// head buffer.
    fn start_frame(&mut self, start: usize, emit: bool) {
        self.frame.reset();
        self.frame.fill(&self.head.get()[start..]);
        self.stage = Stage::ReadFrame { emit: emit };
    }

    fn lose(&mut self, state: SyncState) {
        self.failures = 0;
        self.offset = 0.0;
        self.detector.low = 0;
        self.set_state(state);
        self.stage = Stage::FindNull;
    }

    /// Locate the phase reference within the head buffer and return its starting
    /// position. Frequency estimates are refreshed when not `locked`.
    fn locate(&mut self, locked: bool) -> Option<usize> {
        let params = self.params;
        let null_len = params.null_len;
        let prefix = params.prefix_len();
        let size = params.fft_len;

        if locked {
            let head = self.head.get();
            let null = mean_power(&head[..null_len]);
            let prs = mean_power(&head[null_len..]);

            if !(null < self.config.null_threshold_start * prs) {
                trace!("null power {} too high against {}", null, prs);
                return None;
            }
        } else {
            self.offset = prefix_offset(self.head.get(), std::iter::once(null_len),
                                        &params);
        }

        self.transform_prs();

        if !locked {
            let range = (self.config.coarse_range_hz / params.carrier_spacing()).round();
            let shift = self.config.coarse_corrector.estimate(
                &params, &self.bins, &self.reference, range as i32);

            if shift != 0 {
                self.offset += shift as f32 / size as f32;
                self.transform_prs();
            }

            trace!("coarse shift of {} carriers", shift);
            self.set_state(SyncState::CoarseCorrected);
        }

        self.snr = snr(&params, &self.bins);

        // Channel impulse response.
        for (b, r) in self.bins.iter_mut().zip(self.reference.iter()) {
            *b = *b * r.conj();
        }

        self.ifft.process(&mut self.bins);

        let impulse = self.bins.iter().map(|c| c.norm_sqr()).collect::<Vec<_>>();
        let mean = impulse.iter().sum::<f32>() / impulse.len() as f32;
        let peak = impulse.iter().cloned().fold(0.0, f32::max);

        if !(peak > 0.0 && 10.0 * (peak / mean).log10() >= self.config.prs_threshold_db) {
            trace!("impulse peak {} too weak against mean {}", peak, mean);
            return None;
        }

        let delta = self.config.window_placement.place(&impulse, prefix);
        let start = null_len as isize + delta;

        if start < 0 || start as usize > null_len + prefix {
            trace!("window offset {} out of range", delta);
            return None;
        }

        let start = start as usize;
        trace!("phase reference at {} ({:+})", start, delta);

        // Null symbol for transmitter identification, zero padded at the front if cut
        // short.
        let head = self.head.get();
        let avail = std::cmp::min(start, null_len);

        for s in self.null[..null_len - avail].iter_mut() {
            *s = Complex32::default();
        }

        self.null[null_len - avail..].copy_from_slice(&head[start - avail..start]);
        mix(&mut self.null, self.offset);

        Some(start)
    }

    /// Transform the frequency corrected useful part of the phase reference at its
    /// nominal position in the head buffer into `bins`.
    fn transform_prs(&mut self) {
        let start = self.params.null_len + self.params.prefix_len();
        let size = self.params.fft_len;

        self.bins.copy_from_slice(&self.head.get()[start..start + size]);
        mix(&mut self.bins, self.offset);
        self.fft.process(&mut self.bins);
    }

    fn handle_frame(&mut self, emit: bool) {
        let params = self.params;
        let len = params.symbols * params.symbol_len;

        if emit {
            self.symbols.copy_from_slice(&self.frame.get()[..len]);
            mix(&mut self.symbols, self.offset);

            // Residual offset from every cyclic prefix in the frame.
            let starts = (0..params.symbols).map(|l| l * params.symbol_len);
            let residual = prefix_offset(&self.symbols, starts, &params);

            if residual != 0.0 {
                mix(&mut self.symbols, residual);
                self.offset += residual;
            }

            trace!("frame residual offset {:.2} Hz", residual * SAMPLE_RATE as f32);
            self.events.push_back(SyncEvent::Frame);
        }

        // The trailing null starts the next head.
        self.head.reset();
        self.head.fill(&self.frame.get()[len..]);
        self.stage = Stage::ReadHead;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::TransmissionMode;

    #[test]
    fn test_mix() {
        let offset = 0.01;
        let mut samples = (0..100)
            .map(|n| Complex32::from_polar(1.0, 2.0 * std::f32::consts::PI * offset * n as f32))
            .collect::<Vec<_>>();

        mix(&mut samples, offset);

        for s in samples {
            assert!((s - Complex32::new(1.0, 0.0)).norm() < 1e-3);
        }
    }

    #[test]
    fn test_prefix_offset() {
        let params = TransmissionMode::II.params();
        let offset = 0.3 / params.fft_len as f32;

        // Any signal with a cyclic prefix works.
        let mut sym = (0..params.fft_len)
            .map(|n| Complex32::from_polar(1.0, (n * n) as f32 * 0.37))
            .collect::<Vec<_>>();
        let mut samples = sym[params.fft_len - params.prefix_len()..].to_vec();
        samples.append(&mut sym);

        mix(&mut samples, -offset);

        let est = prefix_offset(&samples, std::iter::once(0), &params);
        assert!((est - offset).abs() < 1e-6, "{} {}", est, offset);
    }

    #[test]
    fn test_null_detector() {
        let params = TransmissionMode::II.params();
        let mut det = NullDetector::new(&params, 0.35, 0.75);
        let one = Complex32::new(1.0, 0.0);

        let mut signal = vec![one; params.null_len * 3];
        assert_eq!(det.feed(&signal), (signal.len(), false));

        // Short dip is ignored.
        let dip = vec![Complex32::default(); det.block_len * 3];
        assert_eq!(det.feed(&dip), (dip.len(), false));
        assert_eq!(det.feed(&signal), (signal.len(), false));

        let null = vec![Complex32::new(0.01, 0.0); params.null_len];
        assert_eq!(det.feed(&null), (null.len(), false));

        signal.truncate(params.symbol_len);
        let (used, found) = det.feed(&signal);
        assert!(found);
        assert!(used <= 2 * det.block_len);

        // History holds the samples up to the end of the null.
        assert_eq!(det.history.len(), params.null_len);
        assert_eq!(*det.history.back().unwrap(), one);
    }

    #[test]
    fn test_noise_floor() {
        let params = TransmissionMode::II.params();
        let mut det = NullDetector::new(&params, 0.35, 0.75);

        let loud = vec![Complex32::new(1.0, 1.0); params.null_len * 2];
        let quiet = vec![Complex32::new(0.01, 0.0); params.null_len * 8];

        assert!(!det.feed(&loud).1);
        assert!(!det.feed(&quiet).1);

        // Level tracks the new floor, so nothing looks like a null.
        assert!(det.level < 0.1);
        assert!(!det.feed(&quiet).1);
    }

    #[test]
    fn test_snr() {
        let params = TransmissionMode::II.params();
        let mut bins = prs::reference(&params);

        assert_eq!(snr(&params, &bins), SNR_MAX);

        for b in bins.iter_mut() {
            *b = *b + Complex32::new(0.1, 0.0);
        }

        // Signal power 1 over noise power 0.01.
        assert!((snr(&params, &bins) - 20.0).abs() < 1.0);
    }

    #[test]
    fn test_silence() {
        let config = ReceiverConfig::default().with_mode(TransmissionMode::II);
        let mut sync = Synchronizer::new(&config);
        let zeros = vec![Complex32::default(); config.mode.params().frame_len() * 3];

        assert_eq!(sync.feed(&zeros), (zeros.len(), None));
        assert_eq!(sync.state(), SyncState::Searching);
    }
}
