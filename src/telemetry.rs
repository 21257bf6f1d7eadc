//! Receiver quality counters shared between the decode path and observers.
//!
//! The decode path only stores into atomics, and readers build an immutable
//! `TelemetrySnapshot` on demand.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::atomic::AtomicCell;

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::fic::ensemble::DateTime;
use crate::stats::Stats;
use crate::sync::SyncState;
use crate::tii::TiiMatch;

/// Most transmitters kept from each null symbol.
pub const MAX_TII: usize = 4;

/// Point-in-time view of the receiver quality.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct TelemetrySnapshot {
    /// SNR of the last phase reference in dB.
    pub snr: f32,
    pub sync: SyncState,
    /// FIBs that passed their CRC.
    pub fib_ok: u64,
    /// FIBs that failed their CRC.
    pub fib_failed: u64,
    /// Bytes corrected by RS decoding.
    pub rs_corrected: u64,
    /// RS codewords that couldn't be corrected.
    pub rs_uncorrectable: u64,
    /// Superframes lost to sync failures or delivered with uncorrectable codewords.
    pub frame_errors: u64,
    /// Superframes delivered.
    pub superframes: u64,
    /// Transmitters identified in the last decoded null symbol, strongest first.
    pub tii: Vec<TiiMatch>,
    pub ensemble_id: Option<u16>,
    /// Most recent broadcast UTC time.
    pub time: Option<DateTime>,
    /// Carrier frequency offset in Hz.
    pub offset_hz: f32,
    /// Sample blocks dropped by a full pipeline queue.
    pub dropped_blocks: u64,
}

/// Lock-free quality counters.
#[derive(Default)]
pub struct Telemetry {
    snr: AtomicCell<f32>,
    sync: AtomicCell<SyncState>,
    fib_ok: AtomicU64,
    fib_failed: AtomicU64,
    rs_corrected: AtomicU64,
    rs_uncorrectable: AtomicU64,
    frame_errors: AtomicU64,
    superframes: AtomicU64,
    tii: AtomicCell<[Option<TiiMatch>; MAX_TII]>,
    ensemble_id: AtomicCell<Option<u16>>,
    time: AtomicCell<Option<DateTime>>,
    offset_hz: AtomicCell<f32>,
    dropped_blocks: AtomicU64,
}

impl Telemetry {
    pub fn new() -> Telemetry { Telemetry::default() }

    /// Build a snapshot of the current values.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            snr: self.snr.load(),
            sync: self.sync.load(),
            fib_ok: self.fib_ok.load(Ordering::Relaxed),
            fib_failed: self.fib_failed.load(Ordering::Relaxed),
            rs_corrected: self.rs_corrected.load(Ordering::Relaxed),
            rs_uncorrectable: self.rs_uncorrectable.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            superframes: self.superframes.load(Ordering::Relaxed),
            tii: self.tii.load().iter().filter_map(|m| *m).collect(),
            ensemble_id: self.ensemble_id.load(),
            time: self.time.load(),
            offset_hz: self.offset_hz.load(),
            dropped_blocks: self.dropped_blocks.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter and forget the signal state.
    pub fn clear(&self) {
        self.snr.store(0.0);
        self.sync.store(SyncState::Searching);

        for c in [&self.fib_ok, &self.fib_failed, &self.rs_corrected,
                  &self.rs_uncorrectable, &self.frame_errors, &self.superframes,
                  &self.dropped_blocks]
        {
            c.store(0, Ordering::Relaxed);
        }

        self.tii.store([None; MAX_TII]);
        self.ensemble_id.store(None);
        self.time.store(None);
        self.offset_hz.store(0.0);
    }

    /// Add the code counters of the given stage stats.
    pub fn record(&self, stats: &Stats) {
        self.fib_ok.fetch_add(stats.fib.good() as u64, Ordering::Relaxed);
        self.fib_failed.fetch_add(stats.fib.errors() as u64, Ordering::Relaxed);
        self.rs_corrected.fetch_add(stats.rs.fixed() as u64, Ordering::Relaxed);
        self.rs_uncorrectable.fetch_add(stats.rs.errors() as u64, Ordering::Relaxed);
        self.frame_errors.fetch_add(stats.fire.errors() as u64, Ordering::Relaxed);
    }

    /// Count a delivered superframe, which is a frame error if any of its codewords
    /// couldn't be corrected.
    pub fn record_superframe(&self, bad_codewords: usize) {
        self.superframes.fetch_add(1, Ordering::Relaxed);

        if bad_codewords > 0 {
            self.frame_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dropped(&self, blocks: u64) {
        self.dropped_blocks.fetch_add(blocks, Ordering::Relaxed);
    }

    pub fn set_sync(&self, state: SyncState) { self.sync.store(state); }

    /// Store the latest signal estimates.
    pub fn set_signal(&self, snr: f32, offset_hz: f32) {
        self.snr.store(snr);
        self.offset_hz.store(offset_hz);
    }

    pub fn set_tii(&self, matches: &[TiiMatch]) {
        let mut tii = [None; MAX_TII];

        for (t, m) in tii.iter_mut().zip(matches.iter()) {
            *t = Some(*m);
        }

        self.tii.store(tii);
    }

    /// Store the identity and time of the given ensemble.
    pub fn set_ensemble(&self, id: Option<u16>, time: Option<DateTime>) {
        self.ensemble_id.store(id);
        self.time.store(time);
    }
}
