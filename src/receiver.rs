//! Cooperative receiver driving every stage from a stream of baseband samples.

use std::sync::Arc;

use num::complex::Complex32;
use tracing::{debug, info, warn};

use crate::bits::SoftBit;
use crate::config::ReceiverConfig;
use crate::consts::ModeParams;
use crate::error::{DabError, Result};
use crate::fic::ensemble::Ensemble;
use crate::fic::FicDecoder;
use crate::msc::superframe::Superframe;
use crate::msc::MscDecoder;
use crate::ofdm::Demodulator;
use crate::source::SampleSource;
use crate::stats::{HasStats, Stats};
use crate::sync::{SyncEvent, SyncState, Synchronizer};
use crate::telemetry::Telemetry;
use crate::tii::{TiiDecoder, TiiMatch};

/// Output of the receiver.
#[derive(Clone, Debug, PartialEq)]
pub enum ReceiverEvent {
    /// The synchronization state changed.
    SyncChanged(SyncState),
    /// The ensemble configuration changed in more than the time. The new configuration
    /// applies from the next frame.
    EnsembleChanged(Arc<Ensemble>),
    /// A superframe of the selected sub-channel was decoded.
    Superframe(Superframe),
    /// Transmitters were identified in a null symbol.
    Tii(Vec<TiiMatch>),
    /// No frame sync was held for the configured timeout.
    NoSignal,
}

/// Decodes the ensemble and the selected sub-channel from baseband samples.
pub struct Receiver {
    config: ReceiverConfig,
    params: ModeParams,
    sync: Synchronizer,
    demod: Demodulator,
    fic: FicDecoder,
    msc: MscDecoder,
    tii: Option<TiiDecoder>,
    telemetry: Arc<Telemetry>,
    /// Soft bits of the data symbols of the current frame.
    bits: Vec<SoftBit>,
    /// Samples consumed since frame sync was last held.
    unsynced: usize,
    /// Whether `NoSignal` was reported for the current stretch without sync.
    silent: bool,
    stats: Stats,
}

impl Receiver {
    /// Construct a new `Receiver` with the given configuration.
    pub fn new(config: ReceiverConfig) -> Result<Receiver> {
        config.validate()?;

        let params = config.mode.params();

        Ok(Receiver {
            config: config,
            params: params,
            sync: Synchronizer::new(&config),
            demod: Demodulator::new(config.mode),
            fic: FicDecoder::new(config.mode),
            msc: MscDecoder::new(),
            tii: if config.decode_tii { Some(TiiDecoder::new(config.mode)) } else { None },
            telemetry: Arc::new(Telemetry::new()),
            bits: vec![0; params.data_symbols() * params.symbol_bits()],
            unsynced: 0,
            silent: false,
            stats: Stats::default(),
        })
    }

    pub fn config(&self) -> &ReceiverConfig { &self.config }

    pub fn sync_state(&self) -> SyncState { self.sync.state() }

    /// Most recently published ensemble configuration.
    pub fn ensemble(&self) -> Arc<Ensemble> { self.fic.ensemble() }

    /// Shared quality counters.
    pub fn telemetry(&self) -> Arc<Telemetry> { self.telemetry.clone() }

    /// Choose the sub-channel whose superframes are decoded, or `None` for none.
    pub fn select_subchannel(&mut self, id: Option<u8>) { self.msc.select(id); }

    pub fn selected_subchannel(&self) -> Option<u8> { self.msc.selected() }

    /// Drop all stream state, as after retuning. The sub-channel selection is kept.
    pub fn reset(&mut self) {
        debug!("receiver reset");

        self.sync.reset();
        self.demod.reset();
        self.fic.reset();
        self.msc.reset();
        self.stats.clear();
        self.telemetry.clear();
        self.unsynced = 0;
        self.silent = false;
    }

    /// Process the given samples and return the resulting events in order.
    pub fn feed(&mut self, samples: &[Complex32]) -> Vec<ReceiverEvent> {
        let mut events = vec![];
        let mut pos = 0;

        loop {
            let (used, event) = self.sync.feed(&samples[pos..]);
            pos += used;

            self.watch(used, &mut events);

            match event {
                Some(SyncEvent::State(state)) => self.handle_state(state, &mut events),
                Some(SyncEvent::Frame) => self.handle_frame(&mut events),
                None => break,
            }
        }

        events
    }

    /// Pull samples from the given source until it ends or fails, passing each event to
    /// `handler`. Return the reason the stream stopped, which is `DabError::EndOfStream`
    /// or `DabError::SourceUnavailable`.
    pub fn run<S, F>(&mut self, source: &mut S, mut handler: F) -> DabError
        where S: SampleSource + ?Sized, F: FnMut(ReceiverEvent)
    {
        let err = loop {
            match source.next_block() {
                Ok(Some(block)) => for e in self.feed(&block) {
                    handler(e);
                },
                Ok(None) => break DabError::EndOfStream,
                Err(DabError::SourceUnavailable(msg)) => {
                    break DabError::SourceUnavailable(msg)
                },
                Err(e) => break DabError::SourceUnavailable(e.to_string()),
            }
        };

        match err {
            DabError::EndOfStream => info!("sample stream ended"),
            ref e => warn!("{}", e),
        }

        if let Some(e) = self.stop() {
            handler(e);
        }

        err
    }

    /// Drop sync after the sample stream stopped. Return the resulting state change, or
    /// `None` if lock was already lost.
    pub fn stop(&mut self) -> Option<ReceiverEvent> {
        if self.sync.state() == SyncState::Lost {
            return None;
        }

        self.sync.stop();
        self.demod.reset();
        self.telemetry.set_sync(SyncState::Lost);

        Some(ReceiverEvent::SyncChanged(SyncState::Lost))
    }

    /// Track how long frame sync has been missing.
    fn watch(&mut self, samples: usize, events: &mut Vec<ReceiverEvent>) {
        if self.sync.state() == SyncState::FrameSynced {
            self.unsynced = 0;
            self.silent = false;
            return;
        }

        self.unsynced += samples;

        let timeout = self.config.no_signal_timeout_frames * self.params.frame_len();

        if !self.silent && self.unsynced >= timeout {
            info!("no signal");
            self.silent = true;
            events.push(ReceiverEvent::NoSignal);
        }
    }

    fn handle_state(&mut self, state: SyncState, events: &mut Vec<ReceiverEvent>) {
        self.telemetry.set_sync(state);

        match state {
            SyncState::FrameSynced => {
                self.unsynced = 0;
                self.silent = false;
            },
            SyncState::Lost => {
                // Organization may differ once sync is regained.
                self.demod.reset();
                self.fic.reset();
                self.msc.reset();
            },
            _ => self.demod.reset(),
        }

        events.push(ReceiverEvent::SyncChanged(state));
    }

    fn handle_frame(&mut self, events: &mut Vec<ReceiverEvent>) {
        // Configuration as it stood at the start of the frame.
        let ensemble = self.fic.ensemble();

        self.telemetry.set_signal(self.sync.snr(), self.sync.offset_hz());

        if let Some(ref mut tii) = self.tii {
            let matches = tii.decode(self.sync.null_symbol());

            if !matches.is_empty() {
                self.telemetry.set_tii(&matches);
                events.push(ReceiverEvent::Tii(matches));
            }
        }

        if let Err(e) = self.demodulate() {
            warn!("frame dropped: {}", e);
            return;
        }

        let fic_bits = self.params.fic_bits();

        let fibs = self.fic.feed(&self.bits[..fic_bits]);
        let superframes = self.msc.feed(&ensemble, &self.bits[fic_bits..]);

        debug!("frame: {} valid FIBs, {} superframes", fibs, superframes.len());

        let mut stats = Stats::default();
        stats.merge(&mut self.fic);
        stats.merge(&mut self.msc);
        self.telemetry.record(&stats);
        self.stats.merge(&mut stats);

        for sf in superframes {
            self.telemetry.record_superframe(sf.bad_codewords);
            events.push(ReceiverEvent::Superframe(sf));
        }

        if let Some((e, changed)) = self.fic.publish() {
            self.telemetry.set_ensemble(e.id, e.time);

            if changed {
                events.push(ReceiverEvent::EnsembleChanged(e));
            }
        }
    }

    /// Demodulate every symbol of the synchronized frame into `bits`.
    fn demodulate(&mut self) -> Result<()> {
        let len = self.params.symbol_bits();
        let frame = self.sync.frame();

        for (idx, symbol) in frame.chunks(self.params.symbol_len).enumerate() {
            let bits: &mut [SoftBit] = match idx {
                0 => &mut [],
                _ => &mut self.bits[(idx - 1) * len..idx * len],
            };

            self.demod.feed(idx, symbol, bits)?;
        }

        Ok(())
    }
}

impl HasStats for Receiver {
    fn stats(&mut self) -> &mut Stats { &mut self.stats }
}
