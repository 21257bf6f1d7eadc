//! Fast information channel decoding.
//!
//! Each frame carries a fixed number of convolutionally coded FIC blocks at the start of
//! its data symbols. Each block decodes to 3 FIBs (4 in mode III), whose FIGs build up
//! the ensemble configuration.

use std::sync::Arc;

use collect_slice::CollectSlice;
use tracing::trace;

use crate::bits::{BitBytes, SoftBit};
use crate::coding::crc::check_crc16;
use crate::coding::puncture::Puncturing;
use crate::coding::scramble::scramble;
use crate::coding::trellis::ViterbiDecoder;
use crate::consts::{ModeParams, TransmissionMode, FIB_BITS, FIB_DATA_BYTES};
use crate::error::{DabError, Result};
use crate::stats::{HasStats, Stats};

use self::ensemble::{Ensemble, EnsembleBuilder};
use self::fig::Figs;

pub mod ensemble;
pub mod fig;

/// Puncturing of the FIC blocks of the given mode.
pub fn puncturing(mode: TransmissionMode) -> Puncturing {
    match mode {
        TransmissionMode::III => Puncturing::fic_mode_iii(),
        _ => Puncturing::fic(),
    }
}

/// Decodes the FIC of each frame into the ensemble configuration.
pub struct FicDecoder {
    params: ModeParams,
    puncturing: Puncturing,
    viterbi: ViterbiDecoder,
    /// Depunctured mother code bits of the current block.
    mother: Vec<SoftBit>,
    /// Decoded bits of the current block.
    bits: Vec<u8>,
    /// FIBs of the current block.
    bytes: Vec<u8>,
    builder: EnsembleBuilder,
    stats: Stats,
}

impl FicDecoder {
    pub fn new(mode: TransmissionMode) -> FicDecoder {
        let params = mode.params();
        let puncturing = puncturing(mode);

        FicDecoder {
            params: params,
            bits: vec![0; puncturing.info_bits()],
            bytes: vec![0; puncturing.info_bits() / 8],
            mother: Vec::with_capacity(puncturing.mother_bits()),
            puncturing: puncturing,
            viterbi: ViterbiDecoder::new(),
            builder: EnsembleBuilder::new(),
            stats: Stats::default(),
        }
    }

    /// Forget the ensemble.
    pub fn reset(&mut self) { self.builder.reset(); }

    /// Most recently published ensemble.
    pub fn ensemble(&self) -> Arc<Ensemble> { self.builder.ensemble() }

    /// Publish changes made by the FIBs decoded since the last call. Return the new
    /// ensemble and whether more than the time changed.
    pub fn publish(&mut self) -> Option<(Arc<Ensemble>, bool)> { self.builder.publish() }

    /// Decode the soft bits of all FIC symbols of a frame and return the number of FIBs
    /// that passed their CRC.
    pub fn feed(&mut self, bits: &[SoftBit]) -> usize {
        assert_eq!(bits.len(), self.params.fic_bits());

        bits.chunks(self.params.fic_block_bits())
            .map(|block| self.decode_block(block))
            .sum()
    }

    /// Decode one coded FIC block and apply its FIBs.
    fn decode_block(&mut self, block: &[SoftBit]) -> usize {
        self.puncturing.depuncture(block, &mut self.mother);

        match self.viterbi.decode(&self.mother, &mut self.bits) {
            Some(fixed) => self.stats.viterbi.record_fixes(fixed),
            None => {
                self.stats.record_err(DabError::ViterbiUnrecoverable);
                return 0;
            },
        }

        scramble(&mut self.bits);

        BitBytes::new(self.bits.iter().cloned()).collect_slice_checked(&mut self.bytes[..]);

        let bytes = std::mem::take(&mut self.bytes);
        let valid = bytes.chunks(FIB_BITS / 8)
            .filter(|fib| self.handle_fib(fib).is_ok())
            .count();
        self.bytes = bytes;

        valid
    }

    /// Check the CRC of the given FIB and apply its FIGs.
    pub fn handle_fib(&mut self, fib: &[u8]) -> Result<()> {
        if !check_crc16(fib) {
            trace!("FIB CRC failed");
            self.stats.record_err(DabError::FibCrc);
            return Err(DabError::FibCrc);
        }

        self.stats.fib.record_fixes(0);

        for fig in Figs::new(&fib[..FIB_DATA_BYTES]) {
            trace!("{:?}", fig);
            self.builder.apply(fig);
        }

        Ok(())
    }
}

impl HasStats for FicDecoder {
    fn stats(&mut self) -> &mut Stats { &mut self.stats }
}
