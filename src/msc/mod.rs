//! Main service channel decoding of a selected DAB+ sub-channel.
//!
//! The sub-channel's capacity units are cut from each CIF, time de-interleaved over 16
//! CIFs, depunctured and Viterbi decoded at the sub-channel's protection, descrambled,
//! and collected into superframes.

use collect_slice::CollectSlice;
use tracing::{debug, trace, warn};

use crate::bits::{BitBytes, SoftBit};
use crate::coding::puncture::Puncturing;
use crate::coding::scramble::scramble;
use crate::coding::trellis::ViterbiDecoder;
use crate::consts::{CIF_BITS, CU_BITS};
use crate::error::{DabError, Result};
use crate::fic::ensemble::{Ensemble, SubChannel};
use crate::stats::{HasStats, Stats};

use self::interleave::TimeInterleaver;
use self::protection::EepParams;
use self::superframe::{Superframe, SuperframeDecoder};

pub mod interleave;
pub mod protection;
pub mod superframe;

/// Decoding state of one sub-channel, valid for a fixed organization.
struct SubChannelDecoder {
    sub: SubChannel,
    puncturing: Puncturing,
    interleaver: TimeInterleaver<SoftBit>,
    viterbi: ViterbiDecoder,
    /// De-interleaved coded bits of the current CIF.
    coded: Vec<SoftBit>,
    /// Depunctured mother code bits.
    mother: Vec<SoftBit>,
    /// Decoded bits of the current logical frame.
    bits: Vec<u8>,
    bytes: Vec<u8>,
    superframes: SuperframeDecoder,
}

impl SubChannelDecoder {
    fn new(sub: SubChannel, eep: EepParams) -> SubChannelDecoder {
        let puncturing = eep.puncturing();

        SubChannelDecoder {
            sub: sub,
            interleaver: TimeInterleaver::deinterleaver(eep.cif_bits()),
            viterbi: ViterbiDecoder::new(),
            coded: vec![0; eep.cif_bits()],
            mother: Vec::with_capacity(puncturing.mother_bits()),
            bits: vec![0; eep.frame_bits()],
            bytes: vec![0; eep.frame_bits() / 8],
            puncturing: puncturing,
            superframes: SuperframeDecoder::new(sub.id, eep.bitrate()),
        }
    }

    /// Bit range of the sub-channel within a CIF.
    fn range(&self) -> std::ops::Range<usize> {
        let start = self.sub.start as usize * CU_BITS;
        start..start + self.coded.len()
    }

    /// Decode the sub-channel's part of the given CIF.
    fn feed(&mut self, cif: &[SoftBit], stats: &mut Stats) -> Option<Superframe> {
        let range = self.range();

        if !self.interleaver.feed(&cif[range], &mut self.coded) {
            return None;
        }

        self.puncturing.depuncture(&self.coded, &mut self.mother);

        match self.viterbi.decode(&self.mother, &mut self.bits) {
            Some(fixed) => stats.viterbi.record_fixes(fixed),
            None => {
                stats.record_err(DabError::ViterbiUnrecoverable);
                self.superframes.reset();
                return None;
            },
        }

        scramble(&mut self.bits);

        BitBytes::new(self.bits.iter().cloned()).collect_slice_checked(&mut self.bytes[..]);
        let sf = self.superframes.feed(&self.bytes);

        stats.merge(&mut self.superframes);

        sf
    }
}

/// Decodes the selected sub-channel out of the MSC of each frame.
pub struct MscDecoder {
    /// Sub-channel chosen by the application.
    selected: Option<u8>,
    channel: Option<SubChannelDecoder>,
    /// Sub-channel last reported as not decodable.
    warned: Option<u8>,
    stats: Stats,
}

impl MscDecoder {
    pub fn new() -> MscDecoder {
        MscDecoder {
            selected: None,
            channel: None,
            warned: None,
            stats: Stats::default(),
        }
    }

    /// Choose the sub-channel to decode. Selecting the current sub-channel again keeps
    /// its decoding state.
    pub fn select(&mut self, id: Option<u8>) {
        if self.selected == id {
            return;
        }

        debug!("selected sub-channel {:?}", id);

        self.selected = id;
        self.channel = None;
        self.warned = None;
    }

    pub fn selected(&self) -> Option<u8> { self.selected }

    /// Drop all decoding state, keeping the selection.
    pub fn reset(&mut self) {
        self.channel = None;
        self.warned = None;
    }

    /// Make sure the decoder matches the selected sub-channel's organization in the
    /// given ensemble.
    fn prepare(&mut self, ensemble: &Ensemble) -> Result<()> {
        let id = match self.selected {
            Some(id) => id,
            None => return Ok(()),
        };

        let sub = match ensemble.subchannel(id) {
            Some(sub) => *sub,
            None => {
                self.channel = None;
                return Err(DabError::UnknownSubChannel(id));
            },
        };

        if let Some(ref ch) = self.channel {
            if ch.sub == sub {
                return Ok(());
            }
        }

        let eep = match sub.eep() {
            Some(eep) => eep,
            None => {
                self.channel = None;
                return Err(DabError::UnsupportedProtection);
            },
        };

        if sub.start as usize * CU_BITS + eep.cif_bits() > CIF_BITS {
            self.channel = None;
            return Err(DabError::UnsupportedProtection);
        }

        debug!("decoding sub-channel {} at {} kbit/s", id, eep.bitrate());

        self.channel = Some(SubChannelDecoder::new(sub, eep));

        Ok(())
    }

    /// Decode the MSC soft bits of a frame, one or more whole CIFs, using the given
    /// ensemble configuration. Return the superframes completed.
    pub fn feed(&mut self, ensemble: &Ensemble, bits: &[SoftBit]) -> Vec<Superframe> {
        assert_eq!(bits.len() % CIF_BITS, 0);

        if let Err(e) = self.prepare(ensemble) {
            if self.warned != self.selected {
                warn!("unable to decode sub-channel {:?}: {}", self.selected, e);
                self.warned = self.selected;
            }

            return vec![];
        }

        let ch = match self.channel {
            Some(ref mut ch) => ch,
            None => return vec![],
        };

        let stats = &mut self.stats;

        bits.chunks(CIF_BITS)
            .filter_map(|cif| {
                let sf = ch.feed(cif, stats);

                if let Some(ref sf) = sf {
                    trace!("superframe: {} corrected, {} uncorrectable", sf.corrected,
                           sf.uncorrectable);
                }

                sf
            })
            .collect()
    }
}

impl HasStats for MscDecoder {
    fn stats(&mut self) -> &mut Stats { &mut self.stats }
}
