//! DAB+ audio superframes: five logical frames protected by the Fire code and
//! virtually interleaved RS(120, 110) codewords.

use tracing::{debug, trace};

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::bits::slice_u16;
use crate::coding::crc::{check_crc16, FireCode};
use crate::coding::reed_solomon::{self, DATA_BYTES, WORD_BYTES};
use crate::error::DabError;
use crate::stats::{HasStats, Stats};

/// Logical frames per superframe.
pub const FRAMES: usize = 5;

/// Bytes of the audio superframe header covered by the Fire code.
const FIRE_BYTES: usize = 11;

/// Audio coding parameters from the superframe header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct AudioParams {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Spectral band replication.
    pub sbr: bool,
    /// Parametric stereo.
    pub ps: bool,
    /// Whether the core AAC channel mode is stereo.
    pub stereo: bool,
    /// MPEG surround configuration.
    pub surround: u8,
}

impl AudioParams {
    /// Parse the parameters from the third header byte.
    pub fn from_header(byte: u8) -> AudioParams {
        AudioParams {
            sample_rate: if byte >> 6 & 1 == 1 { 48_000 } else { 32_000 },
            sbr: byte >> 5 & 1 == 1,
            stereo: byte >> 4 & 1 == 1,
            ps: byte >> 3 & 1 == 1,
            surround: byte & 0x7,
        }
    }

    /// Number of access units in each superframe.
    pub fn units(&self) -> usize {
        match (self.sample_rate, self.sbr) {
            (48_000, true) => 3,
            (48_000, false) => 6,
            (_, true) => 2,
            (_, false) => 4,
        }
    }

    /// Sample rate of the AAC core.
    pub fn core_rate(&self) -> u32 {
        if self.sbr { self.sample_rate / 2 } else { self.sample_rate }
    }
}

/// Position of an access unit within a superframe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct AccessUnit {
    /// Offset of the first byte.
    pub start: usize,
    /// Length of the unit without its CRC.
    pub len: usize,
    /// Whether the unit passed its CRC.
    pub valid: bool,
}

/// Reed-Solomon corrected audio superframe.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct Superframe {
    /// Sub-channel carrying the superframe.
    pub subchannel: u8,
    /// Audio superframe bytes, 110 per kbit/s multiple of 8, without RS parity.
    pub data: Vec<u8>,
    /// Number of byte errors corrected.
    pub corrected: usize,
    /// Number of bytes in codewords that couldn't be corrected.
    pub uncorrectable: usize,
    /// Number of codewords that couldn't be corrected.
    pub bad_codewords: usize,
    pub params: AudioParams,
    pub units: Vec<AccessUnit>,
}

impl Superframe {
    /// Bytes of the given access unit, without its CRC.
    pub fn unit(&self, au: &AccessUnit) -> &[u8] {
        &self.data[au.start..au.start + au.len]
    }
}

/// Check the Fire code protecting the superframe header at the start of the given
/// bytes.
pub fn check_fire(buf: &[u8]) -> bool {
    if buf.len() < FIRE_BYTES {
        return false;
    }

    FireCode::new().feed_bytes(buf[2..FIRE_BYTES].iter().cloned()).finish() ==
        slice_u16(&buf[..2])
}

/// Compute and store the Fire code protecting the header at the start of the given
/// bytes.
pub fn append_fire(buf: &mut [u8]) {
    let fire = FireCode::new().feed_bytes(buf[2..FIRE_BYTES].iter().cloned()).finish();

    buf[0] = (fire >> 8) as u8;
    buf[1] = fire as u8;
}

/// Collect the bytes of codeword i of a superframe made of `s` codewords.
fn gather(buf: &[u8], s: usize, i: usize) -> [u8; WORD_BYTES] {
    let mut word = [0; WORD_BYTES];

    for (j, w) in word.iter_mut().enumerate() {
        *w = buf[i + j * s];
    }

    word
}

fn scatter(buf: &mut [u8], s: usize, i: usize, word: &[u8; WORD_BYTES]) {
    for (j, &w) in word.iter().enumerate() {
        buf[i + j * s] = w;
    }
}

/// Add RS parity to the given superframe of `s` codewords, whose first `110 * s` bytes
/// hold the data.
pub fn encode(buf: &mut [u8], s: usize) {
    assert_eq!(buf.len(), WORD_BYTES * s);

    for i in 0..s {
        let mut word = gather(buf, s, i);
        reed_solomon::encode(&mut word);
        scatter(buf, s, i, &word);
    }
}

/// Split the access units out of a corrected superframe.
fn units(data: &[u8], params: &AudioParams) -> Option<Vec<AccessUnit>> {
    let count = params.units();

    // The first unit follows the header and the 12-bit start of every other unit.
    let first = 3 + (12 * (count - 1) + 7) / 8;
    let mut starts = vec![first];

    for n in 1..count {
        let bit = 24 + 12 * (n - 1);
        let word = slice_u16(&data[bit / 8..]);
        let start = if bit % 8 == 0 { word >> 4 } else { word & 0xFFF };

        starts.push(start as usize);
    }

    starts.push(data.len());

    let mut out = Vec::with_capacity(count);

    for w in starts.windows(2) {
        let (start, end) = (w[0], w[1]);

        if end < start + 2 || end > data.len() {
            return None;
        }

        out.push(AccessUnit {
            start: start,
            len: end - start - 2,
            valid: check_crc16(&data[start..end]),
        });
    }

    Some(out)
}

/// Correct each codeword of the given superframe of `s` codewords in place. Return the
/// number of bytes corrected in each correctable codeword and the number of
/// uncorrectable codewords.
fn correct(buf: &mut [u8], s: usize) -> (Vec<usize>, usize) {
    let mut fixes = Vec::with_capacity(s);
    let mut bad = 0;

    for i in 0..s {
        let mut word = gather(buf, s, i);

        match reed_solomon::decode(&mut word) {
            Some(n) => {
                fixes.push(n);
                scatter(buf, s, i, &word);
            },
            None => bad += 1,
        }
    }

    (fixes, bad)
}

/// Finds superframe boundaries in the stream of logical frames of a DAB+ sub-channel
/// and corrects each superframe.
pub struct SuperframeDecoder {
    subchannel: u8,
    /// Codewords per superframe.
    s: usize,
    /// Logical frames collected, up to a whole superframe.
    buf: Vec<u8>,
    stats: Stats,
}

impl SuperframeDecoder {
    /// Construct a new `SuperframeDecoder` for the given sub-channel and bitrate in
    /// kbit/s, which must be a multiple of 8.
    pub fn new(subchannel: u8, bitrate: u32) -> SuperframeDecoder {
        let s = bitrate as usize / 8;

        SuperframeDecoder {
            subchannel: subchannel,
            s: s,
            buf: Vec::with_capacity(WORD_BYTES * s),
            stats: Stats::default(),
        }
    }

    pub fn reset(&mut self) { self.buf.clear(); }

    /// Bytes in each logical frame.
    pub fn frame_bytes(&self) -> usize { WORD_BYTES * self.s / FRAMES }

    /// Add the bytes of a logical frame and return a superframe if one was completed.
    pub fn feed(&mut self, frame: &[u8]) -> Option<Superframe> {
        assert_eq!(frame.len(), self.frame_bytes());

        self.buf.extend_from_slice(frame);

        if self.buf.len() < WORD_BYTES * self.s {
            return None;
        }

        let mut fixed = self.buf.clone();
        let (fixes, bad) = correct(&mut fixed, self.s);

        if !check_fire(&self.buf) && !check_fire(&fixed) {
            trace!("no superframe start in sub-channel {}", self.subchannel);
            self.stats.record_err(DabError::FireCode);

            // Slide the window by one logical frame.
            let skip = self.frame_bytes();
            self.buf.drain(..skip);

            return None;
        }

        self.stats.fire.record_fixes(0);
        self.buf.clear();

        for &n in fixes.iter() {
            self.stats.rs.record_fixes(n);
        }

        for _ in 0..bad {
            self.stats.record_err(DabError::ReedSolomonUnrecoverable);
        }

        if bad > 0 {
            debug!("{} uncorrectable codewords in sub-channel {}", bad, self.subchannel);
        }

        fixed.truncate(DATA_BYTES * self.s);

        let params = AudioParams::from_header(fixed[2]);

        let units = match units(&fixed, &params) {
            Some(units) => units,
            None => {
                self.stats.record_err(DabError::AccessUnitCrc);
                vec![]
            },
        };

        for au in units.iter() {
            if au.valid {
                self.stats.au.record_fixes(0);
            } else {
                self.stats.record_err(DabError::AccessUnitCrc);
            }
        }

        Some(Superframe {
            subchannel: self.subchannel,
            data: fixed,
            corrected: fixes.iter().sum(),
            uncorrectable: bad * DATA_BYTES,
            bad_codewords: bad,
            params: params,
            units: units,
        })
    }
}

impl HasStats for SuperframeDecoder {
    fn stats(&mut self) -> &mut Stats { &mut self.stats }
}
