//! Synthetic DAB transmitter assembled from the crate's encoders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use num::complex::Complex32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::{Fft, FftPlanner};

use dab::bits::Bits;
use dab::coding::crc::append_crc16;
use dab::coding::reed_solomon::{DATA_BYTES, WORD_BYTES};
use dab::coding::scramble::scramble;
use dab::coding::trellis::ConvEncoder;
use dab::consts::{ModeParams, TransmissionMode, CIF_BITS, CU_BITS, FIB_BYTES, SAMPLE_RATE};
use dab::fic;
use dab::fic::ensemble::EepProfile;
use dab::msc::interleave::TimeInterleaver;
use dab::msc::protection::EepParams;
use dab::msc::superframe::{append_fire, encode, FRAMES};
use dab::ofdm::{carrier_map, prs, qpsk};
use dab::tii;

pub const ENSEMBLE_ID: u16 = 0x10A1;
pub const SERVICE_ID: u32 = 0xC221;
pub const SUBCHANNEL: u8 = 1;
/// Sub-channel size in CUs at protection 3-A, which carries 48 kbit/s.
pub const SUBCHANNEL_SIZE: u16 = 36;
pub const ENSEMBLE_LABEL: &str = "Test Mux";
pub const SERVICE_LABEL: &str = "Test Radio";

/// Pad the given FIGs into a FIB with its CRC.
pub fn fib(figs: &[&[u8]]) -> [u8; FIB_BYTES] {
    let mut fib = [0xFF; FIB_BYTES];
    let mut pos = 0;

    for fig in figs {
        fib[pos..pos + fig.len()].copy_from_slice(fig);
        pos += fig.len();
    }

    append_crc16(&mut fib);
    fib
}

fn label_fig(ext: u8, id: &[u8], text: &str) -> Vec<u8> {
    let mut fig = vec![0x35, ext];
    fig.extend_from_slice(id);

    let mut chars = [b' '; 16];
    chars[..text.len()].copy_from_slice(text.as_bytes());
    fig.extend_from_slice(&chars);

    // First four characters make the short label.
    fig.extend_from_slice(&[0xF0, 0x00]);
    fig
}

/// FIBs describing an ensemble with one DAB+ service.
pub fn ensemble_fibs() -> Vec<[u8; FIB_BYTES]> {
    let info = [0x05, 0x00, (ENSEMBLE_ID >> 8) as u8, ENSEMBLE_ID as u8, 0x00, 0x00];
    // Sub-channel 1 at CU 0, long form 3-A with 36 CUs.
    let subs = [0x05, 0x01, SUBCHANNEL << 2, 0x00, 0x88, SUBCHANNEL_SIZE as u8];
    // Programme service with a primary DAB+ component on sub-channel 1.
    let services = [0x06, 0x02, (SERVICE_ID >> 8) as u8, SERVICE_ID as u8, 0x01, 0x3F,
                    SUBCHANNEL << 2 | 0x02];

    let id = ENSEMBLE_ID.to_be_bytes();
    let sid = (SERVICE_ID as u16).to_be_bytes();

    vec![
        fib(&[&info, &subs, &services]),
        fib(&[&label_fig(0x00, &id, ENSEMBLE_LABEL)]),
        fib(&[&label_fig(0x01, &sid, SERVICE_LABEL)]),
    ]
}

/// Build a superframe of `s` codewords at 48 kHz with SBR, carrying three access units
/// filled from `seed`.
pub fn superframe(s: usize, seed: u32) -> Vec<u8> {
    let data_len = DATA_BYTES * s;
    let mut buf = vec![0u8; WORD_BYTES * s];

    for (i, b) in buf[..data_len].iter_mut().enumerate() {
        *b = (i as u32).wrapping_mul(2654435761).wrapping_add(seed).rotate_left(7) as u8;
    }

    buf[2] = 0b0110_0000;

    let starts = [6, 6 + (data_len - 6) / 3, 6 + 2 * (data_len - 6) / 3];
    buf[3] = (starts[1] >> 4) as u8;
    buf[4] = ((starts[1] & 0xF) << 4 | starts[2] >> 8) as u8;
    buf[5] = starts[2] as u8;

    let ends = [starts[1], starts[2], data_len];

    for (&start, &end) in starts.iter().zip(ends.iter()) {
        append_crc16(&mut buf[start..end]);
    }

    append_fire(&mut buf);
    encode(&mut buf, s);

    buf
}

/// Produces the coded CIF bits of a DAB+ sub-channel.
struct SubChannelCoder {
    start: u16,
    eep: EepParams,
    interleaver: TimeInterleaver<u8>,
    /// Bytes of the superframe being sent.
    pending: VecDeque<u8>,
    count: u32,
    /// Data of every superframe started.
    sent: Vec<Vec<u8>>,
}

impl SubChannelCoder {
    fn new(start: u16, size: u16) -> SubChannelCoder {
        let eep = EepParams::new(EepProfile::A, 3, size).unwrap();

        SubChannelCoder {
            start: start,
            eep: eep,
            interleaver: TimeInterleaver::interleaver(eep.cif_bits()),
            pending: VecDeque::new(),
            count: 0,
            sent: vec![],
        }
    }

    fn code(&mut self, cif: &mut [u8]) {
        let s = self.eep.bitrate() as usize / 8;

        if self.pending.is_empty() {
            let sf = superframe(s, self.count);
            self.count += 1;
            self.sent.push(sf[..DATA_BYTES * s].to_vec());
            self.pending.extend(sf);
        }

        let frame = self.pending.drain(..WORD_BYTES * s / FRAMES).collect::<Vec<_>>();

        let mut bits = Bits::new(frame.into_iter()).collect::<Vec<_>>();
        scramble(&mut bits);

        let coded = self.eep.puncturing().puncture(&ConvEncoder::new().encode(&bits));
        let start = self.start as usize * CU_BITS;

        self.interleaver.feed(&coded, &mut cif[start..start + coded.len()]);
    }
}

/// Generates baseband samples of DAB transmission frames.
pub struct Transmitter {
    pub params: ModeParams,
    ifft: Arc<dyn Fft<f32>>,
    map: Vec<usize>,
    /// Carriers of the previous symbol, from -K/2 to K/2 without DC.
    prev: Vec<Complex32>,
    fibs: Vec<[u8; FIB_BYTES]>,
    next_fib: usize,
    channel: SubChannelCoder,
    /// Carrier frequency offset in Hz.
    pub offset_hz: f64,
    /// Standard deviation of the added noise in each component.
    pub noise: f32,
    /// Main and sub identifier sent in the null symbol.
    pub tii: Option<(usize, usize)>,
    /// Whether each FIB is corrupted after its CRC is computed.
    pub corrupt_fibs: bool,
    rng: StdRng,
    /// Samples produced so far.
    n: u64,
}

impl Transmitter {
    pub fn new(mode: TransmissionMode) -> Transmitter {
        let params = mode.params();

        Transmitter {
            params: params,
            ifft: FftPlanner::<f32>::new().plan_fft_inverse(params.fft_len),
            map: carrier_map(&params),
            prev: vec![Complex32::default(); params.carriers],
            fibs: ensemble_fibs(),
            next_fib: 0,
            channel: SubChannelCoder::new(0, SUBCHANNEL_SIZE),
            offset_hz: 0.0,
            noise: 0.0,
            tii: None,
            corrupt_fibs: false,
            rng: StdRng::seed_from_u64(0xDAB),
            n: 0,
        }
    }

    pub fn with_offset(mut self, hz: f64) -> Self {
        self.offset_hz = hz;
        self
    }

    pub fn with_noise(mut self, std: f32) -> Self {
        self.noise = std;
        self
    }

    pub fn with_tii(mut self, main: usize, sub: usize) -> Self {
        self.tii = Some((main, sub));
        self
    }

    /// Data of every superframe sent, without RS parity.
    pub fn sent(&self) -> &[Vec<u8>] { &self.channel.sent }

    /// Produce the samples of the given number of frames.
    pub fn frames(&mut self, count: usize) -> Vec<Complex32> {
        let mut out = Vec::with_capacity(count * self.params.frame_len());

        for _ in 0..count {
            self.frame(&mut out);
        }

        self.impair(&mut out);

        out
    }

    fn frame(&mut self, out: &mut Vec<Complex32>) {
        let params = self.params;

        self.null(out);

        // Phase reference.
        let reference = prs::reference(&params);

        for (i, c) in self.prev.iter_mut().enumerate() {
            *c = reference[Self::bin(&params, i)];
        }

        let bins = reference;
        self.symbol(bins, out);

        let bits = self.frame_bits();

        for sym in bits.chunks(params.symbol_bits()) {
            let k = params.carriers;
            let mut cur = self.prev.clone();

            for (n, &idx) in self.map.iter().enumerate() {
                cur[idx] = self.prev[idx] * qpsk(sym[n], sym[n + k]);
            }

            let mut bins = vec![Complex32::default(); params.fft_len];

            for (i, &c) in cur.iter().enumerate() {
                bins[Self::bin(&params, i)] = c;
            }

            self.prev = cur;
            self.symbol(bins, out);
        }
    }

    /// FFT bin of the carrier at the given index from -K/2 to K/2 without DC.
    fn bin(params: &ModeParams, idx: usize) -> usize {
        let half = params.carriers as i32 / 2;
        let k = if (idx as i32) < half { idx as i32 - half } else { idx as i32 - half + 1 };

        prs::bin(params, k)
    }

    /// Transform the given bins and append the symbol with its cyclic prefix.
    fn symbol(&self, mut bins: Vec<Complex32>, out: &mut Vec<Complex32>) {
        let size = self.params.fft_len;
        let scale = 1.0 / (size as f32).sqrt();

        self.ifft.process(&mut bins);

        for b in bins.iter_mut() {
            *b = *b * scale;
        }

        out.extend_from_slice(&bins[size - self.params.prefix_len()..]);
        out.extend_from_slice(&bins);
    }

    fn null(&mut self, out: &mut Vec<Complex32>) {
        let params = self.params;

        let (main, sub) = match self.tii {
            Some(ids) => ids,
            None => {
                out.extend(std::iter::repeat(Complex32::default()).take(params.null_len));
                return;
            },
        };

        let reference = prs::reference(&params);
        let mut bins = vec![Complex32::default(); params.fft_len];

        for k in tii::carriers(main, sub) {
            bins[prs::bin(&params, k)] = reference[prs::bin(&params, k)];
        }

        let size = params.fft_len;
        let scale = 1.0 / (size as f32).sqrt();
        self.ifft.process(&mut bins);

        // Cyclic extension ending with the useful part.
        let lead = params.null_len - size;

        out.extend((0..params.null_len).map(|n| bins[(n + size - lead % size) % size] * scale));
    }

    /// Code the FIC and MSC bits of one frame.
    fn frame_bits(&mut self) -> Vec<u8> {
        let params = self.params;
        let puncturing = fic::puncturing(params.mode);
        let mut bits = Vec::with_capacity(params.data_symbols() * params.symbol_bits());

        for _ in 0..params.fic_blocks() {
            let mut info = vec![];

            for _ in 0..params.fibs_per_block {
                let mut fib = self.fibs[self.next_fib];
                self.next_fib = (self.next_fib + 1) % self.fibs.len();

                if self.corrupt_fibs {
                    fib[5] ^= 0x10;
                }

                info.extend(Bits::new(fib.iter().cloned()));
            }

            scramble(&mut info);
            bits.extend(puncturing.puncture(&ConvEncoder::new().encode(&info)));
        }

        assert_eq!(bits.len(), params.fic_bits());

        for _ in 0..params.cifs_per_frame() {
            let mut cif = (0..CIF_BITS).map(|_| self.rng.gen::<u8>() & 1).collect::<Vec<_>>();
            self.channel.code(&mut cif);
            bits.extend(cif);
        }

        bits
    }

    /// Apply the frequency offset and noise.
    fn impair(&mut self, samples: &mut [Complex32]) {
        let w = 2.0 * std::f64::consts::PI * self.offset_hz / SAMPLE_RATE as f64;

        for s in samples.iter_mut() {
            if self.offset_hz != 0.0 {
                let (sin, cos) = (w * self.n as f64).sin_cos();
                *s = *s * Complex32::new(cos as f32, sin as f32);
            }

            if self.noise > 0.0 {
                *s = *s + gaussian(&mut self.rng) * self.noise;
            }

            self.n += 1;
        }
    }
}

/// Draw a complex sample with unit-variance components.
pub fn gaussian<R: Rng>(rng: &mut R) -> Complex32 {
    let u = rng.gen::<f64>().max(1e-12);
    let v = rng.gen::<f64>();
    let r = (-2.0 * u.ln()).sqrt();
    let t = 2.0 * std::f64::consts::PI * v;

    Complex32::new((r * t.cos()) as f32, (r * t.sin()) as f32)
}

/// Complex Gaussian noise with the given standard deviation in each component.
pub fn noise(len: usize, std: f32, seed: u64) -> Vec<Complex32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| gaussian(&mut rng) * std).collect()
}
