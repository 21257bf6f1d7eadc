//! Time interleaving of sub-channel bits over 16 CIFs.
//!
//! Bit i of each logical frame is delayed by P(i mod 16) CIFs in transmission and by
//! 15 - P(i mod 16) CIFs in reception, so every bit comes out 15 CIFs late.

/// Interleaving depth in CIFs.
pub const DEPTH: usize = 16;

/// Delay of each bit position on the transmit side.
const DELAYS: [usize; DEPTH] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

/// Delays the bits of consecutive frames by per-position amounts.
pub struct TimeInterleaver<T: Copy + Default> {
    /// Previous frames in a ring indexed by frame count.
    frames: Vec<Vec<T>>,
    /// Number of frames received.
    count: usize,
    /// Whether the delays are inverted for reception.
    receive: bool,
}

impl<T: Copy + Default> TimeInterleaver<T> {
    /// Construct a new `TimeInterleaver` for transmission with the given frame length.
    pub fn interleaver(len: usize) -> Self { TimeInterleaver::new(len, false) }

    /// Construct a new `TimeInterleaver` for reception with the given frame length.
    pub fn deinterleaver(len: usize) -> Self { TimeInterleaver::new(len, true) }

    fn new(len: usize, receive: bool) -> Self {
        TimeInterleaver {
            frames: vec![vec![T::default(); len]; DEPTH],
            count: 0,
            receive: receive,
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;

        for f in self.frames.iter_mut() {
            for x in f.iter_mut() {
                *x = T::default();
            }
        }
    }

    fn delay(&self, i: usize) -> usize {
        let d = DELAYS[i % DEPTH];
        if self.receive { DEPTH - 1 - d } else { d }
    }

    /// Add the given frame and write the delayed frame into `out`. Return whether the
    /// output is complete: reception needs 16 frames of history, and transmission
    /// starts from silence.
    pub fn feed(&mut self, frame: &[T], out: &mut [T]) -> bool {
        let slot = self.count % DEPTH;
        assert_eq!(frame.len(), self.frames[slot].len());
        assert_eq!(out.len(), frame.len());

        self.frames[slot].copy_from_slice(frame);

        for (i, o) in out.iter_mut().enumerate() {
            let src = (self.count + DEPTH - self.delay(i)) % DEPTH;
            *o = self.frames[src][i];
        }

        self.count += 1;

        !self.receive || self.count >= DEPTH
    }
}
