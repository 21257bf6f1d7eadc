//! Implements the 16-bit checksums used by DAB: the CCITT CRC protecting FIBs and audio
//! access units, and the Fire code protecting the DAB+ superframe header.
//!
//! Both are computed bit-serially with a shift register, where the message is fed MSB
//! first.

/// CRC-16 with generator x<sup>16</sup>+x<sup>12</sup>+x<sup>5</sup>+1, preset to all
/// ones and inverted on output.
pub type CRC16 = CRC<CRC16Params>;

/// Fire code with generator x<sup>16</sup>+x<sup>14</sup>+x<sup>13</sup>+x<sup>12</sup>+
/// x<sup>11</sup>+x<sup>5</sup>+x<sup>3</sup>+x<sup>2</sup>+x+1.
pub type FireCode = CRC<FireCodeParams>;

pub trait CRCParams {
    /// Generator polynomial without the x<sup>16</sup> term.
    fn gen() -> u16;
    /// Initial register contents.
    fn init() -> u16;
    /// Pattern XORed onto the final register contents.
    fn inv() -> u16;
}

/// Params for the CCITT CRC.
pub struct CRC16Params;

impl CRCParams for CRC16Params {
    fn gen() -> u16 { 0x1021 }
    fn init() -> u16 { 0xFFFF }
    fn inv() -> u16 { 0xFFFF }
}

/// Params for the Fire code.
pub struct FireCodeParams;

impl CRCParams for FireCodeParams {
    fn gen() -> u16 { 0x782F }
    fn init() -> u16 { 0 }
    fn inv() -> u16 { 0 }
}

/// CRC calculator using a shift register.
pub struct CRC<P: CRCParams> {
    params: std::marker::PhantomData<P>,
    /// Current register contents.
    word: u16,
}

impl<P: CRCParams> CRC<P> {
    /// Construct a new `CRC` with the register at its initial value.
    pub fn new() -> CRC<P> {
        CRC {
            params: std::marker::PhantomData,
            word: P::init(),
        }
    }

    /// Feed in a single bit.
    pub fn feed_bit(&mut self, bit: u8) -> &mut Self {
        let feedback = (self.word >> 15) as u8 ^ (bit & 1);

        self.word <<= 1;

        if feedback == 1 {
            self.word ^= P::gen();
        }

        self
    }

    /// Feed in the given byte stream.
    pub fn feed_bytes<T: IntoIterator<Item = u8>>(&mut self, bytes: T) -> &mut Self {
        for byte in bytes {
            for i in (0..8).rev() {
                self.feed_bit(byte >> i & 1);
            }
        }

        self
    }

    /// Finish the CRC calculation and return the resulting CRC.
    pub fn finish(&self) -> u16 { self.word ^ P::inv() }
}

/// Check the CRC stored big-endian in the last two bytes of the given buffer against
/// the bytes before it.
pub fn check_crc16(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }

    let (data, crc) = buf.split_at(buf.len() - 2);

    CRC16::new().feed_bytes(data.iter().cloned()).finish() ==
        (crc[0] as u16) << 8 | crc[1] as u16
}

/// Compute the CRC of all but the last two bytes of the given buffer and store it
/// big-endian in the last two bytes.
pub fn append_crc16(buf: &mut [u8]) {
    let split = buf.len() - 2;
    let crc = CRC16::new().feed_bytes(buf[..split].iter().cloned()).finish();

    buf[split] = (crc >> 8) as u8;
    buf[split + 1] = crc as u8;
}
