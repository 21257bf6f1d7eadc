//! Transmission mode parameters and frame layout constants.

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

/// Baseband samples per second, shared by every transmission mode.
pub const SAMPLE_RATE: usize = 2_048_000;
/// Number of bits in a common interleaved frame.
pub const CIF_BITS: usize = 55296;
/// Number of bits in a capacity unit.
pub const CU_BITS: usize = 64;
/// Number of capacity units in a CIF.
pub const CIF_CUS: usize = CIF_BITS / CU_BITS;
/// Number of bytes in a fast information block, including the CRC.
pub const FIB_BYTES: usize = 32;
/// Number of bits in a fast information block, including the CRC.
pub const FIB_BITS: usize = FIB_BYTES * 8;
/// Number of bytes available to FIGs in a fast information block.
pub const FIB_DATA_BYTES: usize = 30;
/// Duration of one CIF in milliseconds.
pub const CIF_MILLIS: usize = 24;

/// DAB transmission mode, which determines the OFDM symbol geometry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum TransmissionMode {
    I,
    II,
    III,
    IV,
}

impl TransmissionMode {
    /// Retrieve the symbol geometry of the mode.
    pub fn params(self) -> ModeParams {
        use self::TransmissionMode::*;

        match self {
            I => ModeParams {
                mode: self,
                symbols: 76,
                carriers: 1536,
                null_len: 2656,
                symbol_len: 2552,
                fft_len: 2048,
                fic_symbols: 3,
                fibs_per_frame: 12,
                fibs_per_block: 3,
            },
            II => ModeParams {
                mode: self,
                symbols: 76,
                carriers: 384,
                null_len: 664,
                symbol_len: 638,
                fft_len: 512,
                fic_symbols: 3,
                fibs_per_frame: 3,
                fibs_per_block: 3,
            },
            III => ModeParams {
                mode: self,
                symbols: 153,
                carriers: 192,
                null_len: 345,
                symbol_len: 319,
                fft_len: 256,
                fic_symbols: 8,
                fibs_per_frame: 4,
                fibs_per_block: 4,
            },
            IV => ModeParams {
                mode: self,
                symbols: 76,
                carriers: 768,
                null_len: 1328,
                symbol_len: 1276,
                fft_len: 1024,
                fic_symbols: 3,
                fibs_per_frame: 6,
                fibs_per_block: 3,
            },
        }
    }
}

impl Default for TransmissionMode {
    fn default() -> Self { TransmissionMode::I }
}

/// Symbol geometry of a transmission mode, with all lengths in samples at
/// `SAMPLE_RATE`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModeParams {
    /// Mode these parameters describe.
    pub mode: TransmissionMode,
    /// Symbols per frame following the null symbol, including the phase reference.
    pub symbols: usize,
    /// Number of active sub-carriers, K.
    pub carriers: usize,
    /// Length of the null symbol.
    pub null_len: usize,
    /// Length of each symbol including the cyclic prefix.
    pub symbol_len: usize,
    /// Length of the useful part of each symbol, which is also the FFT size.
    pub fft_len: usize,
    /// Number of data symbols carrying the FIC.
    pub fic_symbols: usize,
    /// Number of FIBs carried per frame.
    pub fibs_per_frame: usize,
    /// Number of FIBs per convolutionally coded FIC block.
    pub fibs_per_block: usize,
}

impl ModeParams {
    /// Length of the cyclic prefix.
    pub fn prefix_len(&self) -> usize { self.symbol_len - self.fft_len }

    /// Total length of a transmission frame, null symbol included.
    pub fn frame_len(&self) -> usize { self.null_len + self.symbols * self.symbol_len }

    /// Soft bits carried by each data symbol.
    pub fn symbol_bits(&self) -> usize { 2 * self.carriers }

    /// Number of data symbols per frame, which excludes the phase reference.
    pub fn data_symbols(&self) -> usize { self.symbols - 1 }

    /// Number of data symbols carrying the MSC.
    pub fn msc_symbols(&self) -> usize { self.data_symbols() - self.fic_symbols }

    /// Coded FIC bits per frame.
    pub fn fic_bits(&self) -> usize { self.fic_symbols * self.symbol_bits() }

    /// Number of convolutionally coded FIC blocks per frame.
    pub fn fic_blocks(&self) -> usize { self.fibs_per_frame / self.fibs_per_block }

    /// Coded bits per FIC block.
    pub fn fic_block_bits(&self) -> usize { self.fic_bits() / self.fic_blocks() }

    /// Coded MSC bits per frame.
    pub fn msc_bits(&self) -> usize { self.msc_symbols() * self.symbol_bits() }

    /// Number of CIFs carried per frame.
    pub fn cifs_per_frame(&self) -> usize { self.msc_bits() / CIF_BITS }

    /// Spacing between sub-carriers in Hz.
    pub fn carrier_spacing(&self) -> f32 { SAMPLE_RATE as f32 / self.fft_len as f32 }
}
