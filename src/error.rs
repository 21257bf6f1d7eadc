//! Standard errors that may occur when receiving DAB.

use thiserror::Error;

/// DAB runtime errors.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DabError {
    /// Too many byte errors were detected when attempting an RS(120, 110) decode.
    #[error("reed-solomon codeword unrecoverable")]
    ReedSolomonUnrecoverable,
    /// The convolutional decoder could not reach the terminating state.
    #[error("viterbi decode unrecoverable")]
    ViterbiUnrecoverable,
    /// A fast information block failed its CRC.
    #[error("FIB CRC mismatch")]
    FibCrc,
    /// No superframe boundary passed the Fire code check.
    #[error("superframe fire code mismatch")]
    FireCode,
    /// An audio access unit failed its CRC.
    #[error("access unit CRC mismatch")]
    AccessUnitCrc,
    /// A symbol was handed to the demodulator out of sequence.
    #[error("symbol {got} received while expecting symbol {expected}")]
    SymbolOrder {
        /// Index the demodulator was waiting for.
        expected: usize,
        /// Index that was actually received.
        got: usize,
    },
    /// The selected sub-channel isn't part of the current ensemble.
    #[error("sub-channel {0} not present in ensemble")]
    UnknownSubChannel(u8),
    /// The sub-channel uses a protection profile that can't be decoded.
    #[error("unsupported protection profile")]
    UnsupportedProtection,
    /// The sample source reported a device error.
    #[error("sample source unavailable: {0}")]
    SourceUnavailable(String),
    /// The sample source has no more samples.
    #[error("end of sample stream")]
    EndOfStream,
    /// The receiver worker thread couldn't be started or has already stopped.
    #[error("receiver worker unavailable: {0}")]
    WorkerUnavailable(String),
    /// The receiver configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Standard result using `DabError`.
pub type Result<T> = std::result::Result<T, DabError>;
