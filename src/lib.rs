//! This crate implements the receiving side of a DAB/DAB+ digital radio ensemble: frame
//! synchronization and frequency correction of 2.048 MS/s baseband samples, OFDM
//! demodulation, FIC decoding into the ensemble configuration, and MSC decoding of a
//! selected DAB+ sub-channel into Reed-Solomon corrected superframes.
//!
//! The `Receiver` drives every stage cooperatively from the caller's thread, and the
//! `Pipeline` runs one on a worker thread behind a bounded queue.

mod buffer;

pub mod bits;
pub mod coding;
pub mod config;
pub mod consts;
pub mod error;
pub mod fic;
pub mod msc;
pub mod ofdm;
pub mod pipeline;
pub mod receiver;
pub mod source;
pub mod stats;
pub mod sync;
pub mod telemetry;
pub mod tii;

pub use crate::config::ReceiverConfig;
pub use crate::error::{DabError, Result};
pub use crate::pipeline::Pipeline;
pub use crate::receiver::{Receiver, ReceiverEvent};
pub use crate::source::{SampleBlock, SampleSource};
