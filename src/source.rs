//! Baseband sample input.

use std::sync::Arc;

use num::complex::Complex32;

use crate::error::Result;

/// Block of consecutive baseband samples at `SAMPLE_RATE`, immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBlock(Arc<[Complex32]>);

impl SampleBlock {
    pub fn new(samples: Vec<Complex32>) -> SampleBlock {
        SampleBlock(samples.into())
    }

    pub fn samples(&self) -> &[Complex32] { &self.0[..] }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<Complex32>> for SampleBlock {
    fn from(samples: Vec<Complex32>) -> Self { SampleBlock::new(samples) }
}

impl std::ops::Deref for SampleBlock {
    type Target = [Complex32];
    fn deref(&self) -> &[Complex32] { self.samples() }
}

/// Supplier of baseband samples, such as an SDR device or a recording.
pub trait SampleSource {
    /// Retrieve the next block of samples. Return `Ok(None)` at the end of the stream
    /// and `Err` if the device failed.
    fn next_block(&mut self) -> Result<Option<SampleBlock>>;
}

/// Serves samples held in memory in blocks of a fixed size.
pub struct MemorySource {
    samples: Arc<[Complex32]>,
    pos: usize,
    block: usize,
}

impl MemorySource {
    /// Construct a new `MemorySource` over the given samples, split into blocks of at
    /// most `block` samples.
    pub fn new(samples: Vec<Complex32>, block: usize) -> MemorySource {
        assert!(block > 0);

        MemorySource {
            samples: samples.into(),
            pos: 0,
            block: block,
        }
    }
}

impl SampleSource for MemorySource {
    fn next_block(&mut self) -> Result<Option<SampleBlock>> {
        if self.pos >= self.samples.len() {
            return Ok(None);
        }

        let end = std::cmp::min(self.pos + self.block, self.samples.len());
        let block = SampleBlock::new(self.samples[self.pos..end].to_vec());
        self.pos = end;

        Ok(Some(block))
    }
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn next_block(&mut self) -> Result<Option<SampleBlock>> { (**self).next_block() }
}
