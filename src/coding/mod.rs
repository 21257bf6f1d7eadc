//! Encoding and decoding for the error correction and scrambling schemes used in DAB.

#[macro_use]
pub mod galois;

mod bmcf;

pub mod crc;
pub mod puncture;
pub mod reed_solomon;
pub mod scramble;
pub mod trellis;
