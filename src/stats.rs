//! Runtime statistics.

use crate::error::DabError;

/// Tracks stats for an error detection or correction code.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CodeStats {
    /// Total number of received words.
    words: usize,
    /// Number of corrected symbols.
    fixed: usize,
    /// Number of unrecoverable words.
    err: usize,
}

impl CodeStats {
    /// Record that a word was received with the given amount of corrected symbols.
    pub fn record_fixes(&mut self, fixed: usize) {
        self.words += 1;
        self.fixed += fixed;
    }

    /// Record that a word was received with an unrecoverable error.
    pub fn record_err(&mut self) {
        self.words += 1;
        self.err += 1;
    }

    pub fn words(&self) -> usize { self.words }

    pub fn fixed(&self) -> usize { self.fixed }

    pub fn errors(&self) -> usize { self.err }

    /// Number of words received without an unrecoverable error.
    pub fn good(&self) -> usize { self.words - self.err }

    /// Merge in the stats from the given object and clear the other stats.
    fn merge(&mut self, other: &mut CodeStats) {
        self.words += other.words;
        self.err += other.err;
        self.fixed += other.fixed;

        *other = CodeStats::default();
    }
}

/// Records various runtime statistics.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// FIB CRC checks, one word per FIB.
    pub fib: CodeStats,
    /// Viterbi decodes, with the channel bits corrected in each block.
    pub viterbi: CodeStats,
    /// Superframe Fire code checks, one word per sync attempt.
    pub fire: CodeStats,
    /// RS(120, 110) codewords, with the bytes corrected in each.
    pub rs: CodeStats,
    /// Access unit CRC checks.
    pub au: CodeStats,
}

impl Stats {
    /// Merge in the stats from the given object and reset the other stats back to
    /// default.
    pub fn merge<T: HasStats>(&mut self, other: &mut T) {
        let stats = other.stats();

        self.fib.merge(&mut stats.fib);
        self.viterbi.merge(&mut stats.viterbi);
        self.fire.merge(&mut stats.fire);
        self.rs.merge(&mut stats.rs);
        self.au.merge(&mut stats.au);
    }

    /// Clear all stats.
    pub fn clear(&mut self) {
        *self = Stats::default();
    }

    /// Record the given error into the current stats.
    pub fn record_err(&mut self, err: DabError) {
        use crate::error::DabError::*;

        match err {
            FibCrc => self.fib.record_err(),
            ViterbiUnrecoverable => self.viterbi.record_err(),
            FireCode => self.fire.record_err(),
            ReedSolomonUnrecoverable => self.rs.record_err(),
            AccessUnitCrc => self.au.record_err(),
            _ => {},
        }
    }
}

impl HasStats for Stats {
    fn stats(&mut self) -> &mut Stats { self }
}

/// Indicates that a type captures statistics.
pub trait HasStats {
    /// Retrieve captured statistics.
    fn stats(&mut self) -> &mut Stats;
}
