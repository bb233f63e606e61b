//! Non-fatal decode diagnostics
//!
//! Warnings never change what a decoder returns. They are handed to a
//! [`DiagnosticSink`] chosen by the caller.

use thiserror::Error;

/// A recoverable problem found while decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A checksum byte does not match the data it covers.
    #[error("{structure}: checksum at {offset:#x} is {stored:#04x}, data sums to {computed:#04x}")]
    ChecksumMismatch {
        structure: &'static str,
        offset: u64,
        stored: u8,
        computed: u8,
    },

    /// The cursor did not end up where a stored pointer says the next block starts.
    #[error("{block} block offset is incorrect: expected {expected:#x}, at {actual:#x}")]
    OffsetMismatch {
        block: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// Receiver for [`Warning`]s.
pub trait DiagnosticSink {
    fn warn(&mut self, warning: Warning);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
    }
}

/// Keeps every warning for later inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub warnings: Vec<Warning>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for CollectingSink {
    fn warn(&mut self, warning: Warning) {
        tracing::debug!("collected warning: {}", warning);
        self.warnings.push(warning);
    }
}
