//! Codec options
//!
//! # Example
//!
//! ```
//! use rayserial::CodecOptions;
//!
//! let options = CodecOptions::new()
//!     .with_strict_checksums(true)
//!     .with_max_fixpoint_passes(8);
//! assert!(options.strict_checksums);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default hard ceiling on table re-decode passes
pub const DEFAULT_MAX_FIXPOINT_PASSES: usize = 16;

/// Default upper bound on the distance between consecutive table entries
pub const DEFAULT_SCAN_DISTANCE_CEILING: u64 = 0x10000;

/// Options shared by every decoder and encoder of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Fail on checksum mismatches instead of warning
    /// Default: false
    pub strict_checksums: bool,

    /// Maximum number of decode passes a pointer table may take to converge
    pub max_fixpoint_passes: usize,

    /// Largest gap (exclusive) between two consecutive entries accepted by
    /// the entry count scan
    pub scan_distance_ceiling: u64,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            strict_checksums: false,
            max_fixpoint_passes: DEFAULT_MAX_FIXPOINT_PASSES,
            scan_distance_ceiling: DEFAULT_SCAN_DISTANCE_CEILING,
        }
    }
}

impl CodecOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    #[must_use]
    pub fn with_strict_checksums(mut self, strict: bool) -> Self {
        self.strict_checksums = strict;
        self
    }

    #[must_use]
    pub fn with_max_fixpoint_passes(mut self, passes: usize) -> Self {
        self.max_fixpoint_passes = passes;
        self
    }

    #[must_use]
    pub fn with_scan_distance_ceiling(mut self, ceiling: u64) -> Self {
        self.scan_distance_ceiling = ceiling;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = CodecOptions::from_toml_str("strict_checksums = true\n").unwrap();
        assert!(options.strict_checksums);
        assert_eq!(options.max_fixpoint_passes, DEFAULT_MAX_FIXPOINT_PASSES);
        assert_eq!(options.scan_distance_ceiling, DEFAULT_SCAN_DISTANCE_CEILING);
    }

    #[test]
    fn test_bad_toml() {
        assert!(CodecOptions::from_toml_str("max_fixpoint_passes = \"many\"").is_err());
    }
}
