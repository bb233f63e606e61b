//! XOR-obfuscated byte regions with an adjacent 8-bit checksum
//!
//! PC data files hide image data behind a single-byte XOR key and guard it
//! with a checksum byte stored right before or right after the data. The
//! checksum always covers the plain (de-XORed) bytes and never itself.

use super::cursor::Reader;
use super::writer::Writer;
use crate::diagnostics::Warning;
use crate::error::{Error, Result};

/// How the checksum byte is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// Wrapping sum of all bytes
    Additive,
    /// XOR of all bytes
    Xor,
}

impl ChecksumAlgorithm {
    pub fn compute(self, bytes: &[u8]) -> u8 {
        match self {
            Self::Additive => bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)),
            Self::Xor => bytes.iter().fold(0u8, |acc, &b| acc ^ b),
        }
    }
}

/// Where the checksum byte sits relative to the data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPlacement {
    Before,
    After,
}

/// Apply a single-byte XOR key in place. XOR is its own inverse.
pub fn xor_in_place(bytes: &mut [u8], key: u8) {
    for b in bytes {
        *b ^= key;
    }
}

/// Description of one checksummed region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumRegion {
    /// XOR key applied to the stored bytes
    pub xor_key: Option<u8>,
    /// `None` for regions that carry no checksum byte
    pub algorithm: Option<ChecksumAlgorithm>,
    pub placement: ChecksumPlacement,
}

impl ChecksumRegion {
    pub const fn new(algorithm: ChecksumAlgorithm, placement: ChecksumPlacement) -> Self {
        Self {
            xor_key: None,
            algorithm: Some(algorithm),
            placement,
        }
    }

    /// XOR only, no checksum byte.
    pub const fn xor_only(key: u8) -> Self {
        Self {
            xor_key: Some(key),
            algorithm: None,
            placement: ChecksumPlacement::After,
        }
    }

    #[must_use]
    pub const fn with_xor(mut self, key: u8) -> Self {
        self.xor_key = Some(key);
        self
    }

    /// Checksum of plain bytes, if this region has one.
    pub fn checksum(&self, plain: &[u8]) -> Option<u8> {
        self.algorithm.map(|algorithm| algorithm.compute(plain))
    }

    /// Number of bytes the region occupies for `len` bytes of data.
    pub fn stored_len(&self, len: usize) -> usize {
        len + usize::from(self.algorithm.is_some())
    }

    /// Read `len` data bytes plus the checksum byte. Returns the plain bytes
    /// and the stored checksum.
    ///
    /// A mismatch is reported to the session's diagnostics and decoding
    /// continues with the bytes as read, unless strict checksums are enabled.
    pub fn read(
        &self,
        r: &mut Reader<'_>,
        len: usize,
        structure: &'static str,
    ) -> Result<(Vec<u8>, Option<u8>)> {
        let mut stored = None;
        let mut checksum_at = r.position();
        if self.algorithm.is_some() && self.placement == ChecksumPlacement::Before {
            stored = Some(r.read_u8()?);
        }

        let mut data = r.read_bytes(len)?.to_vec();
        if let Some(key) = self.xor_key {
            xor_in_place(&mut data, key);
        }

        if self.algorithm.is_some() && self.placement == ChecksumPlacement::After {
            checksum_at = r.position();
            stored = Some(r.read_u8()?);
        }

        if let (Some(stored), Some(computed)) = (stored, self.checksum(&data)) {
            if stored != computed {
                let offset = checksum_at.display_offset();
                if r.options().strict_checksums {
                    return Err(Error::ChecksumMismatch {
                        structure,
                        offset,
                        stored,
                        computed,
                    });
                }
                r.warn(Warning::ChecksumMismatch {
                    structure,
                    offset,
                    stored,
                    computed,
                });
            }
        }
        Ok((data, stored))
    }

    /// Write plain bytes, obfuscated, with a freshly computed checksum.
    /// Returns the checksum written.
    pub fn write(&self, w: &mut Writer, plain: &[u8]) -> Option<u8> {
        let checksum = self.checksum(plain);
        if let (Some(c), ChecksumPlacement::Before) = (checksum, self.placement) {
            w.write_u8(c);
        }
        match self.xor_key {
            Some(key) => {
                let mut stored = plain.to_vec();
                xor_in_place(&mut stored, key);
                w.write_bytes(&stored);
            }
            None => w.write_bytes(plain),
        }
        if let (Some(c), ChecksumPlacement::After) = (checksum, self.placement) {
            w.write_u8(c);
        }
        checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::pointer::{SegmentId, SegmentMap};
    use crate::diagnostics::CollectingSink;
    use crate::options::CodecOptions;
    use crate::version::{EngineVersion, VersionContext};
    use pretty_assertions::assert_eq;

    const PAYLOAD: &[u8] = &[0x10, 0x20, 0x30, 0xF0];

    fn encode(region: ChecksumRegion) -> Vec<u8> {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let mut w = Writer::new(ctx, SegmentId(0), Some(0));
        region.write(&mut w, PAYLOAD);
        w.finish().unwrap()
    }

    fn decode(
        region: ChecksumRegion,
        bytes: Vec<u8>,
        options: &CodecOptions,
    ) -> (Result<(Vec<u8>, Option<u8>)>, CollectingSink) {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let mut map = SegmentMap::new();
        let id = map.add("region", Some(0), bytes);
        let mut sink = CollectingSink::new();
        let start = map.pointer(id, 0).unwrap();
        let result = {
            let mut r = Reader::new(&map, ctx, options, &mut sink, start);
            region.read(&mut r, PAYLOAD.len(), "Test")
        };
        (result, sink)
    }

    #[test]
    fn test_algorithms() {
        assert_eq!(ChecksumAlgorithm::Additive.compute(PAYLOAD), 0x50);
        assert_eq!(ChecksumAlgorithm::Xor.compute(PAYLOAD), 0xF0);
    }

    #[test]
    fn test_placement_symmetry() {
        let before = ChecksumRegion::new(ChecksumAlgorithm::Additive, ChecksumPlacement::Before).with_xor(0x8F);
        let after = ChecksumRegion::new(ChecksumAlgorithm::Additive, ChecksumPlacement::After).with_xor(0x8F);

        let before_bytes = encode(before);
        let after_bytes = encode(after);
        assert_eq!(before_bytes[0], 0x50);
        assert_eq!(after_bytes[4], 0x50);
        assert_eq!(&before_bytes[1..], &after_bytes[..4]);

        let options = CodecOptions::default();
        let (b, sink_b) = decode(before, before_bytes, &options);
        let (a, sink_a) = decode(after, after_bytes, &options);
        assert_eq!(b.unwrap(), (PAYLOAD.to_vec(), Some(0x50)));
        assert_eq!(a.unwrap(), (PAYLOAD.to_vec(), Some(0x50)));
        assert!(sink_b.warnings.is_empty());
        assert!(sink_a.warnings.is_empty());
    }

    #[test]
    fn test_mismatch_is_a_warning() {
        let region = ChecksumRegion::new(ChecksumAlgorithm::Xor, ChecksumPlacement::After);
        let mut bytes = encode(region);
        bytes[4] ^= 0xFF;

        let (result, sink) = decode(region, bytes.clone(), &CodecOptions::default());
        let (data, stored) = result.unwrap();
        assert_eq!(data, PAYLOAD.to_vec());
        assert_eq!(stored, Some(0x0F));
        assert_eq!(
            sink.warnings,
            vec![Warning::ChecksumMismatch {
                structure: "Test",
                offset: 4,
                stored: 0x0F,
                computed: 0xF0,
            }]
        );

        let strict = CodecOptions::default().with_strict_checksums(true);
        let (result, _) = decode(region, bytes, &strict);
        assert!(matches!(result, Err(Error::ChecksumMismatch { stored: 0x0F, .. })));
    }

    #[test]
    fn test_reencode_is_idempotent() {
        let region = ChecksumRegion::new(ChecksumAlgorithm::Additive, ChecksumPlacement::Before).with_xor(0x8F);
        let first = encode(region);
        let (decoded, _) = decode(region, first.clone(), &CodecOptions::default());
        let (plain, _) = decoded.unwrap();
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let mut w = Writer::new(ctx, SegmentId(0), Some(0));
        region.write(&mut w, &plain);
        assert_eq!(w.finish().unwrap(), first);
    }

    #[test]
    fn test_xor_only_region() {
        let region = ChecksumRegion::xor_only(0x8F);
        let bytes = encode(region);
        assert_eq!(bytes.len(), region.stored_len(PAYLOAD.len()));
        assert_eq!(bytes[0], 0x10 ^ 0x8F);
        let (result, _) = decode(region, bytes, &CodecOptions::default());
        assert_eq!(result.unwrap(), (PAYLOAD.to_vec(), None));
    }
}
