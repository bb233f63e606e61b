//! Read cursor over a session's segments

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::pointer::{Pointer, SegmentMap};
use crate::diagnostics::{DiagnosticSink, Warning};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::version::{Endian, VersionContext};

/// Reads values at an explicit position. Integer byte order follows the
/// session's [`VersionContext`].
pub struct Reader<'a> {
    segments: &'a SegmentMap,
    version: VersionContext,
    options: &'a CodecOptions,
    sink: &'a mut dyn DiagnosticSink,
    pos: Pointer,
}

impl<'a> Reader<'a> {
    pub fn new(
        segments: &'a SegmentMap,
        version: VersionContext,
        options: &'a CodecOptions,
        sink: &'a mut dyn DiagnosticSink,
        start: Pointer,
    ) -> Self {
        Self {
            segments,
            version,
            options,
            sink,
            pos: start,
        }
    }

    pub fn version(&self) -> &VersionContext {
        &self.version
    }

    pub fn options(&self) -> &CodecOptions {
        self.options
    }

    pub fn segments(&self) -> &'a SegmentMap {
        self.segments
    }

    pub fn position(&self) -> Pointer {
        self.pos
    }

    pub fn seek(&mut self, pos: Pointer) {
        self.pos = pos;
    }

    /// Bytes left in the current segment.
    pub fn remaining(&self) -> Result<usize> {
        let segment = self.segments.segment(self.pos.segment())?;
        Ok(segment.len().saturating_sub(self.pos.offset() as usize))
    }

    pub fn warn(&mut self, warning: Warning) {
        self.sink.warn(warning);
    }

    /// Run `f` at `pos`, then return to the current position whether or not
    /// `f` succeeded.
    pub fn at<T>(&mut self, pos: Pointer, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        self.pos = pos;
        let result = f(self);
        self.pos = saved;
        result
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let segment = self.segments.segment(self.pos.segment())?;
        let start = self.pos.offset() as usize;
        let have = segment.len().saturating_sub(start);
        if n > have {
            return Err(Error::UnexpectedEof {
                offset: self.pos.offset(),
                need: n,
                have,
            });
        }
        self.pos = self.pos.advance(n as u64);
        Ok(&segment.data[start..start + n])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(match self.version.endian() {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(3)?;
        Ok(match self.version.endian() {
            Endian::Little => LittleEndian::read_u24(bytes),
            Endian::Big => BigEndian::read_u24(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(match self.version.endian() {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a 32-bit pointer slot. `0` is null. Values that map nowhere are
    /// an error unless the context tolerates stale pointers, in which case
    /// they are kept relative to the segment being read.
    pub fn read_pointer(&mut self) -> Result<Option<Pointer>> {
        let at = self.pos;
        let raw = u64::from(self.read_u32()?);
        if raw == 0 {
            return Ok(None);
        }
        if let Some(pointer) = self.segments.resolve(raw) {
            return Ok(Some(pointer));
        }
        if self.version.allows_invalid_pointers() {
            let segment = self.segments.segment(at.segment())?;
            let base = segment.base.unwrap_or(0);
            tracing::debug!("keeping unmapped pointer {:#x} read at {:#x}", raw, at.display_offset());
            return Ok(Some(segment.pointer(raw.saturating_sub(base))));
        }
        Err(Error::InvalidPointer {
            value: raw,
            offset: at.display_offset(),
        })
    }
}
