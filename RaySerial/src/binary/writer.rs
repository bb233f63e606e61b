//! Output buffer with deferred pointer slots

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::patch::PointerPatcher;
use super::pointer::{Pointer, SegmentId, raw_pointer};
use crate::error::Result;
use crate::version::{Endian, VersionContext};

/// Writes values at an explicit position into a growable buffer.
///
/// Writing past the end extends the buffer; writing before it overwrites,
/// which is how in-place re-encoding of ROM tables works.
pub struct Writer {
    buf: Vec<u8>,
    pos: usize,
    segment: SegmentId,
    base: Option<u64>,
    version: VersionContext,
    patcher: PointerPatcher,
}

impl Writer {
    /// Empty buffer that will become `segment`, mapped at `base`.
    pub fn new(version: VersionContext, segment: SegmentId, base: Option<u64>) -> Self {
        Self::over(Vec::new(), version, segment, base)
    }

    /// Write into existing bytes, starting at offset 0.
    pub fn over(buf: Vec<u8>, version: VersionContext, segment: SegmentId, base: Option<u64>) -> Self {
        Self {
            buf,
            pos: 0,
            segment,
            base,
            version,
            patcher: PointerPatcher::new(),
        }
    }

    pub fn version(&self) -> &VersionContext {
        &self.version
    }

    pub fn position(&self) -> Pointer {
        Pointer::new(self.segment, self.pos as u64, self.base)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn seek(&mut self, offset: u64) {
        self.pos = offset as usize;
    }

    /// Run `f` at `offset`, then return to the current position.
    pub fn at<T>(&mut self, offset: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        self.pos = offset as usize;
        let result = f(self);
        self.pos = saved;
        result
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_u8(v as u8);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut bytes = [0u8; 2];
        match self.version.endian() {
            Endian::Little => LittleEndian::write_u16(&mut bytes, v),
            Endian::Big => BigEndian::write_u16(&mut bytes, v),
        }
        self.write_bytes(&bytes);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    pub fn write_u24(&mut self, v: u32) {
        let mut bytes = [0u8; 3];
        match self.version.endian() {
            Endian::Little => LittleEndian::write_u24(&mut bytes, v),
            Endian::Big => BigEndian::write_u24(&mut bytes, v),
        }
        self.write_bytes(&bytes);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut bytes = [0u8; 4];
        match self.version.endian() {
            Endian::Little => LittleEndian::write_u32(&mut bytes, v),
            Endian::Big => BigEndian::write_u32(&mut bytes, v),
        }
        self.write_bytes(&bytes);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    /// Write a pointer whose target is already known.
    pub fn write_pointer(&mut self, pointer: Option<&Pointer>) -> Result<()> {
        let raw = raw_pointer(pointer)?;
        self.write_u32(raw);
        Ok(())
    }

    /// Write a zero placeholder to be patched once `target` is placed.
    pub fn write_deferred_pointer(&mut self, target: impl Into<String>) {
        self.patcher.reserve(self.pos, target);
        self.write_u32(0);
    }

    /// Record that `target` starts at the current position.
    pub fn mark(&mut self, target: impl Into<String>) -> Result<()> {
        let here = self.position();
        self.patcher.resolve(target, Some(here))
    }

    /// Record an explicit location (or null) for `target`.
    pub fn resolve(&mut self, target: impl Into<String>, pointer: Option<Pointer>) -> Result<()> {
        self.patcher.resolve(target, pointer)
    }

    /// Apply all deferred pointers and return the bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.patcher.apply(&mut self.buf, self.version.endian())?;
        tracing::debug!("finished {} bytes, {} pointer slots patched", self.buf.len(), count);
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::cursor::Reader;
    use crate::binary::pointer::SegmentMap;
    use crate::diagnostics::CollectingSink;
    use crate::error::Error;
    use crate::options::CodecOptions;
    use crate::version::EngineVersion;

    #[test]
    fn test_forward_pointers_patched_to_block_offsets() {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let mut writer = Writer::new(ctx, SegmentId(0), Some(0));
        writer.write_deferred_pointer("first");
        writer.write_deferred_pointer("second");

        writer.mark("first").unwrap();
        writer.write_u16(3);
        writer.write_bytes(&[0xAA; 3]);
        let first_at = 4 + 4;

        writer.mark("second").unwrap();
        writer.write_u16(5);
        writer.write_bytes(&[0xBB; 5]);
        let second_at = first_at + 2 + 3;

        let bytes = writer.finish().unwrap();

        let mut map = SegmentMap::new();
        let id = map.add("out", Some(0), bytes);
        let options = CodecOptions::default();
        let mut sink = CollectingSink::new();
        let mut reader = Reader::new(&map, ctx, &options, &mut sink, map.pointer(id, 0).unwrap());
        let first = reader.read_pointer().unwrap().unwrap();
        let second = reader.read_pointer().unwrap().unwrap();
        assert_eq!(first.offset(), first_at);
        assert_eq!(second.offset(), second_at);

        reader.seek(second);
        assert_eq!(reader.read_u16().unwrap(), 5);
    }

    #[test]
    fn test_unresolved_slot_fails_finish() {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let mut writer = Writer::new(ctx, SegmentId(0), Some(0));
        writer.write_deferred_pointer("never");
        assert!(matches!(writer.finish(), Err(Error::UnresolvedPatch { slot: 0, .. })));
    }

    #[test]
    fn test_overwrite_in_place() {
        let ctx = VersionContext::for_version(EngineVersion::Gba);
        let mut writer = Writer::over(vec![0; 8], ctx, SegmentId(0), None);
        writer.seek(2);
        writer.write_u16(0xBEEF);
        writer.at(7, |w| {
            w.write_u16(0x0102);
            Ok(())
        })
        .unwrap();
        assert_eq!(writer.position().offset(), 4);
        assert_eq!(writer.finish().unwrap(), vec![0, 0, 0xEF, 0xBE, 0, 0, 0, 0x02, 0x01]);
    }
}
