//! Pointers and the segments they point into
//!
//! A session may be backed by several byte buffers (a ROM image, a level
//! file, a memory dump). Each is a [`Segment`]. Segments that sit in the
//! game's address space carry a base address, which lets pointers into
//! different segments be compared.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies a segment within a [`SegmentMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u16);

/// An addressable position.
///
/// Null pointers are `Option<Pointer>::None` and are written as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    segment: SegmentId,
    offset: u64,
    base: Option<u64>,
}

impl Pointer {
    pub const fn new(segment: SegmentId, offset: u64, base: Option<u64>) -> Self {
        Self {
            segment,
            offset,
            base,
        }
    }

    pub const fn segment(&self) -> SegmentId {
        self.segment
    }

    /// Offset within the segment
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Address in the shared pointer space, if the segment is mapped
    pub fn absolute(&self) -> Option<u64> {
        self.base.map(|base| base + self.offset)
    }

    /// Absolute address when mapped, segment offset otherwise. Used for
    /// diagnostics only.
    pub fn display_offset(&self) -> u64 {
        self.absolute().unwrap_or(self.offset)
    }

    /// Signed byte distance from `self` to `other`.
    pub fn distance_to(&self, other: &Pointer) -> Result<i64> {
        if self.segment == other.segment {
            return Ok(other.offset as i64 - self.offset as i64);
        }
        match (self.absolute(), other.absolute()) {
            (Some(from), Some(to)) => Ok(to as i64 - from as i64),
            _ => Err(Error::IncompatibleSegment {
                from: self.segment.0,
                to: other.segment.0,
            }),
        }
    }

    #[must_use]
    pub const fn advance(&self, bytes: u64) -> Self {
        Self {
            segment: self.segment,
            offset: self.offset + bytes,
            base: self.base,
        }
    }

    /// Value stored in a 32-bit pointer slot.
    pub fn to_raw(&self) -> Result<u32> {
        let absolute = self.absolute().ok_or(Error::UnmappedPointer {
            segment: self.segment.0,
        })?;
        u32::try_from(absolute).map_err(|_| Error::PointerOutOfRange(absolute))
    }
}

/// Raw slot value for an optional pointer
pub fn raw_pointer(pointer: Option<&Pointer>) -> Result<u32> {
    pointer.map_or(Ok(0), Pointer::to_raw)
}

/// One backing byte buffer
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    /// Address of the first byte in the game's pointer space
    pub base: Option<u64>,
    pub data: Vec<u8>,
    /// The game maps this buffer as a whole; a pointer to its start spans all of it
    pub memory_mapped: bool,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pointer(&self, offset: u64) -> Pointer {
        Pointer::new(self.id, offset, self.base)
    }

    /// Whether `address` falls inside this segment (one past the end counts).
    fn contains(&self, address: u64) -> bool {
        self.base
            .is_some_and(|base| address >= base && address - base <= self.data.len() as u64)
    }
}

/// All backing buffers of a session
#[derive(Debug, Clone, Default)]
pub struct SegmentMap {
    segments: Vec<Segment>,
}

impl SegmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer and return its id.
    pub fn add(&mut self, name: impl Into<String>, base: Option<u64>, data: Vec<u8>) -> SegmentId {
        self.push(name.into(), base, data, false)
    }

    /// Register a buffer the game maps as a single block.
    pub fn add_memory_mapped(
        &mut self,
        name: impl Into<String>,
        base: Option<u64>,
        data: Vec<u8>,
    ) -> SegmentId {
        self.push(name.into(), base, data, true)
    }

    fn push(&mut self, name: String, base: Option<u64>, data: Vec<u8>, memory_mapped: bool) -> SegmentId {
        let id = SegmentId(self.segments.len() as u16);
        self.segments.push(Segment {
            id,
            name,
            base,
            data,
            memory_mapped,
        });
        id
    }

    pub fn segment(&self, id: SegmentId) -> Result<&Segment> {
        self.segments
            .get(usize::from(id.0))
            .ok_or(Error::UnknownSegment(id.0))
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Result<&mut Segment> {
        self.segments
            .get_mut(usize::from(id.0))
            .ok_or(Error::UnknownSegment(id.0))
    }

    pub fn pointer(&self, id: SegmentId, offset: u64) -> Result<Pointer> {
        Ok(self.segment(id)?.pointer(offset))
    }

    /// Map a stored absolute address to a pointer. Returns `None` for
    /// addresses outside every mapped segment.
    pub fn resolve(&self, address: u64) -> Option<Pointer> {
        self.segments
            .iter()
            .find(|segment| segment.contains(address))
            .and_then(|segment| {
                segment
                    .base
                    .map(|base| segment.pointer(address - base))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_within_segment() {
        let mut map = SegmentMap::new();
        let rom = map.add("rom", Some(0x0800_0000), vec![0; 0x100]);
        let a = map.pointer(rom, 0x10).unwrap();
        let b = a.advance(0x28);
        assert_eq!(a.distance_to(&b).unwrap(), 0x28);
        assert_eq!(b.distance_to(&a).unwrap(), -0x28);
        assert_eq!(b.to_raw().unwrap(), 0x0800_0038);
    }

    #[test]
    fn test_distance_across_segments() {
        let mut map = SegmentMap::new();
        let rom = map.add("rom", Some(0x0800_0000), vec![0; 0x100]);
        let ram = map.add("ram", Some(0x0200_0000), vec![0; 0x100]);
        let loose = map.add("loose", None, vec![0; 0x100]);

        let a = map.pointer(ram, 0).unwrap();
        let b = map.pointer(rom, 0).unwrap();
        assert_eq!(a.distance_to(&b).unwrap(), 0x0600_0000);

        let c = map.pointer(loose, 0).unwrap();
        assert!(matches!(
            a.distance_to(&c),
            Err(Error::IncompatibleSegment { from: 1, to: 2 })
        ));
        assert!(matches!(c.to_raw(), Err(Error::UnmappedPointer { segment: 2 })));
    }

    #[test]
    fn test_resolve() {
        let mut map = SegmentMap::new();
        let rom = map.add("rom", Some(0x0800_0000), vec![0; 0x100]);
        assert_eq!(map.resolve(0x0800_0040), Some(Pointer::new(rom, 0x40, Some(0x0800_0000))));
        assert_eq!(map.resolve(0x0800_0100).map(|p| p.offset()), Some(0x100));
        assert_eq!(map.resolve(0x0800_0101), None);
        assert_eq!(map.resolve(0x40), None);
    }

    #[test]
    fn test_null_is_zero() {
        assert_eq!(raw_pointer(None).unwrap(), 0);
    }
}
