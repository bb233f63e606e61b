//! Deferred pointer slots
//!
//! A structure often stores pointers to blocks written after it. The writer
//! emits a zero placeholder for each such slot and records it here; once the
//! blocks are written their offsets are resolved, and [`PointerPatcher::apply`]
//! overwrites every placeholder in a second pass.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use indexmap::IndexMap;

use super::pointer::Pointer;
use crate::error::{Error, Result};
use crate::version::Endian;

/// A placeholder waiting for its target's final offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPatch {
    /// Offset of the placeholder in the output buffer
    pub slot: usize,
    /// Name of the entity the slot points to
    pub target: String,
}

/// Two-pass pointer fixups for one output buffer
#[derive(Debug, Clone, Default)]
pub struct PointerPatcher {
    pending: Vec<PendingPatch>,
    resolved: IndexMap<String, Option<Pointer>>,
}

impl PointerPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass 1: remember that `slot` must point at `target`.
    pub fn reserve(&mut self, slot: usize, target: impl Into<String>) {
        self.pending.push(PendingPatch {
            slot,
            target: target.into(),
        });
    }

    /// Give `target` its final location. `None` writes a null pointer.
    pub fn resolve(&mut self, target: impl Into<String>, pointer: Option<Pointer>) -> Result<()> {
        let target = target.into();
        if self.resolved.contains_key(&target) {
            return Err(Error::DuplicatePatchTarget(target));
        }
        self.resolved.insert(target, pointer);
        Ok(())
    }

    pub fn pending(&self) -> &[PendingPatch] {
        &self.pending
    }

    /// Pass 2: write every recorded slot. Fails on the first slot whose
    /// target was never resolved.
    pub fn apply(&self, buffer: &mut [u8], endian: Endian) -> Result<usize> {
        for patch in &self.pending {
            let pointer = self.resolved.get(&patch.target).ok_or_else(|| Error::UnresolvedPatch {
                slot: patch.slot as u64,
                target: patch.target.clone(),
            })?;
            let raw = pointer.as_ref().map_or(Ok(0), Pointer::to_raw)?;
            let len = buffer.len();
            let slot = buffer
                .get_mut(patch.slot..patch.slot + 4)
                .ok_or(Error::UnexpectedEof {
                    offset: patch.slot as u64,
                    need: 4,
                    have: len.saturating_sub(patch.slot),
                })?;
            match endian {
                Endian::Little => LittleEndian::write_u32(slot, raw),
                Endian::Big => BigEndian::write_u32(slot, raw),
            }
            tracing::trace!("patched slot {:#x} -> {} ({:#x})", patch.slot, patch.target, raw);
        }
        Ok(self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::pointer::SegmentId;

    #[test]
    fn test_apply_writes_resolved_values() {
        let mut patcher = PointerPatcher::new();
        let mut buffer = vec![0u8; 12];
        patcher.reserve(0, "a");
        patcher.reserve(8, "b");
        patcher
            .resolve("b", Some(Pointer::new(SegmentId(0), 0x20, Some(0))))
            .unwrap();
        patcher.resolve("a", None).unwrap();
        assert_eq!(patcher.apply(&mut buffer, Endian::Big).unwrap(), 2);
        assert_eq!(buffer, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x20]);
    }

    #[test]
    fn test_unresolved_slot_is_fatal() {
        let mut patcher = PointerPatcher::new();
        patcher.reserve(4, "missing");
        let err = patcher.apply(&mut [0u8; 8], Endian::Little).unwrap_err();
        assert!(matches!(err, Error::UnresolvedPatch { slot: 4, ref target } if target == "missing"));
    }

    #[test]
    fn test_slot_past_buffer_end() {
        let mut patcher = PointerPatcher::new();
        patcher.reserve(6, "a");
        patcher.resolve("a", None).unwrap();
        let err = patcher.apply(&mut [0u8; 8], Endian::Little).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { offset: 6, need: 4, have: 2 }));
    }

    #[test]
    fn test_double_resolution_is_fatal() {
        let mut patcher = PointerPatcher::new();
        patcher.resolve("a", None).unwrap();
        assert!(matches!(patcher.resolve("a", None), Err(Error::DuplicatePatchTarget(_))));
    }
}
