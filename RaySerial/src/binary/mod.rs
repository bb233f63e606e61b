//! Low-level binary primitives shared by every format

pub mod bitfield;
pub mod checksum;
pub mod cursor;
pub mod patch;
pub mod pointer;
pub mod writer;

pub use bitfield::{BitField, BitFieldGroup, Container};
pub use checksum::{ChecksumAlgorithm, ChecksumPlacement, ChecksumRegion, xor_in_place};
pub use cursor::Reader;
pub use patch::{PendingPatch, PointerPatcher};
pub use pointer::{Pointer, Segment, SegmentId, SegmentMap, raw_pointer};
pub use writer::Writer;
