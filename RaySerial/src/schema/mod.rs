//! Version-dispatched field layouts
//!
//! Each structure maps a [`VersionContext`] to an ordered list of
//! [`FieldOp`]s. The mapping is a pure function with one match arm per
//! supported release; anything else is [`Error::UnsupportedVariant`].
//! [`decode_record`] and [`encode_record`] interpret the list in either
//! direction, so a layout written once serves both.
//!
//! Layouts are selected afresh at every structure boundary, so nested
//! structures and array elements may pick different branches.
//!
//! [`Error::UnsupportedVariant`]: crate::Error::UnsupportedVariant

mod record;

pub use record::{Record, Value};

use crate::binary::{BitFieldGroup, Container, Reader, Writer};
use crate::error::{Error, Result};
use crate::version::VersionContext;

/// Storage of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U24,
    U32,
    I32,
    Bool,
    Bytes(usize),
    Pointer,
    /// Several named sub-fields packed into one integer
    Bits(BitFieldGroup),
    /// Unused bytes, kept so re-encoding is byte-exact
    Padding(usize),
}

impl FieldKind {
    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Bool => 1,
            Self::U16 | Self::I16 => 2,
            Self::U24 => 3,
            Self::U32 | Self::I32 | Self::Pointer => 4,
            Self::Bytes(n) | Self::Padding(n) => *n,
            Self::Bits(group) => group.container().size(),
        }
    }
}

/// One step of a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOp {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldOp {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Shorthand used by layout functions.
pub const fn op(name: &'static str, kind: FieldKind) -> FieldOp {
    FieldOp::new(name, kind)
}

/// Total encoded size of a layout
pub fn layout_size(layout: &[FieldOp]) -> usize {
    layout.iter().map(|op| op.kind.size()).sum()
}

/// A structure whose fields are chosen by the version context.
pub trait Schema {
    /// Structure name used in diagnostics
    const NAME: &'static str;

    /// Field layout for `ctx`.
    fn layout(ctx: &VersionContext) -> Result<Vec<FieldOp>>;
}

/// Read one record following `layout`.
pub fn decode_record(r: &mut Reader<'_>, layout: &[FieldOp]) -> Result<Record> {
    let mut record = Record::new();
    for op in layout {
        match &op.kind {
            FieldKind::U8 => record.set(op.name, Value::UInt(u64::from(r.read_u8()?))),
            FieldKind::I8 => record.set(op.name, Value::Int(i64::from(r.read_i8()?))),
            FieldKind::U16 => record.set(op.name, Value::UInt(u64::from(r.read_u16()?))),
            FieldKind::I16 => record.set(op.name, Value::Int(i64::from(r.read_i16()?))),
            FieldKind::U24 => record.set(op.name, Value::UInt(u64::from(r.read_u24()?))),
            FieldKind::U32 => record.set(op.name, Value::UInt(u64::from(r.read_u32()?))),
            FieldKind::I32 => record.set(op.name, Value::Int(i64::from(r.read_i32()?))),
            FieldKind::Bool => record.set(op.name, Value::Bool(r.read_bool()?)),
            FieldKind::Bytes(n) | FieldKind::Padding(n) => {
                record.set(op.name, Value::Bytes(r.read_bytes(*n)?.to_vec()));
            }
            FieldKind::Pointer => record.set(op.name, Value::Pointer(r.read_pointer()?)),
            FieldKind::Bits(group) => {
                let raw = match group.container() {
                    Container::U8 => u32::from(r.read_u8()?),
                    Container::U16 => u32::from(r.read_u16()?),
                    Container::U32 => r.read_u32()?,
                };
                for (field, value) in group.fields().iter().zip(group.unpack(raw)) {
                    let value = if field.signed {
                        Value::Int(value)
                    } else {
                        Value::UInt(value as u64)
                    };
                    record.set(field.name, value);
                }
            }
        }
    }
    Ok(record)
}

/// Write `record` following `layout`.
pub fn encode_record(w: &mut Writer, layout: &[FieldOp], record: &Record) -> Result<()> {
    for op in layout {
        match &op.kind {
            FieldKind::U8 => w.write_u8(narrow(op.name, record.uint(op.name)?, 8)? as u8),
            FieldKind::I8 => w.write_i8(narrow_signed(op.name, record.int(op.name)?, 8)? as i8),
            FieldKind::U16 => w.write_u16(narrow(op.name, record.uint(op.name)?, 16)? as u16),
            FieldKind::I16 => w.write_i16(narrow_signed(op.name, record.int(op.name)?, 16)? as i16),
            FieldKind::U24 => w.write_u24(narrow(op.name, record.uint(op.name)?, 24)? as u32),
            FieldKind::U32 => w.write_u32(narrow(op.name, record.uint(op.name)?, 32)? as u32),
            FieldKind::I32 => w.write_i32(narrow_signed(op.name, record.int(op.name)?, 32)? as i32),
            FieldKind::Bool => w.write_bool(record.bool(op.name)?),
            FieldKind::Bytes(n) => {
                let bytes = record.bytes(op.name)?;
                if bytes.len() != *n {
                    return Err(Error::FieldOverflow {
                        field: op.name,
                        value: bytes.len() as i64,
                        bits: (*n * 8) as u32,
                    });
                }
                w.write_bytes(bytes);
            }
            FieldKind::Padding(n) => match record.bytes(op.name) {
                Ok(bytes) if bytes.len() == *n => w.write_bytes(bytes),
                _ => w.write_bytes(&vec![0u8; *n]),
            },
            FieldKind::Pointer => w.write_pointer(record.pointer(op.name)?.as_ref())?,
            FieldKind::Bits(group) => {
                let values = group
                    .fields()
                    .iter()
                    .map(|field| record.int(field.name))
                    .collect::<Result<Vec<_>>>()?;
                let raw = group.pack(&values)?;
                match group.container() {
                    Container::U8 => w.write_u8(raw as u8),
                    Container::U16 => w.write_u16(raw as u16),
                    Container::U32 => w.write_u32(raw),
                }
            }
        }
    }
    Ok(())
}

fn narrow(field: &'static str, value: u64, bits: u32) -> Result<u64> {
    if bits < 64 && value >> bits != 0 {
        return Err(Error::FieldOverflow {
            field,
            value: value as i64,
            bits,
        });
    }
    Ok(value)
}

fn narrow_signed(field: &'static str, value: i64, bits: u32) -> Result<i64> {
    let half = 1i64 << (bits - 1);
    if value < -half || value >= half {
        return Err(Error::FieldOverflow { field, value, bits });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BitField, SegmentId, SegmentMap};
    use crate::diagnostics::CollectingSink;
    use crate::options::CodecOptions;
    use crate::version::EngineVersion;
    use pretty_assertions::assert_eq;

    fn sample_layout() -> Vec<FieldOp> {
        vec![
            op("kind", FieldKind::U8),
            op("speed", FieldKind::I8),
            op("x", FieldKind::I16),
            op(
                "",
                FieldKind::Bits(
                    BitFieldGroup::new(
                        Container::U8,
                        vec![BitField::unsigned("lo", 4), BitField::signed("hi", 4)],
                    )
                    .unwrap(),
                ),
            ),
            op("pad", FieldKind::Padding(1)),
            op("offset", FieldKind::U24),
            op("flag", FieldKind::Bool),
        ]
    }

    #[test]
    fn test_record_round_trip_big_endian() {
        let bytes = vec![0x07, 0xFE, 0xFF, 0x9C, 0x9A, 0x00, 0x01, 0x02, 0x03, 0x01];
        let ctx = VersionContext::for_version(EngineVersion::Jaguar);
        let layout = sample_layout();
        assert_eq!(layout_size(&layout), bytes.len());

        let mut map = SegmentMap::new();
        let id = map.add("data", Some(0), bytes.clone());
        let options = CodecOptions::default();
        let mut sink = CollectingSink::new();
        let mut r = Reader::new(&map, ctx, &options, &mut sink, map.pointer(id, 0).unwrap());
        let record = decode_record(&mut r, &layout).unwrap();

        assert_eq!(record.uint("kind").unwrap(), 7);
        assert_eq!(record.int("speed").unwrap(), -2);
        assert_eq!(record.int("x").unwrap(), -100);
        assert_eq!(record.uint("lo").unwrap(), 0xA);
        assert_eq!(record.int("hi").unwrap(), -7);
        assert_eq!(record.uint("offset").unwrap(), 0x010203);
        assert!(record.bool("flag").unwrap());

        let mut w = Writer::new(ctx, SegmentId(1), Some(0));
        encode_record(&mut w, &layout, &record).unwrap();
        assert_eq!(w.finish().unwrap(), bytes);
    }

    #[test]
    fn test_encode_rejects_overflow() {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let layout = vec![op("width", FieldKind::U8)];
        let mut record = Record::new();
        record.set("width", Value::UInt(256));
        let mut w = Writer::new(ctx, SegmentId(0), Some(0));
        let err = encode_record(&mut w, &layout, &record).unwrap_err();
        assert!(matches!(err, Error::FieldOverflow { field: "width", value: 256, bits: 8 }));
    }

    #[test]
    fn test_encode_requires_fields() {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        let layout = vec![op("height", FieldKind::U16)];
        let mut w = Writer::new(ctx, SegmentId(0), Some(0));
        let err = encode_record(&mut w, &layout, &Record::new()).unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "height"));
    }
}
