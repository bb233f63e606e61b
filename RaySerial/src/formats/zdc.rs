//! Rayman 2 PS1 collision zone data

use crate::binary::{BitField, BitFieldGroup, Container, Reader, Writer};
use crate::error::{Error, Result};
use crate::schema::{FieldKind, FieldOp, Record, Schema, Value, decode_record, encode_record, op};
use crate::version::{EngineBranch, EngineVersion, VersionContext};

/// A 12-bit and a 4-bit value sharing one `u16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZdcUnkData {
    pub data1: u16,
    pub data2: u8,
}

impl Schema for ZdcUnkData {
    const NAME: &'static str = "ZdcUnkData";

    fn layout(ctx: &VersionContext) -> Result<Vec<FieldOp>> {
        match (ctx.engine_branch, ctx.engine_version) {
            (EngineBranch::Ps1, EngineVersion::Rayman2Ps1) => Ok(vec![op(
                "data",
                FieldKind::Bits(BitFieldGroup::new(
                    Container::U16,
                    vec![BitField::unsigned("data1", 12), BitField::unsigned("data2", 4)],
                )?),
            )]),
            _ => Err(Error::unsupported(Self::NAME, ctx)),
        }
    }
}

impl ZdcUnkData {
    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        let start = r.position();
        let ctx = *r.version();
        Self::layout(&ctx)
            .and_then(|layout| decode_record(r, &layout))
            .and_then(|record| {
                Ok(Self {
                    data1: record.uint("data1")? as u16,
                    data2: record.uint("data2")? as u8,
                })
            })
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let start = w.position();
        let ctx = *w.version();
        let mut record = Record::new();
        record.set("data1", Value::UInt(u64::from(self.data1)));
        record.set("data2", Value::UInt(u64::from(self.data2)));
        Self::layout(&ctx)
            .and_then(|layout| encode_record(w, &layout, &record))
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }
}
