//! Sprite descriptors
//!
//! Every release stores sprite headers differently. The Jaguar packs the
//! height into 10 bits of a big-endian word; PS1 releases carry texture page
//! data; PC and GBA keep the hitbox offsets in two nibbles.

use crate::binary::{BitField, BitFieldGroup, Container, Reader, Writer};
use crate::error::{Error, Result};
use crate::schema::{FieldKind, FieldOp, Record, Schema, decode_record, encode_record, layout_size, op};
use crate::version::{EngineBranch, EngineVersion, VersionContext};

/// Image descriptor shared by sprite arrays of every release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub fields: Record,
}

impl Schema for Sprite {
    const NAME: &'static str = "Sprite";

    fn layout(ctx: &VersionContext) -> Result<Vec<FieldOp>> {
        use EngineVersion as V;

        match (ctx.engine_branch, ctx.engine_version) {
            (EngineBranch::Jaguar, V::Jaguar | V::JaguarProto) => jaguar_layout(),
            (EngineBranch::Ps1, V::Rayman2Ps1) => Ok(vec![
                op("width", FieldKind::U8),
                op("height", FieldKind::U8),
                op("hitbox_width", FieldKind::U8),
                op("hitbox_height", FieldKind::U8),
                hitbox_offsets()?,
                op("unknown4", FieldKind::U8),
                op("image_offset_in_page_x", FieldKind::U8),
                op("image_offset_in_page_y", FieldKind::U8),
                op("palette_info", FieldKind::U16),
                op("texture_page_info", FieldKind::U16),
            ]),
            (EngineBranch::Ps1, V::Ps1Jp | V::Ps1JpDemoVol3 | V::Ps1JpDemoVol6) => {
                let mut layout = vec![
                    op("image_buffer_offset", FieldKind::U32),
                    op("index", FieldKind::U16),
                    op("image_type", FieldKind::U16),
                    op("width", FieldKind::U16),
                    op("height", FieldKind::U16),
                    op("unknown1", FieldKind::U8),
                    op("unknown2", FieldKind::U8),
                ];
                layout.extend(ps1_texture_fields());
                Ok(layout)
            }
            (EngineBranch::Ps1, V::Saturn) => Ok(vec![
                op("image_buffer_offset", FieldKind::U32),
                op("index", FieldKind::U16),
                op("image_type", FieldKind::U16),
                op("width", FieldKind::U16),
                op("height", FieldKind::U16),
                op("palette_info", FieldKind::U16),
                op("unknown1", FieldKind::U8),
                op("unknown2", FieldKind::U8),
            ]),
            (EngineBranch::Ps1, V::Ps1) => {
                let mut layout = vec![op("image_buffer_offset", FieldKind::U32)];
                layout.extend(small_header()?);
                layout.extend(ps1_texture_fields());
                Ok(layout)
            }
            (EngineBranch::Pc, V::Pc | V::PcKit | V::PcEdu | V::PcFan | V::PocketPc)
            | (EngineBranch::Gba, V::Gba | V::Dsi) => {
                let mut layout = vec![op("image_buffer_offset", FieldKind::U32)];
                layout.extend(small_header()?);
                layout.push(op("unknown3", FieldKind::U8));
                layout.push(op("unknown4", FieldKind::U8));
                Ok(layout)
            }
            _ => Err(Error::unsupported(Self::NAME, ctx)),
        }
    }
}

fn jaguar_layout() -> Result<Vec<FieldOp>> {
    Ok(vec![
        op("image_buffer_offset", FieldKind::U24),
        op("jag_byte_03", FieldKind::U8),
        op("jag_byte_04", FieldKind::U8),
        op(
            "jag_bits_05",
            FieldKind::Bits(BitFieldGroup::new(
                Container::U16,
                vec![BitField::unsigned("jag_byte_05", 6), BitField::unsigned("height", 10)],
            )?),
        ),
        op("jag_ushort_07", FieldKind::U16),
        op("width", FieldKind::U8),
        op("jag_byte_0a", FieldKind::U8),
        op("jag_bytes_0b", FieldKind::Bytes(3)),
        op("jag_byte_0e", FieldKind::U8),
        op("index", FieldKind::U8),
    ])
}

fn hitbox_offsets() -> Result<FieldOp> {
    Ok(op(
        "hitbox_offsets",
        FieldKind::Bits(BitFieldGroup::new(
            Container::U8,
            vec![
                BitField::unsigned("hitbox_offset_x", 4),
                BitField::unsigned("hitbox_offset_y", 4),
            ],
        )?),
    ))
}

/// Byte-sized index, size and hitbox used by PC, GBA and most PS1 releases
fn small_header() -> Result<Vec<FieldOp>> {
    Ok(vec![
        op("index", FieldKind::U8),
        op("width", FieldKind::U8),
        op("height", FieldKind::U8),
        op("hitbox_width", FieldKind::U8),
        op("hitbox_height", FieldKind::U8),
        hitbox_offsets()?,
    ])
}

fn ps1_texture_fields() -> Vec<FieldOp> {
    vec![
        op("unknown3", FieldKind::U8),
        op("unknown4", FieldKind::U8),
        op("palette_info", FieldKind::U16),
        op("texture_page_info", FieldKind::U16),
        op("image_offset_in_page_x", FieldKind::U8),
        op("image_offset_in_page_y", FieldKind::U8),
        op("unknown6", FieldKind::U16),
    ]
}

impl Sprite {
    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        let start = r.position();
        let ctx = *r.version();
        Self::layout(&ctx)
            .and_then(|layout| decode_record(r, &layout))
            .map(|fields| Self { fields })
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let start = w.position();
        let ctx = *w.version();
        Self::layout(&ctx)
            .and_then(|layout| encode_record(w, &layout, &self.fields))
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    /// Encoded size for `ctx`
    pub fn size(ctx: &VersionContext) -> Result<usize> {
        Ok(layout_size(&Self::layout(ctx)?))
    }

    pub fn width(&self) -> Result<u64> {
        self.fields.uint("width")
    }

    pub fn height(&self) -> Result<u64> {
        self.fields.uint("height")
    }

    /// Index of the image. Rayman 2 sprites have none.
    pub fn index(&self) -> Option<u64> {
        self.fields.uint("index").ok()
    }

    /// Placeholder entries that carry no image.
    pub fn is_dummy(&self, ctx: &VersionContext) -> bool {
        if ctx.engine_branch == EngineBranch::Jaguar {
            return self.height().is_ok_and(|h| h == 0)
                || self.width().is_ok_and(|w| w == 0)
                || self.index() == Some(0xFF);
        }
        if ctx.engine_version == EngineVersion::Rayman2Ps1 {
            return false;
        }
        self.index() == Some(0)
    }
}
