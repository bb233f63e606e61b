//! PC sprite/animation containers (DES)
//!
//! Image data is XORed with `0x8F` and guarded by an additive checksum.
//! World files of the Kit and Edu releases store the checksum in front of
//! the data, every other file after it. `BIGRAY.DAT` has no checksum at all.

use super::sprite::Sprite;
use crate::binary::{ChecksumAlgorithm, ChecksumPlacement, ChecksumRegion, Reader, Writer};
use crate::error::{Error, Result};
use crate::version::{EngineBranch, EngineVersion, VersionContext};

/// XOR key of DES image data
pub const IMAGE_DATA_XOR_KEY: u8 = 0x8F;

/// Which file a DES block is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesKind {
    /// A world file (`RAY*.WLD`)
    World,
    /// `ALLFIX.DAT`, shared by every world
    AllFix,
    /// `BIGRAY.DAT`
    BigRay,
}

/// Executable checks stored in `ALLFIX.DAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllFixChecks {
    pub wld_eta_index: u32,
    pub exe_size: u32,
    pub exe_checksum1: u32,
    pub exe_checksum2: u32,
}

/// One DES block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesFile {
    pub kind: DesKind,
    /// Only stored in world files; always set elsewhere
    pub requires_background_clearing: bool,
    pub allfix: Option<AllFixChecks>,
    /// Plain (de-XORed) image data
    pub image_data: Vec<u8>,
    /// Checksum byte as stored, `None` for BigRay
    pub image_data_checksum: Option<u8>,
    pub sprites: Vec<Sprite>,
    pub animations_count: u8,
    /// Animation descriptors, kept as stored
    pub animations: Vec<u8>,
}

impl DesFile {
    pub const NAME: &'static str = "DesFile";

    /// Checksum layout of the image data for `kind` under `ctx`.
    pub fn image_region(kind: DesKind, ctx: &VersionContext) -> Result<ChecksumRegion> {
        if ctx.engine_branch != EngineBranch::Pc {
            return Err(Error::unsupported(Self::NAME, ctx));
        }
        let before = kind == DesKind::World
            && matches!(ctx.engine_version, EngineVersion::PcKit | EngineVersion::PcEdu);
        Ok(match (kind, before) {
            (DesKind::BigRay, _) => ChecksumRegion::xor_only(IMAGE_DATA_XOR_KEY),
            (_, true) => ChecksumRegion::new(ChecksumAlgorithm::Additive, ChecksumPlacement::Before)
                .with_xor(IMAGE_DATA_XOR_KEY),
            (_, false) => ChecksumRegion::new(ChecksumAlgorithm::Additive, ChecksumPlacement::After)
                .with_xor(IMAGE_DATA_XOR_KEY),
        })
    }

    /// Read a DES block. Animations run to the end of the segment.
    pub fn read(r: &mut Reader<'_>, kind: DesKind) -> Result<Self> {
        let start = r.position();
        let ctx = *r.version();
        Self::read_inner(r, kind, &ctx)
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    fn read_inner(r: &mut Reader<'_>, kind: DesKind, ctx: &VersionContext) -> Result<Self> {
        let region = Self::image_region(kind, ctx)?;

        let requires_background_clearing = match kind {
            DesKind::World => r.read_bool()?,
            _ => true,
        };
        let mut allfix = match kind {
            DesKind::AllFix => Some(AllFixChecks {
                wld_eta_index: r.read_u32()?,
                exe_size: r.read_u32()?,
                exe_checksum1: r.read_u32()?,
                exe_checksum2: 0,
            }),
            _ => None,
        };

        let image_data_length = r.read_u32()? as usize;
        let (image_data, image_data_checksum) = region.read(r, image_data_length, Self::NAME)?;

        if let Some(checks) = allfix.as_mut() {
            checks.exe_checksum2 = r.read_u32()?;
        }

        let sprites_count = r.read_u16()?;
        let sprites = (0..sprites_count)
            .map(|_| Sprite::read(r))
            .collect::<Result<Vec<_>>>()?;

        let animations_count = r.read_u8()?;
        let rest = r.remaining()?;
        let animations = r.read_bytes(rest)?.to_vec();

        tracing::debug!(
            "DES {:?}: {} bytes of image data, {} sprites, {} animations",
            kind,
            image_data.len(),
            sprites.len(),
            animations_count
        );

        Ok(Self {
            kind,
            requires_background_clearing,
            allfix,
            image_data,
            image_data_checksum,
            sprites,
            animations_count,
            animations,
        })
    }

    /// Write the block. The image checksum is recomputed.
    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let start = w.position();
        let ctx = *w.version();
        self.write_inner(w, &ctx)
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    fn write_inner(&self, w: &mut Writer, ctx: &VersionContext) -> Result<()> {
        let region = Self::image_region(self.kind, ctx)?;
        let allfix = match self.kind {
            DesKind::AllFix => Some(
                self.allfix
                    .ok_or_else(|| Error::MissingField("allfix".to_string()))?,
            ),
            _ => None,
        };

        if self.kind == DesKind::World {
            w.write_bool(self.requires_background_clearing);
        }
        if let Some(checks) = allfix {
            w.write_u32(checks.wld_eta_index);
            w.write_u32(checks.exe_size);
            w.write_u32(checks.exe_checksum1);
        }

        let length = u32::try_from(self.image_data.len()).map_err(|_| Error::FieldOverflow {
            field: "image_data_length",
            value: self.image_data.len() as i64,
            bits: 32,
        })?;
        w.write_u32(length);
        region.write(w, &self.image_data);

        if let Some(checks) = allfix {
            w.write_u32(checks.exe_checksum2);
        }

        let sprites_count = u16::try_from(self.sprites.len()).map_err(|_| Error::FieldOverflow {
            field: "sprites_count",
            value: self.sprites.len() as i64,
            bits: 16,
        })?;
        w.write_u16(sprites_count);
        for sprite in &self.sprites {
            sprite.write(w)?;
        }

        w.write_u8(self.animations_count);
        w.write_bytes(&self.animations);
        Ok(())
    }
}
