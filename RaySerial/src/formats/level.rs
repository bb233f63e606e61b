//! PC level files (`.LEV`)
//!
//! The header holds two pointers, to the tile texture block and to the
//! object block, so the game can skip the rough textures. They are written
//! as placeholders and patched once both blocks have been placed.
//!
//! Defines, palettes, objects and the Fan profile block are carried as
//! opaque bytes.

use crate::binary::{ChecksumAlgorithm, ChecksumPlacement, ChecksumRegion, Pointer, Reader, Writer};
use crate::diagnostics::Warning;
use crate::error::{Error, Result};
use crate::version::{EngineBranch, EngineVersion, VersionContext};

/// Game version tag at the start of Kit, Edu and Fan files
pub const GAME_VERSION_SIZE: usize = 5;
pub const LEVEL_DEFINE_SIZE: usize = 0x20;
pub const BACKGROUND_DEFINE_SIZE: usize = 0x40;
/// Three 256-colour RGB666 palettes and the index of the last plan 1 palette
pub const PALETTES_SIZE: usize = 3 * 256 * 3 + 1;
pub const MAP_TILE_SIZE: usize = 6;
/// One 16x16 8-bit texture
pub const TEXTURE_SIZE: usize = 256;
/// Level name, author, description and power flags (Fan releases)
pub const PROFILE_DEFINE_SIZE: usize = 25 + 25 + 113 + 6;
pub const ALPHA_ROWS: usize = 480;
pub const ALPHA_ROW_SIZE: usize = 256;

const OBJ_BLOCK: &str = "obj_block";
const TEXTURE_BLOCK: &str = "texture_block";

/// Level, normal background and parallax background defines (Kit, Edu, Fan)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDefines {
    pub level: Vec<u8>,
    pub background_normal: Vec<u8>,
    pub background_diff: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMap {
    pub width: u16,
    pub height: u16,
    pub palettes: Vec<u8>,
    /// `width * height` tiles of [`MAP_TILE_SIZE`] bytes
    pub tiles: Vec<u8>,
}

/// Background images of the PC and Pocket PC releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackgroundIndices {
    pub fnd_index: u8,
    pub scroll_diff_fnd_index: u8,
    pub scroll_diff_sprites: i32,
}

/// A counted block of [`TEXTURE_SIZE`] textures
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureBlock {
    pub textures: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoughTextures {
    /// Parsed block (PC release)
    Block(TextureBlock),
    /// Whatever lies between the map and the texture block in other releases
    Leftover(Vec<u8>),
}

/// Alpha rows of the Edu release, guarded by an additive checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaBlock {
    pub data: Vec<u8>,
    pub checksum: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelFile {
    pub game_version: Option<Vec<u8>>,
    /// Pointers as read. Writing places fresh values.
    pub obj_block_pointer: Option<Pointer>,
    pub texture_block_pointer: Option<Pointer>,
    pub defines: Option<LevelDefines>,
    pub map: LevelMap,
    pub background: Option<BackgroundIndices>,
    pub rough_textures: RoughTextures,
    pub tile_textures: TextureBlock,
    pub objects: Vec<u8>,
    pub profile_define: Option<Vec<u8>>,
    pub alpha: Option<AlphaBlock>,
}

fn alpha_region() -> ChecksumRegion {
    ChecksumRegion::new(ChecksumAlgorithm::Additive, ChecksumPlacement::Before)
}

fn has_defines(version: EngineVersion) -> bool {
    matches!(
        version,
        EngineVersion::PcKit | EngineVersion::PcEdu | EngineVersion::PcFan
    )
}

fn has_background_indices(version: EngineVersion) -> bool {
    matches!(version, EngineVersion::Pc | EngineVersion::PocketPc)
}

/// Bytes following the object block
fn trailer_size(version: EngineVersion) -> usize {
    match version {
        EngineVersion::PcFan => PROFILE_DEFINE_SIZE,
        EngineVersion::PcEdu => alpha_region().stored_len(ALPHA_ROWS * ALPHA_ROW_SIZE),
        _ => 0,
    }
}

impl LevelMap {
    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let palettes = r.read_bytes(PALETTES_SIZE)?.to_vec();
        let tiles = r
            .read_bytes(usize::from(width) * usize::from(height) * MAP_TILE_SIZE)?
            .to_vec();
        Ok(Self {
            width,
            height,
            palettes,
            tiles,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        let expected = usize::from(self.width) * usize::from(self.height) * MAP_TILE_SIZE;
        if self.tiles.len() != expected {
            return Err(Error::FieldTypeMismatch {
                field: "tiles".to_string(),
                expected: "width * height map tiles",
            });
        }
        w.write_u16(self.width);
        w.write_u16(self.height);
        write_fixed(w, "palettes", &self.palettes, PALETTES_SIZE)?;
        w.write_bytes(&self.tiles);
        Ok(())
    }
}

impl TextureBlock {
    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let count = r.read_u32()?;
        let textures = (0..count)
            .map(|_| r.read_bytes(TEXTURE_SIZE).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { textures })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        let count = u32::try_from(self.textures.len()).map_err(|_| Error::FieldOverflow {
            field: "textures_count",
            value: self.textures.len() as i64,
            bits: 32,
        })?;
        w.write_u32(count);
        for texture in &self.textures {
            write_fixed(w, "texture", texture, TEXTURE_SIZE)?;
        }
        Ok(())
    }
}

fn write_fixed(w: &mut Writer, field: &str, bytes: &[u8], size: usize) -> Result<()> {
    if bytes.len() != size {
        return Err(Error::FieldTypeMismatch {
            field: field.to_string(),
            expected: "block of its declared size",
        });
    }
    w.write_bytes(bytes);
    Ok(())
}

fn check_offset(r: &mut Reader<'_>, block: &'static str, expected: Option<Pointer>) {
    let here = r.position();
    if expected != Some(here) {
        r.warn(Warning::OffsetMismatch {
            block,
            expected: expected.map_or(0, |p| p.display_offset()),
            actual: here.display_offset(),
        });
    }
}

impl LevelFile {
    pub const NAME: &'static str = "LevelFile";

    fn check_version(ctx: &VersionContext) -> Result<()> {
        match (ctx.engine_branch, ctx.engine_version) {
            (
                EngineBranch::Pc,
                EngineVersion::Pc
                | EngineVersion::PcKit
                | EngineVersion::PcEdu
                | EngineVersion::PcFan
                | EngineVersion::PocketPc,
            ) => Ok(()),
            _ => Err(Error::unsupported(Self::NAME, ctx)),
        }
    }

    /// Read a level. Block offsets that disagree with the header pointers
    /// are reported as warnings.
    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        let start = r.position();
        let ctx = *r.version();
        Self::read_inner(r, &ctx).map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    fn read_inner(r: &mut Reader<'_>, ctx: &VersionContext) -> Result<Self> {
        Self::check_version(ctx)?;
        let version = ctx.engine_version;

        let game_version = if ctx.versioned {
            Some(r.read_bytes(GAME_VERSION_SIZE)?.to_vec())
        } else {
            None
        };

        let obj_block_pointer = r.read_pointer()?;
        let texture_block_pointer = r.read_pointer()?;

        let defines = if has_defines(version) {
            Some(LevelDefines {
                level: r.read_bytes(LEVEL_DEFINE_SIZE)?.to_vec(),
                background_normal: r.read_bytes(BACKGROUND_DEFINE_SIZE)?.to_vec(),
                background_diff: r.read_bytes(BACKGROUND_DEFINE_SIZE)?.to_vec(),
            })
        } else {
            None
        };

        let map = LevelMap::read(r)?;

        let background = if has_background_indices(version) {
            Some(BackgroundIndices {
                fnd_index: r.read_u8()?,
                scroll_diff_fnd_index: r.read_u8()?,
                scroll_diff_sprites: r.read_i32()?,
            })
        } else {
            None
        };

        let rough_textures = if version == EngineVersion::Pc {
            RoughTextures::Block(TextureBlock::read(r)?)
        } else {
            let here = r.position();
            let length = match texture_block_pointer {
                Some(target) if target.segment() == here.segment() => {
                    target.offset().saturating_sub(here.offset()) as usize
                }
                _ => 0,
            };
            RoughTextures::Leftover(r.read_bytes(length)?.to_vec())
        };

        check_offset(r, "Texture", texture_block_pointer);
        let tile_textures = TextureBlock::read(r)?;

        // Pocket PC files keep the pointers of the desktop release
        if version != EngineVersion::PocketPc {
            check_offset(r, "Object", obj_block_pointer);
        }

        let objects_len = r.remaining()?.saturating_sub(trailer_size(version));
        let objects = r.read_bytes(objects_len)?.to_vec();

        let profile_define = if version == EngineVersion::PcFan {
            Some(r.read_bytes(PROFILE_DEFINE_SIZE)?.to_vec())
        } else {
            None
        };

        let alpha = if version == EngineVersion::PcEdu {
            let (data, checksum) = alpha_region().read(r, ALPHA_ROWS * ALPHA_ROW_SIZE, Self::NAME)?;
            Some(AlphaBlock { data, checksum })
        } else {
            None
        };

        tracing::debug!(
            "level {}x{}: {} tile textures, {} object bytes",
            map.width,
            map.height,
            tile_textures.textures.len(),
            objects.len()
        );

        Ok(Self {
            game_version,
            obj_block_pointer,
            texture_block_pointer,
            defines,
            map,
            background,
            rough_textures,
            tile_textures,
            objects,
            profile_define,
            alpha,
        })
    }

    /// Write the level. Both header pointers are patched to where the
    /// blocks actually land, and the alpha checksum is recomputed.
    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let start = w.position();
        let ctx = *w.version();
        self.write_inner(w, &ctx)
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    fn write_inner(&self, w: &mut Writer, ctx: &VersionContext) -> Result<()> {
        Self::check_version(ctx)?;
        let version = ctx.engine_version;

        if ctx.versioned {
            let tag = self
                .game_version
                .as_deref()
                .ok_or_else(|| Error::MissingField("game_version".to_string()))?;
            write_fixed(w, "game_version", tag, GAME_VERSION_SIZE)?;
        }

        w.write_deferred_pointer(OBJ_BLOCK);
        w.write_deferred_pointer(TEXTURE_BLOCK);

        if has_defines(version) {
            let defines = self
                .defines
                .as_ref()
                .ok_or_else(|| Error::MissingField("defines".to_string()))?;
            write_fixed(w, "level_define", &defines.level, LEVEL_DEFINE_SIZE)?;
            write_fixed(w, "background_define_normal", &defines.background_normal, BACKGROUND_DEFINE_SIZE)?;
            write_fixed(w, "background_define_diff", &defines.background_diff, BACKGROUND_DEFINE_SIZE)?;
        }

        self.map.write(w)?;

        if has_background_indices(version) {
            let background = self
                .background
                .ok_or_else(|| Error::MissingField("background".to_string()))?;
            w.write_u8(background.fnd_index);
            w.write_u8(background.scroll_diff_fnd_index);
            w.write_i32(background.scroll_diff_sprites);
        }

        match (&self.rough_textures, version) {
            (RoughTextures::Block(block), EngineVersion::Pc) => block.write(w)?,
            (RoughTextures::Leftover(bytes), v) if v != EngineVersion::Pc => w.write_bytes(bytes),
            _ => {
                return Err(Error::FieldTypeMismatch {
                    field: "rough_textures".to_string(),
                    expected: "rough texture block matching the release",
                });
            }
        }

        w.mark(TEXTURE_BLOCK)?;
        self.tile_textures.write(w)?;

        w.mark(OBJ_BLOCK)?;
        w.write_bytes(&self.objects);

        if version == EngineVersion::PcFan {
            let profile = self
                .profile_define
                .as_deref()
                .ok_or_else(|| Error::MissingField("profile_define".to_string()))?;
            write_fixed(w, "profile_define", profile, PROFILE_DEFINE_SIZE)?;
        }

        if version == EngineVersion::PcEdu {
            let alpha = self
                .alpha
                .as_ref()
                .ok_or_else(|| Error::MissingField("alpha".to_string()))?;
            if alpha.data.len() != ALPHA_ROWS * ALPHA_ROW_SIZE {
                return Err(Error::FieldTypeMismatch {
                    field: "alpha".to_string(),
                    expected: "480 rows of 256 bytes",
                });
            }
            alpha_region().write(w, &alpha.data);
        }
        Ok(())
    }
}
