//! Game structures built on the binary primitives

pub mod des;
pub mod event;
pub mod level;
pub mod sprite;
pub mod zdc;

pub use des::{AllFixChecks, DesFile, DesKind};
pub use event::{EventData, ObjState};
pub use level::{
    AlphaBlock, BackgroundIndices, LevelDefines, LevelFile, LevelMap, RoughTextures, TextureBlock,
};
pub use sprite::Sprite;
pub use zdc::ZdcUnkData;
