//! Engine version descriptors
//!
//! The caller supplies one [`VersionContext`] per session. Every structure
//! selects its field layout from it, see [`crate::schema`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte order of a platform's data files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

/// Engine family a release belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineBranch {
    /// `PlayStation` and Saturn releases, plus the Rayman 2 PS1 prototype engine
    Ps1,
    /// DOS/Windows releases and their ports
    Pc,
    /// Game Boy Advance and `DSi`
    Gba,
    /// Atari Jaguar
    Jaguar,
}

/// Individual releases of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineVersion {
    Ps1,
    Ps1Jp,
    Ps1JpDemoVol3,
    Ps1JpDemoVol6,
    Saturn,
    Rayman2Ps1,
    Jaguar,
    JaguarProto,
    Pc,
    PcKit,
    PcEdu,
    PcFan,
    PocketPc,
    Gba,
    Dsi,
}

impl EngineVersion {
    /// The branch this release normally belongs to
    pub const fn branch(self) -> EngineBranch {
        match self {
            Self::Ps1
            | Self::Ps1Jp
            | Self::Ps1JpDemoVol3
            | Self::Ps1JpDemoVol6
            | Self::Saturn
            | Self::Rayman2Ps1 => EngineBranch::Ps1,
            Self::Jaguar | Self::JaguarProto => EngineBranch::Jaguar,
            Self::Pc | Self::PcKit | Self::PcEdu | Self::PcFan | Self::PocketPc => EngineBranch::Pc,
            Self::Gba | Self::Dsi => EngineBranch::Gba,
        }
    }
}

/// Port a PC-branch data file was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformVariant {
    #[default]
    Native,
    PocketPc,
    Android,
    Ios,
}

/// Immutable description of the release being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionContext {
    pub engine_version: EngineVersion,
    pub engine_branch: EngineBranch,
    pub platform: PlatformVariant,
    /// Files start with a game version header (Kit, Edu and Fan releases)
    pub versioned: bool,
}

impl VersionContext {
    pub const fn new(
        engine_version: EngineVersion,
        engine_branch: EngineBranch,
        platform: PlatformVariant,
        versioned: bool,
    ) -> Self {
        Self {
            engine_version,
            engine_branch,
            platform,
            versioned,
        }
    }

    /// Context for a release on its usual branch and native platform.
    pub const fn for_version(engine_version: EngineVersion) -> Self {
        let versioned = matches!(
            engine_version,
            EngineVersion::PcKit | EngineVersion::PcEdu | EngineVersion::PcFan
        );
        Self::new(
            engine_version,
            engine_version.branch(),
            PlatformVariant::Native,
            versioned,
        )
    }

    #[must_use]
    pub const fn with_platform(mut self, platform: PlatformVariant) -> Self {
        self.platform = platform;
        self
    }

    pub const fn endian(&self) -> Endian {
        match self.engine_version {
            EngineVersion::Jaguar | EngineVersion::JaguarProto | EngineVersion::Saturn => Endian::Big,
            _ => Endian::Little,
        }
    }

    /// Mobile ports of the PC release keep stale pointers from the desktop
    /// files, so values that map nowhere are tolerated.
    pub const fn allows_invalid_pointers(&self) -> bool {
        matches!(
            self.platform,
            PlatformVariant::PocketPc | PlatformVariant::Android | PlatformVariant::Ios
        )
    }
}

impl fmt::Display for VersionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}",
            self.engine_version, self.engine_branch, self.platform
        )?;
        if self.versioned {
            write!(f, "/versioned")?;
        }
        Ok(())
    }
}
