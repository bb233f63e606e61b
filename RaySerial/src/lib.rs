//! `RaySerial` - Bidirectional binary codec for Rayman 1 engine files
//!
//! Every structure is described once and read or written through the same
//! description. A [`VersionContext`] picks the layout for each release
//! (PS1, Saturn, Jaguar, PC, GBA, DSi); pointers are resolved against a map
//! of loaded segments; checksums and XOR keys are applied per region; state
//! tables whose sizes are not stored are recovered by a fixpoint decoder.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rayserial::prelude::*;
//!
//! # fn main() -> rayserial::Result<()> {
//! let mut session = Session::new(VersionContext::for_version(EngineVersion::Pc));
//! let id = session.load_segment("PCMAP/RAY1.LEV", Some(0))?;
//! let start = session.pointer(id, 0)?;
//! let level = session.decode(start, LevelFile::read)?;
//!
//! let bytes = session.encode(SegmentId(1), Some(0), |w| level.write(w))?;
//! std::fs::write("RAY1.LEV", bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Collecting warnings
//!
//! Checksum and offset mismatches are reported to a [`DiagnosticSink`]
//! instead of failing the decode. [`TracingSink`] (the default) logs them,
//! [`CollectingSink`] keeps them:
//!
//! ```
//! use rayserial::prelude::*;
//!
//! let ctx = VersionContext::for_version(EngineVersion::Gba);
//! let session = Session::with_sink(ctx, CollectingSink::new());
//! assert!(session.into_sink().warnings.is_empty());
//! ```

pub mod binary;
pub mod diagnostics;
pub mod error;
pub mod formats;
pub mod options;
pub mod schema;
pub mod session;
pub mod table;
pub mod version;

pub use diagnostics::{CollectingSink, DiagnosticSink, TracingSink, Warning};
pub use error::{Error, ErrorClass, Result};
pub use options::CodecOptions;
pub use session::Session;
pub use version::{EngineBranch, EngineVersion, PlatformVariant, VersionContext};

/// Prelude module for convenient imports
pub mod prelude {
    // Sessions and configuration
    pub use crate::diagnostics::{CollectingSink, DiagnosticSink, TracingSink, Warning};
    pub use crate::error::{Error, ErrorClass, Result};
    pub use crate::options::CodecOptions;
    pub use crate::session::Session;
    pub use crate::version::{Endian, EngineBranch, EngineVersion, PlatformVariant, VersionContext};

    // Binary primitives
    pub use crate::binary::{
        BitField, BitFieldGroup, ChecksumAlgorithm, ChecksumPlacement, ChecksumRegion, Container,
        Pointer, Reader, SegmentId, SegmentMap, Writer,
    };

    // Schemas
    pub use crate::schema::{FieldKind, FieldOp, Record, Schema, Value};

    // Pointer tables
    pub use crate::table::{CountSource, ForwardPointerTable, LengthRule, Link, TableElement, TableState};

    // Formats
    pub use crate::formats::{
        AllFixChecks, DesFile, DesKind, EventData, LevelFile, ObjState, Sprite, ZdcUnkData,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
