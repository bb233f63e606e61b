//! Error types for `RaySerial`

use thiserror::Error;

use crate::version::VersionContext;

/// How an error should be treated by a decode/encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recoverable data problem. Normally downgraded to a warning, only
    /// surfaced as an error when strict checking is requested.
    Data,
    /// The input does not match any structure this crate understands.
    Structural,
    /// An invariant of the codec itself was violated (bad record, unresolved patch).
    Programmer,
    /// Failure of the underlying I/O or of an option/record (de)serializer.
    Io,
}

/// The error type for `RaySerial` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of its backing segment.
    #[error("unexpected end of segment at {offset:#x}: need {need} bytes, have {have}")]
    UnexpectedEof {
        /// Offset of the read within its segment.
        offset: u64,
        /// Number of bytes requested.
        need: usize,
        /// Number of bytes remaining in the segment.
        have: usize,
    },

    // ==================== Pointer Errors ====================
    /// A segment id does not name any registered segment.
    #[error("unknown segment id {0}")]
    UnknownSegment(u16),

    /// Two pointers live in unrelated segments without an absolute mapping.
    #[error("pointers in segments {from} and {to} are not comparable")]
    IncompatibleSegment {
        /// Segment of the origin pointer.
        from: u16,
        /// Segment of the target pointer.
        to: u16,
    },

    /// A stored pointer value does not map into any segment.
    #[error("invalid pointer {value:#010x} at {offset:#x}")]
    InvalidPointer {
        /// The raw stored value.
        value: u64,
        /// Where the value was read.
        offset: u64,
    },

    /// A pointer has no absolute address and cannot be written to a slot.
    #[error("pointer into segment {segment} has no absolute address")]
    UnmappedPointer {
        /// Segment of the pointer.
        segment: u16,
    },

    /// An absolute address does not fit the 32-bit pointer slot.
    #[error("pointer {0:#x} does not fit in a 32-bit slot")]
    PointerOutOfRange(u64),

    // ==================== Schema Errors ====================
    /// No field layout exists for this structure under the given context.
    #[error("{structure} has no layout for {context}")]
    UnsupportedVariant {
        /// Name of the structure being dispatched.
        structure: &'static str,
        /// Display form of the rejected context.
        context: String,
    },

    /// A bit-field group does not fill its container exactly.
    #[error("bit fields total {total} bits but container is {container} bits")]
    InvalidBitFieldGroup {
        /// Container width in bits.
        container: u32,
        /// Sum of declared field widths.
        total: u32,
    },

    /// A value does not fit the declared width of its bit field.
    #[error("value {value} overflows {bits}-bit field '{field}'")]
    FieldOverflow {
        /// Field name.
        field: &'static str,
        /// The rejected value.
        value: i64,
        /// Declared width.
        bits: u32,
    },

    /// A record handed to an encoder lacks a field its layout needs.
    #[error("record has no field '{0}'")]
    MissingField(String),

    /// A record field holds a value of the wrong kind.
    #[error("field '{field}' is not a {expected}")]
    FieldTypeMismatch {
        /// Field name.
        field: String,
        /// Expected value kind.
        expected: &'static str,
    },

    // ==================== Table Errors ====================
    /// A forward-pointer table never reached a consistent state.
    #[error("malformed table at {base:#x} after {passes} passes: {reason}")]
    MalformedTable {
        /// Absolute offset of the pointer table.
        base: u64,
        /// Number of decode passes attempted.
        passes: usize,
        /// What went wrong.
        reason: String,
    },

    // ==================== Checksum Errors ====================
    /// Stored and computed checksums differ (only raised in strict mode).
    #[error("checksum mismatch in {structure} at {offset:#x}: stored {stored:#04x}, computed {computed:#04x}")]
    ChecksumMismatch {
        /// Structure owning the checksummed region.
        structure: &'static str,
        /// Offset of the checksum byte.
        offset: u64,
        /// Checksum found in the data.
        stored: u8,
        /// Checksum computed from the data.
        computed: u8,
    },

    // ==================== Patch Errors ====================
    /// A deferred pointer slot was never given a value.
    #[error("pointer slot at {slot:#x} for '{target}' was never resolved")]
    UnresolvedPatch {
        /// Offset of the placeholder in the output buffer.
        slot: u64,
        /// Entity the slot refers to.
        target: String,
    },

    /// A deferred pointer target was resolved more than once.
    #[error("pointer target '{0}' resolved twice")]
    DuplicatePatchTarget(String),

    // ==================== Parsing Errors ====================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Codec options could not be parsed.
    #[error("invalid options: {0}")]
    OptionsError(#[from] toml::de::Error),

    // ==================== Context ====================
    /// A fatal error annotated with where it happened.
    #[error("{structure} at {offset:#x} ({version}): {source}")]
    InStructure {
        /// Structure being decoded or encoded.
        structure: &'static str,
        /// Offset of the structure.
        offset: u64,
        /// Display form of the session's version context.
        version: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ChecksumMismatch { .. } => ErrorClass::Data,
            Self::UnexpectedEof { .. }
            | Self::UnknownSegment(_)
            | Self::IncompatibleSegment { .. }
            | Self::InvalidPointer { .. }
            | Self::UnsupportedVariant { .. }
            | Self::MalformedTable { .. } => ErrorClass::Structural,
            Self::UnmappedPointer { .. }
            | Self::PointerOutOfRange(_)
            | Self::InvalidBitFieldGroup { .. }
            | Self::FieldOverflow { .. }
            | Self::MissingField(_)
            | Self::FieldTypeMismatch { .. }
            | Self::UnresolvedPatch { .. }
            | Self::DuplicatePatchTarget(_) => ErrorClass::Programmer,
            Self::Io(_) | Self::JsonError(_) | Self::OptionsError(_) => ErrorClass::Io,
            Self::InStructure { source, .. } => source.class(),
        }
    }

    /// The innermost error, skipping structure annotations.
    pub fn root(&self) -> &Error {
        match self {
            Self::InStructure { source, .. } => source.root(),
            other => other,
        }
    }

    /// Annotate with the structure being processed. Only the innermost
    /// structure is kept.
    pub(crate) fn in_structure(
        self,
        structure: &'static str,
        offset: u64,
        version: &VersionContext,
    ) -> Self {
        match self {
            Self::InStructure { .. } => self,
            other => Self::InStructure {
                structure,
                offset,
                version: version.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn unsupported(structure: &'static str, version: &VersionContext) -> Self {
        Self::UnsupportedVariant {
            structure,
            context: version.to_string(),
        }
    }
}

/// A specialized Result type for `RaySerial` operations.
pub type Result<T> = std::result::Result<T, Error>;
