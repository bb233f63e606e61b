//! Decode/encode sessions
//!
//! A [`Session`] owns the backing segments, the version context and the
//! diagnostics sink for one file (or one set of files sharing a pointer
//! space). Independent sessions share nothing and may run on different
//! threads.

use std::path::Path;

use crate::binary::{Pointer, Reader, SegmentId, SegmentMap, Writer};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::Result;
use crate::options::CodecOptions;
use crate::version::VersionContext;

/// State for one decode or encode job
pub struct Session<S: DiagnosticSink = TracingSink> {
    version: VersionContext,
    options: CodecOptions,
    segments: SegmentMap,
    sink: S,
}

impl Session<TracingSink> {
    pub fn new(version: VersionContext) -> Self {
        Self::with_sink(version, TracingSink)
    }
}

impl<S: DiagnosticSink> Session<S> {
    /// Session reporting warnings to `sink`.
    pub fn with_sink(version: VersionContext, sink: S) -> Self {
        Self {
            version,
            options: CodecOptions::default(),
            segments: SegmentMap::new(),
            sink,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn version(&self) -> &VersionContext {
        &self.version
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn segments(&self) -> &SegmentMap {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut SegmentMap {
        &mut self.segments
    }

    /// Register an in-memory buffer.
    pub fn add_segment(&mut self, name: impl Into<String>, base: Option<u64>, data: Vec<u8>) -> SegmentId {
        self.segments.add(name, base, data)
    }

    /// Read a file from disk and register it as a segment.
    pub fn load_segment<P: AsRef<Path>>(&mut self, path: P, base: Option<u64>) -> Result<SegmentId> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        tracing::debug!("loaded {} ({} bytes)", path.display(), data.len());
        Ok(self.segments.add(path.display().to_string(), base, data))
    }

    /// Pointer to `offset` in segment `id`.
    pub fn pointer(&self, id: SegmentId, offset: u64) -> Result<Pointer> {
        self.segments.pointer(id, offset)
    }

    /// A reader positioned at `start`.
    pub fn reader(&mut self, start: Pointer) -> Reader<'_> {
        Reader::new(&self.segments, self.version, &self.options, &mut self.sink, start)
    }

    /// Run a decoder at `start`.
    pub fn decode<T>(
        &mut self,
        start: Pointer,
        f: impl FnOnce(&mut Reader<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut reader = self.reader(start);
        f(&mut reader)
    }

    /// A writer producing a new segment `id` mapped at `base`.
    pub fn writer(&self, id: SegmentId, base: Option<u64>) -> Writer {
        Writer::new(self.version, id, base)
    }

    /// Run an encoder into a fresh buffer and apply its deferred pointers.
    pub fn encode(
        &self,
        id: SegmentId,
        base: Option<u64>,
        f: impl FnOnce(&mut Writer) -> Result<()>,
    ) -> Result<Vec<u8>> {
        let mut writer = self.writer(id, base);
        f(&mut writer)?;
        writer.finish()
    }
}
