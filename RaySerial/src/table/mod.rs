//! Forward-pointer tables with inferred sizes
//!
//! Some tables are an array of pointers to sub-arrays of fixed-size
//! elements, with neither the number of entries nor the length of each
//! sub-array stored anywhere. Sizes are first guessed from the layout
//! (see [`scan`] and [`LengthRule`]) and then grown until every link an
//! element carries into the table lands inside it.
//!
//! Decoding a table walks through [`TableState`]:
//!
//! ```text
//! Sized -> [ScanningCount] -> DecodingEntries -> CheckingLinks
//!       -> (GrowingAndRedecoding -> DecodingEntries -> CheckingLinks)* -> Converged
//! ```

pub mod scan;

use std::collections::BTreeMap;

use crate::binary::{Pointer, Reader, SegmentId, SegmentMap, Writer};
use crate::error::{Error, Result};
use crate::version::VersionContext;

pub use scan::{is_plausible, scan_entry_count};

/// Structure name used in error context
const TABLE_NAME: &str = "ForwardPointerTable";

/// Size of one pointer slot in the table
const POINTER_SIZE: u64 = 4;

/// Reference from an element to another position of the same table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Link {
    pub entry: usize,
    pub element: usize,
}

impl Link {
    pub const fn new(entry: usize, element: usize) -> Self {
        Self { entry, element }
    }
}

/// A fixed-size element stored in a table's sub-arrays.
pub trait TableElement: Sized {
    /// Encoded size in bytes
    const SIZE: u64;

    fn read(r: &mut Reader<'_>) -> Result<Self>;

    fn write(&self, w: &mut Writer) -> Result<()>;

    /// Position in the same table this element refers to, if any
    fn link(&self) -> Option<Link>;
}

/// Where the number of entries comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSource {
    /// Scan the pointers. At least `lower_bound` entries are taken.
    Heuristic { lower_bound: usize },
    /// The count is known
    Stored(usize),
}

/// Initial sub-array length of each entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Distance to the next entry's pointer, or to the table for the last one
    PointerDistance,
    /// One entry has a known length, every other entry starts at 1
    Distinguished { entry: usize, count: usize },
}

/// Progress of a table decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Sized,
    ScanningCount,
    DecodingEntries,
    CheckingLinks,
    GrowingAndRedecoding,
    Converged,
}

/// A decoded table of pointers to element sub-arrays
#[derive(Debug, Clone)]
pub struct ForwardPointerTable<E> {
    base: Pointer,
    pointers: Vec<Option<Pointer>>,
    entries: Vec<Vec<E>>,
    lengths: Vec<usize>,
    state: TableState,
    transitions: Vec<TableState>,
    passes: usize,
}

impl<E: TableElement> ForwardPointerTable<E> {
    /// Decode the table at `base`.
    ///
    /// Fails with [`Error::MalformedTable`] if a link needs a null entry to
    /// grow, or if sizes are still growing after the configured number of
    /// passes.
    pub fn decode(
        r: &mut Reader<'_>,
        base: Pointer,
        count: CountSource,
        rule: LengthRule,
    ) -> Result<Self> {
        let version = *r.version();
        Self::decode_inner(r, base, count, rule)
            .map_err(|e| e.in_structure(TABLE_NAME, base.display_offset(), &version))
    }

    fn decode_inner(
        r: &mut Reader<'_>,
        base: Pointer,
        count: CountSource,
        rule: LengthRule,
    ) -> Result<Self> {
        let mut table = Self {
            base,
            pointers: Vec::new(),
            entries: Vec::new(),
            lengths: Vec::new(),
            state: TableState::Sized,
            transitions: vec![TableState::Sized],
            passes: 0,
        };

        let count = match count {
            CountSource::Stored(n) => n,
            CountSource::Heuristic { lower_bound } => {
                table.enter(TableState::ScanningCount);
                scan_entry_count(r, base, lower_bound)?
            }
        };
        table.grow_entries(r, count, rule)?;

        let max_passes = r.options().max_fixpoint_passes;
        loop {
            table.passes += 1;
            if table.passes > max_passes {
                return Err(table.malformed(format!(
                    "sizes still growing after {max_passes} passes"
                )));
            }

            table.enter(TableState::DecodingEntries);
            table.decode_new_elements(r)?;

            table.enter(TableState::CheckingLinks);
            let (needed_count, needed_lengths) = table.out_of_bounds_links();
            if needed_count <= table.entries.len() && needed_lengths.is_empty() {
                break;
            }

            table.enter(TableState::GrowingAndRedecoding);
            tracing::trace!(
                "table at {:#x}: growing to {} entries, {} sub-arrays after pass {}",
                base.display_offset(),
                needed_count,
                needed_lengths.len(),
                table.passes
            );
            table.grow_entries(r, needed_count, rule)?;
            for (entry, length) in needed_lengths {
                if table.pointers[entry].is_none() {
                    return Err(table.malformed(format!("link into null entry {entry}")));
                }
                table.lengths[entry] = table.lengths[entry].max(length);
            }
        }

        table.enter(TableState::Converged);
        tracing::debug!(
            "table at {:#x} converged: {} entries in {} passes",
            base.display_offset(),
            table.entries.len(),
            table.passes
        );
        Ok(table)
    }

    fn enter(&mut self, state: TableState) {
        tracing::trace!(
            "table at {:#x}: {:?} -> {:?}",
            self.base.display_offset(),
            self.state,
            state
        );
        self.state = state;
        self.transitions.push(state);
    }

    /// Read pointers up to `count` and give the new entries their initial length.
    fn grow_entries(&mut self, r: &mut Reader<'_>, count: usize, rule: LengthRule) -> Result<()> {
        let first_new = self.pointers.len();
        for index in first_new..count {
            let slot = self.base.advance(index as u64 * POINTER_SIZE);
            self.pointers.push(r.at(slot, Reader::read_pointer)?);
        }
        for index in first_new..count {
            let length = self.initial_length(r.segments(), index, rule)?;
            self.lengths.push(length);
            self.entries.push(Vec::new());
        }
        Ok(())
    }

    fn initial_length(&self, segments: &SegmentMap, index: usize, rule: LengthRule) -> Result<usize> {
        let Some(pointer) = self.pointers[index] else {
            return Ok(0);
        };
        match rule {
            LengthRule::Distinguished { entry, count } => Ok(if index == entry { count } else { 1 }),
            LengthRule::PointerDistance => {
                let segment = segments.segment(pointer.segment())?;
                if segment.memory_mapped && pointer.offset() == 0 {
                    return Ok(segment.len() / E::SIZE as usize);
                }
                let end = self
                    .pointers
                    .get(index + 1)
                    .copied()
                    .flatten()
                    .unwrap_or(self.base);
                let distance = pointer.distance_to(&end)?;
                Ok(distance.max(0) as usize / E::SIZE as usize)
            }
        }
    }

    /// Read the elements between each entry's decoded length and its current bound.
    fn decode_new_elements(&mut self, r: &mut Reader<'_>) -> Result<()> {
        for (index, elements) in self.entries.iter_mut().enumerate() {
            let wanted = self.lengths[index];
            if elements.len() >= wanted {
                continue;
            }
            let Some(pointer) = self.pointers[index] else {
                continue;
            };
            for element in elements.len()..wanted {
                let at = pointer.advance(element as u64 * E::SIZE);
                elements.push(r.at(at, E::read)?);
            }
        }
        Ok(())
    }

    /// Entry count and per-entry lengths needed to hold every link target.
    fn out_of_bounds_links(&self) -> (usize, BTreeMap<usize, usize>) {
        let mut needed_count = self.entries.len();
        let mut needed_lengths = BTreeMap::new();
        for link in self.entries.iter().flatten().filter_map(E::link) {
            needed_count = needed_count.max(link.entry + 1);
            let current = self.lengths.get(link.entry).copied().unwrap_or(0);
            if link.element >= current {
                let length = needed_lengths.entry(link.entry).or_insert(0);
                *length = (*length).max(link.element + 1);
            }
        }
        (needed_count, needed_lengths)
    }

    fn malformed(&self, reason: String) -> Error {
        Error::MalformedTable {
            base: self.base.display_offset(),
            passes: self.passes,
            reason,
        }
    }

    /// Write every entry's elements back at its pointer, and the pointer
    /// array at the table base, overwriting the backing segments in place.
    pub fn write_into(&self, segments: &mut SegmentMap, version: VersionContext) -> Result<()> {
        with_segment_writer(segments, self.base.segment(), version, |w| {
            w.seek(self.base.offset());
            for pointer in &self.pointers {
                w.write_pointer(pointer.as_ref())?;
            }
            Ok(())
        })?;

        for (pointer, elements) in self.pointers.iter().zip(&self.entries) {
            let Some(pointer) = pointer else {
                continue;
            };
            with_segment_writer(segments, pointer.segment(), version, |w| {
                w.seek(pointer.offset());
                for element in elements {
                    element.write(w)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl<E> ForwardPointerTable<E> {
    pub fn base(&self) -> Pointer {
        self.base
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    /// Every state the decode went through, in order
    pub fn transitions(&self) -> &[TableState] {
        &self.transitions
    }

    /// Number of decode passes taken to converge
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pointers(&self) -> &[Option<Pointer>] {
        &self.pointers
    }

    pub fn entry(&self, index: usize) -> Option<&[E]> {
        self.entries.get(index).map(Vec::as_slice)
    }

    pub fn entries(&self) -> impl Iterator<Item = &[E]> {
        self.entries.iter().map(Vec::as_slice)
    }

    /// Mutable access to an entry's elements. The length cannot change.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut [E]> {
        self.entries.get_mut(index).map(Vec::as_mut_slice)
    }

    pub fn get(&self, link: Link) -> Option<&E> {
        self.entries.get(link.entry)?.get(link.element)
    }
}

/// Run `f` with a writer over the bytes of segment `id`, then put them back.
fn with_segment_writer(
    segments: &mut SegmentMap,
    id: SegmentId,
    version: VersionContext,
    f: impl FnOnce(&mut Writer) -> Result<()>,
) -> Result<()> {
    let segment = segments.segment_mut(id)?;
    let data = std::mem::take(&mut segment.data);
    let original_len = data.len();
    let mut writer = Writer::over(data, version, id, segment.base);
    let result = f(&mut writer);
    let data = writer.finish()?;
    if data.len() != original_len {
        tracing::warn!(
            "segment '{}' grew from {} to {} bytes while writing a table",
            segment.name,
            original_len,
            data.len()
        );
    }
    segment.data = data;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::options::CodecOptions;
    use crate::version::EngineVersion;
    use pretty_assertions::assert_eq;

    /// `[has_link, entry, element, value]`
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Cell {
        link: Option<Link>,
        value: u8,
    }

    impl TableElement for Cell {
        const SIZE: u64 = 4;

        fn read(r: &mut Reader<'_>) -> Result<Self> {
            let has_link = r.read_bool()?;
            let entry = r.read_u8()?;
            let element = r.read_u8()?;
            let value = r.read_u8()?;
            Ok(Self {
                link: has_link.then(|| Link::new(usize::from(entry), usize::from(element))),
                value,
            })
        }

        fn write(&self, w: &mut Writer) -> Result<()> {
            let link = self.link.unwrap_or(Link::new(0, 0));
            w.write_bool(self.link.is_some());
            w.write_u8(link.entry as u8);
            w.write_u8(link.element as u8);
            w.write_u8(self.value);
            Ok(())
        }

        fn link(&self) -> Option<Link> {
            self.link
        }
    }

    const BASE: u64 = 0x1000;

    /// Table of three pointers at offset 0, entry 0 links to (2, 3), entry 2
    /// really holds four cells.
    fn linked_rom() -> Vec<u8> {
        let mut data = Vec::new();
        for p in [0x1010u32, 0x1014, 0x1018] {
            data.extend_from_slice(&p.to_le_bytes());
        }
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&[1, 2, 3, 0xA0]);
        data.extend_from_slice(&[0, 0, 0, 0xB0]);
        for value in 0xC0..0xC4 {
            data.extend_from_slice(&[0, 0, 0, value]);
        }
        data
    }

    fn decode(
        map: &SegmentMap,
        options: &CodecOptions,
        count: CountSource,
        rule: LengthRule,
    ) -> Result<ForwardPointerTable<Cell>> {
        let ctx = VersionContext::for_version(EngineVersion::Gba);
        let mut sink = CollectingSink::new();
        let base = map.pointer(SegmentId(0), 0)?;
        let mut r = Reader::new(map, ctx, options, &mut sink, base);
        let table = ForwardPointerTable::decode(&mut r, base, count, rule);
        assert_eq!(r.position(), base);
        table
    }

    #[test]
    fn test_fixpoint_grows_linked_entry() {
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), linked_rom());
        let rule = LengthRule::Distinguished { entry: 1, count: 1 };
        let table = decode(&map, &CodecOptions::default(), CountSource::Stored(3), rule).unwrap();

        assert_eq!(table.state(), TableState::Converged);
        assert!(table.passes() <= 5);
        assert_eq!(table.len(), 3);
        assert!(table.entry(2).unwrap().len() >= 4);

        let link = table.entry(0).unwrap()[0].link.unwrap();
        assert_eq!(table.get(link).unwrap().value, 0xC3);
    }

    #[test]
    fn test_fixpoint_grows_entry_count() {
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), linked_rom());
        let rule = LengthRule::Distinguished { entry: 1, count: 1 };
        let table = decode(&map, &CodecOptions::default(), CountSource::Stored(2), rule).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.passes(), 2);
        assert_eq!(table.entry(2).unwrap().len(), 4);
        assert_eq!(
            table.transitions(),
            &[
                TableState::Sized,
                TableState::DecodingEntries,
                TableState::CheckingLinks,
                TableState::GrowingAndRedecoding,
                TableState::DecodingEntries,
                TableState::CheckingLinks,
                TableState::Converged,
            ]
        );
    }

    #[test]
    fn test_pass_ceiling() {
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), linked_rom());
        let options = CodecOptions::default().with_max_fixpoint_passes(1);
        let rule = LengthRule::Distinguished { entry: 1, count: 1 };
        let err = decode(&map, &options, CountSource::Stored(3), rule).unwrap_err();
        assert!(matches!(err.root(), Error::MalformedTable { passes: 2, .. }));
        assert!(matches!(err, Error::InStructure { structure: "ForwardPointerTable", .. }));
    }

    #[test]
    fn test_link_into_null_entry() {
        let mut data = linked_rom();
        data[8..12].copy_from_slice(&0u32.to_le_bytes());
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), data);
        let rule = LengthRule::Distinguished { entry: 1, count: 1 };
        let err = decode(&map, &CodecOptions::default(), CountSource::Stored(3), rule).unwrap_err();
        assert!(matches!(err.root(), Error::MalformedTable { .. }));
    }

    #[test]
    fn test_pointer_distance_lengths() {
        // entries at 0x10 (two cells) and 0x18 (one cell), table at 0x1C
        let mut data = vec![0u8; 0x10];
        data.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
        data.extend_from_slice(&0x1010u32.to_le_bytes());
        data.extend_from_slice(&0x1018u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), data);

        let ctx = VersionContext::for_version(EngineVersion::Gba);
        let options = CodecOptions::default();
        let mut sink = CollectingSink::new();
        let base = map.pointer(SegmentId(0), 0x1C).unwrap();
        let mut r = Reader::new(&map, ctx, &options, &mut sink, base);
        let table: ForwardPointerTable<Cell> = ForwardPointerTable::decode(
            &mut r,
            base,
            CountSource::Heuristic { lower_bound: 1 },
            LengthRule::PointerDistance,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.passes(), 1);
        assert_eq!(
            table.transitions(),
            &[
                TableState::Sized,
                TableState::ScanningCount,
                TableState::DecodingEntries,
                TableState::CheckingLinks,
                TableState::Converged,
            ]
        );
        let values: Vec<Vec<u8>> = table
            .entries()
            .map(|cells| cells.iter().map(|c| c.value).collect())
            .collect();
        assert_eq!(values, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_memory_mapped_entry_spans_segment() {
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), 0x0200_0000u32.to_le_bytes().to_vec());
        map.add_memory_mapped("ram", Some(0x0200_0000), vec![0; 12]);
        let table = decode(
            &map,
            &CodecOptions::default(),
            CountSource::Stored(1),
            LengthRule::PointerDistance,
        )
        .unwrap();
        assert_eq!(table.entry(0).unwrap().len(), 3);
    }

    #[test]
    fn test_write_into_round_trips() {
        let mut map = SegmentMap::new();
        map.add("rom", Some(BASE), linked_rom());
        let rule = LengthRule::Distinguished { entry: 1, count: 1 };
        let mut table = decode(&map, &CodecOptions::default(), CountSource::Stored(3), rule).unwrap();

        let ctx = VersionContext::for_version(EngineVersion::Gba);
        let mut copy = map.clone();
        table.write_into(&mut copy, ctx).unwrap();
        assert_eq!(copy.segment(SegmentId(0)).unwrap().data, linked_rom());

        table.entry_mut(2).unwrap()[3].value = 0xEE;
        table.write_into(&mut copy, ctx).unwrap();
        let data = &copy.segment(SegmentId(0)).unwrap().data;
        assert_eq!(data[0x27], 0xEE);
        assert_eq!(data.len(), linked_rom().len());
    }
}
