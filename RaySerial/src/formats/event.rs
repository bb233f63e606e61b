//! GBA and DSi event instances
//!
//! An event points to its state table (ETA): an array of pointers, one per
//! `etat`, each to an array of 8-byte [`ObjState`]s, one per `sub_etat`.
//! Neither size is stored. States link to other states of the same table,
//! which is what [`ForwardPointerTable`] uses to find the real sizes.

use crate::binary::{BitField, BitFieldGroup, Container, Pointer, Reader, SegmentMap, Writer};
use crate::error::{Error, Result};
use crate::schema::{FieldKind, FieldOp, Record, Schema, decode_record, encode_record, op};
use crate::table::{CountSource, ForwardPointerTable, LengthRule, Link, TableElement};
use crate::version::{EngineBranch, EngineVersion, VersionContext};

/// One state of an event's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjState {
    pub right_speed: i8,
    pub left_speed: i8,
    pub animation_index: u8,
    pub linked_etat: u8,
    pub linked_sub_etat: u8,
    pub unknown: u8,
    pub animation_speed: u8,
    pub sound: u8,
    pub flags: u8,
}

const SPEED_AND_SOUND_FIELDS: &[BitField] = &[
    BitField::unsigned("animation_speed", 4),
    BitField::unsigned("sound", 4),
];

/// Animation speed and sound nibbles of an [`ObjState`]
static SPEED_AND_SOUND: BitFieldGroup =
    BitFieldGroup::from_static(Container::U8, SPEED_AND_SOUND_FIELDS);

impl TableElement for ObjState {
    const SIZE: u64 = 8;

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let right_speed = r.read_i8()?;
        let left_speed = r.read_i8()?;
        let animation_index = r.read_u8()?;
        let linked_etat = r.read_u8()?;
        let linked_sub_etat = r.read_u8()?;
        let unknown = r.read_u8()?;
        let packed = SPEED_AND_SOUND.unpack(u32::from(r.read_u8()?));
        let flags = r.read_u8()?;
        Ok(Self {
            right_speed,
            left_speed,
            animation_index,
            linked_etat,
            linked_sub_etat,
            unknown,
            animation_speed: packed[0] as u8,
            sound: packed[1] as u8,
            flags,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        let packed = SPEED_AND_SOUND.pack(&[i64::from(self.animation_speed), i64::from(self.sound)])?;
        w.write_i8(self.right_speed);
        w.write_i8(self.left_speed);
        w.write_u8(self.animation_index);
        w.write_u8(self.linked_etat);
        w.write_u8(self.linked_sub_etat);
        w.write_u8(self.unknown);
        w.write_u8(packed as u8);
        w.write_u8(self.flags);
        Ok(())
    }

    fn link(&self) -> Option<Link> {
        Some(Link::new(
            usize::from(self.linked_etat),
            usize::from(self.linked_sub_etat),
        ))
    }
}

/// Event fields plus the decoded state table
#[derive(Debug, Clone)]
pub struct EventData {
    pub fields: Record,
    pub eta: Option<ForwardPointerTable<ObjState>>,
}

impl Schema for EventData {
    const NAME: &'static str = "EventData";

    fn layout(ctx: &VersionContext) -> Result<Vec<FieldOp>> {
        match (ctx.engine_branch, ctx.engine_version) {
            (EngineBranch::Gba, EngineVersion::Gba | EngineVersion::Dsi) => Ok(vec![
                op("eta_pointer", FieldKind::Pointer),
                op("commands_pointer", FieldKind::Pointer),
                op("x", FieldKind::I16),
                op("y", FieldKind::I16),
                op("display_prio", FieldKind::U16),
                op("link_group", FieldKind::U16),
                op("etat", FieldKind::U8),
                op("sub_etat", FieldKind::U8),
                op("offset_bx", FieldKind::U8),
                op("offset_by", FieldKind::U8),
                op("offset_hy", FieldKind::U8),
                op("follow_enabled", FieldKind::Bool),
                op("follow_sprite", FieldKind::U8),
                op("hit_points", FieldKind::U8),
                op("type", FieldKind::U16),
                op("hit_sprite", FieldKind::U8),
                op("padding", FieldKind::Padding(1)),
            ]),
            _ => Err(Error::unsupported(Self::NAME, ctx)),
        }
    }
}

impl EventData {
    /// Read the event and, when it has one, its state table.
    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        let start = r.position();
        let ctx = *r.version();
        Self::read_inner(r, &ctx).map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    fn read_inner(r: &mut Reader<'_>, ctx: &VersionContext) -> Result<Self> {
        let layout = Self::layout(ctx)?;
        let fields = decode_record(r, &layout)?;

        let eta = match fields.pointer("eta_pointer")? {
            Some(base) => {
                let etat = fields.uint("etat")? as usize;
                let sub_etat = fields.uint("sub_etat")? as usize;
                let (count, rule) = Self::eta_sizing(ctx, etat, sub_etat)?;
                Some(ForwardPointerTable::decode(r, base, count, rule)?)
            }
            None => None,
        };

        Ok(Self { fields, eta })
    }

    /// How the state table is sized. The GBA scans for the number of
    /// states, the DSi trusts the current state.
    fn eta_sizing(ctx: &VersionContext, etat: usize, sub_etat: usize) -> Result<(CountSource, LengthRule)> {
        match ctx.engine_version {
            EngineVersion::Gba => Ok((
                CountSource::Heuristic {
                    lower_bound: etat + 1,
                },
                LengthRule::PointerDistance,
            )),
            EngineVersion::Dsi => Ok((
                CountSource::Stored(etat + 1),
                LengthRule::Distinguished {
                    entry: etat,
                    count: sub_etat + 1,
                },
            )),
            _ => Err(Error::unsupported(Self::NAME, ctx)),
        }
    }

    /// Write the fixed event fields.
    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let start = w.position();
        let ctx = *w.version();
        Self::layout(&ctx)
            .and_then(|layout| encode_record(w, &layout, &self.fields))
            .map_err(|e| e.in_structure(Self::NAME, start.display_offset(), &ctx))
    }

    /// Write the state table back over its original location.
    pub fn write_eta(&self, segments: &mut SegmentMap, version: VersionContext) -> Result<()> {
        match &self.eta {
            Some(eta) => eta.write_into(segments, version),
            None => Ok(()),
        }
    }

    pub fn etat(&self) -> Result<u64> {
        self.fields.uint("etat")
    }

    pub fn sub_etat(&self) -> Result<u64> {
        self.fields.uint("sub_etat")
    }

    /// The state the event is currently in
    pub fn current_state(&self) -> Option<&ObjState> {
        let etat = usize::try_from(self.etat().ok()?).ok()?;
        let sub_etat = usize::try_from(self.sub_etat().ok()?).ok()?;
        self.eta.as_ref()?.get(Link::new(etat, sub_etat))
    }

    /// Event commands are not interpreted, only located.
    pub fn commands_pointer(&self) -> Result<Option<Pointer>> {
        self.fields.pointer("commands_pointer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::SegmentId;
    use crate::diagnostics::CollectingSink;
    use crate::options::CodecOptions;
    use crate::table::TableState;
    use pretty_assertions::assert_eq;

    const ROM: u64 = 0x0800_0000;

    fn state(linked_etat: u8, linked_sub_etat: u8, animation_index: u8) -> [u8; 8] {
        [0xFF, 0x01, animation_index, linked_etat, linked_sub_etat, 0, 0x52, 0x80]
    }

    /// Event at 0x00, states from 0x20, ETA pointer table at 0x60.
    ///
    /// etat 0 has two states, etat 1 has three. The event sits in etat 0 and
    /// the second state of etat 1 links to etat 2, which the stored etat
    /// alone would never reveal.
    fn rom(etat: u8, sub_etat: u8) -> Vec<u8> {
        let mut data = vec![0u8; 0x20];
        data[0..4].copy_from_slice(&((ROM + 0x60) as u32).to_le_bytes());
        data[8..10].copy_from_slice(&(-5i16).to_le_bytes());
        data[10..12].copy_from_slice(&300i16.to_le_bytes());
        data[16] = etat;
        data[17] = sub_etat;
        data[21] = 1;
        data[24..26].copy_from_slice(&7u16.to_le_bytes());

        // etat 0
        data.extend_from_slice(&state(0, 1, 10));
        data.extend_from_slice(&state(1, 0, 11));
        // etat 1
        data.extend_from_slice(&state(1, 1, 20));
        data.extend_from_slice(&state(2, 0, 21));
        data.extend_from_slice(&state(0, 0, 22));
        // etat 2
        data.extend_from_slice(&state(2, 0, 30));
        data.extend_from_slice(&[0; 0x10]);
        assert_eq!(data.len(), 0x60);

        for offset in [0x20u64, 0x30, 0x48] {
            data.extend_from_slice(&((ROM + offset) as u32).to_le_bytes());
        }
        data.extend_from_slice(&[0; 4]);
        data
    }

    fn decode(version: EngineVersion, data: Vec<u8>) -> (SegmentMap, EventData) {
        let ctx = VersionContext::for_version(version);
        let mut map = SegmentMap::new();
        let id = map.add("rom", Some(ROM), data);
        let options = CodecOptions::default();
        let mut sink = CollectingSink::new();
        let event = {
            let mut r = Reader::new(&map, ctx, &options, &mut sink, map.pointer(id, 0).unwrap());
            let event = EventData::read(&mut r).unwrap();
            assert_eq!(r.position().offset(), 28);
            event
        };
        (map, event)
    }

    #[test]
    fn test_obj_state_bits() {
        let ctx = VersionContext::for_version(EngineVersion::Gba);
        let mut map = SegmentMap::new();
        let id = map.add("rom", Some(ROM), state(3, 4, 5).to_vec());
        let options = CodecOptions::default();
        let mut sink = CollectingSink::new();
        let mut r = Reader::new(&map, ctx, &options, &mut sink, map.pointer(id, 0).unwrap());
        let s = ObjState::read(&mut r).unwrap();
        assert_eq!(s.right_speed, -1);
        assert_eq!(s.animation_speed, 2);
        assert_eq!(s.sound, 5);
        assert_eq!(s.link(), Some(Link::new(3, 4)));

        let mut w = Writer::new(ctx, SegmentId(1), Some(ROM));
        s.write(&mut w).unwrap();
        assert_eq!(w.finish().unwrap(), state(3, 4, 5).to_vec());
    }

    #[test]
    fn test_gba_event_scans_state_table() {
        let (_, event) = decode(EngineVersion::Gba, rom(0, 1));
        assert_eq!(event.fields.int("x").unwrap(), -5);
        assert_eq!(event.fields.int("y").unwrap(), 300);
        assert!(event.fields.bool("follow_enabled").unwrap());
        assert_eq!(event.fields.uint("type").unwrap(), 7);
        assert_eq!(event.commands_pointer().unwrap(), None);

        let eta = event.eta.as_ref().unwrap();
        assert_eq!(eta.state(), TableState::Converged);
        assert_eq!(eta.len(), 3);
        let lengths: Vec<usize> = eta.entries().map(<[ObjState]>::len).collect();
        assert_eq!(lengths, vec![2, 3, 3]);
        assert_eq!(event.current_state().unwrap().animation_index, 11);
    }

    #[test]
    fn test_dsi_event_grows_from_current_state() {
        let (_, event) = decode(EngineVersion::Dsi, rom(0, 1));
        let eta = event.eta.as_ref().unwrap();

        // etat 0 starts with sub_etat + 1 states; its links reveal etat 1,
        // whose links reveal etat 2
        assert_eq!(eta.len(), 3);
        assert_eq!(eta.entry(0).unwrap().len(), 2);
        assert_eq!(eta.entry(1).unwrap().len(), 2);
        assert_eq!(eta.entry(2).unwrap().len(), 1);
        assert!(eta.passes() <= 5);

        for state in eta.entries().flatten() {
            let link = state.link().unwrap();
            assert!(eta.get(link).is_some());
        }
    }

    #[test]
    fn test_event_round_trip() {
        let data = rom(1, 2);
        let (mut map, event) = decode(EngineVersion::Gba, data.clone());
        let ctx = VersionContext::for_version(EngineVersion::Gba);

        let mut w = Writer::new(ctx, SegmentId(0), Some(ROM));
        event.write(&mut w).unwrap();
        assert_eq!(w.finish().unwrap(), data[..28].to_vec());

        event.write_eta(&mut map, ctx).unwrap();
        assert_eq!(map.segment(SegmentId(0)).unwrap().data, data);
    }

    #[test]
    fn test_dsi_event_round_trip() {
        let data = rom(0, 1);
        let (mut map, mut event) = decode(EngineVersion::Dsi, data.clone());
        let ctx = VersionContext::for_version(EngineVersion::Dsi);

        let mut w = Writer::new(ctx, SegmentId(0), Some(ROM));
        event.write(&mut w).unwrap();
        assert_eq!(w.finish().unwrap(), data[..28].to_vec());

        event.write_eta(&mut map, ctx).unwrap();
        assert_eq!(map.segment(SegmentId(0)).unwrap().data, data);

        // second state of etat 1 sits at 0x38
        let eta = event.eta.as_mut().unwrap();
        eta.entry_mut(1).unwrap()[1].sound = 0xF;
        event.write_eta(&mut map, ctx).unwrap();
        let mut expected = data;
        expected[0x38 + 6] = 0xF2;
        assert_eq!(map.segment(SegmentId(0)).unwrap().data, expected);

        // the sound nibble is only four bits wide
        event.eta.as_mut().unwrap().entry_mut(1).unwrap()[1].sound = 0x10;
        let err = event.write_eta(&mut map, ctx).unwrap_err();
        assert!(matches!(err, Error::FieldOverflow { field: "sound", .. }));
    }

    #[test]
    fn test_pc_has_no_gba_events() {
        let ctx = VersionContext::for_version(EngineVersion::Pc);
        assert!(matches!(
            EventData::layout(&ctx),
            Err(Error::UnsupportedVariant { structure: "EventData", .. })
        ));
    }
}
