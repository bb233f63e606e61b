//! Sub-byte field packing
//!
//! Several structures squeeze two or more small integers into one byte,
//! `u16` or `u32`. Fields are laid out from the least significant bit
//! upwards in declaration order, so for a `u8` holding two nibbles the first
//! declared field is the low nibble.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Width of the integer a group is packed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    U8,
    U16,
    U32,
}

impl Container {
    pub const fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
        }
    }

    pub const fn size(self) -> usize {
        (self.bits() / 8) as usize
    }
}

/// One named field inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub bits: u32,
    pub signed: bool,
}

impl BitField {
    pub const fn unsigned(name: &'static str, bits: u32) -> Self {
        Self {
            name,
            bits,
            signed: false,
        }
    }

    pub const fn signed(name: &'static str, bits: u32) -> Self {
        Self {
            name,
            bits,
            signed: true,
        }
    }

    fn mask(&self) -> u32 {
        if self.bits >= 32 {
            u32::MAX
        } else {
            (1u32 << self.bits) - 1
        }
    }

    fn range(&self) -> (i64, i64) {
        if self.signed {
            let half = 1i64 << (self.bits - 1);
            (-half, half - 1)
        } else {
            (0, (1i64 << self.bits) - 1)
        }
    }

    fn extract(&self, raw: u32) -> i64 {
        let value = raw & self.mask();
        if self.signed && self.bits < 32 && value & (1 << (self.bits - 1)) != 0 {
            i64::from(value) - (1i64 << self.bits)
        } else if self.signed {
            i64::from(value as i32)
        } else {
            i64::from(value)
        }
    }
}

/// Fields that exactly fill one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitFieldGroup {
    container: Container,
    fields: Cow<'static, [BitField]>,
}

impl BitFieldGroup {
    /// Build a group. Fails if the widths don't add up to the container.
    pub fn new(container: Container, fields: Vec<BitField>) -> Result<Self> {
        let total: u32 = fields.iter().map(|f| f.bits).sum();
        if total != container.bits() || fields.iter().any(|f| f.bits == 0) {
            return Err(Error::InvalidBitFieldGroup {
                container: container.bits(),
                total,
            });
        }
        Ok(Self {
            container,
            fields: Cow::Owned(fields),
        })
    }

    /// Build a group from a fixed field list at compile time.
    ///
    /// Widths that don't add up to the container fail const evaluation.
    pub const fn from_static(container: Container, fields: &'static [BitField]) -> Self {
        let mut total = 0;
        let mut i = 0;
        while i < fields.len() {
            assert!(fields[i].bits > 0, "bit field of width 0");
            total += fields[i].bits;
            i += 1;
        }
        assert!(total == container.bits(), "bit fields must fill their container");
        Self {
            container,
            fields: Cow::Borrowed(fields),
        }
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn fields(&self) -> &[BitField] {
        &self.fields
    }

    /// Split a container value into its fields, in declaration order.
    pub fn unpack(&self, raw: u32) -> Vec<i64> {
        let mut shift = 0;
        self.fields
            .iter()
            .map(|field| {
                let value = field.extract(raw.checked_shr(shift).unwrap_or(0));
                shift += field.bits;
                value
            })
            .collect()
    }

    /// Combine field values (declaration order) into a container value.
    pub fn pack(&self, values: &[i64]) -> Result<u32> {
        let mut raw = 0u32;
        let mut shift = 0;
        for (field, &value) in self.fields.iter().zip(values) {
            let (min, max) = field.range();
            if value < min || value > max {
                return Err(Error::FieldOverflow {
                    field: field.name,
                    value,
                    bits: field.bits,
                });
            }
            let bits = (value as u32) & field.mask();
            raw |= bits.checked_shl(shift).unwrap_or(0);
            shift += field.bits;
        }
        if values.len() != self.fields.len() {
            let missing = self.fields.get(values.len()).map_or("", |f| f.name);
            return Err(Error::MissingField(missing.to_string()));
        }
        Ok(raw)
    }
}
