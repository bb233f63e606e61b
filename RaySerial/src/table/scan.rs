//! Entry count inference for tables without a stored count

use crate::binary::{Pointer, Reader};
use crate::error::{Error, Result};

/// Count the entries of the pointer table at `base` by reading candidate
/// pointers until one is implausible.
///
/// The first `lower_bound` candidates are always accepted, whatever they
/// hold. A value that maps to no segment counts as null: accepted below the
/// lower bound, the end of the table past it.
pub fn scan_entry_count(r: &mut Reader<'_>, base: Pointer, lower_bound: usize) -> Result<usize> {
    let ceiling = r.options().scan_distance_ceiling;
    r.at(base, |r| {
        let mut count = 0usize;
        let mut previous: Option<Pointer> = None;

        while r.remaining()? >= 4 {
            let candidate = match r.read_pointer() {
                Ok(candidate) => candidate,
                Err(Error::InvalidPointer { value, offset }) => {
                    tracing::trace!("unmapped candidate {:#x} at {:#x}", value, offset);
                    None
                }
                Err(e) => return Err(e),
            };

            if count >= lower_bound && !is_plausible(candidate, previous, base, ceiling) {
                break;
            }
            count += 1;
            previous = candidate;
        }

        tracing::debug!("scanned {} entries at {:#x}", count, base.display_offset());
        Ok(count)
    })
}

/// Whether `candidate` looks like the next entry of the table at `base`.
///
/// `previous` is the last accepted candidate. When it was null the distance
/// check is skipped.
pub fn is_plausible(
    candidate: Option<Pointer>,
    previous: Option<Pointer>,
    base: Pointer,
    ceiling: u64,
) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    if candidate == base {
        return false;
    }
    let Some(previous) = previous else {
        return true;
    };
    if candidate.segment() != previous.segment() && candidate.segment() != base.segment() {
        return true;
    }
    match previous.distance_to(&candidate) {
        Ok(distance) => distance > 0 && (distance as u64) < ceiling,
        Err(_) => false,
    }
}
