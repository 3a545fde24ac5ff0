// Long runs of a single byte make both filters report a candidate at nearly
// every position for literals made of that byte, and confirming them one
// bucket at a time is slow. The flood region lists, for every byte value,
// the literals that consist entirely of that byte (under their case rule),
// so the scan driver can confirm only those while inside a run.
//
// The region is 256 (start, count) pairs into a list of literal indices
// that follows them. Every list is in rank order.

use alloc::{vec, vec::Vec};

use crate::{
    literal::Literal,
    util::{
        flip_case,
        wire::{self, DeserializeError},
    },
};

const ENTRIES_LEN: usize = 256 * 8;

/// Returns true if every byte of the literal matches `byte`.
fn is_flood_of(lit: &Literal, byte: u8) -> bool {
    lit.pattern().iter().all(|&b| {
        b == byte || (lit.is_nocase() && b.eq_ignore_ascii_case(&byte))
    })
}

/// Builds the flood region for literals given in rank order.
pub(crate) fn build(lits: &[Literal]) -> Vec<u8> {
    let mut lists: Vec<Vec<u32>> = vec![vec![]; 256];
    for (i, lit) in lits.iter().enumerate() {
        let first = lit.pattern()[0];
        if is_flood_of(lit, first) {
            lists[usize::from(first)].push(i as u32);
        }
        let other = flip_case(first);
        if lit.is_nocase() && other != first && is_flood_of(lit, other) {
            lists[usize::from(other)].push(i as u32);
        }
    }
    let total: usize = lists.iter().map(|l| l.len()).sum();
    let mut region = vec![0; ENTRIES_LEN + total * 4];
    let mut start = 0;
    for (byte, list) in lists.iter().enumerate() {
        wire::write_u32(start as u32, &mut region[byte * 8..]);
        wire::write_u32(list.len() as u32, &mut region[byte * 8 + 4..]);
        for &i in list.iter() {
            wire::write_u32(i, &mut region[ENTRIES_LEN + start * 4..]);
            start += 1;
        }
    }
    if total > 0 {
        debug!("flood guard: {} literals made of a single byte", total);
    }
    region
}

/// Returns the encoded list of literal indices for the given byte: a
/// sequence of native endian `u32`s. An empty region has no flood literals.
#[inline]
pub(crate) fn list(region: &[u8], byte: u8) -> &[u8] {
    if region.is_empty() {
        return &[];
    }
    let entry = usize::from(byte) * 8;
    let start = wire::read_u32(&region[entry..]) as usize;
    let count = wire::read_u32(&region[entry + 4..]) as usize;
    let at = ENTRIES_LEN + start * 4;
    &region[at..at + count * 4]
}

/// Validates a flood region against the number of literal records.
pub(crate) fn validate(
    region: &[u8],
    literals: usize,
) -> Result<(), DeserializeError> {
    if region.is_empty() {
        return Ok(());
    }
    wire::check_slice_len(region, ENTRIES_LEN, "flood entries")?;
    if (region.len() - ENTRIES_LEN) % 4 != 0 {
        return Err(DeserializeError::generic("flood list is misaligned"));
    }
    let total = (region.len() - ENTRIES_LEN) / 4;
    for byte in 0..256 {
        let start = wire::read_u32(&region[byte * 8..]) as usize;
        let count = wire::read_u32(&region[byte * 8 + 4..]) as usize;
        if wire::add(start, count, "flood entry")? > total {
            return Err(DeserializeError::generic(
                "flood entry refers past end of list",
            ));
        }
    }
    for i in region[ENTRIES_LEN..].chunks_exact(4) {
        if wire::read_u32(i) as usize >= literals {
            return Err(DeserializeError::generic(
                "flood list refers to a missing literal",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(region: &[u8], byte: u8) -> Vec<u32> {
        list(region, byte).chunks_exact(4).map(wire::read_u32).collect()
    }

    #[test]
    fn lists_follow_case_rules() {
        let lits = vec![
            Literal::new("aaaaaaaa", 0),
            Literal::new("aAa", 1).nocase(true),
            Literal::new("aab", 2),
            Literal::new("a", 3),
            Literal::new("AA", 4),
            Literal::new("\x00\x00", 5),
        ];
        let region = build(&lits);
        validate(&region, lits.len()).unwrap();
        assert_eq!(vec![0, 1, 3], indices(&region, b'a'));
        assert_eq!(vec![1, 4], indices(&region, b'A'));
        assert_eq!(vec![5], indices(&region, 0));
        assert!(indices(&region, b'b').is_empty());
    }

    #[test]
    fn validate_rejects_bad_lists() {
        let region = build(&[Literal::new("zz", 0)]);
        assert!(validate(&region, 0).is_err());
        assert!(validate(&region[..ENTRIES_LEN + 2], 1).is_err());
        assert!(validate(&[], 0).is_ok());
        assert!(list(&[], b'z').is_empty());
    }
}
