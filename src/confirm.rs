/*!
Exact confirmation of candidate matches.

Both schemes only produce *candidates*: an end position plus a set of buckets
whose coarse filter accepted it. This module owns the data used to turn a
candidate into zero or more confirmed literals, shared by both schemes:

* A fixed size record per literal, holding its report metadata and a pair of
  64-bit compare words that encode the literal's last 8 bytes (with case
  folding) merged with its trailing mask.
* A per-bucket hash table over the last 8 bytes of the haystack, mapping a
  window to the short list of literals in that bucket that could end there.

Records are stored in report order: longest literal first, ties broken by
the order literals were given in. A record's index is therefore its rank.
*/

use alloc::{vec, vec::Vec};

use crate::{
    literal::Literal,
    scan::Haystack,
    util::wire::{self, DeserializeError},
};

/// The size in bytes of a single literal record.
pub(crate) const RECORD_LEN: usize = 48;

/// The number of buckets every table has room for.
pub(crate) const BUCKETS: usize = 8;

const FLAG_NOCASE: u32 = 1 << 0;
const FLAG_NORUNS: u32 = 1 << 1;

/// The multiplier used to hash confirmation windows. (The 64-bit golden
/// ratio.)
const HASH_MUL: u64 = 0x9E37_79B9_7F4A_7C15;

/// Bucket headers start after the list offset and length.
const BUCKET_HEADERS: usize = 8;
const BUCKET_HEADER_LEN: usize = 16;

/// The decoded form of a literal record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Record {
    pub(crate) id: u32,
    flags: u32,
    pub(crate) groups: u64,
    pub(crate) len: usize,
    pub(crate) pat_off: usize,
    pub(crate) coverage: usize,
    /// Which bits of the last 8 bytes are checked.
    cm: u64,
    /// What the checked bits must be.
    cv: u64,
}

impl Record {
    pub(crate) fn new(lit: &Literal, pat_off: usize) -> Record {
        let (cm, cv) = compare_words(lit);
        let mut flags = 0;
        if lit.is_nocase() {
            flags |= FLAG_NOCASE;
        }
        if lit.is_noruns() {
            flags |= FLAG_NORUNS;
        }
        Record {
            id: lit.id(),
            flags,
            groups: lit.get_groups().bits(),
            len: lit.len(),
            pat_off,
            coverage: lit.coverage(),
            cm,
            cv,
        }
    }

    /// Reads the record at the beginning of the given slice. This panics if
    /// the slice is shorter than a record.
    #[inline]
    pub(crate) fn read(slice: &[u8]) -> Record {
        Record {
            id: wire::read_u32(&slice[0..]),
            flags: wire::read_u32(&slice[4..]),
            groups: wire::read_u64(&slice[8..]),
            len: wire::read_u32(&slice[16..]) as usize,
            pat_off: wire::read_u32(&slice[20..]) as usize,
            coverage: wire::read_u32(&slice[24..]) as usize,
            cm: wire::read_u64(&slice[32..]),
            cv: wire::read_u64(&slice[40..]),
        }
    }

    pub(crate) fn write_to(&self, dst: &mut [u8]) {
        wire::write_u32(self.id, &mut dst[0..]);
        wire::write_u32(self.flags, &mut dst[4..]);
        wire::write_u64(self.groups, &mut dst[8..]);
        wire::write_u32(self.len as u32, &mut dst[16..]);
        wire::write_u32(self.pat_off as u32, &mut dst[20..]);
        wire::write_u32(self.coverage as u32, &mut dst[24..]);
        wire::write_u32(0, &mut dst[28..]);
        wire::write_u64(self.cm, &mut dst[32..]);
        wire::write_u64(self.cv, &mut dst[40..]);
    }

    #[inline]
    pub(crate) fn is_nocase(&self) -> bool {
        self.flags & FLAG_NOCASE != 0
    }

    #[inline]
    pub(crate) fn is_noruns(&self) -> bool {
        self.flags & FLAG_NORUNS != 0
    }

    /// Returns true if this literal, ending at virtual position `at`, is
    /// present in the haystack. `window` must be `hay.window(at)`.
    #[inline]
    pub(crate) fn confirm(
        &self,
        hay: &Haystack<'_>,
        at: usize,
        window: u64,
        patterns: &[u8],
    ) -> bool {
        if at + 1 < self.coverage {
            return false;
        }
        if window & self.cm != self.cv {
            return false;
        }
        if self.len <= 8 {
            return true;
        }
        // The last 8 bytes were covered by the window.
        let head = &patterns[self.pat_off..self.pat_off + self.len - 8];
        hay.eq_at(at + 1 - self.len, head, self.is_nocase())
    }
}

/// Builds the compare words for a literal. Byte `j` from the end of the
/// literal lives in bits `8 * (7 - j)` of each word, which matches a little
/// endian read of the 8 haystack bytes ending at the match.
fn compare_words(lit: &Literal) -> (u64, u64) {
    let (pat, mask, cmp) = (lit.pattern(), lit.get_mask(), lit.get_cmp());
    let (mut cm, mut cv) = (0u64, 0u64);
    for j in 0..8 {
        let (mut m, mut c) = (0u8, 0u8);
        if j < pat.len() {
            let b = pat[pat.len() - 1 - j];
            if lit.is_nocase() && b.is_ascii_alphabetic() {
                m = 0xDF;
                c = b & 0xDF;
            } else {
                m = 0xFF;
                c = b;
            }
        }
        if j < mask.len() {
            m |= mask[mask.len() - 1 - j];
            c |= cmp[cmp.len() - 1 - j];
        }
        let shift = 8 * (7 - j);
        cm |= u64::from(m) << shift;
        cv |= u64::from(c) << shift;
    }
    (cm, cv)
}

#[inline(always)]
fn slot(key: u64, bits: u32) -> usize {
    (key.wrapping_mul(HASH_MUL) >> (64 - bits)) as usize
}

/// Builds the confirmation region for the given buckets, where each bucket
/// is a list of record indices in ascending order.
///
/// The layout is:
///
/// * the offset and length (in entries) of the shared literal index list,
/// * 8 bucket headers of an AND mask, a slot bit count and the offset of the
///   bucket's slot table,
/// * each bucket's slot table, with `(start, count)` pairs into the list,
/// * the list itself.
pub(crate) fn build(records: &[Record], buckets: &[Vec<usize>]) -> Vec<u8> {
    assert!(buckets.len() <= BUCKETS);
    let mut headers = [(0u64, 0u32); BUCKETS];
    let mut slot_tables: Vec<Vec<Vec<u32>>> = vec![];
    for (b, lits) in buckets.iter().enumerate() {
        if lits.is_empty() {
            slot_tables.push(vec![]);
            continue;
        }
        let andmsk = lits.iter().fold(!0u64, |acc, &i| acc & records[i].cm);
        let bits = slot_bits(lits.len());
        let mut slots = vec![vec![]; 1 << bits];
        for &i in lits.iter() {
            let key = records[i].cv & andmsk;
            slots[slot(key, bits)].push(i as u32);
        }
        headers[b] = (andmsk, bits);
        slot_tables.push(slots);
    }

    let mut slots_len = 0;
    for slots in slot_tables.iter() {
        slots_len += slots.len() * 8;
    }
    let list_len: usize = buckets.iter().map(|lits| lits.len()).sum();
    let list_off = BUCKET_HEADERS + BUCKETS * BUCKET_HEADER_LEN + slots_len;
    let mut region = vec![0; list_off + list_len * 4];
    wire::write_u32(list_off as u32, &mut region[0..]);
    wire::write_u32(list_len as u32, &mut region[4..]);

    let mut slots_off = BUCKET_HEADERS + BUCKETS * BUCKET_HEADER_LEN;
    let mut list_index = 0;
    for (b, slots) in slot_tables.iter().enumerate() {
        let header = BUCKET_HEADERS + b * BUCKET_HEADER_LEN;
        let (andmsk, bits) = headers[b];
        wire::write_u64(andmsk, &mut region[header..]);
        wire::write_u32(bits, &mut region[header + 8..]);
        wire::write_u32(slots_off as u32, &mut region[header + 12..]);
        for lits in slots.iter() {
            wire::write_u32(list_index as u32, &mut region[slots_off..]);
            wire::write_u32(lits.len() as u32, &mut region[slots_off + 4..]);
            for &i in lits.iter() {
                let at = list_off + list_index * 4;
                wire::write_u32(i, &mut region[at..]);
                list_index += 1;
            }
            slots_off += 8;
        }
    }
    region
}

/// Chooses the number of slot bits for a bucket with `n` literals, such that
/// there are at least twice as many slots as literals.
fn slot_bits(n: usize) -> u32 {
    let mut bits = 1;
    while (1usize << bits) < 2 * n && bits < 16 {
        bits += 1;
    }
    bits
}

/// Calls `f` with the index of every literal in bucket `b` that could end at
/// a position whose last 8 bytes are `window`. Returns false if `f` did.
#[inline]
pub(crate) fn for_each_in_slot<F: FnMut(usize) -> bool>(
    region: &[u8],
    b: usize,
    window: u64,
    mut f: F,
) -> bool {
    let header = BUCKET_HEADERS + b * BUCKET_HEADER_LEN;
    let bits = wire::read_u32(&region[header + 8..]);
    if bits == 0 {
        return true;
    }
    let andmsk = wire::read_u64(&region[header..]);
    let slots_off = wire::read_u32(&region[header + 12..]) as usize;
    let entry = slots_off + slot(window & andmsk, bits) * 8;
    let start = wire::read_u32(&region[entry..]) as usize;
    let count = wire::read_u32(&region[entry + 4..]) as usize;
    let list_off = wire::read_u32(&region[0..]) as usize;
    for k in start..start + count {
        let i = wire::read_u32(&region[list_off + k * 4..]) as usize;
        if !f(i) {
            return false;
        }
    }
    true
}

/// Validates a confirmation region against the number of literal records,
/// so that scanning with it can never index out of bounds.
pub(crate) fn validate(
    region: &[u8],
    literals: usize,
) -> Result<(), DeserializeError> {
    let headers_end = BUCKET_HEADERS + BUCKETS * BUCKET_HEADER_LEN;
    wire::check_slice_len(region, headers_end, "confirmation headers")?;
    let list_off = wire::read_u32(&region[0..]) as usize;
    let list_len = wire::read_u32(&region[4..]) as usize;
    let list_end =
        wire::add(list_off, wire::mul(list_len, 4, "list length")?, "list")?;
    if list_off < headers_end || list_end > region.len() {
        return Err(DeserializeError::generic(
            "confirmation list is out of bounds",
        ));
    }
    for k in 0..list_len {
        let i = wire::read_u32(&region[list_off + k * 4..]) as usize;
        if i >= literals {
            return Err(DeserializeError::generic(
                "confirmation list refers to a missing literal",
            ));
        }
    }
    for b in 0..BUCKETS {
        let header = BUCKET_HEADERS + b * BUCKET_HEADER_LEN;
        let bits = wire::read_u32(&region[header + 8..]);
        if bits == 0 {
            continue;
        }
        if bits > 16 {
            return Err(DeserializeError::generic("too many slot bits"));
        }
        let slots_off = wire::read_u32(&region[header + 12..]) as usize;
        let slots_end = wire::add(slots_off, (1usize << bits) * 8, "slots")?;
        if slots_off < headers_end || slots_end > list_off {
            return Err(DeserializeError::generic(
                "confirmation slot table is out of bounds",
            ));
        }
        for s in 0..(1usize << bits) {
            let entry = slots_off + s * 8;
            let start = wire::read_u32(&region[entry..]) as usize;
            let count = wire::read_u32(&region[entry + 4..]) as usize;
            if wire::add(start, count, "slot")? > list_len {
                return Err(DeserializeError::generic(
                    "confirmation slot refers past end of list",
                ));
            }
        }
    }
    Ok(())
}
