/*!
The masked nibble scheme.

Every literal is assigned to one of 8 buckets. For each of the last `N`
bytes of a literal (`N` between 1 and 4), the scheme keeps two 16 entry
tables of bucket bits: one indexed by the low nibble of a byte, one by its
high nibble. A position `v` is a candidate end for bucket `b` when, for
every `n < N`, both nibbles of the byte at `v - n` have bit `b` set in the
tables for distance `n`.

Since each table lookup is a byte shuffle, 16 or 32 consecutive positions
are checked at once with vector instructions. The filter is coarse: nibbles
of different literals in the same bucket combine freely, so every candidate
is confirmed exactly.
*/

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec,
    vec::Vec,
};

use crate::{
    confirm::BUCKETS,
    literal::Literal,
    scan::{Haystack, Kernel},
    scheme::{Scheme, VectorWidth},
    table::Candidate,
    util::flip_case,
};

mod vector;

/// The largest number of trailing bytes a masked filter checks.
pub(crate) const MAX_MASKS: usize = 4;

/// Builds the masked scheme candidates for the given literals, which must be
/// in rank order. This returns no candidates when the literals don't fit in
/// 8 buckets of at most `width` literals each.
pub(crate) fn candidates(
    lits: &[Literal],
    width: usize,
    vectors: VectorWidth,
    packed: bool,
) -> Vec<Candidate> {
    if vectors == VectorWidth::None {
        return vec![];
    }
    if lits.len() > BUCKETS * width {
        debug!(
            "masked scheme: {} literals exceed {} buckets of width {}",
            lits.len(),
            BUCKETS,
            width,
        );
        return vec![];
    }
    let masks = mask_count(lits);
    let buckets = match assign_buckets(lits, masks, width) {
        None => {
            debug!(
                "masked scheme: {} literals with {} masks do not fit in \
                 {} buckets of width {}",
                lits.len(),
                masks,
                BUCKETS,
                width,
            );
            return vec![];
        }
        Some(buckets) => buckets,
    };
    debug!(
        "masked scheme: {} literals in {} buckets with {} masks",
        lits.len(),
        buckets.len(),
        masks,
    );

    let (lo, hi) = nibble_tables(lits, &buckets, masks);
    let mut out = vec![];
    if packed && hi[..masks].iter().all(|t| t == &hi[0]) {
        let mut region = lo[..masks].concat();
        region.extend_from_slice(&hi[0]);
        out.push(Candidate {
            scheme: Scheme::Masked { masks: masks as u8, packed: true },
            vectors,
            region,
            classes: None,
            buckets: buckets.clone(),
        });
    }
    let mut region = lo[..masks].concat();
    region.extend_from_slice(&hi[..masks].concat());
    out.push(Candidate {
        scheme: Scheme::Masked { masks: masks as u8, packed: false },
        vectors,
        region,
        classes: None,
        buckets,
    });
    out
}

/// Returns the number of trailing bytes needed to tell the literals apart
/// without regard to case, up to the maximum.
fn mask_count(lits: &[Literal]) -> usize {
    let folded: Vec<Vec<u8>> =
        lits.iter().map(|lit| lit.pattern().to_ascii_lowercase()).collect();
    let distinct: BTreeSet<&[u8]> = folded.iter().map(|p| &**p).collect();
    let max_len = folded.iter().map(|p| p.len()).max().unwrap_or(1);
    for n in 1..=MAX_MASKS {
        let suffixes: BTreeSet<&[u8]> = folded
            .iter()
            .map(|p| &p[p.len().saturating_sub(n)..])
            .collect();
        if suffixes.len() == distinct.len() {
            return n;
        }
    }
    core::cmp::min(MAX_MASKS, max_len)
}

/// A group of literals sharing a bucket, along with the nibbles accepted at
/// each distance from the end.
#[derive(Clone, Debug)]
struct Cluster {
    members: Vec<usize>,
    lo: [u16; MAX_MASKS],
    hi: [u16; MAX_MASKS],
}

impl Cluster {
    fn new(lits: &[Literal], members: Vec<usize>, masks: usize) -> Cluster {
        let mut c =
            Cluster { members, lo: [0; MAX_MASKS], hi: [0; MAX_MASKS] };
        for &i in c.members.iter() {
            let lit = &lits[i];
            for n in 0..masks {
                for &b in nibble_bytes(lit, n).iter() {
                    match b {
                        None => {
                            c.lo[n] = 0xFFFF;
                            c.hi[n] = 0xFFFF;
                        }
                        Some(b) => {
                            c.lo[n] |= 1 << (b & 0xF);
                            c.hi[n] |= 1 << (b >> 4);
                        }
                    }
                }
            }
        }
        c
    }

    fn bits(&self) -> u32 {
        self.lo.iter().chain(self.hi.iter()).map(|s| s.count_ones()).sum()
    }

    fn merge(&self, other: &Cluster) -> Cluster {
        let mut members = self.members.clone();
        members.extend_from_slice(&other.members);
        members.sort_unstable();
        let mut c = Cluster { members, lo: self.lo, hi: self.hi };
        for n in 0..MAX_MASKS {
            c.lo[n] |= other.lo[n];
            c.hi[n] |= other.hi[n];
        }
        c
    }
}

/// Returns the bytes a literal may have at distance `n` from its end. `None`
/// means any byte, which is the case past the start of the literal.
fn nibble_bytes(lit: &Literal, n: usize) -> [Option<u8>; 2] {
    let pat = lit.pattern();
    if n >= pat.len() {
        return [None, None];
    }
    let b = pat[pat.len() - 1 - n];
    if lit.is_nocase() {
        [Some(b), Some(flip_case(b))]
    } else {
        [Some(b), Some(b)]
    }
}

/// Groups literals by their case folded suffix, then greedily merges the two
/// groups that add the fewest new nibble bits to each other until at most 8
/// groups remain. Returns `None` if the literals don't fit in 8 buckets of
/// at most `width` literals.
fn assign_buckets(
    lits: &[Literal],
    masks: usize,
    width: usize,
) -> Option<Vec<Vec<usize>>> {
    if lits.len() > BUCKETS * width {
        return None;
    }
    let mut by_suffix: BTreeMap<Vec<u8>, Vec<usize>> = BTreeMap::new();
    for (i, lit) in lits.iter().enumerate() {
        let pat = lit.pattern();
        let suffix =
            pat[pat.len().saturating_sub(masks)..].to_ascii_lowercase();
        by_suffix.entry(suffix).or_insert_with(Vec::new).push(i);
    }
    let mut clusters = vec![];
    for members in by_suffix.values() {
        for chunk in members.chunks(width) {
            clusters.push(Cluster::new(lits, chunk.to_vec(), masks));
        }
    }
    let mut buckets = match merge_clusters(clusters, width) {
        Some(clusters) => {
            clusters.into_iter().map(|c| c.members).collect::<Vec<_>>()
        }
        None => {
            // Greedy merging can strand groups that no longer fit together.
            // Filling buckets in suffix order always fits.
            let order: Vec<usize> = by_suffix.into_values().flatten().collect();
            order.chunks(width).map(|chunk| chunk.to_vec()).collect()
        }
    };
    for members in buckets.iter_mut() {
        members.sort_unstable();
    }
    // Keep bucket order deterministic and tied to rank.
    buckets.sort_by_key(|members| members[0]);
    log! {
        for (b, members) in buckets.iter().enumerate() {
            trace!("masked bucket {}: literals {:?}", b, members);
        }
    }
    Some(buckets)
}

fn merge_clusters(
    mut clusters: Vec<Cluster>,
    width: usize,
) -> Option<Vec<Cluster>> {
    while clusters.len() > BUCKETS {
        let mut best: Option<(u32, usize, usize)> = None;
        for a in 0..clusters.len() {
            for b in a + 1..clusters.len() {
                let (ca, cb) = (&clusters[a], &clusters[b]);
                if ca.members.len() + cb.members.len() > width {
                    continue;
                }
                let union = ca.merge(cb).bits();
                let added = (union - ca.bits()) + (union - cb.bits());
                if best.map_or(true, |(cost, _, _)| added < cost) {
                    best = Some((added, a, b));
                }
            }
        }
        let (_, a, b) = best?;
        let merged = clusters[a].merge(&clusters[b]);
        clusters.remove(b);
        clusters[a] = merged;
    }
    Some(clusters)
}

/// Builds the low and high nibble tables for every mask.
fn nibble_tables(
    lits: &[Literal],
    buckets: &[Vec<usize>],
    masks: usize,
) -> ([[u8; 16]; MAX_MASKS], [[u8; 16]; MAX_MASKS]) {
    let mut lo = [[0u8; 16]; MAX_MASKS];
    let mut hi = [[0u8; 16]; MAX_MASKS];
    for (b, members) in buckets.iter().enumerate() {
        let bit = 1u8 << b;
        for &i in members.iter() {
            for n in 0..masks {
                for &byte in nibble_bytes(&lits[i], n).iter() {
                    match byte {
                        None => {
                            for x in 0..16 {
                                lo[n][x] |= bit;
                                hi[n][x] |= bit;
                            }
                        }
                        Some(byte) => {
                            lo[n][usize::from(byte & 0xF)] |= bit;
                            hi[n][usize::from(byte >> 4)] |= bit;
                        }
                    }
                }
            }
        }
    }
    (lo, hi)
}

/// The nibble tables of a masked table, decoded out of its scheme region.
#[derive(Clone, Debug)]
pub(crate) struct Masks {
    count: usize,
    lo: [[u8; 16]; MAX_MASKS],
    hi: [[u8; 16]; MAX_MASKS],
}

impl Masks {
    /// Decodes the scheme region. The caller must ensure it has the size
    /// returned by `region_len`.
    pub(crate) fn new(region: &[u8], count: usize, packed: bool) -> Masks {
        let mut masks =
            Masks { count, lo: [[0; 16]; MAX_MASKS], hi: [[0; 16]; MAX_MASKS] };
        for n in 0..count {
            masks.lo[n].copy_from_slice(&region[n * 16..n * 16 + 16]);
            let at = if packed { count * 16 } else { (count + n) * 16 };
            masks.hi[n].copy_from_slice(&region[at..at + 16]);
        }
        masks
    }

    #[inline(always)]
    fn lookup(&self, n: usize, byte: u8) -> u8 {
        self.lo[n][usize::from(byte & 0xF)] & self.hi[n][usize::from(byte >> 4)]
    }
}

/// Returns the size of the scheme region for the given parameters.
pub(crate) fn region_len(count: usize, packed: bool) -> usize {
    if packed {
        (count + 1) * 16
    } else {
        count * 2 * 16
    }
}

/// Which implementation runs the bulk of a scan.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Simd {
    Portable,
    #[cfg(target_arch = "x86_64")]
    Ssse3,
    #[cfg(target_arch = "x86_64")]
    Avx2,
}

impl Simd {
    /// Picks the widest implementation that the table allows and the running
    /// CPU supports.
    fn detect(vectors: VectorWidth) -> Simd {
        #[cfg(target_arch = "x86_64")]
        {
            use crate::scheme::{avx2_available, ssse3_available};

            if vectors == VectorWidth::V256 && avx2_available() {
                return Simd::Avx2;
            }
            if vectors >= VectorWidth::V128 && ssse3_available() {
                return Simd::Ssse3;
            }
        }
        let _ = vectors;
        Simd::Portable
    }
}

/// The filter of the masked scheme.
#[derive(Debug)]
pub(crate) struct MaskedKernel {
    masks: Masks,
    simd: Simd,
}

impl MaskedKernel {
    pub(crate) fn new(masks: Masks, vectors: VectorWidth) -> MaskedKernel {
        MaskedKernel { masks, simd: Simd::detect(vectors) }
    }

    /// Runs the vector filter over `bytes[i..end]`, in haystack positions.
    /// Positions past the last full vector are left to the caller. Returns
    /// the first position not checked, or `None` if `f` returned false.
    #[inline]
    fn bulk<F: FnMut(usize, u8) -> bool>(
        &self,
        bytes: &[u8],
        i: usize,
        end: usize,
        f: &mut F,
    ) -> Option<usize> {
        debug_assert!(i + 1 >= self.masks.count);
        debug_assert!(end <= bytes.len());
        match self.simd {
            Simd::Portable => vector::portable(&self.masks, bytes, i, end, f),
            // SAFETY: Both are only selected when the running CPU supports
            // the target feature, and the bounds were asserted above.
            #[cfg(target_arch = "x86_64")]
            Simd::Ssse3 => unsafe {
                vector::ssse3(&self.masks, bytes, i, end, f)
            },
            #[cfg(target_arch = "x86_64")]
            Simd::Avx2 => unsafe {
                vector::avx2(&self.masks, bytes, i, end, f)
            },
        }
    }
}

impl Kernel for MaskedKernel {
    #[inline]
    fn candidates_at(&self, hay: &Haystack<'_>, at: usize) -> u8 {
        let mut cand = 0xFF;
        // Bytes before the start of the history are wildcards.
        for n in 0..core::cmp::min(self.masks.count, at + 1) {
            cand &= self.masks.lookup(n, hay.byte(at - n));
        }
        cand
    }

    fn for_each_candidate<F: FnMut(usize, u8) -> bool>(
        &self,
        hay: &Haystack<'_>,
        from: usize,
        to: usize,
        mut f: F,
    ) -> bool {
        let h = hay.history_len();
        // Vector loads never reach into the history, so positions whose
        // masks do are checked one at a time.
        let bulk_from = core::cmp::max(from, h + self.masks.count - 1);
        let mut at = from;
        while at < core::cmp::min(to, bulk_from) {
            let cand = self.candidates_at(hay, at);
            if cand != 0 && !f(at, cand) {
                return false;
            }
            at += 1;
        }
        if at < to {
            let mut g = |i: usize, cand: u8| f(h + i, cand);
            match self.bulk(hay.bytes(), at - h, to - h, &mut g) {
                None => return false,
                Some(next) => at = h + next,
            }
        }
        while at < to {
            let cand = self.candidates_at(hay, at);
            if cand != 0 && !f(at, cand) {
                return false;
            }
            at += 1;
        }
        true
    }
}
