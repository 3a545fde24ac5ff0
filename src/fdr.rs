/*!
The hash-bucket scheme.

Literals are spread over at most 8 buckets, first by their effective length
(the number of trailing bytes the filter looks at, at most 8), then by
splitting the most expensive buckets in half. The filter is a shift-or
automaton over a 64-bit state: 8 lanes of 8 bucket bits each, where lane
`7 - t` tracks whether some literal in a bucket may have its byte at
distance `t` from the end at the current position. A set bit means
"reject".

Each position looks up a reach entry indexed by the two byte window ending
at it. The index is either the low `domain` bits of the window, or, for the
packed variant, a pair of byte equivalence classes.
*/

use alloc::{vec, vec::Vec};

use crate::{
    confirm::BUCKETS,
    literal::Literal,
    scan::{Haystack, Kernel},
    scheme::{Scheme, VectorWidth},
    table::Candidate,
    util::{
        alphabet::{ByteClassSet, ByteClasses},
        flip_case, wire,
    },
};

/// The smallest and largest number of domain bits.
pub(crate) const MIN_DOMAIN: u8 = 9;
pub(crate) const MAX_DOMAIN: u8 = 15;

/// How a two byte window is turned into a reach table index.
#[derive(Clone, Debug)]
pub(crate) enum Index {
    /// The low bits of `(prev << 8) | cur`, selected by the given mask.
    Domain(usize),
    /// `class(prev) * len + class(cur)`.
    Classes(ByteClasses),
}

impl Index {
    pub(crate) fn domain(bits: u8) -> Index {
        Index::Domain((1 << bits) - 1)
    }

    /// The number of reach entries.
    pub(crate) fn len(&self) -> usize {
        match *self {
            Index::Domain(mask) => mask + 1,
            Index::Classes(ref classes) => {
                classes.alphabet_len() * classes.alphabet_len()
            }
        }
    }

    #[inline(always)]
    fn get(&self, prev: u8, cur: u8) -> usize {
        match *self {
            Index::Domain(mask) => {
                ((usize::from(prev) << 8) | usize::from(cur)) & mask
            }
            Index::Classes(ref classes) => {
                usize::from(classes.get(prev)) * classes.alphabet_len()
                    + usize::from(classes.get(cur))
            }
        }
    }
}

/// Returns the default number of domain bits for a literal set.
fn default_domain(count: usize) -> u8 {
    match count {
        0..=32 => 9,
        33..=128 => 10,
        129..=512 => 11,
        513..=2048 => 12,
        _ => 13,
    }
}

/// Builds the hash scheme candidates for the given literals, which must be
/// in rank order. There is always an unpacked candidate. A packed one is
/// added when allowed and smaller.
pub(crate) fn candidates(
    lits: &[Literal],
    domain: Option<u8>,
    packed: bool,
) -> Vec<Candidate> {
    let domain = domain.unwrap_or_else(|| default_domain(lits.len()));
    let buckets = assign_buckets(lits);
    debug!(
        "hash scheme: {} literals in {} buckets, domain of {} bits",
        lits.len(),
        buckets.len(),
        domain,
    );

    let mut out = vec![];
    if packed {
        let classes = byte_classes(lits);
        let k = classes.alphabet_len();
        if k * k < 1 << domain {
            debug!("hash scheme: packing domain into {} byte classes", k);
            let index = Index::Classes(classes);
            out.push(Candidate {
                scheme: Scheme::Hash { domain: k as u8, packed: true },
                vectors: VectorWidth::None,
                region: reach_table(lits, &buckets, &index),
                classes: Some(classes),
                buckets: buckets.clone(),
            });
        }
    }
    let index = Index::domain(domain);
    out.push(Candidate {
        scheme: Scheme::Hash { domain, packed: false },
        vectors: VectorWidth::None,
        region: reach_table(lits, &buckets, &index),
        classes: None,
        buckets,
    });
    out
}

/// Groups literals by effective length, then repeatedly halves the most
/// expensive group until all buckets are used or no group can be split.
///
/// The cost of a group grows with its size and shrinks with its effective
/// length, since a longer filter rejects more positions.
fn assign_buckets(lits: &[Literal]) -> Vec<Vec<usize>> {
    let mut by_depth: Vec<Vec<usize>> = vec![vec![]; 9];
    for (i, lit) in lits.iter().enumerate() {
        by_depth[core::cmp::min(lit.len(), 8)].push(i);
    }
    let mut buckets: Vec<(usize, Vec<usize>)> = by_depth
        .into_iter()
        .enumerate()
        .filter(|&(_, ref members)| !members.is_empty())
        .collect();
    while buckets.len() < BUCKETS {
        let mut best: Option<(usize, u64)> = None;
        for (i, &(depth, ref members)) in buckets.iter().enumerate() {
            if members.len() < 2 {
                continue;
            }
            let cost = (members.len() as u64) << (8 - depth);
            if best.map_or(true, |(_, c)| cost > c) {
                best = Some((i, cost));
            }
        }
        let i = match best {
            None => break,
            Some((i, _)) => i,
        };
        let depth = buckets[i].0;
        let members = &mut buckets[i].1;
        let upper = members.split_off(members.len() / 2);
        buckets.push((depth, upper));
    }
    log! {
        for (b, &(depth, ref members)) in buckets.iter().enumerate() {
            trace!(
                "hash bucket {}: {} literals at depth {}",
                b,
                members.len(),
                depth
            );
        }
    }
    buckets.into_iter().map(|(_, members)| members).collect()
}

/// Assigns a class to every byte appearing in a literal (in either case,
/// for case insensitive literals).
fn byte_classes(lits: &[Literal]) -> ByteClasses {
    let mut set = ByteClassSet::empty();
    for lit in lits.iter() {
        for &b in lit.pattern().iter() {
            set.set_range(b, b);
            if lit.is_nocase() {
                let other = flip_case(b);
                set.set_range(other, other);
            }
        }
    }
    set.byte_classes()
}

/// Returns the bytes a literal byte may match: just itself, or both cases
/// for case insensitive letters.
fn variants(b: u8, nocase: bool) -> ([u8; 2], usize) {
    let other = flip_case(b);
    if nocase && other != b {
        ([b, other], 2)
    } else {
        ([b, b], 1)
    }
}

/// Builds the reach table. Every entry starts out rejecting everything, and
/// each literal clears the bits for the windows it can produce at each
/// distance from its end.
fn reach_table(
    lits: &[Literal],
    buckets: &[Vec<usize>],
    index: &Index,
) -> Vec<u8> {
    let mut reach = vec![!0u64; index.len()];
    for (b, members) in buckets.iter().enumerate() {
        let mut min_depth = 8;
        for &i in members.iter() {
            let lit = &lits[i];
            let (pat, nocase) = (lit.pattern(), lit.is_nocase());
            let depth = core::cmp::min(pat.len(), 8);
            min_depth = core::cmp::min(min_depth, depth);
            for t in 0..depth {
                let accept = !(1u64 << (8 * (7 - t) + b));
                let (curs, ncur) = variants(pat[pat.len() - 1 - t], nocase);
                if t + 1 < pat.len() {
                    let (prevs, nprev) =
                        variants(pat[pat.len() - 2 - t], nocase);
                    for &prev in prevs[..nprev].iter() {
                        for &cur in curs[..ncur].iter() {
                            reach[index.get(prev, cur)] &= accept;
                        }
                    }
                } else {
                    // The byte before the literal may be anything.
                    for prev in 0..=255u8 {
                        for &cur in curs[..ncur].iter() {
                            reach[index.get(prev, cur)] &= accept;
                        }
                    }
                }
            }
        }
        // Lanes past the shortest literal in the bucket accept everything.
        for t in min_depth..8 {
            let accept = !(1u64 << (8 * (7 - t) + b));
            for entry in reach.iter_mut() {
                *entry &= accept;
            }
        }
    }
    let mut region = vec![0; reach.len() * 8];
    for (i, &entry) in reach.iter().enumerate() {
        wire::write_u64(entry, &mut region[i * 8..]);
    }
    region
}

/// The filter of the hash scheme, borrowing its reach table from a table's
/// scheme region.
#[derive(Debug)]
pub(crate) struct HashKernel<'t> {
    reach: &'t [u8],
    index: Index,
}

impl<'t> HashKernel<'t> {
    pub(crate) fn new(reach: &'t [u8], index: Index) -> HashKernel<'t> {
        HashKernel { reach, index }
    }

    #[inline(always)]
    fn reach(&self, prev: u8, cur: u8) -> u64 {
        wire::read_u64(&self.reach[self.index.get(prev, cur) * 8..])
    }
}

impl<'t> Kernel for HashKernel<'t> {
    #[inline]
    fn candidates_at(&self, hay: &Haystack<'_>, at: usize) -> u8 {
        let mut state = 0u64;
        for v in at.saturating_sub(7)..=at {
            let prev = if v > 0 { hay.byte(v - 1) } else { 0 };
            state = (state << 8) | self.reach(prev, hay.byte(v));
        }
        !(state >> 56) as u8
    }

    #[inline]
    fn for_each_candidate<F: FnMut(usize, u8) -> bool>(
        &self,
        hay: &Haystack<'_>,
        from: usize,
        to: usize,
        mut f: F,
    ) -> bool {
        // Warm up on the 7 bytes before `from`, which are context only.
        let begin = from.saturating_sub(7);
        let mut prev = if begin > 0 { hay.byte(begin - 1) } else { 0 };
        let mut state = 0u64;
        for v in begin..from {
            let cur = hay.byte(v);
            state = (state << 8) | self.reach(prev, cur);
            prev = cur;
        }
        let h = hay.history_len();
        for (k, &cur) in hay.bytes()[from - h..to - h].iter().enumerate() {
            state = (state << 8) | self.reach(prev, cur);
            prev = cur;
            let cand = !(state >> 56) as u8;
            if cand != 0 && !f(from + k, cand) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(pats: &[&str]) -> Vec<Literal> {
        pats.iter()
            .enumerate()
            .map(|(i, p)| Literal::new(p, i as u32))
            .collect()
    }

    fn kernel(c: &Candidate) -> HashKernel<'_> {
        let index = match c.classes {
            None => match c.scheme {
                Scheme::Hash { domain, .. } => Index::domain(domain),
                _ => unreachable!(),
            },
            Some(classes) => Index::Classes(classes),
        };
        HashKernel::new(&c.region, index)
    }

    #[test]
    fn buckets_split_by_length_then_cost() {
        let lits = lits(&["abcdefghij", "abcdefgh", "abc", "xyz", "uvw", "a"]);
        let buckets = assign_buckets(&lits);
        assert_eq!(buckets.len(), 6);
        let mut all: Vec<usize> = buckets.concat();
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
        // Literals of the same effective length are only separated by
        // splitting.
        assert!(buckets.iter().any(|b| b == &vec![0]));
        assert!(buckets.iter().any(|b| b == &vec![5]));
    }

    #[test]
    fn buckets_never_exceed_eight() {
        let pats: Vec<String> = (0..100).map(|i| format!("lit{}", i)).collect();
        let pats: Vec<&str> = pats.iter().map(|s| s.as_str()).collect();
        let buckets = assign_buckets(&lits(&pats));
        assert_eq!(buckets.len(), BUCKETS);
        assert_eq!(buckets.iter().map(|b| b.len()).sum::<usize>(), 100);
    }

    #[test]
    fn filter_accepts_every_occurrence() {
        let lits = lits(&["foo", "barbazquux", "z"]);
        let hay = Haystack::new(b"", b"xxfoo barbazquux z");
        for c in candidates(&lits, None, true).iter() {
            let k = kernel(c);
            let mut found = vec![];
            k.for_each_candidate(&hay, 0, hay.len(), |at, _| {
                found.push(at);
                true
            });
            for &end in &[4, 15, 17] {
                assert!(found.contains(&end), "{:?}: {}", c.scheme, end);
                assert_ne!(0, k.candidates_at(&hay, end));
            }
        }
    }

    #[test]
    fn filter_rejects_absent_bytes() {
        let lits = lits(&["mnopqr"]);
        let hay = Haystack::new(b"", &[0u8; 64]);
        for c in candidates(&lits, Some(MAX_DOMAIN), true).iter() {
            let k = kernel(c);
            assert!(k.for_each_candidate(&hay, 0, 64, |_, _| false));
        }
    }

    #[test]
    fn packed_when_alphabet_is_sparse() {
        let cands = candidates(&lits(&["abab", "baba"]), None, true);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].scheme, Scheme::Hash { domain: 4, packed: true });
        assert!(cands[0].region.len() < cands[1].region.len());

        let wide: Vec<u8> = (0..=255).collect();
        let lits = vec![Literal::new(wide, 0)];
        assert_eq!(candidates(&lits, None, true).len(), 1);
    }
}
