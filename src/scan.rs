/*!
The scan driver shared by both matching schemes.

A scan walks a virtual buffer made of an optional history followed by the
haystack. Only matches ending in the haystack (at or after the configured
start) are reported, but every byte of history is available as context, so
literals straddling the boundary are found.

The driver splits the haystack into fixed size segments. At the start of
each segment it looks for floods of a single byte, which would otherwise
produce a candidate at every position for literals made of that byte. The
rest of a segment is handed to the scheme's kernel, or, when every literal
ends in one of at most three bytes, to `memchr` with the kernel consulted
only at the positions it finds.
*/

use alloc::vec::Vec;

use crate::{
    confirm,
    fdr::HashKernel,
    literal::Groups,
    table::View,
    teddy::MaskedKernel,
};

/// The number of positions scanned between flood checks.
const SEGMENT: usize = 256;

/// The shortest run of a single byte treated as a flood.
const FLOOD_MIN_RUN: usize = 32;

/// The parameters of a single block scan.
///
/// Only the haystack is required. Everything else has a default:
///
/// * No history precedes the haystack.
/// * Scanning starts at the first byte of the haystack.
/// * The haystack starts right after its history in stream coordinates,
/// i.e., at offset `history.len()`.
/// * All groups are active.
///
/// When a history is given, it is treated as the bytes immediately before
/// the haystack. Matches may start in the history, but are only reported
/// when they end in the haystack. Similarly, bytes before `start` are used
/// as context, but no match ending before `start` is reported.
///
/// # Example
///
/// ```
/// use litmatch::{Input, Literal, Table};
///
/// let table = Table::new(&[Literal::new("foobar", 0)])?;
/// let input = Input::new("bar baz").history("xfoo").offset(100);
/// let matches = table.find_all_in(&input)?;
/// assert_eq!(1, matches.len());
/// assert_eq!((97, 102), (matches[0].start(), matches[0].end()));
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Input<'h> {
    haystack: &'h [u8],
    history: &'h [u8],
    start: usize,
    offset: Option<u64>,
    groups: Groups,
}

impl<'h> Input<'h> {
    /// Create a new scan input for the given haystack.
    #[inline]
    pub fn new<H: ?Sized + AsRef<[u8]>>(haystack: &'h H) -> Input<'h> {
        Input {
            haystack: haystack.as_ref(),
            history: &[],
            start: 0,
            offset: None,
            groups: Groups::ALL,
        }
    }

    /// Set the bytes that immediately precede the haystack.
    #[inline]
    pub fn history<H: ?Sized + AsRef<[u8]>>(
        mut self,
        history: &'h H,
    ) -> Input<'h> {
        self.history = history.as_ref();
        self
    }

    /// Set the position in the haystack at which matches may begin to be
    /// reported.
    #[inline]
    pub fn start(mut self, start: usize) -> Input<'h> {
        self.set_start(start);
        self
    }

    /// Set the stream offset of the first byte of the haystack. This must
    /// be at least the length of the history.
    #[inline]
    pub fn offset(mut self, offset: u64) -> Input<'h> {
        self.offset = Some(offset);
        self
    }

    /// Set the groups whose literals are reported.
    #[inline]
    pub fn groups(mut self, groups: Groups) -> Input<'h> {
        self.set_groups(groups);
        self
    }

    /// Set the start position in place.
    #[inline]
    pub fn set_start(&mut self, start: usize) {
        self.start = start;
    }

    /// Set the active groups in place.
    #[inline]
    pub fn set_groups(&mut self, groups: Groups) {
        self.groups = groups;
    }

    /// Returns the haystack.
    #[inline]
    pub fn haystack(&self) -> &'h [u8] {
        self.haystack
    }

    /// Returns the history preceding the haystack, which may be empty.
    #[inline]
    pub fn get_history(&self) -> &'h [u8] {
        self.history
    }

    /// Returns the position at which matches may begin to be reported.
    #[inline]
    pub fn get_start(&self) -> usize {
        self.start
    }

    /// Returns the stream offset of the first byte of the haystack.
    #[inline]
    pub fn get_offset(&self) -> u64 {
        self.offset.unwrap_or(self.history.len() as u64)
    }

    /// Returns the active groups.
    #[inline]
    pub fn get_groups(&self) -> Groups {
        self.groups
    }
}

impl<'h> core::fmt::Debug for Input<'h> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use crate::util::DebugBytes;

        f.debug_struct("Input")
            .field("haystack", &DebugBytes(self.haystack))
            .field("history", &DebugBytes(self.history))
            .field("start", &self.start)
            .field("offset", &self.get_offset())
            .field("groups", &self.groups)
            .finish()
    }
}

/// A single reported match.
///
/// Offsets are in stream coordinates: for a block scan without history or
/// offset, they are plain haystack positions. Both ends are inclusive, so a
/// one byte literal has `start() == end()`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Match {
    start: u64,
    end: u64,
    id: u32,
}

impl Match {
    /// Create a new match. This panics if `start > end`.
    #[inline]
    pub fn new(start: u64, end: u64, id: u32) -> Match {
        assert!(start <= end, "invalid match {}..={}", start, end);
        Match { start, end, id }
    }

    /// The offset of the first byte of the match.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// The offset of the last byte of the match.
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// The identifier of the literal that matched.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// What a match callback asks the scan to do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Keep reporting matches.
    Continue,
    /// Stop the scan immediately. No further match is reported.
    Terminate,
}

/// How a scan ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanStatus {
    /// Every match was reported.
    Success,
    /// A callback returned [`Action::Terminate`].
    Terminated,
}

/// The bytes a scan reads: a history followed by a haystack, addressed by
/// one contiguous "virtual" position.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Haystack<'a> {
    history: &'a [u8],
    bytes: &'a [u8],
}

impl<'a> Haystack<'a> {
    pub(crate) fn new(history: &'a [u8], bytes: &'a [u8]) -> Haystack<'a> {
        Haystack { history, bytes }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.history.len() + self.bytes.len()
    }

    /// The number of history bytes, which is also the virtual position of
    /// the first haystack byte.
    #[inline(always)]
    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }

    #[inline(always)]
    pub(crate) fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline(always)]
    pub(crate) fn byte(&self, at: usize) -> u8 {
        if at < self.history.len() {
            self.history[at]
        } else {
            self.bytes[at - self.history.len()]
        }
    }

    /// Returns the 8 bytes ending at `at` as a little endian integer. Bytes
    /// before the start of the history read as zero.
    #[inline]
    pub(crate) fn window(&self, at: usize) -> u64 {
        let h = self.history.len();
        if at >= h + 7 {
            let i = at - h;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&self.bytes[i - 7..=i]);
            return u64::from_le_bytes(buf);
        }
        let mut window = 0u64;
        for j in 0..core::cmp::min(8, at + 1) {
            window |= u64::from(self.byte(at - j)) << (8 * (7 - j));
        }
        window
    }

    /// Returns true if `pat` occurs at virtual position `start`.
    pub(crate) fn eq_at(&self, start: usize, pat: &[u8], nocase: bool) -> bool {
        let h = self.history.len();
        if start >= h {
            let got = &self.bytes[start - h..start - h + pat.len()];
            return if nocase {
                got.eq_ignore_ascii_case(pat)
            } else {
                got == pat
            };
        }
        pat.iter().enumerate().all(|(k, &p)| {
            let b = self.byte(start + k);
            b == p || (nocase && b.eq_ignore_ascii_case(&p))
        })
    }

    /// Returns the number of consecutive haystack bytes equal to the one at
    /// `at`, starting at `at`.
    fn run_len(&self, at: usize) -> usize {
        let rest = &self.bytes[at - self.history.len()..];
        let first = rest[0];
        rest.iter().position(|&b| b != first).unwrap_or(rest.len())
    }
}

/// A coarse filter that finds candidate end positions along with the set of
/// buckets that may have a literal ending there.
pub(crate) trait Kernel {
    /// Returns the buckets that may have a literal ending at `at`.
    fn candidates_at(&self, hay: &Haystack<'_>, at: usize) -> u8;

    /// Calls `f` with every position in `from..to` with a non-empty set of
    /// candidate buckets, in ascending order. If `f` returns false, this
    /// stops and returns false.
    fn for_each_candidate<F: FnMut(usize, u8) -> bool>(
        &self,
        hay: &Haystack<'_>,
        from: usize,
        to: usize,
        f: F,
    ) -> bool;
}

/// The kernel of a table, chosen by its scheme.
#[derive(Debug)]
pub(crate) enum Engine<'t> {
    Hash(HashKernel<'t>),
    Masked(MaskedKernel),
}

/// The at most three bytes that every literal can end with.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Accel {
    One(u8),
    Two(u8, u8),
    Three(u8, u8, u8),
}

impl Accel {
    pub(crate) fn new(bytes: &[u8]) -> Option<Accel> {
        match *bytes {
            [b1] => Some(Accel::One(b1)),
            [b1, b2] => Some(Accel::Two(b1, b2)),
            [b1, b2, b3] => Some(Accel::Three(b1, b2, b3)),
            _ => None,
        }
    }

    #[inline(always)]
    fn find(&self, haystack: &[u8]) -> Option<usize> {
        match *self {
            Accel::One(b1) => memchr::memchr(b1, haystack),
            Accel::Two(b1, b2) => memchr::memchr2(b1, b2, haystack),
            Accel::Three(b1, b2, b3) => memchr::memchr3(b1, b2, b3, haystack),
        }
    }
}

/// Scans every position from `from` (a virtual position) to the end of the
/// haystack, reporting confirmed matches to `f`.
///
/// `last_id` carries the identifier of the previously reported match across
/// calls, for suppressing repeated reports of "no runs" literals. It is
/// updated to the last identifier reported by this scan.
pub(crate) fn run<F: FnMut(&Match) -> Action>(
    view: &View<'_>,
    hay: &Haystack<'_>,
    from: usize,
    base: u64,
    groups: Groups,
    last_id: &mut Option<u32>,
    f: F,
) -> ScanStatus {
    let mut em = Emitter {
        view,
        groups,
        base,
        last_id: *last_id,
        pending: Vec::new(),
        callback: f,
    };
    let done = match view.engine() {
        Engine::Hash(ref kernel) => drive(kernel, view, hay, from, &mut em),
        Engine::Masked(ref kernel) => drive(kernel, view, hay, from, &mut em),
    };
    *last_id = em.last_id;
    if done {
        ScanStatus::Success
    } else {
        ScanStatus::Terminated
    }
}

fn drive<K: Kernel, F: FnMut(&Match) -> Action>(
    kernel: &K,
    view: &View<'_>,
    hay: &Haystack<'_>,
    from: usize,
    em: &mut Emitter<'_, '_, F>,
) -> bool {
    let end = hay.len();
    let mut at = from;
    while at < end {
        if view.header.floodguard {
            let run = hay.run_len(at);
            if run >= FLOOD_MIN_RUN {
                let run_end = at + run;
                // Literals ending this far into the run see nothing but the
                // flooded byte.
                let flooded =
                    core::cmp::min(at + view.header.max_coverage - 1, run_end);
                if !scan_range(kernel, view, hay, at, flooded, em) {
                    return false;
                }
                let byte = hay.byte(at);
                if !em.flood(hay, flooded, run_end, byte) {
                    return false;
                }
                at = run_end;
                continue;
            }
        }
        let segment_end = core::cmp::min(at + SEGMENT, end);
        if !scan_range(kernel, view, hay, at, segment_end, em) {
            return false;
        }
        at = segment_end;
    }
    true
}

fn scan_range<K: Kernel, F: FnMut(&Match) -> Action>(
    kernel: &K,
    view: &View<'_>,
    hay: &Haystack<'_>,
    from: usize,
    to: usize,
    em: &mut Emitter<'_, '_, F>,
) -> bool {
    if from >= to {
        return true;
    }
    let accel = match view.accel {
        None => {
            return kernel
                .for_each_candidate(hay, from, to, |at, cand| {
                    em.position(hay, at, cand)
                });
        }
        Some(accel) => accel,
    };
    let h = hay.history_len();
    let bytes = &hay.bytes()[from - h..to - h];
    let mut i = 0;
    while let Some(found) = accel.find(&bytes[i..]) {
        let at = from + i + found;
        let cand = kernel.candidates_at(hay, at);
        if cand != 0 && !em.position(hay, at, cand) {
            return false;
        }
        i += found + 1;
    }
    true
}

/// Confirms candidates and reports matches, applying group filtering and
/// "no runs" suppression.
struct Emitter<'v, 't, F> {
    view: &'v View<'t>,
    groups: Groups,
    base: u64,
    last_id: Option<u32>,
    /// Confirmed literal indices at the current position.
    pending: Vec<usize>,
    callback: F,
}

impl<'v, 't, F: FnMut(&Match) -> Action> Emitter<'v, 't, F> {
    /// Confirms every literal in the candidate buckets at `at` and reports
    /// those that match. Returns false if the scan was terminated.
    #[inline]
    fn position(&mut self, hay: &Haystack<'_>, at: usize, cand: u8) -> bool {
        let window = hay.window(at);
        let view = self.view;
        let pending = &mut self.pending;
        pending.clear();
        let mut buckets = cand;
        while buckets != 0 {
            let b = buckets.trailing_zeros() as usize;
            buckets &= buckets - 1;
            confirm::for_each_in_slot(view.confirm, b, window, |i| {
                if view.record(i).confirm(hay, at, window, view.patterns) {
                    pending.push(i);
                }
                true
            });
        }
        if pending.is_empty() {
            return true;
        }
        // Buckets partition the literals, but a position may confirm
        // literals from several buckets.
        pending.sort_unstable();
        self.flush(at)
    }

    /// Confirms only the flood literals of `byte` at every position in
    /// `from..to`.
    fn flood(
        &mut self,
        hay: &Haystack<'_>,
        from: usize,
        to: usize,
        byte: u8,
    ) -> bool {
        let view = self.view;
        let list = view.flood_list(byte);
        if list.is_empty() {
            return true;
        }
        for at in from..to {
            let window = hay.window(at);
            self.pending.clear();
            for i in list.chunks_exact(4) {
                let i = crate::util::wire::read_u32(i) as usize;
                if view.record(i).confirm(hay, at, window, view.patterns) {
                    self.pending.push(i);
                }
            }
            if !self.flush(at) {
                return false;
            }
        }
        true
    }

    /// Reports every pending literal ending at `at`, in rank order.
    fn flush(&mut self, at: usize) -> bool {
        for k in 0..self.pending.len() {
            let rec = self.view.record(self.pending[k]);
            if !self.groups.intersects(Groups::new(rec.groups)) {
                continue;
            }
            if rec.is_noruns() && self.last_id == Some(rec.id) {
                continue;
            }
            self.last_id = Some(rec.id);
            let end = self.base + at as u64;
            let m = Match { start: end + 1 - rec.len as u64, end, id: rec.id };
            if (self.callback)(&m) == Action::Terminate {
                return false;
            }
        }
        true
    }
}
