/*!
Building, loading and scanning with compiled literal tables.

A [`Table`] is a single contiguous byte buffer holding everything a scan
needs: literal records, pattern bytes, the confirmation hash tables, the
tables of the selected matching scheme and the flood lists. Every internal
reference is an offset into that buffer, so a table can be copied anywhere,
persisted with [`Table::as_bytes`] and used again, without any decoding,
through [`Table::from_bytes`].

Tables are built with a [`Builder`], which validates the literals, builds
every scheme the [`Config`] and [`Target`] allow, and keeps the one that
best fits the configured [`Preference`].

# Example

This example forces the hash scheme and shows that the resulting table
reports the same matches after a round trip through its raw bytes.

```
use litmatch::{
    table::{Builder, Config, Table},
    Literal, SchemeKind,
};

let table = Builder::new()
    .configure(Config::new().scheme(Some(SchemeKind::Hash)))
    .build(&[Literal::new("foo", 1), Literal::new("quux", 2)])?;
assert_eq!(SchemeKind::Hash, table.scheme().kind());

let bytes = table.as_bytes().to_vec();
let loaded = Table::from_bytes(&bytes)?;
let ends: Vec<u64> =
    loaded.find_all("foo quux")?.iter().map(|m| m.end()).collect();
assert_eq!(vec![2, 7], ends);

# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

use alloc::{vec, vec::Vec};

use crate::{
    confirm::{self, Record, BUCKETS, RECORD_LEN},
    error::{BuildError, ScanError},
    fdr::{self, HashKernel, Index, MAX_DOMAIN, MIN_DOMAIN},
    flood,
    literal::{Literal, RESERVED_ID},
    scan::{self, Accel, Action, Engine, Haystack, Input, Match, ScanStatus},
    scheme::{Preference, Scheme, SchemeKind, Target, VectorWidth},
    stream::STATE_HEADER_LEN,
    teddy::{self, MaskedKernel, Masks, MAX_MASKS},
    util::{
        alphabet::{ByteClasses, ByteSet},
        flip_case, fnv,
        wire::{self, DeserializeError, SerializeError},
    },
};

/// The label at the start of every table.
const LABEL: &str = "litmatch-table";

/// The version of the table format.
const VERSION: u32 = 1;

/// The size of the label, endianness check and version.
const PREAMBLE_LEN: usize = 32;

/// The number of regions in the region directory.
const REGIONS: usize = 6;

/// The end of the header and region directory. Every region starts after
/// this, and the checksum covers every byte from here on.
const HEADER_END: usize = PREAMBLE_LEN + 56 + REGIONS * 8;

const LITERALS: usize = 0;
const PATTERNS: usize = 1;
const CONFIRM: usize = 2;
const SCHEME: usize = 3;
const CLASSES: usize = 4;
const FLOOD: usize = 5;

const KIND_HASH: u32 = 1;
const KIND_MASKED: u32 = 2;

const FLAG_PACKED: u32 = 1 << 0;
const FLAG_FLOODGUARD: u32 = 1 << 1;

/// The default maximum number of literals in a bucket of the masked scheme.
const DEFAULT_BUCKET_WIDTH: usize = 8;

/// The configuration used for building a table.
///
/// A default configuration builds whichever scheme produces the smallest
/// table, guards against floods and accelerates scans when every literal
/// ends in one of a few bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    // Every knob is an option so that "not set" is distinguishable from the
    // default, which lets configurations be combined with 'overwrite'.
    bucket_width: Option<usize>,
    masked: Option<bool>,
    packed: Option<bool>,
    wide_vectors: Option<bool>,
    preference: Option<Preference>,
    size_limit: Option<Option<usize>>,
    domain_bits: Option<Option<u8>>,
    floodguard: Option<bool>,
    accelerate: Option<bool>,
    scheme: Option<Option<SchemeKind>>,
}

impl Config {
    /// Return a new default table configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// Set the largest number of literals that may share a bucket in the
    /// masked scheme. Literal sets larger than 8 times this never use the
    /// masked scheme.
    ///
    /// This panics if `width` is zero.
    pub fn bucket_width(mut self, width: usize) -> Config {
        assert!(width > 0, "bucket width must be at least 1");
        self.bucket_width = Some(width);
        self
    }

    /// Whether the masked scheme may be selected. Enabled by default.
    pub fn masked(mut self, yes: bool) -> Config {
        self.masked = Some(yes);
        self
    }

    /// Whether packed scheme variants may be selected. Enabled by default.
    ///
    /// Packed variants trade a small amount of scan speed for a smaller
    /// table, and only apply to literal sets with few distinct bytes.
    pub fn packed(mut self, yes: bool) -> Config {
        self.packed = Some(yes);
        self
    }

    /// Whether the masked scheme may use 256-bit vectors when the target has
    /// them. Enabled by default.
    pub fn wide_vectors(mut self, yes: bool) -> Config {
        self.wide_vectors = Some(yes);
        self
    }

    /// Set whether smaller or faster tables are preferred when more than
    /// one scheme applies. Defaults to [`Preference::Size`].
    pub fn preference(mut self, preference: Preference) -> Config {
        self.preference = Some(preference);
        self
    }

    /// Set a limit, in bytes, on the size of a built table.
    ///
    /// Schemes whose table would exceed the limit are not considered. If
    /// every scheme exceeds it, the build fails. Regardless of this limit,
    /// no table may exceed `u32::MAX` bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use litmatch::{table::{Builder, Config}, Literal};
    ///
    /// let lits = [Literal::new("foo", 0), Literal::new("bar", 1)];
    /// assert!(Builder::new()
    ///     .configure(Config::new().size_limit(Some(100)))
    ///     .build(&lits)
    ///     .is_err());
    /// assert!(Builder::new()
    ///     .configure(Config::new().size_limit(Some(100_000)))
    ///     .build(&lits)
    ///     .is_ok());
    /// ```
    pub fn size_limit(mut self, bytes: Option<usize>) -> Config {
        self.size_limit = Some(bytes);
        self
    }

    /// Set the number of bits of each two byte window that index the reach
    /// table of the hash scheme. When not set, it is picked from the number
    /// of literals.
    ///
    /// More bits mean fewer false candidates but a larger table, with
    /// `2^bits` entries of 8 bytes each.
    ///
    /// This panics if `bits` is set and not in the range `9..=15`.
    pub fn domain_bits(mut self, bits: Option<u8>) -> Config {
        if let Some(bits) = bits {
            assert!(
                MIN_DOMAIN <= bits && bits <= MAX_DOMAIN,
                "domain bits must be in the range {}..={}, got {}",
                MIN_DOMAIN,
                MAX_DOMAIN,
                bits,
            );
        }
        self.domain_bits = Some(bits);
        self
    }

    /// Whether runs of a single byte are handled by checking only the
    /// literals made of that byte. Enabled by default.
    ///
    /// This never changes which matches are reported.
    pub fn floodguard(mut self, yes: bool) -> Config {
        self.floodguard = Some(yes);
        self
    }

    /// Whether scans skip ahead with `memchr` when every literal ends with
    /// one of at most three bytes. Enabled by default.
    ///
    /// This never changes which matches are reported.
    pub fn accelerate(mut self, yes: bool) -> Config {
        self.accelerate = Some(yes);
        self
    }

    /// Restrict the build to a single family of schemes. If that family
    /// cannot represent the literals, the build fails.
    pub fn scheme(mut self, kind: Option<SchemeKind>) -> Config {
        self.scheme = Some(kind);
        self
    }

    /// Returns the masked scheme's bucket width.
    pub fn get_bucket_width(&self) -> usize {
        self.bucket_width.unwrap_or(DEFAULT_BUCKET_WIDTH)
    }

    /// Returns whether the masked scheme may be selected.
    pub fn get_masked(&self) -> bool {
        self.masked.unwrap_or(true)
    }

    /// Returns whether packed variants may be selected.
    pub fn get_packed(&self) -> bool {
        self.packed.unwrap_or(true)
    }

    /// Returns whether 256-bit vectors may be used.
    pub fn get_wide_vectors(&self) -> bool {
        self.wide_vectors.unwrap_or(true)
    }

    /// Returns the size/speed preference.
    pub fn get_preference(&self) -> Preference {
        self.preference.unwrap_or_default()
    }

    /// Returns the table size limit, if any.
    pub fn get_size_limit(&self) -> Option<usize> {
        self.size_limit.unwrap_or(None)
    }

    /// Returns the configured domain bits, if any.
    pub fn get_domain_bits(&self) -> Option<u8> {
        self.domain_bits.unwrap_or(None)
    }

    /// Returns whether flood guarding is enabled.
    pub fn get_floodguard(&self) -> bool {
        self.floodguard.unwrap_or(true)
    }

    /// Returns whether acceleration is enabled.
    pub fn get_accelerate(&self) -> bool {
        self.accelerate.unwrap_or(true)
    }

    /// Returns the forced scheme family, if any.
    pub fn get_scheme(&self) -> Option<SchemeKind> {
        self.scheme.unwrap_or(None)
    }

    /// Overwrite the default configuration such that the options in `o` are
    /// always used. If an option in `o` is not set, then the corresponding
    /// option in `self` is used. If it's not set in `self` either, then it
    /// remains not set.
    pub(crate) fn overwrite(self, o: Config) -> Config {
        Config {
            bucket_width: o.bucket_width.or(self.bucket_width),
            masked: o.masked.or(self.masked),
            packed: o.packed.or(self.packed),
            wide_vectors: o.wide_vectors.or(self.wide_vectors),
            preference: o.preference.or(self.preference),
            size_limit: o.size_limit.or(self.size_limit),
            domain_bits: o.domain_bits.or(self.domain_bits),
            floodguard: o.floodguard.or(self.floodguard),
            accelerate: o.accelerate.or(self.accelerate),
            scheme: o.scheme.or(self.scheme),
        }
    }
}

/// A builder for compiling literals into a [`Table`].
///
/// # Example
///
/// Tables built for a target without vector support always use the hash
/// scheme:
///
/// ```
/// use litmatch::{table::Builder, Literal, SchemeKind, Target};
///
/// let table = Builder::new()
///     .target(Target::scalar())
///     .build(&[Literal::new("foo", 0)])?;
/// assert_eq!(SchemeKind::Hash, table.scheme().kind());
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct Builder {
    config: Config,
    target: Target,
}

impl Builder {
    /// Create a new builder with the default configuration, targeting the
    /// running CPU.
    pub fn new() -> Builder {
        Builder { config: Config::default(), target: Target::detect() }
    }

    /// Apply the given configuration options to this builder.
    pub fn configure(&mut self, config: Config) -> &mut Builder {
        self.config = self.config.overwrite(config);
        self
    }

    /// Set the target the table is built for.
    pub fn target(&mut self, target: Target) -> &mut Builder {
        self.target = target;
        self
    }

    /// Build a table from the given literals.
    ///
    /// This fails if there are no literals, if any literal is invalid, if
    /// no scheme applies or if every applicable table is too big.
    pub fn build(&self, literals: &[Literal]) -> Result<Table, BuildError> {
        if literals.is_empty() {
            return Err(BuildError::empty());
        }
        for (i, lit) in literals.iter().enumerate() {
            lit.validate().map_err(|e| e.at(i))?;
        }
        // Report order: longest first, then input order. A literal's
        // position in this order is its rank and its record index.
        let mut order: Vec<usize> = (0..literals.len()).collect();
        order.sort_by_key(|&i| (core::cmp::Reverse(literals[i].len()), i));
        let lits: Vec<Literal> =
            order.iter().map(|&i| literals[i].clone()).collect();

        let config = &self.config;
        let mut vectors = self.target.vectors();
        if !config.get_wide_vectors() {
            vectors = core::cmp::min(vectors, VectorWidth::V128);
        }
        let mut candidates = vec![];
        if config.get_scheme() != Some(SchemeKind::Masked) {
            candidates.extend(fdr::candidates(
                &lits,
                config.get_domain_bits(),
                config.get_packed(),
            ));
        }
        if config.get_scheme() != Some(SchemeKind::Hash) && config.get_masked()
        {
            candidates.extend(teddy::candidates(
                &lits,
                config.get_bucket_width(),
                vectors,
                config.get_packed(),
            ));
        }
        if candidates.is_empty() {
            return Err(BuildError::no_scheme(
                "the masked scheme cannot represent these literals \
                 under this configuration and target",
            ));
        }

        let mut records = Vec::with_capacity(lits.len());
        let mut patterns = vec![];
        for lit in lits.iter() {
            records.push(Record::new(lit, patterns.len()));
            patterns.extend_from_slice(lit.pattern());
        }
        let flood =
            if config.get_floodguard() { flood::build(&lits) } else { vec![] };
        let accel =
            if config.get_accelerate() { final_bytes(&lits) } else { None };

        let limit = core::cmp::min(
            config.get_size_limit().unwrap_or(core::usize::MAX),
            u32::MAX as usize,
        );
        let mut best: Option<(Candidate, Vec<u8>, usize)> = None;
        let mut smallest = core::usize::MAX;
        for cand in candidates.into_iter() {
            let confirm = confirm::build(&records, &cand.buckets);
            let lens = [
                records.len() * RECORD_LEN,
                patterns.len(),
                confirm.len(),
                cand.region.len(),
                cand.classes.map_or(0, |c| c.write_to_len()),
                flood.len(),
            ];
            let size = layout(&lens).1;
            debug!(
                "candidate {:?} with {:?} vectors needs {} bytes",
                cand.scheme, cand.vectors, size,
            );
            smallest = core::cmp::min(smallest, size);
            if size > limit {
                continue;
            }
            let key = |c: &Candidate, size: usize| {
                let cost = c.scheme.lookup_cost();
                match config.get_preference() {
                    Preference::Size => (size, cost),
                    Preference::Speed => (cost, size),
                }
            };
            let better = match best {
                None => true,
                Some((ref b, _, bsize)) => key(&cand, size) < key(b, bsize),
            };
            if better {
                best = Some((cand, confirm, size));
            }
        }
        let (cand, confirm) = match best {
            None => return Err(BuildError::too_big(smallest, limit)),
            Some((cand, confirm, size)) => {
                debug!(
                    "selected {:?} for {} literals, table is {} bytes",
                    cand.scheme,
                    lits.len(),
                    size,
                );
                (cand, confirm)
            }
        };

        let max_coverage =
            lits.iter().map(|l| l.coverage()).max().unwrap_or(1);
        let mut header = Header {
            scheme: cand.scheme,
            vectors: cand.vectors,
            floodguard: config.get_floodguard(),
            buckets: cand.buckets.len(),
            literals: lits.len(),
            min_len: lits.iter().map(|l| l.len()).min().unwrap_or(1),
            max_coverage,
            history_len: max_coverage - 1,
            state_len: STATE_HEADER_LEN + max_coverage - 1,
            accel: [0; 3],
            accel_len: 0,
            checksum: 0,
            regions: [Region::default(); REGIONS],
        };
        if let Some(ref bytes) = accel {
            header.accel[..bytes.len()].copy_from_slice(bytes);
            header.accel_len = bytes.len();
        }

        let classes_len = cand.classes.map_or(0, |c| c.write_to_len());
        let mut classes = vec![0; classes_len];
        if let Some(c) = cand.classes {
            c.write_to(&mut classes)
                .expect("class buffer is sized by write_to_len");
        }
        let mut literal_bytes = vec![0; records.len() * RECORD_LEN];
        for (i, rec) in records.iter().enumerate() {
            rec.write_to(&mut literal_bytes[i * RECORD_LEN..]);
        }
        let parts: [&[u8]; REGIONS] = [
            &literal_bytes,
            &patterns,
            &confirm,
            &cand.region,
            &classes,
            &flood,
        ];
        let mut lens = [0; REGIONS];
        for (len, part) in lens.iter_mut().zip(parts.iter()) {
            *len = part.len();
        }
        let (regions, total) = layout(&lens);
        let mut bytes = vec![0; total];
        for (region, part) in regions.iter().zip(parts.iter()) {
            bytes[region.start..region.start + region.len]
                .copy_from_slice(part);
        }
        header.regions = regions;
        header.checksum = fnv::hash(&bytes[HEADER_END..]);
        // 'layout' always places the first region at HEADER_END.
        header
            .write_to(&mut bytes)
            .expect("table buffer has room for its header");
        Ok(Table { bytes, header, classes: cand.classes })
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

/// A candidate scheme for a literal set, produced by a scheme module.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub(crate) scheme: Scheme,
    pub(crate) vectors: VectorWidth,
    /// Record indices per bucket, each list ascending.
    pub(crate) buckets: Vec<Vec<usize>>,
    /// The scheme region.
    pub(crate) region: Vec<u8>,
    /// The byte classes of a packed hash scheme.
    pub(crate) classes: Option<ByteClasses>,
}

/// Returns the distinct bytes (at most three) that every literal ends with.
fn final_bytes(lits: &[Literal]) -> Option<Vec<u8>> {
    let mut set = ByteSet::empty();
    for lit in lits.iter() {
        let last = lit.pattern()[lit.len() - 1];
        set.add(last);
        if lit.is_nocase() {
            set.add(flip_case(last));
        }
        if set.len() > 3 {
            return None;
        }
    }
    Some(set.iter().collect())
}

/// Lays out regions of the given lengths one after another, each starting
/// on an 8 byte boundary. Returns the regions and the total size.
fn layout(lens: &[usize; REGIONS]) -> ([Region; REGIONS], usize) {
    let mut regions = [Region::default(); REGIONS];
    let mut at = HEADER_END;
    for (region, &len) in regions.iter_mut().zip(lens.iter()) {
        *region = Region { start: at, len };
        at += len + wire::padding_len(len);
    }
    (regions, at)
}

#[derive(Clone, Copy, Debug, Default)]
struct Region {
    start: usize,
    len: usize,
}

/// The decoded table header.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    pub(crate) scheme: Scheme,
    pub(crate) vectors: VectorWidth,
    pub(crate) floodguard: bool,
    pub(crate) buckets: usize,
    pub(crate) literals: usize,
    pub(crate) min_len: usize,
    pub(crate) max_coverage: usize,
    pub(crate) history_len: usize,
    pub(crate) state_len: usize,
    accel: [u8; 3],
    accel_len: usize,
    pub(crate) checksum: u64,
    regions: [Region; REGIONS],
}

impl Header {
    /// Writes the preamble, header and region directory to the start of the
    /// given buffer, which must be at least `HEADER_END` bytes.
    fn write_to(&self, dst: &mut [u8]) -> Result<(), SerializeError> {
        if dst.len() < HEADER_END {
            return Err(SerializeError::buffer_too_small("table header"));
        }
        let mut nw = wire::write_label(LABEL, dst)?;
        nw += wire::write_endianness_check(&mut dst[nw..])?;
        wire::write_version(VERSION, &mut dst[nw..])?;

        let (kind, param, packed) = match self.scheme {
            Scheme::Hash { domain, packed } => (KIND_HASH, domain, packed),
            Scheme::Masked { masks, packed } => (KIND_MASKED, masks, packed),
        };
        let mut flags = 0;
        if packed {
            flags |= FLAG_PACKED;
        }
        if self.floodguard {
            flags |= FLAG_FLOODGUARD;
        }
        let h = &mut dst[PREAMBLE_LEN..];
        wire::write_u32(kind, &mut h[0..]);
        wire::write_u32(flags, &mut h[4..]);
        wire::write_u32(u32::from(param), &mut h[8..]);
        wire::write_u32(self.vectors.as_u32(), &mut h[12..]);
        wire::write_u32(self.buckets as u32, &mut h[16..]);
        wire::write_u32(self.literals as u32, &mut h[20..]);
        wire::write_u32(self.min_len as u32, &mut h[24..]);
        wire::write_u32(self.max_coverage as u32, &mut h[28..]);
        wire::write_u32(self.history_len as u32, &mut h[32..]);
        wire::write_u32(self.state_len as u32, &mut h[36..]);
        wire::write_u32(self.accel_len as u32, &mut h[40..]);
        h[44..47].copy_from_slice(&self.accel);
        h[47] = 0;
        wire::write_u64(self.checksum, &mut h[48..]);
        for (i, region) in self.regions.iter().enumerate() {
            wire::write_u32(region.start as u32, &mut h[56 + i * 8..]);
            wire::write_u32(region.len as u32, &mut h[60 + i * 8..]);
        }
        Ok(())
    }

    /// Reads and validates a header, along with everything it refers to.
    fn read(
        slice: &[u8],
    ) -> Result<(Header, Option<ByteClasses>), DeserializeError> {
        let mut nr = wire::read_label(slice, LABEL)?;
        nr += wire::read_endianness_check(&slice[nr..])?;
        nr += wire::read_version(&slice[nr..], VERSION)?;
        debug_assert_eq!(PREAMBLE_LEN, nr);
        wire::check_slice_len(slice, HEADER_END, "table header")?;

        let h = &slice[PREAMBLE_LEN..HEADER_END];
        let field = |at: usize| wire::read_u32(&h[at..]);
        let (kind, flags, param) = (field(0), field(4), field(8));
        let packed = flags & FLAG_PACKED != 0;
        if flags & !(FLAG_PACKED | FLAG_FLOODGUARD) != 0 {
            return Err(DeserializeError::generic("unknown table flags"));
        }
        let scheme = match kind {
            KIND_HASH => {
                let ok = if packed {
                    1 <= param && param * param < (1 << MAX_DOMAIN)
                } else {
                    u32::from(MIN_DOMAIN) <= param
                        && param <= u32::from(MAX_DOMAIN)
                };
                if !ok {
                    return Err(DeserializeError::generic(
                        "invalid hash scheme domain",
                    ));
                }
                Scheme::Hash { domain: param as u8, packed }
            }
            KIND_MASKED => {
                if param < 1 || param as usize > MAX_MASKS {
                    return Err(DeserializeError::generic(
                        "invalid masked scheme mask count",
                    ));
                }
                Scheme::Masked { masks: param as u8, packed }
            }
            _ => {
                return Err(DeserializeError::generic("unknown table scheme"))
            }
        };
        let vectors = VectorWidth::from_u32(field(12)).ok_or_else(|| {
            DeserializeError::generic("invalid vector width")
        })?;
        if scheme.kind() == SchemeKind::Masked && vectors == VectorWidth::None
        {
            return Err(DeserializeError::generic(
                "masked scheme requires vector support",
            ));
        }
        let mut accel = [0; 3];
        accel.copy_from_slice(&h[44..47]);
        let mut header = Header {
            scheme,
            vectors,
            floodguard: flags & FLAG_FLOODGUARD != 0,
            buckets: field(16) as usize,
            literals: field(20) as usize,
            min_len: field(24) as usize,
            max_coverage: field(28) as usize,
            history_len: field(32) as usize,
            state_len: field(36) as usize,
            accel,
            accel_len: field(40) as usize,
            checksum: wire::read_u64(&h[48..]),
            regions: [Region::default(); REGIONS],
        };
        for i in 0..REGIONS {
            let start = field(56 + i * 8) as usize;
            let len = field(60 + i * 8) as usize;
            let end = wire::add(start, len, "region")?;
            if start < HEADER_END || end > slice.len() {
                return Err(DeserializeError::generic(
                    "table region is out of bounds",
                ));
            }
            header.regions[i] = Region { start, len };
        }
        let found = fnv::hash(&slice[HEADER_END..]);
        if found != header.checksum {
            return Err(DeserializeError::checksum_mismatch(
                header.checksum,
                found,
            ));
        }

        if header.buckets < 1 || header.buckets > BUCKETS {
            return Err(DeserializeError::generic("invalid bucket count"));
        }
        if header.literals < 1
            || header.regions[LITERALS].len
                != wire::mul(header.literals, RECORD_LEN, "literals")?
        {
            return Err(DeserializeError::generic("invalid literal count"));
        }
        if header.min_len < 1 || header.max_coverage < header.min_len {
            return Err(DeserializeError::generic("invalid literal lengths"));
        }
        if header.history_len != header.max_coverage - 1
            || header.state_len != STATE_HEADER_LEN + header.history_len
        {
            return Err(DeserializeError::generic("invalid history length"));
        }
        if header.accel_len > 3 {
            return Err(DeserializeError::generic("invalid accelerator"));
        }
        let region = |i: usize| {
            let r = header.regions[i];
            &slice[r.start..r.start + r.len]
        };

        let patterns = region(PATTERNS);
        let literals = region(LITERALS);
        for i in 0..header.literals {
            let rec = Record::read(&literals[i * RECORD_LEN..]);
            let in_bounds = rec
                .pat_off
                .checked_add(rec.len)
                .map_or(false, |end| end <= patterns.len());
            let covered = rec.coverage == rec.len
                || (rec.len < rec.coverage && rec.coverage <= 8);
            if rec.id == RESERVED_ID
                || rec.len < header.min_len
                || rec.coverage > header.max_coverage
                || !in_bounds
                || !covered
            {
                return Err(DeserializeError::generic(
                    "invalid literal record",
                ));
            }
        }
        confirm::validate(region(CONFIRM), header.literals)?;
        flood::validate(region(FLOOD), header.literals)?;

        let expected = match scheme {
            Scheme::Hash { domain, packed: false } => (1usize << domain) * 8,
            Scheme::Hash { domain, packed: true } => {
                usize::from(domain) * usize::from(domain) * 8
            }
            Scheme::Masked { masks, packed } => {
                teddy::region_len(usize::from(masks), packed)
            }
        };
        if region(SCHEME).len() != expected {
            return Err(DeserializeError::generic("invalid scheme region"));
        }
        let classes = match scheme {
            Scheme::Hash { domain, packed: true } => {
                let (classes, _) = ByteClasses::from_bytes(region(CLASSES))?;
                if classes.alphabet_len() != usize::from(domain) {
                    return Err(DeserializeError::generic(
                        "byte classes do not match hash domain",
                    ));
                }
                Some(classes)
            }
            _ => None,
        };
        Ok((header, classes))
    }
}

/// A compiled literal table.
///
/// A table is generic over its backing bytes. Tables built by a
/// [`Builder`] own a `Vec<u8>`, while tables loaded with
/// [`Table::from_bytes`] borrow a `&[u8]`. All scanning methods work the
/// same for both.
///
/// A table is immutable after it is built, so it can be shared freely
/// between threads. The mutable state of a stream scan lives in a separate
/// [`StreamState`](crate::StreamState).
#[derive(Clone)]
pub struct Table<T = Vec<u8>> {
    bytes: T,
    header: Header,
    classes: Option<ByteClasses>,
}

impl Table<Vec<u8>> {
    /// Build a table from the given literals with the default configuration
    /// for the running CPU.
    ///
    /// To configure the build, use a [`Builder`].
    pub fn new(literals: &[Literal]) -> Result<Table, BuildError> {
        Builder::new().build(literals)
    }

    /// Return a default configuration for a table.
    pub fn config() -> Config {
        Config::new()
    }

    /// Return a builder for a table.
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl<'a> Table<&'a [u8]> {
    /// Load a table from its raw bytes, as returned by [`Table::as_bytes`].
    ///
    /// The bytes are validated, but not copied: the table borrows them. The
    /// slice may live at any address and has no alignment requirement.
    ///
    /// This fails if the bytes were not written by a compatible version of
    /// this crate, were written on a target with a different endianness, or
    /// were modified.
    ///
    /// # Example
    ///
    /// ```
    /// use litmatch::{Literal, Table};
    ///
    /// let table = Table::new(&[Literal::new("foo", 0)])?;
    /// let mut bytes = table.to_bytes();
    /// assert!(Table::from_bytes(&bytes).is_ok());
    ///
    /// let last = bytes.len() - 1;
    /// bytes[last] ^= 0xFF;
    /// assert!(Table::from_bytes(&bytes).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_bytes(
        slice: &'a [u8],
    ) -> Result<Table<&'a [u8]>, DeserializeError> {
        let (header, classes) = Header::read(slice)?;
        Ok(Table { bytes: slice, header, classes })
    }
}

impl<T: AsRef<[u8]>> Table<T> {
    /// Return a table that borrows the bytes of this one.
    pub fn as_ref(&self) -> Table<&'_ [u8]> {
        Table {
            bytes: self.bytes.as_ref(),
            header: self.header,
            classes: self.classes,
        }
    }

    /// Return a table that owns a copy of the bytes of this one.
    pub fn to_owned(&self) -> Table<Vec<u8>> {
        Table {
            bytes: self.bytes.as_ref().to_vec(),
            header: self.header,
            classes: self.classes,
        }
    }

    /// Returns the raw bytes of this table.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    /// Returns a copy of the raw bytes of this table.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Writes the raw bytes of this table to the given buffer, returning the
    /// number of bytes written. This fails if the buffer is smaller than
    /// [`Table::write_to_len`].
    pub fn write_to(&self, dst: &mut [u8]) -> Result<usize, SerializeError> {
        let nwrite = self.write_to_len();
        if dst.len() < nwrite {
            return Err(SerializeError::buffer_too_small("table"));
        }
        dst[..nwrite].copy_from_slice(self.as_bytes());
        Ok(nwrite)
    }

    /// Returns the number of bytes written by [`Table::write_to`].
    pub fn write_to_len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns the total memory used by this table's bytes.
    pub fn memory_usage(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns the matching scheme this table uses.
    pub fn scheme(&self) -> Scheme {
        self.header.scheme
    }

    /// Returns the widest vectors this table was built for. This is
    /// `VectorWidth::None` for the hash scheme.
    pub fn vector_width(&self) -> VectorWidth {
        self.header.vectors
    }

    /// Returns the number of literals in this table.
    pub fn literal_count(&self) -> usize {
        self.header.literals
    }

    /// Returns the number of buckets the literals are spread over.
    pub fn bucket_count(&self) -> usize {
        self.header.buckets
    }

    /// Returns the number of trailing bytes a stream keeps between chunks.
    /// This is one less than the longest literal (or mask).
    pub fn history_len(&self) -> usize {
        self.header.history_len
    }

    /// Returns the size, in bytes, of a stream state for this table.
    pub fn stream_state_len(&self) -> usize {
        self.header.state_len
    }

    /// Scans a single block, calling `f` for every match in the order
    /// described in the [crate documentation](crate).
    ///
    /// This returns an error when the input is invalid: the haystack is
    /// empty, the start position is past its end, or its offset is smaller
    /// than its history. In that case `f` is never called.
    ///
    /// # Example
    ///
    /// This shows how to stop a scan after the first match.
    ///
    /// ```
    /// use litmatch::{Action, Input, Literal, ScanStatus, Table};
    ///
    /// let table = Table::new(&[Literal::new("a", 0)])?;
    /// let mut count = 0;
    /// let status = table.scan(&Input::new("aaaa"), |_| {
    ///     count += 1;
    ///     Action::Terminate
    /// })?;
    /// assert_eq!(ScanStatus::Terminated, status);
    /// assert_eq!(1, count);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn scan<F: FnMut(&Match) -> Action>(
        &self,
        input: &Input<'_>,
        f: F,
    ) -> Result<ScanStatus, ScanError> {
        let haystack = input.haystack();
        if haystack.is_empty() {
            return Err(ScanError::empty_haystack());
        }
        if input.get_start() > haystack.len() {
            return Err(ScanError::start_out_of_bounds(
                input.get_start(),
                haystack.len(),
            ));
        }
        let history = input.get_history();
        let offset = input.get_offset();
        if offset < history.len() as u64 {
            return Err(ScanError::offset_underflow(offset, history.len()));
        }
        if offset.checked_add(haystack.len() as u64).is_none() {
            return Err(ScanError::offset_overflow(offset, haystack.len()));
        }
        let hay = Haystack::new(history, haystack);
        let mut last_id = None;
        Ok(scan::run(
            &self.view(),
            &hay,
            history.len() + input.get_start(),
            offset - history.len() as u64,
            input.get_groups(),
            &mut last_id,
            f,
        ))
    }

    /// Returns every match in the given haystack.
    pub fn find_all<H: ?Sized + AsRef<[u8]>>(
        &self,
        haystack: &H,
    ) -> Result<Vec<Match>, ScanError> {
        self.find_all_in(&Input::new(haystack))
    }

    /// Returns every match for the given input.
    pub fn find_all_in(
        &self,
        input: &Input<'_>,
    ) -> Result<Vec<Match>, ScanError> {
        let mut matches = vec![];
        self.scan(input, |m| {
            matches.push(*m);
            Action::Continue
        })?;
        Ok(matches)
    }

    /// Returns the fingerprint tying stream states to this table.
    pub(crate) fn fingerprint(&self) -> u64 {
        self.header.checksum
    }

    /// Returns the regions of this table, ready for scanning.
    pub(crate) fn view(&self) -> View<'_> {
        let bytes = self.as_bytes();
        let region = |i: usize| {
            let r = self.header.regions[i];
            &bytes[r.start..r.start + r.len]
        };
        View {
            header: &self.header,
            literals: region(LITERALS),
            patterns: region(PATTERNS),
            confirm: region(CONFIRM),
            scheme: region(SCHEME),
            flood: region(FLOOD),
            classes: self.classes,
            accel: Accel::new(&self.header.accel[..self.header.accel_len]),
        }
    }
}

impl<T: AsRef<[u8]>> core::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Table")
            .field("scheme", &self.header.scheme)
            .field("vectors", &self.header.vectors)
            .field("literals", &self.header.literals)
            .field("buckets", &self.header.buckets)
            .field("history_len", &self.header.history_len)
            .field("size", &self.memory_usage())
            .finish()
    }
}

/// The regions of a table, borrowed for the duration of a scan.
pub(crate) struct View<'t> {
    pub(crate) header: &'t Header,
    literals: &'t [u8],
    pub(crate) patterns: &'t [u8],
    pub(crate) confirm: &'t [u8],
    scheme: &'t [u8],
    flood: &'t [u8],
    classes: Option<ByteClasses>,
    pub(crate) accel: Option<Accel>,
}

impl<'t> View<'t> {
    #[inline]
    pub(crate) fn record(&self, i: usize) -> Record {
        Record::read(&self.literals[i * RECORD_LEN..])
    }

    #[inline]
    pub(crate) fn flood_list(&self, byte: u8) -> &'t [u8] {
        flood::list(self.flood, byte)
    }

    pub(crate) fn engine(&self) -> Engine<'t> {
        match self.header.scheme {
            Scheme::Hash { domain, packed } => {
                let index = match self.classes {
                    Some(classes) if packed => Index::Classes(classes),
                    _ => Index::domain(domain),
                };
                Engine::Hash(HashKernel::new(self.scheme, index))
            }
            Scheme::Masked { masks, packed } => {
                let masks = Masks::new(self.scheme, usize::from(masks), packed);
                Engine::Masked(MaskedKernel::new(masks, self.header.vectors))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildErrorKind;

    fn build(config: Config, lits: &[Literal]) -> Result<Table, BuildError> {
        Builder::new().configure(config).build(lits)
    }

    #[test]
    fn small_sets_prefer_masked() {
        let lits = [Literal::new("foo", 0), Literal::new("bar", 1)];
        let table = Builder::new()
            .target(Target::new(VectorWidth::V128))
            .build(&lits)
            .unwrap();
        assert_eq!(SchemeKind::Masked, table.scheme().kind());

        let table = Builder::new()
            .target(Target::new(VectorWidth::V256))
            .configure(Config::new().wide_vectors(false))
            .build(&lits)
            .unwrap();
        assert_eq!(VectorWidth::V128, table.vector_width());

        let table = Builder::new().target(Target::scalar()).build(&lits).unwrap();
        assert_eq!(SchemeKind::Hash, table.scheme().kind());
        assert_eq!(VectorWidth::None, table.vector_width());
    }

    #[test]
    fn speed_prefers_fewer_lookups() {
        let lits: Vec<Literal> = (0..40)
            .map(|i| Literal::new(format!("lit{:02}", i), i))
            .collect();
        let table = Builder::new()
            .target(Target::new(VectorWidth::V256))
            .configure(Config::new().preference(Preference::Speed))
            .build(&lits)
            .unwrap();
        assert_eq!(SchemeKind::Masked, table.scheme().kind());
    }

    #[test]
    fn forced_schemes() {
        let lits: Vec<Literal> =
            (0..100).map(|i| Literal::new(format!("{}", i), i)).collect();
        let err = build(Config::new().scheme(Some(SchemeKind::Masked)), &lits)
            .unwrap_err();
        match err.kind() {
            BuildErrorKind::NoScheme { .. } => {}
            k => panic!("unexpected error: {:?}", k),
        }
        let table =
            build(Config::new().scheme(Some(SchemeKind::Hash)), &lits[..2])
                .unwrap();
        assert_eq!(SchemeKind::Hash, table.scheme().kind());
    }

    #[test]
    fn build_errors() {
        let err = build(Config::new(), &[]).unwrap_err();
        assert_eq!(&BuildErrorKind::Empty, err.kind());
        assert_eq!(
            "cannot build a table from an empty literal set",
            err.to_string(),
        );
        let lits = [Literal::new("ok", 0), Literal::new("", 1)];
        match build(Config::new(), &lits).unwrap_err().kind() {
            BuildErrorKind::InvalidLiteral { index: Some(1), .. } => {}
            k => panic!("unexpected error: {:?}", k),
        }
        let lits = [Literal::new("foo", 0)];
        match build(Config::new().size_limit(Some(64)), &lits)
            .unwrap_err()
            .kind()
        {
            BuildErrorKind::TooBig { limit: 64, .. } => {}
            k => panic!("unexpected error: {:?}", k),
        }
    }

    #[test]
    fn size_limit_picks_another_scheme() {
        let lits = [Literal::new("foo", 0), Literal::new("bar", 1)];
        let hash = build(
            Config::new().scheme(Some(SchemeKind::Hash)).packed(false),
            &lits,
        )
        .unwrap();
        let table = build(
            Config::new()
                .preference(Preference::Speed)
                .size_limit(Some(hash.memory_usage())),
            &lits,
        )
        .unwrap();
        assert!(table.memory_usage() <= hash.memory_usage());
    }

    #[test]
    fn config_overwrite() {
        let base = Config::new().masked(false).floodguard(false);
        let merged = base.overwrite(Config::new().masked(true));
        assert!(merged.get_masked());
        assert!(!merged.get_floodguard());
        assert!(merged.get_accelerate());
        assert_eq!(None, merged.get_domain_bits());
    }

    #[test]
    #[should_panic]
    fn domain_bits_out_of_range() {
        Config::new().domain_bits(Some(16));
    }

    #[test]
    fn header_round_trip() {
        let lits = [
            Literal::new("foobar", 3).nocase(true),
            Literal::new("a", 4).mask(&[0xFF, 0xFF], b"xa").unwrap(),
        ];
        for &kind in &[SchemeKind::Hash, SchemeKind::Masked] {
            let table = build(Config::new().scheme(Some(kind)), &lits).unwrap();
            let loaded = Table::from_bytes(table.as_bytes()).unwrap();
            assert_eq!(table.scheme(), loaded.scheme());
            assert_eq!(2, loaded.literal_count());
            assert_eq!(5, loaded.history_len());
            assert_eq!(STATE_HEADER_LEN + 5, loaded.stream_state_len());
            assert_eq!(table.fingerprint(), loaded.fingerprint());
            // Records are in rank order.
            assert_eq!(3, loaded.view().record(0).id);

            let mut header = vec![0; HEADER_END];
            loaded.header.write_to(&mut header).unwrap();
            assert_eq!(&table.as_bytes()[..HEADER_END], &header[..]);
            assert!(loaded.header.write_to(&mut header[1..]).is_err());
        }
    }

    #[test]
    fn from_bytes_rejects_damage() {
        let table = Table::new(&[Literal::new("foo", 0)]).unwrap();
        let bytes = table.to_bytes();
        assert!(Table::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(Table::from_bytes(&bytes[..HEADER_END]).is_err());
        assert!(Table::from_bytes(&[]).is_err());

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(Table::from_bytes(&bad).is_err());

        let mut bad = bytes.clone();
        bad[HEADER_END] ^= 1;
        assert!(Table::from_bytes(&bad).is_err());

        let mut bad = bytes.clone();
        // The bucket count is covered by sanity checks, not the checksum.
        wire::write_u32(9, &mut bad[PREAMBLE_LEN + 16..]);
        assert!(Table::from_bytes(&bad).is_err());
    }

    #[test]
    fn relocated_table_scans() {
        let table = Table::new(&[Literal::new("needle", 9)]).unwrap();
        let mut buf = vec![0u8; table.write_to_len() + 3];
        // An odd address makes sure no aligned reads are needed.
        let n = table.write_to(&mut buf[3..]).unwrap();
        let loaded = Table::from_bytes(&buf[3..3 + n]).unwrap();
        let ms = loaded.find_all("hayneedlehay").unwrap();
        assert_eq!(vec![Match::new(3, 8, 9)], ms);
        assert!(table.write_to(&mut buf[..10]).is_err());
    }

    #[test]
    fn acceleration_bytes() {
        let lits = [Literal::new("ab", 0), Literal::new("cB", 1).nocase(true)];
        assert_eq!(Some(vec![b'B', b'b']), final_bytes(&lits));
        let lits = [
            Literal::new("a", 0),
            Literal::new("b", 1),
            Literal::new("c", 2),
            Literal::new("d", 3),
        ];
        assert_eq!(None, final_bytes(&lits));
    }

    #[test]
    fn scan_errors() {
        use crate::error::ScanErrorKind;

        let table = Table::new(&[Literal::new("foo", 0)]).unwrap();
        let kind = |input: Input<'_>| {
            table.scan(&input, |_| Action::Continue).unwrap_err().kind().clone()
        };
        assert_eq!(ScanErrorKind::EmptyHaystack, kind(Input::new("")));
        assert_eq!(
            ScanErrorKind::StartOutOfBounds { start: 4, len: 3 },
            kind(Input::new("abc").start(4)),
        );
        assert_eq!(
            ScanErrorKind::OffsetUnderflow { offset: 1, history: 2 },
            kind(Input::new("abc").history("xy").offset(1)),
        );
        assert_eq!(
            ScanErrorKind::OffsetOverflow { offset: u64::MAX - 1, len: 3 },
            kind(Input::new("foo").offset(u64::MAX - 1)),
        );
        let at_end = Input::new("foo").offset(u64::MAX - 3);
        assert_eq!(
            vec![Match::new(u64::MAX - 3, u64::MAX - 1, 0)],
            table.find_all_in(&at_end).unwrap(),
        );
        assert!(table.find_all_in(&Input::new("abc").start(3)).is_ok());
    }
}
