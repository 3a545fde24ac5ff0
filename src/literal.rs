use alloc::vec::Vec;

use crate::{error::BuildError, util::DebugBytes};

/// The identifier that no literal may use.
pub const RESERVED_ID: u32 = 0xFFFF_FFFF;

/// The maximum length of a literal's trailing mask and compare bytes.
pub const MAX_MASK_LEN: usize = 8;

/// A set of activation groups, represented as a 64-bit mask.
///
/// Every literal belongs to one or more groups. A scan is given the set of
/// currently active groups and only reports literals belonging to at least
/// one of them. By default, literals belong to all groups and scans activate
/// all groups.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Groups(u64);

impl Groups {
    /// Every group.
    pub const ALL: Groups = Groups(u64::MAX);

    /// No group at all. A literal in no group is never reported, and a scan
    /// with no active group reports nothing.
    pub const NONE: Groups = Groups(0);

    /// Create a group set from its raw bit representation.
    pub const fn new(bits: u64) -> Groups {
        Groups(bits)
    }

    /// Return the raw bit representation of this group set.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if and only if this set shares at least one group with
    /// the one given.
    #[inline]
    pub fn intersects(self, other: Groups) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for Groups {
    fn default() -> Groups {
        Groups::ALL
    }
}

impl core::fmt::Debug for Groups {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Groups({:#018X})", self.0)
    }
}

/// A literal to search for, along with the metadata that governs how and
/// when it is reported.
///
/// A literal is made of:
///
/// * Its pattern bytes, which must be non-empty.
/// * An identifier that is reported with every match. Identifiers need not
/// be unique, but [`RESERVED_ID`] is not allowed.
/// * Whether ASCII letters match case insensitively.
/// * Whether repeated reports are suppressed ("no runs"). When enabled, a
/// match of this literal is not reported if the previously reported match of
/// the same scan or stream had the same identifier.
/// * The groups it belongs to.
/// * An optional trailing mask and compare pair of at most [`MAX_MASK_LEN`]
/// bytes. If `v` is the haystack bytes ending where the literal ends (with
/// the same length as the mask), then a match additionally requires
/// `v & mask == compare` bytewise. The mask may be longer than the literal,
/// in which case it also constrains the bytes just before the literal.
///
/// # Example
///
/// This builds a case insensitive literal whose final byte must be upper
/// case. (Clearing bit `0x20` of an ASCII letter upper cases it.)
///
/// ```
/// use litmatch::Literal;
///
/// let lit = Literal::new("abc", 5).nocase(true).mask(&[0x20], &[0x00])?;
/// assert_eq!(lit.pattern(), b"abc");
/// assert!(lit.is_nocase());
///
/// // A mask that requires a lower case 'c' contradicts an upper case 'C'.
/// assert!(Literal::new("abC", 5).mask(&[0x20], &[0x20]).is_err());
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Eq, PartialEq)]
pub struct Literal {
    pattern: Vec<u8>,
    id: u32,
    nocase: bool,
    noruns: bool,
    groups: Groups,
    mask: Vec<u8>,
    cmp: Vec<u8>,
}

impl Literal {
    /// Create a case sensitive literal in all groups, without a mask.
    ///
    /// The literal is only validated when a table is built from it, or when
    /// [`Literal::validate`] is called.
    pub fn new<B: AsRef<[u8]>>(pattern: B, id: u32) -> Literal {
        Literal {
            pattern: pattern.as_ref().to_vec(),
            id,
            nocase: false,
            noruns: false,
            groups: Groups::ALL,
            mask: Vec::new(),
            cmp: Vec::new(),
        }
    }

    /// Set whether ASCII letters in this literal match case insensitively.
    pub fn nocase(mut self, yes: bool) -> Literal {
        self.nocase = yes;
        self
    }

    /// Set whether repeated reports of this literal are suppressed.
    pub fn noruns(mut self, yes: bool) -> Literal {
        self.noruns = yes;
        self
    }

    /// Set the groups that this literal belongs to.
    pub fn groups(mut self, groups: Groups) -> Literal {
        self.groups = groups;
        self
    }

    /// Set the trailing mask and compare bytes of this literal.
    ///
    /// This returns an error if the two have different lengths, if they are
    /// longer than [`MAX_MASK_LEN`], or if they are inconsistent with the
    /// literal's bytes (see [`mask_is_consistent`]).
    pub fn mask<M, C>(mut self, mask: M, cmp: C) -> Result<Literal, BuildError>
    where
        M: AsRef<[u8]>,
        C: AsRef<[u8]>,
    {
        self.mask = mask.as_ref().to_vec();
        self.cmp = cmp.as_ref().to_vec();
        self.validate_mask()?;
        Ok(self)
    }

    /// Returns the pattern bytes of this literal.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Returns the identifier of this literal.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns true if this literal matches ASCII letters case insensitively.
    pub fn is_nocase(&self) -> bool {
        self.nocase
    }

    /// Returns true if repeated reports of this literal are suppressed.
    pub fn is_noruns(&self) -> bool {
        self.noruns
    }

    /// Returns the groups this literal belongs to.
    pub fn get_groups(&self) -> Groups {
        self.groups
    }

    /// Returns the trailing mask bytes, which may be empty.
    pub fn get_mask(&self) -> &[u8] {
        &self.mask
    }

    /// Returns the trailing compare bytes, which may be empty.
    pub fn get_cmp(&self) -> &[u8] {
        &self.cmp
    }

    /// Returns the length of this literal's pattern.
    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    /// Returns true if this literal's pattern is empty. Such a literal is
    /// never valid.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Returns the number of haystack bytes, ending where a match of this
    /// literal ends, that are needed to confirm it. This is the larger of the
    /// pattern and mask lengths.
    pub fn coverage(&self) -> usize {
        core::cmp::max(self.pattern.len(), self.mask.len())
    }

    /// Validates this literal, returning the same errors a table build would.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.pattern.is_empty() {
            return Err(BuildError::invalid_literal("empty pattern"));
        }
        if self.id == RESERVED_ID {
            return Err(BuildError::invalid_literal(
                "identifier 0xFFFFFFFF is reserved",
            ));
        }
        self.validate_mask()
    }

    fn validate_mask(&self) -> Result<(), BuildError> {
        if self.mask.len() != self.cmp.len() {
            return Err(BuildError::invalid_literal(
                "mask and compare lengths differ",
            ));
        }
        if self.mask.len() > MAX_MASK_LEN {
            return Err(BuildError::invalid_literal(
                "mask is longer than 8 bytes",
            ));
        }
        if !mask_is_consistent(
            &self.pattern,
            self.nocase,
            &self.mask,
            &self.cmp,
        ) {
            return Err(BuildError::consistency());
        }
        Ok(())
    }
}

impl core::fmt::Debug for Literal {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut fmtd = f.debug_struct("Literal");
        fmtd.field("pattern", &DebugBytes(&self.pattern))
            .field("id", &self.id)
            .field("nocase", &self.nocase)
            .field("noruns", &self.noruns)
            .field("groups", &self.groups);
        if !self.mask.is_empty() {
            fmtd.field("mask", &DebugBytes(&self.mask))
                .field("cmp", &DebugBytes(&self.cmp));
        }
        fmtd.finish()
    }
}

/// Returns false if the given mask and compare bytes can never be satisfied
/// by the given pattern.
///
/// The mask and compare bytes are aligned with the end of the pattern. A
/// mask position is rejected when:
///
/// * its compare byte sets a bit that its mask byte clears, since no input
/// byte could ever produce it, or
/// * it covers a pattern byte that fails `byte & mask == compare`. For case
/// insensitive ASCII letters, it suffices that either case passes, which
/// lets a mask restrict the case of individual letters.
///
/// Mask positions before the start of the pattern only need to pass the
/// first rule. Mismatched or overly long inputs are never consistent.
///
/// # Example
///
/// ```
/// use litmatch::mask_is_consistent;
///
/// assert!(mask_is_consistent(b"xyz", false, &[0xFF, 0xFF], b"yz"));
/// assert!(!mask_is_consistent(b"xyz", false, &[0xFF, 0xFF], b"zz"));
/// // Either case of 'z' may satisfy a case insensitive literal.
/// assert!(mask_is_consistent(b"xyz", true, &[0xFF], b"Z"));
/// // The compare byte can never be produced through this mask.
/// assert!(!mask_is_consistent(b"xyz", false, &[0x0F], &[0x1A]));
/// // The leading mask byte applies to whatever precedes the literal.
/// assert!(mask_is_consistent(b"z", false, &[0xFF, 0xFF], b"!z"));
/// ```
pub fn mask_is_consistent(
    pattern: &[u8],
    nocase: bool,
    mask: &[u8],
    cmp: &[u8],
) -> bool {
    if mask.len() != cmp.len() || mask.len() > MAX_MASK_LEN {
        return false;
    }
    for (i, (&m, &c)) in mask.iter().zip(cmp.iter()).enumerate() {
        if c & !m != 0 {
            return false;
        }
        let dist = mask.len() - 1 - i;
        if dist >= pattern.len() {
            continue;
        }
        let b = pattern[pattern.len() - 1 - dist];
        let ok = if nocase && b.is_ascii_alphabetic() {
            b.to_ascii_lowercase() & m == c
                || b.to_ascii_uppercase() & m == c
        } else {
            b & m == c
        };
        if !ok {
            return false;
        }
    }
    true
}
