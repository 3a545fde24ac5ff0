/// A matching scheme selected for a compiled table.
///
/// The scheme is chosen once, when a table is built, and is recorded in the
/// table's header. Every scan dispatches on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scheme {
    /// The hash-bucket scheme. Literals are spread over 8 buckets by length
    /// and a shift-or filter over two byte windows finds candidate end
    /// positions per bucket. Each candidate is confirmed through a per-bucket
    /// hash table of literals.
    ///
    /// When `packed` is false, the filter is indexed by the low `domain` bits
    /// of each two byte window. When it is true, it is indexed by a pair of
    /// byte equivalence classes instead, and `domain` records the number of
    /// classes.
    Hash { domain: u8, packed: bool },
    /// The masked nibble scheme. Each of the last `masks` bytes of a literal
    /// contributes a low nibble and a high nibble lookup into a table of 8
    /// bucket bits. A candidate end position is one where the lookups of
    /// every mask share a bucket.
    ///
    /// When `packed` is true, all masks share a single high nibble table.
    Masked { masks: u8, packed: bool },
}

impl Scheme {
    /// Returns the family this scheme belongs to.
    pub fn kind(&self) -> SchemeKind {
        match *self {
            Scheme::Hash { .. } => SchemeKind::Hash,
            Scheme::Masked { .. } => SchemeKind::Masked,
        }
    }

    /// Returns true if this is a packed variant.
    pub fn is_packed(&self) -> bool {
        match *self {
            Scheme::Hash { packed, .. } => packed,
            Scheme::Masked { packed, .. } => packed,
        }
    }

    /// A rough count of table lookups per scanned byte. Used to break ties
    /// between candidate schemes.
    pub(crate) fn lookup_cost(&self) -> usize {
        match *self {
            Scheme::Hash { packed: false, .. } => 5,
            Scheme::Hash { packed: true, .. } => 6,
            Scheme::Masked { masks, .. } => usize::from(masks),
        }
    }
}

/// A family of matching schemes, independent of its parameters.
///
/// This is used to force a particular family through
/// [`Config::scheme`](crate::table::Config::scheme).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemeKind {
    Hash,
    Masked,
}

/// A preference between smaller and faster tables when more than one scheme
/// applies to a literal set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Preference {
    /// Pick the smallest table, breaking ties by fewer lookups per byte.
    Size,
    /// Pick the fewest lookups per byte, breaking ties by size.
    Speed,
}

impl Default for Preference {
    fn default() -> Preference {
        Preference::Size
    }
}

/// The widest vector registers the masked scheme may use.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum VectorWidth {
    /// No vector support. The masked scheme is never selected.
    None,
    /// 128-bit vectors. A portable implementation exists for every target,
    /// so this never makes a table unusable.
    V128,
    /// 256-bit vectors.
    V256,
}

impl VectorWidth {
    /// Returns the number of haystack positions checked per vector.
    pub fn lanes(self) -> usize {
        match self {
            VectorWidth::None => 1,
            VectorWidth::V128 => 16,
            VectorWidth::V256 => 32,
        }
    }

    pub(crate) fn as_u32(self) -> u32 {
        match self {
            VectorWidth::None => 0,
            VectorWidth::V128 => 1,
            VectorWidth::V256 => 2,
        }
    }

    pub(crate) fn from_u32(n: u32) -> Option<VectorWidth> {
        match n {
            0 => Some(VectorWidth::None),
            1 => Some(VectorWidth::V128),
            2 => Some(VectorWidth::V256),
            _ => None,
        }
    }
}

/// A description of the CPU capabilities a table is built for.
///
/// A table built for one target still scans correctly on any other: if the
/// running CPU lacks the vector width recorded in a table, the scan falls
/// back to a narrower implementation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Target {
    vectors: VectorWidth,
}

impl Target {
    /// Create a target with the given vector capabilities.
    pub fn new(vectors: VectorWidth) -> Target {
        Target { vectors }
    }

    /// A target without vector support. Tables built for it always use the
    /// hash scheme.
    pub fn scalar() -> Target {
        Target::new(VectorWidth::None)
    }

    /// Detect the capabilities of the running CPU.
    ///
    /// Without the `std` feature, only the target features enabled at compile
    /// time are considered.
    pub fn detect() -> Target {
        if avx2_available() {
            Target::new(VectorWidth::V256)
        } else {
            Target::new(VectorWidth::V128)
        }
    }

    /// Returns the widest vectors available on this target.
    pub fn vectors(&self) -> VectorWidth {
        self.vectors
    }
}

impl Default for Target {
    fn default() -> Target {
        Target::detect()
    }
}

#[cfg(all(target_arch = "x86_64", feature = "std"))]
pub(crate) fn avx2_available() -> bool {
    std::is_x86_feature_detected!("avx2")
}

#[cfg(all(target_arch = "x86_64", not(feature = "std")))]
pub(crate) fn avx2_available() -> bool {
    cfg!(target_feature = "avx2")
}

#[cfg(not(target_arch = "x86_64"))]
pub(crate) fn avx2_available() -> bool {
    false
}

#[cfg(all(target_arch = "x86_64", feature = "std"))]
pub(crate) fn ssse3_available() -> bool {
    std::is_x86_feature_detected!("ssse3")
}

#[cfg(all(target_arch = "x86_64", not(feature = "std")))]
pub(crate) fn ssse3_available() -> bool {
    cfg!(target_feature = "ssse3")
}

#[cfg(not(target_arch = "x86_64"))]
#[allow(dead_code)]
pub(crate) fn ssse3_available() -> bool {
    false
}
