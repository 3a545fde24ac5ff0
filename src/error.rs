/// An error that occurred while validating literals or building a table.
///
/// Every build failure is fatal to that build attempt only. No partial table
/// is ever produced, and the same literals may be built again with a
/// different configuration.
///
/// When the `std` feature is enabled, this implements the `std::error::Error`
/// trait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildError {
    kind: BuildErrorKind,
}

/// The kind of error that occurred while building a table.
///
/// Note that this error is non-exhaustive. Adding new variants is not
/// considered a breaking change.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BuildErrorKind {
    /// The literal set given to the builder was empty.
    Empty,
    /// A literal's trailing mask and compare pair can never be satisfied by
    /// the literal's own bytes, so the literal could never match.
    ///
    /// `index` is the position of the literal in the slice given to the
    /// builder. It is `None` when the error is reported while constructing
    /// the literal itself.
    Consistency { index: Option<usize> },
    /// A literal is structurally invalid. `what` describes the problem: an
    /// empty pattern, the reserved identifier, mismatched mask and compare
    /// lengths or an overly long mask.
    InvalidLiteral { index: Option<usize>, what: &'static str },
    /// The compiled table would exceed either the configured size limit or
    /// the largest size representable by the table's internal offsets.
    TooBig { size: usize, limit: usize },
    /// No matching scheme could represent the literal set under the given
    /// configuration and target. This only happens when a scheme is forced.
    NoScheme { what: &'static str },
}

impl BuildError {
    /// Return the kind of this error.
    pub fn kind(&self) -> &BuildErrorKind {
        &self.kind
    }

    pub(crate) fn empty() -> BuildError {
        BuildError { kind: BuildErrorKind::Empty }
    }

    pub(crate) fn consistency() -> BuildError {
        BuildError { kind: BuildErrorKind::Consistency { index: None } }
    }

    pub(crate) fn invalid_literal(what: &'static str) -> BuildError {
        BuildError {
            kind: BuildErrorKind::InvalidLiteral { index: None, what },
        }
    }

    pub(crate) fn too_big(size: usize, limit: usize) -> BuildError {
        BuildError { kind: BuildErrorKind::TooBig { size, limit } }
    }

    pub(crate) fn no_scheme(what: &'static str) -> BuildError {
        BuildError { kind: BuildErrorKind::NoScheme { what } }
    }

    /// Attaches the position of the offending literal to a literal error.
    pub(crate) fn at(self, i: usize) -> BuildError {
        let kind = match self.kind {
            BuildErrorKind::Consistency { .. } => {
                BuildErrorKind::Consistency { index: Some(i) }
            }
            BuildErrorKind::InvalidLiteral { what, .. } => {
                BuildErrorKind::InvalidLiteral { index: Some(i), what }
            }
            kind => kind,
        };
        BuildError { kind }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

impl core::fmt::Display for BuildError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind() {
            BuildErrorKind::Empty => {
                write!(f, "cannot build a table from an empty literal set")
            }
            BuildErrorKind::Consistency { index: None } => write!(
                f,
                "literal mask and compare bytes are inconsistent with \
                 the literal itself",
            ),
            BuildErrorKind::Consistency { index: Some(i) } => write!(
                f,
                "literal {} has mask and compare bytes that are \
                 inconsistent with the literal itself",
                i,
            ),
            BuildErrorKind::InvalidLiteral { index: None, what } => {
                write!(f, "invalid literal: {}", what)
            }
            BuildErrorKind::InvalidLiteral { index: Some(i), what } => {
                write!(f, "invalid literal {}: {}", i, what)
            }
            BuildErrorKind::TooBig { size, limit } => write!(
                f,
                "table of {} bytes exceeds size limit of {} bytes",
                size, limit,
            ),
            BuildErrorKind::NoScheme { what } => {
                write!(f, "no matching scheme applies: {}", what)
            }
        }
    }
}

/// An error that occurred when a scan was rejected.
///
/// Every scan error is detected before a single byte of the haystack is
/// examined. No callback is invoked and no stream state is modified when a
/// scan returns an error.
///
/// When the `std` feature is enabled, this implements the `std::error::Error`
/// trait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanError {
    kind: ScanErrorKind,
}

/// The kind of scan error that occurred.
///
/// Note that this error is non-exhaustive. Adding new variants is not
/// considered a breaking change.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScanErrorKind {
    /// The haystack (or stream chunk) given was empty.
    EmptyHaystack,
    /// The starting position of a scan is past the end of the haystack.
    StartOutOfBounds { start: usize, len: usize },
    /// The stream offset of a haystack is smaller than the amount of history
    /// preceding it, which would put the history at a negative offset.
    OffsetUnderflow { offset: u64, history: usize },
    /// The stream offset of the end of a haystack does not fit in a `u64`.
    OffsetOverflow { offset: u64, len: usize },
    /// A stream state was opened by a different table.
    StateMismatch,
    /// A stream state does not have the size required by the table.
    StateSize { expected: usize, found: usize },
    /// A stream state was used after it was closed.
    StreamClosed,
}

impl ScanError {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ScanErrorKind {
        &self.kind
    }

    pub(crate) fn empty_haystack() -> ScanError {
        ScanError { kind: ScanErrorKind::EmptyHaystack }
    }

    pub(crate) fn start_out_of_bounds(start: usize, len: usize) -> ScanError {
        ScanError { kind: ScanErrorKind::StartOutOfBounds { start, len } }
    }

    pub(crate) fn offset_underflow(offset: u64, history: usize) -> ScanError {
        ScanError { kind: ScanErrorKind::OffsetUnderflow { offset, history } }
    }

    pub(crate) fn offset_overflow(offset: u64, len: usize) -> ScanError {
        ScanError { kind: ScanErrorKind::OffsetOverflow { offset, len } }
    }

    pub(crate) fn state_mismatch() -> ScanError {
        ScanError { kind: ScanErrorKind::StateMismatch }
    }

    pub(crate) fn state_size(expected: usize, found: usize) -> ScanError {
        ScanError { kind: ScanErrorKind::StateSize { expected, found } }
    }

    pub(crate) fn stream_closed() -> ScanError {
        ScanError { kind: ScanErrorKind::StreamClosed }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ScanError {}

impl core::fmt::Display for ScanError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self.kind() {
            ScanErrorKind::EmptyHaystack => {
                write!(f, "cannot scan an empty haystack")
            }
            ScanErrorKind::StartOutOfBounds { start, len } => write!(
                f,
                "scan start {} is out of bounds for haystack of length {}",
                start, len,
            ),
            ScanErrorKind::OffsetUnderflow { offset, history } => write!(
                f,
                "haystack offset {} is smaller than history length {}",
                offset, history,
            ),
            ScanErrorKind::OffsetOverflow { offset, len } => write!(
                f,
                "haystack of length {} at offset {} overflows the stream",
                len, offset,
            ),
            ScanErrorKind::StateMismatch => {
                write!(f, "stream state belongs to a different table")
            }
            ScanErrorKind::StateSize { expected, found } => write!(
                f,
                "stream state has size {} but table requires size {}",
                found, expected,
            ),
            ScanErrorKind::StreamClosed => {
                write!(f, "cannot scan a closed stream")
            }
        }
    }
}
