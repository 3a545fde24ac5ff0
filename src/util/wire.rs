/*!
Helpers for reading and writing the binary form of a compiled table.

A compiled table is a single contiguous byte buffer. Everything a scan needs
lives inside that buffer and every internal reference is an offset from its
start, which is what makes a table relocatable: it can be copied to any
address, written to disk and read back, or embedded in a binary, and then used
without a fix-up pass.

Integers are always read by copying them out of the buffer (via
`from_ne_bytes`), so a table never has any alignment requirement. The price
is that tables are only portable between targets of the same endianness,
which is checked when a table is loaded.
*/

use core::cmp;

/// An error that occurs when writing a table to a caller provided buffer.
///
/// Writing a table is infallible except when the destination is too small.
/// A `SerializeError` provides no introspection capabilities. Its only
/// supported operation is conversion to a human readable error message.
///
/// This error type implements the `std::error::Error` trait only when the
/// `std` feature is enabled.
#[derive(Clone, Debug)]
pub struct SerializeError {
    /// The name of the thing that a buffer is too small for.
    what: &'static str,
}

impl SerializeError {
    pub(crate) fn buffer_too_small(what: &'static str) -> SerializeError {
        SerializeError { what }
    }
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "destination buffer is too small to write {}", self.what)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SerializeError {}

/// An error that occurs when loading a table from raw bytes.
///
/// Loading validates the label, endianness, version, every region boundary
/// and a checksum of the table's contents. Any failure is reported through
/// this error.
///
/// A `DeserializeError` provides no introspection capabilities. Its only
/// supported operation is conversion to a human readable error message.
///
/// This error type implements the `std::error::Error` trait only when the
/// `std` feature is enabled.
#[derive(Clone, Debug)]
pub struct DeserializeError(DeserializeErrorKind);

#[derive(Clone, Debug)]
enum DeserializeErrorKind {
    Generic { msg: &'static str },
    BufferTooSmall { what: &'static str },
    VersionMismatch { expected: u32, found: u32 },
    EndianMismatch { expected: u64, found: u64 },
    LabelMismatch { expected: &'static str },
    ChecksumMismatch { expected: u64, found: u64 },
    ArithmeticOverflow { what: &'static str },
}

impl DeserializeError {
    pub(crate) fn generic(msg: &'static str) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::Generic { msg })
    }

    pub(crate) fn buffer_too_small(what: &'static str) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::BufferTooSmall { what })
    }

    fn version_mismatch(expected: u32, found: u32) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::VersionMismatch {
            expected,
            found,
        })
    }

    fn endian_mismatch(expected: u64, found: u64) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::EndianMismatch {
            expected,
            found,
        })
    }

    fn label_mismatch(expected: &'static str) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::LabelMismatch { expected })
    }

    pub(crate) fn checksum_mismatch(
        expected: u64,
        found: u64,
    ) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::ChecksumMismatch {
            expected,
            found,
        })
    }

    fn arithmetic_overflow(what: &'static str) -> DeserializeError {
        DeserializeError(DeserializeErrorKind::ArithmeticOverflow { what })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeserializeError {}

impl core::fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::DeserializeErrorKind::*;

        match self.0 {
            Generic { msg } => write!(f, "{}", msg),
            BufferTooSmall { what } => {
                write!(f, "buffer is too small to read {}", what)
            }
            VersionMismatch { expected, found } => write!(
                f,
                "unsupported version: \
                 expected version {} but found version {}",
                expected, found,
            ),
            EndianMismatch { expected, found } => write!(
                f,
                "endianness mismatch: expected 0x{:X} but got 0x{:X}. \
                 (Are you trying to load a table built for a target \
                 with a different endianness?)",
                expected, found,
            ),
            LabelMismatch { expected } => write!(
                f,
                "label mismatch: start of serialized table should \
                 contain a NUL terminated {:?} label, but a different \
                 label was found",
                expected,
            ),
            ChecksumMismatch { expected, found } => write!(
                f,
                "checksum mismatch: header records 0x{:016X} but the \
                 table contents hash to 0x{:016X}",
                expected, found,
            ),
            ArithmeticOverflow { what } => {
                write!(f, "arithmetic overflow for {}", what)
            }
        }
    }
}

/// Reads a NUL terminated label starting at the beginning of the given slice.
///
/// If a NUL terminated label could not be found, then an error is returned.
/// Similarly, if a label is found but doesn't match the expected label, then
/// an error is returned.
///
/// Upon success, the total number of bytes read (including padding bytes) is
/// returned.
pub fn read_label(
    slice: &[u8],
    expected_label: &'static str,
) -> Result<usize, DeserializeError> {
    // No label is longer than 256 bytes, so if there's no NUL in that range,
    // then the data is corrupt.
    let first_nul =
        slice[..cmp::min(slice.len(), 256)].iter().position(|&b| b == 0);
    let first_nul = match first_nul {
        Some(first_nul) => first_nul,
        None => {
            return Err(DeserializeError::generic(
                "could not find NUL terminated label \
                 at start of serialized table",
            ));
        }
    };
    let len = first_nul + padding_len(first_nul);
    if slice.len() < len {
        return Err(DeserializeError::generic(
            "could not find properly sized label at start of serialized table",
        ));
    }
    if expected_label.as_bytes() != &slice[..first_nul] {
        return Err(DeserializeError::label_mismatch(expected_label));
    }
    Ok(len)
}

/// Writes the given label to the buffer as a NUL terminated string. The label
/// given must not contain NUL, otherwise this will panic. Similarly, the label
/// must not be longer than 255 bytes, otherwise this will panic.
///
/// Additional NUL bytes are written as necessary to ensure that the number of
/// bytes written is always a multiple of 8.
///
/// Upon success, the total number of bytes written (including padding) is
/// returned.
pub fn write_label(
    label: &str,
    dst: &mut [u8],
) -> Result<usize, SerializeError> {
    let nwrite = write_label_len(label);
    if dst.len() < nwrite {
        return Err(SerializeError::buffer_too_small("label"));
    }
    dst[..label.len()].copy_from_slice(label.as_bytes());
    for b in dst[label.len()..nwrite].iter_mut() {
        *b = 0;
    }
    assert_eq!(nwrite % 8, 0);
    Ok(nwrite)
}

/// Returns the total number of bytes (including padding) that would be written
/// for the given label. This panics if the given label contains a NUL byte or
/// is longer than 255 bytes.
pub fn write_label_len(label: &str) -> usize {
    if label.len() > 255 {
        panic!("label must not be longer than 255 bytes");
    }
    if label.as_bytes().iter().any(|&b| b == 0) {
        panic!("label must not contain NUL bytes");
    }
    let label_len = label.len() + 1; // +1 for the NUL terminator
    label_len + padding_len(label_len)
}

/// Reads the endianness check from the beginning of the given slice and
/// confirms that the table was written on a target with the same endianness.
///
/// Upon success, the total number of bytes read is returned.
pub fn read_endianness_check(slice: &[u8]) -> Result<usize, DeserializeError> {
    let n = try_read_u64(slice, "endianness check")?;
    if n != 0xFEFF {
        return Err(DeserializeError::endian_mismatch(0xFEFF, n));
    }
    Ok(write_endianness_check_len())
}

/// Writes 0xFEFF in native endianness.
///
/// Upon success, the total number of bytes written is returned.
pub fn write_endianness_check(
    dst: &mut [u8],
) -> Result<usize, SerializeError> {
    let nwrite = write_endianness_check_len();
    if dst.len() < nwrite {
        return Err(SerializeError::buffer_too_small("endianness check"));
    }
    write_u64(0xFEFF, dst);
    Ok(nwrite)
}

/// Returns the number of bytes written by the endianness check.
pub fn write_endianness_check_len() -> usize {
    8
}

/// Reads a version number from the beginning of the given slice and confirms
/// that is matches the expected version number given.
///
/// The version is followed by 4 reserved bytes, so that everything after it
/// stays on an 8 byte boundary. Upon success, the total number of bytes read
/// is returned.
pub fn read_version(
    slice: &[u8],
    expected_version: u32,
) -> Result<usize, DeserializeError> {
    check_slice_len(slice, write_version_len(), "version")?;
    let n = read_u32(slice);
    if n != expected_version {
        return Err(DeserializeError::version_mismatch(expected_version, n));
    }
    Ok(write_version_len())
}

/// Writes the given version number to the beginning of the given slice.
///
/// Upon success, the total number of bytes written is returned.
pub fn write_version(
    version: u32,
    dst: &mut [u8],
) -> Result<usize, SerializeError> {
    let nwrite = write_version_len();
    if dst.len() < nwrite {
        return Err(SerializeError::buffer_too_small("version number"));
    }
    write_u32(version, dst);
    write_u32(0, &mut dst[4..]);
    Ok(nwrite)
}

/// Returns the number of bytes written by writing the version number.
pub fn write_version_len() -> usize {
    8
}

/// Try to read a u64 from the beginning of the given slice in native endian
/// format. If the slice has fewer than 8 bytes, then this returns an error.
pub fn try_read_u64(
    slice: &[u8],
    what: &'static str,
) -> Result<u64, DeserializeError> {
    if slice.len() < 8 {
        return Err(DeserializeError::buffer_too_small(what));
    }
    Ok(read_u64(slice))
}

/// Read a u32 from the beginning of the given slice in native endian format.
/// If the slice has fewer than 4 bytes, then this panics.
#[inline(always)]
pub fn read_u32(slice: &[u8]) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&slice[..4]);
    u32::from_ne_bytes(bytes)
}

/// Read a u64 from the beginning of the given slice in native endian format.
/// If the slice has fewer than 8 bytes, then this panics.
///
/// Marked as inline since the hash scheme decodes one of these for every
/// byte it scans.
#[inline(always)]
pub fn read_u64(slice: &[u8]) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&slice[..8]);
    u64::from_ne_bytes(bytes)
}

/// Writes a u32 to the given destination buffer in native endianness. If the
/// destination buffer has a length smaller than 4, then this panics.
pub fn write_u32(n: u32, dst: &mut [u8]) {
    dst[..4].copy_from_slice(&n.to_ne_bytes());
}

/// Writes a u64 to the given destination buffer in native endianness. If the
/// destination buffer has a length smaller than 8, then this panics.
pub fn write_u64(n: u64, dst: &mut [u8]) {
    dst[..8].copy_from_slice(&n.to_ne_bytes());
}

/// Checks that the given slice has some minimal length. If it's smaller than
/// the bound given, then a "buffer too small" error is returned with `what`
/// describing what the buffer represents.
pub fn check_slice_len<T>(
    slice: &[T],
    at_least_len: usize,
    what: &'static str,
) -> Result<(), DeserializeError> {
    if slice.len() < at_least_len {
        return Err(DeserializeError::buffer_too_small(what));
    }
    Ok(())
}

/// Multiply the given numbers, and on overflow, return an error that includes
/// 'what' in the error message.
///
/// This is useful when doing arithmetic with untrusted data.
pub fn mul(
    a: usize,
    b: usize,
    what: &'static str,
) -> Result<usize, DeserializeError> {
    match a.checked_mul(b) {
        Some(c) => Ok(c),
        None => Err(DeserializeError::arithmetic_overflow(what)),
    }
}

/// Add the given numbers, and on overflow, return an error that includes
/// 'what' in the error message.
///
/// This is useful when doing arithmetic with untrusted data.
pub fn add(
    a: usize,
    b: usize,
    what: &'static str,
) -> Result<usize, DeserializeError> {
    match a.checked_add(b) {
        Some(c) => Ok(c),
        None => Err(DeserializeError::arithmetic_overflow(what)),
    }
}

/// Returns the number of additional bytes required to add to the given length
/// in order to make the total length a multiple of 8. The return value is
/// always less than 8.
pub fn padding_len(non_padding_len: usize) -> usize {
    (8 - (non_padding_len & 0b111)) & 0b111
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let mut buf = [0; 1024];

        let nwrite = write_label("litmatch-table", &mut buf).unwrap();
        assert_eq!(nwrite, 16);
        assert_eq!(&buf[..nwrite], b"litmatch-table\x00\x00");

        let nread = read_label(&buf, "litmatch-table").unwrap();
        assert_eq!(nread, 16);
        assert!(read_label(&buf, "litmatch-state").is_err());
    }

    #[test]
    #[should_panic]
    fn bad_label_interior_nul() {
        write_label("foo\x00bar", &mut [0; 1024]).unwrap();
    }

    #[test]
    #[should_panic]
    fn bad_label_too_long() {
        write_label(&"z".repeat(256), &mut [0; 1024]).unwrap();
    }

    #[test]
    fn label_destination_too_small() {
        assert!(write_label("litmatch-table", &mut [0; 15]).is_err());
    }

    #[test]
    fn endianness_and_version() {
        let mut buf = [0; 16];
        assert_eq!(8, write_endianness_check(&mut buf).unwrap());
        assert_eq!(8, read_endianness_check(&buf).unwrap());
        assert_eq!(8, write_version(3, &mut buf[8..]).unwrap());
        assert_eq!(8, read_version(&buf[8..], 3).unwrap());
        assert!(read_version(&buf[8..], 4).is_err());
        // A byte swapped check must be rejected.
        buf[..8].copy_from_slice(&0xFEFFu64.swap_bytes().to_ne_bytes());
        assert!(read_endianness_check(&buf).is_err());
    }

    #[test]
    fn unaligned_reads() {
        let mut buf = [0u8; 24];
        write_u64(0x0102030405060708, &mut buf[3..]);
        assert_eq!(0x0102030405060708, read_u64(&buf[3..]));
        write_u32(0xDEADBEEF, &mut buf[17..]);
        assert_eq!(0xDEADBEEF, read_u32(&buf[17..]));
        assert!(try_read_u64(&buf[20..], "test").is_err());
    }

    #[test]
    fn padding() {
        assert_eq!(0, padding_len(8));
        assert_eq!(7, padding_len(9));
        assert_eq!(6, padding_len(10));
        assert_eq!(5, padding_len(11));
        assert_eq!(4, padding_len(12));
        assert_eq!(3, padding_len(13));
        assert_eq!(2, padding_len(14));
        assert_eq!(1, padding_len(15));
        assert_eq!(0, padding_len(16));
    }
}
