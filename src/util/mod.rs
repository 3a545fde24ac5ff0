/*!
Lower level utilities shared by table construction and scanning.

Most of these are exposed only so that callers can inspect compiled tables
or implement their own table persistence. Typical use of this crate never
needs them.
*/

pub mod alphabet;
pub(crate) mod fnv;
pub mod wire;

/// A type that wraps a single byte with a convenient fmt::Debug impl that
/// escapes the byte.
pub struct DebugByte(pub u8);

impl core::fmt::Debug for DebugByte {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        // 10 bytes is enough to cover any output from ascii::escape_default.
        let mut bytes = [0u8; 10];
        let mut len = 0;
        for (i, mut b) in core::ascii::escape_default(self.0).enumerate() {
            // capitalize \xab to \xAB
            if i >= 2 && b'a' <= b && b <= b'f' {
                b -= 32;
            }
            bytes[len] = b;
            len += 1;
        }
        match core::str::from_utf8(&bytes[..len]) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "\\x{:02X}", self.0),
        }
    }
}

/// A type that wraps a byte string with a convenient fmt::Debug impl that
/// escapes every byte that isn't printable ASCII.
pub struct DebugBytes<'a>(pub &'a [u8]);

impl<'a> core::fmt::Debug for DebugBytes<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "\"")?;
        for &b in self.0.iter() {
            write!(f, "{:?}", DebugByte(b))?;
        }
        write!(f, "\"")
    }
}

/// Returns the other case variant of an ASCII letter, or the byte itself.
#[inline]
pub(crate) fn flip_case(b: u8) -> u8 {
    if b.is_ascii_lowercase() {
        b.to_ascii_uppercase()
    } else if b.is_ascii_uppercase() {
        b.to_ascii_lowercase()
    } else {
        b
    }
}
