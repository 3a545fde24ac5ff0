// Basic FNV-1a hash as described:
// https://en.wikipedia.org/wiki/Fowler%E2%80%93Noll%E2%80%93Vo_hash_function
//
// Used to fingerprint the contents of a compiled table. The fingerprint is
// checked when a table is loaded from raw bytes and it ties stream states to
// the table that opened them.

use core::hash;

const PRIME: u64 = 1099511628211;
const INIT: u64 = 14695981039346656037;

#[derive(Debug)]
pub struct Hasher(u64);

impl Default for Hasher {
    fn default() -> Hasher {
        Hasher(INIT)
    }
}

impl hash::Hasher for Hasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes.iter() {
            self.0 = self.0 ^ (*byte as u64);
            self.0 = self.0.wrapping_mul(PRIME);
        }
    }
}

/// Returns the FNV-1a hash of the given bytes.
pub fn hash(bytes: &[u8]) -> u64 {
    use core::hash::Hasher as _;

    let mut h = Hasher::default();
    h.write(bytes);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(INIT, hash(b""));
        assert_eq!(0xaf63dc4c8601ec8c, hash(b"a"));
        assert_eq!(0x85944171f73967e8, hash(b"foobar"));
    }
}
