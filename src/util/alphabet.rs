use crate::util::{
    wire::{DeserializeError, SerializeError},
    DebugByte,
};

/// A representation of byte oriented equivalence classes.
///
/// The packed variant of the hash scheme indexes its reach table by a pair
/// of classes instead of a pair of raw bytes. Every byte that occurs in some
/// literal gets a class of its own, while runs of bytes that never occur are
/// collapsed into a single class. For sparse literal alphabets this shrinks
/// the reach table considerably.
#[derive(Clone, Copy)]
pub struct ByteClasses([u8; 256]);

impl ByteClasses {
    /// Creates a new set of equivalence classes where all bytes are mapped to
    /// the same class.
    pub fn empty() -> ByteClasses {
        ByteClasses([0; 256])
    }

    /// Deserializes a byte class map from the given slice. If the slice is of
    /// insufficient length or otherwise contains an impossible mapping, then
    /// an error is returned. Upon success, the number of bytes read along with
    /// the map are returned. The number of bytes read is always a multiple of
    /// 8.
    pub fn from_bytes(
        slice: &[u8],
    ) -> Result<(ByteClasses, usize), DeserializeError> {
        if slice.len() < 256 {
            return Err(DeserializeError::buffer_too_small("byte class map"));
        }
        let mut classes = ByteClasses::empty();
        for (b, &class) in slice[..256].iter().enumerate() {
            classes.set(b as u8, class);
        }
        // Classes are assigned in ascending byte order without gaps, so
        // every class must be at most one greater than its predecessor.
        let mut prev = 0u8;
        for b in 0..=255u8 {
            let class = classes.get(b);
            if class < prev || class - prev > 1 || (b == 0 && class != 0) {
                return Err(DeserializeError::generic(
                    "found byte class map with non-contiguous classes",
                ));
            }
            prev = class;
        }
        Ok((classes, 256))
    }

    /// Writes this byte class map to the given byte buffer. if the given
    /// buffer is too small, then an error is returned. Upon success, the total
    /// number of bytes written is returned. The number of bytes written is
    /// guaranteed to be a multiple of 8.
    pub fn write_to(&self, dst: &mut [u8]) -> Result<usize, SerializeError> {
        let nwrite = self.write_to_len();
        if dst.len() < nwrite {
            return Err(SerializeError::buffer_too_small("byte class map"));
        }
        dst[..nwrite].copy_from_slice(&self.0);
        Ok(nwrite)
    }

    /// Returns the total number of bytes written by `write_to`.
    pub fn write_to_len(&self) -> usize {
        256
    }

    /// Set the equivalence class for the given byte.
    #[inline]
    pub fn set(&mut self, byte: u8, class: u8) {
        self.0[byte as usize] = class;
    }

    /// Get the equivalence class for the given byte.
    #[inline]
    pub fn get(&self, byte: u8) -> u8 {
        self.0[byte as usize]
    }

    /// Return the total number of equivalence classes.
    #[inline]
    pub fn alphabet_len(&self) -> usize {
        self.0[255] as usize + 1
    }

    /// Returns true if and only if every byte in this class maps to its own
    /// equivalence class. Equivalently, there are 256 equivalence classes.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.alphabet_len() == 256
    }

    /// Returns an iterator over all of the bytes in the given class.
    pub fn elements(&self, class: u8) -> ByteClassElements<'_> {
        ByteClassElements { classes: self, class, byte: 0 }
    }
}

impl core::fmt::Debug for ByteClasses {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.is_singleton() {
            write!(f, "ByteClasses({{singletons}})")
        } else {
            write!(f, "ByteClasses(")?;
            for class in 0..self.alphabet_len() {
                let mut elements = self.elements(class as u8);
                let (start, mut end) = match elements.next() {
                    None => continue,
                    Some(b) => (b, b),
                };
                for b in elements {
                    end = b;
                }
                if class > 0 {
                    write!(f, ", ")?;
                }
                if start == end {
                    write!(f, "{} => [{:?}]", class, DebugByte(start))?;
                } else {
                    write!(
                        f,
                        "{} => [{:?}-{:?}]",
                        class,
                        DebugByte(start),
                        DebugByte(end),
                    )?;
                }
            }
            write!(f, ")")
        }
    }
}

/// An iterator over all elements in a specific equivalence class.
///
/// The lifetime `'a` refers to the lifetime of the byte classes that this
/// iterator was created from.
#[derive(Debug)]
pub struct ByteClassElements<'a> {
    classes: &'a ByteClasses,
    class: u8,
    byte: usize,
}

impl<'a> Iterator for ByteClassElements<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.byte < 256 {
            let byte = self.byte as u8;
            self.byte += 1;
            if self.class == self.classes.get(byte) {
                return Some(byte);
            }
        }
        None
    }
}

/// A byte class set keeps track of an *approximation* of equivalence classes
/// of bytes during table construction.
///
/// A class boundary is recorded after `end` and before `start` of every range
/// added. Bytes that are never separated by a boundary end up in the same
/// class. Since only contiguous bytes can share a class, the result is not
/// necessarily minimal, but every range added is guaranteed to be exactly a
/// union of classes.
#[derive(Clone, Debug)]
pub struct ByteClassSet(ByteSet);

impl ByteClassSet {
    /// Create a new set of byte classes where all bytes are part of the same
    /// equivalence class.
    pub fn empty() -> Self {
        ByteClassSet(ByteSet::empty())
    }

    /// Indicate the the range of byte given (inclusive) can discriminate a
    /// match between it and all other bytes outside of the range.
    pub fn set_range(&mut self, start: u8, end: u8) {
        debug_assert!(start <= end);
        if start > 0 {
            self.0.add(start - 1);
        }
        self.0.add(end);
    }

    /// Convert this boolean set to a map that maps all byte values to their
    /// corresponding equivalence class. The last mapping indicates the largest
    /// equivalence class identifier (which is never bigger than 255).
    pub fn byte_classes(&self) -> ByteClasses {
        let mut classes = ByteClasses::empty();
        let mut class = 0u8;
        for b in 0..=255u8 {
            classes.set(b, class);
            // A boundary after 255 would make a 257th class, which can't
            // exist, so it is ignored.
            if b < 255 && self.0.contains(b) {
                class += 1;
            }
        }
        classes
    }
}

/// A simple set of bytes that is reasonably cheap to copy and allocation free.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ByteSet {
    bits: BitSet,
}

/// The representation of a byte set. Split out so that we can define a
/// convenient Debug impl for it while keeping "ByteSet" in the output.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
struct BitSet([u128; 2]);

impl ByteSet {
    /// Create an empty set of bytes.
    pub fn empty() -> ByteSet {
        ByteSet { bits: BitSet([0; 2]) }
    }

    /// Add a byte to this set.
    ///
    /// If the given byte already belongs to this set, then this is a no-op.
    pub fn add(&mut self, byte: u8) {
        let bucket = byte / 128;
        let bit = byte % 128;
        self.bits.0[bucket as usize] |= 1 << bit;
    }

    /// Return true if and only if the given byte is in this set.
    pub fn contains(&self, byte: u8) -> bool {
        let bucket = byte / 128;
        let bit = byte % 128;
        self.bits.0[bucket as usize] & (1 << bit) > 0
    }

    /// Returns an iterator over all bytes in this set.
    pub fn iter(&self) -> ByteSetIter<'_> {
        ByteSetIter { set: self, b: 0 }
    }

    /// Return the number of bytes in this set.
    pub fn len(&self) -> usize {
        (self.bits.0[0].count_ones() + self.bits.0[1].count_ones()) as usize
    }

    /// Return true if and only if this set is empty.
    pub fn is_empty(&self) -> bool {
        self.bits.0 == [0, 0]
    }
}

impl core::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut fmtd = f.debug_set();
        for b in 0..=255u8 {
            if (ByteSet { bits: *self }).contains(b) {
                fmtd.entry(&DebugByte(b));
            }
        }
        fmtd.finish()
    }
}

#[derive(Debug)]
pub struct ByteSetIter<'a> {
    set: &'a ByteSet,
    b: usize,
}

impl<'a> Iterator for ByteSetIter<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.b <= 255 {
            let b = self.b as u8;
            self.b += 1;
            if self.set.contains(b) {
                return Some(b);
            }
        }
        None
    }
}
