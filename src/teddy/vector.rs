// The masked filter is written once, generically over a vector type and the
// number of masks, and instantiated for every vector implementation below.
// The x86_64 entry points carry the target features their vector type
// needs, so that everything beneath them is inlined with those features
// enabled.

use core::fmt::Debug;

use super::Masks;

/// The vector operations used by the masked filter.
///
/// # Safety
///
/// All methods are unsafe since they are implemented with vendor intrinsics.
/// Callers must ensure that the target features of the implementation are
/// enabled in the calling function, and that the running CPU supports them.
/// Implementations are marked `#[inline(always)]` instead of
/// `#[target_feature]`, so that they inherit the caller's features.
pub(crate) trait Vector: Copy + Debug {
    /// The number of bytes in the vector.
    const BYTES: usize;

    /// Create a vector with the given byte in every lane.
    unsafe fn splat(byte: u8) -> Self;

    /// Read `BYTES` bytes from the given pointer, which need not be aligned.
    ///
    /// Callers must guarantee that at least `BYTES` bytes are readable from
    /// `data`.
    unsafe fn load_unaligned(data: *const u8) -> Self;

    /// Read a 16 byte lookup table from the given pointer, repeating it in
    /// every 128-bit lane.
    unsafe fn load_table(data: *const u8) -> Self;

    /// Bitwise 'and' of two vectors.
    unsafe fn and(self, vector2: Self) -> Self;

    /// Shift each 8-bit lane right by `BITS` bits.
    unsafe fn shift_8bit_lane_right<const BITS: i32>(self) -> Self;

    /// Look up each lane of `indices` in this vector, treated as one or more
    /// 16 byte tables. Every index must be less than 16.
    unsafe fn shuffle_bytes(self, indices: Self) -> Self;

    /// Returns true if every lane is zero.
    unsafe fn is_zero(self) -> bool;

    /// Write `BYTES` bytes to the given pointer, which need not be aligned.
    unsafe fn store_unaligned(self, data: *mut u8);
}

/// Runs the filter over every full vector of positions in `bytes[i..end]`,
/// calling `f` with each position with a candidate. Returns the first
/// position past the last full vector, or `None` if `f` returned false.
///
/// # Safety
///
/// Callers must ensure `V` may be used on the running CPU, and that
/// `i + 1 >= N` and `end <= bytes.len()`. Under these conditions, every load
/// is within `bytes`.
#[inline(always)]
unsafe fn filter<V: Vector, const N: usize, F: FnMut(usize, u8) -> bool>(
    masks: &Masks,
    bytes: &[u8],
    mut i: usize,
    end: usize,
    f: &mut F,
) -> Option<usize> {
    let mut lo = [V::splat(0); N];
    let mut hi = [V::splat(0); N];
    for n in 0..N {
        lo[n] = V::load_table(masks.lo[n].as_ptr());
        hi[n] = V::load_table(masks.hi[n].as_ptr());
    }
    let lomask = V::splat(0x0F);
    let ptr = bytes.as_ptr();
    let mut lanes = [0u8; 32];
    while i + V::BYTES <= end {
        let mut res = V::splat(0xFF);
        for n in 0..N {
            let chunk = V::load_unaligned(ptr.add(i - n));
            let lon = lo[n].shuffle_bytes(chunk.and(lomask));
            let hin = hi[n].shuffle_bytes(chunk.shift_8bit_lane_right::<4>());
            res = res.and(lon).and(hin);
        }
        if !res.is_zero() {
            res.store_unaligned(lanes.as_mut_ptr());
            for (k, &cand) in lanes[..V::BYTES].iter().enumerate() {
                if cand != 0 && !f(i + k, cand) {
                    return None;
                }
            }
        }
        i += V::BYTES;
    }
    Some(i)
}

/// Instantiates the filter for the mask count of the given tables.
#[inline(always)]
unsafe fn dispatch<V: Vector, F: FnMut(usize, u8) -> bool>(
    masks: &Masks,
    bytes: &[u8],
    i: usize,
    end: usize,
    f: &mut F,
) -> Option<usize> {
    match masks.count {
        1 => filter::<V, 1, F>(masks, bytes, i, end, f),
        2 => filter::<V, 2, F>(masks, bytes, i, end, f),
        3 => filter::<V, 3, F>(masks, bytes, i, end, f),
        _ => filter::<V, 4, F>(masks, bytes, i, end, f),
    }
}

/// The portable filter, usable on every target.
pub(crate) fn portable<F: FnMut(usize, u8) -> bool>(
    masks: &Masks,
    bytes: &[u8],
    i: usize,
    end: usize,
    f: &mut F,
) -> Option<usize> {
    assert!(i + 1 >= masks.count && end <= bytes.len());
    // SAFETY: The portable vector needs no target features and the bounds
    // were checked above.
    unsafe { dispatch::<Portable, F>(masks, bytes, i, end, f) }
}

/// The SSSE3 filter.
///
/// # Safety
///
/// Callers must ensure the running CPU supports SSSE3, that
/// `i + 1 >= masks.count` and that `end <= bytes.len()`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "ssse3")]
pub(crate) unsafe fn ssse3<F: FnMut(usize, u8) -> bool>(
    masks: &Masks,
    bytes: &[u8],
    i: usize,
    end: usize,
    f: &mut F,
) -> Option<usize> {
    dispatch::<core::arch::x86_64::__m128i, F>(masks, bytes, i, end, f)
}

/// The AVX2 filter.
///
/// # Safety
///
/// Callers must ensure the running CPU supports AVX2, that
/// `i + 1 >= masks.count` and that `end <= bytes.len()`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub(crate) unsafe fn avx2<F: FnMut(usize, u8) -> bool>(
    masks: &Masks,
    bytes: &[u8],
    i: usize,
    end: usize,
    f: &mut F,
) -> Option<usize> {
    dispatch::<core::arch::x86_64::__m256i, F>(masks, bytes, i, end, f)
}

/// A 128-bit vector emulated with plain byte arrays.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Portable([u8; 16]);

impl Vector for Portable {
    const BYTES: usize = 16;

    #[inline(always)]
    unsafe fn splat(byte: u8) -> Portable {
        Portable([byte; 16])
    }

    #[inline(always)]
    unsafe fn load_unaligned(data: *const u8) -> Portable {
        let mut v = [0u8; 16];
        core::ptr::copy_nonoverlapping(data, v.as_mut_ptr(), 16);
        Portable(v)
    }

    #[inline(always)]
    unsafe fn load_table(data: *const u8) -> Portable {
        Portable::load_unaligned(data)
    }

    #[inline(always)]
    unsafe fn and(self, vector2: Portable) -> Portable {
        let mut v = self.0;
        for (a, b) in v.iter_mut().zip(vector2.0.iter()) {
            *a &= *b;
        }
        Portable(v)
    }

    #[inline(always)]
    unsafe fn shift_8bit_lane_right<const BITS: i32>(self) -> Portable {
        let mut v = self.0;
        for a in v.iter_mut() {
            *a >>= BITS;
        }
        Portable(v)
    }

    #[inline(always)]
    unsafe fn shuffle_bytes(self, indices: Portable) -> Portable {
        let mut v = [0u8; 16];
        for (a, &i) in v.iter_mut().zip(indices.0.iter()) {
            // Same as PSHUFB: a set high bit yields zero.
            if i & 0x80 == 0 {
                *a = self.0[usize::from(i & 0x0F)];
            }
        }
        Portable(v)
    }

    #[inline(always)]
    unsafe fn is_zero(self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    #[inline(always)]
    unsafe fn store_unaligned(self, data: *mut u8) {
        core::ptr::copy_nonoverlapping(self.0.as_ptr(), data, 16);
    }
}

#[cfg(target_arch = "x86_64")]
mod x86_64_ssse3 {
    use core::arch::x86_64::*;

    use super::Vector;

    impl Vector for __m128i {
        const BYTES: usize = 16;

        #[inline(always)]
        unsafe fn splat(byte: u8) -> __m128i {
            _mm_set1_epi8(byte as i8)
        }

        #[inline(always)]
        unsafe fn load_unaligned(data: *const u8) -> __m128i {
            _mm_loadu_si128(data as *const __m128i)
        }

        #[inline(always)]
        unsafe fn load_table(data: *const u8) -> __m128i {
            _mm_loadu_si128(data as *const __m128i)
        }

        #[inline(always)]
        unsafe fn and(self, vector2: __m128i) -> __m128i {
            _mm_and_si128(self, vector2)
        }

        #[inline(always)]
        unsafe fn shift_8bit_lane_right<const BITS: i32>(self) -> __m128i {
            // There is no 8-bit shift, so shift 16-bit lanes and clear the
            // bits that crossed over from the neighboring byte.
            let lomask = __m128i::splat(0xFF >> BITS);
            _mm_and_si128(_mm_srli_epi16(self, BITS), lomask)
        }

        #[inline(always)]
        unsafe fn shuffle_bytes(self, indices: __m128i) -> __m128i {
            _mm_shuffle_epi8(self, indices)
        }

        #[inline(always)]
        unsafe fn is_zero(self) -> bool {
            let cmp = _mm_cmpeq_epi8(self, _mm_setzero_si128());
            _mm_movemask_epi8(cmp) == 0xFFFF
        }

        #[inline(always)]
        unsafe fn store_unaligned(self, data: *mut u8) {
            _mm_storeu_si128(data as *mut __m128i, self)
        }
    }
}

#[cfg(target_arch = "x86_64")]
mod x86_64_avx2 {
    use core::arch::x86_64::*;

    use super::Vector;

    impl Vector for __m256i {
        const BYTES: usize = 32;

        #[inline(always)]
        unsafe fn splat(byte: u8) -> __m256i {
            _mm256_set1_epi8(byte as i8)
        }

        #[inline(always)]
        unsafe fn load_unaligned(data: *const u8) -> __m256i {
            _mm256_loadu_si256(data as *const __m256i)
        }

        #[inline(always)]
        unsafe fn load_table(data: *const u8) -> __m256i {
            // VPSHUFB looks up each 128-bit half in its own table, so the
            // table goes in both.
            _mm256_broadcastsi128_si256(_mm_loadu_si128(data as *const __m128i))
        }

        #[inline(always)]
        unsafe fn and(self, vector2: __m256i) -> __m256i {
            _mm256_and_si256(self, vector2)
        }

        #[inline(always)]
        unsafe fn shift_8bit_lane_right<const BITS: i32>(self) -> __m256i {
            let lomask = __m256i::splat(0xFF >> BITS);
            _mm256_and_si256(_mm256_srli_epi16(self, BITS), lomask)
        }

        #[inline(always)]
        unsafe fn shuffle_bytes(self, indices: __m256i) -> __m256i {
            _mm256_shuffle_epi8(self, indices)
        }

        #[inline(always)]
        unsafe fn is_zero(self) -> bool {
            let cmp = _mm256_cmpeq_epi8(self, _mm256_setzero_si256());
            _mm256_movemask_epi8(cmp) == -1
        }

        #[inline(always)]
        unsafe fn store_unaligned(self, data: *mut u8) {
            _mm256_storeu_si256(data as *mut __m256i, self)
        }
    }
}
