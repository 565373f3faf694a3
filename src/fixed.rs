//! Fixed point helpers
//!
//! Hardware values are scaled integers; every narrowing shift adds half a
//! unit first so that truncation rounds to nearest.

/// `v >> n`, rounded to nearest.
#[inline]
pub fn round_shift(v: u64, n: u32) -> u64 {
    if n == 0 {
        v
    } else {
        (v + (1 << (n - 1))) >> n
    }
}

/// `a / b`, rounded to nearest.
#[inline]
pub fn round_div(a: u64, b: u64) -> u64 {
    (a + b / 2) / b
}

/// `v >> n`, rounded up.
#[inline]
pub fn ceil_shift(v: u64, n: u32) -> u64 {
    (v + (1 << n) - 1) >> n
}
