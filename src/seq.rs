//! Modular comparison helpers for sequence-number arithmetic.
//!
//! The meta data-sequence number space is a 64-bit value in this crate
//! (§3's DSN), but the same wraparound-safe comparisons the teacher uses
//! for 32-bit subflow sequence numbers
//! (`elvis_core::protocols::tcp::tcb::modular_cmp`) apply verbatim; the
//! generic forms below are used for both `u32` subflow sequence numbers
//! and `u64` DSNs.

use std::ops::{Add, Sub};

pub trait Wrapping: Copy + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Ord {
    const HALF: Self;
    const ONE: Self;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
}

impl Wrapping for u32 {
    const HALF: Self = u32::MAX / 2;
    const ONE: Self = 1;
    fn wrapping_add(self, rhs: Self) -> Self {
        u32::wrapping_add(self, rhs)
    }
    fn wrapping_sub(self, rhs: Self) -> Self {
        u32::wrapping_sub(self, rhs)
    }
}

impl Wrapping for u64 {
    const HALF: Self = u64::MAX / 2;
    const ONE: Self = 1;
    fn wrapping_add(self, rhs: Self) -> Self {
        u64::wrapping_add(self, rhs)
    }
    fn wrapping_sub(self, rhs: Self) -> Self {
        u64::wrapping_sub(self, rhs)
    }
}

/// `a < b` under modular arithmetic.
pub fn mod_le<T: Wrapping>(a: T, b: T) -> bool {
    let k = b.wrapping_add(T::HALF);
    (a < b) ^ (a < k) ^ (b < k)
}

/// `a <= b` under modular arithmetic.
pub fn mod_leq<T: Wrapping>(a: T, b: T) -> bool {
    mod_le(a, b.wrapping_add(T::ONE))
}

/// `a > b` under modular arithmetic.
pub fn mod_gt<T: Wrapping>(a: T, b: T) -> bool {
    mod_le(b, a)
}

/// `a >= b` under modular arithmetic.
pub fn mod_geq<T: Wrapping>(a: T, b: T) -> bool {
    mod_le(b.wrapping_sub(T::ONE), a)
}

/// Is `b` strictly between `a` and `c`, accounting for wraparound?
pub fn mod_bounded<T: Wrapping>(a: T, b: T, c: T) -> bool {
    let j = a < b && b < c && a < c;
    let k = a < b && b > c && a > c;
    let l = a > b && b < c && a > c;
    j || k || l
}
