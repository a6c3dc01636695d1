//! Unsigned machine words that counters, keys and blocks are built from.

use std::fmt::{Debug, Display, LowerHex};
use std::hash::Hash;
use std::ops::BitXor;

use bytemuck::Pod;

/// A fixed-width unsigned integer usable as a counter, key or block word.
///
/// Every implementation has a double-width counterpart that fits in `u128`,
/// so wide multiplication and cross-width packing can be written once in
/// terms of `u128` arithmetic.
pub trait Word:
    Pod
    + Default
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + LowerHex
    + BitXor<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Number of bits in the word.
    const BITS: u32;
    /// The zero word.
    const ZERO: Self;
    /// The all-ones word.
    const MAX: Self;

    /// Widen to `u128` without loss.
    fn to_u128(self) -> u128;

    /// Truncate a `u128` to the low `BITS` bits.
    fn from_u128(value: u128) -> Self;

    /// Addition modulo `2^BITS`.
    fn wrapping_add(self, rhs: Self) -> Self;

    /// Rotate left by `n` bits.
    fn rotate_left(self, n: u32) -> Self;

    /// Parse an unsigned integer in the given radix, rejecting values that
    /// do not fit in the word.
    fn parse_radix(text: &str, radix: u32) -> Option<Self>;

    /// Full-width product, returned as `(hi, lo)` halves.
    #[inline]
    fn mulhilo(self, rhs: Self) -> (Self, Self) {
        let product = self.to_u128() * rhs.to_u128();
        (Self::from_u128(product >> Self::BITS), Self::from_u128(product))
    }
}

/// Mask covering the low `bits` bits of a `u128`.
#[inline]
pub(crate) fn low_mask(bits: u32) -> u128 {
    if bits >= u128::BITS {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

macro_rules! impl_word {
    ($($t:ty),* $(,)?) => {
        $(
            impl Word for $t {
                const BITS: u32 = <$t>::BITS;
                const ZERO: Self = 0;
                const MAX: Self = <$t>::MAX;

                #[inline]
                fn to_u128(self) -> u128 {
                    self as u128
                }

                #[inline]
                fn from_u128(value: u128) -> Self {
                    value as $t
                }

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$t>::wrapping_add(self, rhs)
                }

                #[inline]
                fn rotate_left(self, n: u32) -> Self {
                    <$t>::rotate_left(self, n)
                }

                fn parse_radix(text: &str, radix: u32) -> Option<Self> {
                    // `from_str_radix` also takes a leading '+'
                    if text.starts_with('+') {
                        return None;
                    }
                    <$t>::from_str_radix(text, radix).ok()
                }
            }
        )*
    };
}

impl_word!(u8, u16, u32, u64);
