//! Fixed-length word sequences used as PRF counters, keys and blocks.
//!
//! A [`Counter`] is `N` words of `V` bits each. The engine needs a handful
//! of bit-exact operations on these sequences:
//!
//! - packing integers, word iterators and seed sequences into a counter
//! - clearing and incrementing a window of `bits` high-order counter bits
//! - slicing a PRF output block into `w`-bit results
//! - whitespace-separated text serialization
//!
//! Packing and slicing are little-endian in words: word 0 holds the lowest
//! bits of whatever was packed. The increment window is the last `bits / V`
//! words plus the top `bits % V` bits of the word before them. Inside the
//! window the last word is the least-significant digit and carries move
//! toward word 0; the partial field is the most-significant digit.
//!
//! Results never depend on host byte order.

mod word;

pub(crate) use word::low_mask;
pub use word::Word;

use std::fmt::{self, Debug};
use std::hash::Hash;

use bytemuck::Pod;

use crate::seed::SeedSequence;
use crate::{RandomError, Result};

/// Text radix used when serializing counters and engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radix {
    /// Base 10.
    #[default]
    Decimal,
    /// Base 16, lowercase, no prefix.
    Hexadecimal,
}

impl Radix {
    /// Numeric base passed to integer parsers.
    pub fn base(self) -> u32 {
        match self {
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }
}

/// Bit-exact operations over a fixed-length sequence of unsigned words.
///
/// Implemented once for every `[W; N]` with `W: Word`. Other shapes (for
/// example a SIMD register used by a hardware PRF) can implement the
/// required methods and inherit the rest.
pub trait Counter: Pod + Eq + Hash + Debug + Send + Sync + 'static {
    /// Word type of the sequence.
    type Word: Word;

    /// Number of words.
    const LEN: usize;

    /// Total number of bits, `LEN * Word::BITS`.
    const BITS: u32 = Self::LEN as u32 * <Self::Word as Word>::BITS;

    /// Words in storage order.
    fn words(&self) -> &[Self::Word];

    /// Mutable words in storage order.
    fn words_mut(&mut self) -> &mut [Self::Word];

    /// The all-zero counter.
    fn zero() -> Self {
        Self::zeroed()
    }

    /// Element-wise equality.
    fn is_equal(&self, other: &Self) -> bool {
        self.words() == other.words()
    }

    /// Build a counter holding `value`, low word first.
    ///
    /// Fails with [`RandomError::Range`] if `value` needs more than
    /// [`Counter::BITS`] bits.
    fn from_u128(value: u128) -> Result<Self> {
        let v = <Self::Word as Word>::BITS;
        let mut ctr = Self::zero();
        let mut rest = value;
        for word in ctr.words_mut() {
            *word = Self::Word::from_u128(rest);
            rest = if v >= u128::BITS { 0 } else { rest >> v };
        }
        if rest != 0 {
            return Err(RandomError::Range {
                needed: u128::BITS - value.leading_zeros(),
                available: Self::BITS,
            });
        }
        Ok(ctr)
    }

    /// Pack words from `iter`, honoring the input word width, and leave
    /// `iter` positioned after the last input consumed.
    ///
    /// Short input is padded with zeros. Bits that do not fit, including the
    /// unused high part of a partially consumed wide input, are ignored
    /// without complaint; callers that care must inspect `iter`.
    fn from_words_partial<T, I>(iter: &mut I) -> Self
    where
        T: Word,
        I: Iterator<Item = T>,
    {
        pack_words::<Self, T, I>(iter).0
    }

    /// Pack every word of `items`, honoring the input word width.
    ///
    /// Short input is padded with zeros. Fails with
    /// [`RandomError::LeftoverInput`] if any bit of the input is left over.
    fn from_words<T, I>(items: I) -> Result<Self>
    where
        T: Word,
        I: IntoIterator<Item = T>,
    {
        let mut iter = items.into_iter();
        let (ctr, dropped) = pack_words::<Self, T, _>(&mut iter);
        if dropped || iter.any(|item| item != T::ZERO) {
            return Err(RandomError::LeftoverInput);
        }
        Ok(ctr)
    }

    /// Fill a counter from a seed sequence, 32 bits at a time, low chunk
    /// first within each word.
    ///
    /// Seed-sequence output is subject to birthday collisions; prefer
    /// explicit keys and counters whenever streams must not overlap.
    fn from_seed_seq<S>(seq: &mut S) -> Self
    where
        S: SeedSequence + ?Sized,
    {
        let chunks = <Self::Word as Word>::BITS.div_ceil(32) as usize;
        let mut raw = vec![0u32; Self::LEN * chunks];
        seq.generate(&mut raw);

        let mut ctr = Self::zero();
        for (word, chunk) in ctr.words_mut().iter_mut().zip(raw.chunks(chunks)) {
            let packed = chunk
                .iter()
                .enumerate()
                .fold(0u128, |acc, (i, &x)| acc | (u128::from(x) << (32 * i)));
            *word = Self::Word::from_u128(packed);
        }
        ctr
    }

    /// Zero the `bits`-bit window; returns `true` if any of it was set.
    fn clear_high_bits(&mut self, bits: u32) -> bool {
        let v = <Self::Word as Word>::BITS;
        let bits = bits.min(Self::BITS);
        let full = (bits / v) as usize;
        let partial = bits % v;

        let words = self.words_mut();
        let len = words.len();
        let mut dirty = false;
        for word in &mut words[len - full..] {
            dirty |= *word != Self::Word::ZERO;
            *word = Self::Word::ZERO;
        }
        if partial > 0 {
            let word = &mut words[len - full - 1];
            let keep = low_mask(v - partial);
            let value = word.to_u128();
            dirty |= value & !keep != 0;
            *word = Self::Word::from_u128(value & keep);
        }
        dirty
    }

    /// Add `n` to the `bits`-bit window, leaving every other bit untouched.
    ///
    /// Returns the incremented counter, or [`RandomError::Overflow`] if the
    /// sum does not fit in the window. `self` is never modified.
    fn increment(&self, bits: u32, n: u128) -> Result<Self> {
        let v = <Self::Word as Word>::BITS;
        let bits = bits.min(Self::BITS);
        let full = (bits / v) as usize;
        let partial = bits % v;

        let mut out = *self;
        let words = out.words_mut();
        let len = words.len();
        let mut carry = n;
        for word in words[len - full..].iter_mut().rev() {
            if carry == 0 {
                break;
            }
            let sum = word.to_u128() + (carry & low_mask(v));
            *word = Self::Word::from_u128(sum);
            carry = (carry >> v) + (sum >> v);
        }

        if carry != 0 {
            if partial == 0 {
                return Err(RandomError::Overflow { bits });
            }
            let word = &mut words[len - full - 1];
            let shift = v - partial;
            let field = (word.to_u128() >> shift)
                .checked_add(carry)
                .filter(|&field| field <= low_mask(partial))
                .ok_or(RandomError::Overflow { bits })?;
            *word = Self::Word::from_u128((word.to_u128() & low_mask(shift)) | (field << shift));
        }
        Ok(out)
    }

    /// Number of `width`-bit results one block yields.
    ///
    /// For `width <= V` each word yields `V / width` results and any
    /// remainder bits are skipped. For wider results `width` must be a
    /// multiple of `V`.
    fn results_per_block(width: u32) -> usize {
        let v = <Self::Word as Word>::BITS;
        if width == 0 {
            0
        } else if width <= v {
            Self::LEN * (v / width) as usize
        } else {
            Self::LEN / width.div_ceil(v) as usize
        }
    }

    /// The `n`-th `width`-bit result of the block.
    ///
    /// Narrow results are taken from the low end of each word upward; wide
    /// results concatenate consecutive words, low word first.
    ///
    /// # Panics
    ///
    /// Panics if `n >= Self::results_per_block(width)`.
    fn extract_at<R: Word>(&self, n: usize, width: u32) -> R {
        let v = <Self::Word as Word>::BITS;
        let words = self.words();
        if width <= v {
            let per_word = (v / width) as usize;
            let word = words[n / per_word].to_u128();
            let shift = (n % per_word) as u32 * width;
            R::from_u128((word >> shift) & low_mask(width))
        } else {
            let span = (width / v) as usize;
            let start = n * span;
            let packed = words[start..start + span]
                .iter()
                .enumerate()
                .fold(0u128, |acc, (i, w)| acc | (w.to_u128() << (i as u32 * v)));
            R::from_u128(packed & low_mask(width))
        }
    }

    /// Write the words separated by single spaces.
    fn insert(&self, out: &mut dyn fmt::Write, radix: Radix) -> fmt::Result {
        for (i, word) in self.words().iter().enumerate() {
            if i > 0 {
                out.write_char(' ')?;
            }
            match radix {
                Radix::Decimal => write!(out, "{word}")?,
                Radix::Hexadecimal => write!(out, "{word:x}")?,
            }
        }
        Ok(())
    }

    /// Read `LEN` words from a token stream.
    fn extract<'a, I>(tokens: &mut I, radix: Radix) -> Result<Self>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut ctr = Self::zero();
        for word in ctr.words_mut() {
            let token = tokens
                .next()
                .ok_or_else(|| RandomError::MalformedState("truncated word list".into()))?;
            *word = Self::Word::parse_radix(token, radix.base()).ok_or_else(|| {
                RandomError::MalformedState(format!("invalid word {token:?}"))
            })?;
        }
        Ok(ctr)
    }

    /// Serialize into a fresh string.
    fn to_text(&self, radix: Radix) -> String {
        let mut text = String::new();
        // Writing into a String cannot fail.
        let _ = self.insert(&mut text, radix);
        text
    }
}

impl<W: Word, const N: usize> Counter for [W; N] {
    type Word = W;
    const LEN: usize = N;

    #[inline]
    fn words(&self) -> &[W] {
        self
    }

    #[inline]
    fn words_mut(&mut self) -> &mut [W] {
        self
    }
}

/// Pack `iter` into a counter. The flag reports whether the high part of a
/// partially consumed wide input was non-zero.
fn pack_words<C, T, I>(iter: &mut I) -> (C, bool)
where
    C: Counter,
    T: Word,
    I: Iterator<Item = T>,
{
    let v = <C::Word as Word>::BITS;
    let t = T::BITS;
    let mut ctr = C::zero();

    if t <= v {
        let per_word = v / t;
        for word in ctr.words_mut() {
            let mut packed = 0u128;
            for k in 0..per_word {
                match iter.next() {
                    Some(item) => packed |= item.to_u128() << (k * t),
                    None => break,
                }
            }
            *word = C::Word::from_u128(packed);
        }
        (ctr, false)
    } else {
        let per_item = t / v;
        let mut pending = 0u128;
        let mut remaining = 0;
        for word in ctr.words_mut() {
            if remaining == 0 {
                pending = iter.next().map_or(0, Word::to_u128);
                remaining = per_item;
            }
            *word = C::Word::from_u128(pending);
            pending >>= v;
            remaining -= 1;
        }
        (ctr, pending != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_zero_and_equality() {
        let a = <[u32; 4]>::zero();
        assert_eq!(a, [0; 4]);
        let mut b = a;
        assert!(b.is_equal(&a));
        b[0] = 1;
        assert!(!b.is_equal(&a));
        assert!(b.is_equal(&<[u32; 4]>::from_u128(1).unwrap()));
    }

    #[test]
    fn test_from_u128_low_word_first() {
        let ctr = <[u32; 4]>::from_u128(0x0123_4567_89ab_cdef).unwrap();
        assert_eq!(ctr, [0x89ab_cdef, 0x0123_4567, 0, 0]);

        let ctr = <[u8; 16]>::from_u128(u128::MAX).unwrap();
        assert_eq!(ctr, [0xff; 16]);
    }

    #[test]
    fn test_from_u128_rejects_wide_values() {
        let err = <[u32; 1]>::from_u128(1 << 32).unwrap_err();
        assert_eq!(
            err,
            RandomError::Range {
                needed: 33,
                available: 32
            }
        );
        assert!(<[u64; 1]>::from_u128(u128::from(u64::MAX)).is_ok());
    }

    #[test]
    fn test_from_words_mixed_widths() {
        // wide input splits low half first
        let ctr = <[u32; 2]>::from_words([(1u64 << 32) | 5]).unwrap();
        assert_eq!(ctr, [5, 1]);

        // narrow input packs low slot first
        let ctr = <[u64; 1]>::from_words([1u32, 2u32]).unwrap();
        assert_eq!(ctr, [1 | (2 << 32)]);

        let ctr = <[u16; 2]>::from_words([0x12u8, 0x34, 0x56, 0x78]).unwrap();
        assert_eq!(ctr, [0x3412, 0x7856]);

        // short input pads with zeros
        let ctr = <[u32; 3]>::from_words([7u32]).unwrap();
        assert_eq!(ctr, [7, 0, 0]);
    }

    #[test]
    fn test_from_words_leftover_input() {
        assert_eq!(<[u32; 1]>::from_words([1u32, 0, 0]).unwrap(), [1]);
        assert_eq!(
            <[u32; 1]>::from_words([1u32, 0, 3]),
            Err(RandomError::LeftoverInput)
        );
        // the unused half of a wide input counts as leftover
        assert_eq!(
            <[u32; 1]>::from_words([0x1_0000_0001u64]),
            Err(RandomError::LeftoverInput)
        );
    }

    #[test]
    fn test_from_words_partial_reports_position() {
        let mut it = [1u32, 2, 3].into_iter();
        let ctr = <[u32; 2]>::from_words_partial(&mut it);
        assert_eq!(ctr, [1, 2]);
        assert_eq!(it.next(), Some(3));

        let mut it = [0x1_0000_0001u64, 9].into_iter();
        let ctr = <[u32; 1]>::from_words_partial(&mut it);
        assert_eq!(ctr, [1]);
        assert_eq!(it.next(), Some(9));
    }

    #[test]
    fn test_from_seed_seq_packing() {
        let mut seq = StepRng::new(1, 1);
        assert_eq!(<[u32; 3]>::from_seed_seq(&mut seq), [1, 2, 3]);

        let mut seq = StepRng::new(1, 1);
        assert_eq!(
            <[u64; 2]>::from_seed_seq(&mut seq),
            [1 | (2 << 32), 3 | (4 << 32)]
        );

        let mut seq = StepRng::new(0x1ff, 1);
        assert_eq!(<[u8; 2]>::from_seed_seq(&mut seq), [0xff, 0x00]);
    }

    #[test]
    fn test_increment_partial_window_layout() {
        // 40-bit window: all of word 1, top 8 bits of word 0
        let zero = <[u32; 2]>::zero();
        assert_eq!(zero.increment(40, 1).unwrap(), [0, 1]);
        assert_eq!(zero.increment(40, 1 << 32).unwrap(), [1 << 24, 0]);
        assert!(zero.increment(40, 1 << 40).is_err());
        assert!(zero.increment(40, (1 << 40) - 1).is_ok());

        // marker-sized window inside a single word
        assert_eq!(zero.increment(7, 63).unwrap(), [0, 63 << 25]);
    }

    #[test]
    fn test_increment_never_spills_into_base_bits() {
        let ctr = [0u32, u32::MAX];
        assert_eq!(ctr.increment(32, 1), Err(RandomError::Overflow { bits: 32 }));
        assert_eq!(ctr.increment(64, 1).unwrap(), [1, 0]);
    }

    #[test]
    fn test_increment_is_additive() {
        let base = <[u64; 4]>::zero();
        let steps: [u128; 5] = [1, u64::MAX as u128, 1 << 70, 12345, (1 << 100) + 7];
        let mut stepwise = base;
        let mut total = 0u128;
        for &step in &steps {
            stepwise = stepwise.increment(129, step).unwrap();
            total += step;
        }
        assert_eq!(stepwise, base.increment(129, total).unwrap());
    }

    fn check_high_bits<W: Word, const N: usize>(bits: u32) {
        let all = [W::MAX; N];

        // clearing changes something exactly once
        let mut b = all;
        assert!(b.clear_high_bits(bits));
        assert_ne!(b, all);
        assert!(!b.clear_high_bits(bits));

        // a full window cannot be incremented
        assert!(all.increment(bits, 1).is_err());
        assert!(all.increment(bits, 2).is_err());
        assert!(all.increment(bits, W::MAX.to_u128()).is_err());

        let c = b.increment(bits, 1).unwrap();
        if bits > 1 {
            let c = c.increment(bits, 1).unwrap();
            let d = b.increment(bits, 2).unwrap();
            assert_eq!(c, d);
            let mut d = d;
            assert!(d.clear_high_bits(bits));
        } else {
            assert!(c.increment(bits, 1).is_err());
            assert!(b.increment(bits, 2).is_err());
        }

        if bits < 128 {
            let mask = low_mask(bits);
            let full = b.increment(bits, mask).unwrap();
            let half = b.increment(bits, mask / 2).unwrap();
            assert_ne!(full, half);
            let remaining = mask - mask / 2;
            assert_eq!(half.increment(bits, remaining).unwrap(), full);
            assert!(full.increment(bits, 1).is_err());
            assert!(half.increment(bits, remaining + 1).is_err());
        }
    }

    #[test]
    fn test_high_bits_variety() {
        check_high_bits::<u8, 2>(1);
        check_high_bits::<u8, 2>(2);
        check_high_bits::<u8, 2>(16);
        check_high_bits::<u8, 6>(7);
        check_high_bits::<u8, 6>(8);
        check_high_bits::<u8, 6>(9);
        check_high_bits::<u8, 6>(17);
        check_high_bits::<u8, 6>(41);
        check_high_bits::<u8, 6>(48);
        check_high_bits::<u32, 1>(1);
        check_high_bits::<u32, 1>(31);
        check_high_bits::<u32, 1>(32);
        check_high_bits::<u32, 2>(33);
        check_high_bits::<u32, 2>(63);
        check_high_bits::<u32, 2>(64);
        check_high_bits::<u64, 4>(1);
        check_high_bits::<u64, 4>(65);
        check_high_bits::<u64, 4>(127);
        check_high_bits::<u64, 4>(128);
        check_high_bits::<u64, 4>(193);
        check_high_bits::<u64, 4>(256);
    }

    #[test]
    fn test_results_per_block() {
        assert_eq!(<[u32; 4]>::results_per_block(32), 4);
        assert_eq!(<[u32; 4]>::results_per_block(8), 16);
        assert_eq!(<[u32; 4]>::results_per_block(9), 12);
        assert_eq!(<[u32; 4]>::results_per_block(64), 2);
        assert_eq!(<[u64; 2]>::results_per_block(32), 4);
        assert_eq!(<[u32; 2]>::results_per_block(64), 1);
    }

    /// Compare every result against the same bits read straight out of the
    /// byte stream used to build the block.
    fn check_extract<W: Word, const N: usize, R: Word>(width: u32) {
        let byte_len = N * (W::BITS as usize) / 8;
        let bytes: Vec<u8> = (0..byte_len).map(|i| (i * 37 + 11) as u8 ^ 0x5a).collect();
        let block = <[W; N]>::from_words(bytes.iter().copied()).unwrap();
        let bit = |pos: usize| u128::from((bytes[pos / 8] >> (pos % 8)) & 1);

        let per_word = (W::BITS / width) as usize;
        for n in 0..<[W; N]>::results_per_block(width) {
            let start = if per_word > 0 {
                (n / per_word) * W::BITS as usize + (n % per_word) * width as usize
            } else {
                n * width as usize
            };
            let expected = (0..width as usize).fold(0u128, |acc, j| acc | (bit(start + j) << j));
            let got: R = block.extract_at(n, width);
            assert_eq!(got.to_u128(), expected, "result {n} of width {width}");
        }
    }

    #[test]
    fn test_extract_at_variety() {
        check_extract::<u32, 1, u32>(9);
        check_extract::<u32, 3, u32>(9);
        check_extract::<u32, 4, u32>(9);
        check_extract::<u32, 4, u32>(32);
        check_extract::<u32, 4, u64>(32);
        check_extract::<u64, 4, u32>(32);
        check_extract::<u64, 4, u64>(32);
        check_extract::<u32, 4, u64>(64);
        check_extract::<u64, 4, u64>(64);
        check_extract::<u32, 2, u64>(64);
        check_extract::<u64, 2, u16>(16);
        check_extract::<u8, 16, u64>(64);
    }

    #[test]
    fn test_extract_at_fixed_block() {
        let block = [0x1122_3344u32, 0x5566_7788];
        assert_eq!(block.extract_at::<u8>(0, 8), 0x44);
        assert_eq!(block.extract_at::<u8>(3, 8), 0x11);
        assert_eq!(block.extract_at::<u8>(4, 8), 0x88);
        assert_eq!(block.extract_at::<u32>(1, 32), 0x5566_7788);
        assert_eq!(block.extract_at::<u64>(0, 64), 0x5566_7788_1122_3344);
    }

    #[test]
    fn test_insert_extract_round_trip() {
        let ctr: [u64; 4] = [0, 99, u64::MAX, 0x0123_4567_89ab_cdef];
        for radix in [Radix::Decimal, Radix::Hexadecimal] {
            let text = ctr.to_text(radix);
            let back = <[u64; 4]>::extract(&mut text.split_whitespace(), radix).unwrap();
            assert_eq!(back, ctr);
        }
        assert_eq!([1u32, 255].to_text(Radix::Hexadecimal), "1 ff");
        assert_eq!([1u32, 255].to_text(Radix::Decimal), "1 255");
    }

    #[test]
    fn test_extract_rejects_bad_tokens() {
        let mut short = "1 2".split_whitespace();
        assert!(<[u32; 3]>::extract(&mut short, Radix::Decimal).is_err());
        let mut wide = "256".split_whitespace();
        assert!(<[u8; 1]>::extract(&mut wide, Radix::Decimal).is_err());
        let mut junk = "12x".split_whitespace();
        assert!(<[u32; 1]>::extract(&mut junk, Radix::Decimal).is_err());
    }
}
