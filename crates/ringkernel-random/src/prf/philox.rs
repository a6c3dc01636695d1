//! Philox keyed permutations.
//!
//! Philox was introduced in "Parallel Random Numbers: As Easy as 1, 2, 3"
//! by Salmon et al. (2011). Each round multiplies half of the words by a
//! fixed odd constant, XORs the high halves of the products into the other
//! words together with the round key, and bumps the round key by a Weyl
//! constant.
//!
//! Key properties:
//! - Uses only integer multiply, XOR and add, no tables or branches
//! - 10 rounds pass BigCrush with a wide safety margin; 7 is the minimum
//!   "Crush-resistant" count
//! - Reproducible: the same key and counter always give the same block

use super::Prf;
use crate::counter::Word;

/// Word types Philox is defined for, with their round constants.
pub trait PhiloxWord: Word {
    /// Multiplier for the two-word variant.
    const MUL_2: Self;
    /// Multipliers for the four-word variant.
    const MUL_4: [Self; 2];
    /// Weyl key-schedule increments.
    const WEYL: [Self; 2];
}

impl PhiloxWord for u32 {
    const MUL_2: u32 = 0xD256_D193;
    const MUL_4: [u32; 2] = [0xD251_1F53, 0xCD9E_8D57];
    const WEYL: [u32; 2] = [0x9E37_79B9, 0xBB67_AE85];
}

impl PhiloxWord for u64 {
    const MUL_2: u64 = 0xD2B7_4407_B1CE_6E93;
    const MUL_4: [u64; 2] = [0xD2E7_470E_E14C_6C93, 0xCA5A_8263_9512_1157];
    const WEYL: [u64; 2] = [0x9E37_79B9_7F4A_7C15, 0xBB67_AE85_84CA_A73B];
}

/// Philox over two words with a one-word key, `R` rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Philox2x<W: PhiloxWord, const R: usize = 10> {
    key: [W; 1],
}

/// Philox over four words with a two-word key, `R` rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Philox4x<W: PhiloxWord, const R: usize = 10> {
    key: [W; 2],
}

/// Philox2x32-10.
pub type Philox2x32 = Philox2x<u32>;
/// Philox2x64-10.
pub type Philox2x64 = Philox2x<u64>;
/// Philox4x32-10.
pub type Philox4x32 = Philox4x<u32>;
/// Philox4x64-10.
pub type Philox4x64 = Philox4x<u64>;

/// Single two-word round.
#[inline]
fn round2<W: PhiloxWord>(ctr: [W; 2], key: W) -> [W; 2] {
    let (hi, lo) = W::MUL_2.mulhilo(ctr[0]);
    [hi ^ key ^ ctr[1], lo]
}

/// Single four-word round.
#[inline]
fn round4<W: PhiloxWord>(ctr: [W; 4], key: [W; 2]) -> [W; 4] {
    let (hi0, lo0) = W::MUL_4[0].mulhilo(ctr[0]);
    let (hi1, lo1) = W::MUL_4[1].mulhilo(ctr[2]);
    [hi1 ^ ctr[1] ^ key[0], lo1, hi0 ^ ctr[3] ^ key[1], lo0]
}

impl<W: PhiloxWord, const R: usize> Prf for Philox2x<W, R> {
    type Domain = [W; 2];
    type Range = [W; 2];
    type Key = [W; 1];

    fn with_key(key: [W; 1]) -> Self {
        Self { key }
    }

    fn key(&self) -> [W; 1] {
        self.key
    }

    fn set_key(&mut self, key: [W; 1]) {
        self.key = key;
    }

    fn apply(&self, counter: [W; 2]) -> [W; 2] {
        let mut ctr = counter;
        let mut key = self.key[0];
        for _ in 0..R {
            ctr = round2(ctr, key);
            key = key.wrapping_add(W::WEYL[0]);
        }
        ctr
    }
}

impl<W: PhiloxWord, const R: usize> Prf for Philox4x<W, R> {
    type Domain = [W; 4];
    type Range = [W; 4];
    type Key = [W; 2];

    fn with_key(key: [W; 2]) -> Self {
        Self { key }
    }

    fn key(&self) -> [W; 2] {
        self.key
    }

    fn set_key(&mut self, key: [W; 2]) {
        self.key = key;
    }

    fn apply(&self, counter: [W; 4]) -> [W; 4] {
        let mut ctr = counter;
        let mut key = self.key;
        for _ in 0..R {
            ctr = round4(ctr, key);
            key[0] = key[0].wrapping_add(W::WEYL[0]);
            key[1] = key[1].wrapping_add(W::WEYL[1]);
        }
        ctr
    }
}
