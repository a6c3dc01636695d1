//! Threefry keyed permutations.
//!
//! Threefry is the add-rotate-XOR core of the Threefish block cipher with
//! the tweak removed. Every round mixes word pairs; every fourth round
//! injects the extended key schedule (the key words plus a parity word).

use super::Prf;
use crate::counter::Word;

/// Word types Threefry is defined for, with their rotation tables.
pub trait ThreefryWord: Word {
    /// Key-schedule parity constant.
    const PARITY: Self;
    /// Rotations for the two-word variant, indexed by `round % 8`.
    const ROT_2: [u32; 8];
    /// Rotations for the four-word variant, one table per lane pair.
    const ROT_4: [[u32; 8]; 2];
}

impl ThreefryWord for u32 {
    const PARITY: u32 = 0x1BD1_1BDA;
    const ROT_2: [u32; 8] = [13, 15, 26, 6, 17, 29, 16, 24];
    const ROT_4: [[u32; 8]; 2] = [
        [10, 11, 13, 23, 6, 17, 25, 18],
        [26, 21, 27, 5, 20, 11, 10, 20],
    ];
}

impl ThreefryWord for u64 {
    const PARITY: u64 = 0x1BD1_1BDA_A9FC_1A22;
    const ROT_2: [u32; 8] = [16, 42, 12, 31, 16, 32, 24, 21];
    const ROT_4: [[u32; 8]; 2] = [
        [14, 52, 23, 5, 25, 46, 58, 32],
        [16, 57, 40, 37, 33, 12, 22, 32],
    ];
}

/// Threefry over two words with a two-word key, `R` rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Threefry2x<W: ThreefryWord, const R: usize = 20> {
    key: [W; 2],
}

/// Threefry over four words with a four-word key, `R` rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Threefry4x<W: ThreefryWord, const R: usize = 20> {
    key: [W; 4],
}

/// Threefry2x32-20.
pub type Threefry2x32 = Threefry2x<u32>;
/// Threefry2x64-20.
pub type Threefry2x64 = Threefry2x<u64>;
/// Threefry4x32-20.
pub type Threefry4x32 = Threefry4x<u32>;
/// Threefry4x64-20.
pub type Threefry4x64 = Threefry4x<u64>;

#[inline]
fn mix<W: ThreefryWord>(x: &mut [W], a: usize, b: usize, rot: u32) {
    x[a] = x[a].wrapping_add(x[b]);
    x[b] = x[b].rotate_left(rot) ^ x[a];
}

impl<W: ThreefryWord, const R: usize> Prf for Threefry2x<W, R> {
    type Domain = [W; 2];
    type Range = [W; 2];
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

    fn apply(&self, counter: [W; 2]) -> [W; 2] {
        let [k0, k1] = self.key;
        let ks = [k0, k1, W::PARITY ^ k0 ^ k1];

        let mut x = [counter[0].wrapping_add(ks[0]), counter[1].wrapping_add(ks[1])];
        for r in 0..R {
            mix(&mut x, 0, 1, W::ROT_2[r % 8]);
            if r % 4 == 3 {
                let r4 = (r + 1) / 4;
                x[0] = x[0].wrapping_add(ks[r4 % 3]);
                x[1] = x[1]
                    .wrapping_add(ks[(r4 + 1) % 3])
                    .wrapping_add(W::from_u128(r4 as u128));
            }
        }
        x
    }
}

impl<W: ThreefryWord, const R: usize> Prf for Threefry4x<W, R> {
    type Domain = [W; 4];
    type Range = [W; 4];
    type Key = [W; 4];

    fn with_key(key: [W; 4]) -> Self {
        Self { key }
    }

    fn key(&self) -> [W; 4] {
        self.key
    }

    fn set_key(&mut self, key: [W; 4]) {
        self.key = key;
    }

    fn apply(&self, counter: [W; 4]) -> [W; 4] {
        let k = self.key;
        let ks = [k[0], k[1], k[2], k[3], W::PARITY ^ k[0] ^ k[1] ^ k[2] ^ k[3]];

        let mut x = counter;
        for (word, key) in x.iter_mut().zip(ks) {
            *word = word.wrapping_add(key);
        }

        let [rot0, rot1] = W::ROT_4;
        for r in 0..R {
            // lane pairing alternates with round parity
            if r % 2 == 0 {
                mix(&mut x, 0, 1, rot0[r % 8]);
                mix(&mut x, 2, 3, rot1[r % 8]);
            } else {
                mix(&mut x, 0, 3, rot0[r % 8]);
                mix(&mut x, 2, 1, rot1[r % 8]);
            }
            if r % 4 == 3 {
                let r4 = (r + 1) / 4;
                for (i, word) in x.iter_mut().enumerate() {
                    *word = word.wrapping_add(ks[(r4 + i) % 5]);
                }
                x[3] = x[3].wrapping_add(W::from_u128(r4 as u128));
            }
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threefry2x32_zero_vector() {
        assert_eq!(
            Threefry2x32::default().apply([0, 0]),
            [0x6b20_0159, 0x99ba_4efe]
        );
    }

    #[test]
    fn test_threefry4x64_all_ones_vector() {
        let prf = Threefry4x64::with_key([u64::MAX; 4]);
        assert_eq!(
            prf.apply([u64::MAX; 4]),
            [
                0x29c2_4097_942b_ba1b,
                0x0371_bbfb_0f6f_4e11,
                0x3c23_1ffa_33f8_3a1c,
                0xcd29_113f_de32_d168
            ]
        );
    }

    #[test]
    fn test_threefry_zero_rounds_adds_key() {
        let prf = Threefry2x::<u32, 0>::with_key([1, 2]);
        assert_eq!(prf.apply([10, 20]), [11, 22]);

        let prf = Threefry4x::<u64, 0>::with_key([1, 2, 3, 4]);
        assert_eq!(prf.apply([0, 0, 0, u64::MAX]), [1, 2, 3, 3]);
    }

    #[test]
    fn test_threefry_round_count_matters() {
        let full = Threefry4x32::with_key([1, 2, 3, 4]);
        let reduced = Threefry4x::<u32, 13>::with_key([1, 2, 3, 4]);
        assert_ne!(full.apply([5, 6, 7, 8]), reduced.apply([5, 6, 7, 8]));
    }

    #[test]
    fn test_threefry_key_sensitivity() {
        let a = Threefry2x64::with_key([0, 0]);
        let b = Threefry2x64::with_key([0, 1 << 63]);
        assert_ne!(a.apply([0, 0]), b.apply([0, 0]));
    }

    #[test]
    fn test_threefry_set_key() {
        let mut prf = Threefry2x64::default();
        prf.set_key([0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89]);
        assert_eq!(prf.key(), [0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89]);
        assert_eq!(
            prf.apply([0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344]),
            [0x263c_7d30_bb0f_0af1, 0x56be_8361_d331_1526]
        );
    }
}
