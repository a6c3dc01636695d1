//! Seed sequences.
//!
//! A seed sequence fills a buffer of 32-bit values from some seed material.
//! Engines and counters accept one so that generic code written against a
//! "seedable by sequence" contract can construct them. Prefer explicit keys:
//! sequence output is subject to birthday collisions across many engines.

use rand_core::RngCore;

/// Source of 32-bit seed material.
pub trait SeedSequence {
    /// Overwrite every element of `dest`.
    fn generate(&mut self, dest: &mut [u32]);
}

impl<R: RngCore + ?Sized> SeedSequence for R {
    fn generate(&mut self, dest: &mut [u32]) {
        for value in dest {
            *value = self.next_u32();
        }
    }
}
