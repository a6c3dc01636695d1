//! Keyed pseudorandom functions that drive the counter-based engine.
//!
//! A PRF here is a pure keyed permutation `domain -> range`: the same key and
//! counter always produce the same block, there is no hidden state, and
//! evaluating one counter says nothing useful about any other. That is what
//! lets an engine seek in O(1) and lets independent workers share a key
//! without coordination.
//!
//! # Design
//!
//! - State is just the key (counter and block live in the engine)
//! - Each worker can own a distinct counter range under the same key
//! - Round counts are const parameters, so reduced-round variants are
//!   separate types

mod philox;
mod threefry;

use std::fmt::Debug;

use crate::counter::Counter;

pub use philox::{Philox2x, Philox2x32, Philox2x64, Philox4x, Philox4x32, Philox4x64, PhiloxWord};
pub use threefry::{
    Threefry2x, Threefry2x32, Threefry2x64, Threefry4x, Threefry4x32, Threefry4x64, ThreefryWord,
};

/// A keyed pseudorandom function over fixed-length word sequences.
pub trait Prf: Clone + PartialEq + Debug + Default + Send + Sync + 'static {
    /// Counter type the function is evaluated on.
    type Domain: Counter;
    /// Block type the function produces.
    type Range: Counter;
    /// Key type.
    type Key: Counter;

    /// Build an instance holding `key`.
    fn with_key(key: Self::Key) -> Self;

    /// The current key.
    fn key(&self) -> Self::Key;

    /// Replace the key.
    fn set_key(&mut self, key: Self::Key);

    /// Evaluate the function on one counter.
    fn apply(&self, counter: Self::Domain) -> Self::Range;
}
