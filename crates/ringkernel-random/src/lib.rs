//! Counter-based random number engines for parallel simulation.
//!
//! This crate turns a keyed pseudorandom function (Philox or Threefry) into a
//! uniform random number engine whose whole state is a key, a counter and a
//! cursor. Seeking is O(1), copies are cheap, and any number of workers can
//! draw independent, reproducible streams from one key by giving each its own
//! base counter.
//!
//! # Features
//!
//! - **Counters**: bit-exact windowed increment, cross-width packing and
//!   result extraction over `[W; N]` for `u8`, `u16`, `u32` and `u64` words
//! - **PRFs**: Philox 2x/4x and Threefry 2x/4x over 32- and 64-bit words,
//!   with configurable round counts
//! - **Engine**: draw, discard, restart, fork, text serialization and a
//!   `rand_core::RngCore` implementation
//! - **GPU Compatibility**: counters and keys are plain `Pod` arrays
//!
//! # Example
//!
//! ```
//! use ringkernel_random::prelude::*;
//!
//! // One key, one substream per work item.
//! let rng = Philox4x32Engine::new([0xdead_beef, 42])?;
//! let mut item = rng.fork([7, 0, 0, 0])?;
//!
//! let value: u32 = item.try_next()?;
//! item.discard(1_000_000)?;
//!
//! // Checkpoint and resume.
//! let saved = item.to_string();
//! let mut resumed: Philox4x32Engine = saved.parse()?;
//! assert_eq!(resumed.try_next()?, item.try_next()?);
//! # let _ = value;
//! # Ok::<(), RandomError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counter;
pub mod engine;
pub mod prf;
pub mod seed;

/// Error types for counter and engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RandomError {
    /// An integer does not fit in the counter it is packed into.
    #[error("value needs {needed} bits but the counter holds {available}")]
    Range {
        /// Bits the value needs.
        needed: u32,
        /// Bits the counter holds.
        available: u32,
    },
    /// Non-zero input bits were left over after filling a counter.
    #[error("non-zero input left over after filling the counter")]
    LeftoverInput,
    /// A counter increment carried out of its window.
    #[error("increment overflows the {bits}-bit counter window")]
    Overflow {
        /// Width of the window.
        bits: u32,
    },
    /// A key has bits set in the engine-reserved region.
    #[error("key sets bits in the {reserved_bits} reserved high bits")]
    KeyRange {
        /// Number of reserved high key bits.
        reserved_bits: u32,
    },
    /// A base counter overlaps the engine-managed counter window.
    #[error("base counter sets bits in the {counter_bits}-bit counter window")]
    BaseRange {
        /// Width of the counter window.
        counter_bits: u32,
    },
    /// Every value of the counter window has been used.
    #[error("counter space exhausted: the {counter_bits}-bit counter window is used up")]
    CounterSpaceExhausted {
        /// Width of the counter window.
        counter_bits: u32,
    },
    /// Serialized engine state could not be parsed.
    #[error("malformed engine state: {0}")]
    MalformedState(String),
}

/// Result type for counter and engine operations.
pub type Result<T> = std::result::Result<T, RandomError>;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::counter::{Counter, Radix, Word};
    pub use crate::engine::{
        CounterBasedEngine, Philox2x32Engine, Philox2x64Engine, Philox4x32Engine,
        Philox4x64Engine, Threefry2x32Engine, Threefry2x64Engine, Threefry4x32Engine,
        Threefry4x64Engine,
    };
    pub use crate::prf::{
        Philox2x, Philox2x32, Philox2x64, Philox4x, Philox4x32, Philox4x64, Prf, Threefry2x,
        Threefry2x32, Threefry2x64, Threefry4x, Threefry4x32, Threefry4x64,
    };
    pub use crate::seed::SeedSequence;
    pub use crate::{RandomError, Result};
}

// Re-exports
pub use counter::{Counter, Radix, Word};
pub use engine::{
    CounterBasedEngine, Philox2x32Engine, Philox2x64Engine, Philox4x32Engine, Philox4x64Engine,
    Threefry2x32Engine, Threefry2x64Engine, Threefry4x32Engine, Threefry4x64Engine,
};
pub use prf::Prf;
pub use seed::SeedSequence;
