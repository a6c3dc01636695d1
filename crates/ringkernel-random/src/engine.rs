//! The counter-based engine: a PRF plus a counter becomes a uniform RNG.
//!
//! The engine state is a key (held by the PRF), a counter, a cached output
//! block and a cursor into that block. Drawing consumes the block one
//! `WIDTH`-bit result at a time; when it runs out the low `CTR_BITS` bits of
//! the counter are incremented and the PRF is evaluated again. Everything
//! above those low bits is a caller-chosen base, so distinct bases under one
//! key give independent substreams with no coordination.
//!
//! The top `log2(domain bits)` bits of the last key word are reserved. The
//! engine stores `CTR_BITS - 1` there, so engines that differ only in
//! `CTR_BITS` never share a stream.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use rand_core::RngCore;
use tracing::{debug, trace};

use crate::counter::{low_mask, Counter, Radix, Word};
use crate::prf::{
    Philox2x32, Philox2x64, Philox4x32, Philox4x64, Prf, Threefry2x32, Threefry2x64, Threefry4x32,
    Threefry4x64,
};
use crate::seed::SeedSequence;
use crate::{RandomError, Result};

/// Uniform random-number engine over the PRF `P`.
///
/// - `W`: result type
/// - `CTR_BITS`: number of low counter bits the engine increments
/// - `WIDTH`: bits per result, at most `W::BITS`
///
/// Invalid parameter combinations fail to compile as soon as a constructor
/// is instantiated.
///
/// The first draw evaluates the PRF at base + 1, never at the base itself.
/// A window of `CTR_BITS` bits therefore supplies
/// `results_per_counter() * (2^CTR_BITS - 1)` results before
/// [`RandomError::CounterSpaceExhausted`].
///
/// # Example
///
/// ```
/// use ringkernel_random::Philox4x32Engine;
///
/// let mut rng = Philox4x32Engine::new([0x1234, 0x5678])?;
/// let first = rng.try_next()?;
///
/// let mut replay = Philox4x32Engine::new([0x1234, 0x5678])?;
/// assert_eq!(replay.try_next()?, first);
/// # Ok::<(), ringkernel_random::RandomError>(())
/// ```
#[derive(Clone, Debug)]
pub struct CounterBasedEngine<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> {
    prf: P,
    counter: P::Domain,
    block: P::Range,
    cursor: usize,
    _result: PhantomData<W>,
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32>
    CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    const DOMAIN_BITS: u32 = <P::Domain as Counter>::BITS;
    const KEY_BITS: u32 = <P::Key as Counter>::BITS;
    const BLOCK_WORD_BITS: u32 = <<P::Range as Counter>::Word as Word>::BITS;

    /// Reserved high bits of the key.
    const MARKER_BITS: u32 = Self::DOMAIN_BITS.ilog2();

    /// Results per PRF block.
    const RESULTS: usize = if WIDTH == 0 {
        0
    } else if WIDTH <= Self::BLOCK_WORD_BITS {
        <P::Range as Counter>::LEN * (Self::BLOCK_WORD_BITS / WIDTH) as usize
    } else {
        <P::Range as Counter>::LEN / WIDTH.div_ceil(Self::BLOCK_WORD_BITS) as usize
    };

    const CONFIG: () = {
        assert!(
            CTR_BITS >= 1 && CTR_BITS <= Self::DOMAIN_BITS,
            "CTR_BITS must lie in 1..=domain bits"
        );
        assert!(
            ((CTR_BITS - 1) as u64) < (1u64 << Self::MARKER_BITS),
            "CTR_BITS - 1 must fit in the reserved key bits"
        );
        assert!(
            Self::MARKER_BITS <= Self::KEY_BITS,
            "key is too short for the reserved bits"
        );
        assert!(
            WIDTH >= 1 && WIDTH <= W::BITS,
            "WIDTH must lie in 1..=bits of the result type"
        );
        assert!(
            WIDTH <= Self::BLOCK_WORD_BITS || WIDTH % Self::BLOCK_WORD_BITS == 0,
            "WIDTH must fit in a block word or be a multiple of it"
        );
        assert!(Self::RESULTS > 0, "WIDTH is wider than a block");
    };

    /// Engine keyed by `key`, starting at the zero base counter.
    ///
    /// Fails with [`RandomError::KeyRange`] if the reserved high bits of
    /// `key` are set.
    pub fn new(key: P::Key) -> Result<Self> {
        Self::with_base(key, P::Domain::zero())
    }

    /// Engine keyed by `key`, starting at `base`.
    ///
    /// Fails with [`RandomError::KeyRange`] for reserved key bits and with
    /// [`RandomError::BaseRange`] if `base` has bits inside the counter
    /// window.
    pub fn with_base(key: P::Key, base: P::Domain) -> Result<Self> {
        Self::from_prf(P::with_key(key), base)
    }

    /// Engine around a ready-built PRF; its key is checked and marked like a
    /// direct key.
    pub fn from_prf(mut prf: P, base: P::Domain) -> Result<Self> {
        let key = Self::check_key(prf.key())?;
        Self::check_base(&base)?;
        prf.set_key(key);
        Ok(Self::assemble(prf, base))
    }

    /// Engine keyed by an integer, low key word first.
    pub fn from_u128(seed: u128) -> Result<Self> {
        Self::new(P::Key::from_u128(seed)?)
    }

    /// Engine keyed from a seed sequence.
    ///
    /// Reserved key bits produced by the sequence are silently overwritten.
    pub fn from_seed_seq<S>(seq: &mut S) -> Self
    where
        S: SeedSequence + ?Sized,
    {
        let key = Self::normalize_key(P::Key::from_seed_seq(seq));
        Self::assemble(P::with_key(key), P::Domain::zero())
    }

    /// Engine keyed by packing all of `items`.
    ///
    /// Reserved key bits are silently overwritten. Fails with
    /// [`RandomError::LeftoverInput`] if the input does not fit in the key.
    pub fn from_words<T, I>(items: I) -> Result<Self>
    where
        T: Word,
        I: IntoIterator<Item = T>,
    {
        let key = Self::normalize_key(P::Key::from_words(items)?);
        Ok(Self::assemble(P::with_key(key), P::Domain::zero()))
    }

    /// Engine keyed by packing from `iter`, leaving it positioned after the
    /// consumed input.
    pub fn from_words_partial<T, I>(iter: &mut I) -> Self
    where
        T: Word,
        I: Iterator<Item = T>,
    {
        let key = Self::normalize_key(P::Key::from_words_partial(iter));
        Self::assemble(P::with_key(key), P::Domain::zero())
    }

    fn assemble(prf: P, base: P::Domain) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CONFIG;
        Self {
            prf,
            counter: base,
            block: P::Range::zero(),
            cursor: Self::RESULTS,
            _result: PhantomData,
        }
    }

    /// Clear the reserved key bits and store the `CTR_BITS` marker there.
    fn encode_marker(key: P::Key) -> P::Key {
        let mut key = key;
        key.clear_high_bits(Self::MARKER_BITS);
        let word_bits = <<P::Key as Counter>::Word as Word>::BITS;
        let mut marker = u128::from(CTR_BITS - 1);
        let mut remaining = Self::MARKER_BITS;
        // last word holds the low marker bits, a partial word the top ones
        for word in key.words_mut().iter_mut().rev() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(word_bits);
            let field = (marker & low_mask(take)) << (word_bits - take);
            *word = Word::from_u128(word.to_u128() | field);
            marker >>= take;
            remaining -= take;
        }
        key
    }

    /// Whether the reserved bits of `key` hold this engine's marker.
    fn has_marker(key: &P::Key) -> bool {
        Self::encode_marker(*key).is_equal(key)
    }

    fn check_key(key: P::Key) -> Result<P::Key> {
        let mut trial = key;
        if trial.clear_high_bits(Self::MARKER_BITS) {
            debug!(
                reserved_bits = Self::MARKER_BITS,
                "rejected key with reserved bits set"
            );
            return Err(RandomError::KeyRange {
                reserved_bits: Self::MARKER_BITS,
            });
        }
        Ok(Self::encode_marker(key))
    }

    fn normalize_key(key: P::Key) -> P::Key {
        let mut trial = key;
        if trial.clear_high_bits(Self::MARKER_BITS) {
            trace!(
                reserved_bits = Self::MARKER_BITS,
                "overwrote reserved bits of a generated key"
            );
        }
        Self::encode_marker(key)
    }

    fn check_base(base: &P::Domain) -> Result<()> {
        let mut trial = *base;
        if trial.clear_high_bits(CTR_BITS) {
            debug!(
                counter_bits = CTR_BITS,
                "rejected base counter overlapping the counter window"
            );
            return Err(RandomError::BaseRange {
                counter_bits: CTR_BITS,
            });
        }
        Ok(())
    }

    /// Reset to the default engine: zero key plus marker, zero base.
    pub fn seed(&mut self) {
        *self = Self::default();
    }

    /// Re-key at the zero base counter. On error `self` is unchanged.
    pub fn seed_key(&mut self, key: P::Key) -> Result<()> {
        *self = Self::new(key)?;
        Ok(())
    }

    /// Re-key at `base`. On error `self` is unchanged.
    pub fn seed_with_base(&mut self, key: P::Key, base: P::Domain) -> Result<()> {
        *self = Self::with_base(key, base)?;
        Ok(())
    }

    /// Re-key from an integer. On error `self` is unchanged.
    pub fn seed_u128(&mut self, seed: u128) -> Result<()> {
        *self = Self::from_u128(seed)?;
        Ok(())
    }

    /// Re-key from a seed sequence.
    pub fn seed_from_seq<S>(&mut self, seq: &mut S)
    where
        S: SeedSequence + ?Sized,
    {
        *self = Self::from_seed_seq(seq);
    }

    /// Re-key by packing all of `items`. On error `self` is unchanged.
    pub fn seed_from_words<T, I>(&mut self, items: I) -> Result<()>
    where
        T: Word,
        I: IntoIterator<Item = T>,
    {
        *self = Self::from_words(items)?;
        Ok(())
    }

    /// Re-key by packing from `iter`.
    pub fn seed_from_words_partial<T, I>(&mut self, iter: &mut I)
    where
        T: Word,
        I: Iterator<Item = T>,
    {
        *self = Self::from_words_partial(iter);
    }

    /// Move to a new base counter under the same key.
    ///
    /// Fails with [`RandomError::BaseRange`] if `base` has bits inside the
    /// counter window; `self` is then unchanged.
    pub fn restart(&mut self, base: P::Domain) -> Result<()> {
        Self::check_base(&base)?;
        trace!(counter_bits = CTR_BITS, "engine restarted on new base counter");
        self.counter = base;
        self.cursor = Self::RESULTS;
        Ok(())
    }

    /// A copy of this engine restarted on `base`.
    pub fn fork(&self, base: P::Domain) -> Result<Self> {
        let mut forked = self.clone();
        forked.restart(base)?;
        Ok(forked)
    }

    fn advance(counter: &P::Domain, n: u128) -> Result<P::Domain> {
        counter.increment(CTR_BITS, n).map_err(|_| {
            debug!(counter_bits = CTR_BITS, "counter space exhausted");
            RandomError::CounterSpaceExhausted {
                counter_bits: CTR_BITS,
            }
        })
    }

    /// Next `WIDTH`-bit result.
    ///
    /// Fails with [`RandomError::CounterSpaceExhausted`] once the counter
    /// window is used up; `self` is then unchanged.
    pub fn try_next(&mut self) -> Result<W> {
        if self.cursor == Self::RESULTS {
            self.counter = Self::advance(&self.counter, 1)?;
            self.block = self.prf.apply(self.counter);
            self.cursor = 0;
        }
        let value = self.block.extract_at(self.cursor, WIDTH);
        self.cursor += 1;
        Ok(value)
    }

    /// Skip `n` results in constant time.
    ///
    /// Equivalent to `n` calls of [`Self::try_next`], including the state
    /// reached on a block boundary. On error `self` is unchanged.
    pub fn discard(&mut self, n: u128) -> Result<()> {
        let results = Self::RESULTS as u128;
        let mut whole = n / results;
        let spill = self.cursor as u128 + n % results;
        let mut extra = spill / results;
        let mut cursor = (spill % results) as usize;

        // Landing on a block boundary leaves the block unevaluated.
        if cursor == 0 && (whole > 0 || extra > 0) {
            cursor = Self::RESULTS;
            if extra > 0 {
                extra -= 1;
            } else {
                whole -= 1;
            }
        }

        let moved = whole > 0 || extra > 0;
        // two steps keep `whole + extra` from overflowing
        let counter = Self::advance(&self.counter, whole)?;
        let counter = Self::advance(&counter, extra)?;

        self.counter = counter;
        self.cursor = cursor;
        if moved && cursor < Self::RESULTS {
            self.block = self.prf.apply(counter);
        }
        Ok(())
    }

    /// Fill `dest` with consecutive results.
    ///
    /// All or nothing: if the counter space cannot supply `dest.len()`
    /// results, nothing is written and `self` is unchanged.
    pub fn generate(&mut self, dest: &mut [W]) -> Result<()> {
        let mut trial = self.clone();
        trial.discard(dest.len() as u128)?;
        for slot in dest {
            *slot = self.try_next()?;
        }
        Ok(())
    }

    /// Smallest possible result.
    pub fn min() -> W {
        W::ZERO
    }

    /// Largest possible result, `2^WIDTH - 1`.
    pub fn max() -> W {
        W::from_u128(low_mask(WIDTH))
    }

    /// Results produced per counter value.
    pub fn results_per_counter() -> usize {
        Self::RESULTS
    }

    /// The effective key, marker bits included.
    pub fn key(&self) -> P::Key {
        self.prf.key()
    }

    /// The current counter.
    pub fn counter(&self) -> P::Domain {
        self.counter
    }

    /// Index of the next result in the cached block; equal to
    /// [`Self::results_per_counter`] when the block is used up.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The underlying PRF.
    pub fn prf(&self) -> &P {
        &self.prf
    }

    fn write_state(&self, f: &mut fmt::Formatter<'_>, radix: Radix) -> fmt::Result {
        match radix {
            Radix::Decimal => write!(f, "{} ", self.cursor)?,
            Radix::Hexadecimal => write!(f, "{:x} ", self.cursor)?,
        }
        self.counter.insert(f, radix)?;
        f.write_str(" ")?;
        self.key().insert(f, radix)
    }

    /// Parse `"<cursor> <counter words> <key words>"` in `radix`.
    ///
    /// The reserved key bits must hold this engine's `CTR_BITS` marker, so
    /// a state written by an engine with another counter width is rejected.
    pub fn from_str_radix(text: &str, radix: Radix) -> Result<Self> {
        let mut tokens = text.split_ascii_whitespace();
        let cursor = tokens
            .next()
            .ok_or_else(|| RandomError::MalformedState("empty engine state".into()))?;
        let cursor = usize::from_str_radix(cursor, radix.base())
            .map_err(|_| RandomError::MalformedState(format!("invalid cursor {cursor:?}")))?;
        if cursor > Self::RESULTS {
            return Err(RandomError::MalformedState(format!(
                "cursor {cursor} exceeds {} results per block",
                Self::RESULTS
            )));
        }
        let counter = P::Domain::extract(&mut tokens, radix)?;
        let key = P::Key::extract(&mut tokens, radix)?;
        if tokens.next().is_some() {
            return Err(RandomError::MalformedState(
                "trailing input after engine state".into(),
            ));
        }
        if !Self::has_marker(&key) {
            debug!(
                counter_bits = CTR_BITS,
                "rejected engine state with a foreign key marker"
            );
            return Err(RandomError::MalformedState(
                "key marker does not match CTR_BITS".into(),
            ));
        }

        let mut engine = Self::assemble(P::with_key(key), counter);
        engine.cursor = cursor;
        if cursor < Self::RESULTS {
            engine.block = engine.prf.apply(counter);
        }
        Ok(engine)
    }

    /// Replace this engine with a parsed state. On error `self` is
    /// unchanged.
    pub fn restore(&mut self, text: &str, radix: Radix) -> Result<()> {
        *self = Self::from_str_radix(text, radix)?;
        Ok(())
    }

    /// Stitch enough results for `bits` bits, low result first.
    fn next_bits(&mut self, bits: u32) -> Result<u128> {
        let mut value = 0u128;
        let mut filled = 0;
        while filled < bits {
            value |= self.try_next()?.to_u128() << filled;
            filled += WIDTH;
        }
        Ok(value & low_mask(bits))
    }
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> Default
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    fn default() -> Self {
        let key = Self::encode_marker(P::Key::zero());
        Self::assemble(P::with_key(key), P::Domain::zero())
    }
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> PartialEq
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    fn eq(&self, other: &Self) -> bool {
        self.cursor == other.cursor
            && self.counter.is_equal(&other.counter)
            && self.key().is_equal(&other.key())
    }
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> Eq
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> fmt::Display
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_state(f, Radix::Decimal)
    }
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> fmt::LowerHex
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_state(f, Radix::Hexadecimal)
    }
}

impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> FromStr
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    type Err = RandomError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_str_radix(text, Radix::Decimal)
    }
}

/// # Panics
///
/// `next_u32`, `next_u64` and `fill_bytes` panic once the counter space is
/// exhausted. Use `try_fill_bytes` or [`CounterBasedEngine::try_next`] to
/// handle that case.
impl<W: Word, P: Prf, const CTR_BITS: u32, const WIDTH: u32> RngCore
    for CounterBasedEngine<W, P, CTR_BITS, WIDTH>
{
    fn next_u32(&mut self) -> u32 {
        match self.next_bits(32) {
            Ok(value) => value as u32,
            Err(err) => panic!("{err}"),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self.next_bits(64) {
            Ok(value) => value as u64,
            Err(err) => panic!("{err}"),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(err) = self.try_fill_bytes(dest) {
            panic!("{err}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        let per_chunk = 64u32.div_ceil(WIDTH) as u128;
        let chunks = dest.len().div_ceil(8) as u128;
        let mut trial = self.clone();
        trial
            .discard(chunks * per_chunk)
            .map_err(rand_core::Error::new)?;

        for chunk in dest.chunks_mut(8) {
            let value = self.next_bits(64).map_err(rand_core::Error::new)? as u64;
            chunk.copy_from_slice(&value.to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }
}

/// Philox2x32-10 engine with 32-bit results.
pub type Philox2x32Engine = CounterBasedEngine<u32, Philox2x32, 32, 32>;
/// Philox2x64-10 engine with 64-bit results.
pub type Philox2x64Engine = CounterBasedEngine<u64, Philox2x64, 64, 64>;
/// Philox4x32-10 engine with 32-bit results.
pub type Philox4x32Engine = CounterBasedEngine<u32, Philox4x32, 64, 32>;
/// Philox4x64-10 engine with 64-bit results.
pub type Philox4x64Engine = CounterBasedEngine<u64, Philox4x64, 64, 64>;
/// Threefry2x32-20 engine with 32-bit results.
pub type Threefry2x32Engine = CounterBasedEngine<u32, Threefry2x32, 32, 32>;
/// Threefry2x64-20 engine with 64-bit results.
pub type Threefry2x64Engine = CounterBasedEngine<u64, Threefry2x64, 64, 64>;
/// Threefry4x32-20 engine with 32-bit results.
pub type Threefry4x32Engine = CounterBasedEngine<u32, Threefry4x32, 64, 32>;
/// Threefry4x64-20 engine with 64-bit results.
pub type Threefry4x64Engine = CounterBasedEngine<u64, Threefry4x64, 64, 64>;
