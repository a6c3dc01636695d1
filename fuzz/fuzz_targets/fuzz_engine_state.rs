//! Fuzz target for engine state transitions.
//!
//! Drives a small engine through random draws, discards, restarts and
//! serialization round trips, checking that discards match repeated draws
//! and that failed operations leave the state untouched.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ringkernel_random::{CounterBasedEngine, Radix};
use ringkernel_random::prf::Philox2x32;

/// Three results of 9 bits per 32-bit word, 12-bit counter window.
type Engine = CounterBasedEngine<u16, Philox2x32, 12, 9>;

/// Operations that can be performed on the engine.
#[derive(Debug, Arbitrary)]
enum EngineOp {
    /// Draw one result.
    Next,
    /// Skip results.
    Discard { n: u32 },
    /// Skip a possibly enormous number of results.
    DiscardWide { n: u128 },
    /// Move to another base counter.
    Restart { base: [u32; 2] },
    /// Serialize and parse back.
    RoundTrip { hex: bool },
    /// Parse arbitrary text.
    Restore { text: String },
}

/// Fuzz input: key and operation sequence.
#[derive(Debug, Arbitrary)]
struct FuzzInput {
    key: u32,
    ops: Vec<EngineOp>,
}

fuzz_target!(|input: FuzzInput| {
    if input.ops.len() > 200 {
        return;
    }

    let mut rng = match Engine::new([input.key]) {
        Ok(rng) => rng,
        Err(_) => Engine::new([input.key & 0x03ff_ffff]).unwrap(),
    };

    for op in &input.ops {
        let before = rng.clone();
        match op {
            EngineOp::Next => {
                if rng.try_next().is_err() {
                    assert_eq!(rng, before, "failed draw changed state");
                }
            }
            EngineOp::Discard { n } => {
                let n = u128::from(*n % 4096);
                let mut drawn = rng.clone();
                let drawn_ok = (0..n).all(|_| drawn.try_next().is_ok());
                match rng.discard(n) {
                    Ok(()) => {
                        assert!(drawn_ok, "discard succeeded where draws failed");
                        assert_eq!(rng, drawn, "discard({}) disagrees with draws", n);
                    }
                    Err(_) => {
                        assert!(!drawn_ok, "discard failed where draws succeeded");
                        assert_eq!(rng, before, "failed discard changed state");
                    }
                }
            }
            EngineOp::DiscardWide { n } => {
                if rng.discard(*n).is_err() {
                    assert_eq!(rng, before, "failed discard changed state");
                }
            }
            EngineOp::Restart { base } => {
                if rng.restart(*base).is_err() {
                    assert_eq!(rng, before, "failed restart changed state");
                }
            }
            EngineOp::RoundTrip { hex } => {
                let (text, radix) = if *hex {
                    (format!("{rng:x}"), Radix::Hexadecimal)
                } else {
                    (rng.to_string(), Radix::Decimal)
                };
                let back = Engine::from_str_radix(&text, radix).unwrap();
                assert_eq!(back, rng, "round trip of {:?}", text);
            }
            EngineOp::Restore { text } => {
                if rng.restore(text, Radix::Decimal).is_err() {
                    assert_eq!(rng, before, "failed restore changed state");
                }
            }
        }
    }
});
