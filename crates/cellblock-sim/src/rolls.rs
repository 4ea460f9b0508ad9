//! Random draws used by combat, loot, and NPC relocation.
//!
//! Every draw goes through [`unit`], a single uniform `f64` in `[0, 1)`
//! taken from the caller's [`rand::Rng`]. Ranges and integer picks are
//! derived from that one number, so a run seeded with the same generator
//! (or scripted with [`ScriptedRolls`]) replays exactly.

use std::collections::VecDeque;

use rand::{Rng, RngCore};

/// Number of mantissa bits `rand` uses when producing an `f64` in `[0, 1)`.
const F64_PRECISION_BITS: u32 = 53;

/// Draw a uniform float in `[0, 1)`.
pub fn unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random::<f64>()
}

/// Draw once and report whether it landed under `probability`.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    unit(rng) < probability
}

/// Draw a float uniformly from `[low, high)`. Equal bounds return `low`.
pub fn between<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    (high - low).mul_add(unit(rng), low)
}

/// Draw an integer uniformly from `low..=high`.
///
/// Bounds given in the wrong order are swapped.
pub fn int_between<R: Rng + ?Sized>(rng: &mut R, low: u64, high: u64) -> u64 {
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    let span = high.saturating_sub(low).saturating_add(1);
    #[allow(clippy::cast_precision_loss)]
    let offset = floor_to_u64(unit(rng) * span as f64).min(span.saturating_sub(1));
    low.saturating_add(offset)
}

/// Pick one element uniformly. Returns `None` for an empty slice.
pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let last = u64::try_from(items.len().saturating_sub(1)).unwrap_or(u64::MAX);
    let index = usize::try_from(int_between(rng, 0, last)).unwrap_or(0);
    items.get(index)
}

/// Floor a float into `u32`, clamping negatives and NaN to zero.
pub fn floor_to_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let floored = value.min(f64::from(u32::MAX)).floor() as u32;
    floored
}

/// Floor a float into `u64`, clamping negatives and NaN to zero.
fn floor_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let floored = value.floor() as u64;
    floored
}

// ---------------------------------------------------------------------------
// ScriptedRolls
// ---------------------------------------------------------------------------

/// A generator that replays a fixed list of unit draws.
///
/// Each queued value `u` in `[0, 1)` comes back from [`unit`] exactly
/// (up to 53 bits of precision). Once the script runs out, every further
/// draw returns `fallback`. Used to replay recorded fights and to pin
/// combat outcomes in tests.
#[derive(Debug, Clone)]
pub struct ScriptedRolls {
    queue: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRolls {
    /// Script the given draws, then return `0.999` forever.
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self::with_fallback(draws, 0.999)
    }

    /// Script the given draws, then return `fallback` forever.
    pub fn with_fallback(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            queue: draws.into_iter().collect(),
            fallback,
        }
    }

    /// Draws still queued.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Encode a unit float as the raw `u64` that `rand` maps back onto it.
    fn encode(value: f64) -> u64 {
        let clamped = value.clamp(0.0, 1.0);
        #[allow(clippy::cast_precision_loss)]
        let scale = (1_u64 << F64_PRECISION_BITS) as f64;
        let mantissa = floor_to_u64(clamped * scale).min((1_u64 << F64_PRECISION_BITS).saturating_sub(1));
        mantissa << (64_u32.saturating_sub(F64_PRECISION_BITS))
    }
}

impl RngCore for ScriptedRolls {
    fn next_u32(&mut self) -> u32 {
        let wide = self.next_u64();
        u32::try_from(wide >> 32).unwrap_or(u32::MAX)
    }

    fn next_u64(&mut self) -> u64 {
        let value = self.queue.pop_front().unwrap_or(self.fallback);
        Self::encode(value)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            for (slot, byte) in chunk.iter_mut().zip(bytes) {
                *slot = byte;
            }
        }
    }
}
