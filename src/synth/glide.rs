//! Portamento between successive pitches
//!
//! The glide value is an [`S816`] pitch that chases a target in fixed steps,
//! one per control tick. The per-rate step factor comes from a 128-entry
//! table spanning roughly two seconds down to three ticks for a full
//! one-semitone-unit sweep, following an exponential time-constant law.
//! Higher rates always glide faster.

use std::sync::LazyLock;

use crate::fixed_point::S816;
use crate::synth::MODULATOR_UPDATE_RATE_HZ;

/// Slowest full-range glide, in seconds.
const GLIDE_TIME_MAX: f32 = 2.0;
/// Fastest full-range glide: three control ticks.
const GLIDE_TIME_MIN: f32 = 3.0 / MODULATOR_UPDATE_RATE_HZ;

const GLIDE_RATE_STEPS: usize = 128;

/// Per-rate step factors: 16-bit fixed-point fractions of the total delta,
/// applied once per tick. Strictly increasing; adjacent entries are forced
/// at least one apart so integer truncation at the slow end cannot collapse
/// two rates into one.
static GLIDE_RATE_TABLE: LazyLock<[i32; GLIDE_RATE_STEPS]> = LazyLock::new(|| {
    let range = (1u32 << 16) as f32;
    let slow = (range / (GLIDE_TIME_MAX * MODULATOR_UPDATE_RATE_HZ)).powf(-0.125);
    let fast = (range / (GLIDE_TIME_MIN * MODULATOR_UPDATE_RATE_HZ)).powf(-0.125);
    let mut table = [0i32; GLIDE_RATE_STEPS];
    let mut prev = 0i32;
    for (i, slot) in table.iter_mut().enumerate() {
        let n = slow + (fast - slow) * (i + 1) as f32 / GLIDE_RATE_STEPS as f32;
        let entry = (n.powf(-8.0) as i32).max(prev + 1);
        *slot = entry;
        prev = entry;
    }
    table
});

/// Step factor for a glide rate, as a raw 16-bit fixed-point multiplier.
pub fn glide_increment(rate: u8) -> i32 {
    GLIDE_RATE_TABLE[(rate as usize).min(GLIDE_RATE_STEPS - 1)]
}

/// Linear pitch ramp toward a target note.
#[derive(Debug, Clone, Copy, Default)]
pub struct Glide {
    value: S816,
    target: S816,
    increment: S816,
    active: bool,
}

impl Glide {
    /// Aim at `target`. Rate 0 or an already-reached target snaps
    /// immediately; otherwise the step is `delta * factor(rate)`, forced
    /// to at least one raw unit so the ramp always moves.
    pub fn init(&mut self, target: S816, rate: u8) {
        self.target = target;
        let delta = target - self.value;
        if rate == 0 || delta.is_zero() {
            self.value = target;
            self.active = false;
            return;
        }
        let mut increment = delta.scale(glide_increment(rate));
        if increment.is_zero() {
            increment = S816::from_raw(if delta.raw() > 0 { 1 } else { -1 });
        }
        self.increment = increment;
        self.active = true;
    }

    /// Back to idle at pitch zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Jump to `value` without ramping.
    pub fn jam(&mut self, value: S816) {
        self.value = value;
        self.target = value;
        self.active = false;
    }

    /// Advance one control tick. Lands exactly on the target, never past it.
    pub fn update(&mut self) {
        if !self.active {
            return;
        }
        self.value += self.increment;
        let overshot = if self.increment.raw() > 0 {
            self.value >= self.target
        } else {
            self.value <= self.target
        };
        if overshot {
            self.value = self.target;
            self.active = false;
        }
    }

    /// Current pitch.
    pub fn note(&self) -> S816 {
        self.value
    }

    /// True while still ramping.
    pub fn active(&self) -> bool {
        self.active
    }
}
