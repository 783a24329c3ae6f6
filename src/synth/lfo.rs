//! Low frequency oscillators
//!
//! LFOs tick once per sample block, not per sample, so phase is kept as a
//! plain f32 in `[0, 1)`. The output is computed from the current phase and
//! the phase then advances, which keeps the very first tick after a reset
//! exactly on the programmed start phase.

use std::sync::LazyLock;

use num_derive::FromPrimitive;

use crate::synth::MODULATOR_UPDATE_RATE_HZ;

/// Fastest LFO rate in Hz (rate 127).
pub const LFO_FREQ_MAX: f32 = 40.0;

const RATE_STEPS: usize = 128;
const SINE_TABLE_SIZE: usize = 1024;

/// Oscillator shape. All shapes are bipolar in `[-1, 1]` except [`Ramp`],
/// which rises from 0 to 1 once and holds.
///
/// [`Ramp`]: LfoShape::Ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum LfoShape {
    #[default]
    Triangle = 0,
    Saw = 1,
    Square = 2,
    Sine = 3,
    Ramp = 4,
    Random = 5,
}

/// Note-on retrigger behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum LfoSync {
    #[default]
    None = 0,
    NoteOn = 1,
}

/// Phase increment per control tick for each rate value. Rates follow an
/// equal-tempered curve down from `LFO_FREQ_MAX` at the top.
static PHASE_INCREMENT_TABLE: LazyLock<[f32; RATE_STEPS]> = LazyLock::new(|| {
    let mut table = [0f32; RATE_STEPS];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = lfo_freq(i as u8) / MODULATOR_UPDATE_RATE_HZ;
    }
    table
});

/// One cycle of sine, with a duplicated first entry so interpolation at
/// phase 1.0 never reads past the end.
static SINE_TABLE: LazyLock<[f32; SINE_TABLE_SIZE + 1]> = LazyLock::new(|| {
    let mut table = [0f32; SINE_TABLE_SIZE + 1];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (2.0 * std::f32::consts::PI * i as f32 / SINE_TABLE_SIZE as f32).sin();
    }
    table
});

/// LFO frequency in Hz for a rate value.
pub fn lfo_freq(rate: u8) -> f32 {
    let rate = rate.min(127) as f32;
    LFO_FREQ_MAX * 2f32.powf(-(127.0 - rate) / 12.0)
}

fn phase_increment(rate: u8) -> f32 {
    PHASE_INCREMENT_TABLE[(rate as usize).min(RATE_STEPS - 1)]
}

fn sine(phase: f32) -> f32 {
    let pos = phase.clamp(0.0, 1.0) * SINE_TABLE_SIZE as f32;
    let idx = pos as usize;
    let frac = pos - idx as f32;
    let a = SINE_TABLE[idx];
    let b = SINE_TABLE[idx + 1];
    a + (b - a) * frac
}

/// A single block-rate LFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lfo {
    phase: f32,
    start_phase: f32,
    pending_reset: bool,
}

impl Lfo {
    /// Set the start phase (0-127 maps to one cycle) and jump straight to it.
    pub fn init(&mut self, start_phase: i32) {
        self.reset(start_phase);
        self.phase = self.start_phase;
        self.pending_reset = false;
    }

    /// Arm a phase reset; it takes effect on the next [`update`] so resets
    /// from the event path never tear a block mid-way.
    ///
    /// [`update`]: Lfo::update
    pub fn reset(&mut self, start_phase: i32) {
        self.start_phase = start_phase.clamp(0, 127) as f32 / 128.0;
        self.pending_reset = true;
    }

    /// Produce the output for this tick and advance the phase.
    ///
    /// The rate is re-read every call, so parameter edits take effect on the
    /// following block. `Ramp` runs once and holds at the top; every other
    /// shape wraps.
    pub fn update(&mut self, rate: u8, shape: LfoShape, abs: bool) -> f32 {
        let phase = if self.pending_reset {
            self.pending_reset = false;
            self.phase = self.start_phase;
            self.start_phase
        } else {
            let phase = self.phase;
            let mut next = phase + phase_increment(rate);
            if next >= 1.0 {
                if shape == LfoShape::Ramp {
                    next = 1.0;
                } else {
                    next -= 1.0;
                }
            }
            self.phase = next;
            phase
        };

        let output = match shape {
            LfoShape::Triangle => {
                if phase < 0.5 {
                    phase * 4.0 - 1.0
                } else {
                    1.0 - (phase - 0.5) * 4.0
                }
            }
            LfoShape::Saw => -1.0 + phase * 2.0,
            LfoShape::Square => {
                if phase < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
            LfoShape::Sine => sine(phase),
            // TODO sample-and-hold random source
            LfoShape::Random => 1.0,
            LfoShape::Ramp => phase,
        };
        if abs {
            output.abs()
        } else {
            output
        }
    }

    #[cfg(test)]
    fn phase(&self) -> f32 {
        self.phase
    }
}
