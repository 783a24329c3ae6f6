//! Modulation source routing
//!
//! Sources are sampled once per control tick into a small vector; consumers
//! then pull scaled integer offsets out of it. Depth is bipolar around
//! zero with [`MODULATION_DEPTH`] as the full-scale divisor.

use num_derive::FromPrimitive;

/// Smallest modulation depth parameter value.
pub const MOD_DEPTH_MIN: i32 = -256;
/// Largest modulation depth parameter value.
pub const MOD_DEPTH_MAX: i32 = 255;
/// Full-scale depth divisor.
pub const MODULATION_DEPTH: f32 = 256.0;

/// Available modulation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum ModSource {
    #[default]
    None = 0,
    Lfo1 = 1,
    Lfo2 = 2,
    Lfo3 = 3,
    PitchBend = 4,
}

pub const NUM_MOD_SOURCES: usize = 5;

/// Current value of every modulation source, refreshed each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModulationValues {
    values: [f32; NUM_MOD_SOURCES],
}

impl ModulationValues {
    /// Store a source value for this tick. [`ModSource::None`] stays zero.
    pub fn set(&mut self, source: ModSource, value: f32) {
        if source != ModSource::None {
            self.values[source as usize] = value;
        }
    }

    /// Raw source value in `[-1, 1]`.
    pub fn value(&self, source: ModSource) -> f32 {
        self.values[source as usize]
    }

    /// Scaled integer offset: `round(source * range * depth / 256)`.
    ///
    /// Zero depth yields exactly zero whatever the source is doing.
    pub fn get(&self, source: ModSource, depth: i32, range: f32) -> i32 {
        let value = self.values[source as usize];
        (value * range * depth as f32 / MODULATION_DEPTH).round() as i32
    }
}
