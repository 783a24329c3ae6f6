//! Block-rate synthesizer core
//!
//! Audio is produced in fixed blocks of [`SAMPLE_BLOCK_SIZE`] frames. All
//! control-rate work (LFOs, glide, wavetable scanning, register assembly)
//! happens once per block at [`MODULATOR_UPDATE_RATE_HZ`]; the chip backend
//! then renders the block at the DAC rate.

pub mod glide;
pub mod lfo;
pub mod modulation;
pub mod note_stack;
pub mod parameters;
pub mod patch;
pub mod sample_buffer;
pub mod sid_synth;
pub mod voice;
pub mod voice_allocator;
pub mod wavetable;

use num_derive::FromPrimitive;

/// Frames per render block.
pub const SAMPLE_BLOCK_SIZE: usize = 32;
/// Blocks buffered between producer and consumer.
pub const NUM_SAMPLE_BLOCKS: usize = 4;
/// Output sample rate.
pub const DAC_UPDATE_RATE_HZ: u32 = 44_100;
/// Control-rate tick frequency (one tick per block).
pub const MODULATOR_UPDATE_RATE_HZ: f32 = DAC_UPDATE_RATE_HZ as f32 / SAMPLE_BLOCK_SIZE as f32;

/// Voices on a SID chip.
pub const NUM_VOICES: usize = 3;
/// Global LFOs.
pub const NUM_LFOS: usize = 3;

/// One stereo output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StereoFrame {
    pub left: i16,
    pub right: i16,
}

/// Voice assignment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum VoiceMode {
    /// Up to three simultaneous notes, one voice each.
    Poly = 0,
    /// All three voices play the same note with per-voice parameters.
    Unison = 1,
}
