//! SID chip model: register map, pitch tables, backend seam
//!
//! The synth assembles a full 25-byte register image every block; the
//! [`instance`] layer diffs it against what the chip last saw and forwards
//! only the changed bytes to whatever [`chip::SidBackend`] is plugged in.

pub mod chip;
pub mod freq_table;
pub mod instance;
pub mod registers;

/// PAL C64 clock, in Hz.
pub const CLOCK_FREQ_PAL: f64 = 985_248.0;

/// SID register file size.
pub const SID_REGISTER_COUNT: usize = 25;

/// Chip revision. The 6581 and 8580 differ mainly in filter character and
/// combined-waveform output; backends may approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_derive::FromPrimitive)]
pub enum ChipModel {
    #[default]
    Mos6581 = 0,
    Mos8580 = 1,
}
