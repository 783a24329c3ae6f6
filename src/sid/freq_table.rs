//! MIDI note to oscillator frequency conversion
//!
//! The SID frequency register counts in units of `clock / 2^24`, so a
//! semitone table over the playable range plus linear interpolation on the
//! fractional part covers pitch bend and glide. One table entry per
//! semitone from C0 upward; the top entry saturates at the register
//! maximum before the float cast could overflow.

use std::sync::LazyLock;

use crate::fixed_point::S816;
use crate::midi;
use crate::sid::CLOCK_FREQ_PAL;

const BASE_FREQ: f32 = 440.0;
/// Semitone offset of table entry 0 relative to the 440 Hz reference.
const C0_OFFSET: i32 = -(5 * 12) + 3;
/// One entry per semitone, plus one for interpolation headroom at the top.
const TABLE_ENTRIES: usize = 96;

/// Register value per Hz: `2^24 / clock`.
const CONSTANT: f32 = ((256 << 8) << 8) as f32 / CLOCK_FREQ_PAL as f32;

fn note_hz(index: i32) -> f32 {
    BASE_FREQ * 2f32.powf((C0_OFFSET + index) as f32 / 12.0)
}

static SID_FREQ_TABLE: LazyLock<[u16; TABLE_ENTRIES]> = LazyLock::new(|| {
    let mut table = [0u16; TABLE_ENTRIES];
    for (i, slot) in table.iter_mut().enumerate() {
        // The float-to-int cast saturates, which caps the final entry at
        // the register maximum instead of wrapping.
        *slot = (CONSTANT * note_hz(i as i32)) as u16;
    }
    table
});

/// Frequency register value for a whole MIDI note.
pub fn midi_to_osc_freq(midi_note: i32) -> u16 {
    let idx = (midi_note - midi::C0 as i32).clamp(0, TABLE_ENTRIES as i32 - 1) as usize;
    SID_FREQ_TABLE[idx]
}

/// Frequency register value for a fractional pitch, interpolating between
/// adjacent semitone entries with the 16-bit fraction.
pub fn midi_to_osc_freq_fp(midi_note: S816) -> u16 {
    let idx =
        (midi_note.integral() - midi::C0 as i32).clamp(0, TABLE_ENTRIES as i32 - 2) as usize;
    let a = u32::from(SID_FREQ_TABLE[idx]);
    let b = u32::from(SID_FREQ_TABLE[idx + 1]);
    let interp = ((b.wrapping_sub(a)) * midi_note.fractional() as u32) >> 16;
    (a + interp) as u16
}

/// Key-tracking offset for the filter cutoff.
///
/// Not frequency-based: the note scales linearly into the 11-bit cutoff
/// range. `scale` is divided by 32 rather than 64 so the tracking can reach
/// double slope.
pub fn midi_to_filter_freq(midi_note: i32, scale: i32) -> i32 {
    let scale = scale.clamp(-64, 63);
    let midi_note = midi_note.clamp(0, 127);
    (midi_note * scale * 1024) / 32 / 128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitch() {
        // Table entry 45 (MIDI note 69) sits exactly one octave below the
        // 440 Hz reference.
        let reg = midi_to_osc_freq(69) as f32;
        let hz = reg * CLOCK_FREQ_PAL as f32 / (1 << 24) as f32;
        assert!((hz - 220.0).abs() < 0.5, "got {hz} Hz");
    }

    #[test]
    fn test_octave_doubles() {
        let a = midi_to_osc_freq(48) as u32;
        let b = midi_to_osc_freq(60) as u32;
        assert!(b.abs_diff(2 * a) <= 2);
    }

    #[test]
    fn test_monotonic_nondecreasing() {
        for note in 0..127 {
            assert!(midi_to_osc_freq(note + 1) >= midi_to_osc_freq(note));
        }
    }

    #[test]
    fn test_below_range_clamps() {
        assert_eq!(midi_to_osc_freq(0), midi_to_osc_freq(midi::C0 as i32));
    }

    #[test]
    fn test_interpolation_between_semitones() {
        let lo = midi_to_osc_freq(60);
        let hi = midi_to_osc_freq(61);
        let mid = midi_to_osc_freq_fp(S816::from_float(60.5));
        assert!(mid > lo && mid < hi);
        // Exact halfway point of the linear interpolation.
        let expected = lo as u32 + ((hi as u32 - lo as u32) >> 1);
        assert!(u32::from(mid).abs_diff(expected) <= 1);
    }

    #[test]
    fn test_fp_whole_note_matches() {
        for note in [24, 48, 60, 72, 96] {
            assert_eq!(midi_to_osc_freq_fp(S816::from_int(note)), midi_to_osc_freq(note));
        }
    }

    #[test]
    fn test_top_of_range_no_overflow() {
        // The very top of the table saturates; interpolation at the end must
        // stay within the register range and not wrap.
        let top = midi_to_osc_freq_fp(S816::from_float(127.9));
        assert!(top >= midi_to_osc_freq(118));
    }

    #[test]
    fn test_filter_key_tracking() {
        assert_eq!(midi_to_filter_freq(64, 0), 0);
        assert_eq!(midi_to_filter_freq(127, 63), (127 * 63 * 1024) / 32 / 128);
        assert!(midi_to_filter_freq(127, -64) < 0);
        // Inputs clamp.
        assert_eq!(midi_to_filter_freq(200, 100), (127 * 63 * 1024) / 32 / 128);
    }
}
