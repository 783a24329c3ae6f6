//! MIDI types shared across the synth
//!
//! Byte-level protocol parsing lives upstream; the engine only deals in
//! already-decoded events delivered through [`MidiHandler`].

/// MIDI note number (0-127, `INVALID_NOTE` marks an empty slot).
pub type Note = u8;
/// MIDI velocity (0-127).
pub type Velocity = u8;
/// MIDI channel (0-15).
pub type Channel = u8;

/// Sentinel for "no note".
pub const INVALID_NOTE: Note = 0xff;

/// Note number of C0 in the engine's octave convention.
pub const C0: Note = 24;

/// Center value of a 14-bit pitch-bend message.
pub const PITCH_BEND_CENTER: i16 = 0;

/// Decoded channel events the voice engine consumes.
///
/// Implementors may ignore events for channels they are not listening on;
/// the dispatcher calls every method with the raw channel untouched.
pub trait MidiHandler {
    fn note_on(&mut self, channel: Channel, note: Note, velocity: Velocity);
    fn note_off(&mut self, channel: Channel, note: Note);
    /// Signed bend, `-8192..=8191`, zero at center.
    fn pitch_bend(&mut self, channel: Channel, bend: i16);
    fn all_notes_off(&mut self) {}
}
