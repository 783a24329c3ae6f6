//! Wavetable sequences and the per-voice scanner
//!
//! A wavetable is a short program of up to 32 steps, each carrying a
//! semitone transpose and a waveform. Per-table track enables decide which
//! of the two columns actually drive the voice. The scanner walks the
//! program at a tick-divided rate, looping or parking on the final step.

use bitflags::bitflags;

use crate::sid::registers::OscWave;

/// Wavetables per patch.
pub const NUM_WAVETABLES: usize = 4;

/// Steps per wavetable.
pub const MAX_STEPS: usize = 32;

/// What a step does after its values are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Apply values, move on.
    Play,
    /// Jump back to step 0 this same tick.
    Loop,
    /// Apply values, stay here.
    #[default]
    End,
}

bitflags! {
    /// Which columns of the table drive the voice.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackFlags: u8 {
        const TRANSPOSE = 0x01;
        const WAVEFORM = 0x02;
    }
}

/// One wavetable step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    pub action: Action,
    pub transpose: i16,
    pub waveform: OscWave,
}

impl Entry {
    /// A playing step with only a transpose.
    pub const fn play(transpose: i16) -> Self {
        Self {
            action: Action::Play,
            transpose,
            waveform: OscWave::Silence,
        }
    }

    /// A playing step with transpose and waveform.
    pub const fn play_wave(transpose: i16, waveform: OscWave) -> Self {
        Self {
            action: Action::Play,
            transpose,
            waveform,
        }
    }

    pub const fn looped() -> Self {
        Self {
            action: Action::Loop,
            transpose: 0,
            waveform: OscWave::Silence,
        }
    }
}

/// A fixed-size wavetable program with its track enables.
#[derive(Debug, Clone, Copy)]
pub struct WaveTable {
    data: [Entry; MAX_STEPS],
    enabled_tracks: TrackFlags,
}

impl Default for WaveTable {
    fn default() -> Self {
        Self {
            data: [Entry::default(); MAX_STEPS],
            enabled_tracks: TrackFlags::empty(),
        }
    }
}

impl WaveTable {
    pub fn at(&self, pos: usize) -> Entry {
        self.data[pos]
    }

    pub fn len(&self) -> usize {
        MAX_STEPS
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn mutable_data(&mut self) -> &mut [Entry; MAX_STEPS] {
        &mut self.data
    }

    pub fn enable(&mut self, track: TrackFlags, enable: bool) {
        self.enabled_tracks.set(track, enable);
    }

    pub fn is_enabled(&self, track: TrackFlags) -> bool {
        self.enabled_tracks.contains(track)
    }
}

/// Walks a wavetable program once per control tick.
///
/// The scanner refers to its table by index into the owning patch's table
/// array; the caller passes the resolved table into [`update`], so there
/// are no dangling references when patches change.
///
/// [`update`]: WaveTableScanner::update
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveTableScanner {
    source: Option<usize>,
    pos: usize,
    rate: i32,
    ticks: i32,
}

impl WaveTableScanner {
    pub const RATE_MIN: i32 = 0;
    pub const RATE_MAX: i32 = 127;

    /// Attach to a table (by index) and rewind.
    pub fn set_source(&mut self, source: Option<usize>) {
        self.source = source;
        self.pos = 0;
        self.ticks = self.rate;
    }

    /// Set the step rate. Larger values step faster; internally the value
    /// inverts into a tick divider. A live countdown longer than the new
    /// divider is cut short so rate increases take effect immediately.
    pub fn set_rate(&mut self, rate: i32) {
        let rate = Self::RATE_MAX - rate.clamp(Self::RATE_MIN, Self::RATE_MAX);
        if self.ticks > rate {
            self.ticks = rate;
        }
        self.rate = rate;
    }

    pub fn reset(&mut self) {
        self.set_source(None);
        self.set_rate(0);
        self.ticks = 0;
    }

    /// Table index this scanner reads from, if armed.
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    pub fn active(&self) -> bool {
        self.source.is_some()
    }

    pub fn track_enabled(&self, table: &WaveTable, track: TrackFlags) -> bool {
        self.active() && table.is_enabled(track)
    }

    /// Produce this tick's entry and advance.
    ///
    /// A `Loop` step rewinds to step 0 before producing a value, so the
    /// loop costs no tick. Advancing is gated by the tick divider and
    /// stops on `End` steps or at the final slot.
    pub fn update(&mut self, table: &WaveTable) -> Entry {
        let mut pos = self.pos;
        let mut action = table.at(pos).action;
        if action == Action::Loop {
            pos = 0;
            self.pos = 0;
            action = table.at(pos).action;
        }

        let mut ticked = true;
        if self.rate != 0 {
            if self.ticks != 0 {
                self.ticks -= 1;
                ticked = false;
            } else {
                self.ticks = self.rate;
            }
        }

        if ticked && action != Action::End && self.pos < table.len() - 1 {
            self.pos += 1;
        }

        table.at(pos)
    }
}
