//! A patch: one complete sound
//!
//! Owns the parameter banks and the four wavetables voices can scan.
//! Voices only ever borrow patch data for the duration of an update, so
//! swapping patches is a plain value replacement.

use crate::sid::registers::OscWave;
use crate::synth::parameters::Parameters;
use crate::synth::wavetable::{Action, Entry, TrackFlags, WaveTable, NUM_WAVETABLES};

#[derive(Debug, Clone)]
pub struct Patch {
    pub name: String,
    pub parameters: Parameters,
    pub wavetables: [WaveTable; NUM_WAVETABLES],
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            name: "INIT".to_string(),
            parameters: Parameters::new(),
            wavetables: default_wavetables(),
        }
    }
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The stock wavetable programs: an octave arpeggio, a waveform program,
/// and chromatic runs up and down.
fn default_wavetables() -> [WaveTable; NUM_WAVETABLES] {
    let mut tables = [WaveTable::default(); NUM_WAVETABLES];

    {
        let data = tables[0].mutable_data();
        data[0] = Entry::play(0);
        data[1] = Entry::play(12);
        data[2] = Entry::play(0);
        data[3] = Entry::play(12);
        data[4] = Entry::looped();
        tables[0].enable(TrackFlags::TRANSPOSE, true);
    }

    {
        let data = tables[1].mutable_data();
        data[0] = Entry::play_wave(0, OscWave::Tri);
        data[1] = Entry::play_wave(0, OscWave::Noise);
        data[2] = Entry::play_wave(0, OscWave::Pulse);
        data[3] = Entry::play_wave(-24, OscWave::Pulse);
        data[3].action = Action::End;
        tables[1].enable(TrackFlags::WAVEFORM, true);
    }

    {
        let data = tables[2].mutable_data();
        for i in 0..=12i16 {
            data[i as usize] = Entry::play(i);
        }
        data[12].action = Action::End;
        tables[2].enable(TrackFlags::TRANSPOSE, true);
    }

    {
        let data = tables[3].mutable_data();
        for i in 0..=12i16 {
            data[i as usize] = Entry::play(-i);
        }
        data[12].action = Action::End;
        tables[3].enable(TrackFlags::TRANSPOSE, true);
    }

    tables
}
