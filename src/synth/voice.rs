//! Per-voice state machine
//!
//! Each voice tracks its gate edge explicitly: MIDI events only flip the
//! state, and the next block-rate update turns the edge into register
//! writes. ADSR values are snapshotted at note-on so a played note keeps
//! its envelope even while the patch is edited.
//!
//! After the gate falls the frequency and waveform keep being written, so
//! the release phase is not cut off.

use crate::fixed_point::S816;
use crate::midi::{self, Note, Velocity};
use crate::sid::freq_table::midi_to_osc_freq_fp;
use crate::sid::registers::{OscWave, RegisterMap, VoiceIndex};
use crate::synth::glide::Glide;
use crate::synth::modulation::{ModSource, ModulationValues};
use crate::synth::parameters::Voice as VoiceParam;
use crate::synth::patch::Patch;
use crate::synth::wavetable::{Entry, TrackFlags, WaveTableScanner};

use num_traits::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Low,
    Rising,
    High,
    Falling,
}

/// One SID voice: gate, glide, wavetable scanner and register writer.
#[derive(Debug, Default)]
pub struct SidVoice {
    sid_voice: usize,
    parameter_voice: usize,

    note: Option<Note>,
    velocity: Velocity,
    adsr: [u8; 4],
    gate_state: GateState,

    glide: Glide,
    scanner: WaveTableScanner,
}

impl SidVoice {
    /// Bind to a chip voice. The parameter voice starts out the same.
    pub fn init(&mut self, voice_index: VoiceIndex) {
        self.sid_voice = voice_index.index();
        self.parameter_voice = voice_index.index();
    }

    /// Which voice's parameter bank drives this voice. Unison points all
    /// voices at different banks while they play the same note.
    pub fn set_parameter_voice(&mut self, voice_index: VoiceIndex) {
        self.parameter_voice = voice_index.index();
    }

    pub fn parameter_voice(&self) -> usize {
        self.parameter_voice
    }

    /// Force the gate closed. The note stays valid so the next update
    /// still runs and actually clears the gate bit.
    pub fn reset(&mut self) {
        self.velocity = 0;
        self.gate_state = GateState::Falling;
        self.glide.reset();
        self.scanner.reset();
    }

    /// Strike a note. Snapshots the envelope and arms the wavetable
    /// scanner; `glide` selects whether the pitch ramps from the previous
    /// value or snaps.
    pub fn note_on(&mut self, patch: &Patch, note: Note, velocity: Velocity, glide: bool) {
        self.note = Some(note);
        self.velocity = velocity;
        self.gate_state = GateState::Rising;

        let params = &patch.parameters;
        let pv = self.parameter_voice;
        let glide_rate = if glide {
            params.voice_value(pv, VoiceParam::GlideRate) as u8
        } else {
            0
        };
        self.glide.init(S816::from_int(note as i32), glide_rate);

        self.adsr = [
            params.voice_value(pv, VoiceParam::EnvAttack) as u8,
            params.voice_value(pv, VoiceParam::EnvDecay) as u8,
            params.voice_value(pv, VoiceParam::EnvSustain) as u8,
            params.voice_value(pv, VoiceParam::EnvRelease) as u8,
        ];

        // The wavetable arms on note-on only; the rate is live.
        let wavetable_idx = params.voice_value(pv, VoiceParam::WavetableIdx);
        if wavetable_idx > 0 {
            self.scanner
                .set_rate(params.voice_value(pv, VoiceParam::WavetableRate));
            self.scanner.set_source(Some(wavetable_idx as usize - 1));
        } else {
            self.scanner.reset();
        }
    }

    /// Release the gate if this voice is sounding `note`. The voice stays
    /// active until the following update has written the cleared gate.
    pub fn note_off(&mut self, note: Note) {
        if self.gate_state != GateState::Low && self.note == Some(note) {
            self.gate_state = GateState::Falling;
        }
    }

    pub fn active(&self) -> bool {
        self.note.is_some()
    }

    pub fn note(&self) -> Note {
        self.note.unwrap_or(midi::INVALID_NOTE)
    }

    pub fn gate_state(&self) -> GateState {
        self.gate_state
    }

    pub fn sid_voice(&self) -> VoiceIndex {
        VoiceIndex::from_usize(self.sid_voice).unwrap_or(VoiceIndex::Voice1)
    }

    /// One control tick: advance the modulators, then write this voice's
    /// registers. Order matters and is fixed: wavetable scan, glide,
    /// integral transpose, fractional fine offsets, frequency lookup, gate
    /// edge, register writes.
    pub fn update(
        &mut self,
        register_map: &mut RegisterMap,
        patch: &Patch,
        modulation_values: &ModulationValues,
    ) {
        if !self.active() {
            return;
        }
        let params = &patch.parameters;
        let pv = self.parameter_voice;
        let sid_voice = self.sid_voice();

        let mut wte = Entry::default();
        let mut transpose_enabled = false;
        let mut waveform_enabled = false;
        if let Some(table_idx) = self.scanner.source() {
            let table = &patch.wavetables[table_idx];
            self.scanner
                .set_rate(params.voice_value(pv, VoiceParam::WavetableRate));
            wte = self.scanner.update(table);
            transpose_enabled = self.scanner.track_enabled(table, TrackFlags::TRANSPOSE);
            waveform_enabled = self.scanner.track_enabled(table, TrackFlags::WAVEFORM);
        }

        // Glide first, then modulation, all in note units rather than
        // frequency units.
        self.glide.update();
        let mut note = self.glide.note();

        let mut note_offset = params.voice_value(pv, VoiceParam::TuneOctave) * 12
            + params.voice_value(pv, VoiceParam::TuneSemitone);
        if transpose_enabled {
            note_offset += i32::from(wte.transpose);
        }
        note.add_integral(note_offset);

        let freq_mod_src =
            ModSource::from_i32(params.voice_value(pv, VoiceParam::FreqModSrc)).unwrap_or_default();
        let mut fine_offset = modulation_values.get(
            freq_mod_src,
            params.voice_value(pv, VoiceParam::FreqModDepth),
            256.0,
        );
        fine_offset += params.voice_value(pv, VoiceParam::TuneFine);
        fine_offset += modulation_values.get(ModSource::PitchBend, 256, 512.0);

        // Fine units are 1/256 semitone; shift into the 16-bit fraction.
        note.add_fractional(fine_offset << 8);

        let freq = midi_to_osc_freq_fp(note);

        let mut gate_state = self.gate_state;
        match gate_state {
            GateState::Rising => {
                register_map.voice_set_adsr(sid_voice, self.adsr);
                gate_state = GateState::High;
            }
            GateState::Falling => {
                gate_state = GateState::Low;
                self.note = None;
            }
            GateState::Low | GateState::High => {}
        }

        register_map.voice_set_freq(sid_voice, freq);

        let pwm_mod_src =
            ModSource::from_i32(params.voice_value(pv, VoiceParam::PwmModSrc)).unwrap_or_default();
        let pwm_mod = modulation_values.get(
            pwm_mod_src,
            params.voice_value(pv, VoiceParam::PwmModDepth),
            2048.0,
        );
        let pwm = params.voice(pv, VoiceParam::OscPwm).modulate_value(pwm_mod);
        register_map.voice_set_pwm(sid_voice, pwm as u16);

        let wave = if waveform_enabled {
            wte.waveform
        } else {
            OscWave::from_selector(params.voice_value(pv, VoiceParam::OscWave))
        };

        register_map.voice_set_control(
            sid_voice,
            wave,
            params.voice_value(pv, VoiceParam::OscRing) != 0,
            params.voice_value(pv, VoiceParam::OscSync) != 0,
            gate_state == GateState::High,
        );

        self.gate_state = gate_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sid::registers::VoiceControlFlags;
    use crate::synth::parameters::ParameterRef;

    fn voice() -> SidVoice {
        let mut v = SidVoice::default();
        v.init(VoiceIndex::Voice1);
        v
    }

    fn control(map: &RegisterMap) -> VoiceControlFlags {
        map.voice_control(VoiceIndex::Voice1)
    }

    #[test]
    fn test_gate_cycle() {
        let patch = Patch::new();
        let modulation = ModulationValues::default();
        let mut map = RegisterMap::new();
        let mut v = voice();

        v.note_on(&patch, 60, 100, false);
        assert_eq!(v.gate_state(), GateState::Rising);

        v.update(&mut map, &patch, &modulation);
        assert_eq!(v.gate_state(), GateState::High);
        assert!(control(&map).contains(VoiceControlFlags::GATE));
        // ADSR was written on the rising edge (defaults: A0 D0 S15 R9).
        assert_eq!(map.peek(5), 0x00);
        assert_eq!(map.peek(6), 0xf9);

        v.note_off(60);
        assert_eq!(v.gate_state(), GateState::Falling);
        assert!(v.active());

        v.update(&mut map, &patch, &modulation);
        assert_eq!(v.gate_state(), GateState::Low);
        assert!(!v.active());
        assert!(!control(&map).contains(VoiceControlFlags::GATE));
        // Frequency survives the gate-off update for the release phase.
        assert_ne!(map.voice_get_freq(VoiceIndex::Voice1), 0);
    }

    #[test]
    fn test_note_off_other_note_ignored() {
        let patch = Patch::new();
        let mut v = voice();
        v.note_on(&patch, 60, 100, false);
        v.note_off(64);
        assert_eq!(v.gate_state(), GateState::Rising);
    }

    #[test]
    fn test_inactive_voice_writes_nothing() {
        let patch = Patch::new();
        let modulation = ModulationValues::default();
        let mut map = RegisterMap::new();
        let mut v = voice();
        v.update(&mut map, &patch, &modulation);
        assert_eq!(map.as_bytes(), &[0u8; 25]);
    }

    #[test]
    fn test_reset_clears_gate_but_keeps_note() {
        let patch = Patch::new();
        let modulation = ModulationValues::default();
        let mut map = RegisterMap::new();
        let mut v = voice();
        v.note_on(&patch, 60, 100, false);
        v.update(&mut map, &patch, &modulation);
        v.reset();
        assert_eq!(v.gate_state(), GateState::Falling);
        assert!(v.active());
        v.update(&mut map, &patch, &modulation);
        assert!(!v.active());
        assert!(!control(&map).contains(VoiceControlFlags::GATE));
    }

    #[test]
    fn test_transpose_parameters_shift_pitch() {
        let mut patch = Patch::new();
        let modulation = ModulationValues::default();
        let mut map = RegisterMap::new();
        let mut v = voice();

        v.note_on(&patch, 60, 100, false);
        v.update(&mut map, &patch, &modulation);
        let base = map.voice_get_freq(VoiceIndex::Voice1);

        patch
            .parameters
            .mutable_voice_value(ParameterRef::Voice(VoiceParam::TuneOctave), 0)
            .unwrap()
            .set(1);
        v.update(&mut map, &patch, &modulation);
        let up = map.voice_get_freq(VoiceIndex::Voice1);
        // One octave up doubles the frequency register value.
        assert!(u32::from(up).abs_diff(2 * u32::from(base)) <= 2);
    }

    #[test]
    fn test_wavetable_arpeggio_changes_freq() {
        let mut patch = Patch::new();
        let modulation = ModulationValues::default();
        let mut map = RegisterMap::new();
        let mut v = voice();

        // Table 1 (stock octave arp), fastest rate.
        patch
            .parameters
            .mutable_voice_value(ParameterRef::Voice(VoiceParam::WavetableIdx), 0)
            .unwrap()
            .set(1);
        patch
            .parameters
            .mutable_voice_value(ParameterRef::Voice(VoiceParam::WavetableRate), 0)
            .unwrap()
            .set(127);

        v.note_on(&patch, 60, 100, false);
        v.update(&mut map, &patch, &modulation);
        let step0 = map.voice_get_freq(VoiceIndex::Voice1);
        v.update(&mut map, &patch, &modulation);
        let step1 = map.voice_get_freq(VoiceIndex::Voice1);
        // Steps alternate between the root and an octave up.
        assert!(u32::from(step1).abs_diff(2 * u32::from(step0)) <= 2);
    }

    #[test]
    fn test_pwm_modulation_clamped() {
        let mut patch = Patch::new();
        let mut modulation = ModulationValues::default();
        let mut map = RegisterMap::new();
        let mut v = voice();

        patch
            .parameters
            .mutable_voice_value(ParameterRef::Voice(VoiceParam::PwmModSrc), 0)
            .unwrap()
            .set(1); // LFO1
        patch
            .parameters
            .mutable_voice_value(ParameterRef::Voice(VoiceParam::PwmModDepth), 0)
            .unwrap()
            .set(255);
        patch
            .parameters
            .mutable_voice_value(ParameterRef::Voice(VoiceParam::OscPwm), 0)
            .unwrap()
            .set(3000);
        modulation.set(ModSource::Lfo1, 1.0);

        v.note_on(&patch, 60, 100, false);
        v.update(&mut map, &patch, &modulation);
        // 3000 + 255/256 * 2048 overshoots and clamps at the maximum.
        assert_eq!(map.voice_get_pwm(VoiceIndex::Voice1), 4095);

        modulation.set(ModSource::Lfo1, -1.0);
        v.update(&mut map, &patch, &modulation);
        assert_eq!(map.voice_get_pwm(VoiceIndex::Voice1), 3000 - 2040);
    }
}
