//! The synthesizer front-end
//!
//! Ties together voices, LFOs, allocators and the filter section, and
//! assembles the full register image once per control tick. MIDI events
//! only mutate state; all register writes happen inside [`update`].
//!
//! [`update`]: SidSynth::update

use log::debug;
use num_traits::FromPrimitive;

use crate::midi::{Channel, MidiHandler, Note, Velocity};
use crate::sid::freq_table::midi_to_filter_freq;
use crate::sid::registers::{FilterMode, FilterRouting, RegisterMap, VoiceIndex};
use crate::synth::lfo::{Lfo, LfoShape, LfoSync};
use crate::synth::modulation::{ModSource, ModulationValues};
use crate::synth::note_stack::NoteStack;
use crate::synth::parameters::{Global, LfoParam, ParameterListener};
use crate::synth::patch::Patch;
use crate::synth::voice::SidVoice;
use crate::synth::voice_allocator::{StealStrategy, VoiceAllocator};
use crate::synth::{VoiceMode, NUM_LFOS, NUM_VOICES};

/// Held-note history depth for mono/unison fallback.
const NOTE_STACK_DEPTH: usize = 8;

pub struct SidSynth {
    patch: Patch,

    register_map: RegisterMap,
    midi_channel: Channel,

    voices: [SidVoice; NUM_VOICES],
    lfos: [Lfo; NUM_LFOS],

    filter_key_tracking: i32,
    pitch_bend: f32,
    modulation_values: ModulationValues,

    voice_mode: VoiceMode,

    mono_notes: NoteStack<NOTE_STACK_DEPTH>,
    poly_allocator: VoiceAllocator<NUM_VOICES>,
    played_notes: NoteStack<NOTE_STACK_DEPTH>,
}

impl Default for SidSynth {
    fn default() -> Self {
        Self::new(Patch::default())
    }
}

impl SidSynth {
    pub fn new(patch: Patch) -> Self {
        let mut synth = Self {
            patch,
            register_map: RegisterMap::new(),
            midi_channel: 0,
            voices: Default::default(),
            lfos: Default::default(),
            filter_key_tracking: 0,
            pitch_bend: 0.0,
            modulation_values: ModulationValues::default(),
            voice_mode: VoiceMode::Unison,
            mono_notes: NoteStack::new(),
            poly_allocator: VoiceAllocator::new(StealStrategy::Lru),
            played_notes: NoteStack::new(),
        };
        for (i, voice) in synth.voices.iter_mut().enumerate() {
            voice.init(VoiceIndex::ALL[i]);
        }
        for i in 0..NUM_LFOS {
            let phase = synth.patch.parameters.lfo_value(i, LfoParam::Phase);
            synth.lfos[i].init(phase);
        }
        let mode = VoiceMode::from_i32(synth.patch.parameters.global_value(Global::VoiceMode))
            .unwrap_or(VoiceMode::Poly);
        synth.set_voice_mode(mode, true);
        synth.reset();
        synth
    }

    pub fn reset(&mut self) {
        self.register_map.reset();
        for voice in &mut self.voices {
            voice.reset();
        }
        for lfo in &mut self.lfos {
            lfo.reset(0);
        }
        self.filter_key_tracking = 0;
        self.pitch_bend = 0.0;
        self.mono_notes.clear();
        self.poly_allocator.clear();
        self.played_notes.clear();
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn patch_mut(&mut self) -> &mut Patch {
        &mut self.patch
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.register_map
    }

    pub fn voice_active(&self, index: usize) -> bool {
        self.voices[index].active()
    }

    pub fn voice_mode(&self) -> VoiceMode {
        self.voice_mode
    }

    pub fn bend(&self) -> f32 {
        self.pitch_bend
    }

    /// MIDI channel this synth listens on (0-based wire numbering).
    pub fn set_midi_channel(&mut self, channel: Channel) {
        if channel != self.midi_channel {
            self.all_notes_off();
            self.midi_channel = channel;
        }
    }

    /// Switch between poly and unison. Any change resets all voices; in
    /// poly mode every voice reads voice 1's parameter bank, in unison
    /// each voice keeps its own.
    pub fn set_voice_mode(&mut self, voice_mode: VoiceMode, force: bool) {
        if self.voice_mode != voice_mode || force {
            debug!("voice mode -> {voice_mode:?}");
            for voice in &mut self.voices {
                voice.reset();
            }
            match voice_mode {
                VoiceMode::Unison => {
                    self.mono_notes.clear();
                    for (i, voice) in self.voices.iter_mut().enumerate() {
                        voice.set_parameter_voice(VoiceIndex::ALL[i]);
                    }
                }
                VoiceMode::Poly => {
                    self.poly_allocator.clear();
                    for voice in &mut self.voices {
                        voice.set_parameter_voice(VoiceIndex::Voice1);
                    }
                }
            }
            self.voice_mode = voice_mode;
        }
    }

    /// Strike a note. Velocity zero is a note-off, per MIDI running status
    /// convention.
    pub fn note_on(&mut self, note: Note, velocity: Velocity) {
        if velocity == 0 {
            self.note_off(note);
            return;
        }
        let mut struck = false;
        match self.voice_mode {
            VoiceMode::Poly => {
                if let Some(v) = self.poly_allocator.note_on(note) {
                    self.voices[v].note_on(&self.patch, note, velocity, false);
                    struck = true;
                }
            }
            VoiceMode::Unison => {
                // Glide only when another note is already held.
                let glide = !self.mono_notes.is_empty();
                self.mono_notes.note_on(note, velocity);
                for voice in &mut self.voices {
                    voice.note_on(&self.patch, note, velocity, glide);
                }
                struck = true;
            }
        }
        if struck {
            self.played_notes.note_on(note, velocity);
            self.sync_lfos();
        }
    }

    pub fn note_off(&mut self, note: Note) {
        self.played_notes.note_off(note);
        match self.voice_mode {
            VoiceMode::Poly => {
                if let Some(v) = self.poly_allocator.note_off(note) {
                    self.voices[v].note_off(note);
                }
            }
            VoiceMode::Unison => {
                for voice in &mut self.voices {
                    voice.note_off(note);
                }
                self.mono_notes.note_off(note);
                // Fall back to the most recent note still held. This does
                // not resync the LFOs; sync applies to fresh strikes only.
                if let Some(held) = self.mono_notes.active_note() {
                    self.played_notes.note_on(held.note, held.velocity);
                    for voice in &mut self.voices {
                        voice.note_on(&self.patch, held.note, held.velocity, true);
                    }
                }
            }
        }
    }

    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        self.filter_key_tracking = 0;
        self.pitch_bend = 0.0;
        self.mono_notes.clear();
        self.poly_allocator.clear();
        self.played_notes.clear();
    }

    pub fn set_pitch_bend(&mut self, bend: i16) {
        self.pitch_bend = f32::from(bend) / 8192.0;
    }

    /// One control tick: refresh modulation sources, write the filter
    /// block, then update every voice.
    pub fn update(&mut self) {
        self.update_modulation();

        let params = &self.patch.parameters;

        let res_mod_src =
            ModSource::from_i32(params.global_value(Global::FilterResModSrc)).unwrap_or_default();
        let res_mod = self.modulation_values.get(
            res_mod_src,
            params.global_value(Global::FilterResModDepth),
            16.0,
        );
        let filter_res = params.global(Global::FilterRes).modulate_value(res_mod) as u8;

        // In poly mode all voices share voice 1's routing enable; they all
        // play the same patch, so a per-voice switch would be surprising.
        let routing = match self.voice_mode {
            VoiceMode::Poly => {
                let enable = params.global_value(Global::FilterVoice1Enable) != 0;
                let mut routing = FilterRouting::empty();
                routing.set(FilterRouting::VOICE1, enable);
                routing.set(FilterRouting::VOICE2, enable);
                routing.set(FilterRouting::VOICE3, enable);
                routing
            }
            VoiceMode::Unison => {
                let mut routing = FilterRouting::empty();
                routing.set(
                    FilterRouting::VOICE1,
                    params.global_value(Global::FilterVoice1Enable) != 0,
                );
                routing.set(
                    FilterRouting::VOICE2,
                    params.global_value(Global::FilterVoice2Enable) != 0,
                );
                routing.set(
                    FilterRouting::VOICE3,
                    params.global_value(Global::FilterVoice3Enable) != 0,
                );
                routing
            }
        };
        self.register_map
            .filter_set_resonance_enable(filter_res, routing);

        let freq_mod_src =
            ModSource::from_i32(params.global_value(Global::FilterFreqModSrc)).unwrap_or_default();
        let mut f_mod = self.modulation_values.get(
            freq_mod_src,
            params.global_value(Global::FilterFreqModDepth),
            1024.0,
        );

        // Key tracking follows the held notes but holds its last value
        // when everything is released, avoiding a cutoff jump during the
        // release phase.
        if !self.played_notes.is_empty() {
            let sorted = self.played_notes.sorted_notes();
            let tracked = if params.global_value(Global::FilterKeyTrackNote) == 0 {
                sorted[sorted.len() - 1].note
            } else {
                sorted[0].note
            };
            self.filter_key_tracking = midi_to_filter_freq(
                i32::from(tracked),
                params.global_value(Global::FilterKeyTracking),
            );
        }
        f_mod += self.filter_key_tracking;
        let ff = params.global(Global::FilterFreq).modulate_value(f_mod);
        self.register_map.filter_set_freq(ff as u16);

        self.register_map.filter_set_mode_volume(
            FilterMode::from_selector(params.global_value(Global::FilterMode)),
            params.global_value(Global::Volume) as u8,
            params.global_value(Global::Filter3Off) != 0,
        );

        let patch = &self.patch;
        for voice in &mut self.voices {
            voice.update(&mut self.register_map, patch, &self.modulation_values);
        }
    }

    fn update_modulation(&mut self) {
        for i in 0..NUM_LFOS {
            let params = &self.patch.parameters;
            let rate = params.lfo_value(i, LfoParam::Rate) as u8;
            let shape =
                LfoShape::from_i32(params.lfo_value(i, LfoParam::Shape)).unwrap_or_default();
            let abs = params.lfo_value(i, LfoParam::Abs) != 0;
            let value = self.lfos[i].update(rate, shape, abs);
            if let Some(source) = ModSource::from_usize(i + 1) {
                self.modulation_values.set(source, value);
            }
        }
        self.modulation_values
            .set(ModSource::PitchBend, self.pitch_bend);
    }

    /// Arm a phase reset on every LFO whose sync parameter asks for it.
    fn sync_lfos(&mut self) {
        for i in 0..NUM_LFOS {
            let params = &self.patch.parameters;
            let sync =
                LfoSync::from_i32(params.lfo_value(i, LfoParam::Sync)).unwrap_or_default();
            if sync == LfoSync::NoteOn {
                let phase = params.lfo_value(i, LfoParam::Phase);
                self.lfos[i].reset(phase);
            }
        }
    }
}

impl MidiHandler for SidSynth {
    fn note_on(&mut self, channel: Channel, note: Note, velocity: Velocity) {
        if channel == self.midi_channel {
            SidSynth::note_on(self, note, velocity);
        }
    }

    fn note_off(&mut self, channel: Channel, note: Note) {
        if channel == self.midi_channel {
            SidSynth::note_off(self, note);
        }
    }

    fn pitch_bend(&mut self, channel: Channel, bend: i16) {
        if channel == self.midi_channel {
            self.set_pitch_bend(bend);
        }
    }

    fn all_notes_off(&mut self) {
        SidSynth::all_notes_off(self);
    }
}

impl ParameterListener for SidSynth {
    fn global_parameter_changed(&mut self, parameter: Global) {
        if parameter == Global::VoiceMode {
            let mode = VoiceMode::from_i32(self.patch.parameters.global_value(Global::VoiceMode))
                .unwrap_or(VoiceMode::Poly);
            self.set_voice_mode(mode, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sid::registers::{VoiceControlFlags, FILTER_MODE_VOL, FILTER_RES_FILT};
    use crate::synth::parameters::ParameterRef;

    fn poly_synth() -> SidSynth {
        let mut patch = Patch::default();
        patch
            .parameters
            .mutable_value(ParameterRef::Global(Global::VoiceMode))
            .unwrap()
            .set(VoiceMode::Poly as i32);
        SidSynth::new(patch)
    }

    fn unison_synth() -> SidSynth {
        let mut patch = Patch::default();
        patch
            .parameters
            .mutable_value(ParameterRef::Global(Global::VoiceMode))
            .unwrap()
            .set(VoiceMode::Unison as i32);
        SidSynth::new(patch)
    }

    fn gate_on(synth: &SidSynth, voice: VoiceIndex) -> bool {
        synth
            .register_map()
            .voice_control(voice)
            .contains(VoiceControlFlags::GATE)
    }

    #[test]
    fn test_poly_allocates_three_voices() {
        let mut synth = poly_synth();
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        synth.note_on(67, 100);
        synth.update();
        for voice in VoiceIndex::ALL {
            assert!(gate_on(&synth, voice));
        }
        let freqs: Vec<u16> = VoiceIndex::ALL
            .iter()
            .map(|&v| synth.register_map().voice_get_freq(v))
            .collect();
        assert!(freqs[0] < freqs[1] && freqs[1] < freqs[2]);
    }

    #[test]
    fn test_poly_steals_oldest() {
        let mut synth = poly_synth();
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        synth.note_on(67, 100);
        synth.note_on(71, 100); // steals voice 0 (oldest)
        synth.update();
        let freq0 = synth.register_map().voice_get_freq(VoiceIndex::Voice1);
        let freq2 = synth.register_map().voice_get_freq(VoiceIndex::Voice3);
        assert!(freq0 > freq2);
    }

    #[test]
    fn test_default_mode_is_poly() {
        let synth = SidSynth::default();
        assert_eq!(synth.voice_mode(), VoiceMode::Poly);
    }

    #[test]
    fn test_unison_drives_all_voices() {
        let mut synth = unison_synth();
        assert_eq!(synth.voice_mode(), VoiceMode::Unison);
        synth.note_on(60, 100);
        synth.update();
        let freqs: Vec<u16> = VoiceIndex::ALL
            .iter()
            .map(|&v| synth.register_map().voice_get_freq(v))
            .collect();
        assert!(freqs[0] > 0);
        assert_eq!(freqs[0], freqs[1]);
        assert_eq!(freqs[1], freqs[2]);
    }

    #[test]
    fn test_unison_fallback_to_held_note() {
        let mut synth = unison_synth();
        synth.note_on(60, 100);
        synth.update();
        synth.note_on(72, 100);
        synth.update();
        synth.note_off(72);
        // Falls back to 60 (with glide) instead of releasing.
        synth.update();
        assert!(gate_on(&synth, VoiceIndex::Voice1));
        assert!(synth.voice_active(0));
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let mut synth = poly_synth();
        synth.note_on(60, 100);
        synth.update();
        assert!(gate_on(&synth, VoiceIndex::Voice1));
        synth.note_on(60, 0);
        synth.update();
        assert!(!gate_on(&synth, VoiceIndex::Voice1));
    }

    #[test]
    fn test_voice_mode_switch_resets_voices() {
        let mut synth = poly_synth();
        synth.note_on(60, 100);
        synth.update();
        synth
            .patch_mut()
            .parameters
            .mutable_value(ParameterRef::Global(Global::VoiceMode))
            .unwrap()
            .set(VoiceMode::Unison as i32);
        synth.global_parameter_changed(Global::VoiceMode);
        assert_eq!(synth.voice_mode(), VoiceMode::Unison);
        synth.update();
        assert!(!gate_on(&synth, VoiceIndex::Voice1));
    }

    #[test]
    fn test_filter_block_written() {
        let mut synth = poly_synth();
        synth.update();
        // Default volume 15, filter mode LP.
        assert_eq!(
            synth.register_map().peek(FILTER_MODE_VOL),
            FilterMode::LowPass.bits() | 0x0f
        );
        // Default routing: all off, resonance 0.
        assert_eq!(synth.register_map().peek(FILTER_RES_FILT), 0x00);
        // Default cutoff 512.
        assert_eq!(synth.register_map().filter_get_freq(), 512);
    }

    #[test]
    fn test_key_tracking_follows_highest_note() {
        let mut synth = poly_synth();
        synth
            .patch_mut()
            .parameters
            .mutable_value(ParameterRef::Global(Global::FilterKeyTracking))
            .unwrap()
            // Moderate slope keeps both readings inside the cutoff range
            // so the comparison is meaningful.
            .set(16);
        synth.note_on(48, 100);
        synth.update();
        let low = synth.register_map().filter_get_freq();
        synth.note_on(96, 100);
        synth.update();
        let high = synth.register_map().filter_get_freq();
        assert!(high > low);
        // Tracking holds after release.
        synth.note_off(96);
        synth.note_off(48);
        synth.update();
        assert_eq!(synth.register_map().filter_get_freq(), high);
    }

    #[test]
    fn test_pitch_bend_normalized() {
        let mut synth = poly_synth();
        synth.set_pitch_bend(8191);
        assert!((synth.bend() - 1.0).abs() < 1e-3);
        synth.set_pitch_bend(-8192);
        assert!((synth.bend() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_midi_channel_filter() {
        let mut synth = poly_synth();
        MidiHandler::note_on(&mut synth, 5, 60, 100);
        synth.update();
        assert!(!gate_on(&synth, VoiceIndex::Voice1));
        MidiHandler::note_on(&mut synth, 0, 60, 100);
        synth.update();
        assert!(gate_on(&synth, VoiceIndex::Voice1));
    }
}
