//! SID register map and register-level types
//!
//! A [`RegisterMap`] is a plain 25-byte image of the chip's register file
//! with typed setters for the fields the synth drives. Voices occupy seven
//! bytes each from offset 0; the filter block sits at 0x15-0x18.

use bitflags::bitflags;

use super::SID_REGISTER_COUNT;

/// Per-voice register offsets (relative to the voice base).
pub const VOICE_FREQ_LO: usize = 0;
pub const VOICE_FREQ_HI: usize = 1;
pub const VOICE_PWM_LO: usize = 2;
pub const VOICE_PWM_HI: usize = 3;
pub const VOICE_CONTROL: usize = 4;
pub const VOICE_ENV_AD: usize = 5;
pub const VOICE_ENV_SR: usize = 6;
pub const VOICE_REG_COUNT: usize = 7;

/// Filter block offsets.
pub const FILTER_CUTOFF_LO: usize = 0x15;
pub const FILTER_CUTOFF_HI: usize = 0x16;
pub const FILTER_RES_FILT: usize = 0x17;
pub const FILTER_MODE_VOL: usize = 0x18;

/// One of the chip's three voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_derive::FromPrimitive)]
pub enum VoiceIndex {
    Voice1 = 0,
    Voice2 = 1,
    Voice3 = 2,
}

impl VoiceIndex {
    pub const ALL: [VoiceIndex; 3] = [VoiceIndex::Voice1, VoiceIndex::Voice2, VoiceIndex::Voice3];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    fn base(self) -> usize {
        self.index() * VOICE_REG_COUNT
    }
}

bitflags! {
    /// Voice control register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VoiceControlFlags: u8 {
        const GATE = 0x01;
        const SYNC = 0x02;
        const RING = 0x04;
        const TEST = 0x08;
        /// Waveform selection bits.
        const WAVE = 0xf0;
    }
}

bitflags! {
    /// Filter routing bits (low nibble of the RES/FILT register).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterRouting: u8 {
        const VOICE1 = 0x01;
        const VOICE2 = 0x02;
        const VOICE3 = 0x04;
        const EXT = 0x08;
    }
}

/// Oscillator waveform, as register bits. The combined waveforms select
/// more than one generator; noise never combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OscWave {
    #[default]
    Silence = 0x00,
    Tri = 0x10,
    Saw = 0x20,
    PulseTri = 0x50,
    PulseSaw = 0x60,
    SawTri = 0x30,
    PulseSawTri = 0x70,
    Pulse = 0x40,
    Noise = 0x80,
}

impl OscWave {
    /// Map the patch parameter's waveform selector (0-8) to register bits.
    pub fn from_selector(value: i32) -> Self {
        match value {
            1 => OscWave::Tri,
            2 => OscWave::Saw,
            3 => OscWave::Pulse,
            4 => OscWave::PulseTri,
            5 => OscWave::PulseSaw,
            6 => OscWave::SawTri,
            7 => OscWave::PulseSawTri,
            8 => OscWave::Noise,
            _ => OscWave::Silence,
        }
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Filter response, as register bits. Low-pass plus high-pass gives notch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FilterMode {
    #[default]
    Off = 0x00,
    LowPass = 0x10,
    BandPass = 0x20,
    HighPass = 0x40,
    Notch = 0x50,
}

impl FilterMode {
    /// Map the patch parameter's filter selector (0-4) to register bits.
    pub fn from_selector(value: i32) -> Self {
        match value {
            1 => FilterMode::LowPass,
            2 => FilterMode::BandPass,
            3 => FilterMode::HighPass,
            4 => FilterMode::Notch,
            _ => FilterMode::Off,
        }
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Full register image. Cheap to copy and compare, which the diffing
/// chip wrapper relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterMap {
    registers: [u8; SID_REGISTER_COUNT],
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.registers = [0; SID_REGISTER_COUNT];
    }

    /// 16-bit oscillator frequency.
    pub fn voice_set_freq(&mut self, voice: VoiceIndex, freq: u16) {
        let base = voice.base();
        self.registers[base + VOICE_FREQ_LO] = (freq & 0xff) as u8;
        self.registers[base + VOICE_FREQ_HI] = (freq >> 8) as u8;
    }

    pub fn voice_get_freq(&self, voice: VoiceIndex) -> u16 {
        let base = voice.base();
        u16::from(self.registers[base + VOICE_FREQ_HI]) << 8
            | u16::from(self.registers[base + VOICE_FREQ_LO])
    }

    /// 12-bit pulse duty cycle.
    pub fn voice_set_pwm(&mut self, voice: VoiceIndex, duty_cycle: u16) {
        let base = voice.base();
        self.registers[base + VOICE_PWM_LO] = (duty_cycle & 0xff) as u8;
        self.registers[base + VOICE_PWM_HI] = ((duty_cycle >> 8) & 0x0f) as u8;
    }

    pub fn voice_get_pwm(&self, voice: VoiceIndex) -> u16 {
        let base = voice.base();
        u16::from(self.registers[base + VOICE_PWM_HI] & 0x0f) << 8
            | u16::from(self.registers[base + VOICE_PWM_LO])
    }

    /// Replace the waveform bits, leaving gate/sync/ring/test alone.
    pub fn voice_set_waveform(&mut self, voice: VoiceIndex, wave: OscWave) {
        let reg = &mut self.registers[voice.base() + VOICE_CONTROL];
        *reg = (*reg & !VoiceControlFlags::WAVE.bits()) | wave.bits();
    }

    /// Nibble-packed envelope: attack/decay and sustain/release.
    pub fn voice_set_adsr(&mut self, voice: VoiceIndex, adsr: [u8; 4]) {
        let base = voice.base();
        self.registers[base + VOICE_ENV_AD] = (adsr[0] & 0xf) << 4 | (adsr[1] & 0xf);
        self.registers[base + VOICE_ENV_SR] = (adsr[2] & 0xf) << 4 | (adsr[3] & 0xf);
    }

    fn set_control_flag(&mut self, voice: VoiceIndex, flag: VoiceControlFlags, enable: bool) {
        let reg = &mut self.registers[voice.base() + VOICE_CONTROL];
        if enable {
            *reg |= flag.bits();
        } else {
            *reg &= !flag.bits();
        }
    }

    pub fn voice_set_ring(&mut self, voice: VoiceIndex, enable: bool) {
        self.set_control_flag(voice, VoiceControlFlags::RING, enable);
    }

    pub fn voice_set_sync(&mut self, voice: VoiceIndex, enable: bool) {
        self.set_control_flag(voice, VoiceControlFlags::SYNC, enable);
    }

    pub fn voice_set_gate(&mut self, voice: VoiceIndex, enable: bool) {
        self.set_control_flag(voice, VoiceControlFlags::GATE, enable);
    }

    /// Write the whole control byte at once.
    pub fn voice_set_control(
        &mut self,
        voice: VoiceIndex,
        wave: OscWave,
        ring: bool,
        sync: bool,
        gate: bool,
    ) {
        let mut control = wave.bits();
        if ring {
            control |= VoiceControlFlags::RING.bits();
        }
        if sync {
            control |= VoiceControlFlags::SYNC.bits();
        }
        if gate {
            control |= VoiceControlFlags::GATE.bits();
        }
        self.registers[voice.base() + VOICE_CONTROL] = control;
    }

    pub fn voice_control(&self, voice: VoiceIndex) -> VoiceControlFlags {
        VoiceControlFlags::from_bits_retain(self.registers[voice.base() + VOICE_CONTROL])
    }

    /// 11-bit filter cutoff: three low bits, then eight high bits.
    pub fn filter_set_freq(&mut self, freq: u16) {
        self.registers[FILTER_CUTOFF_LO] = (freq & 0x07) as u8;
        self.registers[FILTER_CUTOFF_HI] = ((freq >> 3) & 0xff) as u8;
    }

    pub fn filter_get_freq(&self) -> u16 {
        u16::from(self.registers[FILTER_CUTOFF_HI]) << 3
            | u16::from(self.registers[FILTER_CUTOFF_LO] & 0x07)
    }

    /// Resonance in the high nibble, voice routing in the low.
    pub fn filter_set_resonance_enable(&mut self, resonance: u8, routing: FilterRouting) {
        self.registers[FILTER_RES_FILT] = (resonance & 0xf) << 4 | routing.bits();
    }

    pub fn filter_routing(&self) -> FilterRouting {
        FilterRouting::from_bits_truncate(self.registers[FILTER_RES_FILT])
    }

    /// Filter mode bits, master volume, and the voice-3-off mute.
    pub fn filter_set_mode_volume(&mut self, mode: FilterMode, volume: u8, mute3: bool) {
        let mut r = mode.bits() | (volume & 0xf);
        if mute3 {
            r |= 0x80;
        }
        self.registers[FILTER_MODE_VOL] = r;
    }

    pub fn poke(&mut self, reg: usize, value: u8) {
        self.registers[reg] = value;
    }

    pub fn peek(&self, reg: usize) -> u8 {
        self.registers[reg]
    }

    pub fn as_bytes(&self) -> &[u8; SID_REGISTER_COUNT] {
        &self.registers
    }

    /// Hex dump for diagnostics, voice rows then the filter block.
    pub fn hex_dump(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for voice in VoiceIndex::ALL {
            let base = voice.base();
            let _ = write!(out, "v{}:", voice.index() + 1);
            for reg in &self.registers[base..base + VOICE_REG_COUNT] {
                let _ = write!(out, " {reg:02x}");
            }
            out.push('\n');
        }
        let _ = write!(out, "f :");
        for reg in &self.registers[FILTER_CUTOFF_LO..=FILTER_MODE_VOL] {
            let _ = write!(out, " {reg:02x}");
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_bases() {
        let mut map = RegisterMap::new();
        map.voice_set_freq(VoiceIndex::Voice1, 0x1234);
        map.voice_set_freq(VoiceIndex::Voice2, 0x5678);
        map.voice_set_freq(VoiceIndex::Voice3, 0x9abc);
        assert_eq!(map.peek(0), 0x34);
        assert_eq!(map.peek(1), 0x12);
        assert_eq!(map.peek(7), 0x78);
        assert_eq!(map.peek(8), 0x56);
        assert_eq!(map.peek(14), 0xbc);
        assert_eq!(map.peek(15), 0x9a);
        assert_eq!(map.voice_get_freq(VoiceIndex::Voice2), 0x5678);
    }

    #[test]
    fn test_pwm_is_12_bit() {
        let mut map = RegisterMap::new();
        map.voice_set_pwm(VoiceIndex::Voice1, 0xffff);
        assert_eq!(map.voice_get_pwm(VoiceIndex::Voice1), 0x0fff);
    }

    #[test]
    fn test_waveform_preserves_gate() {
        let mut map = RegisterMap::new();
        map.voice_set_gate(VoiceIndex::Voice1, true);
        map.voice_set_waveform(VoiceIndex::Voice1, OscWave::Saw);
        assert!(map.voice_control(VoiceIndex::Voice1).contains(VoiceControlFlags::GATE));
        map.voice_set_waveform(VoiceIndex::Voice1, OscWave::Pulse);
        let control = map.voice_control(VoiceIndex::Voice1);
        assert!(control.contains(VoiceControlFlags::GATE));
        assert_eq!(control.bits() & 0xf0, OscWave::Pulse.bits());
    }

    #[test]
    fn test_control_flags_toggle_independently() {
        let mut map = RegisterMap::new();
        map.voice_set_waveform(VoiceIndex::Voice1, OscWave::Tri);
        map.voice_set_gate(VoiceIndex::Voice1, true);
        map.voice_set_ring(VoiceIndex::Voice1, true);
        map.voice_set_sync(VoiceIndex::Voice1, true);
        let control = map.voice_control(VoiceIndex::Voice1);
        assert!(control.contains(VoiceControlFlags::GATE));
        assert!(control.contains(VoiceControlFlags::RING));
        assert!(control.contains(VoiceControlFlags::SYNC));

        map.voice_set_ring(VoiceIndex::Voice1, false);
        let control = map.voice_control(VoiceIndex::Voice1);
        assert!(!control.contains(VoiceControlFlags::RING));
        assert!(control.contains(VoiceControlFlags::GATE));
        assert!(control.contains(VoiceControlFlags::SYNC));
        assert_eq!(control.bits() & 0xf0, OscWave::Tri.bits());
    }

    #[test]
    fn test_adsr_packing() {
        let mut map = RegisterMap::new();
        map.voice_set_adsr(VoiceIndex::Voice2, [0x1, 0x2, 0xf, 0x9]);
        assert_eq!(map.peek(7 + VOICE_ENV_AD), 0x12);
        assert_eq!(map.peek(7 + VOICE_ENV_SR), 0xf9);
    }

    #[test]
    fn test_filter_cutoff_split() {
        let mut map = RegisterMap::new();
        map.filter_set_freq(0x3ff);
        assert_eq!(map.peek(FILTER_CUTOFF_LO), 0x07);
        assert_eq!(map.peek(FILTER_CUTOFF_HI), 0x7f);
        assert_eq!(map.filter_get_freq(), 0x3ff);
    }

    #[test]
    fn test_filter_res_filt() {
        let mut map = RegisterMap::new();
        map.filter_set_resonance_enable(0xf, FilterRouting::VOICE1 | FilterRouting::VOICE3);
        assert_eq!(map.peek(FILTER_RES_FILT), 0xf5);
    }

    #[test]
    fn test_mode_volume() {
        let mut map = RegisterMap::new();
        map.filter_set_mode_volume(FilterMode::LowPass, 15, false);
        assert_eq!(map.peek(FILTER_MODE_VOL), 0x1f);
        map.filter_set_mode_volume(FilterMode::Notch, 8, true);
        assert_eq!(map.peek(FILTER_MODE_VOL), 0xd8);
    }

    #[test]
    fn test_waveform_selector_mapping() {
        assert_eq!(OscWave::from_selector(0), OscWave::Silence);
        assert_eq!(OscWave::from_selector(2), OscWave::Saw);
        assert_eq!(OscWave::from_selector(7), OscWave::PulseSawTri);
        assert_eq!(OscWave::PulseSawTri.bits(), 0x70);
        assert_eq!(OscWave::from_selector(8), OscWave::Noise);
        assert_eq!(OscWave::from_selector(99), OscWave::Silence);
    }
}
