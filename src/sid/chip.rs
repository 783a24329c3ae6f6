//! SID chip backend trait and a software reference model
//!
//! The engine talks to the chip through [`SidBackend`] so that the register
//! diffing and block rendering stay independent of the actual emulation.
//! [`SoftSid`] is a self-contained model of the 6581/8580: 24-bit phase
//! accumulators, the classic waveform set with hard sync and ring
//! modulation, per-voice ADSR envelopes and a state-variable filter. It is
//! not cycle-exact, but it honors the register semantics closely enough to
//! make every control path audible and testable.

use std::f32::consts::PI;

use super::{ChipModel, SID_REGISTER_COUNT};
use crate::sid::registers::{
    FILTER_CUTOFF_HI, FILTER_CUTOFF_LO, FILTER_MODE_VOL, FILTER_RES_FILT,
};

/// Abstraction over a SID emulation core.
pub trait SidBackend {
    /// Configure the chip clock and the output sample rate.
    fn set_sampling(&mut self, clock_hz: f64, sample_rate: u32);

    /// Select the chip revision being modelled.
    fn set_chip_model(&mut self, model: ChipModel);

    /// Return the chip to power-on state.
    fn reset(&mut self);

    /// Write one register byte.
    fn write_register(&mut self, reg: u8, value: u8);

    /// Advance the chip by `delta_cycles` clock cycles, emitting samples
    /// into `out`. Returns the number of samples produced. Sub-sample cycle
    /// remainders carry into the next call; whole cycles left over once
    /// `out` is full are discarded.
    fn clock(&mut self, delta_cycles: u32, out: &mut [i16]) -> usize;
}

/// Rate-counter periods (in chip cycles per envelope step) indexed by the
/// 4-bit attack/decay/release nibble.
const ENVELOPE_RATE_PERIODS: [u32; 16] = [
    9, 32, 63, 95, 149, 220, 267, 313, 392, 977, 1954, 3126, 3907, 11720, 19532, 31251,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvelopeState {
    Attack,
    DecaySustain,
    Release,
}

/// One ADSR envelope generator with an 8-bit output level.
#[derive(Debug, Clone, Copy)]
struct Envelope {
    state: EnvelopeState,
    level: u8,
    rate_counter: u32,
    attack: u8,
    decay: u8,
    sustain: u8,
    release: u8,
    gate: bool,
}

impl Envelope {
    fn new() -> Self {
        Self {
            state: EnvelopeState::Release,
            level: 0,
            rate_counter: 0,
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            gate: false,
        }
    }

    fn set_gate(&mut self, gate: bool) {
        if gate && !self.gate {
            self.state = EnvelopeState::Attack;
            self.rate_counter = 0;
        } else if !gate && self.gate {
            self.state = EnvelopeState::Release;
            self.rate_counter = 0;
        }
        self.gate = gate;
    }

    /// Slowdown factor for the falling segments, approximating the
    /// exponential shape of the hardware counter.
    fn exp_factor(level: u8) -> u32 {
        match level {
            93..=255 => 1,
            54..=92 => 2,
            26..=53 => 4,
            14..=25 => 8,
            6..=13 => 16,
            _ => 30,
        }
    }

    fn clock(&mut self, cycles: u32) {
        self.rate_counter += cycles;
        let (nibble, falling) = match self.state {
            EnvelopeState::Attack => (self.attack, false),
            EnvelopeState::DecaySustain => (self.decay, true),
            EnvelopeState::Release => (self.release, true),
        };
        let mut period = ENVELOPE_RATE_PERIODS[(nibble & 0x0f) as usize];
        if falling {
            period *= Self::exp_factor(self.level);
        }

        while self.rate_counter >= period {
            self.rate_counter -= period;
            match self.state {
                EnvelopeState::Attack => {
                    self.level = self.level.saturating_add(1);
                    if self.level == 0xff {
                        self.state = EnvelopeState::DecaySustain;
                    }
                }
                EnvelopeState::DecaySustain => {
                    let sustain_level = (self.sustain << 4) | self.sustain;
                    if self.level > sustain_level {
                        self.level -= 1;
                    } else {
                        // Holding at sustain: cap the counter so cycles do
                        // not bank up into a burst of release steps later.
                        self.rate_counter = self.rate_counter.min(period);
                        break;
                    }
                }
                EnvelopeState::Release => {
                    if self.level > 0 {
                        self.level -= 1;
                    } else {
                        self.rate_counter = self.rate_counter.min(period);
                        break;
                    }
                }
            }
            // The slowdown factor changes with the level, re-derive it.
            if falling {
                period = ENVELOPE_RATE_PERIODS[(nibble & 0x0f) as usize]
                    * Self::exp_factor(self.level);
            }
        }
    }
}

/// One tone oscillator with its 24-bit phase accumulator.
#[derive(Debug, Clone, Copy)]
struct Oscillator {
    accumulator: u32,
    freq: u16,
    pulse_width: u16,
    control: u8,
    /// 23-bit noise shift register.
    lfsr: u32,
    /// MSB state from the previous sample, drives hard sync.
    msb: bool,
    msb_rising: bool,
}

impl Oscillator {
    const GATE: u8 = 0x01;
    const SYNC: u8 = 0x02;
    const RING: u8 = 0x04;
    const TEST: u8 = 0x08;

    fn new() -> Self {
        Self {
            accumulator: 0,
            freq: 0,
            pulse_width: 0,
            control: 0,
            lfsr: 0x7f_ffff,
            msb: false,
            msb_rising: false,
        }
    }

    fn set_control(&mut self, value: u8) {
        self.control = value;
        if value & Self::TEST != 0 {
            self.accumulator = 0;
            self.lfsr = 0x7f_ffff;
        }
    }

    fn advance(&mut self, cycles: u32) {
        self.msb_rising = false;
        if self.control & Self::TEST != 0 {
            return;
        }
        let old = self.accumulator;
        let sum = old + self.freq as u32 * cycles;
        self.accumulator = sum & 0xff_ffff;

        let msb = self.accumulator & 0x80_0000 != 0;
        self.msb_rising = msb && !self.msb;
        self.msb = msb;

        // The LFSR clocks on every rising edge of accumulator bit 19,
        // which happens once per 2^20 counted from the 2^19 boundary.
        // Counting crossings over the unwrapped span catches every edge
        // even when one step spans several.
        let edges = ((sum + 0x08_0000) >> 20) - ((old + 0x08_0000) >> 20);
        for _ in 0..edges {
            let feedback = ((self.lfsr >> 17) ^ (self.lfsr >> 22)) & 1;
            self.lfsr = ((self.lfsr << 1) | feedback) & 0x7f_ffff;
        }
    }

    fn sync_reset(&mut self) {
        self.accumulator = 0;
        self.msb = false;
    }

    /// 12-bit waveform output. Combined waveforms are approximated by a
    /// bitwise AND, which captures their characteristic thinning. With no
    /// waveform selected the DAC sits at midscale, so the centered sample
    /// is zero rather than a DC offset.
    fn output(&self, ring_source_msb: bool) -> u16 {
        let waveform = self.control >> 4;
        if waveform == 0 {
            return 0x800;
        }

        let mut out = 0xfff;
        if waveform & 0x1 != 0 {
            // Ring modulation replaces the triangle MSB with the XOR of
            // this oscillator's MSB and the ring source's.
            let msb = (self.accumulator & 0x80_0000 != 0) ^ (self.ring_mod() && ring_source_msb);
            let acc = if msb {
                !self.accumulator
            } else {
                self.accumulator
            };
            out &= ((acc >> 11) & 0xfff) as u16;
        }
        if waveform & 0x2 != 0 {
            out &= (self.accumulator >> 12) as u16;
        }
        if waveform & 0x4 != 0 {
            let pulse = if (self.accumulator >> 12) as u16 >= self.pulse_width {
                0xfff
            } else {
                0
            };
            out &= pulse;
        }
        if waveform & 0x8 != 0 {
            out &= self.noise_output();
        }
        out
    }

    fn ring_mod(&self) -> bool {
        self.control & Self::RING != 0
    }

    fn wants_sync(&self) -> bool {
        self.control & Self::SYNC != 0
    }

    fn gate(&self) -> bool {
        self.control & Self::GATE != 0
    }

    /// Noise taps spread across the shift register, packed to 12 bits.
    fn noise_output(&self) -> u16 {
        let l = self.lfsr;
        (((l >> 22) & 1) << 11
            | ((l >> 20) & 1) << 10
            | ((l >> 16) & 1) << 9
            | ((l >> 13) & 1) << 8
            | ((l >> 11) & 1) << 7
            | ((l >> 7) & 1) << 6
            | ((l >> 4) & 1) << 5
            | ((l >> 2) & 1) << 4) as u16
    }
}

/// Software reference model of the SID.
#[derive(Debug, Clone)]
pub struct SoftSid {
    model: ChipModel,
    oscillators: [Oscillator; 3],
    envelopes: [Envelope; 3],
    registers: [u8; SID_REGISTER_COUNT],

    // Filter state (digital state-variable).
    filter_coeff: f32,
    filter_q: f32,
    band: f32,
    low: f32,

    sample_rate: u32,
    /// Chip cycles per output sample, 16.16 fixed point.
    cycles_per_sample: u32,
    /// Unconsumed cycles from previous clock() calls, 16.16.
    cycle_budget: u64,
    /// Fractional cycle carry between samples, low 16 bits.
    sample_frac: u32,
}

impl SoftSid {
    pub fn new() -> Self {
        let mut sid = Self {
            model: ChipModel::Mos8580,
            oscillators: [Oscillator::new(); 3],
            envelopes: [Envelope::new(); 3],
            registers: [0; SID_REGISTER_COUNT],
            filter_coeff: 0.1,
            filter_q: 1.0,
            band: 0.0,
            low: 0.0,
            sample_rate: 44_100,
            cycles_per_sample: 0,
            cycle_budget: 0,
            sample_frac: 0,
        };
        sid.set_sampling(super::CLOCK_FREQ_PAL, 44_100);
        sid
    }

    fn update_filter_coefficients(&mut self) {
        let fc = ((self.registers[FILTER_CUTOFF_HI] as u32) << 3
            | (self.registers[FILTER_CUTOFF_LO] & 0x07) as u32) as f32;

        // Linear cutoff curve for the 8580; the 6581 curve has a strong
        // low-end offset which we approximate with a base frequency.
        let cutoff_hz = match self.model {
            ChipModel::Mos8580 => 30.0 + fc * 5.8,
            ChipModel::Mos6581 => 220.0 + fc * 5.2,
        };
        let limited = cutoff_hz.min(self.sample_rate as f32 / 4.0);
        self.filter_coeff = 2.0 * (PI * limited / self.sample_rate as f32).sin();

        let res = (self.registers[FILTER_RES_FILT] >> 4) as f32;
        self.filter_q = 1.0 / (0.707 + res / 7.5);
    }

    /// Render one sample, stepping the chip by `cycles`.
    fn render_sample(&mut self, cycles: u32) -> i16 {
        for osc in &mut self.oscillators {
            osc.advance(cycles);
        }
        // Hard sync: oscillator N is reset by oscillator N-1 (wrapping).
        for i in 0..3 {
            let source = (i + 2) % 3;
            if self.oscillators[i].wants_sync() && self.oscillators[source].msb_rising {
                self.oscillators[i].sync_reset();
            }
        }
        for env in &mut self.envelopes {
            env.clock(cycles);
        }

        let routing = self.registers[FILTER_RES_FILT];
        let mode_vol = self.registers[FILTER_MODE_VOL];

        let mut direct = 0.0f32;
        let mut filter_in = 0.0f32;
        for i in 0..3 {
            let ring_source = (i + 2) % 3;
            let ring_msb = self.oscillators[ring_source].accumulator & 0x80_0000 != 0;
            let wave = self.oscillators[i].output(ring_msb) as f32 - 2048.0;
            let sample = wave * self.envelopes[i].level as f32 / 255.0;

            if routing & (1 << i) != 0 {
                filter_in += sample;
            } else if i == 2 && mode_vol & 0x80 != 0 {
                // 3 OFF: voice 3 silenced when it bypasses the filter.
            } else {
                direct += sample;
            }
        }

        // State-variable filter, one update per sample.
        let high = filter_in - self.low - self.filter_q * self.band;
        self.band += self.filter_coeff * high;
        self.low += self.filter_coeff * self.band;

        let mut filtered = 0.0f32;
        if mode_vol & 0x10 != 0 {
            filtered += self.low;
        }
        if mode_vol & 0x20 != 0 {
            filtered += self.band;
        }
        if mode_vol & 0x40 != 0 {
            filtered += high;
        }

        let volume = (mode_vol & 0x0f) as f32 / 15.0;
        let mixed = (direct + filtered) * volume / 3.0;
        mixed.clamp(-32768.0, 32767.0) as i16
    }
}

impl Default for SoftSid {
    fn default() -> Self {
        Self::new()
    }
}

impl SidBackend for SoftSid {
    fn set_sampling(&mut self, clock_hz: f64, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
        self.cycles_per_sample = (clock_hz / self.sample_rate as f64 * 65536.0) as u32;
        self.update_filter_coefficients();
    }

    fn set_chip_model(&mut self, model: ChipModel) {
        self.model = model;
        self.update_filter_coefficients();
    }

    fn reset(&mut self) {
        self.oscillators = [Oscillator::new(); 3];
        self.envelopes = [Envelope::new(); 3];
        self.registers = [0; SID_REGISTER_COUNT];
        self.band = 0.0;
        self.low = 0.0;
        self.cycle_budget = 0;
        self.sample_frac = 0;
        self.update_filter_coefficients();
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        let reg = reg as usize;
        if reg >= SID_REGISTER_COUNT {
            return;
        }
        self.registers[reg] = value;

        if reg < 21 {
            let voice = reg / 7;
            let osc = &mut self.oscillators[voice];
            let env = &mut self.envelopes[voice];
            match reg % 7 {
                0 => osc.freq = (osc.freq & 0xff00) | value as u16,
                1 => osc.freq = (osc.freq & 0x00ff) | ((value as u16) << 8),
                2 => osc.pulse_width = (osc.pulse_width & 0x0f00) | value as u16,
                3 => osc.pulse_width = (osc.pulse_width & 0x00ff) | (((value & 0x0f) as u16) << 8),
                4 => {
                    osc.set_control(value);
                    env.set_gate(osc.gate());
                }
                5 => {
                    env.attack = value >> 4;
                    env.decay = value & 0x0f;
                }
                _ => {
                    env.sustain = value >> 4;
                    env.release = value & 0x0f;
                }
            }
        } else {
            self.update_filter_coefficients();
        }
    }

    fn clock(&mut self, delta_cycles: u32, out: &mut [i16]) -> usize {
        let cps = self.cycles_per_sample as u64;
        let mut budget = self.cycle_budget + ((delta_cycles as u64) << 16);
        let mut produced = 0;
        while budget >= cps && produced < out.len() {
            budget -= cps;
            let stepped = self.sample_frac + self.cycles_per_sample;
            self.sample_frac = stepped & 0xffff;
            out[produced] = self.render_sample(stepped >> 16);
            produced += 1;
        }
        // Keep only the sub-sample remainder so surplus cycles from a
        // rounded-up block budget cannot accumulate into timing drift.
        self.cycle_budget = budget.min(cps - 1);
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sid::CLOCK_FREQ_PAL;

    fn sid() -> SoftSid {
        let mut s = SoftSid::new();
        s.set_sampling(CLOCK_FREQ_PAL, 44_100);
        s
    }

    fn render(sid: &mut SoftSid, samples: usize) -> Vec<i16> {
        let mut out = vec![0i16; samples];
        let mut produced = 0;
        while produced < samples {
            let n = sid.clock(1000, &mut out[produced..]);
            produced += n;
        }
        out
    }

    #[test]
    fn test_sample_pacing_matches_clock_ratio() {
        let mut s = sid();
        let mut out = vec![0i16; 64];
        // 715 cycles is one 32-sample block at 44.1 kHz / PAL clock.
        let n = s.clock(715, &mut out);
        assert_eq!(n, 32);
    }

    #[test]
    fn test_silent_when_no_waveform_selected() {
        let mut s = sid();
        s.write_register(24, 0x0f);
        s.write_register(4, 0x01);
        let out = render(&mut s, 256);
        assert!(out.iter().all(|&x| x == 0));
    }

    #[test]
    fn test_gated_sawtooth_produces_audio() {
        let mut s = sid();
        s.write_register(24, 0x0f);
        s.write_register(0, 0x00);
        s.write_register(1, 0x10); // freq msb
        s.write_register(5, 0x00); // instant attack
        s.write_register(6, 0xf0); // full sustain
        s.write_register(4, 0x21); // saw + gate
        let out = render(&mut s, 2048);
        let peak = out.iter().map(|&x| x.unsigned_abs()).max().unwrap();
        assert!(peak > 500, "peak {peak}");
    }

    #[test]
    fn test_envelope_attack_and_release() {
        let mut env = Envelope::new();
        env.attack = 0;
        env.decay = 0;
        env.sustain = 0x0f;
        env.release = 0;
        env.set_gate(true);
        assert_eq!(env.state, EnvelopeState::Attack);
        env.clock(ENVELOPE_RATE_PERIODS[0] * 300);
        assert_eq!(env.level, 0xff);
        assert_eq!(env.state, EnvelopeState::DecaySustain);

        env.set_gate(false);
        assert_eq!(env.state, EnvelopeState::Release);
        // Release rate 0 with the exponential slowdown still drains fully
        // given enough cycles.
        env.clock(ENVELOPE_RATE_PERIODS[0] * 30 * 300);
        assert_eq!(env.level, 0);
    }

    #[test]
    fn test_envelope_sustain_holds_level() {
        let mut env = Envelope::new();
        env.attack = 0;
        env.decay = 0;
        env.sustain = 0x08;
        env.set_gate(true);
        env.clock(ENVELOPE_RATE_PERIODS[0] * 10_000);
        assert_eq!(env.level, 0x88);
    }

    #[test]
    fn test_sustain_hold_does_not_bank_release_steps() {
        let mut env = Envelope::new();
        env.attack = 0;
        env.decay = 0;
        env.sustain = 0x0f;
        env.release = 0x0f;
        env.set_gate(true);
        env.clock(ENVELOPE_RATE_PERIODS[0] * 300);
        assert_eq!(env.level, 0xff);

        // Hold at sustain far longer than any release period.
        for _ in 0..10_000 {
            env.clock(ENVELOPE_RATE_PERIODS[15]);
        }

        // The release must start from the sustain level, not skip ahead on
        // cycles accumulated while holding.
        env.set_gate(false);
        env.clock(1);
        assert_eq!(env.level, 0xff);
        env.clock(ENVELOPE_RATE_PERIODS[15] * 2);
        assert!(env.level >= 0xfd, "level {:#x} fell too fast", env.level);
    }

    #[test]
    fn test_test_bit_freezes_oscillator() {
        let mut osc = Oscillator::new();
        osc.freq = 0x1000;
        osc.set_control(Oscillator::TEST | 0x20);
        osc.advance(100);
        assert_eq!(osc.accumulator, 0);

        osc.set_control(0x20);
        osc.advance(100);
        assert!(osc.accumulator > 0);
    }

    #[test]
    fn test_sawtooth_tracks_accumulator() {
        let mut osc = Oscillator::new();
        osc.freq = 0x0100;
        osc.set_control(0x20);
        osc.advance(16);
        assert_eq!(osc.output(false), (osc.accumulator >> 12) as u16);
    }

    #[test]
    fn test_pulse_width_threshold() {
        let mut osc = Oscillator::new();
        osc.set_control(0x40);
        osc.pulse_width = 0x800;
        osc.accumulator = 0x7ff << 12;
        assert_eq!(osc.output(false), 0);
        osc.accumulator = 0x800 << 12;
        assert_eq!(osc.output(false), 0xfff);
    }

    #[test]
    fn test_hard_sync_resets_follower() {
        let mut s = sid();
        s.write_register(8, 0x10); // voice 2 freq
        s.write_register(11, 0x22); // voice 2: saw + sync
        // Park voice 1 just below its MSB so the next sample crosses it.
        s.oscillators[0].freq = 0x0100;
        s.oscillators[0].accumulator = 0x7f_f000;

        let mut out = [0i16; 1];
        assert_eq!(s.clock(23, &mut out), 1);
        assert!(s.oscillators[0].msb_rising);
        assert_eq!(s.oscillators[1].accumulator, 0);
    }

    #[test]
    fn test_volume_zero_silences_output() {
        let mut s = sid();
        s.write_register(24, 0x00);
        s.write_register(1, 0x10);
        s.write_register(6, 0xf0);
        s.write_register(4, 0x21);
        let out = render(&mut s, 1024);
        assert!(out.iter().all(|&x| x == 0));
    }

    #[test]
    fn test_voice3_off_mutes_unfiltered_voice3() {
        let mut s = sid();
        s.write_register(24, 0x8f); // 3 OFF + volume 15
        s.write_register(15, 0x10); // voice 3 freq msb
        s.write_register(20, 0xf0);
        s.write_register(18, 0x21); // voice 3 saw + gate
        let out = render(&mut s, 2048);
        assert!(out.iter().all(|&x| x == 0));
    }

    #[test]
    fn test_noise_clocks_once_per_bit19_rise() {
        let mut osc = Oscillator::new();
        osc.freq = 0x1000;
        osc.set_control(0x80);
        let seed = osc.lfsr;

        // 128 steps of 0x1000 land exactly on 0x8_0000: bit 19 rises once.
        osc.advance(128);
        assert_ne!(osc.lfsr, seed);
        let after_rise = osc.lfsr;

        // Next 128 land on 0x10_0000: bit 19 falls, no clock.
        osc.advance(128);
        assert_eq!(osc.lfsr, after_rise);
    }

    #[test]
    fn test_noise_lfsr_advances() {
        let mut osc = Oscillator::new();
        osc.freq = 0xffff;
        osc.set_control(0x80);
        let first = osc.noise_output();
        let mut changed = false;
        for _ in 0..64 {
            osc.advance(32);
            if osc.noise_output() != first {
                changed = true;
                break;
            }
        }
        assert!(changed);
    }
}
