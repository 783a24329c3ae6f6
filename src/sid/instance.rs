//! Diff-based register writer in front of a SID backend
//!
//! The synth rebuilds its full register image every block. Most of those
//! bytes do not change from block to block, and register writes are the
//! expensive path on a real chip, so the instance keeps a shadow copy of
//! what the backend last saw and forwards only the differences.

use log::trace;

use super::chip::SidBackend;
use super::registers::RegisterMap;
use super::{ChipModel, CLOCK_FREQ_PAL, SID_REGISTER_COUNT};

/// Chip cycles per 32-sample render block: `ceil(985248 / 44100 * 32)`.
///
/// Rounding up guarantees the backend can always deliver a full block from a
/// single clock call; the backend drops the sub-block surplus.
pub const CLOCK_DELTA_T: u32 = 715;

/// A SID chip plus the shadow register image used for diffing.
#[derive(Debug)]
pub struct SidInstance<B: SidBackend> {
    backend: B,
    shadow: RegisterMap,
}

impl<B: SidBackend> SidInstance<B> {
    pub fn new(mut backend: B, chip_model: ChipModel, sample_rate: u32) -> Self {
        backend.set_sampling(CLOCK_FREQ_PAL, sample_rate);
        backend.set_chip_model(chip_model);
        backend.reset();
        Self {
            backend,
            shadow: RegisterMap::default(),
        }
    }

    /// Register image as the backend last saw it.
    pub fn register_map(&self) -> &RegisterMap {
        &self.shadow
    }

    pub fn set_chip_model(&mut self, chip_model: ChipModel) {
        self.backend.set_chip_model(chip_model);
    }

    /// Reset the backend and resynchronize the shadow copy with its
    /// power-on state.
    pub fn reset(&mut self) {
        self.backend.reset();
        self.shadow = RegisterMap::default();
    }

    /// Render one block of mono samples for the given register image,
    /// writing only the bytes that changed since the previous block.
    pub fn render(&mut self, dst: &mut [i16], register_map: &RegisterMap) -> usize {
        self.write_register_map(register_map);
        self.backend.clock(CLOCK_DELTA_T, dst)
    }

    fn write_register_map(&mut self, register_map: &RegisterMap) {
        for r in 0..SID_REGISTER_COUNT {
            let value = register_map.peek(r);
            if self.shadow.peek(r) != value {
                trace!("sid write {r:#04x} = {value:#04x}");
                self.backend.write_register(r as u8, value);
                self.shadow.poke(r, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend that records every register write it receives.
    #[derive(Default)]
    struct RecordingBackend {
        writes: Vec<(u8, u8)>,
        resets: usize,
    }

    impl SidBackend for RecordingBackend {
        fn set_sampling(&mut self, _clock_hz: f64, _sample_rate: u32) {}
        fn set_chip_model(&mut self, _model: ChipModel) {}
        fn reset(&mut self) {
            self.resets += 1;
        }
        fn write_register(&mut self, reg: u8, value: u8) {
            self.writes.push((reg, value));
        }
        fn clock(&mut self, _delta_cycles: u32, out: &mut [i16]) -> usize {
            out.len()
        }
    }

    #[test]
    fn test_unchanged_map_writes_nothing() {
        let mut instance =
            SidInstance::new(RecordingBackend::default(), ChipModel::Mos6581, 44_100);
        let map = RegisterMap::default();
        let mut out = [0i16; 4];
        instance.render(&mut out, &map);
        assert!(instance.backend.writes.is_empty());
    }

    #[test]
    fn test_only_changed_registers_forwarded() {
        let mut instance =
            SidInstance::new(RecordingBackend::default(), ChipModel::Mos6581, 44_100);
        let mut map = RegisterMap::default();
        map.poke(0x18, 0x0f);
        map.poke(0x04, 0x21);

        let mut out = [0i16; 4];
        instance.render(&mut out, &map);
        assert_eq!(instance.backend.writes, vec![(0x04, 0x21), (0x18, 0x0f)]);

        // Same image again: the diff is empty.
        instance.backend.writes.clear();
        instance.render(&mut out, &map);
        assert!(instance.backend.writes.is_empty());

        // One byte changes, one write goes out.
        map.poke(0x18, 0x07);
        instance.render(&mut out, &map);
        assert_eq!(instance.backend.writes, vec![(0x18, 0x07)]);
    }

    #[test]
    fn test_reset_forces_rewrite() {
        let mut instance =
            SidInstance::new(RecordingBackend::default(), ChipModel::Mos6581, 44_100);
        let mut map = RegisterMap::default();
        map.poke(0x04, 0x21);
        let mut out = [0i16; 4];
        instance.render(&mut out, &map);

        instance.reset();
        assert_eq!(instance.backend.resets, 2);
        instance.backend.writes.clear();
        instance.render(&mut out, &map);
        assert_eq!(instance.backend.writes, vec![(0x04, 0x21)]);
    }

    #[test]
    fn test_shadow_tracks_backend_state() {
        let mut instance =
            SidInstance::new(RecordingBackend::default(), ChipModel::Mos6581, 44_100);
        let mut map = RegisterMap::default();
        map.poke(0x01, 0x42);
        let mut out = [0i16; 4];
        instance.render(&mut out, &map);
        assert_eq!(instance.register_map().peek(0x01), 0x42);
    }
}
