//! Block renderer tying the synth's register image to a SID backend
//!
//! One engine call turns a finished [`RegisterMap`] into a block of stereo
//! frames. The mono chip output is attenuated by two bits to leave headroom
//! when external gain is applied downstream, then duplicated to both
//! channels.

use log::debug;
use num_traits::FromPrimitive;

use crate::sid::chip::SidBackend;
use crate::sid::instance::SidInstance;
use crate::sid::registers::RegisterMap;
use crate::sid::ChipModel;
use crate::synth::parameters::{Global, ParameterListener, Parameters};
use crate::synth::{StereoFrame, SAMPLE_BLOCK_SIZE};

pub struct Engine<B: SidBackend> {
    sid_instance: SidInstance<B>,
    render_buffer: [i16; SAMPLE_BLOCK_SIZE],
    chip_model_dirty: bool,
}

impl<B: SidBackend> Engine<B> {
    pub fn new(backend: B, chip_model: ChipModel, sample_rate: u32) -> Self {
        Self {
            sid_instance: SidInstance::new(backend, chip_model, sample_rate),
            render_buffer: [0; SAMPLE_BLOCK_SIZE],
            chip_model_dirty: false,
        }
    }

    pub fn reset(&mut self) {
        self.sid_instance.reset();
    }

    /// Register image as last written to the chip.
    pub fn register_map(&self) -> &RegisterMap {
        self.sid_instance.register_map()
    }

    /// Re-read parameters the engine depends on. A listener notification
    /// only flags the change; the value is picked up here, before the next
    /// block, so notification order does not matter.
    pub fn refresh(&mut self, parameters: &Parameters) {
        if !self.chip_model_dirty {
            return;
        }
        self.chip_model_dirty = false;
        if let Some(model) = ChipModel::from_i32(parameters.global_value(Global::ChipModel)) {
            debug!("chip model -> {model:?}");
            self.sid_instance.set_chip_model(model);
        }
    }

    /// Render one block of stereo frames from the given register image.
    pub fn render_block(&mut self, block: &mut [StereoFrame], register_map: &RegisterMap) {
        let n = block.len().min(SAMPLE_BLOCK_SIZE);
        let produced = self
            .sid_instance
            .render(&mut self.render_buffer[..n], register_map);

        for (dst, src) in block.iter_mut().zip(&self.render_buffer[..produced]) {
            let s = *src >> 2;
            dst.left = s;
            dst.right = s;
        }
        for dst in block.iter_mut().skip(produced) {
            *dst = StereoFrame::default();
        }
    }
}

impl<B: SidBackend> ParameterListener for Engine<B> {
    fn global_parameter_changed(&mut self, parameter: Global) {
        if parameter == Global::ChipModel {
            self.chip_model_dirty = true;
        }
    }
}
