//! Parameter model
//!
//! Every parameter is edited as a plain i32 kept inside its descriptor's
//! range; mapping to native values (register fields, typed enums) happens at
//! the point of use. Parameters live in one of four scopes: system, global,
//! per-voice and per-LFO, with the latter two stored per instance.

use num_derive::FromPrimitive;

use crate::synth::{NUM_LFOS, NUM_VOICES};

pub type ParameterValueType = i32;

/// System scope: settings that are not part of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum System {
    MidiChannel = 0,
}

impl System {
    pub const COUNT: usize = 1;
}

/// Global scope: chip, filter section, volume, voice mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Global {
    ChipModel = 0,
    FilterMode,
    FilterFreq,
    FilterRes,
    FilterVoice1Enable,
    FilterVoice2Enable,
    FilterVoice3Enable,
    Filter3Off,
    FilterKeyTracking,
    FilterKeyTrackNote,
    FilterFreqModSrc,
    FilterFreqModDepth,
    FilterResModSrc,
    FilterResModDepth,
    Volume,
    VoiceMode,
}

impl Global {
    pub const COUNT: usize = 16;
}

/// Voice scope, stored once per voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Voice {
    TuneOctave = 0,
    TuneSemitone,
    TuneFine,
    GlideRate,
    OscWave,
    OscPwm,
    OscRing,
    OscSync,
    EnvAttack,
    EnvDecay,
    EnvSustain,
    EnvRelease,
    FreqModSrc,
    FreqModDepth,
    PwmModSrc,
    PwmModDepth,
    WavetableIdx,
    WavetableRate,
}

impl Voice {
    pub const COUNT: usize = 18;
}

/// LFO scope, stored once per LFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum LfoParam {
    Rate = 0,
    Shape,
    Phase,
    Sync,
    Abs,
}

impl LfoParam {
    pub const COUNT: usize = 5;
}

/// Reference to a parameter in any scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterRef {
    #[default]
    None,
    System(System),
    Global(Global),
    Voice(Voice),
    Lfo(LfoParam),
}

impl ParameterRef {
    pub fn is_system(self) -> bool {
        matches!(self, ParameterRef::System(_))
    }
    pub fn is_global(self) -> bool {
        matches!(self, ParameterRef::Global(_))
    }
    pub fn is_voice(self) -> bool {
        matches!(self, ParameterRef::Voice(_))
    }
    pub fn is_lfo(self) -> bool {
        matches!(self, ParameterRef::Lfo(_))
    }
}

/// Immutable description of a parameter: display name, range, default.
#[derive(Debug)]
pub struct ParameterDesc {
    pub name: &'static str,
    pub min_value: ParameterValueType,
    pub max_value: ParameterValueType,
    pub default_value: ParameterValueType,
    pub parameter: ParameterRef,
}

impl ParameterDesc {
    pub const fn clamp(&self, value: ParameterValueType) -> ParameterValueType {
        if value < self.min_value {
            self.min_value
        } else if value > self.max_value {
            self.max_value
        } else {
            value
        }
    }

    /// Descriptor for a parameter reference; `None` for the null reference.
    pub fn find(parameter: ParameterRef) -> Option<&'static ParameterDesc> {
        match parameter {
            ParameterRef::None => None,
            ParameterRef::System(p) => Some(&SYSTEM_DESCS[p as usize]),
            ParameterRef::Global(p) => Some(&GLOBAL_DESCS[p as usize]),
            ParameterRef::Voice(p) => Some(&VOICE_DESCS[p as usize]),
            ParameterRef::Lfo(p) => Some(&LFO_DESCS[p as usize]),
        }
    }
}

const fn desc(
    name: &'static str,
    min_value: ParameterValueType,
    max_value: ParameterValueType,
    default_value: ParameterValueType,
    parameter: ParameterRef,
) -> ParameterDesc {
    ParameterDesc {
        name,
        min_value,
        max_value,
        default_value,
        parameter,
    }
}

static SYSTEM_DESCS: [ParameterDesc; System::COUNT] = [desc(
    "CHAN",
    1,
    16,
    1,
    ParameterRef::System(System::MidiChannel),
)];

static GLOBAL_DESCS: [ParameterDesc; Global::COUNT] = [
    desc("CHIP", 0, 1, 0, ParameterRef::Global(Global::ChipModel)),
    desc("FMOD", 0, 4, 1, ParameterRef::Global(Global::FilterMode)),
    desc("FFRQ", 0, 1024, 512, ParameterRef::Global(Global::FilterFreq)),
    desc("FRES", 0, 15, 0, ParameterRef::Global(Global::FilterRes)),
    desc("FLT1", 0, 1, 0, ParameterRef::Global(Global::FilterVoice1Enable)),
    desc("FLT2", 0, 1, 0, ParameterRef::Global(Global::FilterVoice2Enable)),
    desc("FLT3", 0, 1, 0, ParameterRef::Global(Global::FilterVoice3Enable)),
    desc("3OFF", 0, 1, 0, ParameterRef::Global(Global::Filter3Off)),
    desc("KTRK", -64, 63, 0, ParameterRef::Global(Global::FilterKeyTracking)),
    desc("KNOT", 0, 1, 0, ParameterRef::Global(Global::FilterKeyTrackNote)),
    desc("FFMS", 0, 4, 0, ParameterRef::Global(Global::FilterFreqModSrc)),
    desc("FFMD", -256, 255, 0, ParameterRef::Global(Global::FilterFreqModDepth)),
    desc("FRMS", 0, 4, 0, ParameterRef::Global(Global::FilterResModSrc)),
    desc("FRMD", -256, 255, 0, ParameterRef::Global(Global::FilterResModDepth)),
    desc("VOL", 0, 15, 15, ParameterRef::Global(Global::Volume)),
    desc("MODE", 0, 1, 0, ParameterRef::Global(Global::VoiceMode)),
];

static VOICE_DESCS: [ParameterDesc; Voice::COUNT] = [
    desc("OCT", -3, 3, 0, ParameterRef::Voice(Voice::TuneOctave)),
    desc("SEMI", -11, 11, 0, ParameterRef::Voice(Voice::TuneSemitone)),
    desc("FINE", -128, 127, 0, ParameterRef::Voice(Voice::TuneFine)),
    desc("GLID", 0, 127, 0, ParameterRef::Voice(Voice::GlideRate)),
    desc("WAVE", 0, 8, 2, ParameterRef::Voice(Voice::OscWave)),
    desc("PWM", 0, 4095, 2048, ParameterRef::Voice(Voice::OscPwm)),
    desc("RING", 0, 1, 0, ParameterRef::Voice(Voice::OscRing)),
    desc("SYNC", 0, 1, 0, ParameterRef::Voice(Voice::OscSync)),
    desc("ATT", 0, 15, 0, ParameterRef::Voice(Voice::EnvAttack)),
    desc("DEC", 0, 15, 0, ParameterRef::Voice(Voice::EnvDecay)),
    desc("SUS", 0, 15, 15, ParameterRef::Voice(Voice::EnvSustain)),
    desc("REL", 0, 15, 9, ParameterRef::Voice(Voice::EnvRelease)),
    desc("FMS", 0, 4, 0, ParameterRef::Voice(Voice::FreqModSrc)),
    desc("FMD", -256, 255, 0, ParameterRef::Voice(Voice::FreqModDepth)),
    desc("PMS", 0, 4, 0, ParameterRef::Voice(Voice::PwmModSrc)),
    desc("PMD", -256, 255, 0, ParameterRef::Voice(Voice::PwmModDepth)),
    desc("WTBL", 0, 4, 0, ParameterRef::Voice(Voice::WavetableIdx)),
    desc("WRAT", 0, 127, 63, ParameterRef::Voice(Voice::WavetableRate)),
];

static LFO_DESCS: [ParameterDesc; LfoParam::COUNT] = [
    desc("RATE", 0, 127, 63, ParameterRef::Lfo(LfoParam::Rate)),
    desc("SHAP", 0, 5, 0, ParameterRef::Lfo(LfoParam::Shape)),
    desc("PHAS", 0, 127, 0, ParameterRef::Lfo(LfoParam::Phase)),
    desc("SYNC", 0, 1, 0, ParameterRef::Lfo(LfoParam::Sync)),
    desc("ABS", 0, 1, 0, ParameterRef::Lfo(LfoParam::Abs)),
];

/// A stored parameter value, always within its descriptor's range.
#[derive(Debug, Clone, Copy)]
pub struct ParameterValue {
    desc: &'static ParameterDesc,
    value: ParameterValueType,
}

impl ParameterValue {
    fn new(desc: &'static ParameterDesc) -> Self {
        Self {
            desc,
            value: desc.default_value,
        }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn r#ref(&self) -> ParameterRef {
        self.desc.parameter
    }

    pub fn desc(&self) -> &'static ParameterDesc {
        self.desc
    }

    pub fn value(&self) -> ParameterValueType {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = self.desc.default_value;
    }

    pub fn set(&mut self, value: ParameterValueType) {
        self.value = self.desc.clamp(value);
    }

    /// Editor-style relative change. Returns true when the value moved.
    pub fn change_value(&mut self, delta: ParameterValueType) -> bool {
        let value = self.desc.clamp(self.value + delta);
        if self.value != value {
            self.value = value;
            true
        } else {
            false
        }
    }

    /// The stored value plus a modulation offset, clamped to range,
    /// without changing the stored value.
    pub fn modulate_value(&self, delta: ParameterValueType) -> ParameterValueType {
        self.desc.clamp(self.value + delta)
    }
}

/// Patch-level parameter storage: one global bank, one per voice, one
/// per LFO.
#[derive(Debug, Clone)]
pub struct Parameters {
    global: [ParameterValue; Global::COUNT],
    voice: [[ParameterValue; Voice::COUNT]; NUM_VOICES],
    lfo: [[ParameterValue; LfoParam::COUNT]; NUM_LFOS],
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            global: std::array::from_fn(|i| ParameterValue::new(&GLOBAL_DESCS[i])),
            voice: std::array::from_fn(|_| {
                std::array::from_fn(|i| ParameterValue::new(&VOICE_DESCS[i]))
            }),
            lfo: std::array::from_fn(|_| {
                std::array::from_fn(|i| ParameterValue::new(&LFO_DESCS[i]))
            }),
        }
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn global(&self, parameter: Global) -> &ParameterValue {
        &self.global[parameter as usize]
    }

    pub fn voice(&self, voice_index: usize, parameter: Voice) -> &ParameterValue {
        &self.voice[voice_index][parameter as usize]
    }

    pub fn lfo(&self, lfo_index: usize, parameter: LfoParam) -> &ParameterValue {
        &self.lfo[lfo_index][parameter as usize]
    }

    /// Shorthand for the stored integer.
    pub fn global_value(&self, parameter: Global) -> ParameterValueType {
        self.global(parameter).value()
    }

    pub fn voice_value(&self, voice_index: usize, parameter: Voice) -> ParameterValueType {
        self.voice(voice_index, parameter).value()
    }

    pub fn lfo_value(&self, lfo_index: usize, parameter: LfoParam) -> ParameterValueType {
        self.lfo(lfo_index, parameter).value()
    }

    /// Editor access. `None` when the reference is not a global parameter.
    pub fn mutable_value(&mut self, parameter: ParameterRef) -> Option<&mut ParameterValue> {
        match parameter {
            ParameterRef::Global(p) => Some(&mut self.global[p as usize]),
            _ => None,
        }
    }

    /// Editor access to a voice parameter.
    pub fn mutable_voice_value(
        &mut self,
        parameter: ParameterRef,
        voice_index: usize,
    ) -> Option<&mut ParameterValue> {
        match parameter {
            ParameterRef::Voice(p) => Some(&mut self.voice[voice_index][p as usize]),
            _ => None,
        }
    }

    /// Editor access to an LFO parameter.
    pub fn mutable_lfo_value(
        &mut self,
        parameter: ParameterRef,
        lfo_index: usize,
    ) -> Option<&mut ParameterValue> {
        match parameter {
            ParameterRef::Lfo(p) => Some(&mut self.lfo[lfo_index][p as usize]),
            _ => None,
        }
    }
}

/// System-scope storage, outside the patch.
#[derive(Debug, Clone)]
pub struct SystemParameters {
    system: [ParameterValue; System::COUNT],
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            system: std::array::from_fn(|i| ParameterValue::new(&SYSTEM_DESCS[i])),
        }
    }
}

impl SystemParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, parameter: System) -> &ParameterValue {
        &self.system[parameter as usize]
    }

    pub fn value(&self, parameter: System) -> ParameterValueType {
        self.get(parameter).value()
    }

    pub fn mutable_value(&mut self, parameter: ParameterRef) -> Option<&mut ParameterValue> {
        match parameter {
            ParameterRef::System(p) => Some(&mut self.system[p as usize]),
            _ => None,
        }
    }
}

/// Notification hook for the few places that must react to edits.
pub trait ParameterListener {
    fn system_parameter_changed(&mut self, _parameter: System) {}
    fn global_parameter_changed(&mut self, _parameter: Global) {}
}

/// Maximum listeners in a [`ListenerSet`].
pub const MAX_LISTENERS: usize = 4;

/// Fixed-capacity listener dispatch, no allocation.
pub struct ListenerSet<'a> {
    listeners: [Option<&'a mut dyn ParameterListener>; MAX_LISTENERS],
    len: usize,
}

impl Default for ListenerSet<'_> {
    fn default() -> Self {
        Self {
            listeners: std::array::from_fn(|_| None),
            len: 0,
        }
    }
}

impl<'a> ListenerSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Returns false when the set is full.
    pub fn register(&mut self, listener: &'a mut dyn ParameterListener) -> bool {
        if self.len == MAX_LISTENERS {
            return false;
        }
        self.listeners[self.len] = Some(listener);
        self.len += 1;
        true
    }

    pub fn notify_system(&mut self, parameter: System) {
        for listener in self.listeners[..self.len].iter_mut().flatten() {
            listener.system_parameter_changed(parameter);
        }
    }

    pub fn notify_global(&mut self, parameter: Global) {
        for listener in self.listeners[..self.len].iter_mut().flatten() {
            listener.global_parameter_changed(parameter);
        }
    }
}
