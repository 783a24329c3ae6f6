//! MIDI-driven polyphonic synthesizer engine for the MOS 6581/8580 SID
//!
//! The synth turns decoded MIDI events and a patch full of parameters into
//! a stream of SID register images, one per 32-sample block, and renders
//! them through a pluggable chip backend. Three voices with glide and
//! wavetable scanning, three global LFOs on a modulation bus, and the full
//! filter section are driven at control rate; the chip runs at the DAC
//! rate in between.
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ```no_run
//! use sidsynth::synth::{StereoFrame, SAMPLE_BLOCK_SIZE};
//! use sidsynth::{ChipModel, Engine, Patch, SidSynth, SoftSid};
//!
//! let mut synth = SidSynth::new(Patch::default());
//! let mut engine = Engine::new(SoftSid::new(), ChipModel::Mos6581, 44_100);
//!
//! synth.note_on(60, 100);
//! let mut block = [StereoFrame::default(); SAMPLE_BLOCK_SIZE];
//! loop {
//!     synth.update();
//!     engine.render_block(&mut block, synth.register_map());
//!     // hand the block to your audio output
//! }
//! ```
//!
//! ## Real-time streaming
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use sidsynth::{ChipModel, Engine, Patch, SidSynth, SoftSid, StreamConfig, SynthStream};
//!
//! let synth = SidSynth::new(Patch::default());
//! let engine = Engine::new(SoftSid::new(), ChipModel::Mos8580, 44_100);
//! let stream = SynthStream::start(synth, engine, StreamConfig::default()).unwrap();
//! stream.synth().lock().note_on(60, 100);
//! # }
//! ```

pub mod engine;
pub mod fixed_point;
pub mod midi;
pub mod sid;
pub mod synth;

#[cfg(feature = "streaming")]
pub mod streaming; // Audio Output & Streaming

/// Error types for synth operations
#[derive(thiserror::Error, Debug)]
pub enum SidSynthError {
    /// Sample buffer sizing or transfer error
    #[error("Buffer error: {0}")]
    Buffer(String),

    /// Audio device error
    #[error("Audio device error: {0}")]
    Audio(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SidSynthError {
    /// Converts a String into `SidSynthError::Other`. Prefer the specific
    /// variant constructors where the failure class is known.
    fn from(msg: String) -> Self {
        SidSynthError::Other(msg)
    }
}

impl From<&str> for SidSynthError {
    fn from(msg: &str) -> Self {
        SidSynthError::Other(msg.to_string())
    }
}

/// Result type for synth operations
pub type Result<T> = std::result::Result<T, SidSynthError>;

// Public API exports
pub use engine::Engine;
pub use midi::MidiHandler;
pub use sid::chip::{SidBackend, SoftSid};
pub use sid::registers::RegisterMap;
pub use sid::ChipModel;
pub use synth::patch::Patch;
pub use synth::sid_synth::SidSynth;
pub use synth::{StereoFrame, VoiceMode};

#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, StreamConfig, SynthStream};
