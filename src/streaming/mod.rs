//! Real-time audio output (feature `streaming`)
//!
//! A producer thread runs the synth block by block into the sample ring
//! buffer while a rodio source drains it to the system audio device. The
//! consumer never blocks on the producer; underruns play silence.

mod audio_device;
mod realtime;

pub use audio_device::AudioDevice;
pub use realtime::{StreamStats, SynthStream};

/// Backoff when the ring buffer is full, in microseconds.
pub const BUFFER_BACKOFF_MICROS: u64 = 100;

/// Streaming configuration.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Ring buffer size in stereo frames. Larger buffers add latency but
    /// tolerate more producer jitter.
    pub ring_buffer_size: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl StreamConfig {
    /// About 23 ms of buffer at 44.1 kHz.
    pub fn low_latency(sample_rate: u32) -> Self {
        StreamConfig {
            ring_buffer_size: 1024,
            sample_rate,
        }
    }

    /// About 93 ms of buffer at 44.1 kHz.
    pub fn stable(sample_rate: u32) -> Self {
        StreamConfig {
            ring_buffer_size: 4096,
            sample_rate,
        }
    }

    /// Buffer latency in milliseconds.
    pub fn latency_ms(&self) -> f32 {
        (self.ring_buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable(crate::synth::DAC_UPDATE_RATE_HZ)
    }
}
