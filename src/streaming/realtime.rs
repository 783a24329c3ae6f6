//! Producer thread driving the synth in real time
//!
//! [`SynthStream`] owns the render loop: one control tick plus one chip
//! block per iteration, written into the ring buffer that the audio device
//! drains. The synth stays reachable through a shared handle so the caller
//! can feed it MIDI events and parameter changes while it plays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};
use parking_lot::Mutex;

use super::{AudioDevice, StreamConfig, BUFFER_BACKOFF_MICROS};
use crate::engine::Engine;
use crate::sid::chip::SidBackend;
use crate::synth::sample_buffer::SampleRingBuffer;
use crate::synth::sid_synth::SidSynth;
use crate::synth::{StereoFrame, SAMPLE_BLOCK_SIZE};
use crate::Result;

/// Render-loop health counters.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Blocks rendered since the stream started.
    pub blocks_rendered: usize,
    /// Writes that found the ring buffer full.
    pub overrun_count: usize,
    /// Ring buffer occupancy at the last write.
    pub fill_percentage: f32,
}

/// A synth playing on the system audio device.
pub struct SynthStream {
    synth: Arc<Mutex<SidSynth>>,
    buffer: Arc<SampleRingBuffer>,
    audio_device: AudioDevice,
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    stats: Arc<Mutex<StreamStats>>,
}

impl SynthStream {
    /// Start the producer thread and audio output.
    pub fn start<B: SidBackend + Send + 'static>(
        synth: SidSynth,
        engine: Engine<B>,
        config: StreamConfig,
    ) -> Result<Self> {
        let buffer = Arc::new(SampleRingBuffer::new(config.ring_buffer_size)?);
        let audio_device = AudioDevice::new(config.sample_rate, Arc::clone(&buffer))?;

        let synth = Arc::new(Mutex::new(synth));
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(StreamStats::default()));

        let producer = std::thread::spawn({
            let synth = Arc::clone(&synth);
            let buffer = Arc::clone(&buffer);
            let running = Arc::clone(&running);
            let stats = Arc::clone(&stats);
            move || run_producer_loop(synth, engine, buffer, running, stats)
        });

        info!(
            "stream started: {} frame buffer, {:.0} ms latency",
            config.ring_buffer_size,
            config.latency_ms()
        );

        Ok(SynthStream {
            synth,
            buffer,
            audio_device,
            running,
            producer: Some(producer),
            stats,
        })
    }

    /// Shared handle for MIDI input and parameter edits.
    pub fn synth(&self) -> Arc<Mutex<SidSynth>> {
        Arc::clone(&self.synth)
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.lock().clone()
    }

    pub fn fill_percentage(&self) -> f32 {
        self.buffer.fill_percentage()
    }

    pub fn pause(&self) {
        self.audio_device.pause();
    }

    pub fn resume(&self) {
        self.audio_device.play();
    }

    /// Stop the producer thread and let the device drain.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                warn!("producer thread panicked during shutdown");
            }
        }
        self.audio_device.finish();
        self.audio_device.wait_for_finish();
    }
}

impl Drop for SynthStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
        self.audio_device.finish();
    }
}

fn run_producer_loop<B: SidBackend>(
    synth: Arc<Mutex<SidSynth>>,
    mut engine: Engine<B>,
    buffer: Arc<SampleRingBuffer>,
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<StreamStats>>,
) {
    let mut block = [StereoFrame::default(); SAMPLE_BLOCK_SIZE];

    while running.load(Ordering::Relaxed) {
        if !buffer.writeable_block() {
            let mut stats = stats.lock();
            stats.overrun_count += 1;
            drop(stats);
            std::thread::sleep(std::time::Duration::from_micros(BUFFER_BACKOFF_MICROS));
            continue;
        }

        // One control tick per block; the register image is copied out so
        // the chip render happens outside the synth lock.
        let register_map = {
            let mut synth = synth.lock();
            synth.update();
            engine.refresh(&synth.patch().parameters);
            *synth.register_map()
        };
        engine.render_block(&mut block, &register_map);
        buffer.write(&block);

        let mut stats = stats.lock();
        stats.blocks_rendered += 1;
        stats.fill_percentage = buffer.fill_percentage();
    }
}
