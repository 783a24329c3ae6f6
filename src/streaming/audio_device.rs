//! Audio device output using rodio
//!
//! A [`rodio::Source`] adapter drains the sample ring buffer as interleaved
//! stereo `i16`. Underruns yield silence so the stream stays alive while
//! the producer catches up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};

use crate::synth::sample_buffer::SampleRingBuffer;
use crate::synth::{StereoFrame, SAMPLE_BLOCK_SIZE};
use crate::{Result, SidSynthError};

/// Source that reads stereo frames from the ring buffer.
struct RingBufferSource {
    ring_buffer: Arc<SampleRingBuffer>,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    /// Batch of frames read under one lock, drained channel by channel.
    frames: Vec<StereoFrame>,
    frame_pos: usize,
    /// False while the left channel of the current frame is pending.
    right_pending: bool,
}

impl RingBufferSource {
    fn new(
        ring_buffer: Arc<SampleRingBuffer>,
        sample_rate: u32,
        finished: Arc<AtomicBool>,
    ) -> Self {
        RingBufferSource {
            ring_buffer,
            sample_rate,
            finished,
            frames: vec![StereoFrame::default(); SAMPLE_BLOCK_SIZE],
            frame_pos: SAMPLE_BLOCK_SIZE,
            right_pending: false,
        }
    }
}

impl Source for RingBufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        let available = self.ring_buffer.available_read() * 2;
        if available > 0 {
            Some(available)
        } else {
            Some(SAMPLE_BLOCK_SIZE * 2)
        }
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for RingBufferSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.right_pending {
            self.right_pending = false;
            return Some(self.frames[self.frame_pos - 1].right);
        }

        if self.frame_pos >= self.frames.len() {
            if self.finished.load(Ordering::Relaxed) {
                return None;
            }
            let read = self.ring_buffer.read(&mut self.frames);
            // Underrun or partial batch: pad with silence to keep the
            // stream alive while the producer catches up.
            self.frames[read..].fill(StereoFrame::default());
            self.frame_pos = 0;
        }

        let frame = self.frames[self.frame_pos];
        self.frame_pos += 1;
        self.right_pending = true;
        Some(frame.left)
    }
}

/// System audio output fed from the ring buffer.
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start draining the ring buffer.
    pub fn new(sample_rate: u32, ring_buffer: Arc<SampleRingBuffer>) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| SidSynthError::Audio(format!("failed to open audio stream: {e}")))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| SidSynthError::Audio(format!("failed to create audio sink: {e}")))?;

        let finished = Arc::new(AtomicBool::new(false));
        let source = RingBufferSource::new(ring_buffer, sample_rate, Arc::clone(&finished));
        sink.append(source);

        Ok(AudioDevice {
            _stream: stream,
            sink,
            finished,
        })
    }

    pub fn pause(&self) {
        self.sink.pause();
    }

    pub fn play(&self) {
        self.sink.play();
    }

    /// Signal that no more frames will be produced. The source stops at the
    /// next batch boundary instead of playing silence forever.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// Block until the sink has drained.
    pub fn wait_for_finish(&self) {
        self.sink.sleep_until_end();
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.pause();
    }
}
