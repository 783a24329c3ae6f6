//! Ring buffer between the block-rate renderer and the sample consumer
//!
//! The producer renders whole blocks of stereo frames; the consumer drains
//! one frame per output sample. Mutex-protected storage with atomic
//! position tracking: each position is only ever advanced by its owning
//! side, so occupancy reads are cheap and never block the other side for
//! long stretches.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::synth::{StereoFrame, NUM_SAMPLE_BLOCKS, SAMPLE_BLOCK_SIZE};
use crate::{Result, SidSynthError};

/// Default capacity: a few blocks of slack between producer and consumer.
pub const DEFAULT_CAPACITY: usize = SAMPLE_BLOCK_SIZE * NUM_SAMPLE_BLOCKS;

/// Single-producer single-consumer ring of stereo frames.
#[derive(Debug)]
pub struct SampleRingBuffer {
    buffer: Mutex<Vec<StereoFrame>>,
    /// Advanced only by the producer.
    write_pos: AtomicUsize,
    /// Advanced only by the consumer.
    read_pos: AtomicUsize,
    /// Power of 2 for cheap wrap-around.
    capacity: usize,
    mask: usize,
}

impl Default for SampleRingBuffer {
    fn default() -> Self {
        // DEFAULT_CAPACITY is a power of two; this cannot fail.
        Self::new(DEFAULT_CAPACITY).expect("default ring buffer capacity")
    }
}

impl SampleRingBuffer {
    /// Create a ring buffer; the capacity rounds up to the next power of 2.
    pub fn new(requested_capacity: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(SidSynthError::Buffer(
                "ring buffer capacity must be greater than 0".into(),
            ));
        }
        let capacity = requested_capacity.next_power_of_two();

        // 64 MB worth of frames is already far beyond any sane latency.
        const MAX_CAPACITY: usize = 64 * 1024 * 1024 / std::mem::size_of::<StereoFrame>();
        if capacity > MAX_CAPACITY {
            return Err(SidSynthError::Buffer(format!(
                "ring buffer capacity {capacity} exceeds maximum {MAX_CAPACITY}"
            )));
        }

        Ok(Self {
            buffer: Mutex::new(vec![StereoFrame::default(); capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames ready for the consumer.
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Room left for the producer. One slot stays unused to tell a full
    /// buffer from an empty one.
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read() - 1
    }

    /// True when a whole render block fits.
    pub fn writeable_block(&self) -> bool {
        self.available_write() >= SAMPLE_BLOCK_SIZE
    }

    /// Occupancy in `[0, 1]`.
    pub fn fill_percentage(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Write frames; returns how many fit. The occupancy check happens
    /// under the lock so a concurrent read cannot race it.
    pub fn write(&self, frames: &[StereoFrame]) -> usize {
        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let available = self.capacity - write_pos.wrapping_sub(read_pos) - 1;

        let to_write = frames.len().min(available);
        if to_write == 0 {
            return 0;
        }

        let write_idx = write_pos & self.mask;
        if write_idx + to_write <= self.capacity {
            buf[write_idx..write_idx + to_write].copy_from_slice(&frames[..to_write]);
        } else {
            let first_part = self.capacity - write_idx;
            buf[write_idx..].copy_from_slice(&frames[..first_part]);
            buf[..to_write - first_part].copy_from_slice(&frames[first_part..to_write]);
        }

        drop(buf);
        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Read frames; returns how many were available.
    pub fn read(&self, dest: &mut [StereoFrame]) -> usize {
        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let available = write_pos.wrapping_sub(read_pos);

        let to_read = dest.len().min(available);
        if to_read == 0 {
            return 0;
        }

        let read_idx = read_pos & self.mask;
        if read_idx + to_read <= self.capacity {
            dest[..to_read].copy_from_slice(&buf[read_idx..read_idx + to_read]);
        } else {
            let first_part = self.capacity - read_idx;
            dest[..first_part].copy_from_slice(&buf[read_idx..]);
            dest[first_part..to_read].copy_from_slice(&buf[..to_read - first_part]);
        }

        drop(buf);
        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Discard everything buffered.
    pub fn flush(&self) {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }
}
