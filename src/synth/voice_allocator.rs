//! Polyphonic voice assignment
//!
//! Voices are handed out round-robin from a rotating cursor so released
//! voices get time to finish their release phase before being reused. When
//! every voice is busy the allocator either steals the least recently
//! used voice or refuses, depending on the configured strategy.

use crate::midi::{self, Note};

/// What to do when all voices are busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StealStrategy {
    /// Refuse the note.
    None,
    /// Steal the least recently used voice.
    #[default]
    Lru,
}

/// Fixed-pool voice allocator. `N` is the number of voices.
#[derive(Debug, Clone)]
pub struct VoiceAllocator<const N: usize> {
    notes: [Note; N],
    /// Voice indices ordered oldest-first; only assigned voices appear.
    lru: [usize; N],
    lru_len: usize,
    next: usize,
    strategy: StealStrategy,
}

impl<const N: usize> Default for VoiceAllocator<N> {
    fn default() -> Self {
        Self::new(StealStrategy::default())
    }
}

impl<const N: usize> VoiceAllocator<N> {
    pub fn new(strategy: StealStrategy) -> Self {
        Self {
            notes: [midi::INVALID_NOTE; N],
            lru: [0; N],
            lru_len: 0,
            next: 0,
            strategy,
        }
    }

    pub fn set_strategy(&mut self, strategy: StealStrategy) {
        self.strategy = strategy;
    }

    /// Assign a voice for `note`. A note that is already sounding keeps its
    /// voice (and becomes the most recent). Returns `None` only when all
    /// voices are busy under [`StealStrategy::None`].
    pub fn note_on(&mut self, note: Note) -> Option<usize> {
        if let Some(voice) = self.find(note) {
            self.touch(voice);
            return Some(voice);
        }
        for offset in 0..N {
            let voice = (self.next + offset) % N;
            if self.notes[voice] == midi::INVALID_NOTE {
                self.next = (voice + 1) % N;
                self.notes[voice] = note;
                self.push_lru(voice);
                return Some(voice);
            }
        }
        match self.strategy {
            StealStrategy::None => None,
            StealStrategy::Lru => {
                let voice = self.lru[0];
                self.notes[voice] = note;
                self.touch(voice);
                Some(voice)
            }
        }
    }

    /// Release `note`. Returns the index of the voice that was playing it.
    pub fn note_off(&mut self, note: Note) -> Option<usize> {
        let voice = self.find(note)?;
        self.notes[voice] = midi::INVALID_NOTE;
        self.drop_lru(voice);
        Some(voice)
    }

    /// Voice currently sounding `note`, if any.
    pub fn find(&self, note: Note) -> Option<usize> {
        self.notes.iter().position(|&n| n == note)
    }

    /// Note assigned to `voice`, if any.
    pub fn note(&self, voice: usize) -> Option<Note> {
        let n = self.notes[voice];
        (n != midi::INVALID_NOTE).then_some(n)
    }

    pub fn clear(&mut self) {
        self.notes = [midi::INVALID_NOTE; N];
        self.lru_len = 0;
        self.next = 0;
    }

    #[cfg(test)]
    fn lru_order(&self) -> &[usize] {
        &self.lru[..self.lru_len]
    }

    /// Move `voice` to the most-recent end, inserting if absent.
    fn touch(&mut self, voice: usize) {
        self.drop_lru(voice);
        self.push_lru(voice);
    }

    fn push_lru(&mut self, voice: usize) {
        debug_assert!(self.lru_len < N);
        self.lru[self.lru_len] = voice;
        self.lru_len += 1;
    }

    fn drop_lru(&mut self, voice: usize) {
        if let Some(pos) = self.lru[..self.lru_len].iter().position(|&v| v == voice) {
            self.lru.copy_within(pos + 1..self.lru_len, pos);
            self.lru_len -= 1;
        }
    }
}
