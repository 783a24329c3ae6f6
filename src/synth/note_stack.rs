//! Bounded stack of held notes
//!
//! Mono and unison modes need the most recently played note that is still
//! held, so note-off can fall back to it. The stack keeps arrival order
//! (top = newest) and, in parallel, an insertion-sorted view by note number
//! for filter key tracking. Capacity is small (N <= 8), so both views are
//! maintained with plain O(N) shifts.

use crate::midi::{self, Note, Velocity};

/// A held note with its strike velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldNote {
    pub note: Note,
    pub velocity: Velocity,
}

impl Default for HeldNote {
    fn default() -> Self {
        Self {
            note: midi::INVALID_NOTE,
            velocity: 0,
        }
    }
}

/// Fixed-capacity note stack with move-to-top semantics.
#[derive(Debug, Clone)]
pub struct NoteStack<const N: usize> {
    stack: [HeldNote; N],
    sorted: [HeldNote; N],
    len: usize,
}

impl<const N: usize> Default for NoteStack<N> {
    fn default() -> Self {
        Self {
            stack: [HeldNote::default(); N],
            sorted: [HeldNote::default(); N],
            len: 0,
        }
    }
}

impl<const N: usize> NoteStack<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a note. A re-struck note moves to the top instead of
    /// duplicating; when full, the oldest entry is evicted.
    pub fn note_on(&mut self, note: Note, velocity: Velocity) {
        self.remove(note);
        if self.len == N {
            // Evict the oldest (bottom) entry.
            let oldest = self.stack[0].note;
            self.remove(oldest);
        }
        let entry = HeldNote { note, velocity };
        self.stack[self.len] = entry;
        self.insert_sorted(entry);
        self.len += 1;
    }

    /// Release a note. Returns true when it was held.
    pub fn note_off(&mut self, note: Note) -> bool {
        self.remove(note)
    }

    /// Most recently struck note still held.
    pub fn active_note(&self) -> Option<HeldNote> {
        (self.len > 0).then(|| self.stack[self.len - 1])
    }

    /// Held notes in arrival order, oldest first.
    pub fn notes(&self) -> &[HeldNote] {
        &self.stack[..self.len]
    }

    /// Held notes sorted ascending by note number.
    pub fn sorted_notes(&self) -> &[HeldNote] {
        &self.sorted[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn remove(&mut self, note: Note) -> bool {
        let Some(pos) = self.stack[..self.len].iter().position(|n| n.note == note) else {
            return false;
        };
        self.stack.copy_within(pos + 1..self.len, pos);
        if let Some(spos) = self.sorted[..self.len].iter().position(|n| n.note == note) {
            self.sorted.copy_within(spos + 1..self.len, spos);
        }
        self.len -= 1;
        true
    }

    fn insert_sorted(&mut self, entry: HeldNote) {
        let pos = self.sorted[..self.len]
            .iter()
            .position(|n| n.note > entry.note)
            .unwrap_or(self.len);
        for i in (pos..self.len).rev() {
            self.sorted[i + 1] = self.sorted[i];
        }
        self.sorted[pos] = entry;
    }
}
