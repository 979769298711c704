//! Replica rotation cursor.
//!
//! # Invariants
//! - `0 <= cursor < count` between calls.
//! - The call that hands out index `count - 1` resets the cursor to zero and
//!   reports `wrapped`, which is the caller's cue to re-run eviction before
//!   the next round begins.

/// Result of one [`Rotation::advance`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Turn {
    /// Replica to use for this iteration.
    pub index: usize,
    /// The cursor wrapped back to zero after `index`.
    pub wrapped: bool,
}

/// Cursor over `count` replicas.
#[derive(Clone, Debug)]
pub struct Rotation {
    cursor: usize,
    count: usize,
    laps: u64,
}

impl Rotation {
    /// Creates a cursor at replica 0.
    ///
    /// # Panics
    /// Panics if `count == 0`.
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "rotation needs at least one replica");
        Self {
            cursor: 0,
            count,
            laps: 0,
        }
    }

    /// Hands out the current index and advances.
    #[inline]
    pub fn advance(&mut self) -> Turn {
        let index = self.cursor;
        self.cursor += 1;
        let wrapped = self.cursor >= self.count;
        if wrapped {
            self.cursor = 0;
            self.laps += 1;
        }
        debug_assert!(self.cursor < self.count);
        Turn { index, wrapped }
    }

    /// Index the next call will return.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of replicas rotated over.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Completed passes over all replicas.
    #[inline]
    pub fn laps(&self) -> u64 {
        self.laps
    }
}
