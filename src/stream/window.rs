//! Buffer bookkeeping shared by the blocking and async streams.
//!
//! [`SeekWindow`] owns the circular buffer and both positions. It never
//! touches the wrapped stream itself: an adapter asks it for the next
//! [`Step`], performs the underlying read the step calls for, and reports
//! the outcome back. State only changes once a read has completed, so an
//! adapter that returns early (an error, or a pending poll) leaves the
//! bookkeeping consistent.

use std::io::SeekFrom;
use std::num::NonZeroUsize;

use crate::Error;

/// Bytes discarded per underlying read while skipping forward.
pub(crate) const SKIP_CHUNK: usize = 8 * 1024;

/// What the next read has to do to satisfy the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// The logical position is ahead of the source: discard this many bytes.
    Skip(u64),
    /// Positions agree: read at most this many bytes from the source.
    Fill(usize),
    /// The logical position is behind the source: serve from the buffer.
    Replay,
}

#[derive(Debug)]
pub(crate) struct SeekWindow {
    arena: Box<[u8]>,
    /// Index where the next byte from the source is stored.
    cursor: usize,
    /// Number of bytes directly behind `underlying` that the arena holds.
    retained: usize,
    logical: u64,
    underlying: u64,
}

impl SeekWindow {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            arena: vec![0; capacity.get()].into_boxed_slice(),
            cursor: 0,
            retained: 0,
            logical: 0,
            underlying: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn position(&self) -> u64 {
        self.logical
    }

    pub(crate) fn set_position(&mut self, pos: u64) {
        self.logical = pos;
    }

    pub(crate) fn underlying_position(&self) -> u64 {
        self.underlying
    }

    /// Moves the logical position. No data is touched until the next read.
    pub(crate) fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
        self.logical = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(offset) => {
                self.logical
                    .checked_add_signed(offset)
                    .ok_or(Error::InvalidPosition {
                        from: self.logical,
                        offset,
                    })?
            }
            SeekFrom::End(_) => return Err(Error::SeekFromEnd),
        };
        Ok(self.logical)
    }

    /// Decides how a read of up to `want` bytes proceeds.
    pub(crate) fn step(&self, want: usize) -> Result<Step, Error> {
        let diff = i128::from(self.logical) - i128::from(self.underlying);
        let distance = diff.unsigned_abs();

        if distance > self.capacity() as u128 {
            return Err(self.exceeded());
        }

        if diff > 0 {
            // distance <= capacity, so it fits
            Ok(Step::Skip(distance as u64))
        } else if diff == 0 {
            Ok(Step::Fill(want.min(self.capacity() - self.cursor)))
        } else if distance as usize > self.retained {
            // the range was skipped over and never buffered
            Err(self.exceeded())
        } else {
            Ok(Step::Replay)
        }
    }

    /// Records `n` bytes that were read from the source and thrown away.
    pub(crate) fn skipped(&mut self, n: u64) {
        if n > 0 {
            self.underlying += n;
            self.retained = 0;
        }
    }

    /// Stores bytes freshly read from the source and advances both positions.
    ///
    /// `data` must come from a [`Step::Fill`], so it never crosses the end of
    /// the arena.
    pub(crate) fn record(&mut self, data: &[u8]) {
        let end = self.cursor + data.len();
        debug_assert!(end <= self.capacity());

        self.arena[self.cursor..end].copy_from_slice(data);
        self.cursor = end % self.capacity();
        self.retained = (self.retained + data.len()).min(self.capacity());
        self.underlying += data.len() as u64;
        self.logical += data.len() as u64;
    }

    /// The buffered run starting at the logical position, at most `max` bytes.
    ///
    /// Only meaningful after [`Step::Replay`].
    pub(crate) fn buffered(&self, max: usize) -> &[u8] {
        let back = (self.underlying - self.logical) as usize;
        let capacity = self.capacity();
        let start = (self.cursor + capacity - back) % capacity;
        let end = if start < self.cursor {
            self.cursor
        } else {
            capacity
        };
        let len = (end - start).min(max);
        &self.arena[start..start + len]
    }

    /// Marks `n` bytes returned by [`buffered`](Self::buffered) as delivered.
    pub(crate) fn consume(&mut self, n: usize) {
        self.logical += n as u64;
    }

    fn exceeded(&self) -> Error {
        Error::WindowExceeded {
            logical: self.logical,
            underlying: self.underlying,
            capacity: self.capacity(),
        }
    }
}
