use std::io::{self, Read, Seek, SeekFrom};

use super::window::{SKIP_CHUNK, SeekWindow, Step};
use super::{DEFAULT_CAPACITY, checked_capacity};
use crate::Error;

/// Gives a forward-only [`Read`] a bounded [`Seek`].
///
/// Every byte read from the wrapped reader is mirrored into a circular buffer
/// of fixed capacity. Seeking only moves a logical position; the next read
/// then either replays bytes from the buffer (backward seek), discards bytes
/// from the wrapped reader (forward seek) or reads fresh data.
///
/// Reads fail with [`Error::WindowExceeded`] when the logical position is
/// further than the buffer capacity from what has been consumed, and seeking
/// from [`SeekFrom::End`] is not supported.
///
/// ```
/// use std::io::{Cursor, Read, Seek, SeekFrom};
/// use seekbuf::SeekBufferStream;
///
/// let mut stream = SeekBufferStream::with_capacity(Cursor::new(b"hello world"), 8)?;
///
/// let mut word = [0u8; 5];
/// stream.read_exact(&mut word)?;
/// assert_eq!(&word, b"hello");
///
/// stream.seek(SeekFrom::Current(-5))?;
/// stream.read_exact(&mut word)?;
/// assert_eq!(&word, b"hello");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct SeekBufferStream<R> {
    inner: R,
    window: SeekWindow,
}

impl<R: Read> SeekBufferStream<R> {
    /// Wraps `inner` with a buffer of [`DEFAULT_BUFFER_SIZE`](super::DEFAULT_BUFFER_SIZE) bytes.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            window: SeekWindow::new(DEFAULT_CAPACITY),
        }
    }

    /// Wraps `inner` with a buffer of `buffer_size` bytes.
    ///
    /// Nothing is read from `inner` yet. Fails with [`Error::InvalidCapacity`]
    /// when `buffer_size` is zero, in which case `inner` is dropped.
    pub fn with_capacity(inner: R, buffer_size: usize) -> Result<Self, Error> {
        let capacity = checked_capacity(buffer_size)?;
        Ok(Self {
            inner,
            window: SeekWindow::new(capacity),
        })
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut scratch = [0u8; SKIP_CHUNK];
        let mut done = 0;
        while done < n {
            let len = (n - done).min(SKIP_CHUNK as u64) as usize;
            match self.inner.read(&mut scratch[..len]) {
                Ok(0) => break,
                Ok(read) => {
                    self.window.skipped(read as u64);
                    done += read as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }
}

impl<R> SeekBufferStream<R> {
    /// Always `true`: seeking is emulated whatever the wrapped reader supports.
    pub fn can_seek(&self) -> bool {
        true
    }

    /// Size of the circular buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    /// The position the next read starts at.
    pub fn position(&self) -> u64 {
        self.window.position()
    }

    /// Same as `seek(SeekFrom::Start(pos))`. Performs no I/O.
    pub fn set_position(&mut self, pos: u64) {
        self.window.set_position(pos);
    }

    /// How many bytes have been consumed from the wrapped reader.
    pub fn underlying_position(&self) -> u64 {
        self.window.underlying_position()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reading from the returned reader directly desynchronizes the buffer.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SeekBufferStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.window.step(buf.len())? {
                Step::Skip(n) => {
                    if self.skip(n)? < n {
                        return Ok(0);
                    }
                }
                Step::Fill(len) => {
                    let n = self.inner.read(&mut buf[..len])?;
                    self.window.record(&buf[..n]);
                    return Ok(n);
                }
                Step::Replay => {
                    let data = self.window.buffered(buf.len());
                    let n = data.len();
                    buf[..n].copy_from_slice(data);
                    self.window.consume(n);
                    return Ok(n);
                }
            }
        }
    }
}

impl<R: Read> Seek for SeekBufferStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.window.seek(pos)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.window.position())
    }
}
