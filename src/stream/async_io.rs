use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::window::{SKIP_CHUNK, SeekWindow, Step};
use super::{DEFAULT_CAPACITY, checked_capacity};
use crate::Error;

/// The [`tokio`] counterpart of [`SeekBufferStream`](super::SeekBufferStream).
///
/// Reads behave exactly like the blocking version and only suspend while the
/// wrapped reader is pending. Positions are updated once an underlying read
/// completes, so dropping a pending read future is always safe.
///
/// ```
/// use std::io::SeekFrom;
/// use seekbuf::AsyncSeekBufferStream;
/// use tokio::io::{AsyncReadExt, AsyncSeekExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let source: &[u8] = b"PK\x03\x04rest of the archive";
/// let mut stream = AsyncSeekBufferStream::with_capacity(source, 64).unwrap();
///
/// let mut magic = [0u8; 4];
/// stream.read_exact(&mut magic).await?;
/// stream.seek(SeekFrom::Start(0)).await?;
///
/// let mut all = Vec::new();
/// stream.read_to_end(&mut all).await?;
/// assert!(all.starts_with(&magic));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncSeekBufferStream<R> {
    inner: R,
    window: SeekWindow,
}

impl<R: AsyncRead + Unpin> AsyncSeekBufferStream<R> {
    /// Wraps `inner` with a buffer of [`DEFAULT_BUFFER_SIZE`](super::DEFAULT_BUFFER_SIZE) bytes.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            window: SeekWindow::new(DEFAULT_CAPACITY),
        }
    }

    /// Wraps `inner` with a buffer of `buffer_size` bytes.
    ///
    /// Fails with [`Error::InvalidCapacity`] when `buffer_size` is zero.
    pub fn with_capacity(inner: R, buffer_size: usize) -> Result<Self, Error> {
        let capacity = checked_capacity(buffer_size)?;
        Ok(Self {
            inner,
            window: SeekWindow::new(capacity),
        })
    }
}

impl<R> AsyncSeekBufferStream<R> {
    pub fn can_seek(&self) -> bool {
        true
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn position(&self) -> u64 {
        self.window.position()
    }

    /// Moves the logical position without any I/O.
    pub fn set_position(&mut self, pos: u64) {
        self.window.set_position(pos);
    }

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

impl<R: AsyncRead + Unpin> AsyncRead for AsyncSeekBufferStream<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            match this.window.step(buf.remaining())? {
                Step::Skip(n) => {
                    let mut scratch = [0u8; SKIP_CHUNK];
                    let len = n.min(SKIP_CHUNK as u64) as usize;
                    let mut discard = ReadBuf::new(&mut scratch[..len]);
                    ready!(Pin::new(&mut this.inner).poll_read(cx, &mut discard))?;

                    let read = discard.filled().len();
                    if read == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    this.window.skipped(read as u64);
                }
                Step::Fill(len) => {
                    let mut fresh = ReadBuf::new(buf.initialize_unfilled_to(len));
                    ready!(Pin::new(&mut this.inner).poll_read(cx, &mut fresh))?;

                    let read = fresh.filled().len();
                    this.window.record(fresh.filled());
                    buf.advance(read);
                    return Poll::Ready(Ok(()));
                }
                Step::Replay => {
                    let data = this.window.buffered(buf.remaining());
                    let n = data.len();
                    buf.put_slice(data);
                    this.window.consume(n);
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncSeek for AsyncSeekBufferStream<R> {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        self.get_mut().window.seek(position)?;
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.window.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    /// Hands out at most `chunk` bytes per poll and yields `Pending` every
    /// other poll, like a slow socket.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        ready: bool,
    }

    impl Trickle {
        fn new(len: usize, chunk: usize) -> Self {
            Self {
                data: (0..len).map(|i| (i % 251) as u8).collect(),
                pos: 0,
                chunk,
                ready: false,
            }
        }
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if !self.ready {
                self.ready = true;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            self.ready = false;

            let n = buf
                .remaining()
                .min(self.chunk)
                .min(self.data.len() - self.pos);
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn sequential_reads_are_transparent() {
        let source = Trickle::new(5000, 97);
        let expected = source.data.clone();
        let mut stream = AsyncSeekBufferStream::with_capacity(source, 256).unwrap();

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, expected);
        assert_eq!(stream.underlying_position(), 5000);
    }

    #[tokio::test]
    async fn walkthrough_with_four_byte_buffer() {
        let data: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7];
        let mut stream = AsyncSeekBufferStream::with_capacity(data, 4).unwrap();

        let mut four = [0u8; 4];
        stream.read_exact(&mut four).await.unwrap();
        assert_eq!(four, [0, 1, 2, 3]);

        assert_eq!(stream.seek(SeekFrom::Start(2)).await.unwrap(), 2);
        let mut two = [0u8; 2];
        stream.read_exact(&mut two).await.unwrap();
        assert_eq!(two, [2, 3]);
        assert_eq!(stream.underlying_position(), 4);

        stream.seek(SeekFrom::Start(0)).await.unwrap();
        assert_eq!(stream.read_u8().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn forward_seek_skips_through_pending_reads() {
        let source = Trickle::new(40_000, 3000);
        let mut stream = AsyncSeekBufferStream::with_capacity(source, 32 * 1024).unwrap();

        stream.seek(SeekFrom::Start(30_000)).await.unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).await.unwrap();

        let expected: Vec<u8> = (30_000..30_003).map(|i| (i % 251) as u8).collect();
        assert_eq!(buf.as_slice(), expected.as_slice());
        assert_eq!(stream.get_ref().pos, 30_003);
    }

    #[tokio::test]
    async fn window_errors_surface_from_reads() {
        let data: &[u8] = &[0; 64];
        let mut stream = AsyncSeekBufferStream::with_capacity(data, 8).unwrap();

        let mut buf = [0u8; 16];
        stream.read_exact(&mut buf).await.unwrap();
        stream.seek(SeekFrom::Current(-9)).await.unwrap();

        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(
            Error::from_io(&err),
            Some(&Error::WindowExceeded {
                logical: 7,
                underlying: 16,
                capacity: 8
            })
        );
    }

    #[tokio::test]
    async fn seek_from_end_is_unsupported() {
        let data: &[u8] = b"abc";
        let mut stream = AsyncSeekBufferStream::new(data);
        let err = stream.seek(SeekFrom::End(0)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(stream.can_seek());
    }

    #[tokio::test]
    async fn set_position_matches_seek_from_start() {
        let data: Vec<u8> = (0..32).collect();

        let mut sought = AsyncSeekBufferStream::with_capacity(data.as_slice(), 16).unwrap();
        let mut set = AsyncSeekBufferStream::with_capacity(data.as_slice(), 16).unwrap();
        let mut a = [0u8; 12];
        let mut b = [0u8; 12];
        sought.read_exact(&mut a).await.unwrap();
        set.read_exact(&mut b).await.unwrap();

        sought.seek(SeekFrom::Start(5)).await.unwrap();
        set.set_position(5);
        sought.read_exact(&mut a).await.unwrap();
        set.read_exact(&mut b).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(sought.position(), set.position());
        assert_eq!(sought.underlying_position(), set.underlying_position());
    }
}
