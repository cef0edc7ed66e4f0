//! Seek buffer streams.
//!
//! Both flavours share one piece of bookkeeping (`window`): a fixed-size
//! circular buffer holding the most recent bytes read from the wrapped
//! source, a logical position the caller seeks around, and the position the
//! source has actually reached. They differ only in how the wrapped source is
//! read:
//!
//! - [`SeekBufferStream`] wraps a blocking [`std::io::Read`].
//! - [`AsyncSeekBufferStream`] wraps a [`tokio::io::AsyncRead`].

mod async_io;
mod blocking;
mod window;

pub use async_io::AsyncSeekBufferStream;
pub use blocking::SeekBufferStream;

use std::num::NonZeroUsize;

use crate::Error;

/// Default capacity of the circular buffer (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_BUFFER_SIZE) {
    Some(capacity) => capacity,
    None => panic!("default buffer size must not be zero"),
};

fn checked_capacity(buffer_size: usize) -> Result<NonZeroUsize, Error> {
    NonZeroUsize::new(buffer_size).ok_or(Error::InvalidCapacity)
}
