use std::io;

/// Errors raised by the seek buffer streams.
///
/// Through the [`Read`](std::io::Read)/[`Seek`](std::io::Seek) surface these
/// arrive wrapped in an [`io::Error`]; use [`Error::from_io`] to get them back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The circular buffer needs room for at least one byte.
    #[error("buffer size must be greater than zero")]
    InvalidCapacity,

    /// The logical position lies outside the bytes the buffer still holds.
    #[error(
        "cannot read at position {logical}: underlying stream is at {underlying} \
         and only {capacity} bytes are buffered"
    )]
    WindowExceeded {
        logical: u64,
        underlying: u64,
        capacity: usize,
    },

    /// The length of a forward-only stream is unknown.
    #[error("seeking relative to the end of the stream is not supported")]
    SeekFromEnd,

    #[error("invalid seek from {from} by {offset}: position would be negative or overflow")]
    InvalidPosition { from: u64, offset: i64 },
}

impl Error {
    /// Recovers the stream error carried by an [`io::Error`], if there is one.
    pub fn from_io(err: &io::Error) -> Option<&Error> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Error>())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::InvalidCapacity | Error::InvalidPosition { .. } => io::ErrorKind::InvalidInput,
            Error::SeekFromEnd => io::ErrorKind::Unsupported,
            Error::WindowExceeded { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
