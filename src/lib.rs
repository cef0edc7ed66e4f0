//! # seekbuf
//!
//! Bounded backward seeking over streams that can only be read forward.
//!
//! Network bodies, pipes and stdin hand out each byte once. Many parsers
//! however want to peek ahead and step back a little, or jump over data they
//! are not interested in. [`SeekBufferStream`] (blocking) and
//! [`AsyncSeekBufferStream`] (tokio) wrap such a source and keep the most
//! recently read bytes in a fixed-size circular buffer:
//!
//! - seeking back by at most the buffer size replays bytes from memory
//! - seeking forward discards bytes from the source on the next read
//! - seeking from the end is not supported, since the length is unknown
//!
//! ```
//! use std::io::{Read, Seek, SeekFrom};
//! use seekbuf::SeekBufferStream;
//!
//! let source: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7];
//! let mut stream = SeekBufferStream::with_capacity(source, 4)?;
//!
//! let mut buf = [0u8; 4];
//! stream.read_exact(&mut buf)?;
//! assert_eq!(buf, [0, 1, 2, 3]);
//!
//! // served from the buffer, the source is not touched
//! stream.seek(SeekFrom::Start(2))?;
//! stream.read_exact(&mut buf[..2])?;
//! assert_eq!(&buf[..2], &[2, 3]);
//! assert_eq!(stream.underlying_position(), 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The crate also ships `seekbuf`, a command line tool that lists and
//! extracts ZIP archives from stdin, files or HTTP URLs in a single forward
//! pass (see the [`zip`] and [`io`] modules).

pub mod cli;
mod error;
pub mod io;
pub mod stream;
pub mod zip;

pub use cli::Cli;
pub use error::Error;
pub use io::{Source, open_source};
pub use stream::{AsyncSeekBufferStream, DEFAULT_BUFFER_SIZE, SeekBufferStream};
pub use zip::{ZipExtractor, ZipFileEntry};
