//! Streaming ZIP extraction.
//!
//! Reads an archive front to back from a forward-only source wrapped in an
//! [`AsyncSeekBufferStream`](crate::AsyncSeekBufferStream). The central
//! directory is never needed, so archives can be listed or unpacked while
//! they are still arriving over a pipe or an HTTP connection.
//!
//! - [`structures`]: local file header, ZIP64 extra field and entry types
//! - [`parser`]: walks local headers and delimits each entry's data
//! - [`extractor`]: listing and extraction on top of the parser
//!
//! STORED and DEFLATE entries can be extracted. Entries with a data
//! descriptor must be DEFLATE compressed. Encryption and multi-disk archives
//! are not supported.

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipStreamParser;
pub use structures::*;
