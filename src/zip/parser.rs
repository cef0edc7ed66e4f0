//! Front-to-back ZIP parser.
//!
//! The usual way to read a ZIP archive starts at the central directory at the
//! end of the file, which a pipe or a plain HTTP body cannot reach. This
//! parser instead walks the local file headers in order and stops at the
//! first central directory record.
//!
//! ## Finding the end of entry data
//!
//! - When the local header carries the sizes, skipping an entry is a forward
//!   seek by its compressed size.
//! - Entries written with a data descriptor (flag bit 3) do not declare their
//!   size up front. For DEFLATE data the inflater finds the end of the stream
//!   itself; the input read past that point is given back with a backward
//!   seek, which is what the seek buffer is for. STORED entries of this kind
//!   cannot be delimited and are rejected.

use std::io::{self, SeekFrom};

use anyhow::{Context, Result, bail};
use flate2::{Crc, Decompress, FlushDecompress, Status};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::structures::*;
use crate::AsyncSeekBufferStream;

/// Read size for entry data.
const CHUNK_SIZE: usize = 32 * 1024;

/// How the data of the entry last returned by `next_entry` is laid out.
#[derive(Debug, Clone)]
struct PendingData {
    name: String,
    method: CompressionMethod,
    /// `None` when the sizes follow in a data descriptor.
    compressed_size: Option<u64>,
    uncompressed_size: u64,
    crc32: u32,
    zip64: bool,
    encrypted: bool,
}

/// Walks a ZIP archive read from a forward-only source.
///
/// ```ignore
/// let mut parser = ZipStreamParser::new(AsyncSeekBufferStream::new(source));
/// while let Some(mut entry) = parser.next_entry().await? {
///     let trailer = parser.skip_data().await?;
///     entry.apply(trailer);
///     println!("{} {}", entry.file_name, entry.uncompressed_size);
/// }
/// ```
pub struct ZipStreamParser<R> {
    stream: AsyncSeekBufferStream<R>,
    pending: Option<PendingData>,
    finished: bool,
}

impl<R: AsyncRead + Unpin> ZipStreamParser<R> {
    pub fn new(stream: AsyncSeekBufferStream<R>) -> Self {
        Self {
            stream,
            pending: None,
            finished: false,
        }
    }

    /// Reads the next local file header.
    ///
    /// Data of the previous entry that was neither skipped nor extracted is
    /// skipped first. Returns `None` once the central directory is reached.
    pub async fn next_entry(&mut self) -> Result<Option<ZipFileEntry>> {
        if self.pending.is_some() {
            self.skip_data().await?;
        }
        if self.finished {
            return Ok(None);
        }

        let header_offset = self.stream.position();
        let signature = match self.stream.read_u32_le().await {
            Ok(signature) => signature,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!(offset = header_offset, "archive ended without a central directory");
                self.finished = true;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match signature {
            LOCAL_HEADER_SIGNATURE => {}
            CENTRAL_HEADER_SIGNATURE
            | END_OF_CENTRAL_DIRECTORY_SIGNATURE
            | ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE => {
                debug!(offset = header_offset, "reached the central directory");
                self.finished = true;
                return Ok(None);
            }
            other => bail!("Invalid Local File Header signature {other:#010x} at offset {header_offset}"),
        }

        let mut fixed = [0u8; LocalFileHeader::SIZE];
        self.stream
            .read_exact(&mut fixed)
            .await
            .context("truncated Local File Header")?;
        let header = LocalFileHeader::from_bytes(&fixed)?;

        let mut name = vec![0u8; usize::from(header.file_name_length)];
        self.stream.read_exact(&mut name).await?;
        let file_name = String::from_utf8_lossy(&name).into_owned();

        let mut extra = vec![0u8; usize::from(header.extra_field_length)];
        self.stream.read_exact(&mut extra).await?;
        let zip64 = Zip64Sizes::from_extra_field(&extra, &header)?;

        let compressed_size = zip64
            .and_then(|z| z.compressed_size)
            .unwrap_or(u64::from(header.compressed_size));
        let uncompressed_size = zip64
            .and_then(|z| z.uncompressed_size)
            .unwrap_or(u64::from(header.uncompressed_size));

        let entry = ZipFileEntry {
            is_directory: file_name.ends_with('/'),
            file_name,
            compression_method: header.compression_method,
            compressed_size,
            uncompressed_size,
            crc32: header.crc32,
            header_offset,
            data_offset: self.stream.position(),
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            has_data_descriptor: header.has_data_descriptor(),
            is_encrypted: header.is_encrypted(),
            is_zip64: zip64.is_some(),
        };
        debug!(name = %entry.file_name, offset = header_offset, method = %entry.compression_method, "entry");

        self.pending = Some(PendingData {
            name: entry.file_name.clone(),
            method: entry.compression_method,
            compressed_size: (!entry.has_data_descriptor).then_some(compressed_size),
            uncompressed_size,
            crc32: entry.crc32,
            zip64: entry.is_zip64,
            encrypted: entry.is_encrypted,
        });

        Ok(Some(entry))
    }

    /// Moves past the current entry's data without producing it.
    pub async fn skip_data(&mut self) -> Result<EntryTrailer> {
        let Some(pending) = self.pending.take() else {
            bail!("no entry to skip");
        };

        match pending.compressed_size {
            Some(size) => {
                trace!(name = %pending.name, size, "skipping entry data");
                self.advance(size).await?;
                Ok(EntryTrailer {
                    crc32: pending.crc32,
                    compressed_size: size,
                    uncompressed_size: pending.uncompressed_size,
                })
            }
            None => self.consume_data(&pending, &mut tokio::io::sink()).await,
        }
    }

    /// Writes the current entry's uncompressed data to `out`.
    ///
    /// The CRC-32 of the data is checked against the archive.
    pub async fn read_data<W>(&mut self, out: &mut W) -> Result<EntryTrailer>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(pending) = self.pending.take() else {
            bail!("no entry to read");
        };
        self.consume_data(&pending, out).await
    }

    async fn consume_data<W>(&mut self, pending: &PendingData, out: &mut W) -> Result<EntryTrailer>
    where
        W: AsyncWrite + Unpin,
    {
        if pending.encrypted {
            bail!("{}: encrypted entries are not supported", pending.name);
        }

        let mut crc = Crc::new();
        let (compressed, uncompressed) = match (pending.method, pending.compressed_size) {
            (CompressionMethod::Stored, Some(size)) => {
                let copied = self.copy_stored(size, out, &mut crc).await?;
                (copied, copied)
            }
            (CompressionMethod::Deflate, limit) => self.inflate(limit, out, &mut crc).await?,
            (CompressionMethod::Stored, None) => {
                bail!("{}: stored entry without sizes cannot be read from a stream", pending.name)
            }
            (method, _) => bail!("{}: unsupported compression method ({method})", pending.name),
        };
        out.flush().await?;

        let trailer = if pending.compressed_size.is_none() {
            self.read_data_descriptor(pending.zip64).await?
        } else {
            EntryTrailer {
                crc32: pending.crc32,
                compressed_size: compressed,
                uncompressed_size: pending.uncompressed_size,
            }
        };

        if trailer.uncompressed_size != uncompressed {
            bail!(
                "{}: size mismatch, archive says {} bytes but {} were produced",
                pending.name,
                trailer.uncompressed_size,
                uncompressed
            );
        }
        if trailer.crc32 != crc.sum() {
            bail!(
                "{}: CRC mismatch, archive says {:08x} but data has {:08x}",
                pending.name,
                trailer.crc32,
                crc.sum()
            );
        }
        Ok(trailer)
    }

    async fn copy_stored<W>(&mut self, size: u64, out: &mut W, crc: &mut Crc) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.chunk_size()];
        let mut remaining = size;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = self.stream.read(&mut buf[..want]).await?;
            if n == 0 {
                bail!("unexpected end of archive, {remaining} bytes of entry data missing");
            }
            crc.update(&buf[..n]);
            out.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }
        Ok(size)
    }

    /// Inflates raw DEFLATE data, returning (compressed, uncompressed) sizes.
    ///
    /// With `limit` the data occupies exactly that many bytes. Without it the
    /// bytes read past the end of the deflate stream are seeked back over.
    async fn inflate<W>(&mut self, limit: Option<u64>, out: &mut W, crc: &mut Crc) -> Result<(u64, u64)>
    where
        W: AsyncWrite + Unpin,
    {
        let chunk = self.chunk_size();
        let mut input = vec![0u8; chunk];
        let mut output = vec![0u8; CHUNK_SIZE];
        let mut inflater = Decompress::new(false);
        let mut remaining = limit;

        loop {
            let want = match remaining {
                Some(0) => bail!("deflate stream runs past the entry's compressed size"),
                Some(r) => r.min(chunk as u64) as usize,
                None => chunk,
            };
            let read = self.stream.read(&mut input[..want]).await?;
            if read == 0 {
                bail!("unexpected end of archive inside deflate stream");
            }
            if let Some(r) = remaining.as_mut() {
                *r -= read as u64;
            }

            let mut pos = 0;
            loop {
                let in_before = inflater.total_in();
                let out_before = inflater.total_out();
                let status = inflater
                    .decompress(&input[pos..read], &mut output, FlushDecompress::None)
                    .context("corrupt deflate stream")?;
                let consumed = (inflater.total_in() - in_before) as usize;
                let produced = (inflater.total_out() - out_before) as usize;
                pos += consumed;

                if produced > 0 {
                    crc.update(&output[..produced]);
                    out.write_all(&output[..produced]).await?;
                }

                if status == Status::StreamEnd {
                    self.finish_deflate(remaining, read - pos).await?;
                    return Ok((inflater.total_in(), inflater.total_out()));
                }
                let output_full = produced == output.len();
                if !output_full && (pos == read || consumed == 0) {
                    break;
                }
            }
        }
    }

    /// Positions the stream right after the deflate data.
    async fn finish_deflate(&mut self, remaining: Option<u64>, unused: usize) -> Result<()> {
        match remaining {
            // declared size: step over any slack up to the end of the entry
            Some(0) => {}
            Some(r) => self.advance(r).await?,
            None if unused > 0 => {
                trace!(unused, "giving back input read past the deflate stream");
                self.stream.seek(SeekFrom::Current(-(unused as i64))).await?;
            }
            None => {}
        }
        Ok(())
    }

    /// Moves `n` bytes forward without producing them.
    ///
    /// Within the buffer size this is a plain seek, resolved by the next read.
    /// Longer distances are read through.
    async fn advance(&mut self, n: u64) -> Result<()> {
        if n <= self.stream.capacity() as u64 {
            self.stream.seek(SeekFrom::Current(n as i64)).await?;
            return Ok(());
        }

        let mut rest = (&mut self.stream).take(n);
        let skipped = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
        if skipped < n {
            bail!("unexpected end of archive, {} bytes of entry data missing", n - skipped);
        }
        Ok(())
    }

    async fn read_data_descriptor(&mut self, zip64: bool) -> Result<EntryTrailer> {
        let first = self.stream.read_u32_le().await.context("truncated data descriptor")?;
        let crc32 = if first == DATA_DESCRIPTOR_SIGNATURE {
            self.stream.read_u32_le().await?
        } else {
            first
        };

        let (compressed_size, uncompressed_size) = if zip64 {
            (self.stream.read_u64_le().await?, self.stream.read_u64_le().await?)
        } else {
            (
                u64::from(self.stream.read_u32_le().await?),
                u64::from(self.stream.read_u32_le().await?),
            )
        };

        Ok(EntryTrailer {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Input read at once, small enough that any overshoot can be seeked back.
    fn chunk_size(&self) -> usize {
        CHUNK_SIZE.min(self.stream.capacity())
    }

    /// Bytes of the archive consumed so far.
    pub fn position(&self) -> u64 {
        self.stream.position()
    }

    pub fn into_inner(self) -> AsyncSeekBufferStream<R> {
        self.stream
    }
}
