//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Crc;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use tokio::io::{AsyncRead, ReadBuf};

const LOCAL_HEADER: u32 = 0x0403_4b50;
const CENTRAL_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;
const DATA_DESCRIPTOR: u32 = 0x0807_4b50;

/// 2024-03-15 13:45:30 in DOS format
const DOS_TIME: u16 = (13 << 11) | (45 << 5) | 15;
const DOS_DATE: u16 = ((2024 - 1980) << 9) | (3 << 5) | 15;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Trailer {
    /// Sizes and CRC in the local header.
    None,
    /// Data descriptor, with or without its signature.
    Descriptor { signature: bool },
    /// Data descriptor with 64-bit sizes.
    Zip64Descriptor,
}

/// Builds ZIP archives in memory, the way streaming and seeking writers lay them out.
#[derive(Default)]
pub struct ArchiveBuilder {
    data: Vec<u8>,
    central: Vec<u8>,
    entries: u16,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(mut self, name: &str, content: &[u8]) -> Self {
        self.add(name, 0, content, content.to_vec(), Trailer::None, None);
        self
    }

    pub fn directory(self, name: &str) -> Self {
        self.stored(name, b"")
    }

    pub fn deflated(mut self, name: &str, content: &[u8]) -> Self {
        self.add(name, 8, content, deflate(content), Trailer::None, None);
        self
    }

    /// DEFLATE entry whose sizes follow the data in a descriptor.
    pub fn deflated_streamed(mut self, name: &str, content: &[u8], signature: bool) -> Self {
        self.add(
            name,
            8,
            content,
            deflate(content),
            Trailer::Descriptor { signature },
            None,
        );
        self
    }

    pub fn deflated_streamed_zip64(mut self, name: &str, content: &[u8]) -> Self {
        self.add(name, 8, content, deflate(content), Trailer::Zip64Descriptor, None);
        self
    }

    pub fn stored_streamed(mut self, name: &str, content: &[u8]) -> Self {
        self.add(
            name,
            0,
            content,
            content.to_vec(),
            Trailer::Descriptor { signature: true },
            None,
        );
        self
    }

    /// Stored entry whose recorded CRC does not match its content.
    pub fn stored_with_crc(mut self, name: &str, content: &[u8], crc: u32) -> Self {
        self.add(name, 0, content, content.to_vec(), Trailer::None, Some(crc));
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.data.len() as u32;
        let cd_size = self.central.len() as u32;
        self.data.extend_from_slice(&self.central);

        let out = &mut self.data;
        out.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.entries).unwrap();
        out.write_u16::<LittleEndian>(self.entries).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        self.data
    }

    fn add(
        &mut self,
        name: &str,
        method: u16,
        content: &[u8],
        compressed: Vec<u8>,
        trailer: Trailer,
        crc_override: Option<u32>,
    ) {
        let crc = crc_override.unwrap_or_else(|| crc32(content));
        let offset = self.data.len() as u32;
        let flags: u16 = if trailer == Trailer::None { 0 } else { 1 << 3 };

        let mut extra = Vec::new();
        if trailer == Trailer::Zip64Descriptor {
            extra.write_u16::<LittleEndian>(0x0001).unwrap();
            extra.write_u16::<LittleEndian>(16).unwrap();
            extra.write_u64::<LittleEndian>(0).unwrap();
            extra.write_u64::<LittleEndian>(0).unwrap();
        }

        let (header_crc, header_compressed, header_uncompressed) = match trailer {
            Trailer::None => (crc, compressed.len() as u32, content.len() as u32),
            Trailer::Descriptor { .. } => (0, 0, 0),
            Trailer::Zip64Descriptor => (0, u32::MAX, u32::MAX),
        };

        let out = &mut self.data;
        out.write_u32::<LittleEndian>(LOCAL_HEADER).unwrap();
        out.write_u16::<LittleEndian>(if extra.is_empty() { 20 } else { 45 })
            .unwrap();
        out.write_u16::<LittleEndian>(flags).unwrap();
        out.write_u16::<LittleEndian>(method).unwrap();
        out.write_u16::<LittleEndian>(DOS_TIME).unwrap();
        out.write_u16::<LittleEndian>(DOS_DATE).unwrap();
        out.write_u32::<LittleEndian>(header_crc).unwrap();
        out.write_u32::<LittleEndian>(header_compressed).unwrap();
        out.write_u32::<LittleEndian>(header_uncompressed).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(extra.len() as u16).unwrap();
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&extra);
        out.extend_from_slice(&compressed);

        match trailer {
            Trailer::None => {}
            Trailer::Descriptor { signature } => {
                if signature {
                    out.write_u32::<LittleEndian>(DATA_DESCRIPTOR).unwrap();
                }
                out.write_u32::<LittleEndian>(crc).unwrap();
                out.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
                out.write_u32::<LittleEndian>(content.len() as u32).unwrap();
            }
            Trailer::Zip64Descriptor => {
                out.write_u32::<LittleEndian>(DATA_DESCRIPTOR).unwrap();
                out.write_u32::<LittleEndian>(crc).unwrap();
                out.write_u64::<LittleEndian>(compressed.len() as u64).unwrap();
                out.write_u64::<LittleEndian>(content.len() as u64).unwrap();
            }
        }

        let cd = &mut self.central;
        cd.write_u32::<LittleEndian>(CENTRAL_HEADER).unwrap();
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(flags).unwrap();
        cd.write_u16::<LittleEndian>(method).unwrap();
        cd.write_u16::<LittleEndian>(DOS_TIME).unwrap();
        cd.write_u16::<LittleEndian>(DOS_DATE).unwrap();
        cd.write_u32::<LittleEndian>(crc).unwrap();
        cd.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
        cd.write_u32::<LittleEndian>(content.len() as u32).unwrap();
        cd.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(offset).unwrap();
        cd.extend_from_slice(name.as_bytes());

        self.entries += 1;
    }
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Text that compresses well but is not trivially repetitive.
pub fn sample_text(lines: usize) -> Vec<u8> {
    (0..lines)
        .map(|i| format!("line {i}: the quick brown fox jumps over {} lazy dogs\n", i * 7 % 13))
        .collect::<String>()
        .into_bytes()
}

/// Async source that hands out at most `chunk` bytes per read and counts them.
pub struct Trickle {
    data: Vec<u8>,
    pub pos: usize,
    chunk: usize,
}

impl Trickle {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self { data, pos: 0, chunk }
    }
}

impl AsyncRead for Trickle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
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

/// Blocking source that counts the bytes and calls it served.
pub struct CountingReader<R> {
    inner: R,
    pub bytes: u64,
    pub calls: usize,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: 0,
            calls: 0,
        }
    }
}

impl<R: io::Read> io::Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        let n = self.inner.read(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }
}
