use std::fmt;
use std::io::Cursor;

use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};

pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

/// Extra field carrying 64-bit sizes.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unknown(other),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Stored => f.write_str("stored"),
            CompressionMethod::Deflate => f.write_str("deflate"),
            CompressionMethod::Unknown(id) => write!(f, "method {id}"),
        }
    }
}

/// Fixed part of a local file header, after its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Header length without the signature.
    pub const SIZE: usize = 26;

    pub fn from_bytes(data: &[u8; Self::SIZE]) -> Result<Self> {
        let mut cursor = Cursor::new(&data[..]);
        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?.into(),
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// Sizes from a ZIP64 extra field, present only where the header says 0xFFFFFFFF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Sizes {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
}

impl Zip64Sizes {
    /// Scans an extra field block for the ZIP64 record.
    ///
    /// Returns `None` when the block has no ZIP64 record at all.
    pub fn from_extra_field(extra: &[u8], header: &LocalFileHeader) -> Result<Option<Self>> {
        let mut cursor = Cursor::new(extra);
        while cursor.position() + 4 <= extra.len() as u64 {
            let id = cursor.read_u16::<LittleEndian>()?;
            let size = u64::from(cursor.read_u16::<LittleEndian>()?);
            let end = cursor.position() + size;

            if id == ZIP64_EXTRA_ID {
                let mut sizes = Zip64Sizes::default();
                if header.uncompressed_size == u32::MAX && cursor.position() + 8 <= end {
                    sizes.uncompressed_size = Some(cursor.read_u64::<LittleEndian>()?);
                }
                if header.compressed_size == u32::MAX && cursor.position() + 8 <= end {
                    sizes.compressed_size = Some(cursor.read_u64::<LittleEndian>()?);
                }
                return Ok(Some(sizes));
            }
            cursor.set_position(end);
        }
        Ok(None)
    }
}

/// CRC and sizes known once an entry's data has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTrailer {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// An entry met while walking an archive from the front.
///
/// For entries written with a data descriptor the sizes and CRC are zero
/// until the entry's data has been consumed and [`apply`](Self::apply) has
/// recorded the trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    /// Offset of the local file header in the archive.
    pub header_offset: u64,
    /// Offset of the entry's data in the archive.
    pub data_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
    pub has_data_descriptor: bool,
    pub is_encrypted: bool,
    pub is_zip64: bool,
}

impl ZipFileEntry {
    pub fn apply(&mut self, trailer: EntryTrailer) {
        self.crc32 = trailer.crc32;
        self.compressed_size = trailer.compressed_size;
        self.uncompressed_size = trailer.uncompressed_size;
    }

    /// Modification date as (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = (self.last_mod_date >> 9) + 1980;
        (year, month, day)
    }

    /// Modification time as (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = (self.last_mod_time >> 11) as u8;
        (hour, minute, second)
    }

    /// Percentage saved by compression, 0 for empty entries.
    pub fn savings_percent(&self) -> u64 {
        savings_percent(self.compressed_size, self.uncompressed_size)
    }
}

pub fn savings_percent(compressed: u64, uncompressed: u64) -> u64 {
    if uncompressed == 0 || compressed >= uncompressed {
        0
    } else {
        100 - compressed * 100 / uncompressed
    }
}
