use std::path::Path;

use anyhow::Result;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::parser::ZipStreamParser;
use super::structures::ZipFileEntry;
use crate::AsyncSeekBufferStream;

/// High-level access to an archive that can only be read once, in order.
///
/// Entries come out one at a time from [`next_entry`](Self::next_entry); each
/// can be extracted or skipped, but never revisited.
pub struct ZipExtractor<R> {
    parser: ZipStreamParser<R>,
}

impl<R: AsyncRead + Unpin> ZipExtractor<R> {
    pub fn new(stream: AsyncSeekBufferStream<R>) -> Self {
        Self {
            parser: ZipStreamParser::new(stream),
        }
    }

    pub async fn next_entry(&mut self) -> Result<Option<ZipFileEntry>> {
        self.parser.next_entry().await
    }

    /// Skips the data of `entry`, filling in its final sizes.
    pub async fn skip(&mut self, entry: &mut ZipFileEntry) -> Result<()> {
        let trailer = self.parser.skip_data().await?;
        entry.apply(trailer);
        Ok(())
    }

    /// Walks the whole archive and returns every entry with its final sizes.
    pub async fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let mut entries = Vec::new();
        while let Some(mut entry) = self.next_entry().await? {
            self.skip(&mut entry).await?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Extracts `entry` into memory.
    pub async fn extract_to_memory(&mut self, entry: &mut ZipFileEntry) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.uncompressed_size.min(1 << 20) as usize);
        let trailer = self.parser.read_data(&mut data).await?;
        entry.apply(trailer);
        Ok(data)
    }

    /// Extracts `entry` to `output_path`, creating parent directories.
    pub async fn extract_to_file(&mut self, entry: &mut ZipFileEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if entry.is_directory {
            fs::create_dir_all(output_path).await?;
            return self.skip(entry).await;
        }

        let mut file = fs::File::create(output_path).await?;
        let trailer = self.parser.read_data(&mut file).await;
        match trailer {
            Ok(trailer) => {
                entry.apply(trailer);
                Ok(())
            }
            Err(e) => {
                // do not leave a half-written or corrupt file behind
                drop(file);
                let _ = fs::remove_file(output_path).await;
                Err(e)
            }
        }
    }

    /// Extracts `entry` to stdout.
    pub async fn extract_to_stdout(&mut self, entry: &mut ZipFileEntry) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        let trailer = self.parser.read_data(&mut stdout).await?;
        stdout.flush().await?;
        entry.apply(trailer);
        Ok(())
    }

    /// Bytes of the archive consumed so far.
    pub fn position(&self) -> u64 {
        self.parser.position()
    }
}
